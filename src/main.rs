use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tokio::task::JoinError;
use tracing::{error, info, warn};

use depthx_rs::config::Settings;
use depthx_rs::engine::SharedBook;
use depthx_rs::market_data::adapters::coinbase::CoinbaseFeed;
use depthx_rs::market_data::adapters::rest::{Provider, RestPoller};
use depthx_rs::market_data::adapters::VenueAdapter;
use depthx_rs::market_data::router::{self, Router};
use depthx_rs::sink::csv_sink::CsvSink;
use depthx_rs::sink::depth_json::DepthJsonSink;
use depthx_rs::telemetry;

#[derive(Debug, Parser)]
#[command(name = "depthx", version, about = "Order book reconstruction from exchange depth feeds")]
struct Cli {
    /// Settings file (toml/json/yaml); defaults to ./depthx.* if present
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Levels per side in depth snapshots
    #[arg(long, global = true)]
    depth_levels: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Poll a REST depth endpoint and log top-of-book to CSV
    Poll {
        provider: Provider,
        symbol: String,
        out_csv: PathBuf,
        #[arg(long)]
        interval_ms: Option<u64>,
        /// Also write depth snapshots to this JSON file
        #[arg(long)]
        depth_json: Option<PathBuf>,
    },
    /// Stream the Coinbase level2 feed, log top-of-book to CSV and dump depth JSON
    Stream {
        product: String,
        out_csv: PathBuf,
        depth_json: Option<PathBuf>,
        #[arg(long)]
        ws_url: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut settings = Settings::load(cli.config.as_deref()).context("loading settings")?;
    if let Some(levels) = cli.depth_levels {
        settings.depth_levels = levels;
    }

    let adapter: Arc<dyn VenueAdapter> = match cli.command {
        Command::Poll { provider, symbol, out_csv, interval_ms, depth_json } => {
            settings.provider = provider;
            settings.symbol = symbol;
            settings.out_csv = out_csv;
            settings.depth_path = depth_json.or(settings.depth_path);
            if let Some(ms) = interval_ms {
                settings.poll_interval_ms = ms;
            }
            settings.validate()?;
            Arc::new(RestPoller::new(
                settings.provider,
                settings.symbol.clone(),
                settings.poll_interval(),
                settings.request_timeout(),
            )?)
        }
        Command::Stream { product, out_csv, depth_json, ws_url } => {
            settings.symbol = product;
            settings.out_csv = out_csv;
            settings.depth_path = depth_json
                .or(settings.depth_path)
                .or_else(|| Some(PathBuf::from("depth.json")));
            if let Some(url) = ws_url {
                settings.ws_url = url;
            }
            Arc::new(CoinbaseFeed::new(&settings.symbol, &settings.ws_url, settings.ws_idle_timeout()))
        }
    };

    telemetry::init_tracing(&settings.log_filter);
    telemetry::init_metrics(settings.metrics_port)?;

    let venue = adapter.venue();
    info!(
        venue,
        symbol = %settings.symbol,
        out_csv = %settings.out_csv.display(),
        depth_path = ?settings.depth_path,
        "depthx starting"
    );

    let csv = CsvSink::create(&settings.out_csv)?;
    let (router, depth_rx) = Router::new(
        SharedBook::new(),
        venue,
        settings.symbol.clone(),
        settings.depth_levels,
        Some(csv),
    );
    let (tx, rx) = mpsc::channel(settings.channel_buffer);

    let adapter_handle = tokio::spawn(async move { adapter.run(tx).await });
    let router_handle = tokio::spawn(router.run(rx));
    let sink_handle = settings.depth_path.clone().map(|path| {
        let sink = DepthJsonSink::new(path, settings.dump_interval());
        tokio::spawn(router::run_depth_sink(depth_rx, sink))
    });

    let outcome = tokio::select! {
        res = adapter_handle => task_outcome("adapter", res),
        res = router_handle => task_outcome("router", res),
        _ = tokio::signal::ctrl_c() => {
            info!("received Ctrl-C, shutting down");
            Ok(())
        }
    };

    if let Some(handle) = sink_handle {
        handle.abort();
    }
    match &outcome {
        Ok(()) => info!("stopped"),
        Err(err) => error!(error = %format!("{err:#}"), "stopped on task failure"),
    }
    outcome
}

/// A task that returns cleanly only logs; a task error or panic fails the process.
fn task_outcome<E>(task: &str, res: Result<Result<(), E>, JoinError>) -> anyhow::Result<()>
where
    E: Into<anyhow::Error>,
{
    match res {
        Ok(Ok(())) => {
            warn!(task, "task exited");
            Ok(())
        }
        Ok(Err(err)) => Err(Into::<anyhow::Error>::into(err).context(format!("{task} task failed"))),
        Err(err) => Err(anyhow::Error::new(err).context(format!("{task} task panicked"))),
    }
}
