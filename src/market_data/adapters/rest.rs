// REST depth pollers. Each poll is a full snapshot of the top of the venue's book.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::{now_ms, FeedError, FeedResult, MarketEvent, VenueAdapter};
use crate::engine::types::Level;
use crate::market_data::normaliser::parse_levels;

// some venues reject requests without a UA
pub const USER_AGENT: &str = "Mozilla/5.0 (compatible; depthx/0.1)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    #[value(name = "binance_us")]
    BinanceUs,
    Coinbase,
    Kraken,
}

impl Provider {
    pub fn name(&self) -> &'static str {
        match self {
            Provider::BinanceUs => "binance_us",
            Provider::Coinbase => "coinbase",
            Provider::Kraken => "kraken",
        }
    }

    /// Symbol formats: `BTCUSDT` (binance_us), `BTC-USD` (coinbase), `XBTUSD` (kraken).
    pub fn depth_url(&self, symbol: &str) -> String {
        match self {
            Provider::BinanceUs => {
                format!("https://api.binance.us/api/v3/depth?symbol={symbol}&limit=50")
            }
            Provider::Coinbase => {
                format!("https://api.exchange.coinbase.com/products/{symbol}/book?level=2")
            }
            Provider::Kraken => format!("https://api.kraken.com/0/public/Depth?pair={symbol}&count=50"),
        }
    }

    pub fn parse_depth(&self, body: Value) -> FeedResult<(Vec<Level>, Vec<Level>)> {
        match self {
            // binance: [[price, qty]], coinbase: [[price, size, num_orders]]
            Provider::BinanceUs | Provider::Coinbase => {
                let depth: DepthBody = serde_json::from_value(body)?;
                Ok((parse_levels(&depth.bids)?, parse_levels(&depth.asks)?))
            }
            Provider::Kraken => parse_kraken_depth(body),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Deserialize)]
struct DepthBody {
    #[serde(default)]
    bids: Vec<Value>,
    #[serde(default)]
    asks: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct KrakenResponse {
    #[serde(default)]
    error: Vec<String>,
    #[serde(default)]
    result: serde_json::Map<String, Value>,
}

// Kraken keys the book by its own pair alias (XBTUSD -> XXBTZUSD); take the first entry.
fn parse_kraken_depth(body: Value) -> FeedResult<(Vec<Level>, Vec<Level>)> {
    let response: KrakenResponse = serde_json::from_value(body)?;
    if !response.error.is_empty() {
        return Err(FeedError::Venue {
            venue: "kraken",
            message: response.error.join("; "),
        });
    }
    let (_, book) = response
        .result
        .into_iter()
        .next()
        .ok_or_else(|| FeedError::Venue {
            venue: "kraken",
            message: "empty result".to_string(),
        })?;
    let depth: DepthBody = serde_json::from_value(book)?;
    Ok((parse_levels(&depth.bids)?, parse_levels(&depth.asks)?))
}

/// Polls one provider's depth endpoint at a fixed interval.
pub struct RestPoller {
    provider: Provider,
    symbol: String,
    interval: Duration,
    client: reqwest::Client,
}

impl RestPoller {
    pub fn new(
        provider: Provider,
        symbol: impl Into<String>,
        interval: Duration,
        timeout: Duration,
    ) -> FeedResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            provider,
            symbol: symbol.into(),
            interval,
            client,
        })
    }

    pub async fn fetch_depth(&self) -> FeedResult<(Vec<Level>, Vec<Level>)> {
        let url = self.provider.depth_url(&self.symbol);
        let body: Value = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        self.provider.parse_depth(body)
    }
}

#[async_trait::async_trait]
impl VenueAdapter for RestPoller {
    fn venue(&self) -> &'static str {
        self.provider.name()
    }

    async fn run(&self, tx: mpsc::Sender<MarketEvent>) -> FeedResult<()> {
        info!(provider = %self.provider, symbol = %self.symbol, interval_ms = self.interval.as_millis() as u64, "starting depth poller");
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match self.fetch_depth().await {
                Ok((bids, asks)) => {
                    debug!(bids = bids.len(), asks = asks.len(), "depth fetched");
                    let event = MarketEvent::Snapshot {
                        symbol: self.symbol.clone(),
                        bids,
                        asks,
                        ts_ms: now_ms(),
                    };
                    if tx.send(event).await.is_err() {
                        info!("event receiver dropped, stopping poller");
                        return Ok(());
                    }
                }
                // transient errors are common; warn and retry on the next tick
                Err(e) => warn!(provider = %self.provider, error = %e, "fetch/update error"),
            }
        }
    }
}
