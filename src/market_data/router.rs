// Router: feed events -> book -> sinks
use std::io::Write;
use std::sync::Arc;

use chrono::{SecondsFormat, TimeZone, Utc};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::engine::{DepthSnapshot, SharedBook};
use crate::market_data::adapters::MarketEvent;
use crate::sink::csv_sink::{CsvSink, TopOfBookRow};
use crate::sink::depth_json::DepthJsonSink;
use crate::sink::{SinkError, SinkResult};
use crate::telemetry;

/// Latest depth handed to readers. Readers never take the book lock.
#[derive(Debug, Clone)]
pub struct Published {
    pub depth: Arc<DepthSnapshot>,
    /// Count of venue snapshots applied so far. The watch slot only keeps the
    /// latest value, so readers compare this against the last one they saw
    /// instead of relying on a per-message flag.
    pub snapshot_seq: u64,
}

pub struct Router<W: Write> {
    book: SharedBook,
    provider: String,
    symbol: String,
    depth_levels: usize,
    snapshot_seq: u64,
    csv: Option<CsvSink<W>>,
    depth_tx: watch::Sender<Option<Published>>,
}

impl<W: Write> Router<W> {
    pub fn new(
        book: SharedBook,
        provider: impl Into<String>,
        symbol: impl Into<String>,
        depth_levels: usize,
        csv: Option<CsvSink<W>>,
    ) -> (Self, watch::Receiver<Option<Published>>) {
        let (depth_tx, depth_rx) = watch::channel(None);
        let router = Self {
            book,
            provider: provider.into(),
            symbol: symbol.into(),
            depth_levels,
            snapshot_seq: 0,
            csv,
            depth_tx,
        };
        (router, depth_rx)
    }

    pub fn book(&self) -> &SharedBook {
        &self.book
    }

    pub fn csv(&self) -> Option<&CsvSink<W>> {
        self.csv.as_ref()
    }

    /// Apply one event. Returns `Ok(false)` when the book rejected it; only a
    /// CSV write failure is an error.
    pub fn handle(&mut self, event: MarketEvent) -> Result<bool, SinkError> {
        let (result, is_snapshot, ts_ms) = match &event {
            MarketEvent::Snapshot { bids, asks, ts_ms, .. } => {
                (self.book.apply_snapshot(bids, asks), true, *ts_ms)
            }
            MarketEvent::Update { changes, ts_ms, .. } => {
                (self.book.apply_updates(changes), false, *ts_ms)
            }
        };

        if let Err(e) = result {
            warn!(symbol = %event.symbol(), error = %e, "rejected book message, state unchanged");
            metrics::counter!(telemetry::BATCHES_REJECTED).increment(1);
            return Ok(false);
        }
        if is_snapshot {
            self.snapshot_seq += 1;
            metrics::counter!(telemetry::SNAPSHOTS_APPLIED).increment(1);
            debug!(symbol = %event.symbol(), seq = self.snapshot_seq, "snapshot applied");
        } else {
            metrics::counter!(telemetry::UPDATE_BATCHES_APPLIED).increment(1);
        }

        let depth = self.book.depth_snapshot(self.depth_levels);
        let top = depth.top_of_book();
        self.depth_tx.send_replace(Some(Published {
            depth: Arc::new(depth),
            snapshot_seq: self.snapshot_seq,
        }));

        if top.is_two_sided() {
            if let Some(csv) = self.csv.as_mut() {
                let ts_iso = format_ts(ts_ms);
                debug!(
                    ts = %ts_iso,
                    provider = %self.provider,
                    symbol = %self.symbol,
                    bid = ?top.best_bid,
                    ask = ?top.best_ask,
                    spread = ?top.spread,
                    mid = ?top.mid,
                    "top of book"
                );
                csv.write_row(&TopOfBookRow::new(ts_iso, &self.provider, &self.symbol, &top))?;
            }
        }
        Ok(true)
    }

    pub async fn run(mut self, mut rx: mpsc::Receiver<MarketEvent>) -> anyhow::Result<()> {
        info!(provider = %self.provider, symbol = %self.symbol, "router started");
        while let Some(event) = rx.recv().await {
            self.handle(event)?;
        }
        info!("event channel closed, router exiting");
        Ok(())
    }
}

/// Event time (ms since epoch, UTC) as RFC 3339 with millisecond precision.
fn format_ts(ts_ms: u64) -> String {
    let at = i64::try_from(ts_ms)
        .ok()
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .unwrap_or_else(Utc::now);
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Feeds published depths into a `DepthJsonSink`, forcing one write for each
/// new venue snapshot.
pub struct DepthDumper {
    sink: DepthJsonSink,
    forced_seq: u64,
}

impl DepthDumper {
    pub fn new(sink: DepthJsonSink) -> Self {
        Self { sink, forced_seq: 0 }
    }

    pub fn sink(&self) -> &DepthJsonSink {
        &self.sink
    }

    pub fn on_published(&mut self, published: &Published) -> SinkResult<bool> {
        let force = published.snapshot_seq != self.forced_seq;
        let written = self.sink.offer(Arc::clone(&published.depth), force)?;
        if force {
            self.forced_seq = published.snapshot_seq;
        }
        Ok(written)
    }

    pub fn flush_pending(&mut self) -> SinkResult<bool> {
        self.sink.flush_pending()
    }
}

/// Write published depths to the JSON sink, subject to its throttle. A
/// throttled depth is written once the interval has passed, and on shutdown.
pub async fn run_depth_sink(
    mut rx: watch::Receiver<Option<Published>>,
    sink: DepthJsonSink,
) -> anyhow::Result<()> {
    let mut dumper = DepthDumper::new(sink);
    loop {
        let flush_in = dumper.sink().pending_due_in();
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let published = rx.borrow_and_update().clone();
                let Some(published) = published else {
                    continue;
                };
                if let Err(e) = dumper.on_published(&published) {
                    warn!(path = %dumper.sink().path().display(), error = %e, "depth dump error");
                }
            }
            _ = tokio::time::sleep(flush_in.unwrap_or_default()), if flush_in.is_some() => {
                if let Err(e) = dumper.flush_pending() {
                    warn!(path = %dumper.sink().path().display(), error = %e, "deferred depth dump error");
                }
            }
        }
    }
    if let Err(e) = dumper.flush_pending() {
        warn!(path = %dumper.sink().path().display(), error = %e, "final depth dump error");
    }
    Ok(())
}
