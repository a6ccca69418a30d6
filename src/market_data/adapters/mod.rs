// Shared trait + event for market data adapters

use thiserror::Error;
use tokio::sync::mpsc;

use crate::engine::types::{Level, LevelUpdate};
use crate::market_data::normaliser::NormaliseError;

/// Venue-neutral feed output, already parsed into typed levels.
#[derive(Debug, Clone, PartialEq)]
pub enum MarketEvent {
    // Full replacement of both sides
    Snapshot {
        symbol: String,
        bids: Vec<Level>,
        asks: Vec<Level>,
        ts_ms: u64,
    },
    // Ordered absolute-size changes, applied as one batch
    Update {
        symbol: String,
        changes: Vec<LevelUpdate>,
        ts_ms: u64,
    },
}

impl MarketEvent {
    pub fn symbol(&self) -> &str {
        match self {
            MarketEvent::Snapshot { symbol, .. } | MarketEvent::Update { symbol, .. } => symbol,
        }
    }
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("malformed json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed level data: {0}")]
    Normalise(#[from] NormaliseError),

    #[error("{venue} reported an error: {message}")]
    Venue { venue: &'static str, message: String },
}

pub type FeedResult<T> = Result<T, FeedError>;

#[async_trait::async_trait]
pub trait VenueAdapter: Send + Sync {
    /// Short venue label used in logs and CSV rows.
    fn venue(&self) -> &'static str;

    /// Push events into `tx` until the receiver goes away. Transient transport
    /// failures are handled inside; only unrecoverable setup errors return `Err`.
    async fn run(&self, tx: mpsc::Sender<MarketEvent>) -> FeedResult<()>;
}

pub(crate) fn now_ms() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or_default()
}

pub mod backoff;
pub mod coinbase;
pub mod coinbase_types;
pub mod rest;
