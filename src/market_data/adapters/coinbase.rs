// Coinbase Exchange level2 streaming adapter: snapshot, then l2update batches

use std::time::{Duration, Instant};

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::{HeaderValue, USER_AGENT};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use super::backoff::ReconnectBackoff;
use super::coinbase_types::{subscribe_message, FeedMessage};
use super::{now_ms, FeedError, FeedResult, MarketEvent, VenueAdapter};
use crate::market_data::normaliser::{parse_changes, parse_levels};
use crate::telemetry;

pub const DEFAULT_WS_URL: &str = "wss://ws-feed.exchange.coinbase.com";

/// A session that stayed up this long resets the reconnect backoff.
const STABLE_SESSION: Duration = Duration::from_secs(30);

pub struct CoinbaseFeed {
    pub product: String,    // e.g. "BTC-USD"
    pub ws_url: String,
    pub idle_timeout: Duration,
}

enum SessionEnd {
    Closed,
    ReceiverGone,
}

impl CoinbaseFeed {
    pub fn new(product: &str, ws_url: &str, idle_timeout: Duration) -> Self {
        Self {
            product: product.to_string(),
            ws_url: ws_url.to_string(),
            idle_timeout,
        }
    }

    /// Turn one text frame into an event for this product, if it carries book data.
    pub fn decode(&self, text: &str) -> FeedResult<Option<MarketEvent>> {
        let event = match serde_json::from_str::<FeedMessage>(text)? {
            FeedMessage::Subscriptions { channels } => {
                let names: Vec<&str> = channels.iter().map(|c| c.name.as_str()).collect();
                info!(channels = ?names, "subscriptions ack");
                None
            }
            FeedMessage::Error { message, reason } => {
                error!(message = %message, reason = ?reason, "feed reported an error");
                None
            }
            FeedMessage::Snapshot { product_id, bids, asks } if product_id == self.product => {
                Some(MarketEvent::Snapshot {
                    symbol: product_id,
                    bids: parse_levels(&bids)?,
                    asks: parse_levels(&asks)?,
                    ts_ms: now_ms(),
                })
            }
            FeedMessage::L2update { product_id, changes, time } if product_id == self.product => {
                Some(MarketEvent::Update {
                    symbol: product_id,
                    changes: parse_changes(&changes)?,
                    ts_ms: time.as_deref().and_then(parse_ts_ms).unwrap_or_else(now_ms),
                })
            }
            _ => None,
        };
        Ok(event)
    }

    async fn run_session(&self, tx: &mpsc::Sender<MarketEvent>) -> FeedResult<SessionEnd> {
        let mut request = self.ws_url.as_str().into_client_request()?;
        request
            .headers_mut()
            .insert(USER_AGENT, HeaderValue::from_static("depthx/0.1"));

        let (ws_stream, response) = tokio_tungstenite::connect_async(request).await?;
        info!(url = %self.ws_url, status = %response.status(), "websocket connected");
        let (mut write, mut read) = ws_stream.split();

        let subscribe = subscribe_message(&self.product);
        write.send(Message::Text(subscribe.to_string())).await?;
        info!(product = %self.product, "subscribe request sent");

        loop {
            let frame = match tokio::time::timeout(self.idle_timeout, read.next()).await {
                Ok(frame) => frame,
                Err(_) => {
                    debug!("idle timeout, sending ping");
                    write.send(Message::Ping(Vec::new())).await?;
                    continue;
                }
            };

            match frame {
                Some(Ok(Message::Text(text))) => match self.decode(&text) {
                    Ok(Some(event)) => {
                        if tx.send(event).await.is_err() {
                            return Ok(SessionEnd::ReceiverGone);
                        }
                    }
                    Ok(None) => {}
                    // drop the whole message, the book stays as it was
                    Err(e) => warn!(error = %e, "dropping malformed feed message"),
                },
                Some(Ok(Message::Close(frame))) => {
                    info!(frame = ?frame, "websocket closed by server");
                    return Ok(SessionEnd::Closed);
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
                None => return Ok(SessionEnd::Closed),
            }
        }
    }
}

fn parse_ts_ms(time: &str) -> Option<u64> {
    let parsed = chrono::DateTime::parse_from_rfc3339(time).ok()?;
    u64::try_from(parsed.timestamp_millis()).ok()
}

#[async_trait::async_trait]
impl VenueAdapter for CoinbaseFeed {
    fn venue(&self) -> &'static str {
        "coinbase"
    }

    async fn run(&self, tx: mpsc::Sender<MarketEvent>) -> FeedResult<()> {
        let mut backoff = ReconnectBackoff::default();
        loop {
            let started = Instant::now();
            match self.run_session(&tx).await {
                Ok(SessionEnd::ReceiverGone) => {
                    info!("event receiver dropped, stopping feed");
                    return Ok(());
                }
                Ok(SessionEnd::Closed) => warn!(product = %self.product, "websocket closed; reconnecting"),
                Err(e) => warn!(product = %self.product, error = %e, "websocket session failed; reconnecting"),
            }

            if started.elapsed() >= STABLE_SESSION {
                backoff.reset();
            }
            let delay = backoff.next_delay();
            metrics::counter!(telemetry::FEED_RECONNECTS).increment(1);
            info!(attempt = backoff.attempt(), delay_ms = delay.as_millis() as u64, "reconnecting");
            tokio::time::sleep(delay).await;
        }
    }
}
