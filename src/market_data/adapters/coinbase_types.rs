// Source: wss://ws-feed.exchange.coinbase.com (level2 / level2_batch channels)
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedMessage {
    Subscriptions {
        #[serde(default)]
        channels: Vec<ChannelAck>,
    },
    Error {
        #[serde(default)]
        message: String,
        #[serde(default)]
        reason: Option<String>,
    },
    Snapshot {
        product_id: String,
        bids: Vec<Value>, // [[price, size]]
        asks: Vec<Value>,
    },
    L2update {
        product_id: String,
        changes: Vec<Value>, // [[side, price, size]], size is the new absolute size
        #[serde(default)]
        time: Option<String>,
    },
    // heartbeats, status, ticker...
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
pub struct ChannelAck {
    pub name: String,
    #[serde(default)]
    pub product_ids: Vec<String>,
}

pub fn subscribe_message(product: &str) -> Value {
    json!({
        "type": "subscribe",
        "product_ids": [product],
        "channels": [
            {"name": "status"},
            {"name": "level2", "product_ids": [product]},
            {"name": "level2_batch", "product_ids": [product]},
        ],
    })
}
