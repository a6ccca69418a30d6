use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Bid,
    Ask,
}

impl Side {
    /// True when `price` is at least as aggressive as `reference` on this side
    /// (higher-or-equal for bids, lower-or-equal for asks).
    pub fn at_least_as_aggressive(self, price: f64, reference: f64) -> bool {
        match self {
            Side::Bid => price >= reference,
            Side::Ask => price <= reference,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Bid => write!(f, "bid"),
            Side::Ask => write!(f, "ask"),
        }
    }
}

/// Resting size at one price. Serialized as a `[price, size]` pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "(f64, f64)", into = "(f64, f64)")]
pub struct Level {
    pub price: f64,
    pub size: f64,
}

impl Level {
    pub fn new(price: f64, size: f64) -> Self {
        Self { price, size }
    }
}

impl From<(f64, f64)> for Level {
    fn from((price, size): (f64, f64)) -> Self {
        Self { price, size }
    }
}

impl From<Level> for (f64, f64) {
    fn from(level: Level) -> Self {
        (level.price, level.size)
    }
}

// Incremental change: `size` is the new absolute size at `price`, 0 removes the level
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LevelUpdate {
    pub side: Side,
    pub price: f64,
    pub size: f64,
}

impl LevelUpdate {
    pub fn new(side: Side, price: f64, size: f64) -> Self {
        Self { side, price, size }
    }

    pub fn bid(price: f64, size: f64) -> Self {
        Self::new(Side::Bid, price, size)
    }

    pub fn ask(price: f64, size: f64) -> Self {
        Self::new(Side::Ask, price, size)
    }

    pub fn is_removal(&self) -> bool {
        self.size <= 0.0
    }
}

/// Best prices plus the two values derived from them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TopOfBook {
    pub best_bid: Option<f64>,
    pub best_ask: Option<f64>,
    pub spread: Option<f64>,
    pub mid: Option<f64>,
}

impl TopOfBook {
    pub fn is_two_sided(&self) -> bool {
        self.best_bid.is_some() && self.best_ask.is_some()
    }
}

/// Top-N depth view handed to sinks.
///
/// Field names match the depth file read by the plotting tools:
/// `{"bids": [[p, s], ..], "asks": [[p, s], ..], "best_bid", "best_ask", "spread", "mid"}`.
/// Absent values serialize as `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DepthSnapshot {
    pub bids: Vec<Level>,
    pub asks: Vec<Level>,
    pub best_bid: Option<f64>,
    pub best_ask: Option<f64>,
    pub spread: Option<f64>,
    pub mid: Option<f64>,
}

impl DepthSnapshot {
    pub fn top_of_book(&self) -> TopOfBook {
        TopOfBook {
            best_bid: self.best_bid,
            best_ask: self.best_ask,
            spread: self.spread,
            mid: self.mid,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BookError {
    #[error("invalid {side} price {price} at entry {index}")]
    InvalidPrice { side: Side, price: f64, index: usize },

    #[error("invalid {side} size {size} at price {price} (entry {index})")]
    InvalidSize {
        side: Side,
        price: f64,
        size: f64,
        index: usize,
    },
}

pub type BookResult<T> = Result<T, BookError>;
