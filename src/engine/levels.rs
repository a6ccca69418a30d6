use std::collections::BTreeMap;

use ordered_float::OrderedFloat;

use crate::engine::types::{Level, Side};

/// Price -> resting size for one side of the book.
///
/// Keys are kept in a `BTreeMap`, so the best price is the last key for bids
/// and the first key for asks. No stored size is ever <= 0.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceLevelMap {
    side: Side,
    levels: BTreeMap<OrderedFloat<f64>, f64>,
}

impl PriceLevelMap {
    pub fn new(side: Side) -> Self {
        Self {
            side,
            levels: BTreeMap::new(),
        }
    }

    /// Insert or overwrite the size at `price`; a size <= 0 removes the level.
    pub fn set(&mut self, price: f64, size: f64) {
        if size <= 0.0 {
            self.levels.remove(&OrderedFloat(price));
        } else {
            self.levels.insert(OrderedFloat(price), size);
        }
    }

    pub fn get(&self, price: f64) -> Option<f64> {
        self.levels.get(&OrderedFloat(price)).copied()
    }

    /// Most aggressive price on this side, O(log n).
    pub fn best(&self) -> Option<f64> {
        let entry = match self.side {
            Side::Bid => self.levels.last_key_value(),
            Side::Ask => self.levels.first_key_value(),
        };
        entry.map(|(price, _)| price.into_inner())
    }

    /// Up to `n` levels, most aggressive first.
    pub fn top(&self, n: usize) -> Vec<Level> {
        match self.side {
            Side::Bid => self.levels.iter().rev().take(n).map(to_level).collect(),
            Side::Ask => self.levels.iter().take(n).map(to_level).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn clear(&mut self) {
        self.levels.clear();
    }
}

fn to_level((price, size): (&OrderedFloat<f64>, &f64)) -> Level {
    Level::new(price.into_inner(), *size)
}
