use crate::engine::book::BookState;
use crate::engine::types::{DepthSnapshot, Level, TopOfBook};

/// Read-only queries over a `BookState`.
#[derive(Debug, Clone, Copy)]
pub struct BookView<'a> {
    book: &'a BookState,
}

impl<'a> BookView<'a> {
    pub fn new(book: &'a BookState) -> Self {
        Self { book }
    }

    pub fn best_bid(&self) -> Option<f64> {
        self.book.best_bid
    }

    pub fn best_ask(&self) -> Option<f64> {
        self.book.best_ask
    }

    /// `best_ask - best_bid`; negative when the book is crossed.
    pub fn spread(&self) -> Option<f64> {
        let (bid, ask) = (self.best_bid()?, self.best_ask()?);
        Some(ask - bid)
    }

    pub fn mid(&self) -> Option<f64> {
        let (bid, ask) = (self.best_bid()?, self.best_ask()?);
        Some((bid + ask) / 2.0)
    }

    pub fn top_of_book(&self) -> TopOfBook {
        TopOfBook {
            best_bid: self.best_bid(),
            best_ask: self.best_ask(),
            spread: self.spread(),
            mid: self.mid(),
        }
    }

    /// Up to `n` bids (descending) and up to `n` asks (ascending).
    pub fn top_n(&self, n: usize) -> (Vec<Level>, Vec<Level>) {
        (self.book.bids.top(n), self.book.asks.top(n))
    }

    pub fn to_depth_snapshot(&self, n: usize) -> DepthSnapshot {
        let (bids, asks) = self.top_n(n);
        DepthSnapshot {
            bids,
            asks,
            best_bid: self.best_bid(),
            best_ask: self.best_ask(),
            spread: self.spread(),
            mid: self.mid(),
        }
    }
}
