use std::sync::Arc;

use parking_lot::Mutex;

use crate::engine::book::BookState;
use crate::engine::types::{BookResult, DepthSnapshot, Level, LevelUpdate, TopOfBook};

/// `BookState` behind a single exclusive lock, for a writer task and reader
/// tasks living on different threads.
///
/// Every method takes the lock exactly once and releases it before returning.
#[derive(Debug, Clone, Default)]
pub struct SharedBook {
    inner: Arc<Mutex<BookState>>,
}

impl SharedBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply_snapshot(&self, bids: &[Level], asks: &[Level]) -> BookResult<()> {
        self.inner.lock().apply_snapshot(bids, asks)
    }

    pub fn apply_updates(&self, updates: &[LevelUpdate]) -> BookResult<()> {
        self.inner.lock().apply_updates(updates)
    }

    pub fn top_of_book(&self) -> TopOfBook {
        self.inner.lock().view().top_of_book()
    }

    pub fn depth_snapshot(&self, n: usize) -> DepthSnapshot {
        self.inner.lock().view().to_depth_snapshot(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_shared_book_round_trip() {
        let book = SharedBook::new();
        book.apply_snapshot(&[Level::new(100.0, 1.0)], &[Level::new(101.0, 2.0)])
            .unwrap();
        book.apply_updates(&[LevelUpdate::bid(100.5, 1.0)]).unwrap();

        let top = book.top_of_book();
        assert_eq!(top.best_bid, Some(100.5));
        assert_eq!(top.spread, Some(0.5));
        assert_eq!(book.depth_snapshot(5).bids.len(), 2);
    }

    #[test]
    fn test_readers_never_observe_stale_best() {
        let book = SharedBook::new();
        book.apply_snapshot(&[Level::new(1.0, 1.0)], &[Level::new(1000.0, 1.0)])
            .unwrap();

        let writer = {
            let book = book.clone();
            thread::spawn(move || {
                for i in 2..500 {
                    let price = f64::from(i);
                    book.apply_updates(&[LevelUpdate::bid(price, 1.0), LevelUpdate::bid(price - 1.0, 0.0)])
                        .unwrap();
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let book = book.clone();
                thread::spawn(move || {
                    for _ in 0..500 {
                        let depth = book.depth_snapshot(1);
                        assert_eq!(depth.bids.first().map(|l| l.price), depth.best_bid);
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(book.top_of_book().best_bid, Some(499.0));
    }
}
