use tracing::{debug, instrument, trace};

use crate::engine::levels::PriceLevelMap;
use crate::engine::types::{BookError, BookResult, Level, LevelUpdate, Side};
use crate::engine::view::BookView;

/// Reconstructed L2 book for one instrument.
///
/// Holds both sides plus the cached best bid / best ask. The cache is exact
/// whenever a public method returns. A crossed book is a legal state.
#[derive(Debug, Clone, PartialEq)]
pub struct BookState {
    pub(crate) bids: PriceLevelMap,
    pub(crate) asks: PriceLevelMap,
    pub(crate) best_bid: Option<f64>,
    pub(crate) best_ask: Option<f64>,
}

impl Default for BookState {
    fn default() -> Self {
        Self::new()
    }
}

impl BookState {
    pub fn new() -> Self {
        Self {
            bids: PriceLevelMap::new(Side::Bid),
            asks: PriceLevelMap::new(Side::Ask),
            best_bid: None,
            best_ask: None,
        }
    }

    pub fn view(&self) -> BookView<'_> {
        BookView::new(self)
    }

    pub fn bids(&self) -> &PriceLevelMap {
        &self.bids
    }

    pub fn asks(&self) -> &PriceLevelMap {
        &self.asks
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    /// Replace both sides with a full snapshot.
    ///
    /// Levels with size <= 0 are dropped. A non-finite or non-positive price
    /// rejects the whole snapshot and leaves the book as it was.
    #[instrument(level = "debug", skip_all, fields(bids = bids.len(), asks = asks.len()))]
    pub fn apply_snapshot(&mut self, bids: &[Level], asks: &[Level]) -> BookResult<()> {
        for (index, level) in bids.iter().enumerate() {
            validate(Side::Bid, level.price, level.size, index)?;
        }
        for (index, level) in asks.iter().enumerate() {
            validate(Side::Ask, level.price, level.size, index)?;
        }

        self.bids.clear();
        self.asks.clear();

        let mut dropped = 0usize;
        for (map, levels) in [(&mut self.bids, bids), (&mut self.asks, asks)] {
            for level in levels {
                if level.size > 0.0 {
                    map.set(level.price, level.size);
                } else {
                    dropped += 1;
                }
            }
        }
        if dropped > 0 {
            debug!(dropped, "dropped non-positive snapshot levels");
        }

        self.best_bid = self.bids.best();
        self.best_ask = self.asks.best();
        Ok(())
    }

    /// Apply an ordered batch of absolute-size changes.
    ///
    /// The batch is all-or-nothing: every entry is validated before the first
    /// one is applied. Each side's best is recomputed at most once, and only
    /// when some change in the batch could have moved it.
    #[instrument(level = "trace", skip_all, fields(changes = updates.len()))]
    pub fn apply_updates(&mut self, updates: &[LevelUpdate]) -> BookResult<()> {
        for (index, update) in updates.iter().enumerate() {
            validate(update.side, update.price, update.size, index)?;
        }

        let mut stale_bid = false;
        let mut stale_ask = false;

        for update in updates {
            let (map, best, stale) = match update.side {
                Side::Bid => (&mut self.bids, self.best_bid, &mut stale_bid),
                Side::Ask => (&mut self.asks, self.best_ask, &mut stale_ask),
            };
            map.set(update.price, update.size);

            let moves_best = match best {
                None => true,
                Some(best) => update.side.at_least_as_aggressive(update.price, best),
            };
            if moves_best || update.is_removal() {
                *stale = true;
            }
        }

        if stale_bid {
            self.best_bid = self.bids.best();
        }
        if stale_ask {
            self.best_ask = self.asks.best();
        }
        trace!(stale_bid, stale_ask, best_bid = ?self.best_bid, best_ask = ?self.best_ask, "batch applied");
        Ok(())
    }

    pub fn clear(&mut self) {
        self.bids.clear();
        self.asks.clear();
        self.best_bid = None;
        self.best_ask = None;
    }
}

fn validate(side: Side, price: f64, size: f64, index: usize) -> BookResult<()> {
    if !price.is_finite() || price <= 0.0 {
        return Err(BookError::InvalidPrice { side, price, index });
    }
    if !size.is_finite() {
        return Err(BookError::InvalidSize {
            side,
            price,
            size,
            index,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn levels(pairs: &[(f64, f64)]) -> Vec<Level> {
        pairs.iter().map(|&(p, s)| Level::new(p, s)).collect()
    }

    fn scenario_book() -> BookState {
        let mut book = BookState::new();
        book.apply_snapshot(
            &levels(&[(100.0, 1.0), (99.0, 2.0)]),
            &levels(&[(101.0, 1.0), (102.0, 3.0)]),
        )
        .unwrap();
        book
    }

    #[test]
    fn test_new_book_is_empty() {
        let book = BookState::new();
        assert!(book.is_empty());
        assert_eq!(book.view().best_bid(), None);
        assert_eq!(book.view().best_ask(), None);
    }

    #[test]
    fn test_snapshot_sets_bests() {
        let book = scenario_book();
        assert_eq!(book.view().best_bid(), Some(100.0));
        assert_eq!(book.view().best_ask(), Some(101.0));
        assert_eq!(book.bids().len(), 2);
        assert_eq!(book.asks().len(), 2);
    }

    #[test]
    fn test_snapshot_replaces_previous_state() {
        let mut book = scenario_book();
        book.apply_snapshot(&levels(&[(50.0, 1.0)]), &[]).unwrap();
        assert_eq!(book.view().best_bid(), Some(50.0));
        assert_eq!(book.view().best_ask(), None);
        assert_eq!(book.bids().get(100.0), None);
    }

    #[test]
    fn test_snapshot_drops_non_positive_sizes() {
        let mut book = BookState::new();
        book.apply_snapshot(
            &levels(&[(100.0, 0.0), (99.0, 2.0), (98.0, -1.0)]),
            &levels(&[(101.0, 0.0)]),
        )
        .unwrap();
        assert_eq!(book.bids().len(), 1);
        assert_eq!(book.view().best_bid(), Some(99.0));
        assert_eq!(book.view().best_ask(), None);
    }

    #[test]
    fn test_snapshot_is_idempotent() {
        let bids = levels(&[(100.0, 1.0), (99.0, 2.0)]);
        let asks = levels(&[(101.0, 1.0)]);
        let mut book = BookState::new();
        book.apply_snapshot(&bids, &asks).unwrap();
        let first = book.view().to_depth_snapshot(10);
        book.apply_snapshot(&bids, &asks).unwrap();
        assert_eq!(book.view().to_depth_snapshot(10), first);
    }

    #[test]
    fn test_invalid_snapshot_leaves_book_untouched() {
        let mut book = scenario_book();
        let before = book.clone();
        let err = book
            .apply_snapshot(&levels(&[(100.0, 1.0)]), &levels(&[(f64::NAN, 1.0)]))
            .unwrap_err();
        assert!(matches!(err, BookError::InvalidPrice { side: Side::Ask, index: 0, .. }));
        assert_eq!(book, before);
    }

    #[test]
    fn test_removing_best_bid_recomputes() {
        let mut book = scenario_book();
        book.apply_updates(&[LevelUpdate::bid(100.0, 0.0)]).unwrap();
        assert_eq!(book.view().best_bid(), Some(99.0));
    }

    #[test]
    fn test_removing_last_level_vacates_best() {
        let mut book = scenario_book();
        book.apply_updates(&[LevelUpdate::ask(101.0, 0.0), LevelUpdate::ask(102.0, 0.0)])
            .unwrap();
        assert_eq!(book.view().best_ask(), None);
        assert!(book.asks().is_empty());
    }

    #[test]
    fn test_update_below_best_keeps_best() {
        let mut book = scenario_book();
        book.apply_updates(&[LevelUpdate::bid(95.0, 4.0), LevelUpdate::ask(110.0, 4.0)])
            .unwrap();
        assert_eq!(book.view().best_bid(), Some(100.0));
        assert_eq!(book.view().best_ask(), Some(101.0));
        assert_eq!(book.bids().get(95.0), Some(4.0));
    }

    #[test]
    fn test_more_aggressive_update_improves_best() {
        let mut book = scenario_book();
        book.apply_updates(&[LevelUpdate::bid(100.25, 1.0), LevelUpdate::ask(100.75, 1.0)])
            .unwrap();
        assert_eq!(book.view().best_bid(), Some(100.25));
        assert_eq!(book.view().best_ask(), Some(100.75));
    }

    #[test]
    fn test_updates_on_empty_book_set_bests() {
        let mut book = BookState::new();
        book.apply_updates(&[LevelUpdate::bid(10.0, 1.0), LevelUpdate::ask(11.0, 1.0)])
            .unwrap();
        assert_eq!(book.view().best_bid(), Some(10.0));
        assert_eq!(book.view().best_ask(), Some(11.0));
    }

    #[test]
    fn test_crossed_book_is_tolerated() {
        let mut book = scenario_book();
        book.apply_updates(&[LevelUpdate::ask(101.0, 0.0), LevelUpdate::ask(99.5, 5.0)])
            .unwrap();
        assert_eq!(book.view().best_ask(), Some(99.5));
        assert_eq!(book.view().spread(), Some(-0.5));
    }

    #[test]
    fn test_malformed_batch_is_rejected_atomically() {
        let mut book = scenario_book();
        let before = book.clone();
        let batch = [
            LevelUpdate::bid(100.0, 0.0),
            LevelUpdate::ask(101.5, 2.0),
            LevelUpdate::ask(102.0, f64::INFINITY),
        ];
        let err = book.apply_updates(&batch).unwrap_err();
        assert_eq!(
            err,
            BookError::InvalidSize {
                side: Side::Ask,
                price: 102.0,
                size: f64::INFINITY,
                index: 2,
            }
        );
        assert_eq!(book, before);
    }

    #[test]
    fn test_negative_price_rejected() {
        let mut book = BookState::new();
        let err = book.apply_updates(&[LevelUpdate::bid(-1.0, 1.0)]).unwrap_err();
        assert!(matches!(err, BookError::InvalidPrice { side: Side::Bid, .. }));
        assert!(book.is_empty());
    }

    #[test]
    fn test_empty_batch_is_noop() {
        let mut book = scenario_book();
        let before = book.clone();
        book.apply_updates(&[]).unwrap();
        assert_eq!(book, before);
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut book = scenario_book();
        book.clear();
        assert!(book.is_empty());
        assert_eq!(book.view().best_bid(), None);
        assert_eq!(book.view().best_ask(), None);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Snapshot(Vec<(u16, u8)>, Vec<(u16, u8)>),
        Updates(Vec<(bool, u16, u8)>),
    }

    // Small price grid so updates keep hitting existing levels and the best.
    fn price(tick: u16) -> f64 {
        1.0 + f64::from(tick % 64) * 0.5
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        let pair = (any::<u16>(), 0u8..5);
        prop_oneof![
            1 => (
                prop::collection::vec(pair.clone(), 0..12),
                prop::collection::vec(pair, 0..12)
            )
                .prop_map(|(b, a)| Op::Snapshot(b, a)),
            4 => prop::collection::vec((any::<bool>(), any::<u16>(), 0u8..5), 0..16)
                .prop_map(Op::Updates),
        ]
    }

    fn max_key(levels: &[Level]) -> Option<f64> {
        levels.iter().map(|l| l.price).reduce(f64::max)
    }

    fn min_key(levels: &[Level]) -> Option<f64> {
        levels.iter().map(|l| l.price).reduce(f64::min)
    }

    proptest! {
        #[test]
        fn prop_cached_best_matches_map(ops in prop::collection::vec(op_strategy(), 1..40)) {
            let mut book = BookState::new();
            for op in ops {
                match op {
                    Op::Snapshot(b, a) => {
                        let bids: Vec<Level> = b.iter().map(|&(t, s)| Level::new(price(t), f64::from(s))).collect();
                        let asks: Vec<Level> = a.iter().map(|&(t, s)| Level::new(price(t) + 20.0, f64::from(s))).collect();
                        book.apply_snapshot(&bids, &asks).unwrap();
                    }
                    Op::Updates(changes) => {
                        let batch: Vec<LevelUpdate> = changes
                            .iter()
                            .map(|&(is_bid, t, s)| {
                                let side = if is_bid { Side::Bid } else { Side::Ask };
                                LevelUpdate::new(side, price(t), f64::from(s))
                            })
                            .collect();
                        book.apply_updates(&batch).unwrap();
                    }
                }

                let all_bids = book.bids().top(usize::MAX);
                let all_asks = book.asks().top(usize::MAX);
                prop_assert_eq!(book.view().best_bid(), max_key(&all_bids));
                prop_assert_eq!(book.view().best_ask(), min_key(&all_asks));
                prop_assert!(all_bids.iter().chain(all_asks.iter()).all(|l| l.size > 0.0));
            }
        }
    }
}
