//! One-sided ladder: dense price levels, occupancy bitmap, cached best.
//!
//! Prices are direct indices into the level array. The bitmap tracks
//! which levels are non-empty so best-price recovery after a drain and
//! populated-level iteration never touch empty ticks.

use crate::bitmap::Bitmap;
use crate::command::Side;
use crate::price_level::PriceLevel;

pub struct SideBook {
    side: Side,
    levels: Vec<PriceLevel>,
    bitmap: Bitmap,
    best: Option<i64>,
    /// Bitmap word holding the current best; recovery searches start here.
    best_word: usize,
    level_count: u32,
}

impl SideBook {
    pub fn new(side: Side, num_levels: usize) -> Self {
        assert!(num_levels > 0, "ladder needs at least one tick");
        Self {
            side,
            levels: vec![PriceLevel::new(); num_levels],
            bitmap: Bitmap::new(num_levels),
            best: None,
            best_word: 0,
            level_count: 0,
        }
    }

    #[inline]
    pub fn side(&self) -> Side {
        self.side
    }

    #[inline]
    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    /// True when `price` addresses a provisioned tick.
    #[inline]
    pub fn in_range(&self, price: i64) -> bool {
        price >= 0 && (price as usize) < self.levels.len()
    }

    #[inline]
    pub fn level(&self, price: i64) -> &PriceLevel {
        &self.levels[price as usize]
    }

    #[inline]
    pub fn level_mut(&mut self, price: i64) -> &mut PriceLevel {
        &mut self.levels[price as usize]
    }

    /// Highest populated bid / lowest populated ask, `None` when empty.
    #[inline]
    pub fn best(&self) -> Option<i64> {
        self.best
    }

    #[inline]
    pub fn level_count(&self) -> u32 {
        self.level_count
    }

    /// Record that the level at `price` went from empty to populated.
    /// Sets the occupancy bit and advances the cached best when the new
    /// price strictly improves it.
    pub fn on_level_populated(&mut self, price: i64) {
        let idx = price as usize;
        self.bitmap.set(idx);
        self.level_count += 1;

        let improves = match self.side {
            Side::Buy => self.best.map_or(true, |b| price > b),
            Side::Sell => self.best.map_or(true, |b| price < b),
        };
        if improves {
            self.best = Some(price);
            self.best_word = idx / 64;
        }
    }

    /// Record that the level at `price` just emptied. Clears the bit
    /// and, when the best drained, re-searches the bitmap starting at
    /// the cached word - downward for bids, upward for asks.
    pub fn on_level_drained(&mut self, price: i64) {
        let idx = price as usize;
        debug_assert!(self.levels[idx].is_empty());
        self.bitmap.clear(idx);
        self.level_count -= 1;

        if self.best == Some(price) {
            self.best = match self.side {
                Side::Buy => self.bitmap.find_highest_at_or_below(idx),
                Side::Sell => self.bitmap.find_lowest_at_or_above(idx),
            }
            .map(|i| i as i64);
            self.best_word = self.best.map_or(0, |b| b as usize / 64);
        }
    }

    /// Most aggressive populated price at or beyond `from`, moving away
    /// from the touch: upward for asks, downward for bids. Drives the
    /// sweep cursor and snapshot iteration.
    #[inline]
    pub fn next_populated(&self, from: i64) -> Option<i64> {
        match self.side {
            Side::Buy => {
                if from < 0 {
                    return None;
                }
                self.bitmap
                    .find_highest_at_or_below(from as usize)
                    .map(|i| i as i64)
            }
            Side::Sell => {
                if from < 0 {
                    return None;
                }
                self.bitmap
                    .find_lowest_at_or_above(from as usize)
                    .map(|i| i as i64)
            }
        }
    }

    /// Occupancy bit for `price` (integrity checks).
    #[inline]
    pub(crate) fn is_marked(&self, price: i64) -> bool {
        self.bitmap.test(price as usize)
    }

    /// Clear every populated level. Walks the bitmap rather than the
    /// full tick range, so the cost is proportional to occupancy.
    pub fn reset(&mut self) {
        let mut cursor = match self.side {
            Side::Buy => self.bitmap.find_highest_at_or_below(self.levels.len() - 1),
            Side::Sell => self.bitmap.find_lowest_at_or_above(0),
        };
        while let Some(idx) = cursor {
            self.levels[idx].reset();
            cursor = match self.side {
                Side::Buy => idx
                    .checked_sub(1)
                    .and_then(|i| self.bitmap.find_highest_at_or_below(i)),
                Side::Sell => self.bitmap.find_lowest_at_or_above(idx + 1),
            };
        }
        self.bitmap.clear_all();
        self.best = None;
        self.best_word = 0;
        self.level_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Arena;

    fn populate(book: &mut SideBook, arena: &mut Arena, price: i64, qty: i64) {
        let idx = arena.alloc();
        {
            let order = arena.get_mut(idx);
            order.price = price;
            order.visible_quantity = qty;
        }
        let was_empty = book.level(price).is_empty();
        let level = book.level_mut(price);
        level.push_back(arena, idx);
        let order = *arena.get(idx);
        book.level_mut(price).add_order_volume(&order);
        if was_empty {
            book.on_level_populated(price);
        }
    }

    fn drain(book: &mut SideBook, arena: &mut Arena, price: i64) {
        while !book.level(price).is_empty() {
            let head = book.level(price).head;
            let order = *arena.get(head);
            book.level_mut(price).remove_order_volume(&order);
            book.level_mut(price).remove(arena, head);
            arena.free(head);
        }
        book.on_level_drained(price);
    }

    #[test]
    fn test_bid_best_tracking() {
        let mut arena = Arena::new(16);
        let mut bids = SideBook::new(Side::Buy, 1 << 12);
        assert_eq!(bids.best(), None);

        populate(&mut bids, &mut arena, 100, 10);
        assert_eq!(bids.best(), Some(100));

        populate(&mut bids, &mut arena, 105, 10);
        assert_eq!(bids.best(), Some(105)); // higher improves bids

        populate(&mut bids, &mut arena, 95, 10);
        assert_eq!(bids.best(), Some(105));
        assert_eq!(bids.level_count(), 3);

        drain(&mut bids, &mut arena, 105);
        assert_eq!(bids.best(), Some(100));
        assert_eq!(bids.level_count(), 2);

        drain(&mut bids, &mut arena, 100);
        drain(&mut bids, &mut arena, 95);
        assert_eq!(bids.best(), None);
        assert_eq!(bids.level_count(), 0);
    }

    #[test]
    fn test_ask_best_tracking() {
        let mut arena = Arena::new(16);
        let mut asks = SideBook::new(Side::Sell, 1 << 12);

        populate(&mut asks, &mut arena, 200, 10);
        populate(&mut asks, &mut arena, 190, 10);
        populate(&mut asks, &mut arena, 210, 10);
        assert_eq!(asks.best(), Some(190)); // lower improves asks

        drain(&mut asks, &mut arena, 190);
        assert_eq!(asks.best(), Some(200));
    }

    #[test]
    fn test_drain_non_best_keeps_best() {
        let mut arena = Arena::new(16);
        let mut asks = SideBook::new(Side::Sell, 1 << 12);
        populate(&mut asks, &mut arena, 100, 10);
        populate(&mut asks, &mut arena, 110, 10);

        drain(&mut asks, &mut arena, 110);
        assert_eq!(asks.best(), Some(100));
        assert_eq!(asks.level_count(), 1);
    }

    #[test]
    fn test_next_populated_walks_in_sweep_direction() {
        let mut arena = Arena::new(16);
        let mut asks = SideBook::new(Side::Sell, 1 << 12);
        populate(&mut asks, &mut arena, 100, 10);
        populate(&mut asks, &mut arena, 150, 10);

        assert_eq!(asks.next_populated(0), Some(100));
        assert_eq!(asks.next_populated(101), Some(150));
        assert_eq!(asks.next_populated(151), None);

        let mut bids = SideBook::new(Side::Buy, 1 << 12);
        populate(&mut bids, &mut arena, 100, 10);
        populate(&mut bids, &mut arena, 150, 10);

        assert_eq!(bids.next_populated(4095), Some(150));
        assert_eq!(bids.next_populated(149), Some(100));
        assert_eq!(bids.next_populated(99), None);
        assert_eq!(bids.next_populated(-1), None);
    }

    #[test]
    fn test_reset() {
        let mut arena = Arena::new(16);
        let mut bids = SideBook::new(Side::Buy, 1 << 12);
        populate(&mut bids, &mut arena, 10, 5);
        populate(&mut bids, &mut arena, 20, 5);

        bids.reset();
        assert_eq!(bids.best(), None);
        assert_eq!(bids.level_count(), 0);
        assert!(bids.level(10).is_empty());
        assert_eq!(bids.level(10).total_volume, 0);
        assert_eq!(bids.next_populated(4095), None);
    }
}
