//! The central limit order book.
//!
//! Owns the arena, both one-sided ladders, the order-id directory and
//! the event emitter. All mutation happens through the command surface
//! below on a single thread; the matching sweep itself lives in
//! `matching.rs`.
//!
//! Every failure mode is silent by design: unknown ids, out-of-range
//! prices and non-positive quantities drop the command without an
//! event. The only diagnostic is the crossed-book check, which reports
//! through the `log` facade and never rolls back.

use std::sync::Arc;

use log::error;

use crate::arena::{Arena, NULL_INDEX};
use crate::command::{Side, Tif};
use crate::directory::Directory;
use crate::events::{Emitter, EventMsg};
use crate::ring::SpscRing;
use crate::side_book::SideBook;

/// Dense tick range provisioned by `Book::new`; covers the full tick
/// space of the instrument.
pub const MAX_PRICE_LEVELS: usize = 1 << 25;

pub struct Book {
    pub(crate) arena: Arena,
    pub(crate) bids: SideBook,
    pub(crate) asks: SideBook,
    pub(crate) directory: Directory,
    pub(crate) emitter: Emitter,
    pub(crate) active_orders: usize,
}

impl Book {
    /// Book over the full tick space. Allocates all bulk memory up
    /// front; see `with_tick_range` for bounded instruments and tests.
    pub fn new(order_capacity: u32) -> Self {
        Self::with_tick_range(MAX_PRICE_LEVELS, order_capacity)
    }

    /// Book over a dense range of `price_levels` ticks starting at 0.
    pub fn with_tick_range(price_levels: usize, order_capacity: u32) -> Self {
        Self {
            arena: Arena::new(order_capacity),
            bids: SideBook::new(Side::Buy, price_levels),
            asks: SideBook::new(Side::Sell, price_levels),
            directory: Directory::new(order_capacity as usize),
            emitter: Emitter::new(),
            active_orders: 0,
        }
    }

    // ========================================================================
    // Command surface (single-threaded; see Engine for the locked wrapper)
    // ========================================================================

    /// Place a limit order: crossing prices route through the matcher
    /// with TIF=GTC, everything else rests.
    pub fn add_limit(&mut self, order_id: u64, side: Side, price: i64, quantity: i64, user_id: u32) {
        if quantity <= 0 {
            return;
        }
        let crossing = match side {
            Side::Buy => self.asks.best().is_some_and(|a| price >= a),
            Side::Sell => self.bids.best().is_some_and(|b| price <= b),
        };
        if crossing {
            self.match_incoming(order_id, side, price, quantity, Tif::Gtc, user_id);
        } else {
            self.rest_order(order_id, side, price, quantity, 0, 0, false, user_id);
        }
        self.check_crossed();
    }

    /// Rest an iceberg: `min(visible, total)` exposed, the remainder
    /// hidden, replenished `visible` at a time. Never matched
    /// aggressively on entry.
    pub fn add_iceberg(
        &mut self,
        order_id: u64,
        side: Side,
        price: i64,
        total_quantity: i64,
        visible_quantity: i64,
        user_id: u32,
    ) {
        if total_quantity <= 0 || visible_quantity <= 0 {
            return;
        }
        let display = visible_quantity.min(total_quantity);
        let hidden = total_quantity - display;
        self.rest_order(order_id, side, price, display, hidden, visible_quantity, false, user_id);
    }

    /// Rest an all-or-none order; it is never partially filled while
    /// resting.
    pub fn add_aon(&mut self, order_id: u64, side: Side, price: i64, quantity: i64, user_id: u32) {
        if quantity <= 0 {
            return;
        }
        self.rest_order(order_id, side, price, quantity, 0, 0, true, user_id);
    }

    /// Cancel a resting order. Unknown or inactive ids are a silent
    /// no-op; otherwise exactly one `Cancelled` event carries the
    /// remaining visible + hidden size.
    pub fn cancel(&mut self, order_id: u64) {
        let Some(loc) = self.directory.get(order_id) else {
            return;
        };
        let (price, pool_idx, is_buy) = (loc.price, loc.pool_idx, loc.is_buy());

        let order = *self.arena.get(pool_idx);
        debug_assert_eq!(order.order_id, order_id);
        let cancelled_qty = order.total_quantity();

        let ladder = if is_buy { &mut self.bids } else { &mut self.asks };
        let level = ladder.level_mut(price);
        level.remove_order_volume(&order);
        level.remove(&mut self.arena, pool_idx);
        self.arena.free(pool_idx);

        if ladder.level(price).is_empty() {
            ladder.on_level_drained(price);
        }

        self.directory.deactivate(order_id);
        self.active_orders -= 1;

        self.emitter.cancelled(order_id, cancelled_qty);
    }

    /// Modify a resting order. Same price with a smaller (positive)
    /// quantity downsizes in place and keeps queue priority; any other
    /// change is a cancel followed by a fresh add (priority lost, and
    /// iceberg/AON character is not preserved). Non-positive sizes
    /// collapse to a plain cancel.
    pub fn modify(&mut self, order_id: u64, new_price: i64, new_quantity: i64) {
        let Some(loc) = self.directory.get(order_id) else {
            return;
        };
        let (price, pool_idx, is_buy) = (loc.price, loc.pool_idx, loc.is_buy());

        if new_quantity <= 0 {
            self.cancel(order_id);
            return;
        }

        let (visible, is_aon, user_id) = {
            let order = self.arena.get(pool_idx);
            (order.visible_quantity, order.is_aon(), order.user_id)
        };

        if new_price == price && new_quantity <= visible {
            let delta = new_quantity - visible;
            let ladder = if is_buy { &mut self.bids } else { &mut self.asks };
            ladder.level_mut(price).adjust_volume(delta, 0, is_aon);
            self.arena.get_mut(pool_idx).visible_quantity = new_quantity;
        } else {
            self.cancel(order_id);
            self.add_limit(
                order_id,
                Side::from_is_buy(is_buy),
                new_price,
                new_quantity,
                user_id,
            );
        }
        self.check_crossed();
    }

    /// Clear all state: ladders, bitmaps, arena and directory. Event
    /// counters and the ring are left untouched.
    pub fn reset(&mut self) {
        self.bids.reset();
        self.asks.reset();
        self.arena.reset();
        self.directory.deactivate_all();
        self.active_orders = 0;
    }

    // ========================================================================
    // Resting internals
    // ========================================================================

    /// Link a new order into its level and directory, emitting the
    /// acceptance. Out-of-range prices drop the order silently.
    pub(crate) fn rest_order(
        &mut self,
        order_id: u64,
        side: Side,
        price: i64,
        visible: i64,
        hidden: i64,
        peak: i64,
        is_aon: bool,
        user_id: u32,
    ) {
        let is_buy = side.is_buy();
        let ladder = if is_buy { &mut self.bids } else { &mut self.asks };
        if !ladder.in_range(price) {
            return;
        }
        let was_empty = ladder.level(price).is_empty();

        let idx = self.arena.alloc();
        {
            let order = self.arena.get_mut(idx);
            order.order_id = order_id;
            order.user_id = user_id;
            order.price = price;
            order.visible_quantity = visible;
            order.hidden_quantity = hidden;
            order.peak_size = peak;
            order.flags = 0;
            order.set_buy(is_buy);
            order.set_aon(is_aon);
            order.next = NULL_INDEX;
            order.prev = NULL_INDEX;
        }

        ladder.level_mut(price).push_back(&mut self.arena, idx);
        let order = *self.arena.get(idx);
        ladder.level_mut(price).add_order_volume(&order);

        if was_empty {
            ladder.on_level_populated(price);
        }

        self.directory.ensure_capacity(order_id);
        self.directory.insert(order_id, price, idx, is_buy);
        self.active_orders += 1;

        self.emitter.accepted(order_id, side, price, visible);
    }

    /// Crossed-book diagnostic. A locked book (bid == ask) is a legal
    /// consequence of resting AON liquidity; strictly crossed is a
    /// state-maintenance bug and is reported, not rolled back.
    pub(crate) fn check_crossed(&self) {
        if let (Some(bid), Some(ask)) = (self.bids.best(), self.asks.best()) {
            if bid > ask {
                error!("crossed book detected: best_bid={bid} best_ask={ask}");
            }
        }
    }

    // ========================================================================
    // Observers
    // ========================================================================

    #[inline]
    pub fn best_bid(&self) -> Option<i64> {
        self.bids.best()
    }

    #[inline]
    pub fn best_ask(&self) -> Option<i64> {
        self.asks.best()
    }

    /// Visible volume resting at the best bid, 0 when that side is empty.
    pub fn best_bid_volume(&self) -> i64 {
        self.bids
            .best()
            .map_or(0, |p| self.bids.level(p).total_visible_volume)
    }

    /// Visible volume resting at the best ask, 0 when that side is empty.
    pub fn best_ask_volume(&self) -> i64 {
        self.asks
            .best()
            .map_or(0, |p| self.asks.level(p).total_visible_volume)
    }

    #[inline]
    pub fn active_orders(&self) -> usize {
        self.active_orders
    }

    #[inline]
    pub fn bid_level_count(&self) -> u32 {
        self.bids.level_count()
    }

    #[inline]
    pub fn ask_level_count(&self) -> u32 {
        self.asks.level_count()
    }

    #[inline]
    pub fn trades_executed(&self) -> u64 {
        self.emitter.trades_executed()
    }

    #[inline]
    pub fn messages_dropped(&self) -> u64 {
        self.emitter.messages_dropped()
    }

    #[inline]
    pub fn pool_capacity(&self) -> usize {
        self.arena.capacity()
    }

    #[inline]
    pub fn pool_in_use(&self) -> usize {
        self.arena.in_use()
    }

    /// Consumer handle for the outbound event stream.
    pub fn events(&self) -> Arc<SpscRing<EventMsg>> {
        self.emitter.ring()
    }

    /// Timestamp stamped onto subsequent events.
    #[inline]
    pub fn set_timestamp(&mut self, timestamp: u64) {
        self.emitter.set_timestamp(timestamp);
    }

    /// Publish any partially filled event batch.
    pub fn flush_events(&mut self) {
        self.emitter.flush();
    }

    pub fn set_emit_accepts(&mut self, enable: bool) {
        self.emitter.set_emit_accepts(enable);
    }

    pub fn set_emit_cancels(&mut self, enable: bool) {
        self.emitter.set_emit_cancels(enable);
    }

    pub fn set_benchmark_mode(&mut self, trades_only: bool) {
        self.emitter.set_benchmark_mode(trades_only);
    }

    /// Pre-fault the arena slab.
    pub fn warm_up(&mut self) {
        self.arena.warm_up();
    }

    /// Walk the full structure and assert every bookkeeping invariant:
    /// uncrossed (or at most locked) book, bitmap/level agreement,
    /// aggregate sums, FIFO link integrity, directory round-trips and
    /// the active-order count. O(book size); a test and diagnostics
    /// aid, never called on the hot path.
    ///
    /// # Panics
    /// Panics on the first violated invariant.
    pub fn verify_integrity(&self) {
        if let (Some(bid), Some(ask)) = (self.bids.best(), self.asks.best()) {
            assert!(bid <= ask, "crossed book: bid {bid} > ask {ask}");
        }

        let mut total_active = 0usize;
        for ladder in [&self.bids, &self.asks] {
            // Best is the extremum over all populated prices.
            let extremum = match ladder.side() {
                Side::Buy => ladder.next_populated(ladder.num_levels() as i64 - 1),
                Side::Sell => ladder.next_populated(0),
            };
            assert_eq!(ladder.best(), extremum, "cached best is stale");

            let mut populated = 0u32;
            let mut cursor = ladder.best();
            while let Some(price) = cursor {
                let level = ladder.level(price);
                assert!(!level.is_empty(), "bitmap marks an empty level at {price}");
                assert!(ladder.is_marked(price));
                populated += 1;

                let mut visible = 0i64;
                let mut hidden = 0i64;
                let mut aon = 0i64;
                let mut count = 0u32;
                let mut curr = level.head;
                let mut prev = NULL_INDEX;
                while curr != NULL_INDEX {
                    let order = self.arena.get(curr);
                    assert_eq!(order.prev, prev, "FIFO back-link broken at {price}");
                    assert_eq!(order.price, price);
                    assert_eq!(order.is_buy(), ladder.side().is_buy());
                    assert!(order.visible_quantity > 0);

                    let loc = self
                        .directory
                        .get(order.order_id)
                        .expect("resting order missing from directory");
                    assert_eq!(loc.pool_idx, curr, "directory points at a stale slot");
                    assert_eq!(loc.price, price);
                    assert_eq!(loc.is_buy(), order.is_buy());

                    visible += order.visible_quantity;
                    hidden += order.hidden_quantity;
                    if order.is_aon() {
                        aon += order.total_quantity();
                    }
                    count += 1;
                    prev = curr;
                    curr = order.next;
                }
                assert_eq!(level.tail, prev, "FIFO tail is stale at {price}");
                assert_eq!(level.count, count);
                assert_eq!(level.total_visible_volume, visible);
                assert_eq!(level.total_volume, visible + hidden);
                assert_eq!(level.total_aon_volume, aon);
                assert_eq!(
                    level.total_aon_volume + level.total_non_aon_volume,
                    level.total_volume
                );

                total_active += count as usize;
                cursor = match ladder.side() {
                    Side::Buy => ladder.next_populated(price - 1),
                    Side::Sell => ladder.next_populated(price + 1),
                };
            }
            assert_eq!(ladder.level_count(), populated, "level count is stale");

            // Converse of the bitmap invariant: no unmarked non-empty
            // level. A full scan, so only affordable on bounded books.
            if ladder.num_levels() <= 1 << 20 {
                for price in 0..ladder.num_levels() as i64 {
                    assert_eq!(
                        ladder.is_marked(price),
                        !ladder.level(price).is_empty(),
                        "bitmap disagrees with level at {price}"
                    );
                }
            }
        }

        assert_eq!(total_active, self.active_orders, "active-order count is stale");
        assert_eq!(total_active, self.arena.in_use(), "arena leak or double-use");
    }
}

impl std::fmt::Debug for Book {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Book")
            .field("best_bid", &self.bids.best())
            .field("best_ask", &self.asks.best())
            .field("bid_levels", &self.bids.level_count())
            .field("ask_levels", &self.asks.level_count())
            .field("active_orders", &self.active_orders)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_book() -> Book {
        Book::with_tick_range(1 << 16, 1024)
    }

    fn drain_events(book: &mut Book) -> Vec<EventMsg> {
        book.flush_events();
        let ring = book.events();
        let mut out = Vec::new();
        while let Some(msg) = ring.pop() {
            out.push(msg);
        }
        out
    }

    #[test]
    fn test_empty_book() {
        let book = small_book();
        assert_eq!(book.best_bid(), None);
        assert_eq!(book.best_ask(), None);
        assert_eq!(book.active_orders(), 0);
        assert_eq!(book.best_bid_volume(), 0);
        assert_eq!(book.best_ask_volume(), 0);
    }

    #[test]
    fn test_rest_bid_and_ask() {
        let mut book = small_book();
        book.add_limit(1, Side::Buy, 100, 10, 1);
        book.add_limit(2, Side::Sell, 105, 7, 1);

        assert_eq!(book.best_bid(), Some(100));
        assert_eq!(book.best_ask(), Some(105));
        assert_eq!(book.best_bid_volume(), 10);
        assert_eq!(book.best_ask_volume(), 7);
        assert_eq!(book.active_orders(), 2);
        assert_eq!(book.bid_level_count(), 1);
        assert_eq!(book.ask_level_count(), 1);

        let events = drain_events(&mut book);
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.kind == crate::events::EVENT_ACCEPTED));
    }

    #[test]
    fn test_cancel_restores_empty_side() {
        let mut book = small_book();
        book.add_limit(1, Side::Buy, 100, 10, 1);
        book.cancel(1);

        assert_eq!(book.best_bid(), None);
        assert_eq!(book.active_orders(), 0);
        assert_eq!(book.bid_level_count(), 0);
        assert_eq!(book.pool_in_use(), 0);

        let events = drain_events(&mut book);
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].kind, crate::events::EVENT_CANCELLED);
        assert_eq!(events[1].quantity, 10);
    }

    #[test]
    fn test_cancel_unknown_is_silent() {
        let mut book = small_book();
        book.cancel(42);
        book.add_limit(1, Side::Buy, 100, 10, 1);
        book.cancel(1);
        book.cancel(1); // already inactive

        assert_eq!(book.active_orders(), 0);
        let events = drain_events(&mut book);
        // one accept + one cancel only
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn test_cancel_iceberg_returns_hidden_too() {
        let mut book = small_book();
        book.add_iceberg(5, Side::Sell, 200, 100, 20, 1);
        assert_eq!(book.best_ask_volume(), 20);

        book.cancel(5);
        let events = drain_events(&mut book);
        let cancel = events.last().unwrap();
        assert_eq!(cancel.kind, crate::events::EVENT_CANCELLED);
        assert_eq!(cancel.quantity, 100); // visible 20 + hidden 80
    }

    #[test]
    fn test_out_of_range_price_dropped() {
        let mut book = small_book();
        book.add_limit(1, Side::Buy, -5, 10, 1);
        book.add_limit(2, Side::Buy, 1 << 20, 10, 1);
        assert_eq!(book.active_orders(), 0);
        assert!(drain_events(&mut book).is_empty());
    }

    #[test]
    fn test_non_positive_quantity_dropped() {
        let mut book = small_book();
        book.add_limit(1, Side::Buy, 100, 0, 1);
        book.add_limit(2, Side::Sell, 100, -3, 1);
        book.add_aon(3, Side::Buy, 100, 0, 1);
        book.add_iceberg(4, Side::Sell, 100, 0, 10, 1);
        assert_eq!(book.active_orders(), 0);
    }

    #[test]
    fn test_modify_downsize_keeps_position() {
        let mut book = small_book();
        book.add_limit(10, Side::Buy, 100, 5, 1);
        book.add_limit(11, Side::Buy, 100, 5, 1);

        book.modify(10, 100, 3);

        // id=10 still heads the queue: a crossing sell hits it first
        book.add_limit(12, Side::Sell, 100, 3, 2);
        let events = drain_events(&mut book);
        let trade = events
            .iter()
            .find(|e| e.kind == crate::events::EVENT_TRADE)
            .unwrap();
        assert_eq!(trade.id_a, 10);
        assert_eq!(trade.quantity, 3);
    }

    #[test]
    fn test_modify_reprice_loses_position() {
        let mut book = small_book();
        book.add_limit(10, Side::Buy, 100, 5, 1);
        book.add_limit(11, Side::Buy, 100, 5, 1);

        book.modify(10, 101, 3);

        assert_eq!(book.best_bid(), Some(101));
        assert_eq!(book.bids.level(100).count, 1);
        assert_eq!(book.bids.level(100).total_visible_volume, 5);
        assert_eq!(book.bids.level(101).total_visible_volume, 3);
    }

    #[test]
    fn test_modify_upsize_is_cancel_readd() {
        let mut book = small_book();
        book.add_limit(10, Side::Buy, 100, 5, 1);
        book.add_limit(11, Side::Buy, 100, 5, 1);

        book.modify(10, 100, 9);

        // id=10 moved to the back of the queue
        book.add_limit(12, Side::Sell, 100, 5, 2);
        let events = drain_events(&mut book);
        let trade = events
            .iter()
            .find(|e| e.kind == crate::events::EVENT_TRADE)
            .unwrap();
        assert_eq!(trade.id_a, 11);
    }

    #[test]
    fn test_modify_unknown_is_silent() {
        let mut book = small_book();
        book.modify(77, 100, 5);
        assert_eq!(book.active_orders(), 0);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut book = small_book();
        for i in 0..50u64 {
            book.add_limit(i, Side::Buy, 90 + (i as i64 % 5), 10, 1);
            book.add_limit(100 + i, Side::Sell, 110 + (i as i64 % 5), 10, 1);
        }
        book.reset();

        assert_eq!(book.best_bid(), None);
        assert_eq!(book.best_ask(), None);
        assert_eq!(book.active_orders(), 0);
        assert_eq!(book.bid_level_count(), 0);
        assert_eq!(book.ask_level_count(), 0);
        assert_eq!(book.pool_in_use(), 0);

        // Ids from before the reset are gone
        book.cancel(3);
        book.flush_events();

        // The book is immediately usable again
        book.add_limit(1, Side::Buy, 100, 10, 1);
        assert_eq!(book.best_bid(), Some(100));
    }
}
