//! Read-only depth views for external serialisers.
//!
//! Snapshots iterate populated prices through the bitmaps, so cost is
//! proportional to occupied levels rather than the provisioned tick
//! range. Types derive `Serialize` so dashboard/broadcast layers can
//! encode them without touching book internals.

use serde::Serialize;

use crate::command::Side;
use crate::order_book::Book;

/// One aggregated price level as a consumer sees it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct DepthLevel {
    pub price: i64,
    pub visible_volume: i64,
}

/// Counter bundle for dashboards and health checks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct BookStats {
    pub best_bid: Option<i64>,
    pub best_ask: Option<i64>,
    pub best_bid_volume: i64,
    pub best_ask_volume: i64,
    pub bid_levels: u32,
    pub ask_levels: u32,
    pub active_orders: u64,
    pub trades_executed: u64,
    pub messages_dropped: u64,
}

impl Book {
    /// Top-`max_levels` aggregated view of one side, best first:
    /// descending prices for bids, ascending for asks. Only levels with
    /// exposed volume appear.
    pub fn depth(&self, side: Side, max_levels: usize) -> Vec<DepthLevel> {
        let ladder = if side.is_buy() { &self.bids } else { &self.asks };
        let mut out = Vec::with_capacity(max_levels.min(ladder.level_count() as usize));

        let mut cursor = ladder.best();
        while let Some(price) = cursor {
            if out.len() >= max_levels {
                break;
            }
            let level = ladder.level(price);
            if level.total_visible_volume > 0 {
                out.push(DepthLevel {
                    price,
                    visible_volume: level.total_visible_volume,
                });
            }
            cursor = match side {
                Side::Buy => ladder.next_populated(price - 1),
                Side::Sell => ladder.next_populated(price + 1),
            };
        }
        out
    }

    /// All bid levels, best (highest) first.
    pub fn bids_snapshot(&self) -> Vec<DepthLevel> {
        self.depth(Side::Buy, usize::MAX)
    }

    /// All ask levels, best (lowest) first.
    pub fn asks_snapshot(&self) -> Vec<DepthLevel> {
        self.depth(Side::Sell, usize::MAX)
    }

    pub fn stats(&self) -> BookStats {
        BookStats {
            best_bid: self.best_bid(),
            best_ask: self.best_ask(),
            best_bid_volume: self.best_bid_volume(),
            best_ask_volume: self.best_ask_volume(),
            bid_levels: self.bid_level_count(),
            ask_levels: self.ask_level_count(),
            active_orders: self.active_orders() as u64,
            trades_executed: self.trades_executed(),
            messages_dropped: self.messages_dropped(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_book() -> Book {
        Book::with_tick_range(1 << 16, 1024)
    }

    #[test]
    fn test_snapshots_ordered_best_first() {
        let mut book = small_book();
        book.add_limit(1, Side::Buy, 98, 10, 1);
        book.add_limit(2, Side::Buy, 100, 20, 1);
        book.add_limit(3, Side::Buy, 99, 30, 1);
        book.add_limit(4, Side::Sell, 101, 5, 1);
        book.add_limit(5, Side::Sell, 103, 15, 1);

        let bids = book.bids_snapshot();
        assert_eq!(
            bids,
            vec![
                DepthLevel { price: 100, visible_volume: 20 },
                DepthLevel { price: 99, visible_volume: 30 },
                DepthLevel { price: 98, visible_volume: 10 },
            ]
        );

        let asks = book.asks_snapshot();
        assert_eq!(
            asks,
            vec![
                DepthLevel { price: 101, visible_volume: 5 },
                DepthLevel { price: 103, visible_volume: 15 },
            ]
        );
    }

    #[test]
    fn test_depth_truncates_to_top_n() {
        let mut book = small_book();
        for i in 0..10 {
            book.add_limit(i as u64, Side::Sell, 100 + i, 10, 1);
        }
        let top3 = book.depth(Side::Sell, 3);
        assert_eq!(top3.len(), 3);
        assert_eq!(top3[0].price, 100);
        assert_eq!(top3[2].price, 102);
    }

    #[test]
    fn test_snapshot_aggregates_same_level() {
        let mut book = small_book();
        book.add_limit(1, Side::Buy, 100, 10, 1);
        book.add_limit(2, Side::Buy, 100, 25, 1);

        let bids = book.bids_snapshot();
        assert_eq!(bids.len(), 1);
        assert_eq!(bids[0].visible_volume, 35);
    }

    #[test]
    fn test_snapshot_reports_visible_only() {
        let mut book = small_book();
        book.add_iceberg(1, Side::Sell, 100, 100, 20, 1);

        let asks = book.asks_snapshot();
        assert_eq!(asks[0].visible_volume, 20);
    }

    #[test]
    fn test_empty_book_snapshots() {
        let book = small_book();
        assert!(book.bids_snapshot().is_empty());
        assert!(book.asks_snapshot().is_empty());
    }

    #[test]
    fn test_stats() {
        let mut book = small_book();
        book.add_limit(1, Side::Buy, 100, 10, 1);
        book.add_limit(2, Side::Sell, 101, 5, 1);
        book.add_limit(3, Side::Buy, 101, 5, 1); // trades

        let stats = book.stats();
        assert_eq!(stats.best_bid, Some(100));
        assert_eq!(stats.best_ask, None);
        assert_eq!(stats.bid_levels, 1);
        assert_eq!(stats.ask_levels, 0);
        assert_eq!(stats.active_orders, 1);
        assert_eq!(stats.trades_executed, 1);
        assert_eq!(stats.messages_dropped, 0);
    }
}
