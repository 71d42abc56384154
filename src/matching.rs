//! The matching state machine.
//!
//! An aggressive order sweeps opposite levels from the best price
//! toward its limit in price-time priority. FOK and incoming-AON run a
//! read-only feasibility walk first; the sweep then consumes visible
//! liquidity, replenishes icebergs at the level tail, skips AON makers
//! too large for the remaining quantity, and finally resolves the
//! residual per time-in-force.

use crate::arena::{Arena, NULL_INDEX};
use crate::command::{Side, Tif};
use crate::directory::Directory;
use crate::events::Emitter;
use crate::order_book::Book;
use crate::side_book::SideBook;

impl Book {
    /// Run the matcher with an explicit time-in-force. Returns the
    /// number of trades printed.
    pub fn execute(
        &mut self,
        order_id: u64,
        side: Side,
        price: i64,
        quantity: i64,
        tif: Tif,
        user_id: u32,
    ) -> u64 {
        if quantity <= 0 {
            return 0;
        }
        let trades = self.match_incoming(order_id, side, price, quantity, tif, user_id);
        self.check_crossed();
        trades
    }

    pub(crate) fn match_incoming(
        &mut self,
        order_id: u64,
        side: Side,
        price: i64,
        quantity: i64,
        tif: Tif,
        user_id: u32,
    ) -> u64 {
        // TIF pre-checks run before any fill is emitted.
        match tif {
            Tif::Fok => {
                if self.fillable_quantity(side, price, quantity) < quantity {
                    return 0;
                }
            }
            Tif::Aon => {
                if self.fillable_quantity(side, price, quantity) < quantity {
                    self.rest_order(order_id, side, price, quantity, 0, 0, true, user_id);
                    return 0;
                }
            }
            Tif::Gtc | Tif::Ioc => {}
        }

        let is_buy = side.is_buy();
        let (remaining, trades) = {
            let ladder = if is_buy { &mut self.asks } else { &mut self.bids };
            sweep(
                ladder,
                &mut self.arena,
                &mut self.directory,
                &mut self.emitter,
                &mut self.active_orders,
                order_id,
                is_buy,
                price,
                quantity,
            )
        };

        // Residual resolution. IOC/FOK residue never rested, so no
        // cancellation is emitted for it.
        if remaining > 0 {
            match tif {
                Tif::Gtc => self.rest_order(order_id, side, price, remaining, 0, 0, false, user_id),
                Tif::Aon => self.rest_order(order_id, side, price, remaining, 0, 0, true, user_id),
                Tif::Ioc | Tif::Fok => {}
            }
        }

        trades
    }

    /// Quantity an aggressive order could fill right now, under the
    /// same visibility rules the sweep applies. Levels without AON
    /// liquidity contribute in O(1) from their aggregates; mixed levels
    /// walk the FIFO, counting an AON maker only when the running
    /// remainder covers its full size.
    pub(crate) fn fillable_quantity(&self, side: Side, limit_price: i64, incoming_qty: i64) -> i64 {
        let ladder = if side.is_buy() { &self.asks } else { &self.bids };
        let Some(best) = ladder.best() else {
            return 0;
        };

        let mut available = 0i64;
        let mut remaining = incoming_qty;
        let mut scan = best;

        while remaining > 0 {
            let Some(p) = ladder.next_populated(scan) else {
                break;
            };
            let crosses = if side.is_buy() { p <= limit_price } else { p >= limit_price };
            if !crosses {
                break;
            }

            let level = ladder.level(p);
            if level.total_aon_volume == 0 {
                let fillable = remaining.min(level.total_volume);
                available += fillable;
                remaining -= fillable;
            } else {
                let mut curr = level.head;
                while curr != NULL_INDEX && remaining > 0 {
                    let order = self.arena.get(curr);
                    let order_total = order.total_quantity();
                    if order.is_aon() {
                        if remaining >= order_total {
                            available += order_total;
                            remaining -= order_total;
                        }
                    } else {
                        let fillable = remaining.min(order_total);
                        available += fillable;
                        remaining -= fillable;
                    }
                    curr = order.next;
                }
            }

            scan = if side.is_buy() { p + 1 } else { p - 1 };
        }

        available
    }
}

/// The main sweep loop. Returns `(remaining, trade_count)`.
///
/// The cursor re-walks a level that produced fills but did not empty
/// (iceberg refills re-queue at the tail and stay reachable) and steps
/// past a level whose walk produced nothing, which at that point holds
/// only AON makers too large for the remainder; deeper crossing levels
/// stay reachable, keeping the sweep consistent with the feasibility
/// walk.
#[allow(clippy::too_many_arguments)]
fn sweep(
    ladder: &mut SideBook,
    arena: &mut Arena,
    directory: &mut Directory,
    emitter: &mut Emitter,
    active_orders: &mut usize,
    taker_id: u64,
    is_buy: bool,
    limit_price: i64,
    mut remaining: i64,
) -> (i64, u64) {
    let mut trades = 0u64;
    let Some(mut scan) = ladder.best() else {
        return (remaining, 0);
    };

    while remaining > 0 {
        let Some(p) = ladder.next_populated(scan) else {
            break;
        };
        let crosses = if is_buy { p <= limit_price } else { p >= limit_price };
        if !crosses {
            break;
        }

        let before = remaining;
        let mut curr = ladder.level(p).head;

        while curr != NULL_INDEX && remaining > 0 {
            let next = arena.get(curr).next;

            let (maker_id, maker_visible, maker_hidden, maker_aon) = {
                let order = arena.get(curr);
                (
                    order.order_id,
                    order.visible_quantity,
                    order.hidden_quantity,
                    order.is_aon(),
                )
            };

            // AON makers fill whole or not at all; a skip leaves the
            // order in place so a larger taker finds it first.
            if maker_aon && remaining < maker_visible + maker_hidden {
                curr = next;
                continue;
            }

            let trade_qty = remaining.min(maker_visible);
            let (buy_id, sell_id) = if is_buy {
                (taker_id, maker_id)
            } else {
                (maker_id, taker_id)
            };
            // Maker price wins: the print is at the resting price.
            emitter.trade(buy_id, sell_id, p, trade_qty);
            trades += 1;

            remaining -= trade_qty;
            ladder.level_mut(p).adjust_volume(-trade_qty, 0, maker_aon);
            arena.get_mut(curr).visible_quantity -= trade_qty;

            if arena.get(curr).visible_quantity == 0 {
                if maker_hidden > 0 {
                    // Iceberg refill: re-queue at the tail with a fresh
                    // peak, forfeiting within-level time priority.
                    let snapshot = *arena.get(curr);
                    ladder.level_mut(p).remove_order_volume(&snapshot);
                    ladder.level_mut(p).remove(arena, curr);
                    {
                        let order = arena.get_mut(curr);
                        let replenish = if order.peak_size > 0 {
                            order.peak_size.min(order.hidden_quantity)
                        } else {
                            order.hidden_quantity
                        };
                        order.visible_quantity = replenish;
                        order.hidden_quantity -= replenish;
                    }
                    ladder.level_mut(p).push_back(arena, curr);
                    let snapshot = *arena.get(curr);
                    ladder.level_mut(p).add_order_volume(&snapshot);
                    directory.update_pool_idx(maker_id, curr);
                } else {
                    ladder.level_mut(p).remove(arena, curr);
                    directory.deactivate(maker_id);
                    *active_orders -= 1;
                    arena.free(curr);
                }
            }

            curr = next;
        }

        if ladder.level(p).is_empty() {
            ladder.on_level_drained(p);
            scan = p;
        } else if remaining < before {
            // Progress without draining: refilled icebergs sit at the
            // tail, so walk this level again.
            scan = p;
        } else {
            // Nothing tradable here for this taker; move one tick away
            // from the touch.
            scan = if is_buy { p + 1 } else { p - 1 };
        }
    }

    (remaining, trades)
}
