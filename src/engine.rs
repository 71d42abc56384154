//! Engine - access modes, command dispatch and the runtime loop.
//!
//! All book mutation happens on one matching thread. In exclusive mode
//! a readers-writer lock lets an I/O thread (dashboard broadcaster)
//! take consistent snapshots while the feed thread writes. The
//! `_unlocked` entry points skip the lock entirely through `&mut self`,
//! which is the single-threaded replay/benchmark fast path.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::command::{Command, Inbound, Side};
use crate::events::EventMsg;
use crate::order_book::Book;
use crate::ring::SpscRing;
use crate::snapshot::{BookStats, DepthLevel};

pub struct Engine {
    book: RwLock<Book>,
    messages_processed: AtomicU64,
}

impl Engine {
    /// Engine over the full tick space.
    pub fn new(order_capacity: u32) -> Self {
        Self {
            book: RwLock::new(Book::new(order_capacity)),
            messages_processed: AtomicU64::new(0),
        }
    }

    /// Engine over a bounded dense tick range.
    pub fn with_tick_range(price_levels: usize, order_capacity: u32) -> Self {
        Self {
            book: RwLock::new(Book::with_tick_range(price_levels, order_capacity)),
            messages_processed: AtomicU64::new(0),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, Book> {
        // Matching never panics, so poisoning is theoretical; recover
        // rather than propagate.
        match self.book.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Book> {
        match self.book.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    // ========================================================================
    // Command dispatch
    // ========================================================================

    /// Exclusive-mode dispatch: takes the write lock per command.
    pub fn apply(&self, inbound: Inbound) {
        let mut book = self.write();
        Self::dispatch(&mut book, inbound);
        self.messages_processed.fetch_add(1, Ordering::Relaxed);
    }

    /// No-lock dispatch for single-threaded replay: `&mut self` proves
    /// exclusivity statically, so no atomic traffic on the hot path.
    pub fn apply_unlocked(&mut self, inbound: Inbound) {
        let book = match self.book.get_mut() {
            Ok(book) => book,
            Err(poisoned) => poisoned.into_inner(),
        };
        Self::dispatch(book, inbound);
        *self.messages_processed.get_mut() += 1;
    }

    fn dispatch(book: &mut Book, inbound: Inbound) {
        book.set_timestamp(inbound.timestamp);
        match inbound.command {
            Command::AddLimit {
                order_id,
                side,
                price,
                quantity,
                user_id,
            } => book.add_limit(order_id, side, price, quantity, user_id),
            Command::AddIceberg {
                order_id,
                side,
                price,
                total_quantity,
                visible_quantity,
                user_id,
            } => book.add_iceberg(order_id, side, price, total_quantity, visible_quantity, user_id),
            Command::AddAon {
                order_id,
                side,
                price,
                quantity,
                user_id,
            } => book.add_aon(order_id, side, price, quantity, user_id),
            Command::Execute {
                order_id,
                side,
                price,
                quantity,
                tif,
                user_id,
            } => {
                book.execute(order_id, side, price, quantity, tif, user_id);
            }
            // Non-matching commands publish the pending batch so the
            // consumer never waits on a half-filled buffer.
            Command::Cancel { order_id } => {
                book.cancel(order_id);
                book.flush_events();
            }
            Command::Modify {
                order_id,
                new_price,
                new_quantity,
            } => {
                book.modify(order_id, new_price, new_quantity);
                book.flush_events();
            }
            Command::Heartbeat => book.flush_events(),
            Command::Reset => {
                book.reset();
                book.flush_events();
            }
        }
    }

    // ========================================================================
    // Shared-mode observers (read lock)
    // ========================================================================

    pub fn best_bid(&self) -> Option<i64> {
        self.read().best_bid()
    }

    pub fn best_ask(&self) -> Option<i64> {
        self.read().best_ask()
    }

    pub fn best_bid_volume(&self) -> i64 {
        self.read().best_bid_volume()
    }

    pub fn best_ask_volume(&self) -> i64 {
        self.read().best_ask_volume()
    }

    pub fn bids_snapshot(&self) -> Vec<DepthLevel> {
        self.read().bids_snapshot()
    }

    pub fn asks_snapshot(&self) -> Vec<DepthLevel> {
        self.read().asks_snapshot()
    }

    pub fn depth(&self, side: Side, max_levels: usize) -> Vec<DepthLevel> {
        self.read().depth(side, max_levels)
    }

    pub fn stats(&self) -> BookStats {
        self.read().stats()
    }

    pub fn active_orders(&self) -> usize {
        self.read().active_orders()
    }

    pub fn trades_executed(&self) -> u64 {
        self.read().trades_executed()
    }

    pub fn messages_dropped(&self) -> u64 {
        self.read().messages_dropped()
    }

    pub fn messages_processed(&self) -> u64 {
        self.messages_processed.load(Ordering::Relaxed)
    }

    /// Consumer handle for the outbound event stream.
    pub fn events(&self) -> Arc<SpscRing<EventMsg>> {
        self.read().events()
    }

    /// Publish any pending event batch.
    pub fn flush_events(&self) {
        self.write().flush_events();
    }

    /// Direct access for benchmark setup (emit toggles, warm-up) and
    /// replay drivers that own the engine outright.
    pub fn book_mut(&mut self) -> &mut Book {
        match self.book.get_mut() {
            Ok(book) => book,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Pre-fault bulk memory before the first hot command.
    pub fn warm_up(&mut self) {
        self.book_mut().warm_up();
    }

    // ========================================================================
    // Runtime loop
    // ========================================================================

    /// Busy-wait event loop: drain the command ring, publish events,
    /// spin. Runs until the process exits.
    ///
    /// With `pin_to_core` the thread is pinned to the last available
    /// core, which deployments keep clear of OS interrupts.
    #[cfg(feature = "runtime")]
    pub fn run(&self, input: &mut rtrb::Consumer<Inbound>, pin_to_core: bool) {
        if pin_to_core {
            Self::pin_current_thread();
        }

        self.write().warm_up();

        loop {
            let mut processed = false;
            while let Ok(inbound) = input.pop() {
                self.apply(inbound);
                processed = true;
            }
            if processed {
                self.write().flush_events();
            }
            std::hint::spin_loop();
        }
    }

    /// Pin the current thread to the last available CPU core.
    #[cfg(feature = "runtime")]
    pub fn pin_current_thread() {
        if let Some(core_ids) = core_affinity::get_core_ids() {
            if let Some(last) = core_ids.last() {
                core_affinity::set_for_current(*last);
            }
        }
    }
}
