//! Output events and the batching emitter.
//!
//! Every engine outcome the downstream cares about is one fixed 64-byte
//! record: a trade, an acceptance, or a cancellation. The emitter
//! collects records into a 64-entry batch and publishes whole batches
//! into the SPSC ring; a full ring costs events from the tail of the
//! batch, counted in `messages_dropped`, and never blocks the matcher.

use std::sync::Arc;

use zerocopy::{AsBytes, FromBytes, FromZeroes};

use crate::command::Side;
use crate::ring::SpscRing;

/// Batch size for amortised ring publication.
pub const BATCH_SIZE: usize = 64;

/// Default event ring capacity (power of two).
pub const EVENT_RING_CAPACITY: usize = 1 << 20;

/// Event kind discriminants, also the on-disk/wire tags.
pub const EVENT_TRADE: u8 = b'T';
pub const EVENT_ACCEPTED: u8 = b'A';
pub const EVENT_CANCELLED: u8 = b'C';

/// A single output record, exactly 64 bytes.
///
/// Field use by kind:
/// - `'T'` trade: `id_a` = buy order, `id_b` = sell order, `price`,
///   `quantity`; `side` unused.
/// - `'A'` accepted: `id_a` = order id, `side`, `price`, `quantity`.
/// - `'C'` cancelled: `id_a` = order id, `quantity` = cancelled size.
///
/// Unused fields are zero, so identical inputs produce identical bytes
/// and the log is replay-comparable.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, FromZeroes, FromBytes, AsBytes)]
pub struct EventMsg {
    pub kind: u8,
    pub side: u8,
    pub _pad: [u8; 6],
    pub timestamp: u64,
    pub id_a: u64,
    pub id_b: u64,
    pub price: i64,
    pub quantity: i64,
    pub _reserved: [u8; 16],
}

const _: () = assert!(
    std::mem::size_of::<EventMsg>() == 64,
    "EventMsg must be exactly 64 bytes"
);

impl EventMsg {
    pub const fn zeroed() -> Self {
        Self {
            kind: 0,
            side: 0,
            _pad: [0; 6],
            timestamp: 0,
            id_a: 0,
            id_b: 0,
            price: 0,
            quantity: 0,
            _reserved: [0; 16],
        }
    }

    #[inline]
    pub fn trade(timestamp: u64, buy_id: u64, sell_id: u64, price: i64, quantity: i64) -> Self {
        Self {
            kind: EVENT_TRADE,
            timestamp,
            id_a: buy_id,
            id_b: sell_id,
            price,
            quantity,
            ..Self::zeroed()
        }
    }

    #[inline]
    pub fn accepted(timestamp: u64, order_id: u64, side: Side, price: i64, quantity: i64) -> Self {
        Self {
            kind: EVENT_ACCEPTED,
            side: side.to_byte(),
            timestamp,
            id_a: order_id,
            price,
            quantity,
            ..Self::zeroed()
        }
    }

    #[inline]
    pub fn cancelled(timestamp: u64, order_id: u64, cancelled_qty: i64) -> Self {
        Self {
            kind: EVENT_CANCELLED,
            timestamp,
            id_a: order_id,
            quantity: cancelled_qty,
            ..Self::zeroed()
        }
    }

    #[inline]
    pub fn side(&self) -> Option<Side> {
        Side::from_byte(self.side)
    }
}

/// Collects events into a local batch and publishes into the ring.
pub struct Emitter {
    ring: Arc<SpscRing<EventMsg>>,
    batch: [EventMsg; BATCH_SIZE],
    batch_len: usize,
    timestamp: u64,
    emit_accepts: bool,
    emit_cancels: bool,
    trades_executed: u64,
    messages_dropped: u64,
}

impl Emitter {
    pub fn new() -> Self {
        Self::with_ring_capacity(EVENT_RING_CAPACITY)
    }

    pub fn with_ring_capacity(capacity: usize) -> Self {
        Self {
            ring: Arc::new(SpscRing::with_capacity(capacity)),
            batch: [EventMsg::zeroed(); BATCH_SIZE],
            batch_len: 0,
            timestamp: 0,
            emit_accepts: true,
            emit_cancels: true,
            trades_executed: 0,
            messages_dropped: 0,
        }
    }

    /// Handle for the consumer side of the event stream.
    pub fn ring(&self) -> Arc<SpscRing<EventMsg>> {
        Arc::clone(&self.ring)
    }

    /// Timestamp stamped onto subsequent events (zero in benchmarks).
    #[inline]
    pub fn set_timestamp(&mut self, timestamp: u64) {
        self.timestamp = timestamp;
    }

    pub fn set_emit_accepts(&mut self, enable: bool) {
        self.emit_accepts = enable;
    }

    pub fn set_emit_cancels(&mut self, enable: bool) {
        self.emit_cancels = enable;
    }

    /// Benchmark mode suppresses accept/cancel records. Trades are
    /// never suppressed.
    pub fn set_benchmark_mode(&mut self, trades_only: bool) {
        self.emit_accepts = !trades_only;
        self.emit_cancels = !trades_only;
    }

    #[inline]
    pub fn trade(&mut self, buy_id: u64, sell_id: u64, price: i64, quantity: i64) {
        self.trades_executed += 1;
        let msg = EventMsg::trade(self.timestamp, buy_id, sell_id, price, quantity);
        self.append(msg);
    }

    #[inline]
    pub fn accepted(&mut self, order_id: u64, side: Side, price: i64, quantity: i64) {
        if !self.emit_accepts {
            return;
        }
        let msg = EventMsg::accepted(self.timestamp, order_id, side, price, quantity);
        self.append(msg);
    }

    #[inline]
    pub fn cancelled(&mut self, order_id: u64, cancelled_qty: i64) {
        if !self.emit_cancels {
            return;
        }
        let msg = EventMsg::cancelled(self.timestamp, order_id, cancelled_qty);
        self.append(msg);
    }

    #[inline]
    fn append(&mut self, msg: EventMsg) {
        self.batch[self.batch_len] = msg;
        self.batch_len += 1;
        if self.batch_len == BATCH_SIZE {
            self.flush();
        }
    }

    /// Publish the pending batch. Shortfall is dropped from the tail
    /// and counted; order within the ring is never disturbed.
    pub fn flush(&mut self) {
        if self.batch_len == 0 {
            return;
        }
        let pushed = self.ring.push_batch(&self.batch[..self.batch_len]);
        self.messages_dropped += (self.batch_len - pushed) as u64;
        self.batch_len = 0;
    }

    #[inline]
    pub fn trades_executed(&self) -> u64 {
        self.trades_executed
    }

    #[inline]
    pub fn messages_dropped(&self) -> u64 {
        self.messages_dropped
    }

    #[inline]
    pub fn pending(&self) -> usize {
        self.batch_len
    }
}

impl Default for Emitter {
    fn default() -> Self {
        Self::new()
    }
}
