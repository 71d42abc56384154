//! Command types delivered to the matching engine.
//!
//! Gateways and replay loaders decode wire frames into these records;
//! the engine consumes them on the matching thread.

/// Order side (bid = buy, ask = sell)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Side {
    Buy = b'B',
    Sell = b'S',
}

impl Side {
    /// Returns the opposite side
    #[inline]
    pub const fn opposite(self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    #[inline]
    pub const fn is_buy(self) -> bool {
        matches!(self, Side::Buy)
    }

    #[inline]
    pub const fn from_is_buy(is_buy: bool) -> Self {
        if is_buy {
            Side::Buy
        } else {
            Side::Sell
        }
    }

    #[inline]
    pub const fn to_byte(self) -> u8 {
        self as u8
    }

    #[inline]
    pub const fn from_byte(b: u8) -> Option<Self> {
        match b {
            b'B' => Some(Side::Buy),
            b'S' => Some(Side::Sell),
            _ => None,
        }
    }
}

/// Time-in-force: what happens to the unfilled residual of a match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Tif {
    /// Good-till-cancel: residual rests as a plain limit
    #[default]
    Gtc = 0,
    /// Immediate-or-cancel: residual is discarded
    Ioc = 1,
    /// Fill-or-kill: matches only when fully fillable, else no-op
    Fok = 2,
    /// All-or-none: rests as AON when not fully fillable
    Aon = 3,
}

impl Tif {
    #[inline]
    pub const fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Tif::Gtc),
            1 => Some(Tif::Ioc),
            2 => Some(Tif::Fok),
            3 => Some(Tif::Aon),
            _ => None,
        }
    }
}

/// Input commands, one per inbound frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    /// Place a limit order: matches when crossing, rests otherwise
    AddLimit {
        order_id: u64,
        side: Side,
        price: i64,
        quantity: i64,
        user_id: u32,
    },
    /// Rest an iceberg exposing at most `visible_quantity` at a time
    AddIceberg {
        order_id: u64,
        side: Side,
        price: i64,
        total_quantity: i64,
        visible_quantity: i64,
        user_id: u32,
    },
    /// Rest an all-or-none order
    AddAon {
        order_id: u64,
        side: Side,
        price: i64,
        quantity: i64,
        user_id: u32,
    },
    /// Cancel a resting order (silent no-op when unknown)
    Cancel { order_id: u64 },
    /// Downsize in place, or cancel and re-add at a new price/size
    Modify {
        order_id: u64,
        new_price: i64,
        new_quantity: i64,
    },
    /// Run the matcher with an explicit time-in-force
    Execute {
        order_id: u64,
        side: Side,
        price: i64,
        quantity: i64,
        tif: Tif,
        user_id: u32,
    },
    /// Liveness probe; flushes pending events
    Heartbeat,
    /// Clear the book entirely
    Reset,
}

/// A command stamped with the gateway's monotonic timestamp.
#[derive(Clone, Copy, Debug)]
pub struct Inbound {
    pub timestamp: u64,
    pub command: Command,
}
