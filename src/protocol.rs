//! Binary wire framing for inbound commands.
//!
//! Little-endian, byte-packed frames as gateways and replay files carry
//! them. Every frame opens with an 11-byte header; the `length` field
//! is the full frame size and must match the type's fixed layout.
//! Structs are `zerocopy`-derived so decode is a bounds-checked cast,
//! no field-by-field parsing.

use zerocopy::{AsBytes, FromBytes, FromZeroes, Unaligned};

use crate::command::{Command, Inbound, Side, Tif};

/// Upper bound on any frame; longer input is malformed.
pub const MAX_FRAME: usize = 1024;

pub const MSG_ADD_ORDER: u8 = b'A';
pub const MSG_ADD_ICEBERG: u8 = b'I';
pub const MSG_ADD_AON: u8 = b'N';
pub const MSG_CANCEL: u8 = b'X';
pub const MSG_MODIFY: u8 = b'M';
pub const MSG_EXECUTE: u8 = b'E';
pub const MSG_HEARTBEAT: u8 = b'H';
pub const MSG_RESET: u8 = b'R';

#[repr(C, packed)]
#[derive(Clone, Copy, Debug, FromZeroes, FromBytes, AsBytes, Unaligned)]
pub struct MsgHeader {
    pub kind: u8,
    pub length: u16,
    pub timestamp: u64,
}

#[repr(C, packed)]
#[derive(Clone, Copy, Debug, FromZeroes, FromBytes, AsBytes, Unaligned)]
pub struct MsgAddOrder {
    pub header: MsgHeader,
    pub order_id: u64,
    pub user_id: u64,
    pub side: u8,
    pub price: i64,
    pub quantity: i64,
}

#[repr(C, packed)]
#[derive(Clone, Copy, Debug, FromZeroes, FromBytes, AsBytes, Unaligned)]
pub struct MsgAddIceberg {
    pub header: MsgHeader,
    pub order_id: u64,
    pub user_id: u64,
    pub side: u8,
    pub price: i64,
    pub total_quantity: i64,
    pub visible_quantity: i64,
}

#[repr(C, packed)]
#[derive(Clone, Copy, Debug, FromZeroes, FromBytes, AsBytes, Unaligned)]
pub struct MsgAddAon {
    pub header: MsgHeader,
    pub order_id: u64,
    pub user_id: u64,
    pub side: u8,
    pub price: i64,
    pub quantity: i64,
}

#[repr(C, packed)]
#[derive(Clone, Copy, Debug, FromZeroes, FromBytes, AsBytes, Unaligned)]
pub struct MsgCancel {
    pub header: MsgHeader,
    pub order_id: u64,
}

#[repr(C, packed)]
#[derive(Clone, Copy, Debug, FromZeroes, FromBytes, AsBytes, Unaligned)]
pub struct MsgModify {
    pub header: MsgHeader,
    pub order_id: u64,
    pub new_price: i64,
    pub new_quantity: i64,
}

#[repr(C, packed)]
#[derive(Clone, Copy, Debug, FromZeroes, FromBytes, AsBytes, Unaligned)]
pub struct MsgExecute {
    pub header: MsgHeader,
    pub order_id: u64,
    pub user_id: u64,
    pub side: u8,
    pub price: i64,
    pub quantity: i64,
    pub time_in_force: u8,
}

#[repr(C, packed)]
#[derive(Clone, Copy, Debug, FromZeroes, FromBytes, AsBytes, Unaligned)]
pub struct MsgHeartbeat {
    pub header: MsgHeader,
}

#[repr(C, packed)]
#[derive(Clone, Copy, Debug, FromZeroes, FromBytes, AsBytes, Unaligned)]
pub struct MsgReset {
    pub header: MsgHeader,
}

const _: () = assert!(std::mem::size_of::<MsgHeader>() == 11);
const _: () = assert!(std::mem::size_of::<MsgAddOrder>() == 44);
const _: () = assert!(std::mem::size_of::<MsgAddIceberg>() == 52);
const _: () = assert!(std::mem::size_of::<MsgAddAon>() == 44);
const _: () = assert!(std::mem::size_of::<MsgCancel>() == 19);
const _: () = assert!(std::mem::size_of::<MsgModify>() == 35);
const _: () = assert!(std::mem::size_of::<MsgExecute>() == 45);
const _: () = assert!(std::mem::size_of::<MsgHeartbeat>() == 11);
const _: () = assert!(std::mem::size_of::<MsgReset>() == 11);

#[inline]
fn header(kind: u8, length: usize, timestamp: u64) -> MsgHeader {
    MsgHeader {
        kind,
        length: length as u16,
        timestamp,
    }
}

impl MsgAddOrder {
    pub fn new(ts: u64, order_id: u64, user_id: u64, side: Side, price: i64, quantity: i64) -> Self {
        Self {
            header: header(MSG_ADD_ORDER, std::mem::size_of::<Self>(), ts),
            order_id,
            user_id,
            side: side.to_byte(),
            price,
            quantity,
        }
    }
}

impl MsgAddIceberg {
    pub fn new(
        ts: u64,
        order_id: u64,
        user_id: u64,
        side: Side,
        price: i64,
        total_quantity: i64,
        visible_quantity: i64,
    ) -> Self {
        Self {
            header: header(MSG_ADD_ICEBERG, std::mem::size_of::<Self>(), ts),
            order_id,
            user_id,
            side: side.to_byte(),
            price,
            total_quantity,
            visible_quantity,
        }
    }
}

impl MsgAddAon {
    pub fn new(ts: u64, order_id: u64, user_id: u64, side: Side, price: i64, quantity: i64) -> Self {
        Self {
            header: header(MSG_ADD_AON, std::mem::size_of::<Self>(), ts),
            order_id,
            user_id,
            side: side.to_byte(),
            price,
            quantity,
        }
    }
}

impl MsgCancel {
    pub fn new(ts: u64, order_id: u64) -> Self {
        Self {
            header: header(MSG_CANCEL, std::mem::size_of::<Self>(), ts),
            order_id,
        }
    }
}

impl MsgModify {
    pub fn new(ts: u64, order_id: u64, new_price: i64, new_quantity: i64) -> Self {
        Self {
            header: header(MSG_MODIFY, std::mem::size_of::<Self>(), ts),
            order_id,
            new_price,
            new_quantity,
        }
    }
}

impl MsgExecute {
    pub fn new(
        ts: u64,
        order_id: u64,
        user_id: u64,
        side: Side,
        price: i64,
        quantity: i64,
        tif: Tif,
    ) -> Self {
        Self {
            header: header(MSG_EXECUTE, std::mem::size_of::<Self>(), ts),
            order_id,
            user_id,
            side: side.to_byte(),
            price,
            quantity,
            time_in_force: tif as u8,
        }
    }

    /// Market buy: limitless price, residue discarded.
    pub fn market_buy(ts: u64, order_id: u64, user_id: u64, quantity: i64) -> Self {
        Self::new(ts, order_id, user_id, Side::Buy, i64::MAX, quantity, Tif::Ioc)
    }

    /// Market sell: floor price, residue discarded.
    pub fn market_sell(ts: u64, order_id: u64, user_id: u64, quantity: i64) -> Self {
        Self::new(ts, order_id, user_id, Side::Sell, 0, quantity, Tif::Ioc)
    }
}

impl MsgHeartbeat {
    pub fn new(ts: u64) -> Self {
        Self {
            header: header(MSG_HEARTBEAT, std::mem::size_of::<Self>(), ts),
        }
    }
}

impl MsgReset {
    pub fn new(ts: u64) -> Self {
        Self {
            header: header(MSG_RESET, std::mem::size_of::<Self>(), ts),
        }
    }
}

/// Decode one frame from the front of `buf`.
///
/// Returns the command plus the frame's byte length so stream readers
/// can advance. `None` means malformed input: truncated buffer, length
/// outside `[header, MAX_FRAME]`, a length that disagrees with the
/// frame type, or an unrecognised kind/side/tif byte.
pub fn decode_frame(buf: &[u8]) -> Option<(Inbound, usize)> {
    let head = MsgHeader::read_from_prefix(buf)?;
    let len = head.length as usize;
    if len < std::mem::size_of::<MsgHeader>() || len > MAX_FRAME || len > buf.len() {
        return None;
    }

    let command = match head.kind {
        MSG_ADD_ORDER => {
            if len != std::mem::size_of::<MsgAddOrder>() {
                return None;
            }
            let msg = MsgAddOrder::read_from_prefix(buf)?;
            Command::AddLimit {
                order_id: msg.order_id,
                side: Side::from_byte(msg.side)?,
                price: msg.price,
                quantity: msg.quantity,
                user_id: msg.user_id as u32,
            }
        }
        MSG_ADD_ICEBERG => {
            if len != std::mem::size_of::<MsgAddIceberg>() {
                return None;
            }
            let msg = MsgAddIceberg::read_from_prefix(buf)?;
            Command::AddIceberg {
                order_id: msg.order_id,
                side: Side::from_byte(msg.side)?,
                price: msg.price,
                total_quantity: msg.total_quantity,
                visible_quantity: msg.visible_quantity,
                user_id: msg.user_id as u32,
            }
        }
        MSG_ADD_AON => {
            if len != std::mem::size_of::<MsgAddAon>() {
                return None;
            }
            let msg = MsgAddAon::read_from_prefix(buf)?;
            Command::AddAon {
                order_id: msg.order_id,
                side: Side::from_byte(msg.side)?,
                price: msg.price,
                quantity: msg.quantity,
                user_id: msg.user_id as u32,
            }
        }
        MSG_CANCEL => {
            if len != std::mem::size_of::<MsgCancel>() {
                return None;
            }
            let msg = MsgCancel::read_from_prefix(buf)?;
            Command::Cancel {
                order_id: msg.order_id,
            }
        }
        MSG_MODIFY => {
            if len != std::mem::size_of::<MsgModify>() {
                return None;
            }
            let msg = MsgModify::read_from_prefix(buf)?;
            Command::Modify {
                order_id: msg.order_id,
                new_price: msg.new_price,
                new_quantity: msg.new_quantity,
            }
        }
        MSG_EXECUTE => {
            if len != std::mem::size_of::<MsgExecute>() {
                return None;
            }
            let msg = MsgExecute::read_from_prefix(buf)?;
            Command::Execute {
                order_id: msg.order_id,
                side: Side::from_byte(msg.side)?,
                price: msg.price,
                quantity: msg.quantity,
                tif: Tif::from_u8(msg.time_in_force)?,
                user_id: msg.user_id as u32,
            }
        }
        MSG_HEARTBEAT => {
            if len != std::mem::size_of::<MsgHeartbeat>() {
                return None;
            }
            Command::Heartbeat
        }
        MSG_RESET => {
            if len != std::mem::size_of::<MsgReset>() {
                return None;
            }
            Command::Reset
        }
        _ => return None,
    };

    Some((
        Inbound {
            timestamp: head.timestamp,
            command,
        },
        len,
    ))
}
