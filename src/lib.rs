//! # flux-lob
//!
//! A deterministic, low-latency limit order book matching engine for a
//! single instrument: price-time priority, iceberg and all-or-none
//! orders, GTC/IOC/FOK/AON time-in-force, and a lossless event stream.
//!
//! ## Design Principles
//!
//! - **Single-Writer**: one thread owns all book mutation; readers take
//!   snapshots through a shared lock or stay out entirely
//! - **Arena Allocation**: 64-byte order nodes recycled through a free
//!   stack; no heap traffic in the matching hot path
//! - **Dense Ladder + Bitmap**: direct-indexed price levels with a
//!   hierarchical occupancy bitmap for O(1)-amortised best-price access
//! - **Batched Events**: trades/accepts/cancels collected 64 at a time
//!   and published into a lock-free SPSC ring
//!
//! ## Architecture
//!
//! ```text
//! [Gateway / Replay] --> [Command Ring] --> [Matching Thread]
//!                                                 |
//!                                      [Event Batch -> SPSC Ring]
//!                                                 |
//!                                        [Consumer / Logger]
//! ```

pub mod arena;
pub mod bitmap;
pub mod command;
pub mod directory;
pub mod engine;
pub mod events;
pub mod logger;
pub mod matching;
pub mod order_book;
pub mod price_level;
pub mod protocol;
pub mod ring;
pub mod side_book;
pub mod snapshot;

// Re-exports for convenience
pub use arena::{Arena, ArenaIndex, Order, NULL_INDEX};
pub use command::{Command, Inbound, Side, Tif};
pub use engine::Engine;
pub use events::{Emitter, EventMsg, BATCH_SIZE, EVENT_RING_CAPACITY};
pub use logger::{EventLogReader, EventLogWriter, FileHeader};
pub use order_book::{Book, MAX_PRICE_LEVELS};
pub use price_level::PriceLevel;
pub use protocol::{decode_frame, MAX_FRAME};
pub use ring::SpscRing;
pub use snapshot::{BookStats, DepthLevel};
