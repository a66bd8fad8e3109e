//! cyphal-udp: the Cyphal/UDP transfer codec and queueing engine.
//!
//! Outgoing transfers are split into frames by [`TxQueue::push`] and drained
//! by the caller in priority order. Incoming datagrams are fed to
//! [`Instance::rx_accept`], which reassembles them into [`RxTransfer`]s for
//! the ports subscribed with [`Instance::rx_subscribe`].
//!
//! The engine does no I/O and keeps no clock: timestamps are supplied by the
//! caller, and every buffer comes from the [`Allocator`] given to the
//! [`Instance`].

pub mod config;
pub mod crc;
pub mod error;
pub mod instance;
pub mod memory;
pub mod rx;
pub mod specifier;
pub mod transfer;
pub mod tx;
pub mod wire;

pub use config::{ConfigError, TransportConfig};
pub use error::{ArgumentError, Error, Result};
pub use instance::Instance;
pub use memory::{Allocator, BudgetAllocator, HeapAllocator};
pub use rx::{RejectReason, RxOutcome, RxSession, RxSubscription};
pub use specifier::{make_session_specifier, SessionSpecifier};
pub use transfer::{Microsecond, NodeId, RxTransfer, TransferMetadata};
pub use tx::{TxItemKey, TxQueue, TxQueueItem};
pub use wire::{FrameHeader, Priority, TransferKind};
