//! Transfer-level types shared by the TX and RX paths.

use bytes::BytesMut;

use crate::wire::{Priority, TransferKind, NODE_ID_UNSET, TRANSFER_ID_MAX};

/// Microseconds on a caller-defined monotonic clock.
pub type Microsecond = u64;

/// Node-ID; `None` is an anonymous node.
pub type NodeId = Option<u16>;

/// Everything that identifies a transfer apart from its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferMetadata {
    pub priority: Priority,
    pub transfer_kind: TransferKind,

    /// Subject-ID for messages, service-ID for requests and responses.
    pub port_id: u16,

    /// Outgoing: must be `None` for messages and `Some` for service transfers.
    /// Incoming: the sender, or `None` for anonymous messages.
    pub remote_node_id: NodeId,

    /// Masked to 63 bits on transmission.
    pub transfer_id: u64,
}

impl TransferMetadata {
    pub fn message(priority: Priority, subject_id: u16, transfer_id: u64) -> Self {
        Self {
            priority,
            transfer_kind: TransferKind::Message,
            port_id: subject_id,
            remote_node_id: None,
            transfer_id,
        }
    }

    pub fn request(priority: Priority, service_id: u16, server: u16, transfer_id: u64) -> Self {
        Self {
            priority,
            transfer_kind: TransferKind::Request,
            port_id: service_id,
            remote_node_id: Some(server),
            transfer_id,
        }
    }

    pub fn response(priority: Priority, service_id: u16, client: u16, transfer_id: u64) -> Self {
        Self {
            priority,
            transfer_kind: TransferKind::Response,
            port_id: service_id,
            remote_node_id: Some(client),
            transfer_id,
        }
    }
}

/// A transfer reassembled by the RX pipeline.
///
/// The payload buffer came from the instance allocator and now belongs to the
/// caller; hand it back with `Instance::release` when done.
#[derive(Debug)]
pub struct RxTransfer {
    pub metadata: TransferMetadata,

    /// Timestamp of the first frame of the transfer.
    pub timestamp_usec: Microsecond,

    /// At most `extent` bytes; the CRC trailer is never included.
    pub payload: BytesMut,
}

impl RxTransfer {
    pub fn payload_size(&self) -> usize {
        self.payload.len()
    }
}

// ── Node-ID helpers ───────────────────────────────────────────────────────────

pub(crate) fn node_id_to_wire(node_id: NodeId) -> u16 {
    node_id.unwrap_or(NODE_ID_UNSET)
}

pub(crate) fn node_id_from_wire(raw: u16) -> NodeId {
    (raw != NODE_ID_UNSET).then_some(raw)
}

// ── Transfer-ID arithmetic (modulo 2^63) ──────────────────────────────────────

pub(crate) fn transfer_id_mask(transfer_id: u64) -> u64 {
    transfer_id & TRANSFER_ID_MAX
}

pub(crate) fn transfer_id_next(transfer_id: u64) -> u64 {
    transfer_id_mask(transfer_id.wrapping_add(1))
}

/// Forward distance from `b` to `a`: 0 if equal, 1 if `b` is the transfer
/// immediately preceding `a`, large if `b` is ahead of `a`.
pub(crate) fn transfer_id_distance(a: u64, b: u64) -> u64 {
    transfer_id_mask(a.wrapping_sub(b))
}
