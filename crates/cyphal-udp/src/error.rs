//! Errors surfaced by the transport engine.
//!
//! Protocol noise (malformed frames, CRC mismatches, frames for ports nobody
//! subscribed to, duplicates) is absent here: it is reported as
//! an [`RxOutcome`](crate::rx::RxOutcome), never as an error.

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A caller bug. Detected before any allocation; no side effects.
    #[error("invalid argument: {0}")]
    InvalidArgument(#[from] ArgumentError),

    /// The allocator refused a request, or the TX queue is full.
    #[error("out of memory")]
    OutOfMemory,

    /// A multi-frame transfer arrived with a gap in its frame indices.
    /// The affected transfer has been discarded.
    #[error("out-of-order frame: got index {frame_index}, expected {expected}")]
    OutOfOrder { frame_index: u32, expected: u32 },
}

/// The specific parameter rejected by an `InvalidArgument` error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArgumentError {
    #[error("subject-ID {0} exceeds {}", crate::wire::SUBJECT_ID_MAX)]
    SubjectIdOutOfRange(u16),

    #[error("service-ID {0} exceeds {}", crate::wire::SERVICE_ID_MAX)]
    ServiceIdOutOfRange(u16),

    #[error("node-ID {0} exceeds {}", crate::wire::NODE_ID_MAX)]
    NodeIdOutOfRange(u16),

    #[error("message transfers cannot name a remote node")]
    RemoteNodeOnMessage,

    #[error("service transfers require a remote node")]
    MissingRemoteNode,

    #[error("anonymous nodes cannot send service transfers")]
    AnonymousServiceTransfer,

    #[error("anonymous nodes cannot send multi-frame transfers")]
    AnonymousMultiFrame,

    #[error("MTU of {0} bytes leaves no room after the frame header")]
    MtuTooSmall(usize),
}
