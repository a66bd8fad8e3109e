//! Received frame model: a parsed header plus a borrowed view of the data.

use crate::transfer::{node_id_from_wire, transfer_id_mask, Microsecond, NodeId, TransferMetadata};
use crate::wire::{decode_data_specifier, FrameHeader, Priority, HEADER_VERSION, NODE_ID_UNSET};

/// Why an incoming datagram was dropped before reaching a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RejectReason {
    #[error("datagram shorter than the frame header")]
    TooShort,

    #[error("unsupported header version {0}")]
    UnsupportedVersion(u8),

    #[error("invalid priority {0}")]
    InvalidPriority(u8),

    #[error("header CRC mismatch")]
    HeaderCrcMismatch,

    #[error("service frame with source equal to destination")]
    SourceIsDestination,

    #[error("anonymous frame is not a single-frame transfer")]
    AnonymousMultiFrame,

    #[error("empty frame in a multi-frame transfer")]
    EmptyMultiFrame,

    #[error("frame addressed to node {0}")]
    Misaddressed(u16),
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct RxFrame<'a> {
    /// `remote_node_id` is the source node.
    pub metadata: TransferMetadata,
    pub destination_node_id: NodeId,
    pub timestamp_usec: Microsecond,
    pub frame_index: u32,
    pub start_of_transfer: bool,
    pub end_of_transfer: bool,
    pub payload: &'a [u8],
}

impl<'a> RxFrame<'a> {
    pub fn parse(
        timestamp_usec: Microsecond,
        datagram: &'a [u8],
        verify_header_crc: bool,
    ) -> Result<Self, RejectReason> {
        let (header, payload) = FrameHeader::parse(datagram).ok_or(RejectReason::TooShort)?;

        if header.version < HEADER_VERSION {
            return Err(RejectReason::UnsupportedVersion(header.version));
        }
        let priority = Priority::try_from(header.priority)
            .map_err(|_| RejectReason::InvalidPriority(header.priority))?;
        if verify_header_crc && !header.crc_valid() {
            return Err(RejectReason::HeaderCrcMismatch);
        }

        let (transfer_kind, port_id) = decode_data_specifier(header.data_specifier.get());
        let source = header.source_node_id.get();
        let destination = header.destination_node_id.get();
        if transfer_kind.is_service() && source == destination {
            return Err(RejectReason::SourceIsDestination);
        }

        let start_of_transfer = header.start_of_transfer();
        let end_of_transfer = header.end_of_transfer();
        let single_frame = start_of_transfer && end_of_transfer;
        if source == NODE_ID_UNSET && !single_frame {
            return Err(RejectReason::AnonymousMultiFrame);
        }
        if payload.is_empty() && !single_frame {
            return Err(RejectReason::EmptyMultiFrame);
        }

        Ok(RxFrame {
            metadata: TransferMetadata {
                priority,
                transfer_kind,
                port_id,
                remote_node_id: node_id_from_wire(source),
                transfer_id: transfer_id_mask(header.transfer_id.get()),
            },
            destination_node_id: node_id_from_wire(destination),
            timestamp_usec,
            frame_index: header.frame_index(),
            start_of_transfer,
            end_of_transfer,
            payload,
        })
    }

    pub fn single_frame(&self) -> bool {
        self.start_of_transfer && self.end_of_transfer
    }
}
