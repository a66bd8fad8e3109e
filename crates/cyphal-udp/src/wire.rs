//! Cyphal/UDP wire format: the frame header and its field encodings.
//!
//! Every datagram starts with the same 24-byte header; multi-byte fields are
//! little-endian. `FrameHeader` is #[repr(C)] over unaligned zerocopy
//! byteorder types, so it maps onto the datagram bytes directly and needs
//! no unsafe code.

use static_assertions::assert_eq_size;
use zerocopy::byteorder::{LittleEndian, U16, U32, U64};
use zerocopy::{AsBytes, FromBytes, FromZeroes, Unaligned};

use crate::crc;

// ── Constants ─────────────────────────────────────────────────────────────────

/// Header format version written by this implementation.
pub const HEADER_VERSION: u8 = 1;

/// Size of the frame header in bytes.
pub const HEADER_SIZE: usize = 24;

/// Bytes covered by the header CRC (everything before the CRC field).
pub const HEADER_CRC_COVERAGE: usize = HEADER_SIZE - 2;

/// Largest frame (header + data) this transport emits.
/// 1500 B Ethernet − 60 B IPv4 header − 8 B UDP header − 24 B reserve.
pub const MTU_MAX: usize = 1408;

/// UDP destination port carried as the session data specifier.
pub const UDP_PORT: u16 = 9382;

pub const SUBJECT_ID_MAX: u16 = 0x7FFF;
pub const SERVICE_ID_MAX: u16 = 0x3FFF;
pub const NODE_ID_MAX: u16 = 0xFFFE;

/// Source/destination node-ID value meaning "anonymous" / "broadcast".
pub const NODE_ID_UNSET: u16 = 0xFFFF;

pub const PRIORITY_MAX: u8 = 7;

pub const TRANSFER_ID_BIT_LENGTH: u32 = 63;
pub const TRANSFER_ID_MAX: u64 = (1u64 << TRANSFER_ID_BIT_LENGTH) - 1;

/// Largest representable frame index; bit 31 is the end-of-transfer flag.
pub const FRAME_INDEX_MAX: u32 = 0x7FFF_FFFF;
const END_OF_TRANSFER_BIT: u32 = 1 << 31;

/// Recommended transfer-ID timeout, in microseconds.
pub const DEFAULT_TRANSFER_ID_TIMEOUT_USEC: u64 = 2_000_000;

const DS_SERVICE_NOT_MESSAGE: u16 = 1 << 15;
const DS_REQUEST_NOT_RESPONSE: u16 = 1 << 14;

// ── Priority ──────────────────────────────────────────────────────────────────

/// Transfer priority. Lower numeric value is transmitted first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Priority {
    Exceptional = 0,
    Immediate = 1,
    Fast = 2,
    High = 3,
    Nominal = 4,
    Low = 5,
    Slow = 6,
    Optional = 7,
}

impl TryFrom<u8> for Priority {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Priority::Exceptional),
            1 => Ok(Priority::Immediate),
            2 => Ok(Priority::Fast),
            3 => Ok(Priority::High),
            4 => Ok(Priority::Nominal),
            5 => Ok(Priority::Low),
            6 => Ok(Priority::Slow),
            7 => Ok(Priority::Optional),
            other => Err(WireError::UnknownPriority(other)),
        }
    }
}

impl From<Priority> for u8 {
    fn from(p: Priority) -> u8 {
        p as u8
    }
}

// ── Transfer kind ─────────────────────────────────────────────────────────────

/// Kind of transfer, as distinguished by the data specifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TransferKind {
    /// Multicast, from publisher to all subscribers.
    Message = 0,
    /// Point-to-point, from server to client.
    Response = 1,
    /// Point-to-point, from client to server.
    Request = 2,
}

impl TransferKind {
    pub const COUNT: usize = 3;

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn is_service(self) -> bool {
        !matches!(self, TransferKind::Message)
    }

    /// Largest port-ID valid for this kind.
    pub fn port_id_max(self) -> u16 {
        if self.is_service() {
            SERVICE_ID_MAX
        } else {
            SUBJECT_ID_MAX
        }
    }
}

impl TryFrom<u8> for TransferKind {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(TransferKind::Message),
            1 => Ok(TransferKind::Response),
            2 => Ok(TransferKind::Request),
            other => Err(WireError::UnknownTransferKind(other)),
        }
    }
}

impl From<TransferKind> for u8 {
    fn from(k: TransferKind) -> u8 {
        k as u8
    }
}

// ── Data specifier ────────────────────────────────────────────────────────────

/// Pack a transfer kind and port-ID into the 16-bit header data specifier.
///
///   message:  0 | subject-ID (15 bits)
///   service:  1 | is-request | service-ID (14 bits)
pub fn encode_data_specifier(kind: TransferKind, port_id: u16) -> u16 {
    match kind {
        TransferKind::Message => port_id & SUBJECT_ID_MAX,
        TransferKind::Request => {
            DS_SERVICE_NOT_MESSAGE | DS_REQUEST_NOT_RESPONSE | (port_id & SERVICE_ID_MAX)
        }
        TransferKind::Response => DS_SERVICE_NOT_MESSAGE | (port_id & SERVICE_ID_MAX),
    }
}

/// Inverse of [`encode_data_specifier`]. Every 16-bit value decodes.
pub fn decode_data_specifier(data_specifier: u16) -> (TransferKind, u16) {
    if data_specifier & DS_SERVICE_NOT_MESSAGE == 0 {
        return (TransferKind::Message, data_specifier & SUBJECT_ID_MAX);
    }
    let kind = if data_specifier & DS_REQUEST_NOT_RESPONSE != 0 {
        TransferKind::Request
    } else {
        TransferKind::Response
    };
    (kind, data_specifier & SERVICE_ID_MAX)
}

// ── Frame Header ──────────────────────────────────────────────────────────────

/// The header that starts every Cyphal/UDP datagram.
///
/// Wire size: 24 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsBytes, FromBytes, FromZeroes, Unaligned)]
#[repr(C)]
pub struct FrameHeader {
    /// Header format version. Frames below [`HEADER_VERSION`] are dropped.
    pub version: u8,

    /// Transfer priority, 0..=7.
    pub priority: u8,

    /// Sender node-ID, or [`NODE_ID_UNSET`] for anonymous transfers.
    pub source_node_id: U16<LittleEndian>,

    /// Receiver node-ID for service transfers, [`NODE_ID_UNSET`] for messages.
    pub destination_node_id: U16<LittleEndian>,

    /// Transfer kind and port-ID, see [`encode_data_specifier`].
    pub data_specifier: U16<LittleEndian>,

    pub transfer_id: U64<LittleEndian>,

    /// bits 0-30: frame index, starting at 1
    /// bit    31: end of transfer
    pub frame_index_eot: U32<LittleEndian>,

    /// Reserved, written as zero.
    pub reserved: U16<LittleEndian>,

    /// CRC-16/CCITT-FALSE over the preceding 22 bytes.
    pub header_crc: U16<LittleEndian>,
}

assert_eq_size!(FrameHeader, [u8; HEADER_SIZE]);

impl FrameHeader {
    /// Build a header and seal it with its CRC.
    pub fn new(
        priority: Priority,
        source_node_id: u16,
        destination_node_id: u16,
        data_specifier: u16,
        transfer_id: u64,
        frame_index: u32,
        end_of_transfer: bool,
    ) -> Self {
        debug_assert!(frame_index <= FRAME_INDEX_MAX);
        let eot = if end_of_transfer { END_OF_TRANSFER_BIT } else { 0 };
        let mut header = FrameHeader {
            version: HEADER_VERSION,
            priority: priority.into(),
            source_node_id: U16::new(source_node_id),
            destination_node_id: U16::new(destination_node_id),
            data_specifier: U16::new(data_specifier),
            transfer_id: U64::new(transfer_id),
            frame_index_eot: U32::new((frame_index & FRAME_INDEX_MAX) | eot),
            reserved: U16::new(0),
            header_crc: U16::new(0),
        };
        header.header_crc = U16::new(header.compute_crc());
        header
    }

    /// Split a datagram into its header and the data that follows.
    /// Returns None if the datagram is shorter than a header.
    pub fn parse(datagram: &[u8]) -> Option<(FrameHeader, &[u8])> {
        let header = FrameHeader::read_from_prefix(datagram)?;
        Some((header, &datagram[HEADER_SIZE..]))
    }

    /// CRC over the bytes preceding the CRC field.
    pub fn compute_crc(&self) -> u16 {
        crc::header_crc(&self.as_bytes()[..HEADER_CRC_COVERAGE])
    }

    pub fn crc_valid(&self) -> bool {
        self.compute_crc() == self.header_crc.get()
    }

    /// Frame index without the end-of-transfer flag.
    pub fn frame_index(&self) -> u32 {
        self.frame_index_eot.get() & FRAME_INDEX_MAX
    }

    /// The first frame of a transfer always carries index 1.
    pub fn start_of_transfer(&self) -> bool {
        self.frame_index() == 1
    }

    pub fn end_of_transfer(&self) -> bool {
        self.frame_index_eot.get() & END_OF_TRANSFER_BIT != 0
    }

    pub fn transfer_kind(&self) -> TransferKind {
        decode_data_specifier(self.data_specifier.get()).0
    }

    pub fn port_id(&self) -> u16 {
        decode_data_specifier(self.data_specifier.get()).1
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

/// Errors that can arise when interpreting wire-format data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error("unknown priority: {0}")]
    UnknownPriority(u8),

    #[error("unknown transfer kind: {0}")]
    UnknownTransferKind(u8),
}

// ── Tests ─────────────────────────────────────────────────────────────────────
