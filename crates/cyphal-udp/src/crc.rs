//! Checksums used by the Cyphal/UDP wire format.
//!
//! Provides two things:
//!   1. CRC-32C, the transfer CRC, appended to every transfer payload
//!   2. CRC-16/CCITT-FALSE, the header CRC, stored in the last two header bytes
//!
//! Both are pure functions over byte slices plus an incremental accumulator
//! for payloads that arrive in pieces.

// ── Transfer CRC (CRC-32C) ────────────────────────────────────────────────────

/// Size of the transfer CRC trailer in bytes.
pub const CRC_SIZE: usize = 4;

/// Initial accumulator value.
pub const CRC_INITIAL: u32 = 0xFFFF_FFFF;

/// Accumulator value after a payload followed by its own little-endian CRC.
/// A receiver compares against this instead of extracting the trailer.
pub const CRC_RESIDUE: u32 = 0xB798_B438;

const CRC_XOR: u32 = 0xFFFF_FFFF;

/// Castagnoli polynomial, bit-reflected.
const CRC32C_POLY_REFLECTED: u32 = 0x82F6_3B78;

static CRC32C_TABLE: [u32; 256] = build_crc32c_table();

const fn build_crc32c_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u32;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 1 != 0 {
                (crc >> 1) ^ CRC32C_POLY_REFLECTED
            } else {
                crc >> 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// Incremental CRC-32C accumulator.
///
/// # Example
/// ```
/// use cyphal_udp::crc::TransferCrc;
/// let mut crc = TransferCrc::new();
/// crc.update(b"1234");
/// crc.update(b"56789");
/// assert_eq!(crc.value(), 0xE306_9283);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferCrc(u32);

impl TransferCrc {
    pub fn new() -> Self {
        Self(CRC_INITIAL)
    }

    pub fn update(&mut self, data: &[u8]) {
        let mut crc = self.0;
        for &byte in data {
            crc = CRC32C_TABLE[((crc ^ u32::from(byte)) & 0xFF) as usize] ^ (crc >> 8);
        }
        self.0 = crc;
    }

    /// Raw accumulator, without the output XOR.
    pub fn register(&self) -> u32 {
        self.0
    }

    /// Final CRC value.
    pub fn value(&self) -> u32 {
        self.0 ^ CRC_XOR
    }

    /// True if the data seen so far ends with a valid CRC trailer.
    pub fn residue_matches(&self) -> bool {
        self.0 == CRC_RESIDUE
    }
}

impl Default for TransferCrc {
    fn default() -> Self {
        Self::new()
    }
}

/// CRC-32C of a byte slice.
pub fn transfer_crc(data: &[u8]) -> u32 {
    let mut crc = TransferCrc::new();
    crc.update(data);
    crc.value()
}

/// The trailer bytes appended after a payload, least significant byte first.
pub fn transfer_crc_trailer(payload: &[u8]) -> [u8; CRC_SIZE] {
    transfer_crc(payload).to_le_bytes()
}

// ── Header CRC (CRC-16/CCITT-FALSE) ───────────────────────────────────────────

/// Initial accumulator value for the header CRC.
pub const HEADER_CRC_INITIAL: u16 = 0xFFFF;

const HEADER_CRC_POLY: u16 = 0x1021;

/// Feed bytes into a CRC-16/CCITT-FALSE accumulator.
pub fn header_crc_add(crc: u16, data: &[u8]) -> u16 {
    let mut out = crc;
    for &byte in data {
        out ^= u16::from(byte) << 8;
        for _ in 0..8 {
            out = if out & 0x8000 != 0 {
                (out << 1) ^ HEADER_CRC_POLY
            } else {
                out << 1
            };
        }
    }
    out
}

/// CRC-16/CCITT-FALSE of a byte slice.
pub fn header_crc(data: &[u8]) -> u16 {
    header_crc_add(HEADER_CRC_INITIAL, data)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
