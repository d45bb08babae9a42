//! Wire format encoding and decoding.
//!
//! Implements the 4-byte extended-addressing header:
//! ```text
//! ┌────────────────┬────────────┬──────────────┐
//! │ Opcode │ A19-16│ Word count │ Address 15-0 │
//! │ 4 bits │ 4 bits│ 1 byte     │ uint16 LE    │
//! └────────────────┴────────────┴──────────────┘
//! ```
//!
//! The header is followed by `round_up4(word_count * 2)` payload bytes.
//! All multi-byte integers are Little Endian.

use crate::error::{ProbeError, Result};

/// Header size in bytes (fixed, exactly 4).
pub const HEADER_SIZE: usize = 4;

/// Largest word count representable in the header.
pub const MAX_WORD_COUNT: usize = 255;

/// Significant address bits carried by a frame (20).
pub const ADDRESS_MASK: u32 = 0x000F_FFFF;

/// Operation selector carried in the high nibble of header byte 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// Read 16-bit words.
    Read16,
    /// Write 16-bit words.
    Write16,
    /// Read 32-bit words.
    Read32,
    /// Write 32-bit words.
    Write32,
}

impl Opcode {
    /// All opcodes, in code order.
    pub const ALL: [Opcode; 4] = [
        Opcode::Read16,
        Opcode::Write16,
        Opcode::Read32,
        Opcode::Write32,
    ];

    /// Byte value of the opcode (already shifted into the high nibble).
    #[inline]
    pub const fn code(self) -> u8 {
        match self {
            Opcode::Read16 => 0x00,
            Opcode::Write16 => 0x10,
            Opcode::Read32 => 0x80,
            Opcode::Write32 => 0x90,
        }
    }

    /// Parse the high nibble of header byte 0.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte & 0xF0 {
            0x00 => Some(Opcode::Read16),
            0x10 => Some(Opcode::Write16),
            0x80 => Some(Opcode::Read32),
            0x90 => Some(Opcode::Write32),
            _ => None,
        }
    }

    /// True for the 32-bit opcodes, which need an even address.
    #[inline]
    pub fn is_wide(self) -> bool {
        matches!(self, Opcode::Read32 | Opcode::Write32)
    }

    /// True for the write opcodes.
    #[inline]
    pub fn is_write(self) -> bool {
        matches!(self, Opcode::Write16 | Opcode::Write32)
    }

    /// Pick the opcode for a transfer.
    ///
    /// 32-bit when `byte_count` is a multiple of 4, 16-bit otherwise, and
    /// always 16-bit for odd addresses.
    pub fn select(address: u32, byte_count: usize, write: bool) -> Self {
        let wide = byte_count % 4 == 0 && address & 1 == 0;
        match (write, wide) {
            (false, false) => Opcode::Read16,
            (false, true) => Opcode::Read32,
            (true, false) => Opcode::Write16,
            (true, true) => Opcode::Write32,
        }
    }
}

/// Round a byte count up to the next multiple of 4.
#[inline]
pub const fn round_up4(n: usize) -> usize {
    (n + 3) & !3
}

/// Padded payload length carried after the header for `word_count` words.
#[inline]
pub const fn padded_len(word_count: usize) -> usize {
    round_up4(word_count * 2)
}

/// Decoded frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Operation.
    pub opcode: Opcode,
    /// Target address (only bits 0-19 are transmitted).
    pub address: u32,
    /// Number of 16-bit words transferred (1-255).
    pub word_count: u8,
}

impl Header {
    /// Create a new header.
    pub fn new(opcode: Opcode, address: u32, word_count: u8) -> Self {
        Self {
            opcode,
            address,
            word_count,
        }
    }

    /// Encode header to bytes.
    ///
    /// Address bits above bit 19 are dropped.
    ///
    /// # Example
    ///
    /// ```
    /// use memwire::protocol::{Header, Opcode};
    ///
    /// let header = Header::new(Opcode::Read16, 0x1ABCDE, 1);
    /// assert_eq!(header.encode(), [0x0A, 0x01, 0xDE, 0xBC]);
    /// ```
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        self.encode_into(&mut buf);
        buf
    }

    /// Encode header into an existing buffer.
    ///
    /// # Panics
    ///
    /// Panics if buffer is smaller than `HEADER_SIZE` (4 bytes).
    pub fn encode_into(&self, buf: &mut [u8]) {
        let addr = self.address.to_le_bytes();
        buf[0] = self.opcode.code() | (addr[2] & 0x0F);
        buf[1] = self.word_count;
        buf[2] = addr[0];
        buf[3] = addr[1];
    }

    /// Decode header from bytes.
    ///
    /// Fails if the buffer is too short or the opcode nibble is unknown.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(ProbeError::Protocol(format!(
                "Header needs {} bytes, got {}",
                HEADER_SIZE,
                buf.len()
            )));
        }
        let opcode = Opcode::from_byte(buf[0]).ok_or_else(|| {
            ProbeError::Protocol(format!("Unknown opcode nibble 0x{:x}", buf[0] >> 4))
        })?;
        let address =
            (u32::from(buf[0] & 0x0F) << 16) | u32::from(u16::from_le_bytes([buf[2], buf[3]]));
        Ok(Self {
            opcode,
            address,
            word_count: buf[1],
        })
    }

    /// Check addressing constraints.
    ///
    /// 32-bit operations on an odd address are rejected.
    pub fn validate(&self) -> Result<()> {
        if self.opcode.is_wide() && self.address & 1 == 1 {
            return Err(ProbeError::Protocol(format!(
                "32-bit operation on odd address 0x{:05x}",
                self.address
            )));
        }
        Ok(())
    }

    /// Padded payload length following this header.
    #[inline]
    pub fn payload_len(&self) -> usize {
        padded_len(self.word_count as usize)
    }

    /// Total frame length (header + padded payload).
    #[inline]
    pub fn frame_len(&self) -> usize {
        HEADER_SIZE + self.payload_len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_encode_decode_roundtrip() {
        let original = Header::new(Opcode::Write32, 0x0C_BBAA, 3);
        let decoded = Header::decode(&original.encode()).unwrap();
        assert_eq!(original, decoded);
    }

    #[test]
    fn test_header_little_endian_byte_order() {
        let bytes = Header::new(Opcode::Read32, 0x000C_BBAA, 2).encode();

        // Opcode 0x8 in the high nibble, address bits 16-19 in the low nibble
        assert_eq!(bytes[0], 0x8C);
        assert_eq!(bytes[1], 2);
        // Address bits 0-15 in LE
        assert_eq!(bytes[2], 0xAA);
        assert_eq!(bytes[3], 0xBB);
    }

    #[test]
    fn test_address_bits_above_19_are_dropped() {
        let header = Header::new(Opcode::Read16, 0xFF1A_BCDE, 1);
        let decoded = Header::decode(&header.encode()).unwrap();
        assert_eq!(decoded.address, 0x0A_BCDE);
    }

    #[test]
    fn test_decode_too_short_buffer() {
        assert!(Header::decode(&[0x00, 0x01, 0x02]).is_err());
    }

    #[test]
    fn test_decode_unknown_opcode() {
        let err = Header::decode(&[0x40, 0x01, 0x00, 0x00]).unwrap_err();
        assert!(err.to_string().contains("Unknown opcode"));
    }

    #[test]
    fn test_validate_odd_address_wide_rejected() {
        for opcode in [Opcode::Read32, Opcode::Write32] {
            let header = Header::new(opcode, 0x1001, 2);
            assert!(header.validate().is_err());
        }
        for opcode in [Opcode::Read16, Opcode::Write16] {
            assert!(Header::new(opcode, 0x1001, 2).validate().is_ok());
        }
    }

    #[test]
    fn test_opcode_selection() {
        assert_eq!(Opcode::select(0x100, 4, false), Opcode::Read32);
        assert_eq!(Opcode::select(0x100, 8, true), Opcode::Write32);
        assert_eq!(Opcode::select(0x100, 2, false), Opcode::Read16);
        assert_eq!(Opcode::select(0x100, 6, true), Opcode::Write16);
        // Odd address forces 16-bit regardless of length
        assert_eq!(Opcode::select(0x101, 4, false), Opcode::Read16);
        assert_eq!(Opcode::select(0x101, 8, true), Opcode::Write16);
    }

    #[test]
    fn test_opcode_codes() {
        for opcode in Opcode::ALL {
            assert_eq!(Opcode::from_byte(opcode.code() | 0x0F), Some(opcode));
        }
        assert!(Opcode::Write16.is_write());
        assert!(!Opcode::Read32.is_write());
    }

    #[test]
    fn test_padded_lengths() {
        assert_eq!(padded_len(1), 4);
        assert_eq!(padded_len(2), 4);
        assert_eq!(padded_len(3), 8);
        assert_eq!(padded_len(255), 512);
        assert_eq!(Header::new(Opcode::Read16, 0, 3).frame_len(), 12);
    }
}
