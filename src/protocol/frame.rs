//! Frame struct and the extended-addressing codec.
//!
//! A frame is the 4-byte header followed by a zero-padded payload sized to a
//! multiple of 4 bytes. The target echoes a reply of the same total length;
//! the bytes of interest start at offset 4.
//!
//! # Example
//!
//! ```
//! use memwire::protocol::{decode_reply, Frame};
//!
//! let frame = Frame::read(0x0C_BBAA, 2).unwrap();
//! assert_eq!(frame.to_bytes().len(), 8);
//!
//! let reply = [0x0C, 0x01, 0xAA, 0xBB, 0x34, 0x12, 0x00, 0x00];
//! assert_eq!(&decode_reply(&reply, 2).unwrap()[..], &[0x34, 0x12]);
//! ```

use bytes::{Bytes, BytesMut};

use super::wire_format::{Header, Opcode, ADDRESS_MASK, HEADER_SIZE, MAX_WORD_COUNT};
use crate::error::{ProbeError, Result};

/// A complete protocol frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Decoded header.
    pub header: Header,
    /// Padded payload bytes.
    pub payload: Bytes,
}

impl Frame {
    /// Encode a frame.
    ///
    /// `word_count` below 1 is clamped to 1. Word counts above 255 and 32-bit
    /// opcodes on odd addresses are rejected. When `data` is given it must be
    /// exactly `word_count * 2` bytes; it is copied in front of the zero
    /// padding.
    pub fn encode(
        opcode: Opcode,
        address: u32,
        word_count: usize,
        data: Option<&[u8]>,
    ) -> Result<Self> {
        let word_count = word_count.max(1);
        if word_count > MAX_WORD_COUNT {
            return Err(ProbeError::Protocol(format!(
                "Word count {} exceeds maximum {}",
                word_count, MAX_WORD_COUNT
            )));
        }

        if address & !ADDRESS_MASK != 0 {
            tracing::warn!(
                "Address 0x{:08x} exceeds 20 bits, transmitting 0x{:05x}",
                address,
                address & ADDRESS_MASK
            );
        }

        let header = Header::new(opcode, address & ADDRESS_MASK, word_count as u8);
        header.validate()?;

        let mut payload = BytesMut::zeroed(header.payload_len());
        if let Some(data) = data {
            if data.len() != word_count * 2 {
                return Err(ProbeError::Protocol(format!(
                    "Payload of {} bytes does not match {} words",
                    data.len(),
                    word_count
                )));
            }
            payload[..data.len()].copy_from_slice(data);
        }

        Ok(Self {
            header,
            payload: payload.freeze(),
        })
    }

    /// Build a read request for `byte_count` bytes.
    ///
    /// The word count is `byte_count / 2`; an odd byte count truncates the
    /// last half-word from the request (the reply still carries padding, so
    /// callers receive `byte_count` bytes).
    pub fn read(address: u32, byte_count: usize) -> Result<Self> {
        let opcode = Opcode::select(address, byte_count, false);
        Self::encode(opcode, address, byte_count / 2, None)
    }

    /// Build a write request carrying `data`.
    pub fn write(address: u32, data: &[u8]) -> Result<Self> {
        let opcode = Opcode::select(address, data.len(), true);
        Self::encode(opcode, address, data.len() / 2, Some(data))
    }

    /// Serialize header and payload into one contiguous buffer.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.len());
        buf.extend_from_slice(&self.header.encode());
        buf.extend_from_slice(&self.payload);
        buf.freeze()
    }

    /// Total frame length on the wire.
    #[inline]
    pub fn len(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }

    /// Frames always carry at least the header.
    #[inline]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Get the opcode.
    #[inline]
    pub fn opcode(&self) -> Opcode {
        self.header.opcode
    }

    /// Get the transmitted (20-bit) address.
    #[inline]
    pub fn address(&self) -> u32 {
        self.header.address
    }

    /// Get the word count.
    #[inline]
    pub fn word_count(&self) -> usize {
        self.header.word_count as usize
    }

    /// Data bytes without padding (`word_count * 2`).
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.payload[..self.word_count() * 2]
    }
}

/// Extract `byte_count` payload bytes from a reply frame.
///
/// The slice starts after the header and ignores the reply's padding.
pub fn decode_reply(reply: &[u8], byte_count: usize) -> Result<Bytes> {
    let end = HEADER_SIZE + byte_count;
    if reply.len() < end {
        return Err(ProbeError::Transport(format!(
            "Short reply: expected at least {} bytes, got {}",
            end,
            reply.len()
        )));
    }
    Ok(Bytes::copy_from_slice(&reply[HEADER_SIZE..end]))
}
