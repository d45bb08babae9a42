//! Frame buffer for accumulating partial reads on the target side.
//!
//! Uses `bytes::BytesMut` for buffer management.
//! Implements a state machine for handling fragmented frames:
//! - `WaitingForHeader`: Need at least 4 bytes
//! - `WaitingForPayload`: Header parsed, need the padded payload
//!
//! # Example
//!
//! ```
//! use memwire::protocol::{Frame, FrameBuffer};
//!
//! let mut buffer = FrameBuffer::new();
//! let bytes = Frame::write(0x100, &[1, 2]).unwrap().to_bytes();
//!
//! assert!(buffer.push(&bytes[..3]).unwrap().is_empty());
//! let frames = buffer.push(&bytes[3..]).unwrap();
//! assert_eq!(frames[0].data(), &[1, 2]);
//! ```

use bytes::BytesMut;

use super::wire_format::{Header, HEADER_SIZE};
use super::Frame;
use crate::error::Result;

/// State machine for frame parsing.
#[derive(Debug, Clone)]
enum State {
    /// Waiting for complete header (need 4 bytes).
    WaitingForHeader,
    /// Header parsed, waiting for payload bytes.
    WaitingForPayload { header: Header },
}

/// Buffer for accumulating incoming bytes and extracting complete frames.
pub struct FrameBuffer {
    /// Accumulated bytes from link reads.
    buffer: BytesMut,
    /// Current parsing state.
    state: State,
}

impl FrameBuffer {
    /// Create a new frame buffer.
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(1024),
            state: State::WaitingForHeader,
        }
    }

    /// Push data into the buffer and extract all complete frames.
    ///
    /// Partial data is kept for the next push.
    ///
    /// # Errors
    ///
    /// Returns error if a header carries an unknown opcode.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Frame>> {
        self.buffer.extend_from_slice(data);

        let mut frames = Vec::new();
        while let Some(frame) = self.try_extract_one()? {
            frames.push(frame);
        }
        Ok(frames)
    }

    fn try_extract_one(&mut self) -> Result<Option<Frame>> {
        if let State::WaitingForHeader = self.state {
            if self.buffer.len() < HEADER_SIZE {
                return Ok(None);
            }
            let header = Header::decode(&self.buffer[..HEADER_SIZE])?;
            let _ = self.buffer.split_to(HEADER_SIZE);
            self.state = State::WaitingForPayload { header };
        }

        let State::WaitingForPayload { header } = self.state else {
            return Ok(None);
        };
        let needed = header.payload_len();
        if self.buffer.len() < needed {
            return Ok(None);
        }
        let payload = self.buffer.split_to(needed).freeze();
        self.state = State::WaitingForHeader;
        Ok(Some(Frame { header, payload }))
    }

    /// Number of buffered bytes not yet returned as frames.
    pub fn buffered_len(&self) -> usize {
        let header = match self.state {
            State::WaitingForHeader => 0,
            State::WaitingForPayload { .. } => HEADER_SIZE,
        };
        header + self.buffer.len()
    }

    /// Check if the buffer holds no partial frame.
    pub fn is_empty(&self) -> bool {
        self.buffered_len() == 0
    }

    /// Drop any partial frame.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.state = State::WaitingForHeader;
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}
