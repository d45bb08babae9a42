//! Protocol module - extended-addressing wire format and framing.
//!
//! This module implements the binary protocol spoken on the probe link:
//! - 4-byte header encoding/decoding with a 20-bit address
//! - Frame construction, opcode selection and reply slicing
//! - Frame buffer for accumulating partial reads on the target side

mod frame;
mod frame_buffer;
mod wire_format;

pub use frame::{decode_reply, Frame};
pub use frame_buffer::FrameBuffer;
pub use wire_format::{
    padded_len, round_up4, Header, Opcode, ADDRESS_MASK, HEADER_SIZE, MAX_WORD_COUNT,
};
