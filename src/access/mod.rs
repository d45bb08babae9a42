//! Access module - typed views over raw memory reads and writes.
//!
//! - [`MemoryAccess`] - the byte-level contract every backend satisfies
//! - [`TypedAccess`] - numeric, list, text and symbol helpers on top of it
//! - [`Kind`] / [`Value`] - scalar kinds and their little-endian encoding
//! - [`Format`] - `raw`, `dec` and `hex` renderings
//! - [`display_ascii`] / [`decode_cp1254`] - text stored in target memory
//!
//! # Design
//!
//! Conversions are pure and happen at the client edge; backends only move
//! bytes.

mod format;
mod kind;
mod symbol;
mod text;
mod typed;

pub use format::{Format, Formatted};
pub use kind::{Kind, Scalar, Value};
pub use symbol::Symbol;
pub use text::{decode_cp1254, display_ascii};
pub use typed::{MemoryAccess, TypedAccess};
