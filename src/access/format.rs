//! Output formatting for typed reads.
//!
//! - `raw`: the decoded value itself
//! - `dec`: decimal string
//! - `hex`: `0x` followed by the bit pattern, zero-padded to the kind's width

use serde::{Deserialize, Serialize};

use super::kind::{Kind, Value};
use crate::error::Result;

/// Requested output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    #[default]
    Raw,
    Dec,
    Hex,
}

/// A value rendered in some [`Format`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Formatted {
    Value(Value),
    Text(String),
}

impl Format {
    /// Render the leading `kind.size()` bytes of `buf`.
    pub fn apply(self, kind: Kind, buf: &[u8]) -> Result<Formatted> {
        match self {
            Format::Raw => Ok(Formatted::Value(kind.decode(buf)?)),
            Format::Dec => {
                // Keep f32 at f32 precision in text (496.12, not 496.1199951171875)
                let text = match kind {
                    Kind::F32 => f32::from_bits(kind.bits(buf)? as u32).to_string(),
                    _ => kind.decode(buf)?.to_string(),
                };
                Ok(Formatted::Text(text))
            }
            Format::Hex => Ok(Formatted::Text(format!(
                "0x{:0width$x}",
                kind.bits(buf)?,
                width = kind.size() * 2
            ))),
        }
    }
}

impl Formatted {
    pub fn as_value(&self) -> Option<Value> {
        match self {
            Formatted::Value(v) => Some(*v),
            Formatted::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Formatted::Value(_) => None,
            Formatted::Text(s) => Some(s),
        }
    }
}
