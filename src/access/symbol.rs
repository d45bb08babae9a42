//! Symbol descriptors: a kind plus a hex address string.
//!
//! ```
//! use memwire::access::{Kind, Symbol, Value};
//!
//! let sym: Symbol = serde_json::from_str(r#"{"typ": "I16", "adr": "0000AC25"}"#).unwrap();
//! assert_eq!(sym.address().unwrap(), 0xAC25);
//! assert_eq!(sym.parse_value("0xFFFE").unwrap(), Value::Signed(-2));
//! ```

use serde::{Deserialize, Serialize};

use super::kind::{Kind, Value};
use crate::error::{ProbeError, Result};

/// A typed variable in target memory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    /// Value kind.
    pub typ: Kind,
    /// Address as a hex string, with or without `0x`.
    pub adr: String,
}

impl Symbol {
    pub fn new(typ: Kind, address: u32) -> Self {
        Self {
            typ,
            adr: format!("{:08x}", address),
        }
    }

    /// Parse the hex address.
    pub fn address(&self) -> Result<u32> {
        parse_hex(&self.adr)
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| ProbeError::Encoding(format!("Invalid symbol address: {}", self.adr)))
    }

    /// Parse a textual value for this symbol's kind.
    ///
    /// Text containing `0x` is hex, anything else is decimal. Hex is taken as
    /// the raw bit pattern of the kind: two's complement for signed kinds and
    /// the IEEE layout for floats.
    pub fn parse_value(&self, text: &str) -> Result<Value> {
        let text = text.trim();
        let invalid = || ProbeError::Encoding(format!("Invalid {} value: {}", self.typ, text));

        if text.contains("0x") {
            let bits = parse_hex(text).ok_or_else(invalid)?;
            let width = self.typ.size() * 8;
            if width < 64 && bits >> width != 0 {
                return Err(invalid());
            }
            return self.typ.decode(&bits.to_le_bytes());
        }

        if self.typ.is_float() {
            return text.parse::<f64>().map(Value::Float).map_err(|_| invalid());
        }
        let v: i128 = text.parse().map_err(|_| invalid())?;
        if v < 0 {
            i64::try_from(v).map(Value::Signed).map_err(|_| invalid())
        } else {
            u64::try_from(v).map(Value::Unsigned).map_err(|_| invalid())
        }
    }
}

fn parse_hex(text: &str) -> Option<u64> {
    let digits = text.trim();
    let digits = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
        .unwrap_or(digits);
    u64::from_str_radix(digits, 16).ok()
}
