//! Scalar kinds and their little-endian byte encoding.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ProbeError, Result};

/// Width and interpretation of a value in target memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Kind {
    U08,
    I08,
    U16,
    I16,
    /// Also accepted as `PTR` in symbol descriptors.
    #[serde(alias = "PTR")]
    U32,
    I32,
    U64,
    I64,
    F32,
    F64,
}

/// A decoded scalar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Unsigned(u64),
    Signed(i64),
    Float(f64),
}

impl Kind {
    /// All kinds.
    pub const ALL: [Kind; 10] = [
        Kind::U08,
        Kind::I08,
        Kind::U16,
        Kind::I16,
        Kind::U32,
        Kind::I32,
        Kind::U64,
        Kind::I64,
        Kind::F32,
        Kind::F64,
    ];

    /// Byte length.
    #[inline]
    pub const fn size(self) -> usize {
        match self {
            Kind::U08 | Kind::I08 => 1,
            Kind::U16 | Kind::I16 => 2,
            Kind::U32 | Kind::I32 | Kind::F32 => 4,
            Kind::U64 | Kind::I64 | Kind::F64 => 8,
        }
    }

    #[inline]
    pub const fn is_signed(self) -> bool {
        matches!(
            self,
            Kind::I08 | Kind::I16 | Kind::I32 | Kind::I64 | Kind::F32 | Kind::F64
        )
    }

    #[inline]
    pub const fn is_float(self) -> bool {
        matches!(self, Kind::F32 | Kind::F64)
    }

    /// Descriptor name, e.g. `"U16"`.
    pub const fn name(self) -> &'static str {
        match self {
            Kind::U08 => "U08",
            Kind::I08 => "I08",
            Kind::U16 => "U16",
            Kind::I16 => "I16",
            Kind::U32 => "U32",
            Kind::I32 => "I32",
            Kind::U64 => "U64",
            Kind::I64 => "I64",
            Kind::F32 => "F32",
            Kind::F64 => "F64",
        }
    }

    /// Smallest kind of the same signedness that is at least `min_width` bytes.
    ///
    /// Backends that cannot move single bytes carry 8-bit values as 16-bit
    /// ones.
    pub fn widened(self, min_width: usize) -> Kind {
        if self.size() >= min_width {
            return self;
        }
        match self {
            Kind::U08 => Kind::U16,
            Kind::I08 => Kind::I16,
            other => other,
        }
    }

    /// Integer range as `(min, max)`.
    fn int_range(self) -> (i128, i128) {
        match self {
            Kind::U08 => (0, u8::MAX as i128),
            Kind::I08 => (i8::MIN as i128, i8::MAX as i128),
            Kind::U16 => (0, u16::MAX as i128),
            Kind::I16 => (i16::MIN as i128, i16::MAX as i128),
            Kind::U32 => (0, u32::MAX as i128),
            Kind::I32 => (i32::MIN as i128, i32::MAX as i128),
            Kind::U64 => (0, u64::MAX as i128),
            Kind::I64 | Kind::F32 | Kind::F64 => (i64::MIN as i128, i64::MAX as i128),
        }
    }

    /// Raw bits of the leading `size()` bytes, zero-extended.
    ///
    /// Fails if `buf` is shorter than the kind.
    pub fn bits(self, buf: &[u8]) -> Result<u64> {
        let n = self.size();
        if buf.len() < n {
            return Err(ProbeError::Encoding(format!(
                "{} needs {} bytes, got {}",
                self,
                n,
                buf.len()
            )));
        }
        let mut raw = [0u8; 8];
        raw[..n].copy_from_slice(&buf[..n]);
        Ok(u64::from_le_bytes(raw))
    }

    /// Decode the leading `size()` bytes of `buf`.
    ///
    /// Shorter buffers are rejected, never zero-padded.
    pub fn decode(self, buf: &[u8]) -> Result<Value> {
        let bits = self.bits(buf)?;
        Ok(match self {
            Kind::U08 | Kind::U16 | Kind::U32 | Kind::U64 => Value::Unsigned(bits),
            Kind::I08 => Value::Signed(bits as u8 as i8 as i64),
            Kind::I16 => Value::Signed(bits as u16 as i16 as i64),
            Kind::I32 => Value::Signed(bits as u32 as i32 as i64),
            Kind::I64 => Value::Signed(bits as i64),
            Kind::F32 => Value::Float(f32::from_bits(bits as u32) as f64),
            Kind::F64 => Value::Float(f64::from_bits(bits)),
        })
    }

    /// Encode `value` to exactly `size()` little-endian bytes.
    pub fn encode(self, value: Value) -> Result<Vec<u8>> {
        let bits = match self {
            Kind::F32 => (value.as_f64() as f32).to_bits() as u64,
            Kind::F64 => value.as_f64().to_bits(),
            _ => {
                let v = match value {
                    Value::Unsigned(u) => u as i128,
                    Value::Signed(s) => s as i128,
                    Value::Float(f) => {
                        return Err(ProbeError::Encoding(format!(
                            "Float {} cannot be stored as {}",
                            f, self
                        )))
                    }
                };
                let (min, max) = self.int_range();
                if v < min || v > max {
                    return Err(ProbeError::Encoding(format!(
                        "Value {} out of range for {}",
                        v, self
                    )));
                }
                v as u64
            }
        };
        Ok(bits.to_le_bytes()[..self.size()].to_vec())
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Kind {
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "PTR" => Ok(Kind::U32),
            upper => Kind::ALL
                .into_iter()
                .find(|k| k.name() == upper)
                .ok_or_else(|| ProbeError::Encoding(format!("Unknown kind: {}", s))),
        }
    }
}

impl Value {
    /// Lossy conversion to f64.
    pub fn as_f64(self) -> f64 {
        match self {
            Value::Unsigned(u) => u as f64,
            Value::Signed(s) => s as f64,
            Value::Float(f) => f,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unsigned(u) => write!(f, "{}", u),
            Value::Signed(s) => write!(f, "{}", s),
            Value::Float(x) => write!(f, "{}", x),
        }
    }
}

/// Rust primitive with a fixed [`Kind`].
pub trait Scalar: Copy + Send + Sync + 'static {
    const KIND: Kind;

    fn from_value(value: Value) -> Self;

    fn into_value(self) -> Value;
}

macro_rules! scalar {
    ($ty:ty, $kind:ident, $variant:ident, $wide:ty) => {
        impl Scalar for $ty {
            const KIND: Kind = Kind::$kind;

            fn from_value(value: Value) -> Self {
                match value {
                    Value::Unsigned(u) => u as $ty,
                    Value::Signed(s) => s as $ty,
                    Value::Float(f) => f as $ty,
                }
            }

            fn into_value(self) -> Value {
                Value::$variant(self as $wide)
            }
        }
    };
}

scalar!(u8, U08, Unsigned, u64);
scalar!(i8, I08, Signed, i64);
scalar!(u16, U16, Unsigned, u64);
scalar!(i16, I16, Signed, i64);
scalar!(u32, U32, Unsigned, u64);
scalar!(i32, I32, Signed, i64);
scalar!(u64, U64, Unsigned, u64);
scalar!(i64, I64, Signed, i64);
scalar!(f32, F32, Float, f64);
scalar!(f64, F64, Float, f64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sizes() {
        let sizes: Vec<usize> = Kind::ALL.iter().map(|k| k.size()).collect();
        assert_eq!(sizes, vec![1, 1, 2, 2, 4, 4, 8, 8, 4, 8]);
    }

    #[test]
    fn test_little_endian_decode() {
        assert_eq!(Kind::U16.decode(&[0x34, 0x12]).unwrap(), Value::Unsigned(0x1234));
        assert_eq!(Kind::I16.decode(&[0xFE, 0xFF]).unwrap(), Value::Signed(-2));
        assert_eq!(
            Kind::U32.decode(&[0x78, 0x56, 0x34, 0x12]).unwrap(),
            Value::Unsigned(0x1234_5678)
        );
        assert_eq!(
            Kind::F32.decode(&0x43f8_0f5cu32.to_le_bytes()).unwrap(),
            Value::Float(f32::from_bits(0x43f8_0f5c) as f64)
        );
    }

    #[test]
    fn test_f64_uses_eight_bytes() {
        let bytes = 1.5f64.to_le_bytes();
        assert_eq!(Kind::F64.decode(&bytes).unwrap(), Value::Float(1.5));
    }

    #[test]
    fn test_short_buffer_rejected() {
        let err = Kind::U32.decode(&[1, 2, 3]).unwrap_err();
        assert!(matches!(err, ProbeError::Encoding(_)));
        assert!(Kind::U08.decode(&[]).is_err());
    }

    #[test]
    fn test_longer_buffer_uses_leading_bytes() {
        assert_eq!(Kind::U08.decode(&[0xAB, 0xCD]).unwrap(), Value::Unsigned(0xAB));
    }

    #[test]
    fn test_encode_range_checks() {
        assert_eq!(Kind::U08.encode(Value::Unsigned(255)).unwrap(), vec![0xFF]);
        assert!(Kind::U08.encode(Value::Unsigned(256)).is_err());
        assert!(Kind::U16.encode(Value::Signed(-1)).is_err());
        assert_eq!(Kind::I16.encode(Value::Signed(-2)).unwrap(), vec![0xFE, 0xFF]);
        assert!(Kind::I32.encode(Value::Float(1.0)).is_err());
        assert_eq!(
            Kind::U64.encode(Value::Unsigned(u64::MAX)).unwrap(),
            vec![0xFF; 8]
        );
    }

    #[test]
    fn test_widened() {
        assert_eq!(Kind::U08.widened(2), Kind::U16);
        assert_eq!(Kind::I08.widened(2), Kind::I16);
        assert_eq!(Kind::U08.widened(1), Kind::U08);
        assert_eq!(Kind::U32.widened(2), Kind::U32);
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("u16".parse::<Kind>().unwrap(), Kind::U16);
        assert_eq!("PTR".parse::<Kind>().unwrap(), Kind::U32);
        assert!("U128".parse::<Kind>().is_err());

        let kind: Kind = serde_json::from_str("\"PTR\"").unwrap();
        assert_eq!(kind, Kind::U32);
        assert_eq!(serde_json::to_string(&Kind::I08).unwrap(), "\"I08\"");
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn check<T>(v: T) -> std::result::Result<(), TestCaseError>
        where
            T: Scalar + PartialEq + std::fmt::Debug,
        {
            let bytes = T::KIND.encode(v.into_value()).unwrap();
            prop_assert_eq!(bytes.len(), T::KIND.size());
            let back = T::from_value(T::KIND.decode(&bytes).unwrap());
            prop_assert_eq!(back, v);
            Ok(())
        }

        proptest! {
            #[test]
            fn prop_integer_roundtrip(a in any::<u8>(), b in any::<i8>(), c in any::<u16>(), d in any::<i16>(),
                                      e in any::<u32>(), f in any::<i32>(), g in any::<u64>(), h in any::<i64>()) {
                check(a)?;
                check(b)?;
                check(c)?;
                check(d)?;
                check(e)?;
                check(f)?;
                check(g)?;
                check(h)?;
            }

            #[test]
            fn prop_float_roundtrip(x in any::<f32>().prop_filter("nan", |x| !x.is_nan()),
                                    y in any::<f64>().prop_filter("nan", |y| !y.is_nan())) {
                check(x)?;
                check(y)?;
            }
        }
    }
}
