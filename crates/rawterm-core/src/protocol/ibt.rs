//! IBT — the Interchange Binary Table encoding for event parameters.
//!
//! Custom events carry arbitrary dynamically-typed parameters (the kind-3
//! packet), so they need a self-describing serialization.  IBT is a compact
//! tag-byte format:
//!
//! | Tag | Body |
//! |-----|------|
//! | 0   | signed 64-bit little-endian integer |
//! | 1   | IEEE-754 double, little-endian |
//! | 2   | boolean, one byte |
//! | 3   | NUL-terminated UTF-8 string |
//! | 4   | table: count byte, then `count` keys, then `count` values |
//! | 5   | nil, no body |
//!
//! There is a single numeric type, [`IbtValue::Number`], matching the
//! dynamically-typed hosts this protocol talks to.  The encoder picks tag 0
//! when the number is integral and fits a signed 32-bit range, tag 1
//! otherwise, so `decode(encode(v)) == v` holds for every representable
//! value.
//!
//! Table entries are kept in insertion order (`Vec` of pairs, not a hash
//! map), which makes encoded bytes reproducible.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::codec::ProtocolError;
use super::wire::{ByteReader, ByteWriter};

const TAG_INTEGER: u8 = 0;
const TAG_DOUBLE: u8 = 1;
const TAG_BOOLEAN: u8 = 2;
const TAG_STRING: u8 = 3;
const TAG_TABLE: u8 = 4;
const TAG_NIL: u8 = 5;

/// Errors produced while encoding or decoding IBT values.
#[derive(Debug, Error, PartialEq)]
pub enum IbtError {
    /// The tag byte is not one of the six defined tags.
    #[error("unknown IBT tag: 0x{0:02X}")]
    UnknownTag(u8),

    /// A table has more entries than the one-byte count field can carry.
    #[error("table has {0} entries; the wire format allows at most 255")]
    TableTooLarge(usize),

    /// The underlying byte stream was malformed or ended early.
    #[error("malformed IBT data: {0}")]
    Malformed(String),
}

impl From<ProtocolError> for IbtError {
    fn from(err: ProtocolError) -> Self {
        IbtError::Malformed(err.to_string())
    }
}

/// A dynamically-typed value carried in custom-event parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IbtValue {
    /// The single numeric type; see the module docs for the tag-0/tag-1 split.
    Number(f64),
    Boolean(bool),
    Text(String),
    /// Key/value pairs in insertion order.
    Table(Vec<(IbtValue, IbtValue)>),
    Nil,
}

impl IbtValue {
    /// Serializes this value onto `out`.
    pub fn encode(&self, out: &mut ByteWriter) -> Result<(), IbtError> {
        match self {
            IbtValue::Number(n) => {
                if n.fract() == 0.0 && (-(2f64.powi(31))..2f64.powi(31)).contains(n) {
                    out.u8(TAG_INTEGER);
                    out.i64(*n as i64);
                } else {
                    out.u8(TAG_DOUBLE);
                    out.f64(*n);
                }
            }
            IbtValue::Boolean(b) => {
                out.u8(TAG_BOOLEAN);
                out.u8(u8::from(*b));
            }
            IbtValue::Text(s) => {
                out.u8(TAG_STRING);
                out.cstring(s)?;
            }
            IbtValue::Table(entries) => {
                if entries.len() > 255 {
                    return Err(IbtError::TableTooLarge(entries.len()));
                }
                out.u8(TAG_TABLE);
                out.u8(entries.len() as u8);
                for (key, _) in entries {
                    key.encode(out)?;
                }
                for (_, value) in entries {
                    value.encode(out)?;
                }
            }
            IbtValue::Nil => out.u8(TAG_NIL),
        }
        Ok(())
    }

    /// Deserializes one value from `reader`, advancing its cursor.
    pub fn decode(reader: &mut ByteReader<'_>) -> Result<IbtValue, IbtError> {
        let tag = reader.u8()?;
        match tag {
            TAG_INTEGER => Ok(IbtValue::Number(reader.i64()? as f64)),
            TAG_DOUBLE => Ok(IbtValue::Number(reader.f64()?)),
            TAG_BOOLEAN => Ok(IbtValue::Boolean(reader.u8()? != 0)),
            TAG_STRING => Ok(IbtValue::Text(reader.cstring()?)),
            TAG_TABLE => {
                let count = reader.u8()? as usize;
                let mut keys = Vec::with_capacity(count);
                for _ in 0..count {
                    keys.push(IbtValue::decode(reader)?);
                }
                let mut entries = Vec::with_capacity(count);
                for key in keys {
                    entries.push((key, IbtValue::decode(reader)?));
                }
                Ok(IbtValue::Table(entries))
            }
            TAG_NIL => Ok(IbtValue::Nil),
            other => Err(IbtError::UnknownTag(other)),
        }
    }
}

impl From<f64> for IbtValue {
    fn from(value: f64) -> Self {
        IbtValue::Number(value)
    }
}

impl From<i32> for IbtValue {
    fn from(value: i32) -> Self {
        IbtValue::Number(value as f64)
    }
}

impl From<bool> for IbtValue {
    fn from(value: bool) -> Self {
        IbtValue::Boolean(value)
    }
}

impl From<&str> for IbtValue {
    fn from(value: &str) -> Self {
        IbtValue::Text(value.to_string())
    }
}

impl From<String> for IbtValue {
    fn from(value: String) -> Self {
        IbtValue::Text(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(value: IbtValue) -> IbtValue {
        let mut w = ByteWriter::new();
        value.encode(&mut w).expect("encode must succeed");
        let bytes = w.into_bytes();
        let mut r = ByteReader::new(&bytes);
        let decoded = IbtValue::decode(&mut r).expect("decode must succeed");
        assert_eq!(r.remaining(), 0, "all bytes must be consumed");
        decoded
    }

    fn first_byte(value: &IbtValue) -> u8 {
        let mut w = ByteWriter::new();
        value.encode(&mut w).unwrap();
        w.into_bytes()[0]
    }

    #[test]
    fn test_integral_numbers_use_tag_zero() {
        assert_eq!(first_byte(&IbtValue::Number(0.0)), TAG_INTEGER);
        assert_eq!(first_byte(&IbtValue::Number(-5.0)), TAG_INTEGER);
        assert_eq!(first_byte(&IbtValue::Number(2147483647.0)), TAG_INTEGER);
        assert_eq!(first_byte(&IbtValue::Number(-2147483648.0)), TAG_INTEGER);
    }

    #[test]
    fn test_out_of_range_or_fractional_numbers_use_tag_one() {
        assert_eq!(first_byte(&IbtValue::Number(0.5)), TAG_DOUBLE);
        assert_eq!(first_byte(&IbtValue::Number(2147483648.0)), TAG_DOUBLE);
        assert_eq!(first_byte(&IbtValue::Number(-2147483649.0)), TAG_DOUBLE);
    }

    #[test]
    fn test_round_trip_scalars() {
        for value in [
            IbtValue::Number(42.0),
            IbtValue::Number(-1.25),
            IbtValue::Number(1e18),
            IbtValue::Boolean(true),
            IbtValue::Boolean(false),
            IbtValue::Text("hello".to_string()),
            IbtValue::Text(String::new()),
            IbtValue::Nil,
        ] {
            assert_eq!(round_trip(value.clone()), value);
        }
    }

    #[test]
    fn test_round_trip_nested_table() {
        let value = IbtValue::Table(vec![
            ("x".into(), IbtValue::Number(3.0)),
            ("y".into(), IbtValue::Table(vec![(1.into(), true.into())])),
            (IbtValue::Nil, "last".into()),
        ]);
        assert_eq!(round_trip(value.clone()), value);
    }

    #[test]
    fn test_table_keys_precede_values_on_the_wire() {
        // Layout: tag(4), count, all keys, then all values.
        let value = IbtValue::Table(vec![("a".into(), "b".into())]);
        let mut w = ByteWriter::new();
        value.encode(&mut w).unwrap();
        assert_eq!(
            w.into_bytes(),
            [TAG_TABLE, 1, TAG_STRING, b'a', 0, TAG_STRING, b'b', 0]
        );
    }

    #[test]
    fn test_oversized_table_is_rejected() {
        let entries = (0..256)
            .map(|i| (IbtValue::Number(i as f64), IbtValue::Nil))
            .collect();
        let mut w = ByteWriter::new();
        assert_eq!(
            IbtValue::Table(entries).encode(&mut w),
            Err(IbtError::TableTooLarge(256))
        );
    }

    #[test]
    fn test_unknown_tag_is_rejected() {
        let mut r = ByteReader::new(&[9]);
        assert_eq!(IbtValue::decode(&mut r), Err(IbtError::UnknownTag(9)));
    }

    #[test]
    fn test_truncated_input_is_rejected() {
        let mut r = ByteReader::new(&[TAG_INTEGER, 1, 2]);
        assert!(matches!(
            IbtValue::decode(&mut r),
            Err(IbtError::Malformed(_))
        ));
    }
}
