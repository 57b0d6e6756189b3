//! The seven EBML primitive payload types and their encode/decode rules.

use crate::error::Error;
use crate::vint::ElementId;

/// Nanoseconds between the Unix epoch and 2001-01-01T00:00:00 UTC, the EBML Date epoch.
const DATE_EPOCH_OFFSET_NS: i64 = 978_307_200 * 1_000_000_000;

/// The primitive kind an Atomic element's schema entry declares.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// Big-endian unsigned integer, 0-8 bytes.
    Unsigned,
    /// Big-endian two's-complement signed integer, 0-8 bytes.
    Signed,
    /// IEEE-754 big-endian float, 4 or 8 bytes.
    Float,
    /// ASCII text.
    String,
    /// UTF-8 text.
    Unicode,
    /// Nanoseconds relative to 2001-01-01T00:00:00 UTC.
    Date,
    /// Opaque bytes.
    Binary,
}

/// A decoded Atomic value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// An unsigned integer.
    Unsigned(u64),
    /// A signed integer.
    Signed(i64),
    /// A floating point number.
    Float(f64),
    /// An ASCII string, trailing NUL bytes already stripped.
    String(String),
    /// A UTF-8 string.
    Unicode(String),
    /// Nanoseconds relative to 2001-01-01T00:00:00 UTC.
    Date(i64),
    /// Opaque bytes.
    Binary(Vec<u8>),
}

impl Value {
    /// The `ValueKind` this value was decoded (or will be encoded) as.
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Unsigned(_) => ValueKind::Unsigned,
            Value::Signed(_) => ValueKind::Signed,
            Value::Float(_) => ValueKind::Float,
            Value::String(_) => ValueKind::String,
            Value::Unicode(_) => ValueKind::Unicode,
            Value::Date(_) => ValueKind::Date,
            Value::Binary(_) => ValueKind::Binary,
        }
    }

    /// The default value for a payload of zero bytes, per kind.
    pub fn default_for(kind: ValueKind) -> Value {
        match kind {
            ValueKind::Unsigned => Value::Unsigned(0),
            ValueKind::Signed => Value::Signed(0),
            ValueKind::Float => Value::Float(0.0),
            ValueKind::String => Value::String(String::new()),
            ValueKind::Unicode => Value::Unicode(String::new()),
            ValueKind::Date => Value::Date(0),
            ValueKind::Binary => Value::Binary(Vec::new()),
        }
    }

    /// Decode a value of the given kind from its raw payload bytes.
    pub fn decode(kind: ValueKind, id: ElementId, bytes: &[u8]) -> crate::Result<Value> {
        match kind {
            ValueKind::Unsigned => {
                if bytes.len() > 8 {
                    return Err(Error::ValueOutOfRange {
                        id,
                        detail: format!("unsigned payload of {} bytes exceeds 8", bytes.len()),
                    });
                }
                let mut buf = [0u8; 8];
                buf[8 - bytes.len()..].copy_from_slice(bytes);
                Ok(Value::Unsigned(u64::from_be_bytes(buf)))
            }
            ValueKind::Signed => {
                if bytes.len() > 8 {
                    return Err(Error::ValueOutOfRange {
                        id,
                        detail: format!("signed payload of {} bytes exceeds 8", bytes.len()),
                    });
                }
                if bytes.is_empty() {
                    return Ok(Value::Signed(0));
                }
                let sign_fill = if bytes[0] & 0x80 != 0 { 0xFFu8 } else { 0x00 };
                let mut buf = [sign_fill; 8];
                buf[8 - bytes.len()..].copy_from_slice(bytes);
                Ok(Value::Signed(i64::from_be_bytes(buf)))
            }
            ValueKind::Float => match bytes.len() {
                0 => Ok(Value::Float(0.0)),
                4 => {
                    let mut buf = [0u8; 4];
                    buf.copy_from_slice(bytes);
                    Ok(Value::Float(f32::from_be_bytes(buf) as f64))
                }
                8 => {
                    let mut buf = [0u8; 8];
                    buf.copy_from_slice(bytes);
                    Ok(Value::Float(f64::from_be_bytes(buf)))
                }
                n => Err(Error::ValueOutOfRange {
                    id,
                    detail: format!("float payload must be 0, 4, or 8 bytes, got {n}"),
                }),
            },
            ValueKind::String => {
                let trimmed = trim_trailing_nul(bytes);
                if !trimmed.is_ascii() {
                    return Err(Error::ValueOutOfRange {
                        id,
                        detail: "ASCII string payload contains non-ASCII bytes".into(),
                    });
                }
                Ok(Value::String(
                    String::from_utf8_lossy(trimmed).into_owned(),
                ))
            }
            ValueKind::Unicode => {
                let trimmed = trim_trailing_nul(bytes);
                let s = std::str::from_utf8(trimmed).map_err(|_| Error::InvalidUtf8(id))?;
                Ok(Value::Unicode(s.to_string()))
            }
            ValueKind::Date => match bytes.len() {
                0 => Ok(Value::Date(0)),
                8 => {
                    let mut buf = [0u8; 8];
                    buf.copy_from_slice(bytes);
                    Ok(Value::Date(i64::from_be_bytes(buf)))
                }
                n => Err(Error::ValueOutOfRange {
                    id,
                    detail: format!("date payload must be 0 or 8 bytes, got {n}"),
                }),
            },
            ValueKind::Binary => Ok(Value::Binary(bytes.to_vec())),
        }
    }

    /// Encode this value to its canonical minimal-width byte representation.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Value::Unsigned(v) => {
                let bytes = v.to_be_bytes();
                let first_nonzero = bytes.iter().position(|&b| b != 0);
                match first_nonzero {
                    Some(i) => bytes[i..].to_vec(),
                    None => Vec::new(),
                }
            }
            Value::Signed(v) => {
                if *v == 0 {
                    return Vec::new();
                }
                let bytes = v.to_be_bytes();
                let sign_byte = if *v < 0 { 0xFFu8 } else { 0x00 };
                let mut start = 0;
                while start < 7
                    && bytes[start] == sign_byte
                    && (bytes[start + 1] & 0x80 == sign_byte & 0x80)
                {
                    start += 1;
                }
                bytes[start..].to_vec()
            }
            Value::Float(v) => {
                if *v == 0.0 {
                    return Vec::new();
                }
                // f32 round-trip check: encode as 4 bytes when no precision is lost.
                let as_f32 = *v as f32;
                if as_f32 as f64 == *v {
                    as_f32.to_be_bytes().to_vec()
                } else {
                    v.to_be_bytes().to_vec()
                }
            }
            Value::String(s) => s.as_bytes().to_vec(),
            Value::Unicode(s) => s.as_bytes().to_vec(),
            Value::Date(ns) => {
                if *ns == 0 {
                    Vec::new()
                } else {
                    ns.to_be_bytes().to_vec()
                }
            }
            Value::Binary(b) => b.clone(),
        }
    }

    /// Minimal encoded payload size in bytes, without actually allocating the bytes.
    pub fn encoded_len(&self) -> u64 {
        self.encode().len() as u64
    }

    /// Interpret a `Date` value as nanoseconds since the Unix epoch.
    pub fn date_as_unix_nanos(ns_since_2001: i64) -> i64 {
        ns_since_2001.saturating_add(DATE_EPOCH_OFFSET_NS)
    }

    /// Convert nanoseconds since the Unix epoch into the EBML Date representation.
    pub fn unix_nanos_as_date(unix_nanos: i64) -> i64 {
        unix_nanos.saturating_sub(DATE_EPOCH_OFFSET_NS)
    }
}

fn trim_trailing_nul(bytes: &[u8]) -> &[u8] {
    let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    &bytes[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    const DUMMY_ID: ElementId = ElementId::from_encoded(0x80);

    #[test]
    fn unsigned_zero_bytes_is_zero() {
        assert_eq!(
            Value::decode(ValueKind::Unsigned, DUMMY_ID, &[]).unwrap(),
            Value::Unsigned(0)
        );
    }

    #[test]
    fn unsigned_roundtrip() {
        for &v in &[0u64, 1, 255, 256, u64::MAX] {
            let encoded = Value::Unsigned(v).encode();
            let decoded = Value::decode(ValueKind::Unsigned, DUMMY_ID, &encoded).unwrap();
            assert_eq!(decoded, Value::Unsigned(v));
        }
        assert_eq!(Value::Unsigned(0).encode().len(), 0);
        assert_eq!(Value::Unsigned(255).encode().len(), 1);
        assert_eq!(Value::Unsigned(256).encode().len(), 2);
    }

    #[test]
    fn signed_roundtrip() {
        for &v in &[0i64, 1, -1, 127, -128, i64::MIN, i64::MAX] {
            let encoded = Value::Signed(v).encode();
            let decoded = Value::decode(ValueKind::Signed, DUMMY_ID, &encoded).unwrap();
            assert_eq!(decoded, Value::Signed(v));
        }
        assert_eq!(Value::Signed(0).encode().len(), 0);
    }

    #[test]
    fn float_widths() {
        assert_eq!(
            Value::decode(ValueKind::Float, DUMMY_ID, &[]).unwrap(),
            Value::Float(0.0)
        );
        assert!(Value::decode(ValueKind::Float, DUMMY_ID, &[0u8; 3]).is_err());
        let encoded = Value::Float(1.5).encode();
        assert_eq!(encoded.len(), 4);
        assert_eq!(
            Value::decode(ValueKind::Float, DUMMY_ID, &encoded).unwrap(),
            Value::Float(1.5)
        );
        let encoded_wide = Value::Float(0.1).encode();
        assert_eq!(encoded_wide.len(), 8);
    }

    #[test]
    fn string_trims_trailing_nul() {
        let decoded = Value::decode(ValueKind::String, DUMMY_ID, b"hi\0\0").unwrap();
        assert_eq!(decoded, Value::String("hi".to_string()));
    }

    #[test]
    fn unicode_rejects_invalid_utf8() {
        let bad = [0xFFu8, 0xFE];
        assert!(matches!(
            Value::decode(ValueKind::Unicode, DUMMY_ID, &bad),
            Err(Error::InvalidUtf8(_))
        ));
    }

    #[test]
    fn date_zero_bytes_is_epoch() {
        assert_eq!(
            Value::decode(ValueKind::Date, DUMMY_ID, &[]).unwrap(),
            Value::Date(0)
        );
        assert_eq!(Value::Date(0).encode().len(), 0);
    }

    #[test]
    fn date_bad_width_rejected() {
        assert!(Value::decode(ValueKind::Date, DUMMY_ID, &[0u8; 4]).is_err());
    }

    #[test]
    fn binary_passthrough() {
        let bytes = vec![1, 2, 3, 0, 0];
        let decoded = Value::decode(ValueKind::Binary, DUMMY_ID, &bytes).unwrap();
        assert_eq!(decoded, Value::Binary(bytes));
    }
}
