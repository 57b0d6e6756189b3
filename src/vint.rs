//! EBML variable-length integers (RFC 8794 VINTs) and element IDs.

use crate::error::Error;
use std::fmt::{Debug, Display};
use std::io::Read;

/// Smallest VINT width, in bytes, able to hold `value`.
const fn min_width_for(value: u64) -> u8 {
    let leading_zeros = value.leading_zeros() as usize;
    let total_bits = 64 - leading_zeros;
    if total_bits == 0 {
        1
    } else {
        ((total_bits + 6) / 7) as u8
    }
}

/// Read one VINT's raw bytes, returning the value with the width marker stripped, the width
/// marker bit count (1..=8), and whether this is the reserved "unknown size" encoding.
fn read_raw<R: Read>(r: &mut R) -> crate::Result<(u64, u8, bool)> {
    let mut first = [0u8; 1];
    r.read_exact(&mut first).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            Error::UnexpectedEof
        } else {
            Error::Io(e)
        }
    })?;
    let first = first[0];
    if first == 0 {
        return Err(Error::MalformedVint);
    }
    let width = first.leading_zeros() as u8 + 1;
    let mut bytes = [0u8; 8];
    // `width` runs 1..=8; `0xFFu8 >> 8` would panic (Rust's shift-overflow check fires
    // regardless of width here), so widen before shifting and narrow back afterward.
    bytes[8 - width as usize] = first & ((0xFFu16 >> width) as u8);
    if width > 1 {
        r.read_exact(&mut bytes[8 - width as usize + 1..]).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                Error::UnexpectedEof
            } else {
                Error::Io(e)
            }
        })?;
    }
    let value = u64::from_be_bytes(bytes);
    let is_unknown = {
        let payload_bits = 7 * width as u32;
        let all_ones = if payload_bits >= 64 {
            u64::MAX
        } else {
            (1u64 << payload_bits) - 1
        };
        value == all_ones
    };
    Ok((value, width, is_unknown))
}

fn write_raw(value: u64, width: u8) -> crate::Result<Vec<u8>> {
    if !(1..=8).contains(&width) {
        return Err(Error::VintTooLarge { value, min_width: width });
    }
    if min_width_for(value) > width {
        return Err(Error::VintTooLarge { value, min_width: width });
    }
    let mut full = value.to_be_bytes();
    let slice = &mut full[8 - width as usize..];
    slice[0] |= 1u8 << (8 - width);
    Ok(slice.to_vec())
}

/// A decoded EBML variable-length unsigned integer, used for element data sizes.
///
/// The width marker is stripped from `value`; `width` records how many bytes the encoding
/// occupied so that a value can be re-emitted at its original width (header slack) rather
/// than always collapsing to the minimal width.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Vint {
    /// The decoded value, with the width marker removed.
    pub value: u64,
    /// Encoded width in bytes, 1..=8.
    pub width: u8,
    /// Whether this VINT is the reserved "unknown size" marker (all payload bits set to 1).
    pub is_unknown: bool,
}

impl Vint {
    /// A VINT of the given value at its minimal width.
    pub const fn new(value: u64) -> Self {
        Self {
            value,
            width: min_width_for(value),
            is_unknown: false,
        }
    }

    /// The reserved "unknown size" marker at the given width (default width 1).
    pub const fn unknown(width: u8) -> Self {
        let payload_bits = 7 * width as u32;
        let value = if payload_bits >= 64 {
            u64::MAX
        } else {
            (1u64 << payload_bits) - 1
        };
        Self {
            value,
            width,
            is_unknown: true,
        }
    }

    /// Smallest width that can represent `value`.
    pub const fn min_width(value: u64) -> u8 {
        min_width_for(value)
    }

    /// Read a VINT (used for sizes: the width marker is stripped from `value`).
    pub fn read_from<R: Read>(r: &mut R) -> crate::Result<Self> {
        let (value, width, is_unknown) = read_raw(r)?;
        Ok(Self { value, width, is_unknown })
    }

    /// Decode a VINT from an in-memory buffer, advancing it past the consumed bytes.
    pub fn decode(buf: &mut &[u8]) -> crate::Result<Self> {
        let mut cursor = std::io::Cursor::new(&buf[..]);
        let v = Self::read_from(&mut cursor)?;
        let consumed = cursor.position() as usize;
        *buf = &buf[consumed..];
        Ok(v)
    }

    /// Encode at a width no smaller than `min_width`, picking the smallest width that fits.
    pub fn encode(value: u64, min_width: u8) -> crate::Result<Vec<u8>> {
        let width = min_width_for(value).max(min_width.max(1));
        write_raw(value, width)
    }

    /// Encode at this VINT's own recorded width (for bit-exact passthrough of reserved slack).
    ///
    /// `self.value` for the unknown-size marker is already the all-ones payload for its
    /// width, so the normal encoding path produces the canonical unknown-size bytes too.
    pub fn encode_at_width(&self, width: u8) -> crate::Result<Vec<u8>> {
        write_raw(self.value, width)
    }
}

impl Display for Vint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value)
    }
}

/// An EBML element ID: the raw encoded form (width marker retained), per RFC 8794.
///
/// Matroska/EBML IDs are conventionally written and compared in their encoded form, e.g. the
/// Segment ID is `0x18538067`, not the marker-stripped integer it contains.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId {
    encoded: u64,
    width: u8,
}

impl ElementId {
    /// Construct an ID from its already-encoded (marker-included) representation.
    pub const fn from_encoded(encoded: u64) -> Self {
        let width = if encoded == 0 {
            1
        } else {
            ((64 - encoded.leading_zeros() + 7) / 8) as u8
        };
        Self { encoded, width }
    }

    /// The raw encoded value, e.g. `0x1A45DFA3` for the EBML header ID.
    pub const fn encoded(&self) -> u64 {
        self.encoded
    }

    /// Encoded width in bytes, 1..=4 for IDs per the EBML spec.
    pub const fn width(&self) -> u8 {
        self.width
    }

    /// Read an element ID (marker retained) from a reader.
    pub fn read_from<R: Read>(r: &mut R) -> crate::Result<Self> {
        let (value_stripped, width, _) = read_raw(r)?;
        let marker = 1u64 << (7 * width as u32);
        Ok(Self {
            encoded: value_stripped | marker,
            width,
        })
    }

    /// Decode an element ID from an in-memory buffer.
    pub fn decode(buf: &mut &[u8]) -> crate::Result<Self> {
        let mut cursor = std::io::Cursor::new(&buf[..]);
        let v = Self::read_from(&mut cursor)?;
        let consumed = cursor.position() as usize;
        *buf = &buf[consumed..];
        Ok(v)
    }

    /// Encode this ID (marker already embedded in `encoded()`).
    pub fn encode(&self) -> Vec<u8> {
        let width = self.width as usize;
        self.encoded.to_be_bytes()[8 - width..].to_vec()
    }
}

/// The well-known Void element ID, permitted under any parent.
pub const VOID_ID: ElementId = ElementId::from_encoded(0xEC);

impl Debug for ElementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ElementId(0x{:X})", self.encoded)
    }
}

impl Display for ElementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.width {
            1 => write!(f, "0x{:02X}", self.encoded),
            2 => write!(f, "0x{:04X}", self.encoded),
            3 => write!(f, "0x{:06X}", self.encoded),
            4 => write!(f, "0x{:08X}", self.encoded),
            _ => write!(f, "0x{:X}", self.encoded),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn min_width_table() {
        let cases: &[(u64, u8)] = &[
            (0, 1),
            (1, 1),
            (0x7E, 1),
            (0xFF, 2),
            (0x3FFF, 2),
            (0x4000, 3),
            (0xFF_FFFF_FFFF_FFFF, 8),
        ];
        for &(value, width) in cases {
            assert_eq!(Vint::min_width(value), width, "value=0x{value:X}");
        }
    }

    #[test]
    fn vint_roundtrip() {
        for &value in &[0u64, 1, 127, 128, 16383, 16384, u64::MAX >> 8] {
            let width = Vint::min_width(value);
            let encoded = Vint::encode(value, 1).unwrap();
            assert_eq!(encoded.len(), width as usize);
            let mut slice = &encoded[..];
            let decoded = Vint::decode(&mut slice).unwrap();
            assert_eq!(decoded.value, value);
            assert!(slice.is_empty());
        }
    }

    #[test]
    fn vint_encode_reserves_width() {
        let encoded = Vint::encode(1, 4).unwrap();
        assert_eq!(encoded.len(), 4);
        let mut slice = &encoded[..];
        let decoded = Vint::decode(&mut slice).unwrap();
        assert_eq!(decoded.value, 1);
        assert_eq!(decoded.width, 4);
    }

    #[test]
    fn vint_too_large_width() {
        assert!(matches!(
            Vint::encode(1, 9),
            Err(Error::VintTooLarge { .. })
        ));
    }

    #[test]
    fn malformed_first_byte() {
        let mut cursor = std::io::Cursor::new([0x00u8]);
        assert!(matches!(Vint::read_from(&mut cursor), Err(Error::MalformedVint)));
    }

    #[test]
    fn unexpected_eof() {
        let mut cursor = std::io::Cursor::new([0x01u8]); // marks width 8, no further bytes
        assert!(matches!(Vint::read_from(&mut cursor), Err(Error::UnexpectedEof)));
    }

    #[test]
    fn unknown_size_marker() {
        let mut cursor = std::io::Cursor::new([0xFFu8]);
        let v = Vint::read_from(&mut cursor).unwrap();
        assert!(v.is_unknown);
    }

    #[test]
    fn element_id_roundtrip() {
        let segment = ElementId::from_encoded(0x1853_8067);
        assert_eq!(segment.width(), 4);
        let encoded = segment.encode();
        let mut slice = &encoded[..];
        let decoded = ElementId::decode(&mut slice).unwrap();
        assert_eq!(decoded, segment);
        assert_eq!(format!("{segment}"), "0x18538067");
    }

    #[test]
    fn void_id_is_single_byte() {
        assert_eq!(VOID_ID.width(), 1);
        assert_eq!(VOID_ID.encoded(), 0xEC);
    }
}
