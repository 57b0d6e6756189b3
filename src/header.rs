//! Element header framing: an ID VINT followed by a size VINT.

use crate::vint::{ElementId, Vint};
use std::io::Read;

/// An element header: ID plus declared data size.
///
/// `size_width` tracks the encoded width of the size VINT separately from the value it
/// carries, so that reserved slack (a size field written wider than its value strictly
/// needs) survives a read-modify-write cycle instead of silently collapsing to minimal
/// width on every resize. `None` size means the reserved "unknown size" marker.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Header {
    /// The element's ID.
    pub id: ElementId,
    /// Declared data size in bytes, or `None` for the "unknown size" marker.
    pub size: Option<u64>,
    /// Encoded width of the size VINT, 1..=8.
    pub size_width: u8,
}

impl Header {
    /// Construct a header whose size VINT is written at its minimal width.
    pub fn new(id: ElementId, size: u64) -> Self {
        Self {
            id,
            size: Some(size),
            size_width: Vint::min_width(size),
        }
    }

    /// Construct a header carrying the reserved unknown-size marker.
    pub fn unknown_size(id: ElementId, width: u8) -> Self {
        Self {
            id,
            size: None,
            size_width: width,
        }
    }

    /// Total encoded length of this header: ID width plus size-field width.
    pub fn total_header_width(&self) -> u64 {
        self.id.width() as u64 + self.size_width as u64
    }

    /// Read a header from a byte stream.
    pub fn read_from<R: Read>(r: &mut R) -> crate::Result<Self> {
        let id = ElementId::read_from(r)?;
        let size_vint = Vint::read_from(r)?;
        let size = if size_vint.is_unknown {
            None
        } else {
            Some(size_vint.value)
        };
        Ok(Self {
            id,
            size,
            size_width: size_vint.width,
        })
    }

    /// Decode a header from an in-memory buffer, advancing it past the consumed bytes.
    pub fn decode(buf: &mut &[u8]) -> crate::Result<Self> {
        let mut cursor = std::io::Cursor::new(&buf[..]);
        let header = Self::read_from(&mut cursor)?;
        let consumed = cursor.position() as usize;
        *buf = &buf[consumed..];
        Ok(header)
    }

    /// Encode this header, respecting `size_width` for the size field (reserved slack is
    /// preserved; the ID's width is fixed by its encoded form).
    pub fn encode(&self) -> crate::Result<Vec<u8>> {
        let mut out = self.id.encode();
        let size_vint = match self.size {
            Some(v) => Vint::new(v),
            None => Vint::unknown(self.size_width),
        };
        out.extend(size_vint.encode_at_width(self.size_width)?);
        Ok(out)
    }

    /// Reserve at least `width` bytes for the size field, growing `size_width` if it is
    /// currently narrower. Never shrinks; callers use [`Header::shrink_size_width`] for that.
    pub fn reserve_size_width(&mut self, width: u8) {
        self.size_width = self.size_width.max(width);
    }

    /// Shrink the size field back to the minimal width its current value needs. A no-op on
    /// an unknown-size header, since its width is a deliberate framing choice, not slack.
    pub fn shrink_size_width(&mut self) {
        if let Some(v) = self.size {
            self.size_width = Vint::min_width(v);
        }
    }
}
