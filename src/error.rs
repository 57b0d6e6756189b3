use crate::vint::ElementId;

/// Reason a Master element failed a schema conformance check.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaViolation {
    /// A child's ID is not listed among its parent's allowed children.
    #[error("element {id} is not allowed as a child of {parent}")]
    DisallowedParent {
        /// The offending child.
        id: ElementId,
        /// The parent it was found under.
        parent: ElementId,
    },
    /// A schema-required child is absent.
    #[error("required element {id} is missing from {parent}")]
    MissingRequired {
        /// The missing child's ID.
        id: ElementId,
        /// The parent it should be under.
        parent: ElementId,
    },
    /// A schema-unique child appears more than once.
    #[error("element {id} appears more than once under {parent}, but is schema-unique")]
    DuplicateUnique {
        /// The duplicated child's ID.
        id: ElementId,
        /// The parent it was found under.
        parent: ElementId,
    },
    /// An atomic value lies outside its schema-declared range.
    #[error("element {id} has an out-of-range value: {detail}")]
    BadValue {
        /// The offending element's ID.
        id: ElementId,
        /// A human-readable description of the violated range.
        detail: String,
    },
}

/// Error types for this crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error, from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A VINT's first byte was `0x00`; no supported width marker was found.
    #[error("malformed VINT: width marker exceeds 8 bytes")]
    MalformedVint,

    /// Ran out of bytes while decoding a VINT, a header, or an element body.
    #[error("unexpected end of input")]
    UnexpectedEof,

    /// A value could not be widened to fit in 8 bytes, or `min_width` itself exceeded 8.
    #[error("value {value} cannot be VINT-encoded in at least {min_width} byte(s)")]
    VintTooLarge {
        /// The value that was too large.
        value: u64,
        /// The minimum width the caller asked for.
        min_width: u8,
    },

    /// A Unicode (UTF-8) element's payload was not valid UTF-8.
    #[error("element {0} is not valid UTF-8")]
    InvalidUtf8(ElementId),

    /// An atomic value was rejected by `Element::value_set` before ever reaching `consistent()`.
    #[error("element {id} rejected value: {detail}")]
    ValueOutOfRange {
        /// The element whose value was rejected.
        id: ElementId,
        /// A human-readable description of why.
        detail: String,
    },

    /// `consistent()` found a schema conformance problem.
    #[error(transparent)]
    Schema(#[from] SchemaViolation),

    /// The tree is not positionally consistent; `rearrange`/`normalize` must run first.
    #[error("element {0} is not positionally consistent; call rearrange() first")]
    Inconsistent(ElementId),

    /// A container does not have enough room to hold its children, and cannot grow.
    #[error("element {id} needs {needed} bytes but only {available} are available")]
    InsufficientSpace {
        /// The container that ran out of room.
        id: ElementId,
        /// Bytes required.
        needed: u64,
        /// Bytes actually available.
        available: u64,
    },

    /// `Segment::normalize` could not fit every child in either the head or tail region.
    #[error("segment has no room left for new metadata in either the head or tail region")]
    SegmentFull,

    /// A requested relocation would cross a region the caller marked immovable (e.g. Clusters).
    #[error("cannot rearrange element {id}: {reason}")]
    CannotRearrange {
        /// The element that could not be moved.
        id: ElementId,
        /// Why not.
        reason: String,
    },

    /// Attempted to resize or semantically modify an `Unsupported` element.
    #[error("element {0} has an unrecognized ID and cannot be modified, only passed through")]
    UnsupportedMutation(ElementId),

    /// An ID has no schema entry, in a context that requires one (e.g. a caller-chosen ID).
    #[error("element ID {0} has no schema entry")]
    UnknownElement(ElementId),
}

/// Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
