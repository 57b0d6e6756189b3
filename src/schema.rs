//! The Matroska/EBML schema table: a read-only mapping from element ID to its shape.
//!
//! This is "external input" per spec — here it ships as a static table compiled into the
//! crate, but nothing in the rest of the tree depends on it being static; a caller embedding
//! a different or extended schema only needs to provide another `&'static [SchemaEntry]`.

use crate::value::ValueKind;
use crate::vint::{ElementId, VOID_ID};

/// How a Master element's children are read in summary mode.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SummaryBehavior {
    /// `read_summary` behaves exactly like `read_data`.
    Normal,
    /// `read_summary` skips this element's children entirely, recording only its header.
    Defer,
}

/// The structural kind a schema entry declares for an element.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Kind {
    /// A container of child elements.
    Master,
    /// An atomic leaf of the given value kind.
    Atomic(ValueKind),
    /// Padding.
    Void,
}

/// Which parents an element is allowed to appear under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllowedParents {
    /// Permitted under any parent (e.g. Void, CRC-32).
    Any,
    /// Permitted only under the listed parent IDs.
    Only(&'static [ElementId]),
}

/// A declared numeric range for an atomic value, checked by `consistent()`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Range {
    /// No declared range.
    Unbounded,
    /// Inclusive `u64` range.
    Unsigned(u64, u64),
}

/// One row of the schema table: everything the core needs to know about an element ID
/// without interpreting its semantics.
#[derive(Debug, Clone, Copy)]
pub struct SchemaEntry {
    /// The element's ID.
    pub id: ElementId,
    /// Human-readable name, e.g. `"Segment"`.
    pub name: &'static str,
    /// Structural kind.
    pub kind: Kind,
    /// Parents this element may appear under.
    pub allowed_parents: AllowedParents,
    /// Whether every occurrence of the parent must contain this child.
    pub required: bool,
    /// Whether this child may appear at most once under its parent.
    pub unique: bool,
    /// Declared value range, for atomics.
    pub range: Range,
    /// Read behavior under `read_summary`.
    pub summary_behavior: SummaryBehavior,
}

impl SchemaEntry {
    /// The default value for this entry's kind (atomics only; ignored for Master/Void).
    pub fn default_value(&self) -> crate::value::Value {
        match self.kind {
            Kind::Atomic(k) => crate::value::Value::default_for(k),
            _ => crate::value::Value::Binary(Vec::new()),
        }
    }
}

const fn id(v: u64) -> ElementId {
    ElementId::from_encoded(v)
}

macro_rules! parents {
    ($($name:ident),* $(,)?) => {
        AllowedParents::Only(&[$($name),*])
    };
}

// EBML header elements.
pub const EBML: ElementId = id(0x1A45_DFA3);
pub const EBML_VERSION: ElementId = id(0x4286);
pub const EBML_READ_VERSION: ElementId = id(0x42F7);
pub const EBML_MAX_ID_LENGTH: ElementId = id(0x42F2);
pub const EBML_MAX_SIZE_LENGTH: ElementId = id(0x42F3);
pub const DOC_TYPE: ElementId = id(0x4282);
pub const DOC_TYPE_VERSION: ElementId = id(0x4287);
pub const DOC_TYPE_READ_VERSION: ElementId = id(0x4285);

// Segment and its direct children.
pub const SEGMENT: ElementId = id(0x1853_8067);
pub const SEEK_HEAD: ElementId = id(0x114D_9B74);
pub const SEEK: ElementId = id(0x4DBB);
pub const SEEK_ID: ElementId = id(0x53AB);
pub const SEEK_POSITION: ElementId = id(0x53AC);
pub const INFO: ElementId = id(0x1549_A966);
pub const TIMESTAMP_SCALE: ElementId = id(0x2AD7_B1);
pub const DURATION: ElementId = id(0x4489);
pub const DATE_UTC: ElementId = id(0x4461);
pub const TITLE: ElementId = id(0x7BA9);
pub const MUXING_APP: ElementId = id(0x4D80);
pub const WRITING_APP: ElementId = id(0x5741);
pub const SEGMENT_UUID: ElementId = id(0x73A4);
pub const TRACKS: ElementId = id(0x1654_AE6B);
pub const CHAPTERS: ElementId = id(0x1043_A770);
pub const CUES: ElementId = id(0x1C53_BB6B);
pub const ATTACHMENTS: ElementId = id(0x1941_A469);
pub const ATTACHED_FILE: ElementId = id(0x61A7);
pub const FILE_DESCRIPTION: ElementId = id(0x467E);
pub const FILE_NAME: ElementId = id(0x466E);
pub const FILE_MIME_TYPE: ElementId = id(0x4660);
pub const FILE_DATA: ElementId = id(0x465C);
pub const FILE_UID: ElementId = id(0x46AE);
pub const TAGS: ElementId = id(0x1254_C367);
pub const CLUSTER: ElementId = id(0x1F43_B675);

// Supplementary elements allowed anywhere.
pub const CRC32: ElementId = id(0xBF);

/// Full schema table. Order does not matter; `lookup` does a linear scan, which is fine at
/// this table's size (tens of entries, looked up a handful of times per element read).
pub static REGISTRY: &[SchemaEntry] = &[
    SchemaEntry {
        id: EBML,
        name: "EBML",
        kind: Kind::Master,
        allowed_parents: AllowedParents::Any,
        required: false,
        unique: true,
        range: Range::Unbounded,
        summary_behavior: SummaryBehavior::Normal,
    },
    SchemaEntry {
        id: EBML_VERSION,
        name: "EBMLVersion",
        kind: Kind::Atomic(ValueKind::Unsigned),
        allowed_parents: parents![EBML],
        required: false,
        unique: true,
        range: Range::Unbounded,
        summary_behavior: SummaryBehavior::Normal,
    },
    SchemaEntry {
        id: EBML_READ_VERSION,
        name: "EBMLReadVersion",
        kind: Kind::Atomic(ValueKind::Unsigned),
        allowed_parents: parents![EBML],
        required: false,
        unique: true,
        range: Range::Unbounded,
        summary_behavior: SummaryBehavior::Normal,
    },
    SchemaEntry {
        id: EBML_MAX_ID_LENGTH,
        name: "EBMLMaxIDLength",
        kind: Kind::Atomic(ValueKind::Unsigned),
        allowed_parents: parents![EBML],
        required: true,
        unique: true,
        range: Range::Unsigned(1, 4),
        summary_behavior: SummaryBehavior::Normal,
    },
    SchemaEntry {
        id: EBML_MAX_SIZE_LENGTH,
        name: "EBMLMaxSizeLength",
        kind: Kind::Atomic(ValueKind::Unsigned),
        allowed_parents: parents![EBML],
        required: true,
        unique: true,
        range: Range::Unsigned(1, 8),
        summary_behavior: SummaryBehavior::Normal,
    },
    SchemaEntry {
        id: DOC_TYPE,
        name: "DocType",
        kind: Kind::Atomic(ValueKind::String),
        allowed_parents: parents![EBML],
        required: false,
        unique: true,
        range: Range::Unbounded,
        summary_behavior: SummaryBehavior::Normal,
    },
    SchemaEntry {
        id: DOC_TYPE_VERSION,
        name: "DocTypeVersion",
        kind: Kind::Atomic(ValueKind::Unsigned),
        allowed_parents: parents![EBML],
        required: false,
        unique: true,
        range: Range::Unbounded,
        summary_behavior: SummaryBehavior::Normal,
    },
    SchemaEntry {
        id: DOC_TYPE_READ_VERSION,
        name: "DocTypeReadVersion",
        kind: Kind::Atomic(ValueKind::Unsigned),
        allowed_parents: parents![EBML],
        required: false,
        unique: true,
        range: Range::Unbounded,
        summary_behavior: SummaryBehavior::Normal,
    },
    SchemaEntry {
        id: SEGMENT,
        name: "Segment",
        kind: Kind::Master,
        allowed_parents: AllowedParents::Any,
        required: false,
        unique: false,
        range: Range::Unbounded,
        summary_behavior: SummaryBehavior::Normal,
    },
    SchemaEntry {
        id: SEEK_HEAD,
        name: "SeekHead",
        kind: Kind::Master,
        allowed_parents: parents![SEGMENT],
        required: false,
        unique: false,
        range: Range::Unbounded,
        summary_behavior: SummaryBehavior::Normal,
    },
    SchemaEntry {
        id: SEEK,
        name: "Seek",
        kind: Kind::Master,
        allowed_parents: parents![SEEK_HEAD],
        required: false,
        unique: false,
        range: Range::Unbounded,
        summary_behavior: SummaryBehavior::Normal,
    },
    SchemaEntry {
        id: SEEK_ID,
        name: "SeekID",
        kind: Kind::Atomic(ValueKind::Binary),
        allowed_parents: parents![SEEK],
        required: true,
        unique: true,
        range: Range::Unbounded,
        summary_behavior: SummaryBehavior::Normal,
    },
    SchemaEntry {
        id: SEEK_POSITION,
        name: "SeekPosition",
        kind: Kind::Atomic(ValueKind::Unsigned),
        allowed_parents: parents![SEEK],
        required: true,
        unique: true,
        range: Range::Unbounded,
        summary_behavior: SummaryBehavior::Normal,
    },
    SchemaEntry {
        id: INFO,
        name: "Info",
        kind: Kind::Master,
        allowed_parents: parents![SEGMENT],
        required: true,
        unique: true,
        range: Range::Unbounded,
        summary_behavior: SummaryBehavior::Normal,
    },
    SchemaEntry {
        id: TIMESTAMP_SCALE,
        name: "TimestampScale",
        kind: Kind::Atomic(ValueKind::Unsigned),
        allowed_parents: parents![INFO],
        required: true,
        unique: true,
        range: Range::Unsigned(1, u64::MAX),
        summary_behavior: SummaryBehavior::Normal,
    },
    SchemaEntry {
        id: DURATION,
        name: "Duration",
        kind: Kind::Atomic(ValueKind::Float),
        allowed_parents: parents![INFO],
        required: false,
        unique: true,
        range: Range::Unbounded,
        summary_behavior: SummaryBehavior::Normal,
    },
    SchemaEntry {
        id: DATE_UTC,
        name: "DateUTC",
        kind: Kind::Atomic(ValueKind::Date),
        allowed_parents: parents![INFO],
        required: false,
        unique: true,
        range: Range::Unbounded,
        summary_behavior: SummaryBehavior::Normal,
    },
    SchemaEntry {
        id: TITLE,
        name: "Title",
        kind: Kind::Atomic(ValueKind::Unicode),
        allowed_parents: parents![INFO],
        required: false,
        unique: true,
        range: Range::Unbounded,
        summary_behavior: SummaryBehavior::Normal,
    },
    SchemaEntry {
        id: SEGMENT_UUID,
        name: "SegmentUUID",
        kind: Kind::Atomic(ValueKind::Binary),
        allowed_parents: parents![INFO],
        required: false,
        unique: true,
        range: Range::Unbounded,
        summary_behavior: SummaryBehavior::Normal,
    },
    SchemaEntry {
        id: MUXING_APP,
        name: "MuxingApp",
        kind: Kind::Atomic(ValueKind::Unicode),
        allowed_parents: parents![INFO],
        required: true,
        unique: true,
        range: Range::Unbounded,
        summary_behavior: SummaryBehavior::Normal,
    },
    SchemaEntry {
        id: WRITING_APP,
        name: "WritingApp",
        kind: Kind::Atomic(ValueKind::Unicode),
        allowed_parents: parents![INFO],
        required: true,
        unique: true,
        range: Range::Unbounded,
        summary_behavior: SummaryBehavior::Normal,
    },
    SchemaEntry {
        id: TRACKS,
        name: "Tracks",
        kind: Kind::Master,
        allowed_parents: parents![SEGMENT],
        required: false,
        unique: true,
        range: Range::Unbounded,
        summary_behavior: SummaryBehavior::Normal,
    },
    SchemaEntry {
        id: CHAPTERS,
        name: "Chapters",
        kind: Kind::Master,
        allowed_parents: parents![SEGMENT],
        required: false,
        unique: true,
        range: Range::Unbounded,
        summary_behavior: SummaryBehavior::Normal,
    },
    SchemaEntry {
        id: CUES,
        name: "Cues",
        kind: Kind::Master,
        allowed_parents: parents![SEGMENT],
        required: false,
        unique: true,
        range: Range::Unbounded,
        summary_behavior: SummaryBehavior::Defer,
    },
    SchemaEntry {
        id: ATTACHMENTS,
        name: "Attachments",
        kind: Kind::Master,
        allowed_parents: parents![SEGMENT],
        required: false,
        unique: true,
        range: Range::Unbounded,
        summary_behavior: SummaryBehavior::Normal,
    },
    SchemaEntry {
        id: ATTACHED_FILE,
        name: "AttachedFile",
        kind: Kind::Master,
        allowed_parents: parents![ATTACHMENTS],
        required: false,
        unique: false,
        range: Range::Unbounded,
        summary_behavior: SummaryBehavior::Normal,
    },
    SchemaEntry {
        id: FILE_DESCRIPTION,
        name: "FileDescription",
        kind: Kind::Atomic(ValueKind::Unicode),
        allowed_parents: parents![ATTACHED_FILE],
        required: false,
        unique: true,
        range: Range::Unbounded,
        summary_behavior: SummaryBehavior::Normal,
    },
    SchemaEntry {
        id: FILE_NAME,
        name: "FileName",
        kind: Kind::Atomic(ValueKind::Unicode),
        allowed_parents: parents![ATTACHED_FILE],
        required: true,
        unique: true,
        range: Range::Unbounded,
        summary_behavior: SummaryBehavior::Normal,
    },
    SchemaEntry {
        id: FILE_MIME_TYPE,
        name: "FileMimeType",
        kind: Kind::Atomic(ValueKind::String),
        allowed_parents: parents![ATTACHED_FILE],
        required: true,
        unique: true,
        range: Range::Unbounded,
        summary_behavior: SummaryBehavior::Normal,
    },
    SchemaEntry {
        id: FILE_DATA,
        name: "FileData",
        kind: Kind::Atomic(ValueKind::Binary),
        allowed_parents: parents![ATTACHED_FILE],
        required: true,
        unique: true,
        range: Range::Unbounded,
        summary_behavior: SummaryBehavior::Normal,
    },
    SchemaEntry {
        id: FILE_UID,
        name: "FileUID",
        kind: Kind::Atomic(ValueKind::Unsigned),
        allowed_parents: parents![ATTACHED_FILE],
        required: true,
        unique: true,
        range: Range::Unbounded,
        summary_behavior: SummaryBehavior::Normal,
    },
    SchemaEntry {
        id: TAGS,
        name: "Tags",
        kind: Kind::Master,
        allowed_parents: parents![SEGMENT],
        required: false,
        unique: false,
        range: Range::Unbounded,
        summary_behavior: SummaryBehavior::Normal,
    },
    SchemaEntry {
        id: CLUSTER,
        name: "Cluster",
        kind: Kind::Master,
        allowed_parents: parents![SEGMENT],
        required: false,
        unique: false,
        range: Range::Unbounded,
        summary_behavior: SummaryBehavior::Defer,
    },
    SchemaEntry {
        id: VOID_ID,
        name: "Void",
        kind: Kind::Void,
        allowed_parents: AllowedParents::Any,
        required: false,
        unique: false,
        range: Range::Unbounded,
        summary_behavior: SummaryBehavior::Normal,
    },
    SchemaEntry {
        id: CRC32,
        name: "CRC-32",
        kind: Kind::Atomic(ValueKind::Binary),
        allowed_parents: AllowedParents::Any,
        required: false,
        unique: true,
        range: Range::Unbounded,
        summary_behavior: SummaryBehavior::Normal,
    },
];

/// Look up an element's schema entry by ID. Returns `None` for unrecognized IDs, which the
/// element model turns into an `Unsupported` element.
pub fn lookup(id: ElementId) -> Option<&'static SchemaEntry> {
    REGISTRY.iter().find(|e| e.id == id)
}

impl AllowedParents {
    /// Whether `parent` (or "no parent" / top-level, when `parent` is `None`) is permitted.
    pub fn permits(&self, parent: Option<ElementId>) -> bool {
        match (self, parent) {
            (AllowedParents::Any, _) => true,
            (AllowedParents::Only(_), None) => false,
            (AllowedParents::Only(ids), Some(p)) => ids.contains(&p),
        }
    }
}

impl Range {
    /// Whether `value` satisfies this range.
    pub fn contains(&self, value: &crate::value::Value) -> bool {
        match (self, value) {
            (Range::Unbounded, _) => true,
            (Range::Unsigned(lo, hi), crate::value::Value::Unsigned(v)) => v >= lo && v <= hi,
            (Range::Unsigned(_, _), _) => true,
        }
    }
}

/// Named IDs for every element in [`REGISTRY`], so callers address elements by name rather
/// than spelling out raw hex constants.
pub mod ids {
    pub use super::{
        ATTACHED_FILE, ATTACHMENTS, CHAPTERS, CLUSTER, CRC32, CUES, DATE_UTC, DOC_TYPE,
        DOC_TYPE_READ_VERSION, DOC_TYPE_VERSION, DURATION, EBML, EBML_MAX_ID_LENGTH,
        EBML_MAX_SIZE_LENGTH, EBML_READ_VERSION, EBML_VERSION, FILE_DATA, FILE_DESCRIPTION,
        FILE_MIME_TYPE, FILE_NAME, FILE_UID, INFO, MUXING_APP, SEEK, SEEK_HEAD, SEEK_ID,
        SEEK_POSITION, SEGMENT, SEGMENT_UUID, TAGS, TIMESTAMP_SCALE, TITLE, TRACKS, WRITING_APP,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn void_is_permitted_anywhere() {
        let entry = lookup(VOID_ID).unwrap();
        assert!(entry.allowed_parents.permits(Some(SEGMENT)));
        assert!(entry.allowed_parents.permits(None));
    }

    #[test]
    fn unknown_id_has_no_entry() {
        assert!(lookup(id(0x1234_5678)).is_none());
    }

    #[test]
    fn info_requires_timestamp_scale() {
        let entry = lookup(TIMESTAMP_SCALE).unwrap();
        assert!(entry.required);
        assert!(entry.allowed_parents.permits(Some(INFO)));
        assert!(!entry.allowed_parents.permits(Some(SEGMENT)));
    }
}
