#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![doc = include_str!("../README.md")]

/// Error types for this crate.
mod error;
pub use error::*;

/// Variable-length integers and element IDs.
pub mod vint;

/// The seven EBML primitive payload types.
pub mod value;

/// Element header framing (ID + declared size).
pub mod header;

/// The Matroska/EBML schema table.
pub mod schema;

/// A `Vec`-backed arena addressed by integer index.
pub mod arena;

/// The element tree node family: Master, Atomic, Void, Unsupported.
pub mod element;

/// The tree owner: arena plus top-level child list, and container operations.
pub mod tree;

/// Configuration for the rearrangement and normalization passes.
pub mod options;

/// Positional consistency checking and the Void-based rearrangement engine.
pub mod rearrange;

/// Random-access reading of an element tree from a seekable byte source.
pub mod reader;

/// Segment-specific layout: SeekHead maintenance and attachment insertion.
pub mod segment;

/// The delta writer: writes only dirty subtrees, copying the rest verbatim.
mod writer;

/// Mechanical get/set helpers for common child shapes (text, unsigned integer).
pub mod accessors;

/// A prelude for common types and traits.
pub mod prelude {
    pub use crate::arena::{Arena, NodeId};
    pub use crate::element::{Body, Node, ReadState};
    pub use crate::error::{Error, Result, SchemaViolation};
    pub use crate::header::Header;
    pub use crate::options::{NormalizeOptions, RearrangeOptions, Strategy};
    pub use crate::reader::{File, ReadMode};
    pub use crate::schema::{self, ids};
    pub use crate::segment::Segment;
    pub use crate::tree::Tree;
    pub use crate::value::{Value, ValueKind};
    pub use crate::vint::{ElementId, Vint, VOID_ID};
}
