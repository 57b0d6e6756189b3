//! Configuration for the rearrangement and normalization passes.

use crate::schema::ids;
use crate::vint::ElementId;

/// How the rearrangement engine treats existing padding.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum Strategy {
    /// Eliminate padding where possible, compacting children together.
    Pack,
    /// Keep existing Voids in place unless they must shrink to restore consistency.
    #[default]
    Preserve,
}

/// Options controlling [`crate::rearrange::rearrange`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RearrangeOptions {
    /// Permit shrinking an atomic child's reserved `size_width` back to the minimum its
    /// current value needs, reclaiming header bytes into a new Void.
    pub allow_shrink: bool,
    /// Permit reordering children. Default is to preserve document order.
    pub allow_move: bool,
    /// Minimum bytes for an inserted Void. A Void smaller than a header is impossible; the
    /// smallest Void is 2 bytes (1-byte ID + 1-byte zero size), and this is never silently
    /// lowered below that floor even if the caller asks for less.
    pub min_void: u64,
    /// Padding strategy.
    pub strategy: Strategy,
}

impl Default for RearrangeOptions {
    fn default() -> Self {
        Self {
            allow_shrink: false,
            allow_move: false,
            min_void: 2,
            strategy: Strategy::Preserve,
        }
    }
}

/// Options controlling [`crate::segment::Segment::normalize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizeOptions {
    /// Options for rearranging the head and tail metadata regions.
    pub rearrange: RearrangeOptions,
    /// Element IDs that always belong in the tail region (after the Clusters/Cues span),
    /// regardless of the head/tail split that falls out of document order. Attachments and
    /// Tags are large, seek-rarely metadata, so they default into the tail: large attachments
    /// can then grow without disturbing the pre-Cluster layout that media players seek into
    /// first.
    pub tail: Vec<ElementId>,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            rearrange: RearrangeOptions::default(),
            tail: vec![ids::ATTACHMENTS, ids::TAGS],
        }
    }
}
