//! The element tree node family: Master, Atomic, Void, Unsupported.

use crate::arena::{Arena, NodeId};
use crate::error::Error;
use crate::header::Header;
use crate::schema::{Kind, SchemaEntry};
use crate::value::{Value, ValueKind};
use crate::vint::Vint;

/// How much of an element's subtree has been read from its backing source.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ReadState {
    /// Not read at all (only constructed in memory).
    Unread,
    /// Header read, body not yet touched.
    HeaderOnly,
    /// Body read under summary mode: a deferred Master recorded its header and skipped its
    /// children.
    SummaryLoaded,
    /// Body fully read.
    FullyLoaded,
}

/// Kind-specific payload of an element.
#[derive(Debug, Clone)]
pub enum Body {
    /// An ordered sequence of child elements.
    Master { children: Vec<NodeId> },
    /// A typed leaf value. `original_bytes` is the exact payload this element was decoded
    /// from; it is cleared the moment `set_value` changes the logical value, so bit-exact
    /// passthrough only applies while truly unmodified.
    Atomic {
        kind: ValueKind,
        value: Value,
        original_bytes: Option<Vec<u8>>,
    },
    /// Padding; its payload bytes carry no meaning.
    Void,
    /// An element whose ID has no schema entry; its payload is opaque and preserved verbatim.
    Unsupported { raw: Vec<u8> },
}

impl Body {
    /// A short tag for diagnostics (`print_children`, logging).
    pub fn tag(&self) -> &'static str {
        match self {
            Body::Master { .. } => "Master",
            Body::Atomic { .. } => "Atomic",
            Body::Void => "Void",
            Body::Unsupported { .. } => "Unsupported",
        }
    }
}

/// One node of the element tree.
#[derive(Debug, Clone)]
pub struct Node {
    /// The element's ID and declared payload size.
    pub header: Header,
    /// Absolute byte offset of this element's header when last read or written from disk.
    pub stream_offset: Option<u64>,
    /// `header_width + payload_size` as of the last successful read or write.
    pub original_total_size: Option<u64>,
    /// Upward, non-owning back-reference. `None` for top-level (File-owned) elements.
    pub parent: Option<NodeId>,
    /// How much of this element has been read.
    pub read_state: ReadState,
    /// Kind-specific payload.
    pub body: Body,
}

impl Node {
    /// Construct a node for `header`, dispatching on `schema` to pick the right [`Body`]
    /// variant. `None` (no schema entry) produces an `Unsupported` node.
    pub fn new_from_header(header: Header, schema: Option<&SchemaEntry>) -> Self {
        let body = match schema.map(|e| e.kind) {
            Some(Kind::Master) => Body::Master { children: Vec::new() },
            Some(Kind::Atomic(kind)) => Body::Atomic {
                kind,
                value: Value::default_for(kind),
                original_bytes: Some(Vec::new()),
            },
            Some(Kind::Void) => Body::Void,
            None => Body::Unsupported { raw: Vec::new() },
        };
        Self {
            header,
            stream_offset: None,
            original_total_size: None,
            parent: None,
            read_state: ReadState::Unread,
            body,
        }
    }

    /// Construct a freshly-created (never-read, always dirty) node of the given kind.
    pub fn new_programmatic(id: crate::vint::ElementId, schema: Option<&SchemaEntry>) -> Self {
        Self::new_from_header(Header::new(id, 0), schema)
    }

    /// This element's total encoded size: header plus payload. Kept in sync with the payload
    /// by every mutator (`set_value`, `add_child`, `remove_child`, `resize`), so it never needs
    /// to recurse through the arena to compute.
    pub fn total_size(&self) -> u64 {
        self.header.total_header_width() + self.header.size.unwrap_or(0)
    }

    /// Whether this element differs from its on-disk representation.
    ///
    /// A Master is dirty if any child is dirty, which requires the arena to look children up;
    /// all other variants are self-contained.
    pub fn dirty(&self, arena: &Arena<Node>) -> bool {
        if self.stream_offset.is_none() {
            return true;
        }
        if self.original_total_size != Some(self.total_size()) {
            return true;
        }
        match &self.body {
            Body::Atomic { original_bytes, .. } => original_bytes.is_none(),
            Body::Master { children } => children
                .iter()
                .any(|&c| arena.get(c).is_none_or(|n| n.dirty(arena))),
            Body::Void | Body::Unsupported { .. } => false,
        }
    }

    /// This element's current value, if it is an Atomic.
    pub fn value(&self) -> Option<&Value> {
        match &self.body {
            Body::Atomic { value, .. } => Some(value),
            _ => None,
        }
    }

    /// Set this element's value, re-encoding its payload to minimal width and discarding the
    /// bit-exact snapshot. Errors if this node is not an Atomic of matching kind.
    pub fn set_value(&mut self, new: Value) -> crate::Result<()> {
        match &mut self.body {
            Body::Atomic { kind, value, original_bytes } => {
                if new.kind() != *kind {
                    return Err(Error::ValueOutOfRange {
                        id: self.header.id,
                        detail: format!("expected {kind:?}, got {:?}", new.kind()),
                    });
                }
                self.header.size = Some(new.encoded_len());
                let needed = Vint::min_width(new.encoded_len());
                if needed > self.header.size_width {
                    self.header.reserve_size_width(needed);
                }
                *value = new;
                *original_bytes = None;
                Ok(())
            }
            _ => Err(Error::UnsupportedMutation(self.header.id)),
        }
    }

    /// Set the declared payload size directly. Used by the rearrangement engine to grow a
    /// Master or shrink/grow a Void; callers decide separately whether `size_width` changes.
    pub fn resize(&mut self, new_payload_size: u64) {
        self.header.size = Some(new_payload_size);
        let needed = Vint::min_width(new_payload_size);
        if needed > self.header.size_width {
            self.header.reserve_size_width(needed);
        }
    }

    /// Children, if this is a Master.
    pub fn children(&self) -> Option<&[NodeId]> {
        match &self.body {
            Body::Master { children } => Some(children),
            _ => None,
        }
    }

    /// Mutable children, if this is a Master.
    pub fn children_mut(&mut self) -> Option<&mut Vec<NodeId>> {
        match &mut self.body {
            Body::Master { children } => Some(children),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{self, ids};

    #[test]
    fn fresh_node_is_dirty() {
        let arena = Arena::new();
        let node = Node::new_programmatic(ids::TITLE, schema::lookup(ids::TITLE));
        assert!(node.dirty(&arena));
    }

    #[test]
    fn set_value_updates_size_and_clears_snapshot() {
        let mut node = Node::new_from_header(Header::new(ids::TITLE, 2), schema::lookup(ids::TITLE));
        node.stream_offset = Some(0);
        node.original_total_size = Some(node.total_size());
        if let Body::Atomic { original_bytes, .. } = &mut node.body {
            *original_bytes = Some(vec![b'Y', b'Y']);
        }
        let arena = Arena::new();
        assert!(!node.dirty(&arena));

        node.set_value(Value::Unicode("X".to_string())).unwrap();
        assert_eq!(node.header.size, Some(1));
        assert!(node.dirty(&arena));
    }

    #[test]
    fn set_value_rejects_wrong_kind() {
        let mut node = Node::new_from_header(Header::new(ids::TITLE, 0), schema::lookup(ids::TITLE));
        assert!(node.set_value(Value::Unsigned(1)).is_err());
    }

    #[test]
    fn master_dirty_propagates_from_child() {
        let mut arena = Arena::new();
        let child = Node::new_from_header(Header::new(ids::TITLE, 0), schema::lookup(ids::TITLE));
        let child_id = arena.alloc(child);

        let mut parent = Node::new_from_header(Header::new(schema::ids::INFO, 0), schema::lookup(schema::ids::INFO));
        parent.children_mut().unwrap().push(child_id);
        parent.stream_offset = Some(0);
        parent.original_total_size = Some(parent.total_size());

        assert!(parent.dirty(&arena), "child was never read, so it is dirty");
    }

    #[test]
    fn resize_grows_size_width_only_when_needed() {
        let mut node = Node::new_from_header(Header::new(ids::TITLE, 0), schema::lookup(ids::TITLE));
        node.resize(10);
        assert_eq!(node.header.size_width, 1);
        node.resize(200);
        assert_eq!(node.header.size_width, 2);
    }
}
