//! Thin, mechanical get/set helpers for the handful of child shapes (text, unsigned integer)
//! that show up over and over under Info, Tags, and AttachedFile. These do not replace walking
//! the tree directly — they exist only to save the caller from repeating
//! "find or create a child with this ID, then decode/encode its value" at every call site.

use crate::arena::NodeId;
use crate::element::Node;
use crate::error::Error;
use crate::header::Header;
use crate::schema;
use crate::tree::Tree;
use crate::value::{Value, ValueKind};
use crate::vint::ElementId;

/// The first `id`-named child of `parent` with a text value (`String` or `Unicode`), if any.
pub fn child_text(tree: &Tree, parent: NodeId, id: ElementId) -> Option<&str> {
    let child_id = tree.children_named(Some(parent), id).next()?;
    match tree.arena.get(child_id)?.value()? {
        Value::String(s) | Value::Unicode(s) => Some(s.as_str()),
        _ => None,
    }
}

/// Set (creating if absent) the first `id`-named text child of `parent`.
///
/// Uses the schema's declared kind (`String` vs `Unicode`) to choose the right `Value` variant;
/// errors with `UnknownElement` if `id` has no schema entry, since there is no kind to encode as.
pub fn set_child_text(tree: &mut Tree, parent: NodeId, id: ElementId, text: &str) -> crate::Result<NodeId> {
    let entry = schema::lookup(id).ok_or(Error::UnknownElement(id))?;
    let value = match entry.kind {
        schema::Kind::Atomic(ValueKind::String) => Value::String(text.to_string()),
        schema::Kind::Atomic(ValueKind::Unicode) => Value::Unicode(text.to_string()),
        _ => {
            return Err(Error::ValueOutOfRange {
                id,
                detail: "not a text element".into(),
            });
        }
    };
    set_atomic(tree, parent, id, value)
}

/// The first `id`-named unsigned-integer child of `parent`, if any.
pub fn child_uint(tree: &Tree, parent: NodeId, id: ElementId) -> Option<u64> {
    let child_id = tree.children_named(Some(parent), id).next()?;
    match tree.arena.get(child_id)?.value()? {
        Value::Unsigned(v) => Some(*v),
        _ => None,
    }
}

/// Set (creating if absent) the first `id`-named unsigned-integer child of `parent`.
pub fn set_child_uint(tree: &mut Tree, parent: NodeId, id: ElementId, value: u64) -> crate::Result<NodeId> {
    set_atomic(tree, parent, id, Value::Unsigned(value))
}

fn set_atomic(tree: &mut Tree, parent: NodeId, id: ElementId, value: Value) -> crate::Result<NodeId> {
    let existing = tree.children_named(Some(parent), id).next();
    if let Some(existing) = existing {
        tree.arena
            .get_mut(existing)
            .ok_or(Error::UnknownElement(id))?
            .set_value(value)?;
        return Ok(existing);
    }
    let mut node = Node::new_from_header(Header::new(id, 0), schema::lookup(id));
    node.set_value(value)?;
    tree.add_child(Some(parent), node)
}
