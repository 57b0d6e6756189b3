//! Positional consistency checking and the Void-based rearrangement engine.

use std::collections::HashMap;

use crate::arena::NodeId;
use crate::element::{Body, Node, ReadState};
use crate::error::{Error, SchemaViolation};
use crate::header::Header;
use crate::options::{RearrangeOptions, Strategy};
use crate::schema::{self, Kind};
use crate::tree::Tree;
use crate::vint::{ElementId, Vint, VOID_ID};

/// Whether `master`'s children are positionally consistent and schema-conformant.
///
/// Checks invariants 4 (positional consistency) and 5 (schema conformance) of the element
/// model, non-recursively: callers that need the whole subtree checked should walk descendant
/// Masters themselves (as [`rearrange`] does bottom-up).
pub fn consistent(tree: &Tree, master: NodeId) -> bool {
    check(tree, master).is_ok()
}

/// Like [`consistent`], but returns the specific violation found.
pub fn check(tree: &Tree, master: NodeId) -> crate::Result<()> {
    let node = tree
        .arena
        .get(master)
        .ok_or(Error::UnknownElement(ElementId::from_encoded(0)))?;
    let parent_id = node.header.id;
    let children = node
        .children()
        .ok_or(Error::UnsupportedMutation(parent_id))?;
    let data_size = node.header.size.unwrap_or(0);

    let mut cursor = 0u64;
    let mut seen: HashMap<ElementId, u32> = HashMap::new();
    for &cid in children {
        let child = tree
            .arena
            .get(cid)
            .expect("every NodeId in a children list must resolve in the arena");
        cursor += child.total_size();
        *seen.entry(child.header.id).or_insert(0) += 1;

        if matches!(child.body, Body::Unsupported { .. } | Body::Void) {
            continue;
        }
        let Some(entry) = schema::lookup(child.header.id) else {
            continue;
        };
        if !entry.allowed_parents.permits(Some(parent_id)) {
            return Err(SchemaViolation::DisallowedParent {
                id: child.header.id,
                parent: parent_id,
            }
            .into());
        }
        if entry.unique && seen[&child.header.id] > 1 {
            return Err(SchemaViolation::DuplicateUnique {
                id: child.header.id,
                parent: parent_id,
            }
            .into());
        }
        if let Some(value) = child.value() {
            if !entry.range.contains(value) {
                return Err(SchemaViolation::BadValue {
                    id: child.header.id,
                    detail: format!("value {value:?} outside declared range"),
                }
                .into());
            }
        }
    }

    if cursor != data_size {
        return Err(Error::Inconsistent(parent_id));
    }

    for entry in schema::REGISTRY
        .iter()
        .filter(|e| e.required && e.allowed_parents.permits(Some(parent_id)))
    {
        if !seen.contains_key(&entry.id) {
            return Err(SchemaViolation::MissingRequired {
                id: entry.id,
                parent: parent_id,
            }
            .into());
        }
    }

    Ok(())
}

/// Restore positional consistency of `master`'s children, recursing into child Masters first.
///
/// See the module-level design note on offsets: this implementation never stores a child's
/// offset separately from its position in the children `Vec`, so a child's effective offset is
/// always `sum of total_size of earlier siblings` by construction. That eliminates the
/// "relocate if offset differs from cursor" step of a position-tracking design; what remains is
/// exactly the Void bookkeeping (inserting, merging, shrinking) and growing/shrinking `master`
/// itself to match the children's actual total.
pub fn rearrange(tree: &mut Tree, master: NodeId, opts: &RearrangeOptions) -> crate::Result<()> {
    let parent_id = node_id_for_error(tree, master);
    let child_ids: Vec<NodeId> = tree
        .arena
        .get(master)
        .and_then(|n| n.children())
        .ok_or(Error::UnsupportedMutation(parent_id))?
        .to_vec();

    for &cid in &child_ids {
        // A Master deferred under summary mode (Clusters, Cues) is never read into memory and
        // must not be touched: its children list is empty, not "actually no children".
        let recurse = tree.arena.get(cid).is_some_and(|n| {
            matches!(n.body, Body::Master { .. }) && n.read_state != ReadState::SummaryLoaded
        });
        if recurse {
            rearrange(tree, cid, opts)?;
        }
    }

    if opts.allow_shrink {
        for &cid in &child_ids {
            if let Some(node) = tree.arena.get_mut(cid) {
                if matches!(node.body, Body::Atomic { .. }) {
                    node.header.shrink_size_width();
                }
            }
        }
    }

    let data_size = tree
        .arena
        .get(master)
        .expect("master validated above")
        .header
        .size
        .unwrap_or(0);
    let mut children = child_ids;

    match opts.strategy {
        Strategy::Pack => {
            let mut kept = Vec::with_capacity(children.len());
            for cid in children {
                if matches!(tree.arena.get(cid).map(|n| &n.body), Some(Body::Void)) {
                    tree.arena.remove(cid);
                } else {
                    kept.push(cid);
                }
            }
            children = kept;
        }
        Strategy::Preserve => {
            children = merge_adjacent_voids(tree, children, opts.min_void)?;
            for &cid in &children {
                let node = tree.arena.get(cid).expect("child tracked in arena");
                if matches!(node.body, Body::Void) && node.total_size() < opts.min_void {
                    return Err(Error::CannotRearrange {
                        id: node.header.id,
                        reason: format!(
                            "Void of {} bytes is below the {}-byte minimum and has no adjacent Void to merge with",
                            node.total_size(),
                            opts.min_void
                        ),
                    });
                }
            }
        }
    }

    {
        let list = tree
            .arena
            .get_mut(master)
            .expect("master validated above")
            .children_mut()
            .expect("validated as Master above");
        list.clear();
        list.extend(children.iter().copied());
    }

    let cursor: u64 = children
        .iter()
        .map(|&cid| tree.arena.get(cid).expect("child tracked in arena").total_size())
        .sum();

    match cursor.cmp(&data_size) {
        std::cmp::Ordering::Less => {
            let gap = data_size - cursor;
            match opts.strategy {
                Strategy::Pack => {
                    tree.arena
                        .get_mut(master)
                        .expect("master validated above")
                        .resize(cursor);
                }
                Strategy::Preserve => extend_or_insert_trailing_void(tree, master, gap, opts.min_void)?,
            }
        }
        std::cmp::Ordering::Greater => {
            tree.arena
                .get_mut(master)
                .expect("master validated above")
                .resize(cursor);
        }
        std::cmp::Ordering::Equal => {}
    }

    Ok(())
}

fn node_id_for_error(tree: &Tree, id: NodeId) -> ElementId {
    tree.arena
        .get(id)
        .map(|n| n.header.id)
        .unwrap_or(ElementId::from_encoded(0))
}

fn merge_adjacent_voids(
    tree: &mut Tree,
    children: Vec<NodeId>,
    min_void: u64,
) -> crate::Result<Vec<NodeId>> {
    let mut merged: Vec<NodeId> = Vec::with_capacity(children.len());
    for cid in children {
        let is_void = matches!(tree.arena.get(cid).map(|n| &n.body), Some(Body::Void));
        let mergeable = is_void
            && merged
                .last()
                .is_some_and(|&last| matches!(tree.arena.get(last).map(|n| &n.body), Some(Body::Void)));
        if mergeable {
            let last = *merged.last().expect("checked above");
            let gap_total = tree.arena.get(cid).expect("child tracked in arena").total_size();
            let combined = tree.arena.get(last).expect("child tracked in arena").total_size() + gap_total;
            let last_node = tree.arena.get_mut(last).expect("child tracked in arena");
            fit_void_to_size(last_node, combined, min_void)?;
            log::info!("merged adjacent Voids into a {combined}-byte Void");
            tree.arena.remove(cid);
            continue;
        }
        merged.push(cid);
    }
    Ok(merged)
}

fn extend_or_insert_trailing_void(
    tree: &mut Tree,
    master: NodeId,
    gap: u64,
    min_void: u64,
) -> crate::Result<()> {
    let children = tree
        .arena
        .get(master)
        .expect("master validated above")
        .children()
        .expect("validated as Master above");
    let trailing = children.last().copied();
    let trailing_is_void = trailing
        .map(|c| matches!(tree.arena.get(c).map(|n| &n.body), Some(Body::Void)))
        .unwrap_or(false);

    if trailing_is_void {
        let last_id = trailing.unwrap();
        let node = tree.arena.get_mut(last_id).expect("child tracked in arena");
        let target = node.total_size() + gap;
        fit_void_to_size(node, target, min_void)?;
    } else {
        log::info!("inserting a {gap}-byte trailing Void");
        let void_node = void_node_for_gap(gap, min_void)?;
        let void_id = tree.arena.alloc(void_node);
        tree.arena
            .get_mut(void_id)
            .expect("just allocated")
            .parent = Some(master);
        tree.arena
            .get_mut(master)
            .expect("master validated above")
            .children_mut()
            .expect("validated as Master above")
            .push(void_id);
    }
    Ok(())
}

/// Build a Void node whose total encoded size is exactly `gap` bytes.
fn void_node_for_gap(gap: u64, min_void: u64) -> crate::Result<Node> {
    let header = fit_header_to_size(gap, min_void)?;
    Ok(Node::new_from_header(header, schema::lookup(VOID_ID)))
}

/// Adjust an existing Void's header so its total encoded size is exactly `target_total` bytes.
fn fit_void_to_size(node: &mut Node, target_total: u64, min_void: u64) -> crate::Result<()> {
    node.header = fit_header_to_size(target_total, min_void)?;
    Ok(())
}

/// Find a `(size_width, payload)` split of `total` bytes such that `1 (Void ID width) +
/// size_width + payload == total` exactly, returning the Void header for it.
fn fit_header_to_size(total: u64, min_void: u64) -> crate::Result<Header> {
    if total < min_void.max(2) {
        return Err(Error::CannotRearrange {
            id: VOID_ID,
            reason: format!("{total} bytes is below the minimum Void size"),
        });
    }
    for width in 1..=8u8 {
        let header_width = 1 + width as u64;
        if total < header_width {
            continue;
        }
        let payload = total - header_width;
        if Vint::min_width(payload) <= width {
            return Ok(Header {
                id: VOID_ID,
                size: Some(payload),
                size_width: width,
            });
        }
    }
    Err(Error::CannotRearrange {
        id: VOID_ID,
        reason: format!("no header width encodes a Void of exactly {total} bytes"),
    })
}

/// Whether `id`'s schema entry (if any) marks it a Master.
pub(crate) fn is_master_id(id: ElementId) -> bool {
    matches!(schema::lookup(id).map(|e| e.kind), Some(Kind::Master))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ids;
    use crate::value::Value;

    fn void(payload: u64) -> Node {
        let header = fit_header_to_size(1 + Vint::min_width(payload).max(1) as u64 + payload, 2)
            .unwrap_or_else(|_| Header::new(VOID_ID, payload));
        Node::new_from_header(header, schema::lookup(VOID_ID))
    }

    #[test]
    fn consistent_passes_for_exact_fit() {
        let mut tree = Tree::new();
        let mut info = Node::new_from_header(Header::new(ids::INFO, 0), schema::lookup(ids::INFO));
        let mut scale = Node::new_from_header(
            Header::new(schema::ids::SEGMENT_UUID, 0),
            schema::lookup(schema::ids::SEGMENT_UUID),
        );
        scale.set_value(Value::Binary(vec![0u8; 16])).unwrap();
        let scale_size = scale.total_size();
        info.resize(scale_size);
        let scale_id = tree.arena.alloc(scale);
        if let Body::Master { children } = &mut info.body {
            children.push(scale_id);
        }
        let info_id = tree.arena.alloc(info);
        tree.top_level.push(info_id);

        assert!(consistent(&tree, info_id));
    }

    #[test]
    fn rearrange_pads_gap_with_trailing_void() {
        let mut tree = Tree::new();
        let mut info = Node::new_from_header(Header::new(ids::INFO, 0), schema::lookup(ids::INFO));
        let mut title = Node::new_from_header(Header::new(ids::TITLE, 0), schema::lookup(ids::TITLE));
        title.set_value(Value::Unicode("X".to_string())).unwrap();
        let title_size = title.total_size();
        info.resize(title_size + 10);
        let title_id = tree.arena.alloc(title);
        if let Body::Master { children } = &mut info.body {
            children.push(title_id);
        }
        let info_id = tree.arena.alloc(info);
        tree.top_level.push(info_id);

        assert!(!consistent(&tree, info_id));
        rearrange(&mut tree, info_id, &RearrangeOptions::default()).unwrap();
        assert!(consistent(&tree, info_id));
    }

    #[test]
    fn fit_header_to_size_rejects_undersized_gap() {
        assert!(fit_header_to_size(1, 2).is_err());
        assert!(fit_header_to_size(2, 2).is_ok());
    }

    #[test]
    fn void_helper_round_trips_total_size() {
        let node = void(5);
        assert!(node.total_size() >= 2);
    }
}
