//! The tree owner: an arena of nodes plus the top-level (File-owned) child list.
//!
//! A `File` has no header of its own, but shares the same container operations a `Master`
//! exposes — so both are modeled here as "a list of children behind `Option<NodeId>`": `None`
//! addresses the file's top-level list, `Some(id)` addresses a Master node's children.

use crate::arena::{Arena, NodeId};
use crate::element::Node;
use crate::error::Error;
use crate::vint::ElementId;

/// Owns every node in an element tree and the top-level child list.
#[derive(Debug, Default)]
pub struct Tree {
    /// Every node ever allocated into this tree.
    pub arena: Arena<Node>,
    /// Top-level (File-owned) children, in document order.
    pub top_level: Vec<NodeId>,
}

impl Tree {
    /// An empty tree.
    pub fn new() -> Self {
        Self {
            arena: Arena::new(),
            top_level: Vec::new(),
        }
    }

    /// The children of `parent` (or the top-level list, if `None`). Returns an empty slice for
    /// a `parent` that is not a Master or no longer exists, rather than erroring — read-only
    /// callers (`print_children`, `children_named`) should never need to handle that specially.
    pub fn children_of(&self, parent: Option<NodeId>) -> &[NodeId] {
        match parent {
            None => &self.top_level,
            Some(id) => self
                .arena
                .get(id)
                .and_then(|n| n.children())
                .unwrap_or(&[]),
        }
    }

    fn children_mut_of(&mut self, parent: Option<NodeId>) -> Option<&mut Vec<NodeId>> {
        match parent {
            None => Some(&mut self.top_level),
            Some(id) => self.arena.get_mut(id).and_then(|n| n.children_mut()),
        }
    }

    /// Attach `node` as the last child of `parent`, allocating it into the arena.
    ///
    /// Does not update `parent`'s declared payload size or dirtiness bookkeeping beyond what
    /// `Node::dirty` already derives from the new child's own `stream_offset` (`None`, since it
    /// was just created) — positional consistency is restored later by `rearrange`.
    pub fn add_child(&mut self, parent: Option<NodeId>, mut node: Node) -> crate::Result<NodeId> {
        node.parent = parent;
        let child_id = self.arena.alloc(node);
        match self.children_mut_of(parent) {
            Some(list) => {
                list.push(child_id);
                Ok(child_id)
            }
            None => {
                self.arena.remove(child_id);
                Err(Error::UnsupportedMutation(self.parent_id_for_error(parent)))
            }
        }
    }

    /// Detach and destroy the child at `index` under `parent`, returning it.
    ///
    /// Leaves a positional gap for `rearrange` to fill with a Void or by shifting siblings;
    /// this call itself never touches sibling offsets.
    ///
    /// # Panics
    /// Panics if `index` is out of bounds, matching `Vec::remove`'s contract.
    pub fn remove_child(&mut self, parent: Option<NodeId>, index: usize) -> crate::Result<Node> {
        let list = match self.children_mut_of(parent) {
            Some(list) => list,
            None => return Err(Error::UnsupportedMutation(self.parent_id_for_error(parent))),
        };
        let child_id = list.remove(index);
        let mut node = self
            .arena
            .remove(child_id)
            .expect("every NodeId in a children list must resolve in the arena");
        node.parent = None;
        Ok(node)
    }

    /// Reorder the child at `from` to position `to` under `parent`.
    ///
    /// # Panics
    /// Panics if either index is out of bounds.
    pub fn move_child(&mut self, parent: Option<NodeId>, from: usize, to: usize) -> crate::Result<()> {
        let list = match self.children_mut_of(parent) {
            Some(list) => list,
            None => return Err(Error::UnsupportedMutation(self.parent_id_for_error(parent))),
        };
        let item = list.remove(from);
        list.insert(to, item);
        Ok(())
    }

    /// Children of `parent` whose ID equals `id`, in document order.
    pub fn children_named<'a>(
        &'a self,
        parent: Option<NodeId>,
        id: ElementId,
    ) -> impl Iterator<Item = NodeId> + 'a {
        self.children_of(parent)
            .iter()
            .copied()
            .filter(move |&c| self.arena.get(c).map(|n| n.header.id) == Some(id))
    }

    fn parent_id_for_error(&self, parent: Option<NodeId>) -> ElementId {
        parent
            .and_then(|p| self.arena.get(p))
            .map(|n| n.header.id)
            .unwrap_or(ElementId::from_encoded(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::Header;
    use crate::schema::{self, ids};

    fn title_node() -> Node {
        Node::new_from_header(Header::new(ids::TITLE, 0), schema::lookup(ids::TITLE))
    }

    #[test]
    fn add_and_list_top_level_children() {
        let mut tree = Tree::new();
        let id = tree.add_child(None, title_node()).unwrap();
        assert_eq!(tree.children_of(None), &[id]);
    }

    #[test]
    fn add_child_under_master() {
        let mut tree = Tree::new();
        let info = Node::new_from_header(Header::new(ids::INFO, 0), schema::lookup(ids::INFO));
        let info_id = tree.add_child(None, info).unwrap();
        let title_id = tree.add_child(Some(info_id), title_node()).unwrap();
        assert_eq!(tree.children_of(Some(info_id)), &[title_id]);
    }

    #[test]
    fn add_child_under_non_master_fails() {
        let mut tree = Tree::new();
        let title_id = tree.add_child(None, title_node()).unwrap();
        let result = tree.add_child(Some(title_id), title_node());
        assert!(result.is_err());
    }

    #[test]
    fn remove_child_detaches_and_destroys() {
        let mut tree = Tree::new();
        let id = tree.add_child(None, title_node()).unwrap();
        let removed = tree.remove_child(None, 0).unwrap();
        assert!(removed.parent.is_none());
        assert!(tree.children_of(None).is_empty());
        assert!(tree.arena.get(id).is_none());
    }

    #[test]
    fn move_child_reorders() {
        let mut tree = Tree::new();
        let a = tree.add_child(None, title_node()).unwrap();
        let b = tree.add_child(None, title_node()).unwrap();
        tree.move_child(None, 0, 1).unwrap();
        assert_eq!(tree.children_of(None), &[b, a]);
    }

    #[test]
    fn children_named_filters_by_id() {
        let mut tree = Tree::new();
        let title = tree.add_child(None, title_node()).unwrap();
        let info = Node::new_from_header(Header::new(ids::INFO, 0), schema::lookup(ids::INFO));
        tree.add_child(None, info).unwrap();
        let titles: Vec<_> = tree.children_named(None, ids::TITLE).collect();
        assert_eq!(titles, vec![title]);
    }
}
