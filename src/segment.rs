//! Segment-specific layout: SeekHead maintenance, head/tail metadata partitioning, and
//! attachment insertion.
//!
//! The Cluster and Cues spans are immovable: `normalize` never reorders past the first one it
//! finds, and `rearrange`'s own read-state check (a deferred Master is never recursed into or
//! resized) keeps their contents untouched regardless. Everything before the immovable span is
//! the "head" (SeekHead, Info, Tracks, Chapters, in that priority order, plus anything else not
//! explicitly routed to the tail); everything after it is the "tail" (caller-configurable via
//! `NormalizeOptions::tail`, plus whatever the head couldn't fit). The two regions are
//! rearranged independently against the head's on-disk capacity, so a metadata child that grows
//! too large for the space before the first Cluster is relocated to the tail rather than
//! silently shifting every Cluster after it.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::arena::NodeId;
use crate::element::{Body, Node, ReadState};
use crate::error::Error;
use crate::header::Header;
use crate::options::{NormalizeOptions, RearrangeOptions};
use crate::rearrange::rearrange;
use crate::schema::{self, ids};
use crate::tree::Tree;
use crate::value::Value;
use crate::vint::ElementId;

/// Head children are ordered by this priority list when `allow_move` is set; anything not
/// listed (including Void padding) keeps its relative order after the named elements.
const HEAD_PRIORITY: &[ElementId] = &[ids::SEEK_HEAD, ids::INFO, ids::TRACKS, ids::CHAPTERS];

/// Elements that split the head region from the tail and are never relocated or resized by
/// `normalize` itself.
fn is_immovable(id: ElementId) -> bool {
    id == schema::CLUSTER || id == ids::CUES
}

/// A view over a Segment node, for the operations particular to it.
pub struct Segment<'a> {
    tree: &'a mut Tree,
    node: NodeId,
}

impl<'a> Segment<'a> {
    /// Wrap `node` as a Segment view, failing if it isn't actually a Segment element.
    pub fn new(tree: &'a mut Tree, node: NodeId) -> crate::Result<Self> {
        let id = tree.arena.get(node).map(|n| n.header.id);
        if id != Some(ids::SEGMENT) {
            return Err(Error::UnsupportedMutation(id.unwrap_or(ElementId::from_encoded(0))));
        }
        Ok(Self { tree, node })
    }

    /// Rebuild this segment's SeekHead, partition the remaining children into head and tail
    /// metadata regions around any immovable Cluster/Cues span, and independently rearrange
    /// each region.
    ///
    /// A growth failure at the segment's own root, or a head/tail region that cannot absorb its
    /// children even after relocating everything relocatable, surfaces as `SegmentFull` rather
    /// than the generic `InsufficientSpace`, since there is no further ancestor left to grow
    /// into.
    pub fn normalize(&mut self, opts: &NormalizeOptions) -> crate::Result<()> {
        self.rebuild_seek_head()?;
        self.partition_and_rearrange(opts)?;
        rearrange(self.tree, self.node, &opts.rearrange).map_err(|e| match e {
            Error::InsufficientSpace { .. } => Error::SegmentFull,
            other => other,
        })
    }

    /// Split this segment's children into head / immovable-middle / tail, relocate anything the
    /// head can't hold, and rearrange the head and tail regions independently.
    fn partition_and_rearrange(&mut self, opts: &NormalizeOptions) -> crate::Result<()> {
        let children = self
            .tree
            .arena
            .get(self.node)
            .and_then(|n| n.children())
            .ok_or(Error::UnsupportedMutation(ids::SEGMENT))?
            .to_vec();

        let first_immovable = children
            .iter()
            .position(|&c| self.tree.arena.get(c).is_some_and(|n| is_immovable(n.header.id)));
        let last_immovable = children
            .iter()
            .rposition(|&c| self.tree.arena.get(c).is_some_and(|n| is_immovable(n.header.id)));

        let (mut head, middle, mut tail) = match (first_immovable, last_immovable) {
            (Some(first), Some(last)) => (
                children[..first].to_vec(),
                children[first..=last].to_vec(),
                children[last + 1..].to_vec(),
            ),
            _ => (children, Vec::new(), Vec::new()),
        };

        // Anything the caller always wants in the tail (Attachments, Tags by default) moves
        // there unconditionally, ahead of whatever the tail already held.
        let mut forced = Vec::new();
        head.retain(|&c| {
            let belongs_in_tail = self
                .tree
                .arena
                .get(c)
                .is_some_and(|n| opts.tail.contains(&n.header.id));
            if belongs_in_tail {
                forced.push(c);
            }
            !belongs_in_tail
        });
        tail.splice(0..0, forced);

        if opts.rearrange.allow_move {
            reorder_by_priority(self.tree, &mut head);
        }

        let head_capacity = self.head_capacity(&head).unwrap_or_else(|| self.region_total(&head));
        let (settled_head, fits) = self.try_fit_region(&head, head_capacity, &opts.rearrange)?;
        head = settled_head;

        if !fits {
            let (keep, spill): (Vec<NodeId>, Vec<NodeId>) = head.into_iter().partition(|&c| {
                self.tree.arena.get(c).is_some_and(|n| {
                    HEAD_PRIORITY.contains(&n.header.id) || matches!(n.body, Body::Void)
                })
            });
            if spill.is_empty() {
                return Err(Error::SegmentFull);
            }
            log::warn!(
                "head region overflowed its {head_capacity}-byte capacity, relocating {} child/children to the tail",
                spill.len()
            );
            tail.splice(0..0, spill);
            let (settled_head, fits) = self.try_fit_region(&keep, head_capacity, &opts.rearrange)?;
            if !fits {
                return Err(Error::SegmentFull);
            }
            head = settled_head;
        }

        let tail_capacity = self.region_total(&tail);
        let (settled_tail, tail_fits) = self.try_fit_region(&tail, tail_capacity, &opts.rearrange)?;
        if !tail_fits {
            return Err(Error::SegmentFull);
        }
        tail = settled_tail;

        let mut new_children = Vec::with_capacity(head.len() + middle.len() + tail.len());
        new_children.extend(head);
        new_children.extend(middle);
        new_children.extend(tail);

        let segment = self.tree.arena.get_mut(self.node).expect("validated in Segment::new");
        let list = segment.children_mut().expect("validated in Segment::new");
        list.clear();
        list.extend(new_children);
        let child_ids: Vec<NodeId> = list.iter().copied().collect();
        for cid in child_ids {
            if let Some(n) = self.tree.arena.get_mut(cid) {
                n.parent = Some(self.node);
            }
        }
        Ok(())
    }

    /// The on-disk capacity of the head region as of the last save/read: the sum of each
    /// child's `original_total_size`. A child that has never been saved (no prior on-disk
    /// extent) contributes nothing — new metadata consumes capacity, it does not grant it.
    /// Returns `None` if none of `head`'s children have ever been saved, meaning there is no
    /// established ceiling to enforce yet (a tree built entirely in memory).
    fn head_capacity(&self, head: &[NodeId]) -> Option<u64> {
        let mut known = false;
        let mut sum = 0u64;
        for &c in head {
            if let Some(n) = self.tree.arena.get(c) {
                if let Some(orig) = n.original_total_size {
                    sum += orig;
                    known = true;
                }
            }
        }
        known.then_some(sum)
    }

    /// Current total encoded size of `nodes`, ignoring anything not in the arena.
    fn region_total(&self, nodes: &[NodeId]) -> u64 {
        nodes
            .iter()
            .filter_map(|&c| self.tree.arena.get(c))
            .map(|n| n.total_size())
            .sum()
    }

    /// Rearrange `children` as if they were the sole contents of a `capacity`-byte Master,
    /// without actually making them children of anything persistent: a scratch Master node is
    /// allocated, given `children` directly, rearranged in place, then torn down once its
    /// settled size has been read back. `rearrange` itself never refuses to grow a Master past
    /// its declared size, so overflow is detected here by comparing the settled size against
    /// `capacity` afterward rather than relying on `rearrange` to fail.
    ///
    /// Returns the (possibly void-adjusted) children list and whether it fit within `capacity`.
    fn try_fit_region(
        &mut self,
        children: &[NodeId],
        capacity: u64,
        opts: &RearrangeOptions,
    ) -> crate::Result<(Vec<NodeId>, bool)> {
        if children.is_empty() {
            return Ok((Vec::new(), true));
        }

        let scratch = Node::new_from_header(Header::new(ids::SEGMENT, capacity), schema::lookup(ids::SEGMENT));
        let scratch_id = self.tree.arena.alloc(scratch);
        if let Some(list) = self
            .tree
            .arena
            .get_mut(scratch_id)
            .and_then(|n| n.children_mut())
        {
            list.extend_from_slice(children);
        }
        for &cid in children {
            if let Some(n) = self.tree.arena.get_mut(cid) {
                n.parent = Some(scratch_id);
            }
        }

        let result = rearrange(self.tree, scratch_id, opts);

        let (fits, settled) = {
            let n = self.tree.arena.get(scratch_id).expect("just allocated");
            let size = n.header.size.unwrap_or(0);
            (size <= capacity, n.children().expect("Master body").to_vec())
        };
        for &cid in &settled {
            if let Some(n) = self.tree.arena.get_mut(cid) {
                n.parent = Some(self.node);
            }
        }
        self.tree.arena.remove(scratch_id);
        result?;
        Ok((settled, fits))
    }

    /// Add an AttachedFile under this segment's Attachments container, creating it if absent.
    pub fn add_attachment(
        &mut self,
        name: &str,
        mime: &str,
        description: Option<&str>,
        data: Vec<u8>,
    ) -> crate::Result<NodeId> {
        let attachments_id = self.find_or_create_attachments()?;

        let mut attached_file = Node::new_from_header(
            Header::new(ids::ATTACHED_FILE, 0),
            schema::lookup(ids::ATTACHED_FILE),
        );
        attached_file.read_state = ReadState::FullyLoaded;
        let attached_file_id = self.tree.add_child(Some(attachments_id), attached_file)?;

        self.set_atomic_child(attached_file_id, schema::FILE_NAME, Value::Unicode(name.to_string()))?;
        self.set_atomic_child(attached_file_id, schema::FILE_MIME_TYPE, Value::String(mime.to_string()))?;
        if let Some(desc) = description {
            self.set_atomic_child(
                attached_file_id,
                schema::FILE_DESCRIPTION,
                Value::Unicode(desc.to_string()),
            )?;
        }
        self.set_atomic_child(attached_file_id, schema::FILE_UID, Value::Unsigned(uid_for(name, &data)))?;
        self.set_atomic_child(attached_file_id, schema::FILE_DATA, Value::Binary(data))?;

        Ok(attached_file_id)
    }

    fn find_or_create_attachments(&mut self) -> crate::Result<NodeId> {
        if let Some(id) = self.tree.children_named(Some(self.node), ids::ATTACHMENTS).next() {
            return Ok(id);
        }
        let attachments = Node::new_from_header(
            Header::new(ids::ATTACHMENTS, 0),
            schema::lookup(ids::ATTACHMENTS),
        );
        self.tree.add_child(Some(self.node), attachments)
    }

    fn set_atomic_child(&mut self, parent: NodeId, id: ElementId, value: Value) -> crate::Result<()> {
        let mut node = Node::new_from_header(Header::new(id, 0), schema::lookup(id));
        node.set_value(value)?;
        node.read_state = ReadState::FullyLoaded;
        self.tree.add_child(Some(parent), node)?;
        Ok(())
    }

    /// Replace this segment's SeekHead with a freshly built one, one entry per non-Cluster,
    /// non-Void, non-SeekHead top-level child, storing offsets relative to the segment's data
    /// start (the same cumulative-sum notion `rearrange` uses everywhere else).
    fn rebuild_seek_head(&mut self) -> crate::Result<()> {
        let children = self
            .tree
            .arena
            .get(self.node)
            .and_then(|n| n.children())
            .ok_or(Error::UnsupportedMutation(ids::SEGMENT))?
            .to_vec();

        let mut offsets = Vec::with_capacity(children.len());
        let mut cursor = 0u64;
        for &cid in &children {
            let size = self.tree.arena.get(cid).expect("child tracked in arena").total_size();
            offsets.push(cursor);
            cursor += size;
        }

        let entries: Vec<(ElementId, u64)> = children
            .iter()
            .zip(offsets.iter())
            .filter_map(|(&cid, &off)| {
                let node = self.tree.arena.get(cid)?;
                let keep = node.header.id != ids::SEEK_HEAD
                    && node.header.id != schema::CLUSTER
                    && !matches!(node.body, Body::Void);
                keep.then_some((node.header.id, off))
            })
            .collect();

        let existing_seek_head = children
            .iter()
            .position(|&c| self.tree.arena.get(c).map(|n| n.header.id) == Some(ids::SEEK_HEAD));

        let mut new_seek_head = Node::new_from_header(
            Header::new(ids::SEEK_HEAD, 0),
            schema::lookup(ids::SEEK_HEAD),
        );
        new_seek_head.read_state = ReadState::FullyLoaded;
        let seek_head_id = self.tree.arena.alloc(new_seek_head);

        for (id, offset) in entries {
            let mut seek = Node::new_from_header(Header::new(schema::SEEK, 0), schema::lookup(schema::SEEK));
            seek.read_state = ReadState::FullyLoaded;
            let seek_id = self.tree.arena.alloc(seek);
            self.tree.arena.get_mut(seek_id).unwrap().parent = Some(seek_head_id);

            let mut seek_id_node = Node::new_from_header(
                Header::new(schema::SEEK_ID, 0),
                schema::lookup(schema::SEEK_ID),
            );
            seek_id_node.set_value(Value::Binary(id.encode()))?;
            seek_id_node.read_state = ReadState::FullyLoaded;
            self.tree.add_child(Some(seek_id), seek_id_node)?;

            let mut seek_pos_node = Node::new_from_header(
                Header::new(schema::SEEK_POSITION, 0),
                schema::lookup(schema::SEEK_POSITION),
            );
            seek_pos_node.set_value(Value::Unsigned(offset))?;
            seek_pos_node.read_state = ReadState::FullyLoaded;
            self.tree.add_child(Some(seek_id), seek_pos_node)?;

            self.tree
                .arena
                .get_mut(seek_head_id)
                .unwrap()
                .children_mut()
                .unwrap()
                .push(seek_id);
        }

        // Settle the freshly built SeekHead's own size bottom-up before splicing it in.
        rearrange(self.tree, seek_head_id, &crate::options::RearrangeOptions::default())?;

        let mut new_children = Vec::with_capacity(children.len());
        new_children.push(seek_head_id);
        for (i, cid) in children.into_iter().enumerate() {
            if Some(i) == existing_seek_head {
                self.tree.arena.remove(cid);
                continue;
            }
            new_children.push(cid);
        }

        let segment = self.tree.arena.get_mut(self.node).expect("validated in Segment::new");
        let list = segment.children_mut().expect("validated in Segment::new");
        list.clear();
        list.extend(new_children);
        let child_ids: Vec<NodeId> = list.iter().copied().collect();
        for cid in child_ids {
            if let Some(n) = self.tree.arena.get_mut(cid) {
                n.parent = Some(self.node);
            }
        }

        log::info!("rebuilt SeekHead for segment with {} entries", self.tree.arena.get(seek_head_id).unwrap().children().unwrap().len());
        Ok(())
    }
}

/// Stably sort `head` by `HEAD_PRIORITY` position, leaving unlisted children (including Void
/// padding) after the named ones in their existing relative order.
fn reorder_by_priority(tree: &Tree, head: &mut [NodeId]) {
    head.sort_by_key(|&c| {
        let id = tree.arena.get(c).map(|n| n.header.id);
        id.and_then(|id| HEAD_PRIORITY.iter().position(|&p| p == id))
            .unwrap_or(HEAD_PRIORITY.len())
    });
}

fn uid_for(name: &str, data: &[u8]) -> u64 {
    let mut hasher = DefaultHasher::new();
    name.hash(&mut hasher);
    data.len().hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ids;
    use crate::vint::VOID_ID;

    fn info_node() -> Node {
        let mut node = Node::new_from_header(Header::new(ids::INFO, 0), schema::lookup(ids::INFO));
        node.read_state = ReadState::FullyLoaded;
        node
    }

    #[test]
    fn normalize_builds_seek_head_as_first_child() {
        let mut tree = Tree::new();
        let mut segment = Node::new_from_header(Header::new(ids::SEGMENT, 0), schema::lookup(ids::SEGMENT));
        segment.read_state = ReadState::FullyLoaded;
        let segment_id = tree.arena.alloc(segment);
        tree.top_level.push(segment_id);
        let info_id = tree.add_child(Some(segment_id), info_node()).unwrap();
        tree.arena.get_mut(info_id).unwrap().read_state = ReadState::FullyLoaded;

        let mut view = Segment::new(&mut tree, segment_id).unwrap();
        view.normalize(&NormalizeOptions::default()).unwrap();

        let children = tree.arena.get(segment_id).unwrap().children().unwrap();
        assert_eq!(tree.arena.get(children[0]).unwrap().header.id, ids::SEEK_HEAD);
    }

    #[test]
    fn add_attachment_creates_attachments_container() {
        let mut tree = Tree::new();
        let mut segment = Node::new_from_header(Header::new(ids::SEGMENT, 0), schema::lookup(ids::SEGMENT));
        segment.read_state = ReadState::FullyLoaded;
        let segment_id = tree.arena.alloc(segment);
        tree.top_level.push(segment_id);

        let mut view = Segment::new(&mut tree, segment_id).unwrap();
        let attached = view
            .add_attachment("cover.jpg", "image/jpeg", Some("cover art"), vec![1, 2, 3])
            .unwrap();
        assert!(tree.arena.get(attached).is_some());
    }

    fn segment_with_cluster() -> (Tree, NodeId) {
        let mut tree = Tree::new();
        let mut segment = Node::new_from_header(Header::new(ids::SEGMENT, 0), schema::lookup(ids::SEGMENT));
        segment.read_state = ReadState::FullyLoaded;
        let segment_id = tree.arena.alloc(segment);
        tree.top_level.push(segment_id);

        let info_id = tree.add_child(Some(segment_id), info_node()).unwrap();
        set_required_info_children(&mut tree, info_id);

        let mut cluster = Node::new_from_header(Header::new(schema::CLUSTER, 0), schema::lookup(schema::CLUSTER));
        cluster.read_state = ReadState::FullyLoaded;
        let cluster_id = tree.add_child(Some(segment_id), cluster).unwrap();
        let mut cluster_payload =
            Node::new_from_header(Header::new(VOID_ID, 0), schema::lookup(VOID_ID));
        cluster_payload.header.size = Some(32);
        cluster_payload.read_state = ReadState::FullyLoaded;
        tree.add_child(Some(cluster_id), cluster_payload).unwrap();

        (tree, segment_id)
    }

    fn set_required_info_children(tree: &mut Tree, info_id: NodeId) {
        crate::accessors::set_child_uint(tree, info_id, ids::TIMESTAMP_SCALE, 1_000_000).unwrap();
        crate::accessors::set_child_text(tree, info_id, ids::MUXING_APP, "mkv-reflow").unwrap();
        crate::accessors::set_child_text(tree, info_id, ids::WRITING_APP, "mkv-reflow").unwrap();
    }

    /// An Attachments container too large for the head's established on-disk capacity must be
    /// relocated after the Cluster rather than growing the head past where the Cluster used to
    /// start.
    #[test]
    fn oversized_attachment_overflows_head_into_tail() {
        let (tree, segment_id) = segment_with_cluster();
        let mut file = crate::reader::File::from_source(std::io::Cursor::new(Vec::new())).unwrap();
        file.tree = tree;
        {
            let mut segment = Segment::new(&mut file.tree, segment_id).unwrap();
            segment.normalize(&NormalizeOptions::default()).unwrap();
        }

        // Round-trip through a real save/read cycle so every head child carries a genuine
        // `original_total_size` — the capacity ceiling `normalize` must respect comes from
        // here, not from children built directly in memory.
        let mut out = std::io::Cursor::new(Vec::new());
        file.save_changes(&mut out).unwrap();
        let mut reloaded = crate::reader::File::from_source(out).unwrap();
        let segment_id = reloaded.tree.top_level[0];
        let cluster_id = reloaded
            .tree
            .children_named(Some(segment_id), schema::CLUSTER)
            .next()
            .unwrap();

        {
            let mut segment = Segment::new(&mut reloaded.tree, segment_id).unwrap();
            // Route the attachment through the head instead of the caller's default tail list,
            // so only genuine overflow (not the default routing) sends it to the tail.
            let opts = NormalizeOptions { rearrange: RearrangeOptions::default(), tail: Vec::new() };
            segment
                .add_attachment("huge.bin", "application/octet-stream", None, vec![0xAAu8; 8192])
                .unwrap();
            segment.normalize(&opts).unwrap();
        }

        assert!(crate::rearrange::consistent(&reloaded.tree, segment_id));

        let children = reloaded.tree.children_of(Some(segment_id));
        let cluster_pos = children.iter().position(|&c| c == cluster_id).unwrap();
        let attachments_id = reloaded
            .tree
            .children_named(Some(segment_id), ids::ATTACHMENTS)
            .next()
            .unwrap();
        let attachments_pos = children.iter().position(|&c| c == attachments_id).unwrap();

        assert!(
            attachments_pos > cluster_pos,
            "an Attachments container too large for the head must be relocated after the Cluster"
        );
    }

    #[test]
    fn allow_move_reorders_head_by_priority() {
        let mut tree = Tree::new();
        let mut segment = Node::new_from_header(Header::new(ids::SEGMENT, 0), schema::lookup(ids::SEGMENT));
        segment.read_state = ReadState::FullyLoaded;
        let segment_id = tree.arena.alloc(segment);
        tree.top_level.push(segment_id);

        // Build Tracks before Info, the wrong priority order.
        let mut tracks = Node::new_from_header(Header::new(ids::TRACKS, 0), schema::lookup(ids::TRACKS));
        tracks.read_state = ReadState::FullyLoaded;
        tree.add_child(Some(segment_id), tracks).unwrap();
        let info_id = tree.add_child(Some(segment_id), info_node()).unwrap();
        set_required_info_children(&mut tree, info_id);

        let mut segment = Segment::new(&mut tree, segment_id).unwrap();
        let opts = NormalizeOptions {
            rearrange: RearrangeOptions { allow_move: true, ..RearrangeOptions::default() },
            tail: Vec::new(),
        };
        segment.normalize(&opts).unwrap();

        let children = tree.children_of(Some(segment_id));
        let info_pos = children.iter().position(|&c| c == info_id).unwrap();
        let tracks_pos = children
            .iter()
            .position(|&c| tree.arena.get(c).unwrap().header.id == ids::TRACKS)
            .unwrap();
        assert!(info_pos < tracks_pos, "Info must sort before Tracks when allow_move is set");
    }
}
