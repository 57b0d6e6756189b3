//! Random-access reading of an element tree from a seekable byte source.

use std::io::{Read, Seek, SeekFrom};

use crate::arena::NodeId;
use crate::element::{Body, Node, ReadState};
use crate::error::Error;
use crate::header::Header;
use crate::schema::{self, SummaryBehavior};
use crate::tree::Tree;
use crate::value::Value;

/// Whether a read descends fully into every Master, or defers `summary_behavior == Defer`
/// containers (Clusters, Cues) to a header-only stub.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ReadMode {
    /// Read every element's body, recursing into every Master.
    Normal,
    /// Skip the children of any Master whose schema entry marks it `Defer`.
    Summary,
}

/// A seekable Matroska/EBML byte source plus the element tree read from it.
///
/// A `File` has no header of its own; `tree.top_level` holds its children directly, the same
/// way a Master's children live in `tree.arena`.
pub struct File<S> {
    source: S,
    /// The element tree read from `source`.
    pub tree: Tree,
}

impl File<std::io::BufReader<std::fs::File>> {
    /// Open a file from disk and read its top-level elements in summary mode.
    pub fn open(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_source(std::io::BufReader::new(file))
    }
}

impl<S: Read + Seek> File<S> {
    /// Wrap an already-open seekable source and read its top-level elements in summary mode.
    pub fn from_source(mut source: S) -> crate::Result<Self> {
        let tree = read_top_level(&mut source, ReadMode::Summary)?;
        Ok(Self { source, tree })
    }

    /// The backing source, for use by the delta writer.
    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Split the borrow of `self` into an immutable view of the tree and a mutable handle on
    /// the source, for callers (the delta writer's planning pass) that need to read tree state
    /// and seek the source independently without holding `&mut self` for either.
    pub(crate) fn tree_and_source(&mut self) -> (&Tree, &mut S) {
        (&self.tree, &mut self.source)
    }

    /// Re-read a deferred (`SummaryLoaded`) Master's children under full read mode.
    pub fn read_data(&mut self, node: NodeId) -> crate::Result<()> {
        let start = self
            .tree
            .arena
            .get(node)
            .and_then(|n| n.stream_offset)
            .ok_or(Error::UnexpectedEof)?;
        let header_width = self
            .tree
            .arena
            .get(node)
            .map(|n| n.header.total_header_width())
            .unwrap_or(0);
        self.source.seek(SeekFrom::Start(start + header_width))?;
        read_body(&mut self.tree, &mut self.source, node, ReadMode::Normal)
    }

    /// A human-readable one-line-per-element summary of the whole tree.
    pub fn summary(&self) -> String {
        let mut out = format!("{} top-level element(s)\n", self.tree.top_level.len());
        for &id in &self.tree.top_level {
            self.describe(id, 0, None, &mut out);
        }
        out
    }

    /// Like [`File::summary`], but only descending `depth` levels.
    pub fn print_children(&self, depth: usize) -> String {
        let mut out = String::new();
        for &id in &self.tree.top_level {
            self.describe(id, 0, Some(depth), &mut out);
        }
        out
    }

    /// Describe each Master's byte layout, flagging containers whose children overrun or
    /// underrun the declared payload size.
    pub fn print_space(&self) -> String {
        let mut out = String::new();
        for &id in &self.tree.top_level {
            self.describe_space(id, &mut out);
        }
        out
    }

    fn describe(&self, id: NodeId, depth: usize, max_depth: Option<usize>, out: &mut String) {
        let Some(node) = self.tree.arena.get(id) else { return };
        out.push_str(&"  ".repeat(depth));
        out.push_str(&format!(
            "{} ({}) size={}\n",
            node.header.id,
            node.body.tag(),
            node.total_size()
        ));
        if max_depth.is_some_and(|d| depth >= d) {
            return;
        }
        if let Some(children) = node.children() {
            for &c in children {
                self.describe(c, depth + 1, max_depth, out);
            }
        }
    }

    fn describe_space(&self, id: NodeId, out: &mut String) {
        let Some(node) = self.tree.arena.get(id) else { return };
        if let Some(children) = node.children() {
            let sum: u64 = children
                .iter()
                .filter_map(|&c| self.tree.arena.get(c))
                .map(|n| n.total_size())
                .sum();
            let data_size = node.header.size.unwrap_or(0);
            let flag = match sum.cmp(&data_size) {
                std::cmp::Ordering::Greater => " OVERFLOW",
                std::cmp::Ordering::Less => " UNDERFLOW",
                std::cmp::Ordering::Equal => "",
            };
            out.push_str(&format!(
                "{}: children={} bytes, capacity={} bytes{}\n",
                node.header.id, sum, data_size, flag
            ));
            for &c in children {
                self.describe_space(c, out);
            }
        }
    }
}

fn read_top_level<S: Read + Seek>(src: &mut S, mode: ReadMode) -> crate::Result<Tree> {
    let mut tree = Tree::new();
    loop {
        let pos = src.stream_position()?;
        let header = match Header::read_from(src) {
            Ok(h) => h,
            Err(Error::UnexpectedEof) => break,
            Err(e) => return Err(e),
        };
        let schema_entry = schema::lookup(header.id);
        let mut node = Node::new_from_header(header, schema_entry);
        node.stream_offset = Some(pos);
        let node_id = tree.arena.alloc(node);
        read_body(&mut tree, src, node_id, mode)?;
        if let Some(n) = tree.arena.get_mut(node_id) {
            n.original_total_size = Some(n.total_size());
        }
        tree.top_level.push(node_id);
    }
    Ok(tree)
}

fn read_body<S: Read + Seek>(
    tree: &mut Tree,
    src: &mut S,
    node_id: NodeId,
    mode: ReadMode,
) -> crate::Result<()> {
    let (tag, data_size, id, atomic_kind) = {
        let node = tree.arena.get(node_id).expect("just allocated");
        let kind = match &node.body {
            Body::Atomic { kind, .. } => Some(*kind),
            _ => None,
        };
        (node.body.tag(), node.header.size, node.header.id, kind)
    };

    match tag {
        "Master" => {
            let defer = mode == ReadMode::Summary
                && matches!(
                    schema::lookup(id).map(|e| e.summary_behavior),
                    Some(SummaryBehavior::Defer)
                );
            if defer {
                match data_size {
                    Some(size) => {
                        src.seek(SeekFrom::Current(size as i64))?;
                    }
                    None => {
                        return Err(Error::CannotRearrange {
                            id,
                            reason: "deferred Master has unknown size; cannot skip".into(),
                        });
                    }
                }
                log::debug!("deferred reading of {id}");
                if let Some(n) = tree.arena.get_mut(node_id) {
                    n.read_state = ReadState::SummaryLoaded;
                }
            } else {
                let start_pos = src.stream_position()?;
                match data_size {
                    Some(size) => read_master_children(tree, src, node_id, Some(start_pos + size), mode)?,
                    None => read_master_children(tree, src, node_id, None, mode)?,
                }
                if let Some(n) = tree.arena.get_mut(node_id) {
                    n.read_state = ReadState::FullyLoaded;
                }
            }
        }
        "Atomic" => {
            let size = data_size.ok_or(Error::UnexpectedEof)?;
            let mut buf = vec![0u8; size as usize];
            src.read_exact(&mut buf)?;
            let kind = atomic_kind.expect("Atomic body always carries a kind");
            let value = Value::decode(kind, id, &buf)?;
            if let Some(n) = tree.arena.get_mut(node_id) {
                if let Body::Atomic { value: v, original_bytes, .. } = &mut n.body {
                    *v = value;
                    *original_bytes = Some(buf);
                }
                n.read_state = ReadState::FullyLoaded;
            }
        }
        "Void" => {
            let size = data_size.unwrap_or(0);
            src.seek(SeekFrom::Current(size as i64))?;
            if let Some(n) = tree.arena.get_mut(node_id) {
                n.read_state = ReadState::FullyLoaded;
            }
        }
        "Unsupported" => {
            let size = data_size.ok_or(Error::UnexpectedEof)?;
            let mut buf = vec![0u8; size as usize];
            src.read_exact(&mut buf)?;
            log::warn!("unrecognized element ID {id}, preserving {size} raw bytes");
            if let Some(n) = tree.arena.get_mut(node_id) {
                if let Body::Unsupported { raw } = &mut n.body {
                    *raw = buf;
                }
                n.read_state = ReadState::FullyLoaded;
            }
        }
        _ => unreachable!("Body::tag only returns the four cases matched above"),
    }
    Ok(())
}

/// Read `parent`'s children. `end_pos == None` means "read until EOF" (the reserved
/// unknown-size marker, valid only for a top-level Master per the VINT codec's contract).
fn read_master_children<S: Read + Seek>(
    tree: &mut Tree,
    src: &mut S,
    parent: NodeId,
    end_pos: Option<u64>,
    mode: ReadMode,
) -> crate::Result<()> {
    loop {
        let pos = src.stream_position()?;
        if let Some(end) = end_pos {
            if pos >= end {
                break;
            }
        }
        let header = match Header::read_from(src) {
            Ok(h) => h,
            Err(Error::UnexpectedEof) if end_pos.is_none() => break,
            Err(e) => return Err(e),
        };
        let schema_entry = schema::lookup(header.id);
        let mut child_node = Node::new_from_header(header, schema_entry);
        child_node.parent = Some(parent);
        child_node.stream_offset = Some(pos);
        let child_id = tree.arena.alloc(child_node);
        read_body(tree, src, child_id, mode)?;
        if let Some(n) = tree.arena.get_mut(child_id) {
            n.original_total_size = Some(n.total_size());
        }
        tree.arena
            .get_mut(parent)
            .and_then(|n| n.children_mut())
            .expect("parent validated as Master by its schema entry")
            .push(child_id);
    }
    Ok(())
}
