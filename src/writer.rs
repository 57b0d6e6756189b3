//! The delta writer: walks the tree, writing only dirty subtrees and copying the rest verbatim.
//!
//! `dest` may alias `src` (an in-place edit of the file the tree was read from), so writing
//! happens in two passes rather than one. The plan pass walks the tree read-only and decides,
//! for every node, either the bytes to emit (dirty content, re-encoded) or a source range to
//! copy; it never touches `dest`. The materialize pass then writes everything to `dest` in
//! increasing offset order with no further reads of `src` for nodes classified as safe.
//!
//! A copy is unsafe — its source bytes are read eagerly during planning, before any byte of
//! `dest` is written — exactly when the node's new position is *after* its old one
//! (`src_offset < dest_offset`). That only happens when something earlier in the document grew,
//! and it is exactly the condition under which writing `dest` in increasing offset order would
//! otherwise pass (and, if `src` and `dest` alias, clobber) this node's still-unread source
//! bytes before we get to them. A node whose new position is at or after its old one
//! (`src_offset >= dest_offset`) is safe to read lazily at materialize time: nothing written so
//! far can have touched that source range yet.

use std::io::{Read, Seek, SeekFrom, Write};

use crate::arena::NodeId;
use crate::element::{Body, ReadState};
use crate::error::Error;
use crate::rearrange::check;
use crate::reader::File;
use crate::tree::Tree;

/// One unit of output, already ordered by destination offset.
enum WriteOp {
    /// Bytes to emit verbatim: dirty re-encoded content, or an unsafe copy's bytes, read
    /// eagerly during planning.
    Bytes(Vec<u8>),
    /// A safe copy: read `len` bytes starting at `src_offset` from `src` at materialize time.
    LazyCopy { src_offset: u64, len: u64 },
}

/// Bookkeeping to apply to the tree once every byte has been written successfully.
struct FinalizeOp {
    node_id: NodeId,
    dest_offset: u64,
    len: u64,
    /// `Some` only for a freshly re-encoded Atomic, to refresh its cached encoded payload.
    atomic_bytes: Option<Vec<u8>>,
}

impl<S: Read + Seek> File<S> {
    /// Write the current tree to `dest`. Unchanged subtrees are copied byte-for-byte from the
    /// original source; dirty subtrees are re-encoded. `dest` may be a separate sink or the
    /// same file the tree was read from — see the module-level note on how that aliasing is
    /// made safe.
    ///
    /// Fails with `Inconsistent` (and writes nothing) if any fully-loaded Master's children no
    /// longer sum to its declared size — callers must run `rearrange`/`Segment::normalize`
    /// first.
    pub fn save_changes<W: Write + Seek>(&mut self, dest: &mut W) -> crate::Result<()> {
        let top_level = self.tree.top_level.clone();
        for &id in &top_level {
            assert_consistent(&self.tree, id)?;
        }

        let mut ops = Vec::new();
        let mut finals = Vec::new();
        let mut cursor = 0u64;
        {
            let (tree, src) = self.tree_and_source();
            for &id in &top_level {
                cursor = plan_node(tree, src, id, cursor, &mut ops, &mut finals)?;
            }
        }

        materialize(self.source_mut(), dest, &ops)?;

        for f in finals {
            apply_finalize(&mut self.tree, f);
        }
        Ok(())
    }
}

fn assert_consistent(tree: &Tree, node_id: NodeId) -> crate::Result<()> {
    let Some(node) = tree.arena.get(node_id) else {
        return Ok(());
    };
    if !matches!(node.body, Body::Master { .. }) {
        return Ok(());
    }
    if node.read_state == ReadState::SummaryLoaded {
        // Deferred (Cluster/Cues) regions were never read into children; their declared size
        // is still trustworthy precisely because nothing touched them.
        return Ok(());
    }
    check(tree, node_id)?;
    let children = node
        .children()
        .expect("checked Master above")
        .to_vec();
    for c in children {
        assert_consistent(tree, c)?;
    }
    Ok(())
}

/// Append ops for `node_id` at `dest_start`, returning the cursor just past it.
fn plan_node<S: Read + Seek>(
    tree: &Tree,
    src: &mut S,
    node_id: NodeId,
    dest_start: u64,
    ops: &mut Vec<WriteOp>,
    finals: &mut Vec<FinalizeOp>,
) -> crate::Result<u64> {
    let Some(node) = tree.arena.get(node_id) else {
        return Ok(dest_start);
    };

    if !node.dirty(&tree.arena) {
        return plan_copy(tree, src, node_id, dest_start, ops, finals);
    }

    match node.body.tag() {
        "Master" => plan_dirty_master(tree, src, node_id, dest_start, ops, finals),
        "Atomic" => plan_dirty_atomic(tree, node_id, dest_start, ops, finals),
        "Void" => plan_dirty_void(tree, node_id, dest_start, ops, finals),
        "Unsupported" => unreachable!("Body::dirty never returns true for Unsupported"),
        _ => unreachable!("Body::tag only returns the four cases matched above"),
    }
}

fn plan_copy<S: Read + Seek>(
    tree: &Tree,
    src: &mut S,
    node_id: NodeId,
    dest_start: u64,
    ops: &mut Vec<WriteOp>,
    finals: &mut Vec<FinalizeOp>,
) -> crate::Result<u64> {
    let node = tree.arena.get(node_id).expect("checked by caller");
    let src_offset = node.stream_offset.unwrap_or(0);
    let len = node.total_size();

    if src_offset < dest_start {
        // Unsafe: this region's new position is after its old one, so it must be read before
        // any `dest` write can reach (and, if aliased, overwrite) it.
        src.seek(SeekFrom::Start(src_offset))?;
        let mut buf = vec![0u8; len as usize];
        src.read_exact(&mut buf)?;
        ops.push(WriteOp::Bytes(buf));
    } else {
        ops.push(WriteOp::LazyCopy { src_offset, len });
    }

    finals.push(FinalizeOp { node_id, dest_offset: dest_start, len, atomic_bytes: None });
    Ok(dest_start + len)
}

fn plan_dirty_master<S: Read + Seek>(
    tree: &Tree,
    src: &mut S,
    node_id: NodeId,
    dest_start: u64,
    ops: &mut Vec<WriteOp>,
    finals: &mut Vec<FinalizeOp>,
) -> crate::Result<u64> {
    let node = tree.arena.get(node_id).expect("checked by caller");
    let header_bytes = node.header.encode()?;
    let mut cursor = dest_start + header_bytes.len() as u64;
    ops.push(WriteOp::Bytes(header_bytes));

    let children = node.children().expect("Master body").to_vec();
    for cid in children {
        cursor = plan_node(tree, src, cid, cursor, ops, finals)?;
    }

    finals.push(FinalizeOp {
        node_id,
        dest_offset: dest_start,
        len: cursor - dest_start,
        atomic_bytes: None,
    });
    Ok(cursor)
}

fn plan_dirty_atomic(
    tree: &Tree,
    node_id: NodeId,
    dest_start: u64,
    ops: &mut Vec<WriteOp>,
    finals: &mut Vec<FinalizeOp>,
) -> crate::Result<u64> {
    let node = tree.arena.get(node_id).expect("checked by caller");
    let value = node.value().expect("Atomic body");
    let encoded = value.encode();
    let header_bytes = node.header.encode()?;

    let declared = node.header.size.unwrap_or(encoded.len() as u64) as usize;
    let mut buf = header_bytes;
    buf.extend_from_slice(&encoded);
    if declared > encoded.len() {
        // Explicit reservation: pad to the declared size with zero bytes.
        buf.resize(buf.len() + (declared - encoded.len()), 0);
    }

    let total = buf.len() as u64;
    ops.push(WriteOp::Bytes(buf));
    finals.push(FinalizeOp {
        node_id,
        dest_offset: dest_start,
        len: total,
        atomic_bytes: Some(encoded),
    });
    Ok(dest_start + total)
}

fn plan_dirty_void(
    tree: &Tree,
    node_id: NodeId,
    dest_start: u64,
    ops: &mut Vec<WriteOp>,
    finals: &mut Vec<FinalizeOp>,
) -> crate::Result<u64> {
    let node = tree.arena.get(node_id).expect("checked by caller");
    let header_bytes = node.header.encode()?;
    let payload = node.header.size.unwrap_or(0);

    let mut buf = header_bytes;
    buf.resize(buf.len() + payload as usize, 0);

    let total = buf.len() as u64;
    ops.push(WriteOp::Bytes(buf));
    finals.push(FinalizeOp { node_id, dest_offset: dest_start, len: total, atomic_bytes: None });
    Ok(dest_start + total)
}

/// Write every planned op to `dest` in order. `LazyCopy` ops read from `src` right before
/// writing — by construction (see `plan_copy`) nothing written so far can have overwritten the
/// bytes they're about to read, even if `src` and `dest` alias.
fn materialize<S: Read + Seek, W: Write + Seek>(src: &mut S, dest: &mut W, ops: &[WriteOp]) -> crate::Result<()> {
    for op in ops {
        match op {
            WriteOp::Bytes(buf) => dest.write_all(buf)?,
            WriteOp::LazyCopy { src_offset, len } => {
                src.seek(SeekFrom::Start(*src_offset))?;
                let mut buf = vec![0u8; *len as usize];
                src.read_exact(&mut buf)?;
                dest.write_all(&buf)?;
            }
        }
    }
    Ok(())
}

fn apply_finalize(tree: &mut Tree, f: FinalizeOp) {
    if let Some(n) = tree.arena.get_mut(f.node_id) {
        n.stream_offset = Some(f.dest_offset);
        n.original_total_size = Some(f.len);
        if let Some(encoded) = f.atomic_bytes {
            if let Body::Atomic { original_bytes, .. } = &mut n.body {
                *original_bytes = Some(encoded);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use std::io::Cursor;

    fn minimal_ebml_header() -> Vec<u8> {
        vec![0x1A, 0x45, 0xDF, 0xA3, 0x84, 0x42, 0x86, 0x81, 0x01]
    }

    #[test]
    fn round_trip_without_mutation_is_byte_identical() {
        let original = minimal_ebml_header();
        let mut file = File::from_source(Cursor::new(original.clone())).unwrap();
        let mut out = Cursor::new(Vec::new());
        file.save_changes(&mut out).unwrap();
        assert_eq!(out.into_inner(), original);
    }

    #[test]
    fn editing_a_value_shrinks_and_still_saves() {
        let original = minimal_ebml_header();
        let mut file = File::from_source(Cursor::new(original)).unwrap();
        let ebml_id = file.tree.top_level[0];
        let version_id = file.tree.arena.get(ebml_id).unwrap().children().unwrap()[0];
        file.tree
            .arena
            .get_mut(version_id)
            .unwrap()
            .set_value(Value::Unsigned(2))
            .unwrap();

        crate::rearrange::rearrange(&mut file.tree, ebml_id, &crate::options::RearrangeOptions::default())
            .unwrap();

        let mut out = Cursor::new(Vec::new());
        file.save_changes(&mut out).unwrap();
        assert!(!out.get_ref().is_empty());
    }
}
