use std::cell::RefCell;
use std::io::{Cursor, Read, Seek, SeekFrom, Write};
use std::rc::Rc;

use mkv_reflow::prelude::*;

/// An empty in-memory file, ready to have elements built onto it via the tree API.
pub fn empty_file() -> File<Cursor<Vec<u8>>> {
    File::from_source(Cursor::new(Vec::new())).unwrap()
}

fn master(id: ElementId) -> Node {
    let mut node = Node::new_from_header(Header::new(id, 0), schema::lookup(id));
    node.read_state = ReadState::FullyLoaded;
    node
}

/// Build a Segment containing a fully-populated (schema-valid) Info, returning both node IDs.
pub fn build_segment_with_info(file: &mut File<Cursor<Vec<u8>>>) -> (NodeId, NodeId) {
    let segment_id = file.tree.add_child(None, master(ids::SEGMENT)).unwrap();
    let info_id = file.tree.add_child(Some(segment_id), master(ids::INFO)).unwrap();

    mkv_reflow::accessors::set_child_uint(&mut file.tree, info_id, ids::TIMESTAMP_SCALE, 1_000_000).unwrap();
    mkv_reflow::accessors::set_child_text(&mut file.tree, info_id, ids::MUXING_APP, "mkv-reflow").unwrap();
    mkv_reflow::accessors::set_child_text(&mut file.tree, info_id, ids::WRITING_APP, "mkv-reflow").unwrap();

    mkv_reflow::rearrange::rearrange(&mut file.tree, segment_id, &RearrangeOptions::default()).unwrap();
    (segment_id, info_id)
}

/// Serialize `file` to a fresh in-memory buffer and reopen it as a new `File`, simulating a
/// save-then-reload cycle.
pub fn roundtrip(file: &mut File<Cursor<Vec<u8>>>) -> File<Cursor<Vec<u8>>> {
    let mut out = Cursor::new(Vec::new());
    file.save_changes(&mut out).unwrap();
    File::from_source(out).unwrap()
}

/// A byte buffer shared between multiple independent `Read + Write + Seek` handles, each with
/// its own cursor position. Unlike `Cursor<Vec<u8>>`, two handles obtained from the same
/// `SharedBuffer` alias the same underlying bytes — the only way to construct a genuine
/// same-file read-while-write scenario in a test without touching the real filesystem.
#[derive(Clone)]
pub struct SharedBuffer {
    data: Rc<RefCell<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { data: Rc::new(RefCell::new(bytes)) }
    }

    /// A fresh handle onto the same backing bytes, with its own cursor starting at 0.
    pub fn handle(&self) -> SharedHandle {
        SharedHandle { data: self.data.clone(), pos: 0 }
    }

    pub fn snapshot(&self) -> Vec<u8> {
        self.data.borrow().clone()
    }
}

pub struct SharedHandle {
    data: Rc<RefCell<Vec<u8>>>,
    pos: u64,
}

impl Read for SharedHandle {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let data = self.data.borrow();
        let start = self.pos as usize;
        if start >= data.len() {
            return Ok(0);
        }
        let n = buf.len().min(data.len() - start);
        buf[..n].copy_from_slice(&data[start..start + n]);
        self.pos += n as u64;
        Ok(n)
    }
}

impl Write for SharedHandle {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut data = self.data.borrow_mut();
        let start = self.pos as usize;
        let end = start + buf.len();
        if end > data.len() {
            data.resize(end, 0);
        }
        data[start..end].copy_from_slice(buf);
        self.pos += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Seek for SharedHandle {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        let len = self.data.borrow().len() as u64;
        let new_pos = match pos {
            SeekFrom::Start(p) => p as i64,
            SeekFrom::End(p) => len as i64 + p,
            SeekFrom::Current(p) => self.pos as i64 + p,
        };
        if new_pos < 0 {
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, "seek to negative position"));
        }
        self.pos = new_pos as u64;
        Ok(self.pos)
    }
}
