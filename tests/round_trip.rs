use std::io::Cursor;

use mkv_reflow::prelude::*;

fn minimal_ebml_header() -> Vec<u8> {
    // EBML { EBMLVersion = 1 }
    vec![0x1A, 0x45, 0xDF, 0xA3, 0x84, 0x42, 0x86, 0x81, 0x01]
}

#[test]
fn unmodified_file_saves_byte_identical() {
    let original = minimal_ebml_header();
    let mut file = File::from_source(Cursor::new(original.clone())).unwrap();
    let mut out = Cursor::new(Vec::new());
    file.save_changes(&mut out).unwrap();
    assert_eq!(out.into_inner(), original);
}

#[test]
fn unknown_element_id_passes_through_verbatim() {
    // A top-level element with no schema entry: ID 0x9F, size 3, payload "abc".
    let bytes = vec![0x9F, 0x83, b'a', b'b', b'c'];
    let mut file = File::from_source(Cursor::new(bytes.clone())).unwrap();

    assert_eq!(file.tree.top_level.len(), 1);
    let id = file.tree.top_level[0];
    assert_eq!(file.tree.arena.get(id).unwrap().body.tag(), "Unsupported");

    let mut out = Cursor::new(Vec::new());
    file.save_changes(&mut out).unwrap();
    assert_eq!(out.into_inner(), bytes);
}
