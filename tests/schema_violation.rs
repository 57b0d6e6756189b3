mod common;

use mkv_reflow::prelude::*;

/// Info is missing its required TimestampScale child. `rearrange` only fixes positional
/// consistency, not schema conformance, so it succeeds — but `save_changes` must refuse to
/// write anything.
#[test]
fn missing_required_child_blocks_save() {
    let mut file = common::empty_file();
    let segment_id = file
        .tree
        .add_child(None, Node::new_from_header(Header::new(ids::SEGMENT, 0), schema::lookup(ids::SEGMENT)))
        .unwrap();
    let info_id = file
        .tree
        .add_child(Some(segment_id), Node::new_from_header(Header::new(ids::INFO, 0), schema::lookup(ids::INFO)))
        .unwrap();
    mkv_reflow::accessors::set_child_text(&mut file.tree, info_id, ids::MUXING_APP, "x").unwrap();
    mkv_reflow::accessors::set_child_text(&mut file.tree, info_id, ids::WRITING_APP, "x").unwrap();
    // TimestampScale deliberately omitted.

    mkv_reflow::rearrange::rearrange(&mut file.tree, segment_id, &RearrangeOptions::default()).unwrap();

    let mut out = std::io::Cursor::new(Vec::new());
    let result = file.save_changes(&mut out);
    assert!(result.is_err());
    assert!(out.into_inner().is_empty(), "a failed save must write nothing");
}

#[test]
fn disallowed_parent_is_rejected_by_consistent() {
    let mut file = common::empty_file();
    let (segment_id, _info_id) = common::build_segment_with_info(&mut file);
    // Title is only ever allowed directly under Info, never directly under Segment.
    let mut misplaced_title = Node::new_from_header(Header::new(ids::TITLE, 0), schema::lookup(ids::TITLE));
    misplaced_title.set_value(Value::Unicode("nested wrong".into())).unwrap();
    file.tree.add_child(Some(segment_id), misplaced_title).unwrap();

    mkv_reflow::rearrange::rearrange(&mut file.tree, segment_id, &RearrangeOptions::default()).unwrap();
    assert!(!mkv_reflow::rearrange::consistent(&file.tree, segment_id));
}
