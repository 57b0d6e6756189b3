mod common;

use mkv_reflow::prelude::*;

#[test]
fn adding_an_attachment_grows_the_segment_without_overflow() {
    let mut file = common::empty_file();
    let (segment_id, _info_id) = common::build_segment_with_info(&mut file);

    {
        let mut segment = Segment::new(&mut file.tree, segment_id).unwrap();
        segment.normalize(&NormalizeOptions::default()).unwrap();
        segment
            .add_attachment("cover.jpg", "image/jpeg", Some("cover art"), vec![0xFFu8; 64])
            .unwrap();
        segment.normalize(&NormalizeOptions::default()).unwrap();
    }

    assert!(mkv_reflow::rearrange::consistent(&file.tree, segment_id));
    let space = file.print_space();
    assert!(!space.contains("OVERFLOW"));
    assert!(!space.contains("UNDERFLOW"));

    let attachments_id = file
        .tree
        .children_named(Some(segment_id), ids::ATTACHMENTS)
        .next()
        .expect("Attachments container should have been created");
    let attached_file_id = file
        .tree
        .children_named(Some(attachments_id), ids::ATTACHED_FILE)
        .next()
        .expect("AttachedFile should have been created");
    assert_eq!(
        mkv_reflow::accessors::child_text(&file.tree, attached_file_id, ids::FILE_NAME),
        Some("cover.jpg")
    );

    let reloaded = common::roundtrip(&mut file);
    let segment_id = reloaded.tree.top_level[0];
    assert!(mkv_reflow::rearrange::consistent(&reloaded.tree, segment_id));
}
