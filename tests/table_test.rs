#[path = "support/mod.rs"]
mod support;

use support::make_segment;
use zeroipc::Error;

#[test]
fn allocate_returns_discoverable_entry() {
    let segment = make_segment(1024 * 1024);
    let offset = segment
        .allocate("widgets", 256, 4, 64)
        .expect("allocate should succeed in a fresh segment");
    assert!(offset >= 64, "offset must land past the directory table");

    let entry = segment.find("widgets").expect("entry should be discoverable");
    assert_eq!(entry.offset, offset);
    assert_eq!(entry.size, 256);
    assert_eq!(entry.elem_size, 4);
    assert_eq!(entry.num_elem, 64);
}

#[test]
fn duplicate_name_is_rejected() {
    let segment = make_segment(1024 * 1024);
    segment.allocate("dup", 64, 8, 8).unwrap();
    let result = segment.allocate("dup", 64, 8, 8);
    assert!(matches!(result, Err(Error::AlreadyExists(name)) if name == "dup"));
}

#[test]
fn next_offset_strictly_increases_across_allocations() {
    let segment = make_segment(1024 * 1024);
    let a = segment.allocate("a", 128, 8, 16).unwrap();
    let b = segment.allocate("b", 128, 8, 16).unwrap();
    let c = segment.allocate("c", 128, 8, 16).unwrap();
    assert!(a < b);
    assert!(b < c);
}

#[test]
fn erase_hides_entry_without_freeing_its_slot() {
    let segment = make_segment(1024 * 1024);
    segment.allocate("transient", 64, 8, 8).unwrap();
    assert_eq!(segment.count(), 1);

    assert!(segment.erase("transient"));
    assert!(segment.find("transient").is_none());
    // erase doesn't reclaim the directory slot; a fresh allocate still
    // bumps `entry_count` rather than reusing the erased one.
    segment.allocate("transient", 64, 8, 8).unwrap();
    assert_eq!(segment.count(), 1);
}

#[test]
fn allocate_fails_when_segment_is_too_small() {
    let segment = make_segment(4096);
    let result = segment.allocate("huge", 1024 * 1024, 1, 1024 * 1024);
    assert!(matches!(result, Err(Error::SegmentTooSmall { .. })));
}

#[test]
fn name_exceeding_limit_is_rejected() {
    let segment = make_segment(1024 * 1024);
    let long_name = "x".repeat(64);
    let result = segment.allocate(&long_name, 64, 8, 8);
    assert!(matches!(result, Err(Error::NameTooLong(_, _))));
}

#[test]
fn iter_yields_only_active_entries() {
    let segment = make_segment(1024 * 1024);
    segment.allocate("keep", 64, 8, 8).unwrap();
    segment.allocate("drop", 64, 8, 8).unwrap();
    segment.erase("drop");

    let names: Vec<String> = segment.iter().map(|(name, _)| name).collect();
    assert_eq!(names, vec!["keep".to_string()]);
}
