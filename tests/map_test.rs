#[path = "support/mod.rs"]
mod support;

use support::make_segment;
use std::sync::Arc;
use std::thread;
use zeroipc::structures::{Map, Set, SetExt};

#[test]
fn insert_then_get_roundtrips() {
    let segment = make_segment(1024 * 1024);
    let map = Map::<u64, u64>::create(&segment, "m", 64).unwrap();
    assert!(map.insert(7, 49).unwrap());
    assert_eq!(map.get(&7), Some(49));
}

#[test]
fn duplicate_insert_returns_false_and_does_not_overwrite() {
    let segment = make_segment(1024 * 1024);
    let map = Map::<u64, u64>::create(&segment, "m", 64).unwrap();
    assert!(map.insert(1, 100).unwrap());
    assert!(!map.insert(1, 200).unwrap());
    assert_eq!(map.get(&1), Some(100));
}

#[test]
fn erase_then_reinsert_reuses_the_tombstone() {
    let segment = make_segment(1024 * 1024);
    let map = Map::<u64, u64>::create(&segment, "m", 64).unwrap();
    map.insert(5, 50).unwrap();
    assert!(map.erase(&5));
    assert_eq!(map.get(&5), None);
    assert_eq!(map.len(), 0);

    assert!(map.insert(5, 500).unwrap());
    assert_eq!(map.get(&5), Some(500));
}

#[test]
fn update_overwrites_an_existing_key_only() {
    let segment = make_segment(1024 * 1024);
    let map = Map::<u64, u64>::create(&segment, "m", 64).unwrap();
    assert!(!map.update(&1, 2), "update on missing key returns false");
    map.insert(1, 10).unwrap();
    assert!(map.update(&1, 20));
    assert_eq!(map.get(&1), Some(20));
}

#[test]
fn set_is_a_map_with_unit_values() {
    let segment = make_segment(1024 * 1024);
    let set = Set::<u64>::create(&segment, "s", 32).unwrap();
    assert!(set.insert_key(3).unwrap());
    assert!(set.contains_key(&3));
    assert!(!set.insert_key(3).unwrap());
}

#[test]
fn eight_threads_insert_disjoint_ranges_and_all_are_findable() {
    let segment = Arc::new(make_segment(8 * 1024 * 1024));
    let threads = 8u64;
    let per_thread = 1000u64;
    let map = Arc::new(
        Map::<u64, u64>::create(&segment, "m", (threads * per_thread) as usize).unwrap(),
    );

    let mut handles = Vec::new();
    for t in 0..threads {
        let map = map.clone();
        handles.push(thread::spawn(move || {
            for key in (t * per_thread)..((t + 1) * per_thread) {
                assert!(map.insert(key, key * 2).unwrap());
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(map.len(), (threads * per_thread) as usize);
    for key in 0..(threads * per_thread) {
        assert_eq!(map.get(&key), Some(key * 2));
    }
}

#[test]
fn insert_past_max_load_factor_returns_full() {
    let segment = make_segment(1024 * 1024);
    // capacity 4 rounds bucket_count up to 8; the 0.75 ceiling caps
    // occupancy at 6 entries, so the 7th insert must report full even
    // though two buckets remain physically empty.
    let map = Map::<u64, u64>::create(&segment, "m", 4).unwrap();
    assert_eq!(map.bucket_count(), 8);
    for key in 0..6u64 {
        assert!(map.insert(key, key).unwrap());
    }
    assert_eq!(map.len(), 6);
    assert!(map.insert(6, 6).is_err());
}
