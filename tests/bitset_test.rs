#[path = "support/mod.rs"]
mod support;

use support::make_segment;
use zeroipc::structures::Bitset;

#[test]
fn set_reset_round_trips() {
    let segment = make_segment(1024 * 1024);
    let bits = Bitset::create(&segment, "b", 128).unwrap();
    bits.set(10).unwrap();
    bits.reset(10).unwrap();
    assert!(!bits.test(10).unwrap());
}

#[test]
fn flip_twice_returns_to_the_initial_value() {
    let segment = make_segment(1024 * 1024);
    let bits = Bitset::create(&segment, "b", 128).unwrap();
    let initial = bits.test(20).unwrap();
    bits.flip(20).unwrap();
    bits.flip(20).unwrap();
    assert_eq!(bits.test(20).unwrap(), initial);
}

#[test]
fn count_accurate_matches_the_sum_of_word_popcounts() {
    let segment = make_segment(1024 * 1024);
    let bits = Bitset::create(&segment, "b", 200).unwrap();
    for i in [0, 5, 63, 64, 65, 127, 199] {
        bits.set(i).unwrap();
    }
    assert_eq!(bits.count(), 7);
    assert_eq!(bits.count_accurate(), bits.count());
}

#[test]
fn find_first_and_find_next_walk_set_bits_in_order() {
    let segment = make_segment(1024 * 1024);
    let bits = Bitset::create(&segment, "b", 256).unwrap();
    assert_eq!(bits.find_first(), None, "empty bitset has no set bit");

    for i in [3, 70, 71, 200] {
        bits.set(i).unwrap();
    }
    assert_eq!(bits.find_first(), Some(3));
    assert_eq!(bits.find_next(3), Some(70));
    assert_eq!(bits.find_next(70), Some(71));
    assert_eq!(bits.find_next(71), Some(200));
    assert_eq!(bits.find_next(200), None);
}

#[test]
fn bits_beyond_num_bits_are_unreachable() {
    let segment = make_segment(1024 * 1024);
    // 100 bits needs two 64-bit words; bits [100, 128) are padding.
    let bits = Bitset::create(&segment, "b", 100).unwrap();
    assert!(bits.set(99).is_ok());
    assert!(bits.set(100).is_err());
    assert!(bits.test(100).is_err());
}

#[test]
fn and_or_xor_combine_word_by_word() {
    let segment = make_segment(1024 * 1024);
    let a = Bitset::create(&segment, "a", 64).unwrap();
    let b = Bitset::create(&segment, "bset", 64).unwrap();
    a.set(0).unwrap();
    a.set(1).unwrap();
    b.set(1).unwrap();
    b.set(2).unwrap();

    let and = Bitset::create(&segment, "and", 64).unwrap();
    and.or_with(&a).unwrap();
    and.and_with(&b).unwrap();
    assert!(!and.test(0).unwrap());
    assert!(and.test(1).unwrap());
    assert!(!and.test(2).unwrap());
    assert_eq!(and.count(), and.count_accurate());
}
