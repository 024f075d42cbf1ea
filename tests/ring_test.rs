#[path = "support/mod.rs"]
mod support;

use support::make_segment;
use zeroipc::structures::Ring;

#[test]
fn push_then_pop_roundtrips() {
    let segment = make_segment(1024 * 1024);
    let ring = Ring::<u32>::create(&segment, "r", 16).unwrap();
    ring.push(11).unwrap();
    assert_eq!(ring.pop().unwrap(), 11);
}

#[test]
fn positions_are_monotonic_and_lengths_track_them() {
    let segment = make_segment(1024 * 1024);
    let ring = Ring::<u32>::create(&segment, "r", 4).unwrap();
    for v in 0..4u32 {
        ring.push(v).unwrap();
    }
    assert!(ring.is_full());
    assert_eq!(ring.total_written(), 4);

    ring.pop().unwrap();
    ring.pop().unwrap();
    assert_eq!(ring.total_read(), 2);
    assert_eq!(ring.len(), 2);

    ring.push(4).unwrap();
    ring.push(5).unwrap();
    assert_eq!(ring.total_written(), 6);
    assert!(ring.total_written() >= ring.total_read());
}

#[test]
fn bulk_transfer_streams_ten_thousand_samples_without_loss() {
    let segment = make_segment(8 * 1024 * 1024);
    let ring = Ring::<(u64, f64)>::create(&segment, "samples", 1024).unwrap();

    let total = 10_000u64;
    let mut produced = 0u64;
    let mut consumed: Vec<(u64, f64)> = Vec::with_capacity(total as usize);
    let mut buf = [(0u64, 0.0f64); 32];

    while consumed.len() < total as usize {
        while produced < total {
            match ring.push((produced, produced as f64 * 0.5)) {
                Ok(()) => produced += 1,
                Err(_) => break,
            }
        }
        let n = ring.pop_bulk(&mut buf);
        consumed.extend_from_slice(&buf[..n]);
        if n == 0 && produced == total {
            break;
        }
    }

    assert_eq!(ring.total_written(), total);
    assert_eq!(ring.total_read(), total);
    assert_eq!(consumed.len(), total as usize);
    for (i, (ts, value)) in consumed.iter().enumerate() {
        assert_eq!(*ts, i as u64);
        assert_eq!(*value, i as f64 * 0.5);
    }
}

#[test]
fn push_overwrite_discards_the_oldest_element_when_full() {
    let segment = make_segment(1024 * 1024);
    let ring = Ring::<u32>::create(&segment, "r", 3).unwrap();
    ring.push(1).unwrap();
    ring.push(2).unwrap();
    ring.push(3).unwrap();
    assert!(ring.is_full());

    ring.push_overwrite(4);
    let mut remaining = Vec::new();
    while let Ok(v) = ring.pop() {
        remaining.push(v);
    }
    assert_eq!(remaining, vec![2, 3, 4]);
}

#[test]
fn get_last_n_reads_without_advancing() {
    let segment = make_segment(1024 * 1024);
    let ring = Ring::<u32>::create(&segment, "r", 8).unwrap();
    for v in 0..5u32 {
        ring.push(v).unwrap();
    }
    let mut buf = [0u32; 3];
    let n = ring.get_last_n(3, &mut buf);
    assert_eq!(n, 3);
    assert_eq!(buf, [2, 3, 4]);
    assert_eq!(ring.len(), 5, "get_last_n must not advance read_pos");
}
