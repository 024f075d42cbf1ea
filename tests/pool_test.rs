#[path = "support/mod.rs"]
mod support;

use support::make_segment;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use zeroipc::structures::Pool;
use zeroipc::Error;

#[test]
fn acquire_then_release_then_acquire_returns_same_index() {
    let segment = make_segment(1024 * 1024);
    let pool = Pool::<u32>::create(&segment, "p", 16).unwrap();
    let index = pool.acquire().unwrap();
    pool.release(index).unwrap();
    let index_again = pool.acquire().unwrap();
    assert_eq!(index, index_again, "free list is LIFO");
}

#[test]
fn exhausting_capacity_returns_full() {
    let segment = make_segment(1024 * 1024);
    let pool = Pool::<u32>::create(&segment, "p", 4).unwrap();
    for _ in 0..4 {
        pool.acquire().unwrap();
    }
    assert!(matches!(pool.acquire(), Err(Error::Full)));
    assert_eq!(pool.allocated(), 4);
}

#[test]
fn no_two_threads_observe_overlapping_ownership_of_a_slot() {
    let segment = Arc::new(make_segment(1024 * 1024));
    let pool = Arc::new(Pool::<u32>::create(&segment, "p", 100).unwrap());
    let occupancy: Arc<Vec<AtomicU32>> =
        Arc::new((0..100).map(|_| AtomicU32::new(0)).collect());

    let mut handles = Vec::new();
    for thread_id in 0..4u32 {
        let pool = pool.clone();
        let occupancy = occupancy.clone();
        handles.push(thread::spawn(move || {
            let mut held = Vec::new();
            for _ in 0..25 {
                if let Ok(index) = pool.acquire() {
                    let prev = occupancy[index as usize].swap(thread_id + 1, Ordering::AcqRel);
                    assert_eq!(prev, 0, "slot {index} was already occupied");
                    pool.set(index, thread_id);
                    thread::yield_now();
                    assert_eq!(pool.get(index), thread_id);
                    occupancy[index as usize].store(0, Ordering::Release);
                    held.push(index);
                }
            }
            for index in held {
                pool.release(index).unwrap();
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(pool.allocated(), 0);
    for slot in occupancy.iter() {
        assert_eq!(slot.load(Ordering::Acquire), 0);
    }
}

#[test]
fn acquire_with_initializes_the_slot_in_one_step() {
    let segment = make_segment(1024 * 1024);
    let pool = Pool::<u32>::create(&segment, "p", 4).unwrap();
    let index = pool.acquire_with(99).unwrap();
    assert_eq!(pool.get(index), 99);
}

#[test]
fn dropping_a_guard_releases_its_slot_back_to_the_pool() {
    let segment = make_segment(1024 * 1024);
    let pool = Pool::<u32>::create(&segment, "p", 4).unwrap();
    {
        let guard = pool.acquire_guard_with(7).unwrap();
        assert_eq!(guard.get(), 7);
        assert_eq!(pool.allocated(), 1);
    }
    assert_eq!(pool.allocated(), 0);
    // The freed slot is reused by the next acquire, same as an explicit release.
    let index = pool.acquire().unwrap();
    assert_eq!(pool.get(index), 7);
}
