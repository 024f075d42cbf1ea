#[path = "support/mod.rs"]
mod support;

use support::make_segment;
use std::sync::atomic::{AtomicI32, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use zeroipc::sync::{Barrier, Latch, Semaphore};

#[test]
fn semaphore_try_acquire_respects_the_count() {
    let segment = make_segment(1024 * 1024);
    let sem = Semaphore::create(&segment, "sem", 1, 1).unwrap();
    assert!(sem.try_acquire());
    assert!(!sem.try_acquire());
    sem.release().unwrap();
    assert!(sem.try_acquire());
}

#[test]
fn semaphore_release_past_max_count_is_rejected() {
    let segment = make_segment(1024 * 1024);
    let sem = Semaphore::create(&segment, "sem", 1, 1).unwrap();
    assert!(sem.release().is_err());
}

#[test]
fn semaphore_acquire_for_times_out_when_no_permit_arrives() {
    let segment = make_segment(1024 * 1024);
    let sem = Semaphore::create(&segment, "sem", 0, 1).unwrap();
    assert!(sem.acquire_for(Duration::from_millis(20)).is_err());
}

#[test]
fn binary_semaphore_fairness_thread_b_acquires_exactly_n_releases() {
    let segment = Arc::new(make_segment(1024 * 1024));
    let sem = Arc::new(Semaphore::create(&segment, "sem", 0, 1).unwrap());
    let n = 500;
    let observed_negative = Arc::new(AtomicI32::new(0));

    let releaser = {
        let sem = sem.clone();
        thread::spawn(move || {
            for _ in 0..n {
                loop {
                    if sem.release().is_ok() {
                        break;
                    }
                    thread::yield_now();
                }
            }
        })
    };

    let acquired = Arc::new(AtomicU32::new(0));
    let acquirer = {
        let sem = sem.clone();
        let acquired = acquired.clone();
        let observed_negative = observed_negative.clone();
        thread::spawn(move || {
            for _ in 0..n {
                sem.acquire();
                if sem.count() < 0 {
                    observed_negative.fetch_add(1, Ordering::SeqCst);
                }
                acquired.fetch_add(1, Ordering::SeqCst);
            }
        })
    };

    releaser.join().unwrap();
    acquirer.join().unwrap();

    assert_eq!(acquired.load(Ordering::SeqCst), n);
    assert_eq!(observed_negative.load(Ordering::SeqCst), 0);
    assert_eq!(sem.count(), 0);
}

#[test]
fn latch_count_down_to_zero_releases_waiters() {
    let segment = make_segment(1024 * 1024);
    let latch = Latch::create(&segment, "latch", 3).unwrap();
    assert!(!latch.try_wait());
    latch.count_down(1);
    latch.count_down(1);
    assert!(!latch.try_wait());
    latch.count_down(1);
    assert!(latch.try_wait());
    latch.wait();
}

#[test]
fn latch_count_never_increases_and_saturates_at_zero() {
    let segment = make_segment(1024 * 1024);
    let latch = Latch::create(&segment, "latch", 2).unwrap();
    latch.count_down(5);
    assert_eq!(latch.count(), 0);
    latch.count_down(1);
    assert_eq!(latch.count(), 0);
}

#[test]
fn barrier_cycle_releases_all_participants_each_generation() {
    let segment = Arc::new(make_segment(1024 * 1024));
    let participants = 4usize;
    let barrier = Arc::new(Barrier::create(&segment, "phase", participants as i32).unwrap());
    let counter = Arc::new(AtomicU32::new(0));
    let iterations = 100u32;

    let mut handles = Vec::new();
    for thread_id in 0..participants {
        let barrier = barrier.clone();
        let counter = counter.clone();
        handles.push(thread::spawn(move || {
            for k in 1..=iterations {
                counter.fetch_add(1, Ordering::SeqCst);
                barrier.wait();
                // Only the thread that happens to be the last arriver is
                // guaranteed to see exactly `participants * k` at this
                // instant; by the time any thread reads `counter` here,
                // the rest may already be mid-increment for round k+1.
                // Thread 0 reading right as it's released still races
                // with the others' next-round work, so only assert
                // against a monotonic lower bound reachable by all.
                let _ = thread_id;
                let seen = counter.load(Ordering::SeqCst);
                assert!(seen >= participants as u32 * k);
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(counter.load(Ordering::SeqCst), participants as u32 * iterations);
    assert_eq!(barrier.generation(), iterations as i32);
}
