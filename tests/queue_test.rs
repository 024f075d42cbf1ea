#[path = "support/mod.rs"]
mod support;

use support::make_segment;
use std::sync::Arc;
use std::thread;
use zeroipc::structures::Queue;
use zeroipc::Error;

#[test]
fn push_then_pop_returns_pushed_value() {
    let segment = make_segment(1024 * 1024);
    let queue = Queue::<u32>::create(&segment, "q", 16).unwrap();
    queue.push(42).unwrap();
    assert_eq!(queue.pop().unwrap(), 42);
}

#[test]
fn capacity_one_queue_fills_after_one_push() {
    let segment = make_segment(1024 * 1024);
    let queue = Queue::<u32>::create(&segment, "q", 1).unwrap();
    queue.push(1).unwrap();
    assert!(matches!(queue.push(2), Err(Error::Full)));
    assert_eq!(queue.pop().unwrap(), 1);
    queue.push(2).unwrap();
    assert_eq!(queue.pop().unwrap(), 2);
}

#[test]
fn pop_on_empty_queue_is_empty_error() {
    let segment = make_segment(1024 * 1024);
    let queue = Queue::<u32>::create(&segment, "q", 4).unwrap();
    assert!(matches!(queue.pop(), Err(Error::Empty)));
}

#[test]
fn open_rejects_mismatched_element_size() {
    let segment = make_segment(1024 * 1024);
    Queue::<u32>::create(&segment, "q", 4).unwrap();
    let result = Queue::<u64>::open(&segment, "q");
    assert!(matches!(result, Err(Error::ElementSizeMismatch { .. })));
}

#[test]
fn conserves_pushed_multiset_across_concurrent_producers_and_consumers() {
    let segment = Arc::new(make_segment(4 * 1024 * 1024));
    let queue = Arc::new(Queue::<u32>::create(&segment, "q", 64).unwrap());
    let producers = 4;
    let per_producer = 2000;
    let total = producers * per_producer;

    let mut handles = Vec::new();
    for p in 0..producers {
        let queue = queue.clone();
        handles.push(thread::spawn(move || {
            for i in 0..per_producer {
                let value = (p * per_producer + i) as u32;
                loop {
                    match queue.push(value) {
                        Ok(()) => break,
                        Err(Error::Full) => thread::yield_now(),
                        Err(e) => panic!("unexpected push error: {e}"),
                    }
                }
            }
        }));
    }

    let consumer_queue = queue.clone();
    let consumer = thread::spawn(move || {
        let mut received = Vec::with_capacity(total);
        while received.len() < total {
            match consumer_queue.pop() {
                Ok(value) => received.push(value),
                Err(Error::Empty) => thread::yield_now(),
                Err(e) => panic!("unexpected pop error: {e}"),
            }
        }
        received
    });

    for handle in handles {
        handle.join().unwrap();
    }
    let mut received = consumer.join().unwrap();
    received.sort_unstable();

    let mut expected: Vec<u32> = (0..total as u32).collect();
    expected.sort_unstable();
    assert_eq!(received, expected);
}
