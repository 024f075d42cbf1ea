//! End-to-end scenarios exercising real POSIX shared memory: one side
//! creates a named segment, the other attaches by name only, the way two
//! separate processes would. Serialized against each other since they
//! all compete for a handful of fixed shared-memory names.

use serial_test::serial;
use std::sync::Arc;
use std::thread;
use zeroipc::structures::Queue;
use zeroipc::{Error, Segment};

fn cleanup(name: &str) {
    let _ = Segment::unlink(name);
}

#[test]
#[serial]
fn producer_consumer_queue_across_two_segment_handles() {
    let name = "/zeroipc_test_pc_queue";
    cleanup(name);

    let producer_segment = Segment::create(name, 10 * 1024 * 1024).unwrap();
    let queue = Queue::<i32>::create(&producer_segment, "q", 16).unwrap();

    for v in 0..1000i32 {
        loop {
            match queue.push(v) {
                Ok(()) => break,
                Err(Error::Full) => thread::yield_now(),
                Err(e) => panic!("unexpected push error: {e}"),
            }
        }
    }

    // A second handle onto the same named segment, standing in for a
    // separate process attaching by name.
    let consumer_segment = Segment::open(name, 10 * 1024 * 1024).unwrap();
    let consumer_queue = Queue::<i32>::open(&consumer_segment, "q").unwrap();

    let mut received = Vec::with_capacity(1000);
    while received.len() < 1000 {
        match consumer_queue.pop() {
            Ok(v) => received.push(v),
            Err(Error::Empty) => thread::yield_now(),
            Err(e) => panic!("unexpected pop error: {e}"),
        }
    }

    assert_eq!(received, (0..1000i32).collect::<Vec<_>>());

    drop(producer_segment);
    drop(consumer_segment);
    cleanup(name);
}

#[test]
#[serial]
fn two_handles_see_each_others_writes_through_a_shared_array() {
    let name = "/zeroipc_test_shared_array";
    cleanup(name);

    let writer = Segment::create(name, 1024 * 1024).unwrap();
    let array = zeroipc::structures::Array::<u64>::create(&writer, "a", 8).unwrap();
    array.fill(0);
    array.set(3, 123);

    let reader_segment = Segment::open(name, 1024 * 1024).unwrap();
    let reader_array = zeroipc::structures::Array::<u64>::open(&reader_segment, "a").unwrap();
    assert_eq!(reader_array.get(3), 123);

    reader_array.set(5, 456);
    assert_eq!(array.get(5), 456);

    drop(writer);
    drop(reader_segment);
    cleanup(name);
}

#[test]
#[serial]
fn segment_builder_create_or_open_attaches_on_second_call() {
    let name = "/zeroipc_test_builder";
    cleanup(name);

    let first = zeroipc::SegmentBuilder::new(name)
        .with_size(1024 * 1024)
        .create_or_open()
        .unwrap();
    first.allocate("marker", 8, 8, 1).unwrap();

    let second = zeroipc::SegmentBuilder::new(name)
        .with_size(1024 * 1024)
        .create_or_open()
        .unwrap();
    assert!(second.find("marker").is_some());

    drop(first);
    drop(second);
    cleanup(name);
}

#[test]
#[serial]
fn unlinking_a_segment_does_not_disturb_an_attached_handle() {
    let name = "/zeroipc_test_unlink";
    cleanup(name);

    let segment = Segment::create(name, 1024 * 1024).unwrap();
    let queue = Queue::<u32>::create(&segment, "q", 4).unwrap();
    Segment::unlink(name).unwrap();

    // Already-mapped handle keeps working after unlink; only future
    // `open` calls are affected.
    queue.push(1).unwrap();
    assert_eq!(queue.pop().unwrap(), 1);

    assert!(Segment::open(name, 1024 * 1024).is_err());
}

#[test]
#[serial]
fn shared_queue_and_semaphore_signal_a_blocking_consumer() {
    let name = "/zeroipc_test_blocking";
    cleanup(name);

    let segment = Arc::new(Segment::create(name, 1024 * 1024).unwrap());
    let queue = Arc::new(Queue::<u32>::create(&segment, "q", 64).unwrap());
    let semaphore = Arc::new(zeroipc::sync::Semaphore::create(&segment, "sem", 0, 0).unwrap());

    let consumer = {
        let queue = queue.clone();
        let semaphore = semaphore.clone();
        thread::spawn(move || {
            let mut total = 0u64;
            for _ in 0..200 {
                semaphore.acquire();
                total += queue.pop().expect("signaled push must be visible") as u64;
            }
            total
        })
    };

    for v in 1..=200u32 {
        queue.push(v).unwrap();
        semaphore.release().unwrap();
    }

    let total: u64 = consumer.join().unwrap();
    assert_eq!(total, (1..=200u64).sum::<u64>());

    cleanup(name);
}
