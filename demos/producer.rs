//! Sends `count` `u64` messages into a named queue, creating the segment
//! and queue if they don't already exist. Run `consumer` or
//! `blocking_consumer` against the same segment name to receive them.
//!
//! Usage: `producer <count> [capacity]`

use std::env;
use std::time::Instant;
use zeroipc::structures::Queue;
use zeroipc::sync::Semaphore;
use zeroipc::{Error, SegmentBuilder};

const SEGMENT_NAME: &str = "/zeroipc_demo";
const QUEUE_NAME: &str = "messages";
const SEMAPHORE_NAME: &str = "messages_available";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <count> [capacity]", args[0]);
        std::process::exit(1);
    }
    let count: u64 = args[1].parse()?;
    let capacity: usize = args.get(2).map(|s| s.parse()).transpose()?.unwrap_or(1024);

    let segment = SegmentBuilder::new(SEGMENT_NAME)
        .with_size(16 * 1024 * 1024)
        .create_or_open()?;

    let queue = match Queue::<u64>::create(&segment, QUEUE_NAME, capacity) {
        Ok(queue) => {
            println!("Producer: created queue `{QUEUE_NAME}` ({capacity} slots)");
            queue
        }
        Err(Error::AlreadyExists(_)) => {
            println!("Producer: attaching to existing queue `{QUEUE_NAME}`");
            Queue::<u64>::open(&segment, QUEUE_NAME)?
        }
        Err(e) => return Err(e.into()),
    };

    let semaphore = match Semaphore::create(&segment, SEMAPHORE_NAME, 0, 0) {
        Ok(semaphore) => semaphore,
        Err(Error::AlreadyExists(_)) => Semaphore::open(&segment, SEMAPHORE_NAME)?,
        Err(e) => return Err(e.into()),
    };

    println!("Producer: sending {count} messages...");
    let start = Instant::now();
    let mut sent = 0u64;
    let mut retries_exhausted = 0u64;

    for value in 0..count {
        loop {
            match queue.push(value) {
                Ok(()) => {
                    sent += 1;
                    semaphore.release()?;
                    break;
                }
                Err(Error::Full) => {
                    retries_exhausted += 1;
                    std::thread::sleep(std::time::Duration::from_micros(100));
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    let elapsed = start.elapsed();
    println!("Producer: sent {sent} messages in {elapsed:.2?}");
    println!(
        "Producer: throughput {:.2} messages/sec ({retries_exhausted} full-queue retries)",
        sent as f64 / elapsed.as_secs_f64()
    );

    Ok(())
}
