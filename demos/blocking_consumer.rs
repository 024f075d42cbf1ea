//! Blocks on a semaphore the producer signals after every push, rather
//! than polling the queue directly. Demonstrates composing `Queue` with
//! `Semaphore` for a wake-on-arrival consumer, since the queue itself
//! has no blocking pop.
//!
//! Usage: `blocking_consumer <expected>`

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
    let expected: u64 = args.get(1).map(|s| s.parse()).transpose()?.unwrap_or(u64::MAX);

    println!("Blocking consumer: attaching to segment `{SEGMENT_NAME}`...");
    let segment = SegmentBuilder::new(SEGMENT_NAME)
        .with_size(16 * 1024 * 1024)
        .open()?;
    let queue = Queue::<u64>::open(&segment, QUEUE_NAME)?;
    let semaphore = Semaphore::open(&segment, SEMAPHORE_NAME)?;

    println!("Blocking consumer: waiting for messages...");
    let start = Instant::now();
    let mut received = 0u64;

    while received < expected {
        semaphore.acquire();
        match queue.pop() {
            Ok(value) => {
                received += 1;
                println!("Blocking consumer: received {value}");
            }
            Err(Error::Empty) => {
                // Signaled but lost the race to another consumer; loop.
                continue;
            }
            Err(e) => return Err(e.into()),
        }
    }

    println!(
        "Blocking consumer: received {received} messages in {:.2?}",
        start.elapsed()
    );
    Ok(())
}
