//! Polls a named queue for `expected` messages, without blocking between
//! attempts beyond a short sleep. Run alongside `producer` against the
//! same segment name.
//!
//! Usage: `consumer <expected>`

use std::env;
use std::time::{Duration, Instant};
use zeroipc::structures::Queue;
use zeroipc::{Error, SegmentBuilder};

const SEGMENT_NAME: &str = "/zeroipc_demo";
const QUEUE_NAME: &str = "messages";
const POLL_TIMEOUT: Duration = Duration::from_secs(5);

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <expected>", args[0]);
        std::process::exit(1);
    }
    let expected: u64 = args[1].parse()?;

    println!("Consumer: attaching to segment `{SEGMENT_NAME}`...");
    let segment = SegmentBuilder::new(SEGMENT_NAME)
        .with_size(16 * 1024 * 1024)
        .open()?;
    let queue = Queue::<u64>::open(&segment, QUEUE_NAME)?;
    println!("Consumer: attached to queue `{QUEUE_NAME}` (capacity {})", queue.capacity());

    let start = Instant::now();
    let mut received = 0u64;
    let mut last_progress = Instant::now();

    while received < expected {
        match queue.pop() {
            Ok(value) => {
                received += 1;
                last_progress = Instant::now();
                if received % 1000 == 0 {
                    println!("Consumer: received {received} messages (last value {value})");
                }
            }
            Err(Error::Empty) => {
                if last_progress.elapsed() > POLL_TIMEOUT {
                    eprintln!("Consumer: timed out waiting for more messages");
                    break;
                }
                std::thread::yield_now();
            }
            Err(e) => return Err(e.into()),
        }
    }

    let elapsed = start.elapsed();
    println!("Consumer: received {received}/{expected} messages in {elapsed:.2?}");
    if received > 0 {
        println!(
            "Consumer: average {:.2} messages/sec",
            received as f64 / elapsed.as_secs_f64()
        );
    }

    Ok(())
}
