//! Single-use latch (J): a countdown gate that cannot be reset.
//!
//! Header: `count: atomic<i32>` (saturates at 0), `initial_count: i32`,
//! `_pad[2]`.

use crate::error::{Error, Result};
use crate::segment::Segment;
use crate::sync::backoff::Backoff;
use crate::sync::futex;
use std::sync::atomic::{AtomicI32, AtomicU32, Ordering};
use std::time::{Duration, Instant};

#[repr(C)]
struct LatchHeader {
    count: AtomicI32,
    initial_count: i32,
    _pad: [i32; 2],
}

fn futex_word(count: &AtomicI32) -> &AtomicU32 {
    unsafe { &*(count as *const AtomicI32 as *const AtomicU32) }
}

pub struct Latch {
    header: *mut LatchHeader,
}

unsafe impl Send for Latch {}
unsafe impl Sync for Latch {}

impl Latch {
    pub const HEADER_SIZE: u64 = std::mem::size_of::<LatchHeader>() as u64;

    pub fn create(segment: &Segment, name: &str, initial_count: i32) -> Result<Self> {
        if initial_count < 0 {
            return Err(Error::InvalidArgument("initial_count must be >= 0".into()));
        }
        let offset = segment.allocate(name, Self::HEADER_SIZE, 0, 0)?;
        let ptr = unsafe { segment.at(offset)? as *mut LatchHeader };
        unsafe {
            std::ptr::write(
                ptr,
                LatchHeader {
                    count: AtomicI32::new(initial_count),
                    initial_count,
                    _pad: [0, 0],
                },
            );
        }
        log::debug!("latch '{name}' created, initial_count={initial_count}");
        Ok(Self { header: ptr })
    }

    pub fn open(segment: &Segment, name: &str) -> Result<Self> {
        let entry = segment
            .find(name)
            .ok_or_else(|| Error::NotFound(name.to_string()))?;
        if entry.size != Self::HEADER_SIZE {
            return Err(Error::ElementSizeMismatch {
                expected: Self::HEADER_SIZE,
                found: entry.size,
            });
        }
        let ptr = unsafe { segment.at(entry.offset)? as *mut LatchHeader };
        log::debug!("latch '{name}' opened");
        Ok(Self { header: ptr })
    }

    fn header(&self) -> &LatchHeader {
        unsafe { &*self.header }
    }

    /// Count down by `n` (default semantics: `n = 1`), saturating at 0.
    /// Once the count reaches 0 it never increases again.
    pub fn count_down(&self, n: i32) {
        let header = self.header();
        loop {
            let current = header.count.load(Ordering::Acquire);
            if current == 0 {
                return;
            }
            let delta = std::cmp::min(current, n);
            if header
                .count
                .compare_exchange_weak(
                    current,
                    current - delta,
                    Ordering::AcqRel,
                    Ordering::Relaxed,
                )
                .is_ok()
            {
                if current - delta == 0 {
                    futex::wake_all(futex_word(&header.count));
                }
                return;
            }
            std::hint::spin_loop();
        }
    }

    /// Current count. Monotonically non-increasing.
    pub fn count(&self) -> i32 {
        self.header().count.load(Ordering::Acquire)
    }

    /// Single load; never blocks.
    pub fn try_wait(&self) -> bool {
        self.count() == 0
    }

    /// Spin-with-backoff until the count reaches 0.
    pub fn wait(&self) {
        let header = self.header();
        let mut backoff = Backoff::new();
        loop {
            let current = header.count.load(Ordering::Acquire);
            if current == 0 {
                return;
            }
            backoff.snooze();
            if backoff.just_crossed_warn_threshold() {
                log::warn!("latch wait: {} retries waiting for count to reach 0", backoff.step());
            }
            futex::wait(futex_word(&header.count), current as u32);
        }
    }

    /// Bounded wait; returns `Error::Timeout` if the count hasn't reached
    /// 0 within `timeout`.
    pub fn wait_for(&self, timeout: Duration) -> Result<()> {
        let header = self.header();
        let start = Instant::now();
        let mut backoff = Backoff::new();
        loop {
            if header.count.load(Ordering::Acquire) == 0 {
                return Ok(());
            }
            if start.elapsed() >= timeout {
                return Err(Error::Timeout);
            }
            backoff.snooze();
            if backoff.just_crossed_warn_threshold() {
                log::warn!(
                    "latch wait_for: {} retries waiting for count to reach 0",
                    backoff.step()
                );
            }
        }
    }
}
