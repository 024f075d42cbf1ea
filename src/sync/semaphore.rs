//! Counting / binary semaphore (J) over shared atomic memory.
//!
//! Header layout: `count: atomic<i32>`, `waiting: atomic<i32>`,
//! `max_count: i32`, `_pad: i32`. `max_count = 0` means unbounded;
//! `max_count = 1` gives a binary semaphore.

use crate::error::{Error, Result};
use crate::segment::Segment;
use crate::sync::backoff::Backoff;
use crate::sync::futex;
use std::sync::atomic::{AtomicI32, AtomicU32, Ordering};
use std::time::{Duration, Instant};

#[repr(C)]
struct SemaphoreHeader {
    count: AtomicI32,
    waiting: AtomicI32,
    max_count: i32,
    _pad: i32,
}

/// `count` doubles as the futex word: its bit pattern is a plain `i32`,
/// so waiting on it as a `u32` via the same address is sound, and it
/// saves the header a dedicated signal field the four-field layout has
/// no room for.
fn futex_word(count: &AtomicI32) -> &AtomicU32 {
    unsafe { &*(count as *const AtomicI32 as *const AtomicU32) }
}

pub struct Semaphore {
    header: *mut SemaphoreHeader,
}

unsafe impl Send for Semaphore {}
unsafe impl Sync for Semaphore {}

impl Semaphore {
    pub const HEADER_SIZE: u64 = std::mem::size_of::<SemaphoreHeader>() as u64;

    /// Create a new semaphore, initialized to `initial` permits (0 = max
    /// unbounded).
    pub fn create(segment: &Segment, name: &str, initial: i32, max_count: i32) -> Result<Self> {
        let offset = segment.allocate(name, Self::HEADER_SIZE, 0, 0)?;
        let ptr = unsafe { segment.at(offset)? as *mut SemaphoreHeader };
        unsafe {
            std::ptr::write(
                ptr,
                SemaphoreHeader {
                    count: AtomicI32::new(initial),
                    waiting: AtomicI32::new(0),
                    max_count,
                    _pad: 0,
                },
            );
        }
        log::debug!("semaphore '{name}' created, initial={initial}, max_count={max_count}");
        Ok(Self { header: ptr })
    }

    /// Attach to an existing semaphore.
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
        let ptr = unsafe { segment.at(entry.offset)? as *mut SemaphoreHeader };
        log::debug!("semaphore '{name}' opened");
        Ok(Self { header: ptr })
    }

    fn header(&self) -> &SemaphoreHeader {
        unsafe { &*self.header }
    }

    /// Current permit count. Approximate under concurrency.
    pub fn count(&self) -> i32 {
        self.header().count.load(Ordering::Acquire)
    }

    /// Single CAS attempt; never blocks.
    pub fn try_acquire(&self) -> bool {
        let header = self.header();
        let current = header.count.load(Ordering::Acquire);
        if current <= 0 {
            return false;
        }
        header
            .count
            .compare_exchange(current, current - 1, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok()
    }

    /// Block until a permit is available.
    pub fn acquire(&self) {
        let header = self.header();
        header.waiting.fetch_add(1, Ordering::AcqRel);
        let mut backoff = Backoff::new();
        loop {
            if self.try_acquire() {
                break;
            }
            let observed = header.count.load(Ordering::Acquire) as u32;
            backoff.snooze();
            if backoff.just_crossed_warn_threshold() {
                log::warn!("semaphore acquire: {} retries waiting for a permit", backoff.step());
            }
            futex::wait(futex_word(&header.count), observed);
        }
        header.waiting.fetch_sub(1, Ordering::AcqRel);
    }

    /// Block until a permit is available or `timeout` elapses.
    pub fn acquire_for(&self, timeout: Duration) -> Result<()> {
        let header = self.header();
        header.waiting.fetch_add(1, Ordering::AcqRel);
        let start = Instant::now();
        let mut backoff = Backoff::new();
        let result = loop {
            if self.try_acquire() {
                break Ok(());
            }
            if start.elapsed() >= timeout {
                break Err(Error::Timeout);
            }
            backoff.snooze();
            if backoff.just_crossed_warn_threshold() {
                log::warn!(
                    "semaphore acquire_for: {} retries waiting for a permit",
                    backoff.step()
                );
            }
        };
        header.waiting.fetch_sub(1, Ordering::AcqRel);
        result
    }

    /// Release one permit, waking a waiter if any. Returns
    /// `Error::CapacityExceeded` if `max_count` is bounded and already at
    /// the ceiling.
    pub fn release(&self) -> Result<()> {
        let header = self.header();
        let previous = header.count.fetch_add(1, Ordering::AcqRel);
        if header.max_count > 0 && previous >= header.max_count {
            header.count.fetch_sub(1, Ordering::AcqRel);
            return Err(Error::CapacityExceeded);
        }
        futex::wake_one(futex_word(&header.count));
        Ok(())
    }

    /// Number of callers currently blocked in `acquire`/`acquire_for`.
    pub fn waiting(&self) -> i32 {
        self.header().waiting.load(Ordering::Acquire)
    }
}
