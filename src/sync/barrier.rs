//! Reusable barrier (J) with a generation counter.
//!
//! Header: `arrived: atomic<i32>`, `generation: atomic<i32>`,
//! `num_participants: i32`, `_pad: i32`.
//!
//! The generation counter exists so a participant that races ahead into
//! the next cycle before stragglers of the previous cycle observe the
//! release cannot cause those stragglers to miss it: each `wait()`
//! captures `generation` before incrementing `arrived`, and spins until
//! `generation` differs from what it captured — a distinct release event
//! per cycle.

use crate::error::{Error, Result};
use crate::segment::Segment;
use crate::sync::backoff::Backoff;
use crate::sync::futex;
use std::sync::atomic::{AtomicI32, AtomicU32, Ordering};
use std::time::{Duration, Instant};

#[repr(C)]
struct BarrierHeader {
    arrived: AtomicI32,
    generation: AtomicI32,
    num_participants: i32,
    _pad: i32,
}

fn futex_word(generation: &AtomicI32) -> &AtomicU32 {
    unsafe { &*(generation as *const AtomicI32 as *const AtomicU32) }
}

pub struct Barrier {
    header: *mut BarrierHeader,
}

unsafe impl Send for Barrier {}
unsafe impl Sync for Barrier {}

impl Barrier {
    pub const HEADER_SIZE: u64 = std::mem::size_of::<BarrierHeader>() as u64;

    pub fn create(segment: &Segment, name: &str, num_participants: i32) -> Result<Self> {
        if num_participants <= 0 {
            return Err(Error::InvalidArgument(
                "num_participants must be > 0".into(),
            ));
        }
        let offset = segment.allocate(name, Self::HEADER_SIZE, 0, 0)?;
        let ptr = unsafe { segment.at(offset)? as *mut BarrierHeader };
        unsafe {
            std::ptr::write(
                ptr,
                BarrierHeader {
                    arrived: AtomicI32::new(0),
                    generation: AtomicI32::new(0),
                    num_participants,
                    _pad: 0,
                },
            );
        }
        log::debug!("barrier '{name}' created, num_participants={num_participants}");
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
        let ptr = unsafe { segment.at(entry.offset)? as *mut BarrierHeader };
        log::debug!("barrier '{name}' opened");
        Ok(Self { header: ptr })
    }

    fn header(&self) -> &BarrierHeader {
        unsafe { &*self.header }
    }

    pub fn generation(&self) -> i32 {
        self.header().generation.load(Ordering::Acquire)
    }

    /// Block until every participant of this cycle has called `wait()`.
    /// The last arriver resets `arrived` and advances `generation`,
    /// releasing everyone else.
    pub fn wait(&self) {
        let header = self.header();
        let g = header.generation.load(Ordering::Acquire);
        let arrived = header.arrived.fetch_add(1, Ordering::AcqRel) + 1;

        if arrived == header.num_participants {
            header.arrived.store(0, Ordering::Relaxed);
            header.generation.fetch_add(1, Ordering::Release);
            futex::wake_all(futex_word(&header.generation));
            return;
        }

        let mut backoff = Backoff::new();
        while header.generation.load(Ordering::Acquire) == g {
            backoff.snooze();
            if backoff.just_crossed_warn_threshold() {
                log::warn!("barrier wait: {} retries waiting for release", backoff.step());
            }
            futex::wait(futex_word(&header.generation), g as u32);
        }
    }

    /// Bounded wait. On timeout, the caller's arrival is rolled back by
    /// decrementing `arrived`.
    ///
    /// This path is documented-racy: if the final participant arrives
    /// during the rollback window, the barrier can be left with
    /// `arrived` one short of `num_participants` and nobody left to
    /// notice — recovery from that state is the caller's responsibility.
    /// A fully correct fix needs a different algorithm (e.g. a separate
    /// "leaving" counter) and is left as a known limitation rather than
    /// attempted here.
    pub fn wait_for(&self, timeout: Duration) -> Result<()> {
        let header = self.header();
        let g = header.generation.load(Ordering::Acquire);
        let arrived = header.arrived.fetch_add(1, Ordering::AcqRel) + 1;

        if arrived == header.num_participants {
            header.arrived.store(0, Ordering::Relaxed);
            header.generation.fetch_add(1, Ordering::Release);
            futex::wake_all(futex_word(&header.generation));
            return Ok(());
        }

        let start = Instant::now();
        let mut backoff = Backoff::new();
        loop {
            if header.generation.load(Ordering::Acquire) != g {
                return Ok(());
            }
            if start.elapsed() >= timeout {
                header.arrived.fetch_sub(1, Ordering::AcqRel);
                return Err(Error::Timeout);
            }
            backoff.snooze();
            if backoff.just_crossed_warn_threshold() {
                log::warn!("barrier wait_for: {} retries waiting for release", backoff.step());
            }
        }
    }

    pub fn num_participants(&self) -> i32 {
        self.header().num_participants
    }
}
