//! Cross-cutting component K: the memory ordering & spin discipline
//! shared by every lock-free component. `Backoff` is the one spin/sleep
//! policy used by the queue, stack, ring, pool, map, and the three
//! synchronization primitives, so tuning it once tunes the whole crate.
//!
//! Bounded exponential backoff, spin-sleeping starting at 1 microsecond
//! and doubling up to a 1 millisecond ceiling.
//! Only the wait/acquire/barrier-wait/`*_for` operations are allowed to
//! sleep; every other operation either succeeds immediately or spins on
//! a CAS retry without sleeping — callers of `Backoff` that are spinning
//! on CAS (not blocking on another participant) should use `spin()`
//! instead of `snooze()`.

use std::time::Duration;

const INITIAL_DELAY: Duration = Duration::from_micros(1);
const MAX_DELAY: Duration = Duration::from_millis(1);
/// Number of pure `spin_loop` hints tried before the first sleep.
const SPIN_LIMIT: u32 = 6;
/// Retry count past which a CAS-retry or blocking-wait loop logs a
/// single `warn!`, so pathological contention is visible without
/// spamming a log line per spin under ordinary contention.
pub const RETRY_WARN_THRESHOLD: u32 = 1000;

pub struct Backoff {
    step: u32,
    delay: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}

impl Backoff {
    pub fn new() -> Self {
        Self {
            step: 0,
            delay: INITIAL_DELAY,
        }
    }

    /// Reset after a successful CAS or a satisfied condition, so the next
    /// contention episode starts from the smallest delay again.
    pub fn reset(&mut self) {
        self.step = 0;
        self.delay = INITIAL_DELAY;
    }

    /// A pure CAS-retry step: cheap, never sleeps. Used by the reserve-a-
    /// slot loops in the queue/stack/pool/map.
    pub fn spin(&mut self) {
        std::hint::spin_loop();
        self.step = self.step.saturating_add(1);
    }

    /// Number of `spin`/`snooze` steps taken since the last `reset`.
    pub fn step(&self) -> u32 {
        self.step
    }

    /// True exactly once, the step a loop crosses `RETRY_WARN_THRESHOLD`
    /// — callers use this to fire a single `log::warn!` per contention
    /// episode instead of one per retry.
    pub fn just_crossed_warn_threshold(&self) -> bool {
        self.step == RETRY_WARN_THRESHOLD
    }

    /// A blocking-wait step: a handful of spin hints, then growing sleeps
    /// up to `MAX_DELAY`. Used by `acquire`/`wait`/`count_down`-wait/
    /// barrier-wait and their `*_for` variants.
    pub fn snooze(&mut self) {
        if self.step < SPIN_LIMIT {
            std::hint::spin_loop();
        } else {
            std::thread::sleep(self.delay);
            self.delay = std::cmp::min(self.delay * 2, MAX_DELAY);
        }
        self.step = self.step.saturating_add(1);
    }
}
