//! Optional futex-based wake for the blocking waits in `sync::semaphore`,
//! `sync::latch`, and `sync::barrier`. A baseline implementation could
//! rely purely on `Backoff`, but parking on a real futex avoids needless
//! wakeups under heavy contention. Linux-only; other platforms fall back
//! to a yield.
//!
//! Every futex word here lives inside a segment mapped independently
//! into separate processes, so these calls must NOT pass
//! `FUTEX_PRIVATE_FLAG`: that flag keys the kernel's wait queue by the
//! calling process's address space, which would make a waker in one
//! process unable to wake a waiter blocked in another on the same
//! shared memory.

use std::sync::atomic::AtomicU32;

#[cfg(target_os = "linux")]
pub fn wait(atomic: &AtomicU32, expected: u32) {
    use std::sync::atomic::Ordering;

    if atomic.load(Ordering::Relaxed) != expected {
        return;
    }

    unsafe {
        libc::syscall(
            libc::SYS_futex,
            atomic as *const AtomicU32 as *const u32,
            libc::FUTEX_WAIT,
            expected,
            std::ptr::null::<libc::timespec>(),
            std::ptr::null::<u32>(),
            0u32,
        );
    }
}

#[cfg(target_os = "linux")]
pub fn wake_one(atomic: &AtomicU32) {
    unsafe {
        libc::syscall(
            libc::SYS_futex,
            atomic as *const AtomicU32 as *const u32,
            libc::FUTEX_WAKE,
            1,
            std::ptr::null::<libc::timespec>(),
            std::ptr::null::<u32>(),
            0u32,
        );
    }
}

#[cfg(target_os = "linux")]
pub fn wake_all(atomic: &AtomicU32) {
    unsafe {
        libc::syscall(
            libc::SYS_futex,
            atomic as *const AtomicU32 as *const u32,
            libc::FUTEX_WAKE,
            i32::MAX,
            std::ptr::null::<libc::timespec>(),
            std::ptr::null::<u32>(),
            0u32,
        );
    }
}

#[cfg(not(target_os = "linux"))]
pub fn wait(_atomic: &AtomicU32, _expected: u32) {
    std::thread::yield_now();
}

#[cfg(not(target_os = "linux"))]
pub fn wake_one(_atomic: &AtomicU32) {}

#[cfg(not(target_os = "linux"))]
pub fn wake_all(_atomic: &AtomicU32) {}
