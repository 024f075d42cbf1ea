//! Object pool (G): preallocated slab with a lock-free free-list stack
//! of indices: `next[capacity]` link array followed by `slots[capacity]`;
//! `NULL_INDEX = u32::MAX`.

use crate::error::{Error, Result};
use crate::segment::Segment;
use crate::sync::backoff::Backoff;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU32, Ordering};

pub const NULL_INDEX: u32 = u32::MAX;

#[repr(C)]
struct PoolHeader {
    free_head: AtomicU32,
    allocated: AtomicU32,
    capacity: u32,
    elem_size: u32,
}

pub struct Pool<T: Copy> {
    header: *mut PoolHeader,
    next: *mut AtomicU32,
    slots: *mut T,
    capacity: u32,
    _marker: PhantomData<T>,
}

unsafe impl<T: Copy + Send> Send for Pool<T> {}
unsafe impl<T: Copy + Sync> Sync for Pool<T> {}

impl<T: Copy> Pool<T> {
    const HEADER_SIZE: u64 = std::mem::size_of::<PoolHeader>() as u64;

    pub fn create(segment: &Segment, name: &str, capacity: usize) -> Result<Self> {
        if capacity == 0 || capacity as u64 >= NULL_INDEX as u64 {
            return Err(Error::InvalidArgument(
                "capacity must be > 0 and < u32::MAX".into(),
            ));
        }
        let elem_size = std::mem::size_of::<T>() as u64;
        let next_size = 4u64 * capacity as u64;
        let payload_size = elem_size * capacity as u64;
        let offset = segment.allocate(
            name,
            Self::HEADER_SIZE + next_size + payload_size,
            elem_size,
            capacity as u64,
        )?;
        let header = unsafe { segment.at(offset)? as *mut PoolHeader };
        unsafe {
            std::ptr::write(
                header,
                PoolHeader {
                    free_head: AtomicU32::new(0),
                    allocated: AtomicU32::new(0),
                    capacity: capacity as u32,
                    elem_size: elem_size as u32,
                },
            );
        }
        let next = unsafe { (header as *mut u8).add(Self::HEADER_SIZE as usize) as *mut AtomicU32 };
        let slots = unsafe { (next as *mut u8).add(next_size as usize) as *mut T };

        // Chain every slot into the free list: 0 -> 1 -> ... -> capacity-1 -> NULL.
        for i in 0..capacity {
            let value = if i + 1 < capacity {
                (i + 1) as u32
            } else {
                NULL_INDEX
            };
            unsafe { std::ptr::write(next.add(i), AtomicU32::new(value)) };
        }

        log::debug!("pool '{name}' created, capacity={capacity}");
        Ok(Self {
            header,
            next,
            slots,
            capacity: capacity as u32,
            _marker: PhantomData,
        })
    }

    pub fn open(segment: &Segment, name: &str) -> Result<Self> {
        let entry = segment
            .find(name)
            .ok_or_else(|| Error::NotFound(name.to_string()))?;
        let elem_size = std::mem::size_of::<T>() as u64;
        if entry.elem_size != elem_size {
            return Err(Error::ElementSizeMismatch {
                expected: elem_size,
                found: entry.elem_size,
            });
        }
        let header = unsafe { segment.at(entry.offset)? as *mut PoolHeader };
        let capacity = unsafe { (*header).capacity };
        let next_size = 4u64 * capacity as u64;
        let next = unsafe { (header as *mut u8).add(Self::HEADER_SIZE as usize) as *mut AtomicU32 };
        let slots = unsafe { (next as *mut u8).add(next_size as usize) as *mut T };
        log::debug!("pool '{name}' opened, capacity={capacity}");
        Ok(Self {
            header,
            next,
            slots,
            capacity,
            _marker: PhantomData,
        })
    }

    fn header(&self) -> &PoolHeader {
        unsafe { &*self.header }
    }

    pub fn capacity(&self) -> usize {
        self.capacity as usize
    }

    pub fn allocated(&self) -> usize {
        self.header().allocated.load(Ordering::Acquire) as usize
    }

    fn next_at(&self, index: u32) -> &AtomicU32 {
        unsafe { &*self.next.add(index as usize) }
    }

    /// Claim a free slot. Returns `Error::Full` if none remain.
    pub fn acquire(&self) -> Result<u32> {
        let header = self.header();
        let mut backoff = Backoff::new();
        loop {
            let h = header.free_head.load(Ordering::Acquire);
            if h == NULL_INDEX {
                return Err(Error::Full);
            }
            let n = self.next_at(h).load(Ordering::Relaxed);
            if header
                .free_head
                .compare_exchange_weak(h, n, Ordering::Release, Ordering::Acquire)
                .is_ok()
            {
                header.allocated.fetch_add(1, Ordering::AcqRel);
                return Ok(h);
            }
            backoff.spin();
            if backoff.just_crossed_warn_threshold() {
                log::warn!("pool acquire: {} retries contending for free_head", backoff.step());
            }
        }
    }

    /// Return `index` to the free list. `index` must have come from a
    /// prior `acquire` on this pool and not already have been released.
    pub fn release(&self, index: u32) -> Result<()> {
        if index >= self.capacity {
            return Err(Error::InvalidArgument(format!(
                "handle {index} out of bounds (capacity {})",
                self.capacity
            )));
        }
        let header = self.header();
        let mut backoff = Backoff::new();
        loop {
            let h = header.free_head.load(Ordering::Acquire);
            self.next_at(index).store(h, Ordering::Relaxed);
            if header
                .free_head
                .compare_exchange_weak(h, index, Ordering::Release, Ordering::Acquire)
                .is_ok()
            {
                header.allocated.fetch_sub(1, Ordering::AcqRel);
                return Ok(());
            }
            backoff.spin();
            if backoff.just_crossed_warn_threshold() {
                log::warn!("pool release: {} retries contending for free_head", backoff.step());
            }
        }
    }

    /// Read the value stored at `index`. Caller must hold the handle.
    pub fn get(&self, index: u32) -> T {
        unsafe { *self.slots.add(index as usize) }
    }

    /// Write a value at `index`. Caller must hold the handle.
    pub fn set(&self, index: u32, value: T) {
        unsafe { *self.slots.add(index as usize) = value };
    }

    /// Acquire a slot and initialize it in one step.
    pub fn acquire_with(&self, value: T) -> Result<u32> {
        let index = self.acquire()?;
        self.set(index, value);
        Ok(index)
    }

    /// Acquire a slot, returning a guard that releases it back to the
    /// pool when dropped instead of requiring an explicit `release`.
    pub fn acquire_guard(&self) -> Result<Handle<'_, T>> {
        let index = self.acquire()?;
        Ok(Handle { pool: self, index })
    }

    /// `acquire_guard`, initializing the slot in one step.
    pub fn acquire_guard_with(&self, value: T) -> Result<Handle<'_, T>> {
        let handle = self.acquire_guard()?;
        self.set(handle.index, value);
        Ok(handle)
    }
}

/// RAII guard over a claimed slot: releases `index` back to the pool's
/// free list on drop rather than requiring the caller to call
/// `Pool::release` explicitly. `get`/`set` go straight to the
/// underlying slot, no different from calling them on the pool with
/// this guard's `index`.
pub struct Handle<'a, T: Copy> {
    pool: &'a Pool<T>,
    index: u32,
}

impl<T: Copy> Handle<'_, T> {
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn get(&self) -> T {
        self.pool.get(self.index)
    }

    pub fn set(&self, value: T) {
        self.pool.set(self.index, value)
    }
}

impl<T: Copy> Drop for Handle<'_, T> {
    fn drop(&mut self) {
        let _ = self.pool.release(self.index);
    }
}
