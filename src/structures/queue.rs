//! Queue (D): bounded MPMC ring, one slot wasted to distinguish empty
//! from full. A plain bounded queue of `T: Copy` with no per-slot
//! sequence number: it never needs to distinguish "producer claimed but
//! hasn't published" from "consumer hasn't caught up" at slot
//! granularity the way a framed-message channel does, so the monotonic
//! head/tail-with-CAS-retry shape is enough on its own.

use crate::error::{Error, Result};
use crate::segment::Segment;
use crate::sync::backoff::Backoff;
use crossbeam_utils::CachePadded;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU32, Ordering};

#[repr(C)]
struct QueueHeader {
    head: CachePadded<AtomicU32>,
    tail: CachePadded<AtomicU32>,
    capacity: u32,
    elem_size: u32,
}

pub struct Queue<T: Copy> {
    header: *mut QueueHeader,
    data: *mut T,
    capacity: u32,
    _marker: PhantomData<T>,
}

unsafe impl<T: Copy + Send> Send for Queue<T> {}
unsafe impl<T: Copy + Sync> Sync for Queue<T> {}

impl<T: Copy> Queue<T> {
    const HEADER_SIZE: u64 = std::mem::size_of::<QueueHeader>() as u64;

    /// `capacity` is the number of slots usable for data; the ring
    /// internally reserves one extra slot to distinguish full from
    /// empty.
    pub fn create(segment: &Segment, name: &str, capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::InvalidArgument("capacity must be > 0".into()));
        }
        let slots = capacity as u32 + 1;
        let elem_size = std::mem::size_of::<T>() as u64;
        let payload_size = elem_size * slots as u64;
        let offset = segment.allocate(
            name,
            Self::HEADER_SIZE + payload_size,
            elem_size,
            capacity as u64,
        )?;
        let header = unsafe { segment.at(offset)? as *mut QueueHeader };
        unsafe {
            std::ptr::write(
                header,
                QueueHeader {
                    head: CachePadded::new(AtomicU32::new(0)),
                    tail: CachePadded::new(AtomicU32::new(0)),
                    capacity: slots,
                    elem_size: elem_size as u32,
                },
            );
        }
        let data = unsafe { (header as *mut u8).add(Self::HEADER_SIZE as usize) as *mut T };
        log::debug!("queue '{name}' created, capacity={capacity}");
        Ok(Self {
            header,
            data,
            capacity: slots,
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
        let header = unsafe { segment.at(entry.offset)? as *mut QueueHeader };
        let capacity = unsafe { (*header).capacity };
        let data = unsafe { (header as *mut u8).add(Self::HEADER_SIZE as usize) as *mut T };
        log::debug!("queue '{name}' opened, capacity={}", capacity - 1);
        Ok(Self {
            header,
            data,
            capacity,
            _marker: PhantomData,
        })
    }

    fn header(&self) -> &QueueHeader {
        unsafe { &*self.header }
    }

    /// Usable capacity (slots minus the one wasted slot).
    pub fn capacity(&self) -> usize {
        (self.capacity - 1) as usize
    }

    fn slot_mut(&self, index: u32) -> *mut T {
        unsafe { self.data.add(index as usize) }
    }

    /// Approximate occupied count: `tail - head (mod capacity)`, read
    /// from two independent loads.
    pub fn len(&self) -> usize {
        let header = self.header();
        let tail = header.tail.load(Ordering::Acquire);
        let head = header.head.load(Ordering::Acquire);
        tail.wrapping_sub(head).rem_euclid(self.capacity) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Attempt to enqueue `value`. Returns `Error::Full` if the queue has
    /// no room right now.
    pub fn push(&self, value: T) -> Result<()> {
        let header = self.header();
        let mut backoff = Backoff::new();
        loop {
            let t = header.tail.load(Ordering::Relaxed);
            let next = (t + 1) % self.capacity;
            if next == header.head.load(Ordering::Acquire) {
                return Err(Error::Full);
            }
            if header
                .tail
                .compare_exchange_weak(t, next, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
            {
                unsafe { *self.slot_mut(t) = value };
                std::sync::atomic::fence(Ordering::Release);
                return Ok(());
            }
            backoff.spin();
            if backoff.just_crossed_warn_threshold() {
                log::warn!("queue push: {} retries contending for tail", backoff.step());
            }
        }
    }

    /// Attempt to dequeue. Returns `Error::Empty` if the queue has no
    /// data right now.
    pub fn pop(&self) -> Result<T> {
        let header = self.header();
        let mut backoff = Backoff::new();
        loop {
            let h = header.head.load(Ordering::Relaxed);
            if h == header.tail.load(Ordering::Acquire) {
                return Err(Error::Empty);
            }
            let next = (h + 1) % self.capacity;
            if header
                .head
                .compare_exchange_weak(h, next, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                std::sync::atomic::fence(Ordering::Acquire);
                return Ok(unsafe { *self.slot_mut(h) });
            }
            backoff.spin();
            if backoff.just_crossed_warn_threshold() {
                log::warn!("queue pop: {} retries contending for head", backoff.step());
            }
        }
    }
}
