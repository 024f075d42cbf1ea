//! Ring buffer (F): monotonic write/read position counters over a
//! circular element array. SPSC is lock-free and linearizable; the bulk
//! and overwrite paths read-modify both positions without a CAS and are
//! documented as unsafe under concurrent writers.
//!
//! The per-slot "is this element published yet" distinction an MPMC
//! channel needs (see `structures::queue`) isn't needed here because
//! SPSC already gives total order on each of `write_pos`/`read_pos`;
//! what carries over is just the monotonic-counter-plus-modulo-index
//! technique itself.

use crate::error::{Error, Result};
use crate::segment::Segment;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};

#[repr(C)]
struct RingHeader {
    write_pos: AtomicU64,
    read_pos: AtomicU64,
    capacity: u32,
    elem_size: u32,
}

pub struct Ring<T: Copy> {
    header: *mut RingHeader,
    data: *mut T,
    capacity: u64,
    _marker: PhantomData<T>,
}

unsafe impl<T: Copy + Send> Send for Ring<T> {}
unsafe impl<T: Copy + Sync> Sync for Ring<T> {}

impl<T: Copy> Ring<T> {
    const HEADER_SIZE: u64 = std::mem::size_of::<RingHeader>() as u64;

    pub fn create(segment: &Segment, name: &str, capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::InvalidArgument("capacity must be > 0".into()));
        }
        let elem_size = std::mem::size_of::<T>() as u64;
        let payload_size = elem_size * capacity as u64;
        let offset = segment.allocate(
            name,
            Self::HEADER_SIZE + payload_size,
            elem_size,
            capacity as u64,
        )?;
        let header = unsafe { segment.at(offset)? as *mut RingHeader };
        unsafe {
            std::ptr::write(
                header,
                RingHeader {
                    write_pos: AtomicU64::new(0),
                    read_pos: AtomicU64::new(0),
                    capacity: capacity as u32,
                    elem_size: elem_size as u32,
                },
            );
        }
        let data = unsafe { (header as *mut u8).add(Self::HEADER_SIZE as usize) as *mut T };
        log::debug!("ring '{name}' created, capacity={capacity}");
        Ok(Self {
            header,
            data,
            capacity: capacity as u64,
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
        let header = unsafe { segment.at(entry.offset)? as *mut RingHeader };
        let capacity = unsafe { (*header).capacity as u64 };
        let data = unsafe { (header as *mut u8).add(Self::HEADER_SIZE as usize) as *mut T };
        log::debug!("ring '{name}' opened, capacity={capacity}");
        Ok(Self {
            header,
            data,
            capacity,
            _marker: PhantomData,
        })
    }

    fn header(&self) -> &RingHeader {
        unsafe { &*self.header }
    }

    pub fn capacity(&self) -> usize {
        self.capacity as usize
    }

    fn index(&self, pos: u64) -> u64 {
        pos % self.capacity
    }

    fn slot_mut(&self, pos: u64) -> *mut T {
        unsafe { self.data.add(self.index(pos) as usize) }
    }

    /// Total elements ever written.
    pub fn total_written(&self) -> u64 {
        self.header().write_pos.load(Ordering::Acquire)
    }

    /// Total elements ever read.
    pub fn total_read(&self) -> u64 {
        self.header().read_pos.load(Ordering::Acquire)
    }

    /// Elements currently buffered (written but not yet read).
    pub fn len(&self) -> usize {
        (self.total_written() - self.total_read()) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() as u64 == self.capacity
    }

    /// Push one element. Returns `Error::Full` if the ring has no room.
    pub fn push(&self, value: T) -> Result<()> {
        let header = self.header();
        let write_pos = header.write_pos.load(Ordering::Relaxed);
        let read_pos = header.read_pos.load(Ordering::Acquire);
        if write_pos - read_pos >= self.capacity {
            return Err(Error::Full);
        }
        unsafe { *self.slot_mut(write_pos) = value };
        header.write_pos.store(write_pos + 1, Ordering::Release);
        Ok(())
    }

    /// Pop one element. Returns `Error::Empty` if nothing is buffered.
    pub fn pop(&self) -> Result<T> {
        let header = self.header();
        let read_pos = header.read_pos.load(Ordering::Relaxed);
        let write_pos = header.write_pos.load(Ordering::Acquire);
        if read_pos >= write_pos {
            return Err(Error::Empty);
        }
        let value = unsafe { *self.slot_mut(read_pos) };
        header.read_pos.store(read_pos + 1, Ordering::Release);
        Ok(value)
    }

    /// Push as many of `values` as fit, returning the count actually
    /// transferred. Not safe under concurrent writers (reads then writes
    /// both positions without a CAS).
    pub fn push_bulk(&self, values: &[T]) -> usize {
        let header = self.header();
        let write_pos = header.write_pos.load(Ordering::Relaxed);
        let read_pos = header.read_pos.load(Ordering::Acquire);
        let free = self.capacity - (write_pos - read_pos);
        let n = std::cmp::min(free, values.len() as u64) as usize;
        for (i, value) in values.iter().take(n).enumerate() {
            unsafe { *self.slot_mut(write_pos + i as u64) = *value };
        }
        header
            .write_pos
            .store(write_pos + n as u64, Ordering::Release);
        n
    }

    /// Pop up to `buf.len()` elements into `buf`, returning the count
    /// actually transferred. Same concurrency caveat as `push_bulk`.
    pub fn pop_bulk(&self, buf: &mut [T]) -> usize {
        let header = self.header();
        let read_pos = header.read_pos.load(Ordering::Relaxed);
        let write_pos = header.write_pos.load(Ordering::Acquire);
        let available = write_pos - read_pos;
        let n = std::cmp::min(available, buf.len() as u64) as usize;
        for (i, slot) in buf.iter_mut().take(n).enumerate() {
            *slot = unsafe { *self.slot_mut(read_pos + i as u64) };
        }
        header
            .read_pos
            .store(read_pos + n as u64, Ordering::Release);
        n
    }

    /// Read up to `buf.len()` elements starting `offset` positions past
    /// the current read position, without advancing it. Returns the
    /// count actually copied.
    pub fn peek_bulk(&self, offset: usize, buf: &mut [T]) -> usize {
        let header = self.header();
        let read_pos = header.read_pos.load(Ordering::Acquire) + offset as u64;
        let write_pos = header.write_pos.load(Ordering::Acquire);
        if read_pos >= write_pos {
            return 0;
        }
        let available = write_pos - read_pos;
        let n = std::cmp::min(available, buf.len() as u64) as usize;
        for (i, slot) in buf.iter_mut().take(n).enumerate() {
            *slot = unsafe { *self.slot_mut(read_pos + i as u64) };
        }
        n
    }

    /// Copy the most recent `n` elements into `buf` (which must be at
    /// least `n` long), without advancing the read position. Returns the
    /// count actually copied (fewer than `n` if fewer have ever been
    /// written).
    pub fn get_last_n(&self, n: usize, buf: &mut [T]) -> usize {
        let header = self.header();
        let write_pos = header.write_pos.load(Ordering::Acquire);
        let read_pos = header.read_pos.load(Ordering::Acquire);
        let available = write_pos - read_pos;
        let count = std::cmp::min(n as u64, available) as usize;
        let start = write_pos - count as u64;
        for (i, slot) in buf.iter_mut().take(count).enumerate() {
            *slot = unsafe { *self.slot_mut(start + i as u64) };
        }
        count
    }

    /// Advance the read position by up to `n` elements (fewer if fewer
    /// are buffered). Returns the count actually skipped.
    pub fn skip(&self, n: usize) -> usize {
        let header = self.header();
        let read_pos = header.read_pos.load(Ordering::Relaxed);
        let write_pos = header.write_pos.load(Ordering::Acquire);
        let available = write_pos - read_pos;
        let count = std::cmp::min(n as u64, available);
        header
            .read_pos
            .store(read_pos + count, Ordering::Release);
        count as usize
    }

    /// Push `value`, discarding the oldest element first if full. Trades
    /// data loss for bounded latency. SPSC-only, like
    /// every other method here, but especially unsound for MP since it
    /// advances `read_pos` out from under a consumer.
    pub fn push_overwrite(&self, value: T) {
        let header = self.header();
        let write_pos = header.write_pos.load(Ordering::Relaxed);
        let read_pos = header.read_pos.load(Ordering::Acquire);
        if write_pos - read_pos >= self.capacity {
            header.read_pos.store(read_pos + 1, Ordering::Release);
        }
        unsafe { *self.slot_mut(write_pos) = value };
        header.write_pos.store(write_pos + 1, Ordering::Release);
    }
}
