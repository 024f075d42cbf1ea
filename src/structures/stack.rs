//! Stack (E): bounded lock-free LIFO with an atomic `top` index.
//!
//! No ABA concern: the payload is indexed directly, not through reused
//! tagged pointers.

use crate::error::{Error, Result};
use crate::segment::Segment;
use crate::sync::backoff::Backoff;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicI32, Ordering};

#[repr(C)]
struct StackHeader {
    /// Index of the next free slot; -1 would mean empty, but since this
    /// is unsigned usage throughout, `top == 0` is empty and
    /// `top == capacity` is full.
    top: AtomicI32,
    capacity: u32,
    elem_size: u32,
}

pub struct Stack<T: Copy> {
    header: *mut StackHeader,
    data: *mut T,
    capacity: u32,
    _marker: PhantomData<T>,
}

unsafe impl<T: Copy + Send> Send for Stack<T> {}
unsafe impl<T: Copy + Sync> Sync for Stack<T> {}

impl<T: Copy> Stack<T> {
    const HEADER_SIZE: u64 = std::mem::size_of::<StackHeader>() as u64;

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
        let header = unsafe { segment.at(offset)? as *mut StackHeader };
        unsafe {
            std::ptr::write(
                header,
                StackHeader {
                    top: AtomicI32::new(0),
                    capacity: capacity as u32,
                    elem_size: elem_size as u32,
                },
            );
        }
        let data = unsafe { (header as *mut u8).add(Self::HEADER_SIZE as usize) as *mut T };
        log::debug!("stack '{name}' created, capacity={capacity}");
        Ok(Self {
            header,
            data,
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
        let header = unsafe { segment.at(entry.offset)? as *mut StackHeader };
        let capacity = unsafe { (*header).capacity };
        let data = unsafe { (header as *mut u8).add(Self::HEADER_SIZE as usize) as *mut T };
        log::debug!("stack '{name}' opened, capacity={capacity}");
        Ok(Self {
            header,
            data,
            capacity,
            _marker: PhantomData,
        })
    }

    fn header(&self) -> &StackHeader {
        unsafe { &*self.header }
    }

    pub fn capacity(&self) -> usize {
        self.capacity as usize
    }

    pub fn len(&self) -> usize {
        self.header().top.load(Ordering::Acquire) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot_mut(&self, index: i32) -> *mut T {
        unsafe { self.data.add(index as usize) }
    }

    /// Push `value`. Returns `Error::Full` if the stack is at capacity.
    pub fn push(&self, value: T) -> Result<()> {
        let header = self.header();
        let mut backoff = Backoff::new();
        loop {
            let top = header.top.load(Ordering::Relaxed);
            if top as u32 >= self.capacity {
                return Err(Error::Full);
            }
            if header
                .top
                .compare_exchange_weak(top, top + 1, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
            {
                unsafe { *self.slot_mut(top) = value };
                std::sync::atomic::fence(Ordering::Release);
                return Ok(());
            }
            backoff.spin();
            if backoff.just_crossed_warn_threshold() {
                log::warn!("stack push: {} retries contending for top", backoff.step());
            }
        }
    }

    /// Pop the most recently pushed value. Returns `Error::Empty` if the
    /// stack has nothing to pop right now.
    pub fn pop(&self) -> Result<T> {
        let header = self.header();
        let mut backoff = Backoff::new();
        loop {
            let top = header.top.load(Ordering::Relaxed);
            if top <= 0 {
                return Err(Error::Empty);
            }
            if header
                .top
                .compare_exchange_weak(top, top - 1, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                std::sync::atomic::fence(Ordering::Acquire);
                return Ok(unsafe { *self.slot_mut(top - 1) });
            }
            backoff.spin();
            if backoff.just_crossed_warn_threshold() {
                log::warn!("stack pop: {} retries contending for top", backoff.step());
            }
        }
    }

    /// Peek at the top element without popping. May observe a value that
    /// a concurrent pop is in the middle of removing.
    pub fn peek(&self) -> Option<T> {
        let top = self.header().top.load(Ordering::Acquire);
        if top > 0 {
            Some(unsafe { *self.slot_mut(top - 1) })
        } else {
            None
        }
    }
}
