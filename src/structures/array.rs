//! Array (C): a dense fixed-length vector of trivially-copyable `T`.
//!
//! No synchronization is provided for element access — callers
//! coordinate externally or use an atomic `T`.

use crate::error::{Error, Result};
use crate::segment::Segment;
use std::marker::PhantomData;

#[repr(C)]
struct ArrayHeader {
    capacity: u64,
}

pub struct Array<T: Copy> {
    header: *mut ArrayHeader,
    data: *mut T,
    _marker: PhantomData<T>,
}

unsafe impl<T: Copy + Send> Send for Array<T> {}
unsafe impl<T: Copy + Sync> Sync for Array<T> {}

impl<T: Copy> Array<T> {
    const HEADER_SIZE: u64 = std::mem::size_of::<ArrayHeader>() as u64;

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
        let header = unsafe { segment.at(offset)? as *mut ArrayHeader };
        unsafe {
            std::ptr::write(header, ArrayHeader {
                capacity: capacity as u64,
            });
        }
        let data = unsafe { (header as *mut u8).add(Self::HEADER_SIZE as usize) as *mut T };
        log::debug!("array '{name}' created, capacity={capacity}");
        Ok(Self {
            header,
            data,
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
        let header = unsafe { segment.at(entry.offset)? as *mut ArrayHeader };
        let data = unsafe { (header as *mut u8).add(Self::HEADER_SIZE as usize) as *mut T };
        log::debug!("array '{name}' opened, capacity={}", unsafe {
            (*header).capacity
        });
        Ok(Self {
            header,
            data,
            _marker: PhantomData,
        })
    }

    pub fn capacity(&self) -> usize {
        unsafe { (*self.header).capacity as usize }
    }

    /// Unchecked read. Caller must guarantee `index < capacity()`.
    pub fn get(&self, index: usize) -> T {
        unsafe { *self.data.add(index) }
    }

    /// Unchecked write. Caller must guarantee `index < capacity()`.
    pub fn set(&self, index: usize, value: T) {
        unsafe { *self.data.add(index) = value };
    }

    /// Checked read.
    pub fn at(&self, index: usize) -> Result<T> {
        if index >= self.capacity() {
            return Err(Error::InvalidArgument(format!(
                "index {index} out of bounds (capacity {})",
                self.capacity()
            )));
        }
        Ok(self.get(index))
    }

    /// Checked write.
    pub fn set_checked(&self, index: usize, value: T) -> Result<()> {
        if index >= self.capacity() {
            return Err(Error::InvalidArgument(format!(
                "index {index} out of bounds (capacity {})",
                self.capacity()
            )));
        }
        self.set(index, value);
        Ok(())
    }

    /// Write `value` to every slot.
    pub fn fill(&self, value: T) {
        for i in 0..self.capacity() {
            self.set(i, value);
        }
    }
}
