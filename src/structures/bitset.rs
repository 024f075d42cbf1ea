//! Bitset (I): fixed-size array of atomic 64-bit words with a cached
//! population count. `count()` is O(1) off the cache maintained by
//! `set`/`reset`/`flip`; `count_accurate()` re-derives it by popcounting
//! every word, as a consistency check.

use crate::error::{Error, Result};
use crate::segment::Segment;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

const BITS_PER_WORD: u64 = 64;

#[repr(C)]
struct BitsetHeader {
    num_bits: u64,
    num_words: u64,
    set_count: AtomicI64,
}

pub struct Bitset {
    header: *mut BitsetHeader,
    words: *mut AtomicU64,
    num_bits: u64,
    num_words: u64,
}

unsafe impl Send for Bitset {}
unsafe impl Sync for Bitset {}

fn word_and_bit(index: u64) -> (u64, u64) {
    (index / BITS_PER_WORD, index % BITS_PER_WORD)
}

impl Bitset {
    const HEADER_SIZE: u64 = std::mem::size_of::<BitsetHeader>() as u64;

    pub fn create(segment: &Segment, name: &str, num_bits: usize) -> Result<Self> {
        if num_bits == 0 {
            return Err(Error::InvalidArgument("num_bits must be > 0".into()));
        }
        let num_bits = num_bits as u64;
        let num_words = num_bits.div_ceil(BITS_PER_WORD);
        let payload_size = 8 * num_words;

        let offset = segment.allocate(name, Self::HEADER_SIZE + payload_size, 8, num_words)?;
        let header = unsafe { segment.at(offset)? as *mut BitsetHeader };
        unsafe {
            std::ptr::write(
                header,
                BitsetHeader {
                    num_bits,
                    num_words,
                    set_count: AtomicI64::new(0),
                },
            );
        }
        let words = unsafe { (header as *mut u8).add(Self::HEADER_SIZE as usize) as *mut AtomicU64 };
        for i in 0..num_words {
            unsafe { std::ptr::write(words.add(i as usize), AtomicU64::new(0)) };
        }

        log::debug!("bitset '{name}' created, num_bits={num_bits}");
        Ok(Self {
            header,
            words,
            num_bits,
            num_words,
        })
    }

    pub fn open(segment: &Segment, name: &str) -> Result<Self> {
        let entry = segment
            .find(name)
            .ok_or_else(|| Error::NotFound(name.to_string()))?;
        if entry.elem_size != 8 {
            return Err(Error::ElementSizeMismatch {
                expected: 8,
                found: entry.elem_size,
            });
        }
        let header = unsafe { segment.at(entry.offset)? as *mut BitsetHeader };
        let num_bits = unsafe { (*header).num_bits };
        let num_words = unsafe { (*header).num_words };
        let words = unsafe { (header as *mut u8).add(Self::HEADER_SIZE as usize) as *mut AtomicU64 };
        log::debug!("bitset '{name}' opened, num_bits={num_bits}");
        Ok(Self {
            header,
            words,
            num_bits,
            num_words,
        })
    }

    fn header(&self) -> &BitsetHeader {
        unsafe { &*self.header }
    }

    fn word(&self, index: u64) -> &AtomicU64 {
        unsafe { &*self.words.add(index as usize) }
    }

    pub fn len(&self) -> usize {
        self.num_bits as usize
    }

    pub fn is_empty(&self) -> bool {
        self.num_bits == 0
    }

    fn check_bounds(&self, index: usize) -> Result<u64> {
        let index = index as u64;
        if index >= self.num_bits {
            return Err(Error::InvalidArgument(format!(
                "bit index {index} out of bounds ({} bits)",
                self.num_bits
            )));
        }
        Ok(index)
    }

    pub fn test(&self, index: usize) -> Result<bool> {
        let index = self.check_bounds(index)?;
        let (w, b) = word_and_bit(index);
        Ok(self.word(w).load(Ordering::Acquire) & (1 << b) != 0)
    }

    /// Set bit `index`. Returns the previous value.
    pub fn set(&self, index: usize) -> Result<bool> {
        let index = self.check_bounds(index)?;
        let (w, b) = word_and_bit(index);
        let mask = 1u64 << b;
        let old = self.word(w).fetch_or(mask, Ordering::AcqRel);
        if old & mask == 0 {
            self.header().set_count.fetch_add(1, Ordering::AcqRel);
        }
        Ok(old & mask != 0)
    }

    /// Clear bit `index`. Returns the previous value.
    pub fn reset(&self, index: usize) -> Result<bool> {
        let index = self.check_bounds(index)?;
        let (w, b) = word_and_bit(index);
        let mask = 1u64 << b;
        let old = self.word(w).fetch_and(!mask, Ordering::AcqRel);
        if old & mask != 0 {
            self.header().set_count.fetch_sub(1, Ordering::AcqRel);
        }
        Ok(old & mask != 0)
    }

    /// Toggle bit `index`. Returns the new value.
    pub fn flip(&self, index: usize) -> Result<bool> {
        let index = self.check_bounds(index)?;
        let (w, b) = word_and_bit(index);
        let mask = 1u64 << b;
        let old = self.word(w).fetch_xor(mask, Ordering::AcqRel);
        if old & mask == 0 {
            self.header().set_count.fetch_add(1, Ordering::AcqRel);
        } else {
            self.header().set_count.fetch_sub(1, Ordering::AcqRel);
        }
        Ok(old & mask == 0)
    }

    /// Cached population count, maintained incrementally by
    /// `set`/`reset`/`flip`.
    pub fn count(&self) -> usize {
        self.header().set_count.load(Ordering::Acquire) as usize
    }

    /// Recompute the population count by popcounting every word. Useful
    /// to validate `count()` against direct word manipulation (e.g. via
    /// `&=`/`|=`/`^=`), which bypasses the cache.
    pub fn count_accurate(&self) -> usize {
        let mut total = 0u64;
        for i in 0..self.num_words {
            total += self.word(i).load(Ordering::Acquire).count_ones() as u64;
        }
        total as usize
    }

    fn last_word_mask(&self) -> u64 {
        let rem = self.num_bits % BITS_PER_WORD;
        if rem == 0 {
            u64::MAX
        } else {
            (1u64 << rem) - 1
        }
    }

    /// Find the index of the first set bit at or after `from`, if any.
    pub fn find_first(&self) -> Option<usize> {
        self.find_next_internal(0)
    }

    /// Find the index of the first set bit strictly after `index`.
    pub fn find_next(&self, index: usize) -> Option<usize> {
        self.find_next_internal(index as u64 + 1)
    }

    fn find_next_internal(&self, from: u64) -> Option<usize> {
        if from >= self.num_bits {
            return None;
        }
        let mut w = from / BITS_PER_WORD;
        let bit_in_word = from % BITS_PER_WORD;
        let mut mask = if bit_in_word == 0 {
            u64::MAX
        } else {
            u64::MAX << bit_in_word
        };
        while w < self.num_words {
            let mut bits = self.word(w).load(Ordering::Acquire) & mask;
            if w == self.num_words - 1 {
                bits &= self.last_word_mask();
            }
            if bits != 0 {
                let bit = bits.trailing_zeros() as u64;
                let idx = w * BITS_PER_WORD + bit;
                if idx < self.num_bits {
                    return Some(idx as usize);
                }
                return None;
            }
            w += 1;
            mask = u64::MAX;
        }
        None
    }

    /// Word-by-word AND with `other`. Not atomic as a whole: a reader
    /// between words can observe a partially-updated bitset. Caller must
    /// serialize against concurrent mutators. Invalidates the cached
    /// count; call `recount` afterward if it's needed.
    pub fn and_with(&self, other: &Bitset) -> Result<()> {
        self.combine(other, |a, b| a & b)
    }

    pub fn or_with(&self, other: &Bitset) -> Result<()> {
        self.combine(other, |a, b| a | b)
    }

    pub fn xor_with(&self, other: &Bitset) -> Result<()> {
        self.combine(other, |a, b| a ^ b)
    }

    fn combine(&self, other: &Bitset, f: impl Fn(u64, u64) -> u64) -> Result<()> {
        if self.num_words != other.num_words {
            return Err(Error::InvalidArgument(
                "bitsets must have the same word count".into(),
            ));
        }
        for i in 0..self.num_words {
            let a = self.word(i).load(Ordering::Relaxed);
            let b = other.word(i).load(Ordering::Relaxed);
            self.word(i).store(f(a, b), Ordering::Relaxed);
        }
        self.recount();
        Ok(())
    }

    /// Recompute and republish the cached population count from scratch.
    pub fn recount(&self) {
        let total = self.count_accurate() as i64;
        self.header().set_count.store(total, Ordering::Release);
    }
}
