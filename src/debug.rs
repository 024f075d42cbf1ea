//! `Debug` proxy implementations: each structure's `fmt::Debug` delegates
//! to a standalone function here, keeping "what gets printed" separate
//! from "where the impl lives". Every impl prints metadata only; no
//! payload bytes are dereferenced, since the pointee may belong to
//! another process.

use std::fmt;
use std::hash::Hash;

use crate::segment::Segment;
use crate::structures::{Array, Bitset, Map, Pool, Queue, Ring, Stack};
use crate::sync::{Barrier, Latch, Semaphore};

pub fn debug_segment(segment: &Segment, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Segment")
        .field("len", &segment.len())
        .field("entries", &segment.count())
        .finish()
}

impl fmt::Debug for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        debug_segment(self, f)
    }
}

pub fn debug_array<T: Copy>(array: &Array<T>, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Array")
        .field("capacity", &array.capacity())
        .finish_non_exhaustive()
}

impl<T: Copy> fmt::Debug for Array<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        debug_array(self, f)
    }
}

pub fn debug_queue<T: Copy>(queue: &Queue<T>, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Queue")
        .field("capacity", &queue.capacity())
        .field("len", &queue.len())
        .finish()
}

impl<T: Copy> fmt::Debug for Queue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        debug_queue(self, f)
    }
}

pub fn debug_stack<T: Copy>(stack: &Stack<T>, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Stack")
        .field("capacity", &stack.capacity())
        .field("len", &stack.len())
        .finish()
}

impl<T: Copy> fmt::Debug for Stack<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        debug_stack(self, f)
    }
}

pub fn debug_ring<T: Copy>(ring: &Ring<T>, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Ring")
        .field("capacity", &ring.capacity())
        .field("written", &ring.total_written())
        .field("read", &ring.total_read())
        .finish()
}

impl<T: Copy> fmt::Debug for Ring<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        debug_ring(self, f)
    }
}

pub fn debug_pool<T: Copy>(pool: &Pool<T>, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Pool")
        .field("capacity", &pool.capacity())
        .field("allocated", &pool.allocated())
        .finish()
}

impl<T: Copy> fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        debug_pool(self, f)
    }
}

pub fn debug_map<K: Copy + Eq + Hash, V: Copy>(
    map: &Map<K, V>,
    f: &mut fmt::Formatter<'_>,
) -> fmt::Result {
    f.debug_struct("Map")
        .field("bucket_count", &map.bucket_count())
        .field("len", &map.len())
        .field("load_factor", &map.load_factor())
        .finish()
}

impl<K: Copy + Eq + Hash, V: Copy> fmt::Debug for Map<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        debug_map(self, f)
    }
}

pub fn debug_bitset(bitset: &Bitset, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Bitset")
        .field("len", &bitset.len())
        .field("count", &bitset.count())
        .finish()
}

impl fmt::Debug for Bitset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        debug_bitset(self, f)
    }
}

pub fn debug_semaphore(semaphore: &Semaphore, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Semaphore")
        .field("count", &semaphore.count())
        .field("waiting", &semaphore.waiting())
        .finish()
}

impl fmt::Debug for Semaphore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        debug_semaphore(self, f)
    }
}

pub fn debug_latch(latch: &Latch, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Latch").field("count", &latch.count()).finish()
}

impl fmt::Debug for Latch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        debug_latch(self, f)
    }
}

pub fn debug_barrier(barrier: &Barrier, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Barrier")
        .field("participants", &barrier.num_participants())
        .field("generation", &barrier.generation())
        .finish()
}

impl fmt::Debug for Barrier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        debug_barrier(self, f)
    }
}
