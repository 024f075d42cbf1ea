//! Hash map / set (H): open-addressed, linear-probed, tombstoned table
//! with an atomic slot state. Bucket count is a power of two sized to
//! 1.5x the requested capacity (headroom for the 0.75 max load factor).
//!
//! A naive open-addressed insert that only probes for empty slots can
//! let two racing inserts of the same key both land in distinct empty
//! slots. This implementation adds a rescan: after winning the CAS into
//! an EMPTY/TOMBSTONE slot, `insert` re-walks the probe sequence up to
//! that slot looking for a key match that raced in underneath it, and
//! backs out (returning "duplicate") if one is found. That closes the
//! at-most-once violation at the cost of an extra bounded scan per
//! insert.

use crate::error::{Error, Result};
use crate::segment::Segment;
use crate::sync::backoff::Backoff;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};

const EMPTY: u8 = 0;
const OCCUPIED: u8 = 1;
const TOMBSTONE: u8 = 2;

enum ClaimOutcome {
    Claimed,
    Duplicate,
    Contended,
}

#[repr(C)]
struct MapHeader {
    size: AtomicU32,
    bucket_count: u32,
    key_size: u32,
    value_size: u32,
}

#[repr(C)]
struct Slot<K, V> {
    state: AtomicU8,
    key: std::cell::UnsafeCell<std::mem::MaybeUninit<K>>,
    value: std::cell::UnsafeCell<std::mem::MaybeUninit<V>>,
}

pub struct Map<K: Copy + Eq + Hash, V: Copy> {
    header: *mut MapHeader,
    slots: *mut Slot<K, V>,
    bucket_count: u32,
    _marker: PhantomData<(K, V)>,
}

unsafe impl<K: Copy + Eq + Hash + Send, V: Copy + Send> Send for Map<K, V> {}
unsafe impl<K: Copy + Eq + Hash + Sync, V: Copy + Sync> Sync for Map<K, V> {}

fn next_power_of_two(n: u64) -> u64 {
    if n <= 1 {
        return 1;
    }
    1u64 << (64 - (n - 1).leading_zeros())
}

fn hash_key<K: Hash>(key: &K) -> u64 {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    hasher.finish()
}

impl<K: Copy + Eq + Hash, V: Copy> Map<K, V> {
    const HEADER_SIZE: u64 = std::mem::size_of::<MapHeader>() as u64;
    const MAX_LOAD_FACTOR: f64 = 0.75;

    pub fn create(segment: &Segment, name: &str, capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::InvalidArgument("capacity must be > 0".into()));
        }
        let bucket_count = next_power_of_two((capacity as f64 * 1.5).ceil() as u64);
        let slot_size = std::mem::size_of::<Slot<K, V>>() as u64;
        let payload_size = slot_size * bucket_count;
        let key_size = std::mem::size_of::<K>() as u64;
        let value_size = std::mem::size_of::<V>() as u64;

        let offset = segment.allocate(
            name,
            Self::HEADER_SIZE + payload_size,
            key_size,
            bucket_count,
        )?;
        let header = unsafe { segment.at(offset)? as *mut MapHeader };
        unsafe {
            std::ptr::write(
                header,
                MapHeader {
                    size: AtomicU32::new(0),
                    bucket_count: bucket_count as u32,
                    key_size: key_size as u32,
                    value_size: value_size as u32,
                },
            );
        }
        let slots =
            unsafe { (header as *mut u8).add(Self::HEADER_SIZE as usize) as *mut Slot<K, V> };
        for i in 0..bucket_count {
            unsafe {
                std::ptr::write(
                    slots.add(i as usize),
                    Slot {
                        state: AtomicU8::new(EMPTY),
                        key: std::cell::UnsafeCell::new(std::mem::MaybeUninit::uninit()),
                        value: std::cell::UnsafeCell::new(std::mem::MaybeUninit::uninit()),
                    },
                );
            }
        }

        log::debug!("map '{name}' created, bucket_count={bucket_count}");
        Ok(Self {
            header,
            slots,
            bucket_count: bucket_count as u32,
            _marker: PhantomData,
        })
    }

    pub fn open(segment: &Segment, name: &str) -> Result<Self> {
        let entry = segment
            .find(name)
            .ok_or_else(|| Error::NotFound(name.to_string()))?;
        let key_size = std::mem::size_of::<K>() as u64;
        if entry.elem_size != key_size {
            return Err(Error::ElementSizeMismatch {
                expected: key_size,
                found: entry.elem_size,
            });
        }
        let header = unsafe { segment.at(entry.offset)? as *mut MapHeader };
        let bucket_count = unsafe { (*header).bucket_count };
        let slots =
            unsafe { (header as *mut u8).add(Self::HEADER_SIZE as usize) as *mut Slot<K, V> };
        log::debug!("map '{name}' opened, bucket_count={bucket_count}");
        Ok(Self {
            header,
            slots,
            bucket_count,
            _marker: PhantomData,
        })
    }

    fn header(&self) -> &MapHeader {
        unsafe { &*self.header }
    }

    pub fn bucket_count(&self) -> usize {
        self.bucket_count as usize
    }

    pub fn len(&self) -> usize {
        self.header().size.load(Ordering::Acquire) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot(&self, index: u32) -> &Slot<K, V> {
        unsafe { &*self.slots.add(index as usize) }
    }

    fn start_index(&self, key: &K) -> u32 {
        (hash_key(key) % self.bucket_count as u64) as u32
    }

    /// Re-walk the probe sequence `[start, claimed)` looking for `key` in
    /// an OCCUPIED slot other than `claimed` — closes the window where
    /// two racing inserts of the same key both land in distinct empty
    /// slots.
    fn duplicate_in_range(&self, key: &K, start: u32, claimed: u32) -> bool {
        let mut i = start;
        loop {
            if i == claimed {
                return false;
            }
            let slot = self.slot(i);
            let state = slot.state.load(Ordering::Acquire);
            if state == OCCUPIED {
                let existing = unsafe { &*slot.key.get() };
                if unsafe { existing.assume_init_ref() } == key {
                    return true;
                }
            }
            i = (i + 1) % self.bucket_count;
        }
    }

    /// Insert `key` -> `value`. Returns `Ok(false)` without modifying
    /// anything if `key` is already present, `Err(Error::Full)` once the
    /// table is at its 0.75 max load factor (checked before probing, not
    /// only once a full probe cycle finds no empty slot — an open-
    /// addressed table degrades badly well before it's literally full).
    pub fn insert(&self, key: K, value: V) -> Result<bool> {
        let limit = (self.bucket_count as f64 * Self::MAX_LOAD_FACTOR) as u32;
        if self.header().size.load(Ordering::Acquire) >= limit && !self.contains_key(&key) {
            return Err(Error::Full);
        }
        let mut backoff = Backoff::new();
        loop {
            let start = self.start_index(&key);
            let mut first_tombstone: Option<u32> = None;
            let mut i = start;
            let mut target = None;

            for _ in 0..self.bucket_count {
                let slot = self.slot(i);
                match slot.state.load(Ordering::Acquire) {
                    EMPTY => {
                        target = Some((first_tombstone.unwrap_or(i), first_tombstone.is_some()));
                        break;
                    }
                    OCCUPIED => {
                        let existing = unsafe { &*slot.key.get() };
                        if unsafe { existing.assume_init_ref() } == &key {
                            return Ok(false);
                        }
                    }
                    TOMBSTONE => {
                        if first_tombstone.is_none() {
                            first_tombstone = Some(i);
                        }
                    }
                    _ => unreachable!("invalid slot state"),
                }
                i = (i + 1) % self.bucket_count;
            }

            let (target, via_tombstone) = match target.or(first_tombstone.map(|t| (t, true))) {
                Some((t, v)) => (t, v),
                None => return Err(Error::Full),
            };

            match self.claim_slot(target, via_tombstone, &key, start) {
                ClaimOutcome::Claimed => {
                    let slot = self.slot(target);
                    unsafe {
                        (*slot.key.get()).write(key);
                        (*slot.value.get()).write(value);
                    }
                    self.header().size.fetch_add(1, Ordering::AcqRel);
                    return Ok(true);
                }
                ClaimOutcome::Duplicate => return Ok(false),
                ClaimOutcome::Contended => {
                    backoff.spin();
                    if backoff.just_crossed_warn_threshold() {
                        log::warn!(
                            "map insert: {} retries contending for a slot",
                            backoff.step()
                        );
                    }
                    continue;
                }
            }
        }
    }

    fn claim_slot(&self, target: u32, via_tombstone: bool, key: &K, start: u32) -> ClaimOutcome {
        let expected = if via_tombstone { TOMBSTONE } else { EMPTY };
        let slot = self.slot(target);
        if slot
            .state
            .compare_exchange(expected, OCCUPIED, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return ClaimOutcome::Contended;
        }

        if self.duplicate_in_range(key, start, target) {
            // A concurrent insert published the same key in a slot we
            // passed over before we won our CAS. Back out.
            slot.state.store(EMPTY, Ordering::Release);
            return ClaimOutcome::Duplicate;
        }

        ClaimOutcome::Claimed
    }

    /// Look up `key`. Tombstones are skipped transparently.
    pub fn get(&self, key: &K) -> Option<V> {
        let start = self.start_index(key);
        let mut i = start;
        for _ in 0..self.bucket_count {
            let slot = self.slot(i);
            match slot.state.load(Ordering::Acquire) {
                EMPTY => return None,
                OCCUPIED => {
                    let existing = unsafe { &*slot.key.get() };
                    if unsafe { existing.assume_init_ref() } == key {
                        let value = unsafe { &*slot.value.get() };
                        return Some(unsafe { *value.assume_init_ref() });
                    }
                }
                _ => {}
            }
            i = (i + 1) % self.bucket_count;
        }
        None
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Overwrite the value for an existing key. Returns `false` if the
    /// key isn't present.
    pub fn update(&self, key: &K, value: V) -> bool {
        let start = self.start_index(key);
        let mut i = start;
        for _ in 0..self.bucket_count {
            let slot = self.slot(i);
            match slot.state.load(Ordering::Acquire) {
                EMPTY => return false,
                OCCUPIED => {
                    let existing = unsafe { &*slot.key.get() };
                    if unsafe { existing.assume_init_ref() } == key {
                        unsafe { (*slot.value.get()).write(value) };
                        return true;
                    }
                }
                _ => {}
            }
            i = (i + 1) % self.bucket_count;
        }
        false
    }

    /// Remove `key`, returning `true` if it was present.
    pub fn erase(&self, key: &K) -> bool {
        let start = self.start_index(key);
        let mut i = start;
        for _ in 0..self.bucket_count {
            let slot = self.slot(i);
            match slot.state.load(Ordering::Acquire) {
                EMPTY => return false,
                OCCUPIED => {
                    let existing = unsafe { &*slot.key.get() };
                    if unsafe { existing.assume_init_ref() } == key {
                        if slot
                            .state
                            .compare_exchange(
                                OCCUPIED,
                                TOMBSTONE,
                                Ordering::AcqRel,
                                Ordering::Acquire,
                            )
                            .is_ok()
                        {
                            self.header().size.fetch_sub(1, Ordering::AcqRel);
                            return true;
                        }
                        return false;
                    }
                }
                _ => {}
            }
            i = (i + 1) % self.bucket_count;
        }
        false
    }

    /// Current load factor, `size / bucket_count`.
    pub fn load_factor(&self) -> f64 {
        self.len() as f64 / self.bucket_count as f64
    }

    pub fn max_load_factor() -> f64 {
        Self::MAX_LOAD_FACTOR
    }
}

/// A set is a map with a zero-width value.
pub type Set<K> = Map<K, ()>;

pub trait SetExt<K: Copy + Eq + Hash> {
    fn insert_key(&self, key: K) -> Result<bool>;
}

impl<K: Copy + Eq + Hash> SetExt<K> for Set<K> {
    fn insert_key(&self, key: K) -> Result<bool> {
        self.insert(key, ())
    }
}
