//! Segment binding (A) — ties a mapped region's backend to the directory
//! table at its head and hands out bounds-checked views into the rest of
//! the region. Every structure in `structures::*` goes through here to
//! find or allocate its header.

use crate::error::{Error, Result};
use crate::segment::backend::{PosixSegmentBackend, SegmentBackend};
use crate::segment::table::{EntryInfo, Table};
use parking_lot::Mutex;
use std::sync::Arc;

/// A segment is a contiguous mapped region with a directory table at
/// offset 0. One process creates it (zeroing the header and table); any
/// number of processes may subsequently attach. Handles returned by
/// `find`/structure `open` calls are transient views — dropping them
/// never affects the segment itself.
///
/// `write_lock` serializes `add`/`erase` calls made by this process; it
/// says nothing about other processes attached to the same segment,
/// which is why the table itself still resolves the next slot and the
/// next bump-allocated offset via CAS rather than trusting the lock
/// alone.
pub struct Segment {
    backend: Arc<dyn SegmentBackend>,
    write_lock: Arc<Mutex<()>>,
}

impl Clone for Segment {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            write_lock: self.write_lock.clone(),
        }
    }
}

impl Segment {
    /// Wrap an already-backed region (own backend implementation, or a
    /// region mapped by the host application) as a segment, initializing
    /// a fresh directory table at offset 0.
    pub fn create_over(backend: Arc<dyn SegmentBackend>) -> Result<Self> {
        let len = backend.len() as u64;
        if len < Table::SIZE as u64 {
            return Err(Error::SegmentTooSmall {
                needed: Table::SIZE as u64,
                available: len,
            });
        }
        unsafe {
            Table::init(backend.as_ptr() as *mut Table, len);
        }
        log::info!("segment created: {} bytes, table at offset 0", len);
        Ok(Self {
            backend,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Attach to an existing segment, validating the directory table's
    /// magic and version before returning.
    pub fn open_over(backend: Arc<dyn SegmentBackend>) -> Result<Self> {
        let len = backend.len() as u64;
        if len < Table::SIZE as u64 {
            return Err(Error::SegmentTooSmall {
                needed: Table::SIZE as u64,
                available: len,
            });
        }
        unsafe {
            Table::validate(backend.as_ptr() as *const Table)?;
        }
        log::info!("segment opened: {} bytes", len);
        Ok(Self {
            backend,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Create a new named POSIX shared-memory segment of `len` bytes.
    pub fn create(name: &str, len: usize) -> Result<Self> {
        let backend = PosixSegmentBackend::create(name, len)?;
        Self::create_over(Arc::new(backend))
    }

    /// Attach to an existing named POSIX shared-memory segment. `len = 0`
    /// means "discover": the mapped size is read back from the host.
    pub fn open(name: &str, len: usize) -> Result<Self> {
        let backend = PosixSegmentBackend::open(name, len)?;
        Self::open_over(Arc::new(backend))
    }

    /// Remove the named segment from the system. Safe to call even while
    /// other processes have it mapped; it only affects future `open`s.
    pub fn unlink(name: &str) -> Result<()> {
        PosixSegmentBackend::unlink(name)?;
        log::info!("segment '{name}' unlinked");
        Ok(())
    }

    fn table(&self) -> &Table {
        unsafe { &*(self.backend.as_ptr() as *const Table) }
    }

    /// Reserve `size` bytes for a new named structure and register it in
    /// the directory table. Fails if the name already exists, the table
    /// is full, or the segment doesn't have room.
    pub fn allocate(
        &self,
        name: &str,
        size: u64,
        elem_size: u64,
        num_elem: u64,
    ) -> Result<u64> {
        let _guard = self.write_lock.lock();
        self.table().add(name, size, elem_size, num_elem)
    }

    /// Look up a structure's metadata by name.
    pub fn find(&self, name: &str) -> Option<EntryInfo> {
        self.table().find(name)
    }

    /// Mark a structure's directory entry inactive. Does not reclaim its
    /// payload bytes.
    pub fn erase(&self, name: &str) -> bool {
        let _guard = self.write_lock.lock();
        self.table().erase(name)
    }

    /// Number of active entries in the directory table.
    pub fn count(&self) -> u32 {
        self.table().count()
    }

    /// Iterate over every active entry's name and metadata.
    pub fn iter(&self) -> impl Iterator<Item = (String, EntryInfo)> + '_ {
        self.table().iter()
    }

    /// Total size of the mapped region in bytes.
    pub fn len(&self) -> usize {
        self.backend.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bounds-checked pointer arithmetic into the segment.
    ///
    /// # Safety
    /// The returned pointer is only valid for reads/writes of types whose
    /// layout matches what was allocated at `offset`; the caller is
    /// responsible for that contract.
    pub unsafe fn at(&self, offset: u64) -> Result<*mut u8> {
        let offset = offset as usize;
        if offset > self.backend.len() {
            return Err(Error::InvalidArgument(format!(
                "offset {offset} out of bounds (segment is {} bytes)",
                self.backend.len()
            )));
        }
        Ok(self.backend.as_ptr().add(offset))
    }
}

/// Builder for creating or attaching to a segment, mirroring the
/// teacher's `ChannelBuilder`: attach-if-exists-else-create is a common
/// enough pattern in this domain to deserve a named entry point rather
/// than forcing every caller to write the `open().or_else(create)` dance
/// by hand.
pub struct SegmentBuilder {
    name: String,
    size: usize,
}

impl SegmentBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size: 128 * 1024 * 1024,
        }
    }

    pub fn with_size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    /// Create the segment, failing if it already exists.
    pub fn create(self) -> Result<Segment> {
        Segment::create(&self.name, self.size)
    }

    /// Attach to the segment, failing if it doesn't exist.
    pub fn open(self) -> Result<Segment> {
        Segment::open(&self.name, self.size)
    }

    /// Attach if the segment already exists, otherwise create it.
    pub fn create_or_open(self) -> Result<Segment> {
        match Segment::open(&self.name, self.size) {
            Ok(segment) => Ok(segment),
            Err(_) => Segment::create(&self.name, self.size),
        }
    }
}
