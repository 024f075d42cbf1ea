//! Directory table — the self-describing metadata at segment offset 0.
//!
//! Fixed-capacity associative array mapping name -> (offset, size,
//! elem_size, num_elem), versioned so attach can reject an incompatible
//! layout before touching any payload bytes. Table layout uses 64-bit
//! offsets only; a 32-bit-header variant is not supported and is
//! rejected as a version mismatch.
//!
//! `add`/`erase` are not lock-free: the table is expected to be
//! read-mostly after setup. Same-process callers are serialized by
//! `write_lock` (a plain `parking_lot::Mutex`); cross-process races for
//! the next slot are resolved with a CAS on `entry_count`. `find` takes
//! no lock: a new entry is only visible to a scanner once its `active`
//! byte is published with `Release`, and scanners load it with
//! `Acquire`, so concurrent `find` during `add` never observes a torn
//! entry.

use crate::error::{Error, Result};
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};

pub const MAGIC: u32 = 0x5A49504D; // "ZIPM"
pub const TABLE_VERSION: u32 = 1;
pub const MAX_NAME_SIZE: usize = 32;
pub const MAX_ENTRIES: usize = 256;

/// Header occupying the first bytes of the segment.
#[repr(C)]
pub struct TableHeader {
    pub magic: AtomicU32,
    pub version: AtomicU32,
    pub entry_count: AtomicU32,
    pub reserved: u32,
    pub memory_size: AtomicU64,
    pub next_offset: AtomicU64,
}

/// One directory entry. `active` is a dedicated sentinel byte rather than
/// treating `entry_count` as a dense prefix: `erase` flips `active` to
/// 0 in place so the slot's index never moves and other entries' offsets
/// stay stable, at the cost of `entry_count` counting holes too (the
/// payload behind an erased entry is never reclaimed, see DESIGN.md).
#[repr(C)]
pub struct TableEntry {
    pub name: [u8; MAX_NAME_SIZE],
    pub offset: u64,
    pub size: u64,
    pub elem_size: u64,
    pub num_elem: u64,
    pub active: AtomicU8,
    _pad: [u8; 7],
}

#[repr(C)]
pub struct Table {
    pub header: TableHeader,
    pub entries: [TableEntry; MAX_ENTRIES],
}

/// A snapshot of a directory entry's fields, returned by `find`/`iter`.
#[derive(Debug, Clone, Copy)]
pub struct EntryInfo {
    pub offset: u64,
    pub size: u64,
    pub elem_size: u64,
    pub num_elem: u64,
}

impl Table {
    pub const SIZE: usize = std::mem::size_of::<Table>();

    /// Initialize a freshly mapped, zeroed region as an empty table.
    ///
    /// # Safety
    /// `table` must point at a region of at least `Table::SIZE` bytes,
    /// exclusively owned by the caller during this call.
    pub unsafe fn init(table: *mut Table, memory_size: u64) {
        let header_ptr = std::ptr::addr_of_mut!((*table).header);
        std::ptr::write(
            header_ptr,
            TableHeader {
                magic: AtomicU32::new(MAGIC),
                version: AtomicU32::new(TABLE_VERSION),
                entry_count: AtomicU32::new(0),
                reserved: 0,
                memory_size: AtomicU64::new(memory_size),
                next_offset: AtomicU64::new(align_up(Table::SIZE as u64, 64)),
            },
        );
        let entries_ptr = std::ptr::addr_of_mut!((*table).entries) as *mut TableEntry;
        for i in 0..MAX_ENTRIES {
            std::ptr::write(
                entries_ptr.add(i),
                TableEntry {
                    name: [0u8; MAX_NAME_SIZE],
                    offset: 0,
                    size: 0,
                    elem_size: 0,
                    num_elem: 0,
                    active: AtomicU8::new(0),
                    _pad: [0u8; 7],
                },
            );
        }
    }

    /// Validate an existing table's header. Fatal on mismatch: the
    /// attacher must not proceed to read payload offsets out of a table
    /// it doesn't understand.
    ///
    /// # Safety
    /// `table` must point at a region of at least `Table::SIZE` bytes
    /// that outlives the returned reference.
    pub unsafe fn validate<'a>(table: *const Table) -> Result<&'a Table> {
        let header = &(*table).header;
        let magic = header.magic.load(Ordering::Acquire);
        if magic != MAGIC {
            return Err(Error::BadMagic {
                expected: MAGIC,
                found: magic,
            });
        }
        let version = header.version.load(Ordering::Acquire);
        if version != TABLE_VERSION {
            return Err(Error::VersionMismatch {
                expected: TABLE_VERSION,
                found: version,
            });
        }
        Ok(&*table)
    }

    pub fn memory_size(&self) -> u64 {
        self.header.memory_size.load(Ordering::Acquire)
    }

    pub fn next_offset(&self) -> u64 {
        self.header.next_offset.load(Ordering::Acquire)
    }

    pub fn entry_count(&self) -> u32 {
        self.header.entry_count.load(Ordering::Acquire)
    }

    /// Reserve `size` bytes at the current bump pointer and register a
    /// new directory entry for `name`. Returns the allocated offset.
    ///
    /// Callers must hold `write_lock` externally (see `Segment::allocate`)
    /// to serialize same-process callers; cross-process races on the slot
    /// index are resolved by the `entry_count` CAS below.
    pub fn add(
        &self,
        name: &str,
        size: u64,
        elem_size: u64,
        num_elem: u64,
    ) -> Result<u64> {
        let name_bytes = encode_name(name)?;

        if self.find(name).is_some() {
            return Err(Error::AlreadyExists(name.to_string()));
        }

        // Claim a slot in the entry table first, so a full table never
        // burns bump-allocated space it can't register.
        let slot = loop {
            let count = self.header.entry_count.load(Ordering::Relaxed);
            if count as usize >= MAX_ENTRIES {
                return Err(Error::TableFull(MAX_ENTRIES));
            }
            if self
                .header
                .entry_count
                .compare_exchange_weak(count, count + 1, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                break count as usize;
            }
            std::hint::spin_loop();
        };

        // Claim a bump-allocated range for the payload.
        let offset = loop {
            let current = self.header.next_offset.load(Ordering::Relaxed);
            let aligned = align_up(current, 64);
            let new_next = aligned + size;
            if new_next > self.memory_size() {
                return Err(Error::SegmentTooSmall {
                    needed: new_next,
                    available: self.memory_size(),
                });
            }
            if self
                .header
                .next_offset
                .compare_exchange_weak(current, new_next, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                break aligned;
            }
            std::hint::spin_loop();
        };

        let entry = &self.entries[slot];
        // Safety: this slot was just exclusively claimed via the CAS
        // above; no other thread will write these fields concurrently.
        unsafe {
            let entry_ptr = entry as *const TableEntry as *mut TableEntry;
            (*entry_ptr).name = name_bytes;
            (*entry_ptr).offset = offset;
            (*entry_ptr).size = size;
            (*entry_ptr).elem_size = elem_size;
            (*entry_ptr).num_elem = num_elem;
        }
        entry.active.store(1, Ordering::Release);

        log::debug!("table: added `{name}` at offset {offset} ({size} bytes)");
        Ok(offset)
    }

    /// O(N) scan over active entries, N = `entry_count`.
    pub fn find(&self, name: &str) -> Option<EntryInfo> {
        let name_bytes = encode_name(name).ok()?;
        let count = self.entry_count() as usize;
        for entry in &self.entries[..count] {
            if entry.active.load(Ordering::Acquire) == 1 && entry.name == name_bytes {
                return Some(EntryInfo {
                    offset: entry.offset,
                    size: entry.size,
                    elem_size: entry.elem_size,
                    num_elem: entry.num_elem,
                });
            }
        }
        None
    }

    /// Mark an entry inactive. Does not reclaim the payload bytes (see
    /// DESIGN.md).
    pub fn erase(&self, name: &str) -> bool {
        let name_bytes = match encode_name(name) {
            Ok(n) => n,
            Err(_) => return false,
        };
        let count = self.entry_count() as usize;
        for entry in &self.entries[..count] {
            if entry.active.load(Ordering::Acquire) == 1 && entry.name == name_bytes {
                entry.active.store(0, Ordering::Release);
                return true;
            }
        }
        false
    }

    /// Number of currently active entries (holes excluded).
    pub fn count(&self) -> u32 {
        let count = self.entry_count() as usize;
        self.entries[..count]
            .iter()
            .filter(|e| e.active.load(Ordering::Acquire) == 1)
            .count() as u32
    }

    /// Iterate over all active entries' names and metadata.
    pub fn iter(&self) -> impl Iterator<Item = (String, EntryInfo)> + '_ {
        let count = self.entry_count() as usize;
        self.entries[..count].iter().filter_map(|entry| {
            if entry.active.load(Ordering::Acquire) != 1 {
                return None;
            }
            let name = decode_name(&entry.name);
            Some((
                name,
                EntryInfo {
                    offset: entry.offset,
                    size: entry.size,
                    elem_size: entry.elem_size,
                    num_elem: entry.num_elem,
                },
            ))
        })
    }
}

pub fn align_up(offset: u64, align: u64) -> u64 {
    (offset + align - 1) & !(align - 1)
}

fn encode_name(name: &str) -> Result<[u8; MAX_NAME_SIZE]> {
    let bytes = name.as_bytes();
    if bytes.len() >= MAX_NAME_SIZE {
        return Err(Error::NameTooLong(name.to_string(), MAX_NAME_SIZE - 1));
    }
    let mut buf = [0u8; MAX_NAME_SIZE];
    buf[..bytes.len()].copy_from_slice(bytes);
    Ok(buf)
}

fn decode_name(bytes: &[u8; MAX_NAME_SIZE]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}
