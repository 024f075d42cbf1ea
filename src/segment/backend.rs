//! Segment backend — the host-facing edge of the crate.
//!
//! `shm_open`/`mmap`/`ftruncate`/`shm_unlink` are treated as external
//! collaborators: the core only ever consumes a pointer, a length, and a
//! permission to unlink. This module provides a real implementation of
//! that collaborator so the crate is testable end to end: a named POSIX
//! `shm_open` segment, so a second process can attach by name rather
//! than needing an inherited file descriptor.

use std::ffi::CString;
use std::io;
use std::os::unix::io::RawFd;
use std::ptr::NonNull;

/// Mapped-region backend, implemented by whatever host primitive the
/// platform offers. The core never calls into the host directly; it only
/// ever goes through this trait.
pub trait SegmentBackend: Send + Sync {
    /// Pointer to the first byte of the mapped region.
    fn as_ptr(&self) -> *mut u8;

    /// Size of the mapped region in bytes.
    fn len(&self) -> usize;

    /// Underlying OS handle, exposed for diagnostics/FFI.
    fn raw_fd(&self) -> RawFd;

    /// The name this segment was created or opened under, if any.
    fn name(&self) -> Option<&str>;
}

#[cfg(unix)]
pub struct PosixSegmentBackend {
    ptr: NonNull<u8>,
    len: usize,
    fd: RawFd,
    name: Option<String>,
}

#[cfg(unix)]
unsafe impl Send for PosixSegmentBackend {}
#[cfg(unix)]
unsafe impl Sync for PosixSegmentBackend {}

#[cfg(unix)]
impl PosixSegmentBackend {
    /// Create a brand-new named segment. Fails if a segment with this name
    /// already exists (`O_EXCL`), leaving the name available for a racing
    /// creator to win instead.
    pub fn create(name: &str, len: usize) -> io::Result<Self> {
        let c_name = cstring_for(name)?;
        let fd = unsafe {
            libc::shm_open(
                c_name.as_ptr(),
                libc::O_CREAT | libc::O_EXCL | libc::O_RDWR,
                0o666,
            )
        };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        if unsafe { libc::ftruncate(fd, len as libc::off_t) } != 0 {
            let err = io::Error::last_os_error();
            unsafe { libc::close(fd) };
            return Err(err);
        }
        Self::map(fd, len, Some(name.to_string()))
    }

    /// Attach to an existing named segment. `len` of 0 means "discover":
    /// the actual size is read back via `fstat`.
    pub fn open(name: &str, len: usize) -> io::Result<Self> {
        let c_name = cstring_for(name)?;
        let fd = unsafe { libc::shm_open(c_name.as_ptr(), libc::O_RDWR, 0o666) };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }

        let actual_len = if len == 0 {
            let mut stat: libc::stat = unsafe { std::mem::zeroed() };
            if unsafe { libc::fstat(fd, &mut stat) } != 0 {
                let err = io::Error::last_os_error();
                unsafe { libc::close(fd) };
                return Err(err);
            }
            stat.st_size as usize
        } else {
            len
        };

        Self::map(fd, actual_len, Some(name.to_string()))
    }

    /// Remove a named segment from the system. Does not affect processes
    /// that already have it mapped.
    pub fn unlink(name: &str) -> io::Result<()> {
        let c_name = cstring_for(name)?;
        if unsafe { libc::shm_unlink(c_name.as_ptr()) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn map(fd: RawFd, len: usize, name: Option<String>) -> io::Result<Self> {
        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd,
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            let err = io::Error::last_os_error();
            unsafe { libc::close(fd) };
            return Err(err);
        }

        log::debug!(
            "mapped shared memory segment {:?} ({} bytes) at {:p}",
            name,
            len,
            ptr
        );

        Ok(Self {
            ptr: NonNull::new(ptr as *mut u8).expect("mmap returned non-null success"),
            len,
            fd,
            name,
        })
    }
}

#[cfg(unix)]
fn cstring_for(name: &str) -> io::Result<CString> {
    CString::new(name)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))
}

#[cfg(unix)]
impl Drop for PosixSegmentBackend {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.ptr.as_ptr() as *mut libc::c_void, self.len);
            libc::close(self.fd);
        }
    }
}

#[cfg(unix)]
impl SegmentBackend for PosixSegmentBackend {
    fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    fn len(&self) -> usize {
        self.len
    }

    fn raw_fd(&self) -> RawFd {
        self.fd
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

#[cfg(not(unix))]
pub struct PosixSegmentBackend;

#[cfg(not(unix))]
impl PosixSegmentBackend {
    pub fn create(_name: &str, _len: usize) -> io::Result<Self> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "POSIX shared memory only supported on unix",
        ))
    }

    pub fn open(_name: &str, _len: usize) -> io::Result<Self> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "POSIX shared memory only supported on unix",
        ))
    }

    pub fn unlink(_name: &str) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "POSIX shared memory only supported on unix",
        ))
    }
}

/// A backend over a caller-provided region, for embedding in a host that
/// already did its own `mmap` (or for tests). Does not own the memory.
pub struct BorrowedSegmentBackend {
    ptr: *mut u8,
    len: usize,
}

unsafe impl Send for BorrowedSegmentBackend {}
unsafe impl Sync for BorrowedSegmentBackend {}

impl BorrowedSegmentBackend {
    /// # Safety
    /// `ptr` must be valid for reads and writes for `len` bytes for as
    /// long as this backend (and anything built on it) is alive.
    pub unsafe fn new(ptr: *mut u8, len: usize) -> Self {
        Self { ptr, len }
    }
}

impl SegmentBackend for BorrowedSegmentBackend {
    fn as_ptr(&self) -> *mut u8 {
        self.ptr
    }

    fn len(&self) -> usize {
        self.len
    }

    fn raw_fd(&self) -> RawFd {
        -1
    }

    fn name(&self) -> Option<&str> {
        None
    }
}
