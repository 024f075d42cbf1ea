//! Error taxonomy shared by every component.
//!
//! Every fallible operation in this crate returns one of these variants
//! instead of panicking. By category:
//! setup errors (`NameTooLong` .. `ElementSizeMismatch`) are fatal for the
//! call that triggered them and never partially mutate the segment;
//! capacity/empty/timeout errors are routine and expected under
//! contention; `InvalidArgument`/`AlreadyExists` are programming errors
//! the caller can recover from; `Io` carries host-layer failures through
//! unchanged.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("name `{0}` exceeds the {1}-byte table name limit")]
    NameTooLong(String, usize),

    #[error("directory table is full ({0} entries)")]
    TableFull(usize),

    #[error("segment too small: need {needed} bytes, have {available}")]
    SegmentTooSmall { needed: u64, available: u64 },

    #[error("bad magic number: expected {expected:#x}, found {found:#x}")]
    BadMagic { expected: u32, found: u32 },

    #[error("version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },

    #[error("structure size mismatch: expected elem_size {expected}, found {found}")]
    ElementSizeMismatch { expected: u64, found: u64 },

    #[error("name `{0}` not found in directory table")]
    NotFound(String),

    #[error("name `{0}` already exists in directory table")]
    AlreadyExists(String),

    #[error("capacity exceeded")]
    CapacityExceeded,

    #[error("structure is full")]
    Full,

    #[error("structure is empty")]
    Empty,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("operation timed out")]
    Timeout,

    #[error("operation not supported on this platform")]
    Unsupported,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
