//! `zeroipc` — lock-free concurrent data structures and synchronization
//! primitives over a POSIX shared-memory segment.
//!
//! Producer and consumer processes, potentially written in different
//! languages, attach to the same named segment, discover previously
//! created structures by name through a self-describing directory table,
//! and operate on them without copying, marshalling, or kernel round
//! trips. This crate is the wire-level core: the segment layout, the
//! directory table, the concurrent containers, and the synchronization
//! primitives. The shared-memory host (`shm_open`/`mmap`) is implemented
//! at the edge (`segment::backend`) so the crate is testable end to end,
//! but callers are free to hand in their own mapped region instead.
//!
//! All element types stored in these containers must be `Copy` and have
//! a size known at compile time ("trivially copyable"); no pointer-
//! bearing or resource-owning type may be stored.

pub mod error;
pub mod segment;
pub mod structures;
pub mod sync;
pub mod debug;
pub mod ffi;

pub use error::{Error, Result};
pub use segment::{Segment, SegmentBuilder};
