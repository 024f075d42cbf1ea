//! Shared test scaffolding: an in-process segment backed by a leaked
//! heap buffer, so structure tests don't race each other over POSIX
//! shared-memory names the way the cross-process scenarios in
//! `scenarios.rs` deliberately do.
#![allow(dead_code)]

use zeroipc::segment::{BorrowedSegmentBackend, Segment};
use std::sync::Arc;

pub fn make_segment(size: usize) -> Segment {
    let buf: &'static mut [u8] = vec![0u8; size].leak();
    let backend = unsafe { BorrowedSegmentBackend::new(buf.as_mut_ptr(), buf.len()) };
    Segment::create_over(Arc::new(backend)).expect("segment creation over a fresh buffer")
}
