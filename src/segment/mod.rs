pub mod backend;
pub mod segment;
pub mod table;

pub use backend::{BorrowedSegmentBackend, PosixSegmentBackend, SegmentBackend};
pub use segment::{Segment, SegmentBuilder};
pub use table::EntryInfo;
