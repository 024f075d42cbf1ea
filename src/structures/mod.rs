//! Concurrent data structures over a shared-memory `Segment`. Each
//! structure owns a header and payload region allocated through
//! `Segment::allocate` and looked up by name through the directory
//! table.

pub mod array;
pub mod bitset;
pub mod map;
pub mod pool;
pub mod queue;
pub mod ring;
pub mod stack;

pub use array::Array;
pub use bitset::Bitset;
pub use map::{Map, Set, SetExt};
pub use pool::{Handle, Pool};
pub use queue::Queue;
pub use ring::Ring;
pub use stack::Stack;
