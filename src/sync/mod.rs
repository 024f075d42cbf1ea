//! Cross-process synchronization primitives (J), and the shared spin/
//! backoff discipline (K) they and the concurrent containers build on.

pub mod backoff;
mod futex;
pub mod barrier;
pub mod latch;
pub mod semaphore;

pub use backoff::Backoff;
pub use barrier::Barrier;
pub use latch::Latch;
pub use semaphore::Semaphore;
