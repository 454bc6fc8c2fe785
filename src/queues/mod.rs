//! Lock-free bounded rings for inter-stage hand-off.
//!
//! Both rings round their capacity up to a power of two and keep
//! producer and consumer cursors on separate cache lines. They signal
//! full/empty conditions instead of blocking, and never allocate after
//! construction.

mod spmc;
mod spsc;

pub use spmc::SpmcQueue;
pub use spsc::SpscQueue;
