//! Hot-path support: arena allocation, object pooling and the
//! lock-free performance monitor.

mod arena;
mod monitor;
mod pool;

pub use arena::{Arena, ArenaExhausted, CACHE_LINE_SIZE, DEFAULT_CHUNK_SIZE};
pub use monitor::{
    BUCKET_SIZE_NS, ComponentStats, MAX_TRACKED_NS, MAX_US_TRACKED_NS, NUM_BUCKETS,
    PerformanceMonitor, US_BUCKET_SIZE_NS,
};
pub use pool::ObjectPool;
