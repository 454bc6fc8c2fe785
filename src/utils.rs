//! Clock utilities shared across the engine.
//!
//! Ordering and latency measurements use a monotonic clock anchored at the
//! first call in the process; wall-clock time is used only for snapshot
//! metadata. The two are never mixed.

use std::sync::OnceLock;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

static MONO_EPOCH: OnceLock<Instant> = OnceLock::new();

/// Nanoseconds elapsed since the process-local monotonic epoch.
///
/// The epoch is pinned on first use, so values are comparable within a
/// process but carry no meaning across processes.
#[inline]
pub fn monotonic_nanos() -> u64 {
    let epoch = *MONO_EPOCH.get_or_init(Instant::now);
    Instant::now().duration_since(epoch).as_nanos() as u64
}

/// Current wall-clock time in milliseconds since the Unix epoch.
///
/// Used for snapshot metadata only; never for ordering.
#[inline]
pub fn current_time_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
