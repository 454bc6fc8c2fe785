//! Lock-free latency histograms and per-component timers.
//!
//! The primary histogram covers `[0, 10 us)` in 100 ns buckets, the
//! secondary `[10 us, 110 us)` in 1 us buckets, with an overflow counter
//! above that. All recording is atomic with relaxed ordering; min/max
//! use CAS loops. Component timers sit behind a mutex that is entered
//! only on the (cold) named-component path.

use crossbeam::utils::CachePadded;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

/// Buckets in each histogram.
pub const NUM_BUCKETS: usize = 100;
/// Primary bucket width.
pub const BUCKET_SIZE_NS: u64 = 100;
/// Upper bound of the primary histogram (10 us).
pub const MAX_TRACKED_NS: u64 = NUM_BUCKETS as u64 * BUCKET_SIZE_NS;
/// Secondary bucket width (1 us).
pub const US_BUCKET_SIZE_NS: u64 = 1_000;
/// Upper bound of the secondary histogram (110 us).
pub const MAX_US_TRACKED_NS: u64 = MAX_TRACKED_NS + NUM_BUCKETS as u64 * US_BUCKET_SIZE_NS;

/// Per-component timing aggregate.
#[derive(Debug, Clone, Copy, Default)]
pub struct ComponentStats {
    /// Recorded samples.
    pub count: u64,
    /// Sum of recorded times.
    pub total_ns: u64,
    /// Largest recorded time.
    pub max_ns: u64,
}

impl ComponentStats {
    /// Mean recorded time; 0 with no samples.
    #[must_use]
    pub fn mean_ns(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total_ns as f64 / self.count as f64
        }
    }
}

/// Lock-free performance monitor.
pub struct PerformanceMonitor {
    name: String,
    histogram: Box<[AtomicU64; NUM_BUCKETS]>,
    us_histogram: Box<[AtomicU64; NUM_BUCKETS]>,
    overflow: CachePadded<AtomicU64>,
    events_processed: CachePadded<AtomicU64>,
    events_dropped: CachePadded<AtomicU64>,
    total_latency_ns: CachePadded<AtomicU64>,
    min_latency_ns: CachePadded<AtomicU64>,
    max_latency_ns: CachePadded<AtomicU64>,
    enabled: AtomicBool,
    start_time: Mutex<Instant>,
    components: Mutex<HashMap<String, ComponentStats>>,
}

fn zeroed_histogram() -> Box<[AtomicU64; NUM_BUCKETS]> {
    Box::new(std::array::from_fn(|_| AtomicU64::new(0)))
}

impl PerformanceMonitor {
    /// Monitor with a name for reporting.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            histogram: zeroed_histogram(),
            us_histogram: zeroed_histogram(),
            overflow: CachePadded::new(AtomicU64::new(0)),
            events_processed: CachePadded::new(AtomicU64::new(0)),
            events_dropped: CachePadded::new(AtomicU64::new(0)),
            total_latency_ns: CachePadded::new(AtomicU64::new(0)),
            min_latency_ns: CachePadded::new(AtomicU64::new(u64::MAX)),
            max_latency_ns: CachePadded::new(AtomicU64::new(0)),
            enabled: AtomicBool::new(true),
            start_time: Mutex::new(Instant::now()),
            components: Mutex::new(HashMap::new()),
        }
    }

    /// Monitor name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Enables or disables recording.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    /// Whether recording is on.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Records one event latency. Lock-free, O(1).
    pub fn record_event_latency(&self, latency_ns: u64) {
        if !self.is_enabled() {
            return;
        }
        self.events_processed.fetch_add(1, Ordering::Relaxed);
        self.total_latency_ns.fetch_add(latency_ns, Ordering::Relaxed);

        let mut current = self.min_latency_ns.load(Ordering::Relaxed);
        while latency_ns < current {
            match self.min_latency_ns.compare_exchange_weak(
                current,
                latency_ns,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }
        let mut current = self.max_latency_ns.load(Ordering::Relaxed);
        while latency_ns > current {
            match self.max_latency_ns.compare_exchange_weak(
                current,
                latency_ns,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }

        if latency_ns < MAX_TRACKED_NS {
            let bucket = (latency_ns / BUCKET_SIZE_NS) as usize;
            self.histogram[bucket].fetch_add(1, Ordering::Relaxed);
        } else if latency_ns < MAX_US_TRACKED_NS {
            let bucket = ((latency_ns - MAX_TRACKED_NS) / US_BUCKET_SIZE_NS) as usize;
            self.us_histogram[bucket].fetch_add(1, Ordering::Relaxed);
        } else {
            self.overflow.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Records a dropped event.
    pub fn record_dropped_event(&self) {
        if self.is_enabled() {
            self.events_dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Records time spent in a named component. Takes the component
    /// mutex; keep off latency-critical paths.
    pub fn record_component_time(&self, component: &str, time_ns: u64) {
        if !self.is_enabled() {
            return;
        }
        let mut components = self.components.lock().expect("component mutex");
        let stats = components.entry(component.to_string()).or_default();
        stats.count += 1;
        stats.total_ns += time_ns;
        stats.max_ns = stats.max_ns.max(time_ns);
    }

    /// Events recorded so far.
    #[must_use]
    pub fn events_processed(&self) -> u64 {
        self.events_processed.load(Ordering::Relaxed)
    }

    /// Dropped events recorded so far.
    #[must_use]
    pub fn events_dropped(&self) -> u64 {
        self.events_dropped.load(Ordering::Relaxed)
    }

    /// Latencies above the tracked range (more than 110 us).
    #[must_use]
    pub fn overflow_count(&self) -> u64 {
        self.overflow.load(Ordering::Relaxed)
    }

    /// Mean recorded latency; 0 with no events.
    #[must_use]
    pub fn mean_latency_ns(&self) -> f64 {
        let events = self.events_processed();
        if events == 0 {
            return 0.0;
        }
        self.total_latency_ns.load(Ordering::Relaxed) as f64 / events as f64
    }

    /// Smallest recorded latency; `None` with no events.
    #[must_use]
    pub fn min_latency_ns(&self) -> Option<u64> {
        let min = self.min_latency_ns.load(Ordering::Relaxed);
        if min == u64::MAX { None } else { Some(min) }
    }

    /// Largest recorded latency.
    #[must_use]
    pub fn max_latency_ns(&self) -> u64 {
        self.max_latency_ns.load(Ordering::Relaxed)
    }

    /// Latency percentile (`p` in `[0, 1]`): walks cumulative counts
    /// across both histograms and returns the matching bucket's
    /// midpoint. Overflow samples report the recorded maximum.
    #[must_use]
    pub fn percentile_ns(&self, p: f64) -> u64 {
        let total = self.events_processed();
        if total == 0 {
            return 0;
        }
        let target = (p.clamp(0.0, 1.0) * total as f64).ceil().max(1.0) as u64;
        let mut cumulative = 0u64;

        for (i, bucket) in self.histogram.iter().enumerate() {
            cumulative += bucket.load(Ordering::Relaxed);
            if cumulative >= target {
                return i as u64 * BUCKET_SIZE_NS + BUCKET_SIZE_NS / 2;
            }
        }
        for (i, bucket) in self.us_histogram.iter().enumerate() {
            cumulative += bucket.load(Ordering::Relaxed);
            if cumulative >= target {
                return MAX_TRACKED_NS + i as u64 * US_BUCKET_SIZE_NS + US_BUCKET_SIZE_NS / 2;
            }
        }
        self.max_latency_ns()
    }

    /// Events per second since construction or the last reset.
    #[must_use]
    pub fn throughput_per_sec(&self) -> f64 {
        let elapsed_ns = self
            .start_time
            .lock()
            .expect("start-time mutex")
            .elapsed()
            .as_nanos() as u64;
        if elapsed_ns == 0 {
            return 0.0;
        }
        self.events_processed() as f64 * 1e9 / elapsed_ns as f64
    }

    /// Snapshot of one component's stats.
    #[must_use]
    pub fn component_stats(&self, component: &str) -> Option<ComponentStats> {
        self.components
            .lock()
            .expect("component mutex")
            .get(component)
            .copied()
    }

    /// Snapshot of all component stats.
    #[must_use]
    pub fn all_component_stats(&self) -> Vec<(String, ComponentStats)> {
        self.components
            .lock()
            .expect("component mutex")
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect()
    }

    /// Resets every counter, histogram and component.
    pub fn reset(&self) {
        for bucket in self.histogram.iter().chain(self.us_histogram.iter()) {
            bucket.store(0, Ordering::Relaxed);
        }
        self.overflow.store(0, Ordering::Relaxed);
        self.events_processed.store(0, Ordering::Relaxed);
        self.events_dropped.store(0, Ordering::Relaxed);
        self.total_latency_ns.store(0, Ordering::Relaxed);
        self.min_latency_ns.store(u64::MAX, Ordering::Relaxed);
        self.max_latency_ns.store(0, Ordering::Relaxed);
        *self.start_time.lock().expect("start-time mutex") = Instant::now();
        self.components.lock().expect("component mutex").clear();
    }
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new("default")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn records_basic_statistics() {
        let monitor = PerformanceMonitor::new("test");
        for latency in [100, 200, 300, 400, 500] {
            monitor.record_event_latency(latency);
        }
        assert_eq!(monitor.events_processed(), 5);
        assert_eq!(monitor.mean_latency_ns(), 300.0);
        assert_eq!(monitor.min_latency_ns(), Some(100));
        assert_eq!(monitor.max_latency_ns(), 500);
    }

    #[test]
    fn histogram_bucketing() {
        let monitor = PerformanceMonitor::new("test");
        // 250 ns lands in the primary histogram, 50 us in the
        // secondary, 500 us overflows.
        monitor.record_event_latency(250);
        monitor.record_event_latency(50_000);
        monitor.record_event_latency(500_000);
        assert_eq!(monitor.events_processed(), 3);
        assert_eq!(monitor.max_latency_ns(), 500_000);
        // p33 should be the primary bucket midpoint.
        assert_eq!(monitor.percentile_ns(0.3), 250);
    }

    #[test]
    fn percentiles_return_bucket_midpoints() {
        let monitor = PerformanceMonitor::new("test");
        for _ in 0..90 {
            monitor.record_event_latency(150); // bucket [100, 200)
        }
        for _ in 0..10 {
            monitor.record_event_latency(5_050); // bucket [5000, 5100)
        }
        assert_eq!(monitor.percentile_ns(0.5), 150);
        assert_eq!(monitor.percentile_ns(0.99), 5_050);
    }

    #[test]
    fn percentile_in_overflow_reports_max() {
        let monitor = PerformanceMonitor::new("test");
        monitor.record_event_latency(1_000_000);
        assert_eq!(monitor.percentile_ns(0.99), 1_000_000);
    }

    #[test]
    fn disabled_monitor_records_nothing() {
        let monitor = PerformanceMonitor::new("test");
        monitor.set_enabled(false);
        monitor.record_event_latency(100);
        monitor.record_dropped_event();
        monitor.record_component_time("x", 100);
        assert_eq!(monitor.events_processed(), 0);
        assert_eq!(monitor.events_dropped(), 0);
        assert!(monitor.component_stats("x").is_none());
    }

    #[test]
    fn component_timers_aggregate() {
        let monitor = PerformanceMonitor::new("test");
        monitor.record_component_time("parse", 100);
        monitor.record_component_time("parse", 300);
        monitor.record_component_time("match", 50);

        let parse = monitor.component_stats("parse").unwrap();
        assert_eq!(parse.count, 2);
        assert_eq!(parse.total_ns, 400);
        assert_eq!(parse.max_ns, 300);
        assert_eq!(parse.mean_ns(), 200.0);
        assert_eq!(monitor.all_component_stats().len(), 2);
    }

    #[test]
    fn reset_clears_all_state() {
        let monitor = PerformanceMonitor::new("test");
        monitor.record_event_latency(100);
        monitor.record_component_time("x", 10);
        monitor.reset();
        assert_eq!(monitor.events_processed(), 0);
        assert_eq!(monitor.min_latency_ns(), None);
        assert_eq!(monitor.percentile_ns(0.5), 0);
        assert!(monitor.all_component_stats().is_empty());
    }

    #[test]
    fn concurrent_recording_is_consistent() {
        let monitor = Arc::new(PerformanceMonitor::new("test"));
        let mut handles = Vec::new();
        for t in 0..4u64 {
            let m = Arc::clone(&monitor);
            handles.push(std::thread::spawn(move || {
                for i in 0..10_000u64 {
                    m.record_event_latency(t * 100 + i % 100);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(monitor.events_processed(), 40_000);
        assert!(monitor.throughput_per_sec() > 0.0);
        assert!(monitor.max_latency_ns() < MAX_TRACKED_NS);
    }
}
