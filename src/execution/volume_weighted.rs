//! Volume-weighted execution: slice sizes follow an intraday volume
//! profile instead of the clock alone.
//!
//! Weights are precomputed at construction, normalized to sum to one,
//! and turned into per-slice sizes with the rounding remainder spread
//! over the leading slices. Slice timing mirrors the time-sliced
//! schedule; optionally the per-slice size is blended with observed
//! real-time volume at a target participation rate.

use super::algorithm::{ExecutionAlgorithm, ExecutionCore, MarketSnapshot, SliceSchedule};
use crate::orderbook::Order;
use std::time::Duration;
use tracing::warn;

/// Intraday volume profile shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum VolumeProfile {
    /// Equal volume per slice (degenerates to time-sliced).
    Uniform,
    /// Heavy at open and close, light midday.
    UShaped,
    /// Front-loaded, exponentially decaying.
    MorningWeighted,
    /// Back-loaded, exponentially growing.
    AfternoonWeighted,
    /// Caller-provided weights (normalized; padded/truncated weights are
    /// rejected).
    Custom(Vec<f64>),
}

/// Volume-weighted execution schedule.
pub struct VolumeWeighted {
    core: ExecutionCore,
    schedule: SliceSchedule,
    profile: VolumeProfile,
    weights: Vec<f64>,
    slice_sizes: Vec<u64>,
    use_real_time_volume: bool,
    participation_rate: f64,
    last_market_volume: u64,
}

impl VolumeWeighted {
    /// Schedule `target_quantity` over `duration` in `num_slices`
    /// slices shaped by `profile`.
    #[must_use]
    pub fn new(
        target_quantity: u64,
        duration: Duration,
        num_slices: usize,
        profile: VolumeProfile,
        is_buy: bool,
    ) -> Self {
        let schedule = SliceSchedule::new(duration, num_slices);
        let weights = build_weights(&profile, schedule.num_slices);
        let slice_sizes = compute_slice_sizes(target_quantity, &weights);
        Self {
            core: ExecutionCore::new("volume-weighted", target_quantity, is_buy),
            schedule,
            profile,
            weights,
            slice_sizes,
            use_real_time_volume: false,
            participation_rate: 0.1,
            last_market_volume: 0,
        }
    }

    /// Replaces the profile with caller-provided weights. A weight
    /// vector of the wrong length is rejected and the previous profile
    /// kept.
    pub fn set_custom_weights(&mut self, weights: Vec<f64>) {
        if weights.len() != self.schedule.num_slices {
            warn!(
                expected = self.schedule.num_slices,
                got = weights.len(),
                "custom weight count mismatch; keeping current profile"
            );
            return;
        }
        self.profile = VolumeProfile::Custom(weights.clone());
        self.weights = normalize(weights);
        self.slice_sizes = compute_slice_sizes(self.core.target_quantity, &self.weights);
    }

    /// Blends the profile with observed market volume at a target
    /// participation rate (clamped to `[0.01, 0.5]`).
    pub fn set_real_time_volume(&mut self, enable: bool, participation_rate: f64) {
        self.use_real_time_volume = enable;
        self.participation_rate = participation_rate.clamp(0.01, 0.5);
    }

    /// Emit limit orders at `offset_bps` through the touch.
    pub fn set_use_limit_orders(&mut self, use_limit: bool, offset_bps: f64) {
        self.core.use_limit_orders = use_limit;
        self.core.limit_offset_bps = offset_bps;
    }

    /// The active profile.
    #[must_use]
    pub fn profile(&self) -> &VolumeProfile {
        &self.profile
    }

    /// Normalized per-slice weights.
    #[must_use]
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Precomputed per-slice sizes.
    #[must_use]
    pub fn slice_sizes(&self) -> &[u64] {
        &self.slice_sizes
    }

    /// Index of the next slice.
    #[must_use]
    pub fn current_slice(&self) -> usize {
        self.schedule.current_slice
    }

    fn calculate_slice_size(&self, data: &MarketSnapshot) -> u64 {
        let remaining = self.core.remaining_quantity();
        if remaining == 0 {
            return 0;
        }
        if self.schedule.is_last_slice() {
            return remaining;
        }
        let mut base = self.slice_sizes[self.schedule.current_slice];

        if self.use_real_time_volume && data.total_volume > self.last_market_volume {
            let interval_volume = data.total_volume - self.last_market_volume;
            if interval_volume > 0 {
                let target_slice = (interval_volume as f64 * self.participation_rate) as u64;
                base = (0.7 * target_slice as f64 + 0.3 * base as f64) as u64;
            }
        }
        base.min(remaining)
    }
}

impl ExecutionAlgorithm for VolumeWeighted {
    fn core(&self) -> &ExecutionCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ExecutionCore {
        &mut self.core
    }

    fn compute_child_orders(&mut self, data: &MarketSnapshot) -> Vec<Order> {
        if !self.schedule.is_time_for_slice(data.timestamp_ns) {
            return Vec::new();
        }
        let size = self.calculate_slice_size(data);
        if size == 0 {
            return Vec::new();
        }
        self.schedule.advance(data.timestamp_ns);
        if data.total_volume > 0 {
            self.last_market_volume = data.total_volume;
        }
        vec![self.core.slice_order(data, size)]
    }

    fn reset(&mut self) {
        self.core.reset();
        self.schedule.reset();
        self.last_market_volume = 0;
    }
}

fn normalize(mut weights: Vec<f64>) -> Vec<f64> {
    let sum: f64 = weights.iter().sum();
    if sum > 0.0 {
        for w in &mut weights {
            *w /= sum;
        }
    }
    weights
}

fn build_weights(profile: &VolumeProfile, num_slices: usize) -> Vec<f64> {
    let n = num_slices as f64;
    let raw: Vec<f64> = match profile {
        VolumeProfile::Uniform => vec![1.0 / n; num_slices],
        VolumeProfile::UShaped => (0..num_slices)
            .map(|i| {
                let t = if num_slices > 1 {
                    i as f64 / (num_slices - 1) as f64
                } else {
                    0.5
                };
                1.0 + 2.0 * (t - 0.5).powi(2)
            })
            .collect(),
        VolumeProfile::MorningWeighted => (0..num_slices)
            .map(|i| (-2.0 * i as f64 / n).exp())
            .collect(),
        VolumeProfile::AfternoonWeighted => (0..num_slices)
            .map(|i| (2.0 * (i as f64 / n - 1.0)).exp())
            .collect(),
        VolumeProfile::Custom(weights) => {
            if weights.len() == num_slices {
                weights.clone()
            } else {
                warn!(
                    expected = num_slices,
                    got = weights.len(),
                    "custom weight count mismatch; falling back to uniform"
                );
                vec![1.0 / n; num_slices]
            }
        }
    };
    normalize(raw)
}

fn compute_slice_sizes(target: u64, weights: &[f64]) -> Vec<u64> {
    let mut sizes: Vec<u64> = weights
        .iter()
        .map(|w| (target as f64 * w).round() as u64)
        .collect();
    let mut allocated: u64 = sizes.iter().sum();

    // Spread the rounding remainder over the leading slices.
    let mut i = 0;
    let len = sizes.len();
    while allocated < target {
        sizes[i % len] += 1;
        allocated += 1;
        i += 1;
    }
    let mut i = 0;
    while allocated > target {
        let idx = i % sizes.len();
        if sizes[idx] > 0 {
            sizes[idx] -= 1;
            allocated -= 1;
        }
        i += 1;
    }
    sizes
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const MS: u64 = 1_000_000;

    fn snapshot(price: f64, ts_ms: u64, volume: u64) -> MarketSnapshot {
        MarketSnapshot::from_price(price, volume, ts_ms * MS)
    }

    #[test]
    fn weights_normalize_to_one() {
        for profile in [
            VolumeProfile::Uniform,
            VolumeProfile::UShaped,
            VolumeProfile::MorningWeighted,
            VolumeProfile::AfternoonWeighted,
        ] {
            let algo =
                VolumeWeighted::new(1000, Duration::from_secs(10), 10, profile.clone(), true);
            let sum: f64 = algo.weights().iter().sum();
            assert_relative_eq!(sum, 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn u_shape_is_symmetric_and_heaviest_at_edges() {
        let algo = VolumeWeighted::new(
            1000,
            Duration::from_secs(10),
            9,
            VolumeProfile::UShaped,
            true,
        );
        let w = algo.weights();
        assert_relative_eq!(w[0], w[8], epsilon = 1e-12);
        assert!(w[0] > w[4]);
    }

    #[test]
    fn morning_profile_is_front_loaded() {
        let algo = VolumeWeighted::new(
            1000,
            Duration::from_secs(10),
            5,
            VolumeProfile::MorningWeighted,
            true,
        );
        let w = algo.weights();
        assert!(w.windows(2).all(|p| p[0] > p[1]));

        let algo = VolumeWeighted::new(
            1000,
            Duration::from_secs(10),
            5,
            VolumeProfile::AfternoonWeighted,
            true,
        );
        assert!(algo.weights().windows(2).all(|p| p[0] < p[1]));
    }

    #[test]
    fn slice_sizes_sum_to_target() {
        for target in [997u64, 1000, 1003, 10] {
            let algo = VolumeWeighted::new(
                target,
                Duration::from_secs(10),
                7,
                VolumeProfile::UShaped,
                true,
            );
            assert_eq!(algo.slice_sizes().iter().sum::<u64>(), target);
        }
    }

    #[test]
    fn custom_weights_are_normalized() {
        let mut algo = VolumeWeighted::new(
            100,
            Duration::from_secs(4),
            4,
            VolumeProfile::Uniform,
            true,
        );
        algo.set_custom_weights(vec![2.0, 1.0, 1.0, 4.0]);
        assert_relative_eq!(algo.weights()[0], 0.25, epsilon = 1e-12);
        assert_relative_eq!(algo.weights()[3], 0.5, epsilon = 1e-12);
        // round() over-allocates by one here; the excess comes off the
        // leading slice.
        assert_eq!(algo.slice_sizes(), &[24, 13, 13, 50]);
        assert!(matches!(algo.profile(), VolumeProfile::Custom(_)));
    }

    #[test]
    fn mismatched_custom_weights_are_rejected() {
        let mut algo = VolumeWeighted::new(
            100,
            Duration::from_secs(4),
            4,
            VolumeProfile::Uniform,
            true,
        );
        let before = algo.weights().to_vec();
        algo.set_custom_weights(vec![1.0, 2.0]);
        assert_eq!(algo.weights(), before.as_slice());
        assert_eq!(*algo.profile(), VolumeProfile::Uniform);
    }

    #[test]
    fn emits_profile_sized_slices() {
        let mut algo = VolumeWeighted::new(
            1000,
            Duration::from_millis(500),
            5,
            VolumeProfile::Uniform,
            true,
        );
        let expected = algo.slice_sizes().to_vec();
        let mut emitted = Vec::new();
        let mut fill_id = 0;
        for step in 0..5u64 {
            let ts = step * 110;
            for order in algo.on_market_data(&snapshot(100.0, ts, 0)) {
                emitted.push(order.quantity);
                fill_id += 1;
                algo.on_fill(&crate::orderbook::Fill::new(
                    order.id, fill_id, 100.0, order.quantity, ts * MS,
                ));
            }
        }
        assert_eq!(emitted, expected);
        assert!(algo.core().is_complete());
    }

    #[test]
    fn real_time_volume_blend() {
        let mut algo = VolumeWeighted::new(
            1000,
            Duration::from_millis(500),
            5,
            VolumeProfile::Uniform,
            true,
        );
        algo.set_real_time_volume(true, 0.2);

        // First slice: cumulative volume 10_000 observed, but
        // last_market_volume starts at 0, so interval volume blends in.
        let orders = algo.on_market_data(&snapshot(100.0, 0, 10_000));
        // 0.7 * (10_000 * 0.2) + 0.3 * 200 = 1400 + 60, capped by remaining.
        assert_eq!(orders[0].quantity, 1000.min(1460));

        let mut algo = VolumeWeighted::new(
            1000,
            Duration::from_millis(500),
            5,
            VolumeProfile::Uniform,
            true,
        );
        algo.set_real_time_volume(true, 0.2);
        // Quiet market: interval volume 100 -> 0.7*20 + 0.3*200 = 74.
        let orders = algo.on_market_data(&snapshot(100.0, 0, 100));
        assert_eq!(orders[0].quantity, 74);
    }

    #[test]
    fn participation_rate_is_clamped() {
        let mut algo = VolumeWeighted::new(
            100,
            Duration::from_secs(1),
            2,
            VolumeProfile::Uniform,
            true,
        );
        algo.set_real_time_volume(true, 0.9);
        assert_relative_eq!(algo.participation_rate, 0.5);
        algo.set_real_time_volume(true, 0.0001);
        assert_relative_eq!(algo.participation_rate, 0.01);
    }
}
