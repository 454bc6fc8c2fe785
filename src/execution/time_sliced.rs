//! Time-sliced execution: equal time intervals, equal slice sizes.
//!
//! The simplest schedule and the benchmark for the others: divide the
//! target into `num_slices` slices and emit one per interval regardless
//! of market conditions. The catch-up variant grows a slice when
//! execution has fallen behind the pro-rata schedule.

use super::algorithm::{ExecutionAlgorithm, ExecutionCore, MarketSnapshot, SliceSchedule};
use crate::orderbook::Order;
use std::time::Duration;

/// Equal-interval, equal-size execution schedule.
pub struct TimeSliced {
    core: ExecutionCore,
    schedule: SliceSchedule,
    perturb_sizes: bool,
    min_slice_pct: f64,
    max_slice_pct: f64,
}

impl TimeSliced {
    /// Schedule `target_quantity` over `duration` in `num_slices`
    /// slices.
    #[must_use]
    pub fn new(target_quantity: u64, duration: Duration, num_slices: usize, is_buy: bool) -> Self {
        Self {
            core: ExecutionCore::new("time-sliced", target_quantity, is_buy),
            schedule: SliceSchedule::new(duration, num_slices),
            perturb_sizes: false,
            min_slice_pct: 0.5,
            max_slice_pct: 1.5,
        }
    }

    /// Emit limit orders at `offset_bps` through the touch instead of
    /// market orders.
    pub fn set_use_limit_orders(&mut self, use_limit: bool, offset_bps: f64) {
        self.core.use_limit_orders = use_limit;
        self.core.limit_offset_bps = offset_bps;
    }

    /// Perturbs slice sizes by a deterministic factor in
    /// `[min_pct, max_pct]` derived from the slice index, to avoid a
    /// perfectly regular footprint.
    pub fn set_size_perturbation(&mut self, enable: bool, min_pct: f64, max_pct: f64) {
        self.perturb_sizes = enable;
        self.min_slice_pct = min_pct;
        self.max_slice_pct = max_pct;
    }

    /// Number of slices.
    #[must_use]
    pub fn num_slices(&self) -> usize {
        self.schedule.num_slices
    }

    /// Index of the next slice to emit.
    #[must_use]
    pub fn current_slice(&self) -> usize {
        self.schedule.current_slice
    }

    /// Interval between slices.
    #[must_use]
    pub fn slice_interval(&self) -> Duration {
        Duration::from_nanos(self.schedule.slice_interval_ns)
    }

    /// Total schedule duration.
    #[must_use]
    pub fn duration(&self) -> Duration {
        Duration::from_nanos(self.schedule.duration_ns)
    }

    /// Nominal per-slice size before perturbation and remainders.
    #[must_use]
    pub fn base_slice_size(&self) -> u64 {
        self.core.target_quantity / self.schedule.num_slices as u64
    }

    fn calculate_slice_size(&self) -> u64 {
        let remaining = self.core.remaining_quantity();
        if remaining == 0 {
            return 0;
        }
        // The last slice sweeps everything left.
        if self.schedule.is_last_slice() {
            return remaining;
        }
        let mut base = remaining / self.schedule.slices_remaining() as u64;
        if self.perturb_sizes && base > 0 {
            let factor = self.min_slice_pct
                + (self.max_slice_pct - self.min_slice_pct)
                    * ((self.schedule.current_slice % 7) as f64 / 6.0);
            base = (base as f64 * factor) as u64;
        }
        base.min(remaining)
    }
}

impl ExecutionAlgorithm for TimeSliced {
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
        let size = self.calculate_slice_size();
        if size == 0 {
            return Vec::new();
        }
        self.schedule.advance(data.timestamp_ns);
        vec![self.core.slice_order(data, size)]
    }

    fn reset(&mut self) {
        self.core.reset();
        self.schedule.reset();
    }
}

/// Time-sliced variant that catches up when behind the pro-rata
/// schedule: the next slice is grown by up to
/// `(max_catchup_multiplier - 1) x base_slice`, capped at the
/// remaining quantity.
pub struct AggressiveTimeSliced {
    inner: TimeSliced,
    max_catchup_multiplier: f64,
}

impl AggressiveTimeSliced {
    /// Catch-up schedule with the default 2x multiplier.
    #[must_use]
    pub fn new(target_quantity: u64, duration: Duration, num_slices: usize, is_buy: bool) -> Self {
        let mut inner = TimeSliced::new(target_quantity, duration, num_slices, is_buy);
        inner.core = ExecutionCore::new("aggressive-time-sliced", target_quantity, is_buy);
        Self {
            inner,
            max_catchup_multiplier: 2.0,
        }
    }

    /// Caps the catch-up growth factor.
    pub fn set_max_catchup_multiplier(&mut self, multiplier: f64) {
        self.max_catchup_multiplier = multiplier.max(1.0);
    }

    /// Emit limit orders instead of market orders.
    pub fn set_use_limit_orders(&mut self, use_limit: bool, offset_bps: f64) {
        self.inner.set_use_limit_orders(use_limit, offset_bps);
    }
}

impl ExecutionAlgorithm for AggressiveTimeSliced {
    fn core(&self) -> &ExecutionCore {
        self.inner.core()
    }

    fn core_mut(&mut self) -> &mut ExecutionCore {
        self.inner.core_mut()
    }

    fn compute_child_orders(&mut self, data: &MarketSnapshot) -> Vec<Order> {
        let mut orders = self.inner.compute_child_orders(data);
        if orders.is_empty() {
            return orders;
        }

        let core = self.inner.core();
        let elapsed = data.timestamp_ns.saturating_sub(core.start_time_ns);
        let expected_progress = if self.inner.schedule.duration_ns == 0 {
            1.0
        } else {
            (elapsed as f64 / self.inner.schedule.duration_ns as f64).min(1.0)
        };
        let expected_executed = (core.target_quantity as f64 * expected_progress) as u64;

        if core.executed_quantity < expected_executed {
            let shortfall = expected_executed - core.executed_quantity;
            let base = self.inner.base_slice_size();
            let additional = shortfall
                .min((base as f64 * (self.max_catchup_multiplier - 1.0)) as u64);
            if additional > 0 {
                let order = &mut orders[0];
                let new_qty = core.clamp_to_remaining(order.quantity + additional);
                order.quantity = new_qty;
                order.remaining_qty = new_qty;
                order.display_qty = new_qty;
            }
        }
        orders
    }

    fn reset(&mut self) {
        self.inner.reset();
    }
}
