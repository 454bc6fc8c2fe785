//! Risk-aware optimal execution (Almgren-Chriss).
//!
//! Balances temporary market-impact cost against timing risk: the
//! closed-form optimal trajectory of remaining holdings is
//! `x_i = sinh(k * (T - t_i)) / sinh(k * T)` with urgency
//! `k = sqrt(lambda * sigma^2 / (eta / ADV))`. Higher risk aversion or
//! volatility front-loads the schedule; a degenerate `sinh` falls back
//! to the linear trajectory. Slice timing mirrors the time-sliced
//! schedule; only the size profile differs.
//!
//! Reference: Almgren & Chriss (2000), "Optimal execution of portfolio
//! transactions".

use super::algorithm::{ExecutionAlgorithm, ExecutionCore, MarketSnapshot, SliceSchedule};
use crate::analytics::MarketImpactModel;
use crate::orderbook::Order;
use std::time::Duration;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Almgren-Chriss execution schedule.
pub struct RiskAware {
    core: ExecutionCore,
    schedule: SliceSchedule,
    risk_aversion: f64,
    permanent_impact: f64,
    temporary_impact: f64,
    volatility: f64,
    adv: f64,
    trajectory: Vec<f64>,
    slice_sizes: Vec<u64>,
    trajectory_computed: bool,
}

impl RiskAware {
    /// Schedule with default model parameters (`lambda` 1e-6, `gamma`
    /// 0.1, `eta` 0.01, `sigma` 2% daily, ADV 1M).
    #[must_use]
    pub fn new(target_quantity: u64, duration: Duration, num_slices: usize, is_buy: bool) -> Self {
        Self {
            core: ExecutionCore::new("risk-aware", target_quantity, is_buy),
            schedule: SliceSchedule::new(duration, num_slices),
            risk_aversion: 1e-6,
            permanent_impact: 0.1,
            temporary_impact: 0.01,
            volatility: 0.02,
            adv: 1_000_000.0,
            trajectory: Vec::new(),
            slice_sizes: Vec::new(),
            trajectory_computed: false,
        }
    }

    /// Schedule seeded from a calibrated impact model.
    #[must_use]
    pub fn with_impact_model(
        target_quantity: u64,
        duration: Duration,
        num_slices: usize,
        model: &MarketImpactModel,
        is_buy: bool,
    ) -> Self {
        let mut this = Self::new(target_quantity, duration, num_slices, is_buy);
        this.permanent_impact = model.params().permanent_coeff;
        this.temporary_impact = model.params().temporary_coeff;
        this.adv = model.default_adv() as f64;
        this
    }

    /// Sets the impact parameters; invalidates the trajectory.
    pub fn set_market_impact(&mut self, permanent: f64, temporary: f64, adv: f64) {
        self.permanent_impact = permanent;
        self.temporary_impact = temporary;
        self.adv = adv;
        self.trajectory_computed = false;
    }

    /// Sets risk aversion (floored at 1e-10); invalidates the
    /// trajectory. Typical range 1e-8 (aggressive) to 1e-4
    /// (conservative).
    pub fn set_risk_aversion(&mut self, lambda: f64) {
        self.risk_aversion = lambda.max(1e-10);
        self.trajectory_computed = false;
    }

    /// Sets daily volatility (floored at 0.001); invalidates the
    /// trajectory.
    pub fn set_volatility(&mut self, sigma: f64) {
        self.volatility = sigma.max(0.001);
        self.trajectory_computed = false;
    }

    /// Emit limit orders at `offset_bps` through the touch.
    pub fn set_use_limit_orders(&mut self, use_limit: bool, offset_bps: f64) {
        self.core.use_limit_orders = use_limit;
        self.core.limit_offset_bps = offset_bps;
    }

    /// The optimal holdings trajectory `x_0..=x_N` (computed lazily).
    pub fn trajectory(&mut self) -> &[f64] {
        self.ensure_trajectory();
        &self.trajectory
    }

    /// Per-slice sizes derived from the trajectory.
    pub fn slice_sizes(&mut self) -> &[u64] {
        self.ensure_trajectory();
        &self.slice_sizes
    }

    fn duration_days(&self) -> f64 {
        self.schedule.duration_ns as f64 / 1e9 / SECONDS_PER_DAY
    }

    fn ensure_trajectory(&mut self) {
        if self.trajectory_computed {
            return;
        }
        let n = self.schedule.num_slices;
        let tau = self.duration_days();
        let dt = tau / n as f64;

        let kappa_tilde =
            (self.risk_aversion * self.volatility * self.volatility
                / (self.temporary_impact / self.adv))
                .sqrt();
        let sinh_term = (kappa_tilde * tau).sinh();

        self.trajectory.clear();
        for i in 0..=n {
            let time_remaining = tau - i as f64 * dt;
            let x = if sinh_term > 0.0 {
                (kappa_tilde * time_remaining).sinh() / sinh_term
            } else {
                time_remaining / tau
            };
            self.trajectory.push(x);
        }

        let target = self.core.target_quantity;
        self.slice_sizes.clear();
        let mut allocated: u64 = 0;
        for i in 0..n {
            let fraction = self.trajectory[i] - self.trajectory[i + 1];
            let size = (target as f64 * fraction).round() as u64;
            allocated += size;
            self.slice_sizes.push(size);
        }

        // Rounding remainder goes to the first slice; excess comes off
        // the largest.
        if allocated < target {
            self.slice_sizes[0] += target - allocated;
        } else if allocated > target {
            let excess = allocated - target;
            if let Some(largest) = self.slice_sizes.iter_mut().max() {
                *largest = largest.saturating_sub(excess);
            }
        }
        self.trajectory_computed = true;
    }

    /// Expected execution cost of the schedule in basis points:
    /// permanent impact, temporary impact and the risk term.
    pub fn expected_cost_bps(&mut self) -> f64 {
        self.ensure_trajectory();
        let x = self.core.target_quantity as f64;
        let n = self.schedule.num_slices as f64;
        let tau = self.duration_days();

        let permanent = self.permanent_impact * x / self.adv;
        let temporary: f64 = self.temporary_impact
            * self
                .slice_sizes
                .iter()
                .map(|&size| {
                    let p = size as f64 / self.adv;
                    p * p
                })
                .sum::<f64>();
        let risk = 0.5 * self.risk_aversion * self.volatility * self.volatility * x * x * tau
            / (n * self.adv * self.adv);

        (permanent + temporary + risk) * 10_000.0
    }
}

impl ExecutionAlgorithm for RiskAware {
    fn core(&self) -> &ExecutionCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ExecutionCore {
        &mut self.core
    }

    fn compute_child_orders(&mut self, data: &MarketSnapshot) -> Vec<Order> {
        self.ensure_trajectory();
        if !self.schedule.is_time_for_slice(data.timestamp_ns) {
            return Vec::new();
        }
        let remaining = self.core.remaining_quantity();
        if remaining == 0 {
            return Vec::new();
        }
        let size = if self.schedule.is_last_slice() {
            remaining
        } else {
            self.slice_sizes[self.schedule.current_slice].min(remaining)
        };
        if size == 0 {
            // A zero-sized tail slice still advances the clock.
            self.schedule.advance(data.timestamp_ns);
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
