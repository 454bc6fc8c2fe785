//! Execution simulator: geometric-Brownian-motion price paths,
//! probabilistic limit fills and temporary-impact feedback.
//!
//! Drives a scheduler tick by tick against a synthetic or replayed
//! price path and reports realized versus model-predicted impact. The
//! RNG is a seeded `StdRng`, so runs are reproducible.

use super::algorithm::{ExecutionAlgorithm, ExecutionReport, MarketSnapshot};
use crate::analytics::MarketImpactModel;
use crate::orderbook::{Fill, Order, Side};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Simulator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Starting price.
    pub initial_price: f64,
    /// Daily volatility.
    pub volatility: f64,
    /// Quoted spread in basis points of the mid.
    pub spread_bps: f64,
    /// Average daily volume.
    pub adv: u64,
    /// Minimum price increment.
    pub tick_size: f64,
    /// Market-data frequency.
    pub ticks_per_second: u32,
    /// Probability a crossable limit order fills on a tick.
    pub fill_probability: f64,
    /// Shift the price by the model's temporary impact on each fill.
    pub apply_market_impact: bool,
    /// RNG seed for reproducibility.
    pub random_seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            initial_price: 100.0,
            volatility: 0.02,
            spread_bps: 5.0,
            adv: 10_000_000,
            tick_size: 0.01,
            ticks_per_second: 100,
            fill_probability: 0.8,
            apply_market_impact: true,
            random_seed: 42,
        }
    }
}

/// Outcome of one simulated execution.
#[derive(Debug, Clone)]
pub struct SimulationResult {
    /// The scheduler's own report.
    pub report: ExecutionReport,
    /// Market-data history the scheduler saw.
    pub price_path: Vec<MarketSnapshot>,
    /// Every simulated fill.
    pub fills: Vec<Fill>,
    /// Price move over the run, basis points.
    pub realized_impact_bps: f64,
    /// Model-predicted impact for the executed quantity, basis points.
    pub predicted_impact_bps: f64,
    /// Whether the target was fully executed.
    pub completed: bool,
}

/// Simulates scheduler execution against a synthetic or replayed market.
pub struct ExecutionSimulator {
    config: SimulationConfig,
    impact_model: MarketImpactModel,
    rng: StdRng,
    current_price: f64,
    bid_price: f64,
    ask_price: f64,
    cumulative_volume: u64,
    current_time_ns: u64,
}

impl ExecutionSimulator {
    /// Simulator with the given configuration and the default impact
    /// model.
    #[must_use]
    pub fn new(config: SimulationConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.random_seed);
        let mut this = Self {
            config,
            impact_model: MarketImpactModel::default(),
            rng,
            current_price: 0.0,
            bid_price: 0.0,
            ask_price: 0.0,
            cumulative_volume: 0,
            current_time_ns: 0,
        };
        this.reset();
        this
    }

    /// Simulator with an explicit impact model.
    #[must_use]
    pub fn with_impact_model(config: SimulationConfig, model: MarketImpactModel) -> Self {
        let mut this = Self::new(config);
        this.impact_model = model;
        this
    }

    /// Replaces the impact model.
    pub fn set_impact_model(&mut self, model: MarketImpactModel) {
        self.impact_model = model;
    }

    /// Resets price, volume, clock and RNG to the configured start.
    pub fn reset(&mut self) {
        self.current_price = self.config.initial_price;
        self.cumulative_volume = 0;
        self.current_time_ns = 0;
        self.rng = StdRng::seed_from_u64(self.config.random_seed);
        self.update_quotes();
    }

    /// Naive single-order cost estimate: half spread plus full impact,
    /// in basis points.
    #[must_use]
    pub fn estimate_naive_cost_bps(&self, quantity: u64) -> f64 {
        self.config.spread_bps / 2.0 + self.impact_model.total_impact_bps(quantity, self.config.adv)
    }

    /// Runs `algo` against a synthetic GBM path for `duration`.
    pub fn run(
        &mut self,
        algo: &mut dyn ExecutionAlgorithm,
        duration: Duration,
    ) -> SimulationResult {
        self.reset();
        algo.reset();

        let start_price = self.current_price;
        let tick_ns = 1_000_000_000u64 / self.config.ticks_per_second.max(1) as u64;
        let num_ticks =
            (duration.as_nanos() as u64 / tick_ns.max(1)) as usize;

        let mut price_path = Vec::with_capacity(num_ticks);
        let mut fills = Vec::new();

        for _ in 0..num_ticks {
            if algo.core().is_complete() {
                break;
            }
            self.current_time_ns += tick_ns;
            self.simulate_price_tick();

            let data = self.market_snapshot();
            price_path.push(data.clone());

            for mut order in algo.on_market_data(&data) {
                for fill in self.simulate_order_execution(&mut order, &data) {
                    algo.on_fill(&fill);
                    fills.push(fill);
                    if self.config.apply_market_impact {
                        self.apply_market_impact(fill.quantity);
                    }
                }
            }
        }

        let report = algo.generate_report();
        let realized_impact_bps = (self.current_price - start_price) / start_price * 10_000.0;
        let predicted_impact_bps = self
            .impact_model
            .total_impact_bps(algo.core().executed_quantity, self.config.adv);

        SimulationResult {
            completed: algo.core().is_complete(),
            report,
            price_path,
            fills,
            realized_impact_bps,
            predicted_impact_bps,
        }
    }

    /// Runs `algo` against a caller-provided snapshot sequence.
    pub fn run_path(
        &mut self,
        algo: &mut dyn ExecutionAlgorithm,
        path: &[MarketSnapshot],
    ) -> SimulationResult {
        algo.reset();

        let mut fills = Vec::new();
        let start_price = path.first().map_or(0.0, |d| d.price);

        for data in path {
            if algo.core().is_complete() {
                break;
            }
            self.current_price = data.price;
            self.current_time_ns = data.timestamp_ns;

            for mut order in algo.on_market_data(data) {
                for fill in self.simulate_order_execution(&mut order, data) {
                    algo.on_fill(&fill);
                    fills.push(fill);
                }
            }
        }

        let report = algo.generate_report();
        let realized_impact_bps = match (path.first(), path.last()) {
            (Some(first), Some(last)) if first.price > 0.0 => {
                (last.price - first.price) / first.price * 10_000.0
            }
            _ => 0.0,
        };
        let predicted_impact_bps = self
            .impact_model
            .total_impact_bps(algo.core().executed_quantity, self.config.adv);

        SimulationResult {
            completed: algo.core().is_complete(),
            report,
            price_path: path.to_vec(),
            fills,
            realized_impact_bps,
            predicted_impact_bps,
        }
    }

    /// Generates a shared synthetic path for comparing schedulers on
    /// identical data.
    pub fn generate_path(&mut self, num_ticks: usize) -> Vec<MarketSnapshot> {
        self.reset();
        let tick_ns = 1_000_000_000u64 / self.config.ticks_per_second.max(1) as u64;
        let mut path = Vec::with_capacity(num_ticks);
        for _ in 0..num_ticks {
            self.current_time_ns += tick_ns;
            self.simulate_price_tick();
            path.push(self.market_snapshot());
        }
        path
    }

    /// Runs every scheduler against the same generated path.
    pub fn compare(
        &mut self,
        algos: &mut [Box<dyn ExecutionAlgorithm>],
        duration: Duration,
    ) -> Vec<SimulationResult> {
        let tick_ns = 1_000_000_000u64 / self.config.ticks_per_second.max(1) as u64;
        let num_ticks = (duration.as_nanos() as u64 / tick_ns.max(1)) as usize;
        let path = self.generate_path(num_ticks);
        algos
            .iter_mut()
            .map(|algo| self.run_path(algo.as_mut(), &path))
            .collect()
    }

    /// The current market snapshot.
    #[must_use]
    pub fn market_snapshot(&self) -> MarketSnapshot {
        MarketSnapshot {
            price: self.current_price,
            bid_price: self.bid_price,
            ask_price: self.ask_price,
            spread: self.ask_price - self.bid_price,
            bid_volume: 0,
            ask_volume: 0,
            total_volume: self.cumulative_volume,
            timestamp_ns: self.current_time_ns,
            symbol: String::new(),
        }
    }

    fn simulate_price_tick(&mut self) {
        // GBM with zero drift; dt is the tick as a fraction of a
        // trading year.
        let dt = 1.0
            / (self.config.ticks_per_second as f64 * 252.0 * 6.5 * 3600.0);
        let epsilon: f64 = self.rng.sample(StandardNormal);
        let diffusion = self.config.volatility * dt.sqrt() * epsilon;
        self.current_price *= diffusion.exp();

        let tick = self.config.tick_size;
        self.current_price = (self.current_price / tick).round() * tick;
        self.current_price = self.current_price.max(tick);
        self.update_quotes();
    }

    fn update_quotes(&mut self) {
        let tick = self.config.tick_size;
        let half_spread = self.current_price * (self.config.spread_bps / 20_000.0);
        self.bid_price = ((self.current_price - half_spread) / tick).floor() * tick;
        self.ask_price = ((self.current_price + half_spread) / tick).ceil() * tick;
    }

    fn simulate_order_execution(
        &mut self,
        order: &mut Order,
        data: &MarketSnapshot,
    ) -> Vec<Fill> {
        let mut fills = Vec::new();

        if order.is_market_order() {
            // Market orders fill completely at the touch.
            let price = match order.side {
                Side::Buy => data.ask_price,
                Side::Sell => data.bid_price,
            };
            fills.push(Fill::new(
                order.id,
                order.id,
                price,
                order.quantity,
                self.current_time_ns,
            ));
            self.cumulative_volume += order.quantity;
        } else {
            let (would_fill, price) = match order.side {
                Side::Buy => (data.ask_price <= order.price, order.price.min(data.ask_price)),
                Side::Sell => (data.bid_price >= order.price, order.price.max(data.bid_price)),
            };
            if would_fill && self.rng.gen::<f64>() < self.config.fill_probability {
                fills.push(Fill::new(
                    order.id,
                    order.id,
                    price,
                    order.quantity,
                    self.current_time_ns,
                ));
                self.cumulative_volume += order.quantity;
            }
        }
        fills
    }

    /// Temporary impact moves the price against the flow.
    fn apply_market_impact(&mut self, quantity: u64) {
        let impact_bps = self
            .impact_model
            .temporary_impact_bps(quantity, self.config.adv);
        self.current_price *= 1.0 + impact_bps / 10_000.0;
        self.update_quotes();
    }
}
