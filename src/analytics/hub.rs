//! Central microstructure analytics hub.
//!
//! Consumes enhanced fills (directly or through a registered fill-router
//! callback), maintains global and per-symbol flow windows, per-symbol
//! rolling price history, periodized trade metrics, and optionally
//! records impact observations for auto-calibration.

use super::flow::{OrderFlowTracker, PerSymbolFlowTracker};
use super::impact::{ImpactCalibrator, ImpactModelParams, MarketImpactModel};
use super::rolling::RollingWindow;
use crate::orderbook::{EnhancedFill, OrderBook};
use crate::utils::monotonic_nanos;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Price samples retained per symbol.
pub const PRICE_HISTORY_SIZE: usize = 1000;

/// Impact observations retained for calibration.
pub const IMPACT_HISTORY_SIZE: usize = 10_000;

/// Hub configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// Flow window duration in seconds.
    pub flow_window_seconds: u64,
    /// Maximum flow windows retained.
    pub max_windows: usize,
    /// Maintain per-symbol flow windows.
    pub track_per_symbol: bool,
    /// Record impact observations automatically.
    pub auto_calibrate_impact: bool,
    /// Per-symbol average daily volume.
    pub symbol_adv: HashMap<String, u64>,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            flow_window_seconds: 60,
            max_windows: 60,
            track_per_symbol: false,
            auto_calibrate_impact: false,
            symbol_adv: HashMap::new(),
        }
    }
}

/// Aggregates over one metrics period.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct TradeMetrics {
    /// Fills in the period.
    pub trade_count: u64,
    /// Volume in the period.
    pub total_volume: u64,
    /// Notional in the period.
    pub total_notional: f64,
    /// Volume-weighted average price, set when the period closes.
    pub vwap: f64,
    /// Lowest trade price seen.
    pub min_price: f64,
    /// Highest trade price seen.
    pub max_price: f64,
    /// Flow imbalance at period close.
    pub flow_imbalance: f64,
    /// Period start, monotonic nanoseconds.
    pub period_start_ns: u64,
    /// Period end; 0 while open.
    pub period_end_ns: u64,
}

impl TradeMetrics {
    fn open(now_ns: u64) -> Self {
        Self {
            trade_count: 0,
            total_volume: 0,
            total_notional: 0.0,
            vwap: 0.0,
            min_price: f64::MAX,
            max_price: f64::MIN,
            flow_imbalance: 0.0,
            period_start_ns: now_ns,
            period_end_ns: 0,
        }
    }
}

/// One recorded price-impact observation.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PriceImpactObservation {
    /// Volume / ADV.
    pub participation_rate: f64,
    /// Absolute price move in basis points.
    pub price_impact_bps: f64,
    /// Fill volume.
    pub volume: u64,
    /// Rolling mean price at observation time.
    pub start_price: f64,
    /// Fill price.
    pub end_price: f64,
}

/// The analytics hub.
pub struct MicrostructureAnalytics {
    config: AnalyticsConfig,
    flow: OrderFlowTracker,
    symbol_flow: PerSymbolFlowTracker,
    price_history: HashMap<String, Box<RollingWindow<PRICE_HISTORY_SIZE>>>,
    last_price: HashMap<String, f64>,
    simple_model: MarketImpactModel,
    calibrated_model: Option<MarketImpactModel>,
    calibrator: ImpactCalibrator,
    impact_observations: Vec<PriceImpactObservation>,
    current_metrics: TradeMetrics,
    historical_metrics: Vec<TradeMetrics>,
    total_fills_processed: u64,
}

impl MicrostructureAnalytics {
    /// Hub with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(AnalyticsConfig::default())
    }

    /// Hub with explicit configuration.
    #[must_use]
    pub fn with_config(config: AnalyticsConfig) -> Self {
        let mut flow = OrderFlowTracker::new(config.flow_window_seconds);
        flow.set_max_windows(config.max_windows);
        let mut symbol_flow = PerSymbolFlowTracker::new(config.flow_window_seconds);
        symbol_flow.set_max_windows(config.max_windows);
        Self {
            config,
            flow,
            symbol_flow,
            price_history: HashMap::new(),
            last_price: HashMap::new(),
            simple_model: MarketImpactModel::default(),
            calibrated_model: None,
            calibrator: ImpactCalibrator::new(),
            impact_observations: Vec::new(),
            current_metrics: TradeMetrics::open(monotonic_nanos()),
            historical_metrics: Vec::new(),
            total_fills_processed: 0,
        }
    }

    /// Registers this hub (behind its `Arc<Mutex<_>>`) as a fill
    /// callback on the book's router.
    pub fn attach(hub: &Arc<Mutex<Self>>, book: &mut OrderBook) {
        let hub = Arc::clone(hub);
        book.fill_router_mut()
            .register_fill_callback(Arc::new(move |fill| {
                if let Ok(mut guard) = hub.lock() {
                    guard.process_fill(fill);
                }
            }));
    }

    /// Processes one fill through every analytics stage.
    pub fn process_fill(&mut self, fill: &EnhancedFill) {
        self.process_fill_at(fill, monotonic_nanos());
    }

    /// Processes one fill at an explicit clock reading.
    pub fn process_fill_at(&mut self, fill: &EnhancedFill, now_ns: u64) {
        self.total_fills_processed += 1;

        self.flow.record_fill_at(fill, now_ns);
        if self.config.track_per_symbol {
            self.symbol_flow.record_fill_at(fill, now_ns);
        }

        // Price tracking.
        let price = fill.price();
        self.price_history
            .entry(fill.symbol.clone())
            .or_default()
            .add(price);
        self.last_price.insert(fill.symbol.clone(), price);

        // Period metrics.
        let quantity = fill.quantity();
        self.current_metrics.trade_count += 1;
        self.current_metrics.total_volume += quantity;
        self.current_metrics.total_notional += price * quantity as f64;
        self.current_metrics.min_price = self.current_metrics.min_price.min(price);
        self.current_metrics.max_price = self.current_metrics.max_price.max(price);

        if self.config.auto_calibrate_impact {
            self.maybe_record_impact_observation(fill);
        }
    }

    /// Records an impact observation when the fill is significant and
    /// enough price history exists.
    fn maybe_record_impact_observation(&mut self, fill: &EnhancedFill) {
        let quantity = fill.quantity();
        if quantity < 100 {
            return;
        }
        let Some(history) = self.price_history.get(&fill.symbol) else {
            return;
        };
        if history.count() < 10 {
            return;
        }
        let mean = history.mean();
        if mean <= 0.0 {
            return;
        }
        let price = fill.price();
        let price_move_bps = ((price - mean) / mean).abs() * 10_000.0;
        let adv = self.symbol_adv(&fill.symbol);
        let participation_rate = quantity as f64 / adv as f64;

        self.impact_observations.push(PriceImpactObservation {
            participation_rate,
            price_impact_bps: price_move_bps,
            volume: quantity,
            start_price: mean,
            end_price: price,
        });
        if self.impact_observations.len() > IMPACT_HISTORY_SIZE {
            self.impact_observations.remove(0);
        }
        self.calibrator
            .add_observation(participation_rate, price_move_bps / 10_000.0);
    }

    // ------------------------------------------------------------------
    // Flow queries
    // ------------------------------------------------------------------

    /// Current-window flow imbalance.
    #[must_use]
    pub fn flow_imbalance(&self) -> f64 {
        self.flow.current_imbalance()
    }

    /// Flow imbalance over the last `num_windows`.
    #[must_use]
    pub fn flow_imbalance_over(&self, num_windows: usize) -> f64 {
        self.flow.imbalance(num_windows)
    }

    /// Per-symbol flow imbalance (0 when not tracked).
    #[must_use]
    pub fn symbol_flow_imbalance(&self, symbol: &str) -> f64 {
        self.symbol_flow.imbalance(symbol)
    }

    /// Trade-count imbalance in the current window.
    #[must_use]
    pub fn trade_count_imbalance(&self) -> f64 {
        self.flow.trade_count_imbalance()
    }

    /// Notional-weighted imbalance in the current window.
    #[must_use]
    pub fn notional_imbalance(&self) -> f64 {
        self.flow.notional_imbalance()
    }

    /// Mean of the rolling imbalance history.
    #[must_use]
    pub fn average_imbalance(&self) -> f64 {
        self.flow.average_imbalance()
    }

    /// Volatility of the rolling imbalance history.
    #[must_use]
    pub fn imbalance_volatility(&self) -> f64 {
        self.flow.imbalance_volatility()
    }

    /// Rolling VWAP over the retained flow windows.
    #[must_use]
    pub fn vwap(&self) -> f64 {
        self.flow.vwap()
    }

    /// Fraction of retained volume that was aggressive buying.
    #[must_use]
    pub fn buy_ratio(&self) -> f64 {
        self.flow.buy_ratio()
    }

    /// The global flow tracker.
    #[must_use]
    pub fn flow_tracker(&self) -> &OrderFlowTracker {
        &self.flow
    }

    // ------------------------------------------------------------------
    // Impact
    // ------------------------------------------------------------------

    /// Sets a symbol's ADV.
    pub fn set_symbol_adv(&mut self, symbol: impl Into<String>, adv: u64) {
        self.config.symbol_adv.insert(symbol.into(), adv);
    }

    /// A symbol's ADV, defaulting to the simple model's fallback.
    #[must_use]
    pub fn symbol_adv(&self, symbol: &str) -> u64 {
        self.config
            .symbol_adv
            .get(symbol)
            .copied()
            .unwrap_or_else(|| self.simple_model.default_adv())
    }

    /// Impact estimate using the calibrated model when one is valid,
    /// else the simple model.
    #[must_use]
    pub fn estimate_impact_bps(&self, volume: u64, symbol: &str) -> f64 {
        let adv = self.symbol_adv(symbol);
        match &self.calibrated_model {
            Some(model) => model.total_impact_bps(volume, adv),
            None => self.simple_model.total_impact_bps(volume, adv),
        }
    }

    /// Runs calibration over the auto-recorded observations. Returns
    /// `true` when the fit was valid and the calibrated model is now in
    /// use.
    pub fn calibrate_impact_model(&mut self, symbol: &str) -> bool {
        let adv = self.symbol_adv(symbol);
        let model = self.calibrator.calibrate(adv);
        let valid = model.params().is_valid(0.1, 10);
        debug!(
            symbol,
            r_squared = model.params().r_squared,
            observations = model.params().num_observations,
            valid,
            "impact calibration"
        );
        if valid {
            self.calibrated_model = Some(model);
        }
        valid
    }

    /// The calibrated parameters, when a calibration succeeded.
    #[must_use]
    pub fn calibrated_params(&self) -> Option<&ImpactModelParams> {
        self.calibrated_model.as_ref().map(MarketImpactModel::params)
    }

    /// Recorded impact observations.
    #[must_use]
    pub fn impact_observations(&self) -> &[PriceImpactObservation] {
        &self.impact_observations
    }

    /// Mutable access to the calibrator (threshold configuration).
    pub fn calibrator_mut(&mut self) -> &mut ImpactCalibrator {
        &mut self.calibrator
    }

    // ------------------------------------------------------------------
    // Prices & metrics
    // ------------------------------------------------------------------

    /// Last trade price for a symbol.
    #[must_use]
    pub fn last_price(&self, symbol: &str) -> Option<f64> {
        self.last_price.get(symbol).copied()
    }

    /// Rolling mean price for a symbol; 0 when unknown.
    #[must_use]
    pub fn average_price(&self, symbol: &str) -> f64 {
        self.price_history.get(symbol).map_or(0.0, |h| h.mean())
    }

    /// Rolling price standard deviation for a symbol; 0 when unknown.
    #[must_use]
    pub fn price_volatility(&self, symbol: &str) -> f64 {
        self.price_history.get(symbol).map_or(0.0, |h| h.stddev())
    }

    /// The open metrics period.
    #[must_use]
    pub fn current_metrics(&self) -> &TradeMetrics {
        &self.current_metrics
    }

    /// Closes the current period (computing its VWAP and imbalance),
    /// archives it and opens a new one.
    pub fn close_metrics_period(&mut self) -> TradeMetrics {
        let now = monotonic_nanos();
        self.current_metrics.period_end_ns = now;
        self.current_metrics.flow_imbalance = self.flow_imbalance();
        if self.current_metrics.total_volume > 0 {
            self.current_metrics.vwap =
                self.current_metrics.total_notional / self.current_metrics.total_volume as f64;
        }
        let completed = self.current_metrics;
        self.historical_metrics.push(completed);
        self.current_metrics = TradeMetrics::open(now);
        completed
    }

    /// Closed metrics periods.
    #[must_use]
    pub fn historical_metrics(&self) -> &[TradeMetrics] {
        &self.historical_metrics
    }

    /// Fills processed since construction or `clear`.
    #[must_use]
    pub fn total_fills_processed(&self) -> u64 {
        self.total_fills_processed
    }

    /// Resets all analytics state (configuration is retained).
    pub fn clear(&mut self) {
        self.flow.clear();
        self.symbol_flow.clear();
        self.price_history.clear();
        self.last_price.clear();
        self.calibrator.clear();
        self.calibrated_model = None;
        self.impact_observations.clear();
        self.historical_metrics.clear();
        self.current_metrics = TradeMetrics::open(monotonic_nanos());
        self.total_fills_processed = 0;
    }
}

impl Default for MicrostructureAnalytics {
    fn default() -> Self {
        Self::new()
    }
}
