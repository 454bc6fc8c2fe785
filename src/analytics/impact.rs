//! Power-law market-impact model and its least-squares calibrator.
//!
//! The model: `impact_bps(V, ADV) = coeff * (V/ADV)^exponent * 10_000`,
//! evaluated with the permanent and temporary coefficients separately.
//! The calibrator fits the log-log form `ln(impact) = ln(coeff) +
//! exponent * ln(participation)` by OLS (or weighted OLS when weights
//! were supplied) and falls back to defaults on an implausible fit.

use super::regression::{RegressionResult, linear_regression, weighted_linear_regression};
use crate::orderbook::Fill;
use serde::{Deserialize, Serialize};
use tracing::warn;

const DEFAULT_PERMANENT_COEFF: f64 = 0.01;
const DEFAULT_TEMPORARY_COEFF: f64 = 0.02;
const DEFAULT_EXPONENT: f64 = 0.5;

/// Calibrated (or default) impact-model parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ImpactModelParams {
    /// Permanent impact coefficient.
    pub permanent_coeff: f64,
    /// Temporary impact coefficient.
    pub temporary_coeff: f64,
    /// Power-law exponent (0.5 is the square-root law).
    pub exponent: f64,
    /// Goodness of fit from the last calibration.
    pub r_squared: f64,
    /// Standard error of the regression.
    pub std_error: f64,
    /// Observations used by the last calibration.
    pub num_observations: usize,
}

impl Default for ImpactModelParams {
    fn default() -> Self {
        Self {
            permanent_coeff: DEFAULT_PERMANENT_COEFF,
            temporary_coeff: DEFAULT_TEMPORARY_COEFF,
            exponent: DEFAULT_EXPONENT,
            r_squared: 0.0,
            std_error: 0.0,
            num_observations: 0,
        }
    }
}

impl ImpactModelParams {
    /// Whether the calibration is statistically usable.
    #[must_use]
    pub fn is_valid(&self, min_r_squared: f64, min_observations: usize) -> bool {
        self.r_squared >= min_r_squared
            && self.num_observations >= min_observations
            && self.permanent_coeff > 0.0
    }
}

/// Evaluates the power-law impact model.
#[derive(Debug, Clone, Copy)]
pub struct MarketImpactModel {
    params: ImpactModelParams,
    default_adv: u64,
}

impl Default for MarketImpactModel {
    fn default() -> Self {
        Self {
            params: ImpactModelParams::default(),
            default_adv: 10_000_000,
        }
    }
}

impl MarketImpactModel {
    /// Model with explicit coefficients and default ADV.
    #[must_use]
    pub fn new(permanent_coeff: f64, temporary_coeff: f64, default_adv: u64) -> Self {
        Self {
            params: ImpactModelParams {
                permanent_coeff,
                temporary_coeff,
                ..ImpactModelParams::default()
            },
            default_adv,
        }
    }

    /// Model from calibrated parameters.
    #[must_use]
    pub fn from_params(params: ImpactModelParams, default_adv: u64) -> Self {
        Self {
            params,
            default_adv,
        }
    }

    /// The current parameters.
    #[must_use]
    pub fn params(&self) -> &ImpactModelParams {
        &self.params
    }

    /// Replaces the parameters.
    pub fn set_params(&mut self, params: ImpactModelParams) {
        self.params = params;
    }

    /// The fallback ADV used when a call passes 0.
    #[must_use]
    pub fn default_adv(&self) -> u64 {
        self.default_adv
    }

    /// Sets the fallback ADV.
    pub fn set_default_adv(&mut self, adv: u64) {
        self.default_adv = adv;
    }

    fn participation(&self, volume: u64, adv: u64) -> Option<f64> {
        let adv = if adv == 0 { self.default_adv } else { adv };
        if adv == 0 {
            return None;
        }
        Some(volume as f64 / adv as f64)
    }

    /// Permanent impact in basis points.
    #[must_use]
    pub fn permanent_impact_bps(&self, volume: u64, adv: u64) -> f64 {
        match self.participation(volume, adv) {
            Some(p) => self.params.permanent_coeff * p.powf(self.params.exponent) * 10_000.0,
            None => 0.0,
        }
    }

    /// Temporary impact in basis points.
    #[must_use]
    pub fn temporary_impact_bps(&self, volume: u64, adv: u64) -> f64 {
        match self.participation(volume, adv) {
            Some(p) => self.params.temporary_coeff * p.powf(self.params.exponent) * 10_000.0,
            None => 0.0,
        }
    }

    /// Permanent plus temporary impact in basis points.
    #[must_use]
    pub fn total_impact_bps(&self, volume: u64, adv: u64) -> f64 {
        self.permanent_impact_bps(volume, adv) + self.temporary_impact_bps(volume, adv)
    }

    /// Expected implementation shortfall: half the spread plus total
    /// impact, in basis points.
    #[must_use]
    pub fn implementation_shortfall_bps(&self, volume: u64, adv: u64, spread_bps: f64) -> f64 {
        spread_bps / 2.0 + self.total_impact_bps(volume, adv)
    }
}

/// Configuration thresholds for the calibrator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CalibratorConfig {
    /// Observations below this participation rate are discarded.
    pub min_participation_rate: f64,
    /// Observations below this price impact are discarded.
    pub min_price_impact: f64,
}

impl Default for CalibratorConfig {
    fn default() -> Self {
        Self {
            min_participation_rate: 1e-4,
            min_price_impact: 1e-4,
        }
    }
}

/// Accumulates `(participation, price impact)` observations and fits the
/// power law on demand.
#[derive(Debug, Clone, Default)]
pub struct ImpactCalibrator {
    log_participation: Vec<f64>,
    log_impact: Vec<f64>,
    weights: Vec<f64>,
    config: CalibratorConfig,
}

impl ImpactCalibrator {
    /// Calibrator with default thresholds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Calibrator with explicit thresholds.
    #[must_use]
    pub fn with_config(config: CalibratorConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Sets the minimum participation rate gate.
    pub fn set_min_participation_rate(&mut self, rate: f64) {
        self.config.min_participation_rate = rate;
    }

    /// Sets the minimum price impact gate.
    pub fn set_min_price_impact(&mut self, impact: f64) {
        self.config.min_price_impact = impact;
    }

    /// Number of accepted observations.
    #[must_use]
    pub fn observation_count(&self) -> usize {
        self.log_participation.len()
    }

    /// Adds an observation with unit weight.
    pub fn add_observation(&mut self, participation_rate: f64, price_impact: f64) {
        self.add_weighted_observation(participation_rate, price_impact, 1.0);
    }

    /// Adds a weighted observation. Values below the configured gates
    /// are discarded (the log transform requires strictly positive
    /// inputs anyway).
    pub fn add_weighted_observation(
        &mut self,
        participation_rate: f64,
        price_impact: f64,
        weight: f64,
    ) {
        if participation_rate < self.config.min_participation_rate
            || price_impact < self.config.min_price_impact
        {
            return;
        }
        self.log_participation.push(participation_rate.ln());
        self.log_impact.push(price_impact.ln());
        self.weights.push(weight);
    }

    /// Drops all observations.
    pub fn clear(&mut self) {
        self.log_participation.clear();
        self.log_impact.clear();
        self.weights.clear();
    }

    /// Fits the power law over the accumulated observations.
    ///
    /// Fewer than 3 observations returns the default model. An exponent
    /// outside `[0.1, 2.0]` is clamped into `[0.3, 1.0]`; a permanent
    /// coefficient outside `[1e-6, 1.0]` reverts both coefficients to
    /// defaults. Either fallback is logged as a warning.
    #[must_use]
    pub fn calibrate(&self, adv: u64) -> MarketImpactModel {
        if self.log_participation.len() < 3 {
            warn!(
                observations = self.log_participation.len(),
                "too few observations for impact calibration; using defaults"
            );
            return MarketImpactModel::from_params(ImpactModelParams::default(), adv);
        }

        let weighted = self.weights.iter().any(|&w| w != 1.0);
        let fit: RegressionResult = if weighted {
            weighted_linear_regression(&self.log_participation, &self.log_impact, &self.weights)
        } else {
            linear_regression(&self.log_participation, &self.log_impact)
        }
        .expect("lengths verified above");

        let mut params = ImpactModelParams {
            exponent: fit.slope,
            permanent_coeff: fit.intercept.exp(),
            temporary_coeff: fit.intercept.exp() * 2.0,
            r_squared: fit.r_squared,
            std_error: fit.std_error,
            num_observations: fit.n_samples,
        };

        if !(0.1..=2.0).contains(&params.exponent) {
            warn!(
                exponent = params.exponent,
                "implausible impact exponent; clamping into [0.3, 1.0]"
            );
            params.exponent = params.exponent.clamp(0.3, 1.0);
        }
        if !(1e-6..=1.0).contains(&params.permanent_coeff) {
            warn!(
                coeff = params.permanent_coeff,
                "implausible impact coefficient; reverting to defaults"
            );
            params.permanent_coeff = DEFAULT_PERMANENT_COEFF;
            params.temporary_coeff = DEFAULT_TEMPORARY_COEFF;
        }

        MarketImpactModel::from_params(params, adv)
    }

    /// Derives observations from consecutive fills (`|Δp|/p` against
    /// `qty/ADV`) and calibrates.
    #[must_use]
    pub fn calibrate_from_fills(&mut self, fills: &[Fill], adv: u64) -> MarketImpactModel {
        self.clear();
        for pair in fills.windows(2) {
            let prev = &pair[0];
            let current = &pair[1];
            if prev.price <= 0.0 || adv == 0 {
                continue;
            }
            let participation = current.quantity as f64 / adv as f64;
            let price_impact = (current.price - prev.price).abs() / prev.price;
            self.add_observation(participation, price_impact);
        }
        self.calibrate(adv)
    }
}
