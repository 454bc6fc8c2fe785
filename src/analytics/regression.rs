//! Ordinary and weighted least-squares regression plus Pearson
//! correlation.
//!
//! Closed-form single-variable OLS with explicit guards on degenerate
//! denominators (`|D| < 1e-10` yields a horizontal line through the
//! mean) and R² clamped to `[0, 1]`.

use thiserror::Error;

const EPSILON: f64 = 1e-10;

/// Invalid regression input.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegressionError {
    /// Input slices differ in length.
    #[error("input length mismatch: {x} vs {y}")]
    LengthMismatch {
        /// Length of the x slice.
        x: usize,
        /// Length of the y slice.
        y: usize,
    },
    /// Fewer than two samples.
    #[error("need at least 2 samples, got {0}")]
    TooFewSamples(usize),
}

/// Fit of `y = slope * x + intercept` with goodness-of-fit metrics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegressionResult {
    /// Fitted slope.
    pub slope: f64,
    /// Fitted intercept.
    pub intercept: f64,
    /// R², clamped to `[0, 1]`.
    pub r_squared: f64,
    /// Standard error of the estimate (0 for n <= 2).
    pub std_error: f64,
    /// Number of samples used.
    pub n_samples: usize,
}

impl RegressionResult {
    /// Predicted y for a given x.
    #[inline]
    #[must_use]
    pub fn predict(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }

    /// Whether the fit is statistically meaningful.
    #[must_use]
    pub fn is_valid(&self, min_r_squared: f64) -> bool {
        self.r_squared >= min_r_squared && self.n_samples >= 3
    }
}

/// Ordinary least squares over `(x, y)` pairs.
pub fn linear_regression(x: &[f64], y: &[f64]) -> Result<RegressionResult, RegressionError> {
    if x.len() != y.len() {
        return Err(RegressionError::LengthMismatch {
            x: x.len(),
            y: y.len(),
        });
    }
    if x.len() < 2 {
        return Err(RegressionError::TooFewSamples(x.len()));
    }

    let n = x.len() as f64;
    let (mut sum_x, mut sum_y, mut sum_xy, mut sum_x2, mut sum_y2) = (0.0, 0.0, 0.0, 0.0, 0.0);
    for (&xi, &yi) in x.iter().zip(y) {
        sum_x += xi;
        sum_y += yi;
        sum_xy += xi * yi;
        sum_x2 += xi * xi;
        sum_y2 += yi * yi;
    }
    let mean_x = sum_x / n;
    let mean_y = sum_y / n;
    let denominator = sum_x2 - n * mean_x * mean_x;

    if denominator.abs() < EPSILON {
        // No variance in x: horizontal line at the y mean.
        return Ok(RegressionResult {
            slope: 0.0,
            intercept: mean_y,
            r_squared: 0.0,
            std_error: 0.0,
            n_samples: x.len(),
        });
    }

    let slope = (sum_xy - n * mean_x * mean_y) / denominator;
    let intercept = mean_y - slope * mean_x;

    let ss_tot = sum_y2 - n * mean_y * mean_y;
    let ss_res: f64 = x
        .iter()
        .zip(y)
        .map(|(&xi, &yi)| {
            let residual = yi - (slope * xi + intercept);
            residual * residual
        })
        .sum();

    let raw_r_squared = if ss_tot.abs() < EPSILON {
        1.0
    } else {
        1.0 - ss_res / ss_tot
    };
    let r_squared = raw_r_squared.clamp(0.0, 1.0);

    let std_error = if x.len() > 2 {
        (ss_res / (n - 2.0)).sqrt()
    } else {
        0.0
    };

    Ok(RegressionResult {
        slope,
        intercept,
        r_squared,
        std_error,
        n_samples: x.len(),
    })
}

/// Weighted least squares: minimizes `Σ wᵢ (yᵢ - (a xᵢ + b))²`.
pub fn weighted_linear_regression(
    x: &[f64],
    y: &[f64],
    weights: &[f64],
) -> Result<RegressionResult, RegressionError> {
    if x.len() != y.len() || x.len() != weights.len() {
        return Err(RegressionError::LengthMismatch {
            x: x.len(),
            y: y.len().min(weights.len()),
        });
    }
    if x.len() < 2 {
        return Err(RegressionError::TooFewSamples(x.len()));
    }

    let n = x.len() as f64;
    let (mut sum_w, mut sum_wx, mut sum_wy, mut sum_wxy, mut sum_wx2, mut sum_wy2) =
        (0.0, 0.0, 0.0, 0.0, 0.0, 0.0);
    for ((&xi, &yi), &w) in x.iter().zip(y).zip(weights) {
        sum_w += w;
        sum_wx += w * xi;
        sum_wy += w * yi;
        sum_wxy += w * xi * yi;
        sum_wx2 += w * xi * xi;
        sum_wy2 += w * yi * yi;
    }
    let mean_x = sum_wx / sum_w;
    let mean_y = sum_wy / sum_w;
    let denominator = sum_wx2 - sum_w * mean_x * mean_x;

    if denominator.abs() < EPSILON {
        return Ok(RegressionResult {
            slope: 0.0,
            intercept: mean_y,
            r_squared: 0.0,
            std_error: 0.0,
            n_samples: x.len(),
        });
    }

    let slope = (sum_wxy - sum_w * mean_x * mean_y) / denominator;
    let intercept = mean_y - slope * mean_x;

    let ss_tot = sum_wy2 - sum_w * mean_y * mean_y;
    let ss_res: f64 = x
        .iter()
        .zip(y)
        .zip(weights)
        .map(|((&xi, &yi), &w)| {
            let residual = yi - (slope * xi + intercept);
            w * residual * residual
        })
        .sum();

    let raw_r_squared = if ss_tot.abs() < EPSILON {
        1.0
    } else {
        1.0 - ss_res / ss_tot
    };
    let r_squared = raw_r_squared.clamp(0.0, 1.0);

    let std_error = if x.len() > 2 {
        (ss_res / (sum_w * (n - 2.0) / n)).sqrt()
    } else {
        0.0
    };

    Ok(RegressionResult {
        slope,
        intercept,
        r_squared,
        std_error,
        n_samples: x.len(),
    })
}

/// Pearson correlation coefficient; 0 for degenerate input.
#[must_use]
pub fn correlation(x: &[f64], y: &[f64]) -> f64 {
    if x.len() != y.len() || x.len() < 2 {
        return 0.0;
    }
    let n = x.len() as f64;
    let (mut sum_x, mut sum_y, mut sum_xy, mut sum_x2, mut sum_y2) = (0.0, 0.0, 0.0, 0.0, 0.0);
    for (&xi, &yi) in x.iter().zip(y) {
        sum_x += xi;
        sum_y += yi;
        sum_xy += xi * yi;
        sum_x2 += xi * xi;
        sum_y2 += yi * yi;
    }
    let numerator = n * sum_xy - sum_x * sum_y;
    let denominator = ((n * sum_x2 - sum_x * sum_x) * (n * sum_y2 - sum_y * sum_y)).sqrt();
    if denominator.abs() < EPSILON {
        0.0
    } else {
        numerator / denominator
    }
}
