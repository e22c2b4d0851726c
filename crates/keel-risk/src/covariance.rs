//! Factor covariance estimation
//!
//! Estimators work on an aligned T x K matrix of factor values (one row per
//! timestamp). Two estimators are provided:
//!
//! - [`SampleCovariance`]: equally weighted, `ddof = 1`
//! - [`EwmaCovarianceEstimator`]: exponentially weighted, so recent
//!   observations dominate
//!
//! The EWMA weight of observation t (0 = oldest) is λ^(T-1-t), normalised to
//! sum to one, and values are centred on the weighted mean.

use crate::error::{Result, RiskError, check_probability};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Trait for covariance matrix estimators
pub trait CovarianceEstimator {
    /// Estimate the covariance matrix of factor values.
    ///
    /// # Arguments
    /// * `factor_values` - Matrix where each row is a timestamp and each column a factor
    ///
    /// # Returns
    /// * Estimated covariance matrix (K x K)
    fn estimate(&self, factor_values: &Array2<f64>) -> Result<Array2<f64>>;
}

fn weighted_covariance(values: &Array2<f64>, weights: &Array1<f64>, scale: f64) -> Array2<f64> {
    let means = values.t().dot(weights);
    let centred = values - &means.insert_axis(Axis(0));
    let weighted = &centred * &weights.view().insert_axis(Axis(1));
    weighted.t().dot(&centred) * scale
}

/// Equally weighted sample covariance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleCovariance {
    /// Minimum number of observations (at least 2)
    pub min_observations: usize,
}

impl Default for SampleCovariance {
    fn default() -> Self {
        Self {
            min_observations: 2,
        }
    }
}

impl CovarianceEstimator for SampleCovariance {
    fn estimate(&self, factor_values: &Array2<f64>) -> Result<Array2<f64>> {
        let n = factor_values.nrows();
        let required = self.min_observations.max(2);
        if n < required {
            return Err(RiskError::too_few(required, n));
        }
        let weights = Array1::from_elem(n, 1.0 / n as f64);
        Ok(weighted_covariance(
            factor_values,
            &weights,
            n as f64 / (n - 1) as f64,
        ))
    }
}

/// EWMA covariance estimator configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EwmaConfig {
    /// Decay factor λ (default: 0.94, the RiskMetrics daily value)
    pub decay: f64,

    /// Minimum number of observations required (default: 20)
    pub min_observations: usize,
}

impl Default for EwmaConfig {
    fn default() -> Self {
        Self {
            decay: 0.94,
            min_observations: 20,
        }
    }
}

/// EWMA covariance estimator
#[derive(Debug, Clone)]
pub struct EwmaCovarianceEstimator {
    config: EwmaConfig,
}

impl EwmaCovarianceEstimator {
    /// Create a new EWMA estimator with the given configuration
    ///
    /// # Errors
    /// Returns [`RiskError::InvalidParameter`] if the decay is outside (0, 1)
    /// or fewer than 2 observations are allowed.
    pub fn new(config: EwmaConfig) -> Result<Self> {
        check_probability("EWMA decay", config.decay)?;
        if config.min_observations < 2 {
            return Err(RiskError::InvalidParameter(format!(
                "EWMA needs at least 2 observations, got {}",
                config.min_observations
            )));
        }
        Ok(Self { config })
    }

    /// Create with default configuration.
    ///
    /// # Errors
    /// Returns an error if the default configuration is invalid (should not happen).
    pub fn try_default() -> Result<Self> {
        Self::new(EwmaConfig::default())
    }

    /// Configuration in use.
    pub const fn config(&self) -> &EwmaConfig {
        &self.config
    }

    /// Half-life of the weights in periods: ln(0.5) / ln(λ)
    pub fn half_life(&self) -> f64 {
        0.5_f64.ln() / self.config.decay.ln()
    }

    /// Normalised weights for `n` observations, oldest first.
    pub fn weights(&self, n: usize) -> Array1<f64> {
        let lambda = self.config.decay;
        let raw = Array1::from_shape_fn(n, |t| lambda.powi((n - 1 - t) as i32));
        let total = raw.sum();
        raw / total
    }
}

impl CovarianceEstimator for EwmaCovarianceEstimator {
    fn estimate(&self, factor_values: &Array2<f64>) -> Result<Array2<f64>> {
        let n = factor_values.nrows();
        if n < self.config.min_observations {
            return Err(RiskError::too_few(self.config.min_observations, n));
        }
        Ok(weighted_covariance(factor_values, &self.weights(n), 1.0))
    }
}
