//! Correlation Analysis
//!
//! Pearson correlation between factor series, full correlation matrices on
//! jointly aligned data, rolling correlation and beta.
//!
//! Pairwise statistics use the timestamps the two inputs share. A constant
//! series has no defined correlation: the pairwise call fails with
//! [`RiskError::InsufficientData`] carrying [`Shortfall::ZeroVariance`], and
//! matrix entries hold `None`.

use crate::align::{align, intersect_pair};
use crate::covariance::CovarianceEstimator;
use crate::error::{Result, RiskError, Shortfall};
use keel_factors::{FactorSet, InstrumentId, Observation, Timestamp};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Standard deviations below this (relative to the mean level) count as zero.
const ZERO_VARIANCE_TOLERANCE: f64 = 1e-12;

/// Correlation analysis configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrelationConfig {
    /// Minimum number of aligned observations (at least 2)
    pub min_observations: usize,
    /// Minimum observations for beta estimation
    pub min_beta_observations: usize,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            min_observations: 2,
            min_beta_observations: 30,
        }
    }
}

/// Correlation matrix over a set of instruments.
///
/// Entries are `None` where a series is constant on the aligned window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationMatrix {
    instruments: Vec<InstrumentId>,
    observations: usize,
    start: Timestamp,
    end: Timestamp,
    /// Row-major K x K entries
    entries: Vec<Option<f64>>,
}

impl CorrelationMatrix {
    /// Instruments in row/column order.
    pub fn instruments(&self) -> &[InstrumentId] {
        &self.instruments
    }

    /// Number of aligned observations used.
    pub const fn observations(&self) -> usize {
        self.observations
    }

    /// First and last aligned timestamp.
    pub const fn window(&self) -> (Timestamp, Timestamp) {
        (self.start, self.end)
    }

    /// Matrix dimension.
    pub fn dim(&self) -> usize {
        self.instruments.len()
    }

    /// Entry at row `i`, column `j`; `None` if undefined or out of range.
    pub fn get(&self, i: usize, j: usize) -> Option<f64> {
        let k = self.dim();
        if i >= k || j >= k {
            return None;
        }
        self.entries[i * k + j]
    }

    /// Entry for a pair of instruments.
    pub fn between(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.instruments.iter().position(|x| x == a)?;
        let j = self.instruments.iter().position(|x| x == b)?;
        self.get(i, j)
    }

    /// Rows of the matrix.
    pub fn rows(&self) -> impl Iterator<Item = &[Option<f64>]> {
        self.entries.chunks(self.dim().max(1))
    }
}

/// One point of a rolling correlation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RollingPoint {
    /// Last timestamp of the window
    pub timestamp: Timestamp,
    /// Correlation over the window, `None` if a side is constant
    pub value: Option<f64>,
}

struct Moments {
    cov: f64,
    var_x: f64,
    var_y: f64,
}

/// Central second moments with divisor `n` (the divisor cancels in correlation).
fn moments(xs: &[f64], ys: &[f64]) -> Moments {
    let n = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;
    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    Moments {
        cov: cov / n,
        var_x: var_x / n,
        var_y: var_y / n,
    }
}

fn is_constant(values: &[f64], variance: f64) -> bool {
    let level = values.iter().map(|v| v.abs()).sum::<f64>() / values.len() as f64;
    variance.sqrt() <= ZERO_VARIANCE_TOLERANCE * level.max(1.0)
}

/// Pearson correlation of two equally long samples, clamped to [-1, 1].
///
/// # Errors
/// [`RiskError::InsufficientData`] with fewer than 2 points or if either
/// side is constant.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Result<f64> {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return Err(RiskError::too_few(2, n));
    }
    let (xs, ys) = (&xs[..n], &ys[..n]);
    let m = moments(xs, ys);
    if is_constant(xs, m.var_x) {
        return Err(RiskError::zero_variance("first", n));
    }
    if is_constant(ys, m.var_y) {
        return Err(RiskError::zero_variance("second", n));
    }
    Ok((m.cov / (m.var_x.sqrt() * m.var_y.sqrt())).clamp(-1.0, 1.0))
}

/// Maps the zero-variance failure to the `None` sentinel.
fn defined(result: Result<f64>) -> Result<Option<f64>> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(RiskError::InsufficientData {
            reason: Shortfall::ZeroVariance(_),
            ..
        }) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Correlation, covariance and beta over factor series.
#[derive(Debug, Clone, Default)]
pub struct CorrelationAnalyzer {
    config: CorrelationConfig,
}

impl CorrelationAnalyzer {
    /// Create an analyzer.
    ///
    /// # Errors
    /// Returns [`RiskError::InvalidParameter`] if a minimum is below 2.
    pub fn new(config: CorrelationConfig) -> Result<Self> {
        if config.min_observations < 2 || config.min_beta_observations < 2 {
            return Err(RiskError::InvalidParameter(format!(
                "correlation needs at least 2 observations, got {} (beta {})",
                config.min_observations, config.min_beta_observations
            )));
        }
        Ok(Self { config })
    }

    /// Configuration in use.
    pub const fn config(&self) -> &CorrelationConfig {
        &self.config
    }

    fn require(&self, required: usize, actual: usize) -> Result<()> {
        if actual < required {
            return Err(RiskError::too_few(required, actual));
        }
        Ok(())
    }

    /// Pearson correlation of two observation sequences on their shared timestamps.
    pub fn correlation(&self, a: &[Observation], b: &[Observation]) -> Result<f64> {
        let (_, xs, ys) = intersect_pair(a, b);
        self.require(self.config.min_observations, xs.len())?;
        pearson(&xs, &ys)
    }

    /// Correlation of two instruments of a factor set.
    pub fn correlation_between(&self, factors: &FactorSet, a: &str, b: &str) -> Result<f64> {
        let series = |id: &str| {
            factors
                .get(id)
                .ok_or_else(|| RiskError::UnknownInstrument(id.to_string()))
        };
        self.correlation(series(a)?.observations(), series(b)?.observations())
    }

    /// Correlation matrix over the timestamps shared by all `instruments`.
    ///
    /// # Errors
    /// Alignment errors, or [`RiskError::InsufficientData`] if the common
    /// window is shorter than the configured minimum.
    pub fn matrix(
        &self,
        factors: &FactorSet,
        instruments: &[InstrumentId],
    ) -> Result<CorrelationMatrix> {
        let aligned = align(factors, instruments)?;
        self.require(self.config.min_observations, aligned.len())?;

        let columns: Vec<Vec<f64>> = aligned
            .values()
            .columns()
            .into_iter()
            .map(|c| c.to_vec())
            .collect();

        let k = columns.len();
        let mut entries = vec![None; k * k];
        for i in 0..k {
            for j in i..k {
                let value = if i == j {
                    defined(pearson(&columns[i], &columns[i]).map(|_| 1.0))?
                } else {
                    defined(pearson(&columns[i], &columns[j]))?
                };
                entries[i * k + j] = value;
                entries[j * k + i] = value;
            }
        }

        let undefined = entries.iter().filter(|e| e.is_none()).count();
        debug!(
            instruments = k,
            observations = aligned.len(),
            undefined,
            "computed correlation matrix"
        );

        let timestamps = aligned.timestamps();
        Ok(CorrelationMatrix {
            instruments: instruments.to_vec(),
            observations: aligned.len(),
            start: timestamps[0],
            end: timestamps[timestamps.len() - 1],
            entries,
        })
    }

    /// Covariance matrix of jointly aligned factors.
    pub fn covariance<E: CovarianceEstimator + ?Sized>(
        &self,
        factors: &FactorSet,
        instruments: &[InstrumentId],
        estimator: &E,
    ) -> Result<Array2<f64>> {
        let aligned = align(factors, instruments)?;
        estimator.estimate(aligned.values())
    }

    /// Correlation over a trailing window ending at each shared timestamp.
    ///
    /// The first point covers the first `window` shared timestamps.
    pub fn rolling(
        &self,
        a: &[Observation],
        b: &[Observation],
        window: usize,
    ) -> Result<Vec<RollingPoint>> {
        if window < 2 {
            return Err(RiskError::InvalidParameter(format!(
                "rolling window must be at least 2, got {window}"
            )));
        }
        let (timestamps, xs, ys) = intersect_pair(a, b);
        self.require(window, xs.len())?;

        (window..=xs.len())
            .map(|end| {
                let start = end - window;
                Ok(RollingPoint {
                    timestamp: timestamps[end - 1],
                    value: defined(pearson(&xs[start..end], &ys[start..end]))?,
                })
            })
            .collect()
    }

    /// Beta of `asset` against `market`: Cov(a, m) / Var(m).
    ///
    /// # Errors
    /// [`RiskError::InsufficientData`] below the configured beta minimum or
    /// for a constant market series.
    pub fn beta(&self, asset: &[Observation], market: &[Observation]) -> Result<f64> {
        let (_, xs, ys) = intersect_pair(asset, market);
        self.require(self.config.min_beta_observations, xs.len())?;
        let m = moments(&xs, &ys);
        if is_constant(&ys, m.var_y) {
            return Err(RiskError::zero_variance("market", xs.len()));
        }
        Ok(m.cov / m.var_y)
    }
}
