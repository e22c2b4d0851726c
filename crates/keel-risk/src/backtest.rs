//! VaR Backtesting
//!
//! Compares rolling one-step VaR forecasts with realised PnL and tests the
//! breach sequence with two likelihood-ratio tests, both χ²(1) under the null:
//!
//! - Kupiec unconditional coverage: is the breach rate equal to 1 − α?
//! - Christoffersen independence: does a breach today change the
//!   probability of a breach tomorrow?
//!
//! Probabilities are clipped to [1e-12, 1 − 1e-12] before taking logs so
//! that samples with no breaches (or only breaches) give finite statistics.

use crate::error::{Result, RiskError, check_probability};
use crate::portfolio::PnlSeries;
use crate::var::{RiskEngine, RollingRisk, VarConfig};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ChiSquared, ContinuousCDF};
use tracing::info;

const PROBABILITY_FLOOR: f64 = 1e-12;

fn clip(p: f64) -> f64 {
    p.clamp(PROBABILITY_FLOOR, 1.0 - PROBABILITY_FLOOR)
}

fn chi_squared_p_value(statistic: f64) -> Result<f64> {
    let dist = ChiSquared::new(1.0).map_err(|e| RiskError::InvalidParameter(e.to_string()))?;
    Ok(1.0 - dist.cdf(statistic))
}

/// Backtest configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    /// Trailing window for each VaR forecast (default: 250)
    pub window: usize,
    /// VaR confidence level (default: 0.99)
    pub confidence: f64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            window: 250,
            confidence: 0.99,
        }
    }
}

/// Likelihood-ratio statistic and its χ²(1) p-value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoverageTest {
    /// LR statistic
    pub statistic: f64,
    /// P-value under the null hypothesis
    pub p_value: f64,
}

impl CoverageTest {
    fn from_statistic(statistic: f64) -> Result<Self> {
        let statistic = statistic.max(0.0);
        Ok(Self {
            statistic,
            p_value: chi_squared_p_value(statistic)?,
        })
    }

    /// Whether the null is rejected at `significance`.
    pub fn rejects(&self, significance: f64) -> bool {
        self.p_value < significance
    }
}

/// Kupiec proportion-of-failures test.
///
/// # Errors
/// [`RiskError::InsufficientData`] for an empty sequence,
/// [`RiskError::InvalidParameter`] for α outside (0, 1).
pub fn kupiec_test(breaches: &[bool], confidence: f64) -> Result<CoverageTest> {
    check_probability("confidence", confidence)?;
    let n = breaches.len();
    if n == 0 {
        return Err(RiskError::too_few(1, 0));
    }
    let x = breaches.iter().filter(|&&b| b).count() as f64;
    let n = n as f64;
    let p = 1.0 - confidence;
    let p_hat = clip(x / n);

    let ll_null = (n - x) * (1.0 - p).ln() + x * p.ln();
    let ll_alt = (n - x) * (1.0 - p_hat).ln() + x * p_hat.ln();
    CoverageTest::from_statistic(-2.0 * (ll_null - ll_alt))
}

/// Christoffersen independence test on breach transitions.
///
/// # Errors
/// [`RiskError::InsufficientData`] with fewer than 2 points.
pub fn christoffersen_test(breaches: &[bool]) -> Result<CoverageTest> {
    if breaches.len() < 2 {
        return Err(RiskError::too_few(2, breaches.len()));
    }

    let mut counts = [[0_usize; 2]; 2];
    for pair in breaches.windows(2) {
        counts[usize::from(pair[0])][usize::from(pair[1])] += 1;
    }
    let [[n00, n01], [n10, n11]] = counts.map(|row| row.map(|c| c as f64));

    let ratio = |num: f64, den: f64| if den > 0.0 { num / den } else { 0.0 };
    let p01 = clip(ratio(n01, n00 + n01));
    let p11 = clip(ratio(n11, n10 + n11));
    let pi = clip(ratio(n01 + n11, n00 + n01 + n10 + n11));

    let ll_ind = n00 * (1.0 - p01).ln() + n01 * p01.ln() + n10 * (1.0 - p11).ln() + n11 * p11.ln();
    let ll_const = (n00 + n10) * (1.0 - pi).ln() + (n01 + n11) * pi.ln();
    CoverageTest::from_statistic(-2.0 * (ll_const - ll_ind))
}

/// Result of a VaR backtest.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestReport {
    /// Confidence level α
    pub confidence: f64,
    /// Trailing window length
    pub window: usize,
    /// Number of forecast dates
    pub observations: usize,
    /// Number of dates whose loss exceeded the forecast VaR
    pub breaches: usize,
    /// Expected breaches, `(1 − α)·observations`
    pub expected_breaches: f64,
    /// Unconditional coverage test
    pub kupiec: CoverageTest,
    /// Independence test
    pub christoffersen: CoverageTest,
    /// Forecast and realised PnL per date
    pub points: Vec<RollingRisk>,
}

impl BacktestReport {
    /// Observed breach frequency.
    pub fn breach_rate(&self) -> f64 {
        self.breaches as f64 / self.observations as f64
    }
}

/// Rolling VaR backtest of a PnL series.
#[derive(Debug, Clone)]
pub struct Backtester {
    config: BacktestConfig,
    engine: RiskEngine,
}

impl Backtester {
    /// Create a backtester.
    ///
    /// # Errors
    /// Returns [`RiskError::InvalidParameter`] for an invalid confidence or a
    /// window below 2.
    pub fn new(config: BacktestConfig) -> Result<Self> {
        if config.window < 2 {
            return Err(RiskError::InvalidParameter(format!(
                "backtest window must be at least 2, got {}",
                config.window
            )));
        }
        let engine = RiskEngine::new(VarConfig {
            confidence: config.confidence,
            ..VarConfig::default()
        })?;
        Ok(Self { config, engine })
    }

    /// Create with default configuration.
    ///
    /// # Errors
    /// Returns an error if the default configuration is invalid (should not happen).
    pub fn try_default() -> Result<Self> {
        Self::new(BacktestConfig::default())
    }

    /// Run the backtest.
    ///
    /// The series needs at least `window + 2` observations so that the
    /// independence test sees one transition.
    pub fn run(&self, pnl: &PnlSeries) -> Result<BacktestReport> {
        let points = self.engine.rolling(pnl, self.config.window)?;
        let breaches: Vec<bool> = points.iter().map(RollingRisk::is_breach).collect();

        let kupiec = kupiec_test(&breaches, self.config.confidence)?;
        let christoffersen = christoffersen_test(&breaches)?;
        let count = breaches.iter().filter(|&&b| b).count();

        let report = BacktestReport {
            confidence: self.config.confidence,
            window: self.config.window,
            observations: points.len(),
            breaches: count,
            expected_breaches: (1.0 - self.config.confidence) * points.len() as f64,
            kupiec,
            christoffersen,
            points,
        };
        info!(
            observations = report.observations,
            breaches = report.breaches,
            kupiec_p = report.kupiec.p_value,
            christoffersen_p = report.christoffersen.p_value,
            "VaR backtest complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use chrono::{Duration, NaiveDate};

    fn flags(pattern: &[u8]) -> Vec<bool> {
        pattern.iter().map(|&b| b == 1).collect()
    }

    #[test]
    fn test_kupiec_matching_rate_is_not_rejected() {
        let mut breaches = vec![false; 100];
        breaches[40] = true;
        let test = kupiec_test(&breaches, 0.99).unwrap();
        assert_abs_diff_eq!(test.statistic, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(test.p_value, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_kupiec_excess_breaches() {
        let mut breaches = vec![false; 100];
        for i in [3, 20, 41, 77, 90] {
            breaches[i] = true;
        }
        let test = kupiec_test(&breaches, 0.99).unwrap();
        assert_abs_diff_eq!(test.statistic, 8.258_217_002_871_66, epsilon = 1e-9);
        assert_abs_diff_eq!(test.p_value, 0.004_056_795_256_739_731, epsilon = 1e-7);
        assert!(test.rejects(0.05));
    }

    #[test]
    fn test_kupiec_no_breaches_is_finite() {
        let test = kupiec_test(&[false; 50], 0.99).unwrap();
        assert!(test.statistic.is_finite());
        assert!(test.p_value > 0.0);
    }

    #[test]
    fn test_kupiec_empty() {
        assert!(kupiec_test(&[], 0.99).unwrap_err().is_insufficient_data());
    }

    #[test]
    fn test_christoffersen_clustered() {
        let breaches = flags(&[0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 0, 0, 0, 0, 0, 0, 0]);
        let test = christoffersen_test(&breaches).unwrap();
        assert_abs_diff_eq!(test.statistic, 5.273_750_276_267_506, epsilon = 1e-9);
        assert!(test.rejects(0.05));
    }

    #[test]
    fn test_christoffersen_spread_out() {
        let breaches: Vec<bool> = (0..20).map(|i| i % 4 == 0).collect();
        let test = christoffersen_test(&breaches).unwrap();
        assert_abs_diff_eq!(test.statistic, 2.805_271_805_902_109, epsilon = 1e-9);
        assert!(!test.rejects(0.05));
    }

    #[test]
    fn test_christoffersen_without_breaches() {
        let test = christoffersen_test(&[false; 30]).unwrap();
        assert_abs_diff_eq!(test.statistic, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_backtest_run() {
        let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
        let values: Vec<f64> = (0..40)
            .map(|i| if i % 10 == 9 { -0.05 } else { ((i % 7) as f64 - 3.0) / 1000.0 })
            .collect();
        let pnl = PnlSeries::from_pairs(
            values
                .iter()
                .enumerate()
                .map(|(i, &v)| (start + Duration::days(i as i64), v)),
        )
        .unwrap();

        let backtester = Backtester::new(BacktestConfig {
            window: 20,
            confidence: 0.95,
        })
        .unwrap();
        let report = backtester.run(&pnl).unwrap();

        assert_eq!(report.observations, 20);
        assert_eq!(report.points.len(), 20);
        assert_abs_diff_eq!(report.expected_breaches, 1.0, epsilon = 1e-12);
        assert_eq!(
            report.breaches,
            report.points.iter().filter(|p| p.is_breach()).count()
        );
        assert!(report.breach_rate() <= 1.0);
        assert!(report.kupiec.p_value >= 0.0 && report.kupiec.p_value <= 1.0);
    }

    #[test]
    fn test_backtest_invalid_window() {
        let err = Backtester::new(BacktestConfig {
            window: 1,
            confidence: 0.99,
        })
        .unwrap_err();
        assert!(matches!(err, RiskError::InvalidParameter(_)));
    }
}
