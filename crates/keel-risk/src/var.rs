//! Historical Value-at-Risk and Expected Shortfall
//!
//! Both measures are read from the empirical loss distribution of a PnL
//! series, with no distributional assumption.
//!
//! Losses are `L = -PnL`, sorted ascending. For confidence α and `n` losses
//! the VaR is the α-quantile of `L` read at rank `h = α·(n−1)`:
//!
//! VaR = L_(⌊h⌋) + (h − ⌊h⌋) · (L_(⌊h⌋+1) − L_(⌊h⌋))
//!
//! which equals minus the (1−α)-quantile of PnL under the same interpolation.
//! ES is the mean of all losses at or beyond the VaR. Both are reported as
//! non-negative loss amounts: a sample whose α-quantile loss is a gain yields
//! zero VaR and zero ES.

use crate::error::{Result, RiskError, check_finite, check_probability};
use crate::portfolio::PnlSeries;
use keel_factors::Timestamp;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// VaR/ES configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VarConfig {
    /// Confidence level α in (0, 1) (default: 0.99)
    pub confidence: f64,
    /// Minimum sample size (default: 2, never lower)
    pub min_observations: usize,
}

impl Default for VarConfig {
    fn default() -> Self {
        Self {
            confidence: 0.99,
            min_observations: 2,
        }
    }
}

impl VarConfig {
    /// Check the configuration.
    ///
    /// # Errors
    /// Returns [`RiskError::InvalidParameter`] if α is outside (0, 1) or the
    /// minimum sample size is below 2.
    pub fn validate(&self) -> Result<()> {
        check_probability("confidence", self.confidence)?;
        if self.min_observations < 2 {
            return Err(RiskError::InvalidParameter(format!(
                "min_observations must be at least 2, got {}",
                self.min_observations
            )));
        }
        Ok(())
    }
}

/// VaR and ES of one PnL sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskReport {
    /// Confidence level α
    pub confidence: f64,
    /// Value-at-Risk, a non-negative loss
    pub var: f64,
    /// Expected Shortfall, a non-negative loss, never below `var`
    pub es: f64,
    /// Number of PnL observations
    pub sample_size: usize,
    /// Number of losses at or beyond the VaR quantile
    pub tail_size: usize,
    /// Set when no loss reached the quantile and ES fell back to the worst loss.
    ///
    /// The interpolated quantile never exceeds the largest loss, so this stays
    /// `false` for results of [`RiskEngine`]; the fallback only guards
    /// the tail average against a cutoff above the sample.
    pub tail_degenerate: bool,
}

/// VaR/ES forecast for one date of a rolling evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RollingRisk {
    /// Date the forecast applies to
    pub timestamp: Timestamp,
    /// VaR from the trailing window, excluding this date
    pub var: f64,
    /// ES from the trailing window, excluding this date
    pub es: f64,
    /// PnL realised on this date
    pub realized_pnl: f64,
}

impl RollingRisk {
    /// Whether the realised loss exceeded the forecast VaR.
    pub fn is_breach(&self) -> bool {
        -self.realized_pnl > self.var
    }
}

/// Linear-interpolation quantile of an ascending sample at level `alpha`.
///
/// The rank is `alpha·(n−1)`; the result lies between the two neighbouring
/// order statistics. Returns `None` for an empty sample.
pub fn quantile_linear(sorted: &[f64], alpha: f64) -> Option<f64> {
    let last = sorted.len().checked_sub(1)?;
    let h = alpha.clamp(0.0, 1.0) * last as f64;
    let lo = (h.floor() as usize).min(last);
    let frac = h - lo as f64;
    Some(match sorted.get(lo + 1) {
        Some(&next) if frac > 0.0 => (sorted[lo] + frac * (next - sorted[lo])).min(next),
        _ => sorted[lo],
    })
}

/// Mean of the losses at or beyond `cutoff`.
///
/// Returns `(mean, tail_size, degenerate)`. With an empty tail the mean falls
/// back to the worst loss and the degenerate flag is set. A cutoff from
/// [`quantile_linear`] is at most the largest loss, so that branch is not
/// reached from [`RiskEngine::evaluate_values`].
fn tail_mean(sorted_losses: &[f64], cutoff: f64) -> (f64, usize, bool) {
    let start = sorted_losses.partition_point(|&l| l < cutoff);
    let tail = &sorted_losses[start..];
    if tail.is_empty() {
        let worst = sorted_losses.last().copied().unwrap_or(0.0);
        return (worst, 0, true);
    }
    (tail.iter().sum::<f64>() / tail.len() as f64, tail.len(), false)
}

const fn non_negative(loss: f64) -> f64 {
    if loss > 0.0 { loss } else { 0.0 }
}

/// Historical VaR/ES calculator.
#[derive(Debug, Clone)]
pub struct RiskEngine {
    config: VarConfig,
}

impl RiskEngine {
    /// Create an engine.
    ///
    /// # Errors
    /// See [`VarConfig::validate`].
    pub fn new(config: VarConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Engine at the given confidence with default settings otherwise.
    pub fn with_confidence(confidence: f64) -> Result<Self> {
        Self::new(VarConfig {
            confidence,
            ..VarConfig::default()
        })
    }

    /// Create with default configuration.
    ///
    /// # Errors
    /// Returns an error if the default configuration is invalid (should not happen).
    pub fn try_default() -> Result<Self> {
        Self::new(VarConfig::default())
    }

    /// Configuration in use.
    pub const fn config(&self) -> &VarConfig {
        &self.config
    }

    /// VaR and ES of a PnL series.
    pub fn evaluate(&self, pnl: &PnlSeries) -> Result<RiskReport> {
        self.evaluate_values(&pnl.values())
    }

    /// VaR and ES of raw PnL values (time order is irrelevant).
    ///
    /// # Errors
    /// - [`RiskError::InsufficientData`] below the minimum sample size
    /// - [`RiskError::InvalidInput`] for non-finite values
    pub fn evaluate_values(&self, pnl: &[f64]) -> Result<RiskReport> {
        let n = pnl.len();
        if n < self.config.min_observations {
            return Err(RiskError::too_few(self.config.min_observations, n));
        }
        check_finite(pnl, "PnL")?;

        let mut losses: Vec<f64> = pnl.iter().map(|p| -p).collect();
        losses.sort_by(f64::total_cmp);

        let alpha = self.config.confidence;
        let quantile = quantile_linear(&losses, alpha).unwrap_or(0.0);
        let (tail_avg, tail_size, tail_degenerate) = tail_mean(&losses, quantile);
        // A tail average can round below its own cutoff.
        let es_raw = tail_avg.max(quantile);
        if tail_degenerate {
            warn!(alpha, sample = n, "empty VaR tail, ES falls back to worst loss");
        }

        let report = RiskReport {
            confidence: alpha,
            var: non_negative(quantile),
            es: non_negative(es_raw),
            sample_size: n,
            tail_size,
            tail_degenerate,
        };
        debug!(
            alpha,
            sample = n,
            var = report.var,
            es = report.es,
            "historical VaR"
        );
        Ok(report)
    }

    /// Rolling one-step-ahead VaR/ES.
    ///
    /// The forecast for date `i` uses the `window` observations strictly
    /// before it, so the first forecast is for the observation at index
    /// `window`.
    ///
    /// # Errors
    /// - [`RiskError::InvalidParameter`] if `window` is below the minimum sample size
    /// - [`RiskError::InsufficientData`] if there is no date to forecast
    pub fn rolling(&self, pnl: &PnlSeries, window: usize) -> Result<Vec<RollingRisk>> {
        if window < self.config.min_observations {
            return Err(RiskError::InvalidParameter(format!(
                "rolling window {window} is below the minimum sample size {}",
                self.config.min_observations
            )));
        }
        let values = pnl.values();
        if values.len() <= window {
            return Err(RiskError::too_few(window + 1, values.len()));
        }

        pnl.observations()
            .iter()
            .enumerate()
            .skip(window)
            .map(|(i, obs)| {
                let report = self.evaluate_values(&values[i - window..i])?;
                Ok(RollingRisk {
                    timestamp: obs.timestamp,
                    var: report.var,
                    es: report.es,
                    realized_pnl: obs.value,
                })
            })
            .collect()
    }
}

/// VaR and ES of `pnl` at confidence `alpha` with default settings.
pub fn historical_var_es(pnl: &[f64], alpha: f64) -> Result<RiskReport> {
    RiskEngine::with_confidence(alpha)?.evaluate_values(pnl)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use chrono::{Duration, NaiveDate};
    use rstest::rstest;

    const SAMPLE: [f64; 6] = [-0.05, -0.03, -0.01, 0.00, 0.02, 0.04];

    fn pnl(values: &[f64]) -> PnlSeries {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        PnlSeries::from_pairs(
            values
                .iter()
                .enumerate()
                .map(|(i, &v)| (start + Duration::days(i as i64), v)),
        )
        .unwrap()
    }

    #[test]
    fn test_reference_sample() {
        let report = historical_var_es(&SAMPLE, 0.95).unwrap();
        assert_abs_diff_eq!(report.var, 0.045, epsilon = 1e-12);
        assert_abs_diff_eq!(report.es, 0.05, epsilon = 1e-12);
        assert_eq!(report.sample_size, 6);
        assert_eq!(report.tail_size, 1);
        assert!(!report.tail_degenerate);
    }

    #[test]
    fn test_order_does_not_matter() {
        let mut shuffled = SAMPLE;
        shuffled.reverse();
        shuffled.swap(1, 4);
        assert_eq!(
            historical_var_es(&shuffled, 0.95).unwrap(),
            historical_var_es(&SAMPLE, 0.95).unwrap()
        );
    }

    #[rstest]
    #[case(0.0)]
    #[case(1.0)]
    #[case(-0.5)]
    #[case(f64::NAN)]
    fn test_invalid_confidence(#[case] alpha: f64) {
        let err = historical_var_es(&SAMPLE, alpha).unwrap_err();
        assert!(matches!(err, RiskError::InvalidParameter(_)));
    }

    #[rstest]
    #[case(&[])]
    #[case(&[-0.01])]
    fn test_too_few_observations(#[case] values: &[f64]) {
        let err = historical_var_es(values, 0.99).unwrap_err();
        assert_eq!(
            err,
            RiskError::too_few(2, values.len())
        );
    }

    #[test]
    fn test_non_finite_pnl_rejected() {
        let err = historical_var_es(&[0.01, f64::INFINITY], 0.9).unwrap_err();
        assert!(matches!(err, RiskError::InvalidInput(_)));
    }

    #[test]
    fn test_all_gains_floor_at_zero() {
        let report = historical_var_es(&[0.01, 0.02, 0.03, 0.04], 0.95).unwrap();
        assert_eq!(report.var, 0.0);
        assert_eq!(report.es, 0.0);
        assert!(report.var.is_sign_positive());
    }

    #[test]
    fn test_constant_losses() {
        let report = historical_var_es(&[-0.02; 5], 0.99).unwrap();
        assert_abs_diff_eq!(report.var, 0.02, epsilon = 1e-15);
        assert_abs_diff_eq!(report.es, 0.02, epsilon = 1e-15);
        assert_eq!(report.tail_size, 5);
    }

    #[test]
    fn test_quantile_linear() {
        let sorted = [1.0, 2.0, 4.0];
        assert_eq!(quantile_linear(&sorted, 0.0), Some(1.0));
        assert_eq!(quantile_linear(&sorted, 0.5), Some(2.0));
        assert_eq!(quantile_linear(&sorted, 0.75), Some(3.0));
        assert_eq!(quantile_linear(&sorted, 1.0), Some(4.0));
        assert_eq!(quantile_linear(&[], 0.5), None);
    }

    #[test]
    fn test_extreme_confidence_keeps_a_tail() {
        let report = historical_var_es(&[-0.05, 0.01], 0.999999).unwrap();
        assert_abs_diff_eq!(report.var, 0.05 - 0.06 * 1e-6, epsilon = 1e-12);
        assert_eq!(report.es, 0.05);
        assert_eq!(report.tail_size, 1);
        assert!(!report.tail_degenerate);
    }

    #[test]
    fn test_tail_mean_degenerate_fallback() {
        let (mean, size, degenerate) = tail_mean(&[0.01, 0.02, 0.03], 0.05);
        assert_eq!(mean, 0.03);
        assert_eq!(size, 0);
        assert!(degenerate);

        let (mean, size, degenerate) = tail_mean(&[0.01, 0.02, 0.03], 0.02);
        assert_abs_diff_eq!(mean, 0.025, epsilon = 1e-15);
        assert_eq!(size, 2);
        assert!(!degenerate);
    }

    #[test]
    fn test_rolling_uses_prior_window_only() {
        let values = [-0.05, -0.03, -0.01, 0.00, 0.02, 0.04, -0.10, 0.01];
        let engine = RiskEngine::with_confidence(0.95).unwrap();
        let points = engine.rolling(&pnl(&values), 6).unwrap();

        assert_eq!(points.len(), 2);
        assert_abs_diff_eq!(points[0].var, 0.045, epsilon = 1e-12);
        assert_eq!(points[0].realized_pnl, -0.10);
        assert!(points[0].is_breach());

        let second = engine.evaluate_values(&values[1..7]).unwrap();
        assert_eq!(points[1].var, second.var);
        assert!(!points[1].is_breach());
    }

    #[test]
    fn test_rolling_needs_a_forecast_date() {
        let engine = RiskEngine::try_default().unwrap();
        let err = engine.rolling(&pnl(&SAMPLE), 6).unwrap_err();
        assert_eq!(
            err,
            RiskError::too_few(7, 6)
        );
        assert!(matches!(
            engine.rolling(&pnl(&SAMPLE), 1),
            Err(RiskError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_config_from_json_uses_defaults() {
        let config: VarConfig = serde_json::from_str(r#"{"confidence": 0.975}"#).unwrap();
        assert_eq!(config.min_observations, 2);
        assert!(RiskEngine::new(config).is_ok());
    }
}
