//! Risk limit monitoring.

use crate::error::{Result, RiskError};
use crate::stress::StressResult;
use crate::var::RiskReport;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Utilisation level of a limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitStatus {
    /// Below the warning threshold
    Ok,
    /// Between the warning threshold and the limit
    Near,
    /// Above the limit
    Breach,
}

impl fmt::Display for LimitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ok => "OK",
            Self::Near => "NEAR",
            Self::Breach => "BREACH",
        })
    }
}

/// Metric a limit applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitMetric {
    /// Value-at-Risk
    Var,
    /// Expected Shortfall
    Es,
    /// Stress scenario loss
    StressLoss,
}

impl fmt::Display for LimitMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Var => "VaR",
            Self::Es => "ES",
            Self::StressLoss => "Stress loss",
        })
    }
}

/// Loss limits; unset limits are not checked.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskLimits {
    /// VaR limit
    pub var: Option<f64>,
    /// ES limit
    pub es: Option<f64>,
    /// Stress loss limit
    pub stress_loss: Option<f64>,
    /// Utilisation at which a limit turns `Near` (default: 0.8)
    pub warning_ratio: f64,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            var: None,
            es: None,
            stress_loss: None,
            warning_ratio: 0.8,
        }
    }
}

/// One checked limit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LimitCheck {
    /// Metric checked
    pub metric: LimitMetric,
    /// Observed loss
    pub value: f64,
    /// Limit
    pub limit: f64,
    /// `value / limit`
    pub utilization: f64,
    /// Resulting status
    pub status: LimitStatus,
}

impl RiskLimits {
    /// Check the limits.
    ///
    /// # Errors
    /// Returns [`RiskError::InvalidParameter`] for a non-positive limit or a
    /// warning ratio outside (0, 1].
    pub fn validate(&self) -> Result<()> {
        if !(self.warning_ratio > 0.0 && self.warning_ratio <= 1.0) {
            return Err(RiskError::InvalidParameter(format!(
                "warning_ratio must lie in (0, 1], got {}",
                self.warning_ratio
            )));
        }
        for (metric, limit) in self.configured() {
            if !(limit.is_finite() && limit > 0.0) {
                return Err(RiskError::InvalidParameter(format!(
                    "{metric} limit must be positive, got {limit}"
                )));
            }
        }
        Ok(())
    }

    fn configured(&self) -> impl Iterator<Item = (LimitMetric, f64)> {
        [
            (LimitMetric::Var, self.var),
            (LimitMetric::Es, self.es),
            (LimitMetric::StressLoss, self.stress_loss),
        ]
        .into_iter()
        .filter_map(|(m, l)| l.map(|l| (m, l)))
    }

    /// Status of a loss against a limit.
    pub fn status(&self, value: f64, limit: f64) -> LimitStatus {
        if value <= self.warning_ratio * limit {
            LimitStatus::Ok
        } else if value <= limit {
            LimitStatus::Near
        } else {
            LimitStatus::Breach
        }
    }

    /// Check VaR, ES and (if given) stress loss against the configured limits.
    pub fn check(&self, report: &RiskReport, stress: Option<&StressResult>) -> Vec<LimitCheck> {
        self.configured()
            .filter_map(|(metric, limit)| {
                let value = match metric {
                    LimitMetric::Var => report.var,
                    LimitMetric::Es => report.es,
                    LimitMetric::StressLoss => stress?.loss(),
                };
                Some(LimitCheck {
                    metric,
                    value,
                    limit,
                    utilization: value / limit,
                    status: self.status(value, limit),
                })
            })
            .collect()
    }
}

/// Worst status among checks, `Ok` if there are none.
pub fn overall_status(checks: &[LimitCheck]) -> LimitStatus {
    checks
        .iter()
        .map(|c| c.status)
        .max()
        .unwrap_or(LimitStatus::Ok)
}
