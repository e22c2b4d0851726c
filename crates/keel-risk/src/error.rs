//! Error types for risk computations.

use keel_factors::FactorError;
use thiserror::Error;

/// Result type for risk operations.
pub type Result<T> = std::result::Result<T, RiskError>;

/// Errors that can occur while aggregating, measuring or hedging risk.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RiskError {
    /// Factor construction error
    #[error("Factor error: {0}")]
    Factor(#[from] FactorError),

    /// A weight, sensitivity or hedge refers to an instrument with no factor series
    #[error("Unknown instrument: {0}")]
    UnknownInstrument(String),

    /// The series to combine share no timestamp
    #[error("Empty intersection: {series} series share no timestamp")]
    EmptyIntersection {
        /// Number of series that were intersected
        series: usize,
    },

    /// Not enough usable observations for the statistic
    #[error("Insufficient data: {reason} (need {required} observations, got {actual})")]
    InsufficientData {
        /// Required number of observations
        required: usize,
        /// Actual number of observations
        actual: usize,
        /// Why the sample is unusable
        reason: Shortfall,
    },

    /// Out-of-range configuration value
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Non-finite weights, sensitivities or PnL values
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The hedge instrument has zero sensitivity
    #[error("Degenerate hedge: instrument {0} has zero sensitivity")]
    DegenerateHedge(String),

    /// Several hedge instruments were given without an objective to choose between them
    #[error("Underdetermined hedge: {hedges} hedge instruments require a hedge objective")]
    UnderdeterminedHedge {
        /// Number of hedge instruments
        hedges: usize,
    },
}

/// Reason a sample cannot support a statistic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Shortfall {
    /// Fewer points than required
    #[error("too few observations")]
    TooFewObservations,

    /// Enough points, but one side never moves
    #[error("{0} series is constant")]
    ZeroVariance(String),
}

impl RiskError {
    /// Too few observations.
    pub const fn too_few(required: usize, actual: usize) -> Self {
        Self::InsufficientData {
            required,
            actual,
            reason: Shortfall::TooFewObservations,
        }
    }

    /// A constant series over `actual` observations.
    pub fn zero_variance(series: &str, actual: usize) -> Self {
        Self::InsufficientData {
            required: 2,
            actual,
            reason: Shortfall::ZeroVariance(series.to_string()),
        }
    }

    /// Whether the error stems from a lack of usable observations.
    pub const fn is_insufficient_data(&self) -> bool {
        matches!(self, Self::InsufficientData { .. })
    }

    /// Whether the sample had a constant series.
    pub const fn is_zero_variance(&self) -> bool {
        matches!(
            self,
            Self::InsufficientData {
                reason: Shortfall::ZeroVariance(_),
                ..
            }
        )
    }
}

pub(crate) fn check_finite(values: &[f64], what: &str) -> Result<()> {
    match values.iter().position(|v| !v.is_finite()) {
        Some(i) => Err(RiskError::InvalidInput(format!(
            "{what} value at position {i} is not finite"
        ))),
        None => Ok(()),
    }
}

pub(crate) fn check_probability(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 && value < 1.0 {
        Ok(())
    } else {
        Err(RiskError::InvalidParameter(format!(
            "{name} must lie in (0, 1), got {value}"
        )))
    }
}
