//! Error types for factor construction.

use crate::tag::{AssetClass, Transformation};
use thiserror::Error;

/// Result type for factor operations.
pub type Result<T> = std::result::Result<T, FactorError>;

/// Errors that can occur while building risk factors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FactorError {
    /// Malformed, non-positive or non-finite input values
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Two series that must share timestamps do not
    #[error("Misaligned series: {0}")]
    MisalignedSeries(String),

    /// A transformation was paired with an asset class it does not belong to
    #[error("Transformation {transformation} does not apply to asset class {asset_class}")]
    TagMismatch {
        /// Declared asset class
        asset_class: AssetClass,
        /// Offending transformation
        transformation: Transformation,
    },

    /// Failure while building the factor of a specific instrument
    #[error("Instrument {instrument}: {source}")]
    Instrument {
        /// Instrument identifier
        instrument: String,
        /// Underlying error
        #[source]
        source: Box<FactorError>,
    },
}

impl FactorError {
    /// Attach an instrument identifier to this error.
    pub fn for_instrument(self, instrument: impl Into<String>) -> Self {
        Self::Instrument {
            instrument: instrument.into(),
            source: Box::new(self),
        }
    }

    /// Instrument the error is attached to, if any.
    pub fn instrument(&self) -> Option<&str> {
        match self {
            Self::Instrument { instrument, .. } => Some(instrument),
            _ => None,
        }
    }
}
