//! DV01-Scaled Futures Return
//!
//! factor_t = r_t * dv01
//!
//! The DV01 comes from an external pricing collaborator; the engine only
//! checks that it is finite.

use crate::error::{FactorError, Result};
use crate::series::RiskFactorSeries;
use crate::tag::{FactorTag, Transformation};

/// Scale a futures log-return series by its DV01.
///
/// # Errors
/// * `InvalidInput` if `dv01` is not finite or the input is not a log-return
///   series
pub fn dv01_scaled_return(
    futures_returns: &RiskFactorSeries,
    dv01: f64,
) -> Result<RiskFactorSeries> {
    if !dv01.is_finite() {
        return Err(FactorError::InvalidInput(format!(
            "dv01 must be finite, got {dv01}"
        )));
    }
    if futures_returns.tag().transformation() != Transformation::LogReturn {
        return Err(FactorError::InvalidInput(format!(
            "dv01 scaling expects a log-return series, got {}",
            futures_returns.tag()
        )));
    }

    Ok(futures_returns
        .clone()
        .map_values(|r| r * dv01)
        .retag(FactorTag::RATE_FUTURE))
}
