//! Log Return
//!
//! factor_t = ln(P_t / P_{t-1})
//!
//! Used for equities and indices, and as the first step of the FX and
//! futures rules.

use super::{consecutive_pairs, finish, require_length};
use crate::error::{FactorError, Result};
use crate::series::{PriceSeries, RiskFactorSeries};
use crate::tag::FactorTag;

/// Log returns of a strictly positive price series.
///
/// # Errors
/// * `InvalidInput` if the series has fewer than two observations or any
///   present price is zero or negative
pub fn log_return(series: &PriceSeries) -> Result<RiskFactorSeries> {
    require_length(series.len(), "log_return")?;

    if let Some(bad) = series
        .observations()
        .iter()
        .find(|o| !o.is_missing() && o.value <= 0.0)
    {
        return Err(FactorError::InvalidInput(format!(
            "non-positive price {} at {}",
            bad.value, bad.timestamp
        )));
    }

    let (observations, excluded) =
        consecutive_pairs(series.observations(), |prev, cur| (cur / prev).ln());
    finish(FactorTag::EQUITY, observations, excluded)
}
