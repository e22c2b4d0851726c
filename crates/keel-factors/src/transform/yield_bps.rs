//! Yield Change in Basis Points
//!
//! factor_t = (y_t - y_{t-1}) * multiplier
//!
//! The multiplier depends on the quote convention of the level series
//! (100 for percent levels). Yields may be zero or negative.

use super::{consecutive_pairs, finish, require_length};
use crate::error::Result;
use crate::series::{PriceSeries, RiskFactorSeries};
use crate::tag::{FactorTag, YieldQuote};

/// Yield changes in bps for levels quoted in percent.
pub fn yield_change_bps(yields: &PriceSeries) -> Result<RiskFactorSeries> {
    yield_change_bps_quoted(yields, YieldQuote::Percent)
}

/// Yield changes in bps for levels in the given quote convention.
pub fn yield_change_bps_quoted(
    yields: &PriceSeries,
    quote: YieldQuote,
) -> Result<RiskFactorSeries> {
    require_length(yields.len(), "yield_change_bps")?;

    let multiplier = quote.bps_multiplier();
    let (observations, excluded) =
        consecutive_pairs(yields.observations(), |prev, cur| (cur - prev) * multiplier);
    finish(FactorTag::RATE_YIELD, observations, excluded)
}
