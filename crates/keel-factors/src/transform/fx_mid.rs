//! FX Mid Return
//!
//! Mid_t = (Bid_t + Ask_t) / 2, factor_t = ln(Mid_t / Mid_{t-1})
//!
//! Bid and ask must share timestamps exactly. A crossed quote (bid above
//! ask) is rejected rather than passed through.

use super::log_return;
use crate::error::{FactorError, Result};
use crate::series::{Observation, PriceSeries, RiskFactorSeries};
use crate::tag::FactorTag;

/// Mid series of aligned bid and ask quotes.
///
/// A missing value on either side gives a missing mid.
///
/// # Errors
/// * `MisalignedSeries` if the timestamp sets differ
/// * `InvalidInput` if any bid is above its ask
pub fn mid_series(bid: &PriceSeries, ask: &PriceSeries) -> Result<PriceSeries> {
    if bid.len() != ask.len() {
        return Err(FactorError::MisalignedSeries(format!(
            "bid has {} observations, ask has {}",
            bid.len(),
            ask.len()
        )));
    }

    let mut mids = Vec::with_capacity(bid.len());
    for (b, a) in bid.observations().iter().zip(ask.observations()) {
        if b.timestamp != a.timestamp {
            return Err(FactorError::MisalignedSeries(format!(
                "bid at {} paired with ask at {}",
                b.timestamp, a.timestamp
            )));
        }
        if b.value > a.value {
            return Err(FactorError::InvalidInput(format!(
                "crossed quote at {}: bid {} above ask {}",
                b.timestamp, b.value, a.value
            )));
        }
        mids.push(Observation::new(b.timestamp, (b.value + a.value) / 2.0));
    }

    PriceSeries::new(mids)
}

/// Log returns of the bid/ask mid.
pub fn fx_mid_return(bid: &PriceSeries, ask: &PriceSeries) -> Result<RiskFactorSeries> {
    let mid = mid_series(bid, ask)?;
    Ok(log_return(&mid)?.retag(FactorTag::FX))
}
