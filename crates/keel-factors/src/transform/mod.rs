//! Transformation rules from market series to risk factors.
//!
//! Every rule works on consecutive pairs (P_{t-1}, P_t) and emits one factor
//! observation stamped at t. A pair that touches a missing value is dropped
//! and its timestamp recorded as excluded; nothing is interpolated.

pub mod dv01;
pub mod fx_mid;
pub mod log_return;
pub mod yield_bps;

pub use dv01::dv01_scaled_return;
pub use fx_mid::{fx_mid_return, mid_series};
pub use log_return::log_return;
pub use yield_bps::{yield_change_bps, yield_change_bps_quoted};

use crate::error::{FactorError, Result};
use crate::series::{Observation, RiskFactorSeries, Timestamp};
use crate::tag::FactorTag;
use tracing::warn;

/// Minimum number of source observations for any rule.
pub const MIN_OBSERVATIONS: usize = 2;

pub(crate) fn require_length(len: usize, rule: &str) -> Result<()> {
    if len < MIN_OBSERVATIONS {
        return Err(FactorError::InvalidInput(format!(
            "{rule} needs at least {MIN_OBSERVATIONS} observations, got {len}"
        )));
    }
    Ok(())
}

/// Apply `rule(prev, cur)` to every consecutive pair.
///
/// Returns the factor observations and the timestamps dropped because either
/// side of the pair was missing.
pub(crate) fn consecutive_pairs(
    observations: &[Observation],
    rule: impl Fn(f64, f64) -> f64,
) -> (Vec<Observation>, Vec<Timestamp>) {
    let mut factors = Vec::with_capacity(observations.len().saturating_sub(1));
    let mut excluded = Vec::new();

    for pair in observations.windows(2) {
        let (prev, cur) = (pair[0], pair[1]);
        if prev.is_missing() || cur.is_missing() {
            excluded.push(cur.timestamp);
        } else {
            factors.push(Observation::new(cur.timestamp, rule(prev.value, cur.value)));
        }
    }

    (factors, excluded)
}

pub(crate) fn finish(
    tag: FactorTag,
    observations: Vec<Observation>,
    excluded: Vec<Timestamp>,
) -> Result<RiskFactorSeries> {
    if !excluded.is_empty() {
        warn!(
            factor = %tag,
            excluded = excluded.len(),
            first = %excluded[0],
            "dropped factor observations adjacent to missing values"
        );
    }
    RiskFactorSeries::new(tag, observations, excluded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn d(day: u32) -> Timestamp {
        NaiveDate::from_ymd_opt(2024, 5, day).unwrap()
    }

    fn obs(day: u32, value: f64) -> Observation {
        Observation::new(d(day), value)
    }

    #[test]
    fn test_missing_value_drops_both_adjacent_pairs() {
        let source = [obs(1, 1.0), obs(2, 2.0), obs(3, f64::NAN), obs(6, 4.0), obs(7, 5.0)];
        let (factors, excluded) = consecutive_pairs(&source, |p, c| c - p);

        assert_eq!(factors, vec![obs(2, 1.0), obs(7, 1.0)]);
        assert_eq!(excluded, vec![d(3), d(6)]);
    }

    #[test]
    fn test_require_length() {
        assert!(require_length(1, "rule").is_err());
        assert!(require_length(2, "rule").is_ok());
    }
}
