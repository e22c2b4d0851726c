//! Factor Builder
//!
//! Dispatches raw market inputs to the transformation rule of their asset
//! class. The input type is a closed enum with one handler per variant, so
//! adding an asset class is a compile-time change everywhere it matters.

use crate::error::Result;
use crate::series::{FactorSet, InstrumentId, PriceSeries, RiskFactorSeries};
use crate::tag::{AssetClass, YieldQuote};
use crate::transform::{dv01_scaled_return, fx_mid_return, log_return, yield_change_bps_quoted};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Raw market data for one instrument, tagged by asset class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "asset_class", rename_all = "snake_case")]
pub enum MarketInput {
    /// Equity or index close prices
    Equity {
        /// Close prices
        prices: PriceSeries,
    },
    /// FX bid and ask quotes on identical timestamps
    Fx {
        /// Bid quotes
        bid: PriceSeries,
        /// Ask quotes
        ask: PriceSeries,
    },
    /// Yield index levels
    RateYield {
        /// Yield levels
        yields: PriceSeries,
        /// Quote convention of the levels
        #[serde(default)]
        quote: YieldQuote,
    },
    /// Rate futures prices with an externally computed DV01
    RateFuture {
        /// Futures prices
        prices: PriceSeries,
        /// DV01 per contract
        dv01: f64,
    },
}

impl MarketInput {
    /// Asset class of the input.
    pub const fn asset_class(&self) -> AssetClass {
        match self {
            Self::Equity { .. } => AssetClass::Equity,
            Self::Fx { .. } => AssetClass::Fx,
            Self::RateYield { .. } => AssetClass::RateYield,
            Self::RateFuture { .. } => AssetClass::RateFuture,
        }
    }
}

/// Stateless builder turning market inputs into risk factors.
#[derive(Debug, Clone, Copy, Default)]
pub struct FactorBuilder;

impl FactorBuilder {
    /// Build the factor series of a single input.
    pub fn build(input: &MarketInput) -> Result<RiskFactorSeries> {
        match input {
            MarketInput::Equity { prices } => log_return(prices),
            MarketInput::Fx { bid, ask } => fx_mid_return(bid, ask),
            MarketInput::RateYield { yields, quote } => yield_change_bps_quoted(yields, *quote),
            MarketInput::RateFuture { prices, dv01 } => {
                dv01_scaled_return(&log_return(prices)?, *dv01)
            }
        }
    }

    /// Build factor series for many instruments in parallel.
    ///
    /// Instruments are independent; results are merged by instrument key so
    /// the output does not depend on scheduling. If several inputs fail, the
    /// error of the first instrument in key order is returned.
    pub fn build_all(inputs: &BTreeMap<InstrumentId, MarketInput>) -> Result<FactorSet> {
        let built: Vec<Result<(InstrumentId, RiskFactorSeries)>> = inputs
            .par_iter()
            .map(|(instrument, input)| {
                Self::build(input)
                    .map(|series| (instrument.clone(), series))
                    .map_err(|e| e.for_instrument(instrument.as_str()))
            })
            .collect();

        let factors = built.into_iter().collect::<Result<FactorSet>>()?;
        debug!(instruments = factors.len(), "built factor set");
        Ok(factors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::Timestamp;
    use crate::tag::FactorTag;
    use approx::assert_abs_diff_eq;
    use chrono::NaiveDate;

    fn d(day: u32) -> Timestamp {
        NaiveDate::from_ymd_opt(2024, 7, day).unwrap()
    }

    fn prices(values: &[f64]) -> PriceSeries {
        PriceSeries::from_pairs(
            values
                .iter()
                .enumerate()
                .map(|(i, &v)| (d(i as u32 + 1), v)),
        )
        .unwrap()
    }

    #[test]
    fn test_build_dispatches_on_asset_class() {
        let inputs = [
            MarketInput::Equity {
                prices: prices(&[100.0, 101.0]),
            },
            MarketInput::Fx {
                bid: prices(&[1.09, 1.10]),
                ask: prices(&[1.11, 1.12]),
            },
            MarketInput::RateYield {
                yields: prices(&[4.20, 4.25]),
                quote: YieldQuote::Percent,
            },
            MarketInput::RateFuture {
                prices: prices(&[110.0, 110.5]),
                dv01: 85.0,
            },
        ];

        for input in &inputs {
            let factor = FactorBuilder::build(input).unwrap();
            assert_eq!(factor.tag(), FactorTag::for_class(input.asset_class()));
            assert_eq!(factor.len(), 1);
        }
    }

    #[test]
    fn test_rate_future_scales_log_return() {
        let input = MarketInput::RateFuture {
            prices: prices(&[110.0, 110.5]),
            dv01: 85.0,
        };
        let factor = FactorBuilder::build(&input).unwrap();
        assert_abs_diff_eq!(
            factor.value_at(d(2)).unwrap(),
            (110.5_f64 / 110.0).ln() * 85.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_build_all_merges_by_key() {
        let mut inputs = BTreeMap::new();
        inputs.insert(
            "B".to_string(),
            MarketInput::Equity {
                prices: prices(&[10.0, 11.0, 12.0]),
            },
        );
        inputs.insert(
            "A".to_string(),
            MarketInput::RateYield {
                yields: prices(&[1.0, 1.1, 1.3]),
                quote: YieldQuote::Percent,
            },
        );

        let factors = FactorBuilder::build_all(&inputs).unwrap();
        assert_eq!(factors.keys().collect::<Vec<_>>(), vec!["A", "B"]);
        assert_eq!(factors["A"].tag(), FactorTag::RATE_YIELD);
    }

    #[test]
    fn test_build_all_reports_failing_instrument() {
        let mut inputs = BTreeMap::new();
        inputs.insert(
            "OK".to_string(),
            MarketInput::Equity {
                prices: prices(&[10.0, 11.0]),
            },
        );
        inputs.insert(
            "BAD".to_string(),
            MarketInput::Equity {
                prices: prices(&[10.0, -1.0]),
            },
        );

        let err = FactorBuilder::build_all(&inputs).unwrap_err();
        assert_eq!(err.instrument(), Some("BAD"));
    }

    #[test]
    fn test_market_input_from_json() {
        let json = r#"{
            "asset_class": "rate_yield",
            "yields": [
                {"timestamp": "2024-07-01", "value": 42.0},
                {"timestamp": "2024-07-02", "value": 42.5}
            ],
            "quote": "times_ten"
        }"#;
        let input: MarketInput = serde_json::from_str(json).unwrap();
        assert_eq!(input.asset_class(), AssetClass::RateYield);

        let factor = FactorBuilder::build(&input).unwrap();
        assert_abs_diff_eq!(factor.value_at(d(2)).unwrap(), 5.0, epsilon = 1e-9);
    }
}
