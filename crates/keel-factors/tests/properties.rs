//! Property tests for the factor transformation rules.

use chrono::{Duration, NaiveDate};
use keel_factors::{PriceSeries, fx_mid_return, log_return, yield_change_bps};
use proptest::prelude::*;

fn dated(values: &[f64]) -> Vec<(NaiveDate, f64)> {
    let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
    values
        .iter()
        .enumerate()
        .map(|(i, &v)| (start + Duration::days(i as i64), v))
        .collect()
}

proptest! {
    #[test]
    fn log_returns_reconstruct_prices(prices in prop::collection::vec(0.01f64..10_000.0, 2..60)) {
        let series = PriceSeries::from_pairs(dated(&prices)).unwrap();
        let returns = log_return(&series).unwrap();

        prop_assert_eq!(returns.len(), prices.len() - 1);

        let mut level = prices[0];
        for (r, expected) in returns.values().zip(prices.iter().skip(1)) {
            level *= r.exp();
            prop_assert!((level - expected).abs() <= 1e-9 * expected.max(1.0));
        }
    }

    #[test]
    fn yield_changes_sum_to_total_move(yields in prop::collection::vec(-2.0f64..15.0, 2..60)) {
        let series = PriceSeries::from_pairs(dated(&yields)).unwrap();
        let bps = yield_change_bps(&series).unwrap();

        let total: f64 = bps.values().sum();
        let expected = (yields[yields.len() - 1] - yields[0]) * 100.0;
        prop_assert!((total - expected).abs() < 1e-6);
    }

    #[test]
    fn mid_returns_do_not_depend_on_spread_side(
        mids in prop::collection::vec(0.5f64..2.0, 2..40),
        half_spread in 0.0f64..0.001,
    ) {
        let bid = PriceSeries::from_pairs(dated(&mids.iter().map(|m| m - half_spread).collect::<Vec<_>>())).unwrap();
        let ask = PriceSeries::from_pairs(dated(&mids.iter().map(|m| m + half_spread).collect::<Vec<_>>())).unwrap();
        let mid = PriceSeries::from_pairs(dated(&mids)).unwrap();

        let from_quotes: Vec<f64> = fx_mid_return(&bid, &ask).unwrap().values().collect();
        let from_mid: Vec<f64> = log_return(&mid).unwrap().values().collect();
        for (a, b) in from_quotes.iter().zip(&from_mid) {
            prop_assert!((a - b).abs() < 1e-9);
        }
    }
}
