//! Property tests for the VaR/ES contract and hedge neutrality.

use keel_risk::{HedgeSolver, PortfolioWeights, SensitivityVector, historical_var_es};
use proptest::prelude::*;

fn pnl_sample() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-1_000.0f64..1_000.0, 2..200)
}

proptest! {
    #[test]
    fn es_never_below_var(pnl in pnl_sample(), alpha in 0.5f64..0.999) {
        let report = historical_var_es(&pnl, alpha).unwrap();
        prop_assert!(report.var >= 0.0);
        prop_assert!(report.es >= report.var);
        prop_assert!(report.tail_size >= 1);
    }

    #[test]
    fn var_grows_with_confidence(pnl in pnl_sample(), a in 0.5f64..0.99, b in 0.5f64..0.99) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let low = historical_var_es(&pnl, lo).unwrap();
        let high = historical_var_es(&pnl, hi).unwrap();
        prop_assert!(high.var >= low.var);
    }

    #[test]
    fn var_ignores_order(mut pnl in pnl_sample(), alpha in 0.5f64..0.999) {
        let before = historical_var_es(&pnl, alpha).unwrap();
        pnl.reverse();
        let after = historical_var_es(&pnl, alpha).unwrap();
        prop_assert_eq!(before, after);
    }

    #[test]
    fn var_bounded_by_worst_loss(pnl in pnl_sample(), alpha in 0.5f64..0.999) {
        let report = historical_var_es(&pnl, alpha).unwrap();
        let worst = pnl.iter().map(|p| -p).fold(0.0f64, f64::max);
        prop_assert!(report.var <= worst);
        prop_assert!(report.es <= worst + 1e-9);
    }

    #[test]
    fn single_hedge_is_neutral(
        positions in prop::collection::vec((-1e6f64..1e6, -2.0f64..2.0), 1..10),
        hedge_sens in prop_oneof![-5.0f64..-0.01, 0.01f64..5.0],
    ) {
        let mut weights = PortfolioWeights::new();
        let mut sens = SensitivityVector::new().with("HEDGE", hedge_sens);
        for (i, (w, s)) in positions.iter().enumerate() {
            weights.insert(format!("P{i}"), *w);
            sens.insert(format!("P{i}"), *s);
        }

        let solution = HedgeSolver::default()
            .solve(&weights, &sens, &["HEDGE".to_string()])
            .unwrap();
        let scale = 1.0 + positions.iter().map(|(w, s)| (w * s).abs()).sum::<f64>();
        prop_assert!(solution.net_after.abs() <= 1e-9 * scale);
    }
}
