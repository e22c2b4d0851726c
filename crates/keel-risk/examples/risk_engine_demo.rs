//! Walk through keel-risk on a small synthetic book
//!
//! - factor construction for an equity, an FX pair and a yield index
//! - portfolio PnL and historical VaR/ES
//! - correlation matrix and EWMA covariance
//! - single-instrument beta hedge

use chrono::{Duration, NaiveDate};
use keel_factors::{FactorBuilder, InstrumentId, MarketInput, PriceSeries, YieldQuote};
use keel_risk::{
    CorrelationAnalyzer, EwmaCovarianceEstimator, HedgeSolver, PortfolioAggregator,
    PortfolioWeights, RiskEngine, beta_sensitivities,
};
use std::collections::BTreeMap;

fn dated(values: impl IntoIterator<Item = f64>) -> PriceSeries {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date");
    PriceSeries::from_pairs(
        values
            .into_iter()
            .enumerate()
            .map(|(i, v)| (start + Duration::days(i as i64), v)),
    )
    .expect("increasing timestamps")
}

fn main() {
    println!("==========================================================");
    println!("               Keel Risk Engine - Demo");
    println!("==========================================================\n");

    // 120 days of deterministic prices
    let n = 120;
    let mut market = BTreeMap::new();
    market.insert(
        ".SPX".to_string(),
        MarketInput::Equity {
            prices: dated((0..n).map(|i| 4800.0 * (1.0 + 0.015 * (i as f64 * 0.5).sin()))),
        },
    );
    market.insert(
        "NVDA.O".to_string(),
        MarketInput::Equity {
            prices: dated((0..n).map(|i| {
                480.0 * (1.0 + 0.03 * (i as f64 * 0.5).sin() + 0.01 * (i as f64 * 1.7).cos())
            })),
        },
    );
    market.insert(
        "EUR=".to_string(),
        MarketInput::Fx {
            bid: dated((0..n).map(|i| 1.09 + 0.004 * (i as f64 * 0.3).cos())),
            ask: dated((0..n).map(|i| 1.0902 + 0.004 * (i as f64 * 0.3).cos())),
        },
    );
    market.insert(
        ".TNX".to_string(),
        MarketInput::RateYield {
            yields: dated((0..n).map(|i| 4.2 + 0.05 * (i as f64 * 0.2).sin())),
            quote: YieldQuote::Percent,
        },
    );

    let factors = FactorBuilder::build_all(&market).expect("valid market data");
    let weights = PortfolioWeights::new()
        .with("NVDA.O", 2_000_000.0)
        .with("EUR=", -750_000.0)
        .with(".TNX", 1_500.0);

    println!("Portfolio VaR/ES");
    println!("----------------------------------------------------------");
    let pnl = PortfolioAggregator::aggregate(&factors, &weights).expect("aligned factors");
    for alpha in [0.95, 0.99] {
        let report = RiskEngine::with_confidence(alpha)
            .and_then(|engine| engine.evaluate(&pnl))
            .expect("enough observations");
        println!(
            "  {:.0}%: VaR {:>12.2}  ES {:>12.2}  ({} obs)",
            alpha * 100.0,
            report.var,
            report.es,
            report.sample_size
        );
    }

    println!("\nCorrelation matrix");
    println!("----------------------------------------------------------");
    let ids: Vec<InstrumentId> = factors.keys().cloned().collect();
    let analyzer = CorrelationAnalyzer::default();
    let matrix = analyzer.matrix(&factors, &ids).expect("correlation matrix");
    for (id, row) in matrix.instruments().iter().zip(matrix.rows()) {
        let cells: Vec<String> = row
            .iter()
            .map(|v| v.map_or_else(|| "   n/a".to_string(), |rho| format!("{rho:>6.3}")))
            .collect();
        println!("  {id:<8} {}", cells.join(" "));
    }

    let estimator = EwmaCovarianceEstimator::try_default().expect("default config");
    let cov = analyzer
        .covariance(&factors, &ids, &estimator)
        .expect("covariance");
    println!(
        "\nEWMA covariance (half-life {:.1} days), diagonal: {:?}",
        estimator.half_life(),
        cov.diag().to_vec()
    );

    println!("\nBeta hedge with .SPX");
    println!("----------------------------------------------------------");
    let sensitivities =
        beta_sensitivities(&factors, &weights, ".SPX", &analyzer).expect("betas");
    let engine = RiskEngine::with_confidence(0.99).expect("valid confidence");
    let outcome = HedgeSolver::default()
        .evaluate(
            &factors,
            &weights,
            &sensitivities,
            &[".SPX".to_string()],
            &engine,
        )
        .expect("hedge");
    println!(
        "  .SPX weight {:.2}, VaR {:.2} -> {:.2}",
        outcome.solution.weights.get(".SPX").unwrap_or_default(),
        outcome.unhedged.var,
        outcome.hedged.var
    );

    println!("\n==========================================================");
    println!("                    Demo Complete!");
    println!("==========================================================");
}
