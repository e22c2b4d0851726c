//! Criterion benchmarks for historical VaR and correlation.

use chrono::{Duration, NaiveDate};
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use keel_factors::{FactorSet, FactorTag, InstrumentId, RiskFactorSeries};
use keel_risk::{CorrelationAnalyzer, RiskEngine};

/// Deterministic pseudo-returns without a random number generator.
fn synthetic_returns(n: usize, seed: usize) -> Vec<f64> {
    (0..n)
        .map(|t| (((t * 7919 + seed * 104_729) % 2003) as f64 - 1001.0) / 50_000.0)
        .collect()
}

fn synthetic_factors(instruments: usize, n: usize) -> FactorSet {
    let start = NaiveDate::from_ymd_opt(2015, 1, 1).unwrap();
    (0..instruments)
        .map(|k| {
            let series = RiskFactorSeries::from_pairs(
                FactorTag::EQUITY,
                synthetic_returns(n, k)
                    .into_iter()
                    .enumerate()
                    .map(|(t, v)| (start + Duration::days(t as i64), v)),
            )
            .unwrap();
            (format!("EQ{k:03}"), series)
        })
        .collect()
}

fn bench_historical_var(c: &mut Criterion) {
    let mut group = c.benchmark_group("historical_var");
    let engine = RiskEngine::with_confidence(0.99).unwrap();

    for n in [250, 1_000, 5_000] {
        let pnl = synthetic_returns(n, 1);
        group.bench_with_input(BenchmarkId::from_parameter(n), &pnl, |b, pnl| {
            b.iter(|| engine.evaluate_values(black_box(pnl)).unwrap());
        });
    }
    group.finish();
}

fn bench_correlation_matrix(c: &mut Criterion) {
    let mut group = c.benchmark_group("correlation_matrix");
    let analyzer = CorrelationAnalyzer::default();

    for k in [5, 20, 50] {
        let factors = synthetic_factors(k, 500);
        let ids: Vec<InstrumentId> = factors.keys().cloned().collect();
        group.bench_with_input(BenchmarkId::from_parameter(k), &ids, |b, ids| {
            b.iter(|| analyzer.matrix(black_box(&factors), ids).unwrap());
        });
    }
    group.finish();
}

criterion_group!(benches, bench_historical_var, bench_correlation_matrix);
criterion_main!(benches);
