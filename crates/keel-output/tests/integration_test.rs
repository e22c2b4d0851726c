//! Integration tests for summaries, exports and reports.

use chrono::{Duration, NaiveDate};
use keel_factors::{FactorBuilder, InstrumentId, MarketInput, PriceSeries};
use keel_output::{
    ExportFormat, Exporter, PnlExport, ReportBuilder, RiskSummary, generate_risk_summary,
};
use keel_risk::{
    BacktestConfig, Backtester, CorrelationAnalyzer, HedgeSolver, PortfolioAggregator,
    PortfolioWeights, RiskEngine, RiskLimits, SensitivityVector,
};
use std::collections::BTreeMap;

fn dated(values: impl IntoIterator<Item = f64>) -> PriceSeries {
    let start = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    PriceSeries::from_pairs(
        values
            .into_iter()
            .enumerate()
            .map(|(i, v)| (start + Duration::days(i as i64), v)),
    )
    .unwrap()
}

fn inputs() -> BTreeMap<InstrumentId, MarketInput> {
    let spx = (0..40).map(|i| 5000.0 * (1.0 + 0.01 * (i as f64 * 0.7).sin()));
    let bid = (0..40).map(|i| 1.08 + 0.004 * (i as f64 * 1.3).cos());
    let ask = (0..40).map(|i| 1.0802 + 0.004 * (i as f64 * 1.3).cos());

    let mut inputs = BTreeMap::new();
    inputs.insert(
        "SPX".to_string(),
        MarketInput::Equity {
            prices: dated(spx),
        },
    );
    inputs.insert(
        "EURUSD".to_string(),
        MarketInput::Fx {
            bid: dated(bid),
            ask: dated(ask),
        },
    );
    inputs
}

fn weights() -> PortfolioWeights {
    PortfolioWeights::new()
        .with("SPX", 1_000_000.0)
        .with("EURUSD", -250_000.0)
}

#[test]
fn test_full_summary_workflow() {
    let factors = FactorBuilder::build_all(&inputs()).unwrap();
    let engine = RiskEngine::with_confidence(0.95).unwrap();

    let summary = generate_risk_summary("Macro Book", &factors, &weights(), &engine).unwrap();
    assert_eq!(summary.sample_size, 39);
    assert_eq!(summary.contributions.len(), 2);
    assert!(summary.es >= summary.var);

    let sensitivities = SensitivityVector::new().with("SPX", 1.0).with("EURUSD", 0.0);
    let outcome = HedgeSolver::default()
        .evaluate(
            &factors,
            &weights(),
            &sensitivities,
            &["SPX".to_string()],
            &engine,
        )
        .unwrap();
    let limits = RiskLimits {
        var: Some(summary.var * 2.0),
        ..Default::default()
    };
    let checks = limits.check(&engine.evaluate_values(&[-1.0, 0.0, 1.0]).unwrap(), None);
    let summary = summary.with_hedge(&outcome).with_limits(checks);

    let ascii = summary.to_ascii_table();
    assert!(ascii.contains("Macro Book"));
    assert!(ascii.contains("Hedge:"));
    assert!(ascii.contains("Limits:"));

    let markdown = summary.to_markdown();
    assert!(markdown.contains("## Hedge"));

    let json = summary.export_to_string(ExportFormat::Json).unwrap();
    let parsed: RiskSummary = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed.name, summary.name);
    assert_eq!(parsed.contributions.len(), 2);
    assert_eq!(parsed.limit_status(), summary.limit_status());

    let csv = summary.export_to_string(ExportFormat::Csv).unwrap();
    assert!(csv.starts_with("portfolio,metric,value\n"));
    assert!(csv.contains("Macro Book,hedged_var,"));
}

#[test]
fn test_backtest_and_pnl_exports() {
    let factors = FactorBuilder::build_all(&inputs()).unwrap();
    let pnl = PortfolioAggregator::aggregate(&factors, &weights()).unwrap();

    let backtester = Backtester::new(BacktestConfig {
        window: 20,
        confidence: 0.9,
    })
    .unwrap();
    let report = backtester.run(&pnl).unwrap();
    let csv = report.export_to_string(ExportFormat::Csv).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], "date,var,es,pnl,breach");
    assert_eq!(lines.len(), 1 + pnl.len() - 20);

    let pnl_csv = PnlExport {
        name: "macro",
        pnl: &pnl,
    }
    .export_to_string(ExportFormat::Csv)
    .unwrap();
    assert_eq!(pnl_csv.lines().count(), 1 + pnl.len());
}

#[test]
fn test_correlation_export_and_report() {
    let factors = FactorBuilder::build_all(&inputs()).unwrap();
    let ids: Vec<InstrumentId> = factors.keys().cloned().collect();
    let matrix = CorrelationAnalyzer::default().matrix(&factors, &ids).unwrap();

    let csv = matrix.export_to_string(ExportFormat::Csv).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], "instrument,EURUSD,SPX");
    assert!(lines[1].starts_with("EURUSD,1"));

    let dir = std::env::temp_dir().join(format!("keel-output-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(format!("correlation.{}", ExportFormat::Json.extension()));
    matrix.export_to_file(&path, ExportFormat::Json).unwrap();
    assert!(std::fs::read_to_string(&path).unwrap().contains("EURUSD"));

    let report = ReportBuilder::new()
        .portfolio("macro")
        .kind("correlation")
        .contents_from(&matrix)
        .unwrap()
        .build()
        .unwrap();
    let report_path = dir.join("report.json");
    report.write_to(&report_path).unwrap();
    let text = std::fs::read_to_string(&report_path).unwrap();
    assert!(text.contains("\"kind\": \"correlation\""));

    std::fs::remove_dir_all(&dir).unwrap();
}
