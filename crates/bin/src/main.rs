//! Keel CLI binary.
//!
//! Reads a JSON document with `market`, `book` and `run` sections and prints
//! risk figures as text or JSON.

mod input;

use clap::{Parser, Subcommand, ValueEnum};
use input::{Desk, export_format};
use keel::output::{Exporter, PnlExport, ReportBuilder};
use keel::risk::{
    BacktestConfig, Backtester, CorrelationAnalyzer, HedgeConstraints, HedgeSolver, RiskEngine,
    VarConfig, beta_sensitivities, run_scenarios,
};
use keel::{RiskRun, SensitivitySource};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::process;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "keel")]
#[command(about = "Keel: historical VaR, correlation and hedging for trading books", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Full risk run: VaR/ES, hedge, stress, limits and backtest
    Run {
        /// Input document
        input: PathBuf,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: Format,

        /// Write a timestamped JSON report to this path
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Historical VaR and ES of the book
    Var {
        /// Input document
        input: PathBuf,

        /// Confidence level, overriding the document
        #[arg(long)]
        confidence: Option<f64>,

        /// Also compute rolling VaR over this many observations
        #[arg(long)]
        rolling: Option<usize>,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: Format,

        /// Export the PnL series (.csv or .json)
        #[arg(long)]
        export: Option<PathBuf>,
    },

    /// Correlation matrix of the book's factors
    Correlate {
        /// Input document
        input: PathBuf,

        /// Rolling correlation of two instruments instead of the matrix
        #[arg(long, num_args = 2, value_names = ["A", "B"])]
        pair: Option<Vec<String>>,

        /// Rolling window length
        #[arg(long, default_value = "60")]
        window: usize,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: Format,

        /// Export the matrix (.csv or .json)
        #[arg(long)]
        export: Option<PathBuf>,
    },

    /// Backtest rolling VaR with Kupiec and Christoffersen tests
    Backtest {
        /// Input document
        input: PathBuf,

        /// Rolling window, overriding the document
        #[arg(long)]
        window: Option<usize>,

        /// Confidence level, overriding the document
        #[arg(long)]
        confidence: Option<f64>,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: Format,

        /// Export the exceedance series (.csv or .json)
        #[arg(long)]
        export: Option<PathBuf>,
    },

    /// Apply the document's stress scenarios
    Stress {
        /// Input document
        input: PathBuf,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: Format,

        /// Export per-instrument results (.csv or .json)
        #[arg(long)]
        export: Option<PathBuf>,
    },

    /// Neutralise the book with hedge instruments
    Hedge {
        /// Input document
        input: PathBuf,

        /// Hedge instrument, overriding the document (repeatable)
        #[arg(long = "with")]
        hedges: Vec<String>,

        /// Use betas to this index as sensitivities
        #[arg(long)]
        beta_to: Option<String>,

        /// Cap on the absolute hedge weight
        #[arg(long)]
        max_abs_weight: Option<f64>,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: Format,
    },
}

fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            input,
            format,
            report,
        } => full_run(&input, format, report.as_deref()),
        Commands::Var {
            input,
            confidence,
            rolling,
            format,
            export,
        } => var(&input, confidence, rolling, format, export.as_deref()),
        Commands::Correlate {
            input,
            pair,
            window,
            format,
            export,
        } => correlate(&input, pair, window, format, export.as_deref()),
        Commands::Backtest {
            input,
            window,
            confidence,
            format,
            export,
        } => backtest(&input, window, confidence, format, export.as_deref()),
        Commands::Stress {
            input,
            format,
            export,
        } => stress(&input, format, export.as_deref()),
        Commands::Hedge {
            input,
            hedges,
            beta_to,
            max_abs_weight,
            format,
        } => hedge(&input, hedges, beta_to, max_abs_weight, format),
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Instrument id cut to at most `width` characters for table columns.
fn label(id: &str, width: usize) -> String {
    id.chars().take(width).collect()
}

fn export<E: Exporter + ?Sized>(value: &E, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    value.export_to_file(path, export_format(path)?)?;
    info!(path = %path.display(), "exported");
    Ok(())
}

fn full_run(
    path: &Path,
    format: Format,
    report: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let input = input::load(path)?;
    let output = RiskRun::new(input.run.clone())?.run(&input.market, &input.book)?;

    if let Some(report_path) = report {
        let mut builder = ReportBuilder::new()
            .portfolio(input.run.name.as_str())
            .kind("run")
            .contents_from(&output)?;
        if let Some((_, end)) = output.pnl.span() {
            builder = builder.as_of(end);
        }
        builder.build()?.write_to(report_path)?;
        info!(path = %report_path.display(), "report written");
    }

    match format {
        Format::Json => print_json(&output),
        Format::Text => {
            print!("{}", output.summary.to_ascii_table());

            println!("\nStress Scenarios:");
            for result in &output.stress {
                println!("  {:<24} {:>16.2}", result.scenario, result.total_pnl);
            }

            if let Some(report) = &output.backtest {
                println!(
                    "\nBacktest ({} obs, window {}): {} breaches, {:.1} expected",
                    report.observations, report.window, report.breaches, report.expected_breaches
                );
                println!(
                    "  Kupiec p = {:.4}   Christoffersen p = {:.4}",
                    report.kupiec.p_value, report.christoffersen.p_value
                );
            }
            println!("\nOverall limit status: {}", output.summary.limit_status());
            Ok(())
        }
    }
}

fn var(
    path: &Path,
    confidence: Option<f64>,
    rolling: Option<usize>,
    format: Format,
    export_path: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let desk = Desk::load(path)?;
    let config = VarConfig {
        confidence: confidence.unwrap_or(desk.input.run.var.confidence),
        ..desk.input.run.var
    };
    let engine = RiskEngine::new(config)?;
    let pnl = desk.pnl()?;
    let report = engine.evaluate(&pnl)?;
    let rolling = rolling.map(|w| engine.rolling(&pnl, w)).transpose()?;

    if let Some(p) = export_path {
        export(
            &PnlExport {
                name: &desk.input.run.name,
                pnl: &pnl,
            },
            p,
        )?;
    }

    match format {
        Format::Json => print_json(&json!({ "risk": report, "rolling": rolling })),
        Format::Text => {
            let pct = report.confidence * 100.0;
            println!("Book:             {}", desk.input.run.name);
            println!("Observations:     {}", report.sample_size);
            println!("{pct:.1}% VaR:        {:.2}", report.var);
            println!("{pct:.1}% ES:         {:.2}", report.es);
            if report.tail_degenerate {
                println!("ES tail is empty; ES set to the worst loss");
            }
            if let Some(points) = rolling {
                println!("\n{:<12} {:>14} {:>14} {:>14}", "Date", "VaR", "ES", "PnL");
                for p in &points {
                    let flag = if p.is_breach() { " *" } else { "" };
                    println!(
                        "{:<12} {:>14.2} {:>14.2} {:>14.2}{flag}",
                        p.timestamp, p.var, p.es, p.realized_pnl
                    );
                }
            }
            Ok(())
        }
    }
}

fn correlate(
    path: &Path,
    pair: Option<Vec<String>>,
    window: usize,
    format: Format,
    export_path: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let desk = Desk::load(path)?;
    let analyzer = CorrelationAnalyzer::default();

    if let Some([a, b]) = pair.as_deref() {
        let points = analyzer.rolling(
            desk.series(a)?.observations(),
            desk.series(b)?.observations(),
            window,
        )?;
        return match format {
            Format::Json => print_json(&points),
            Format::Text => {
                println!("Rolling {window}-day correlation {a} / {b}");
                for p in &points {
                    match p.value {
                        Some(rho) => println!("{:<12} {rho:>8.3}", p.timestamp),
                        None => println!("{:<12} {:>8}", p.timestamp, "n/a"),
                    }
                }
                Ok(())
            }
        };
    }

    let ids = desk.instruments();
    let matrix = analyzer.matrix(&desk.factors, &ids)?;
    if let Some(p) = export_path {
        export(&matrix, p)?;
    }

    match format {
        Format::Json => print_json(&matrix),
        Format::Text => {
            println!("Correlation over {} observations\n", matrix.observations());
            print!("{:<12}", "");
            for id in matrix.instruments() {
                print!("{:>10}", label(id, 9));
            }
            println!();
            for (id, row) in matrix.instruments().iter().zip(matrix.rows()) {
                print!("{:<12}", label(id, 11));
                for value in row {
                    match value {
                        Some(rho) => print!("{rho:>10.3}"),
                        None => print!("{:>10}", "n/a"),
                    }
                }
                println!();
            }
            Ok(())
        }
    }
}

fn backtest(
    path: &Path,
    window: Option<usize>,
    confidence: Option<f64>,
    format: Format,
    export_path: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let desk = Desk::load(path)?;
    let base = desk.input.run.backtest.unwrap_or_default();
    let config = BacktestConfig {
        window: window.unwrap_or(base.window),
        confidence: confidence.unwrap_or(base.confidence),
    };
    let report = Backtester::new(config)?.run(&desk.pnl()?)?;

    if let Some(p) = export_path {
        export(&report, p)?;
    }

    match format {
        Format::Json => print_json(&report),
        Format::Text => {
            println!(
                "VaR backtest at {:.1}%, window {}",
                report.confidence * 100.0,
                report.window
            );
            println!("Observations:       {}", report.observations);
            println!(
                "Breaches:           {} ({:.2}%)",
                report.breaches,
                report.breach_rate() * 100.0
            );
            println!("Expected:           {:.1}", report.expected_breaches);
            println!(
                "Kupiec LR:          {:.4} (p = {:.4}){}",
                report.kupiec.statistic,
                report.kupiec.p_value,
                if report.kupiec.rejects(0.05) { "  REJECT" } else { "" }
            );
            println!(
                "Christoffersen LR:  {:.4} (p = {:.4}){}",
                report.christoffersen.statistic,
                report.christoffersen.p_value,
                if report.christoffersen.rejects(0.05) { "  REJECT" } else { "" }
            );
            Ok(())
        }
    }
}

fn stress(
    path: &Path,
    format: Format,
    export_path: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let desk = Desk::load(path)?;
    let results = run_scenarios(&desk.factors, &desk.weights, &desk.input.run.scenarios)?;

    if let Some(p) = export_path {
        export(&results, p)?;
    }

    match format {
        Format::Json => print_json(&results),
        Format::Text => {
            for result in &results {
                println!("{}: {:.2}", result.scenario, result.total_pnl);
                for c in result.worst(3) {
                    println!(
                        "  {:<16} {:>10} shock {:>10.4} pnl {:>14.2}",
                        c.instrument,
                        c.asset_class.code(),
                        c.shock,
                        c.pnl
                    );
                }
            }
            Ok(())
        }
    }
}

fn hedge(
    path: &Path,
    hedges: Vec<String>,
    beta_to: Option<String>,
    max_abs_weight: Option<f64>,
    format: Format,
) -> Result<(), Box<dyn std::error::Error>> {
    let desk = Desk::load(path)?;
    let configured = desk.input.run.hedge.clone();

    let instruments = if hedges.is_empty() {
        configured
            .as_ref()
            .map(|h| h.instruments.clone())
            .ok_or("no hedge instrument: pass --with or add run.hedge to the document")?
    } else {
        hedges
    };
    let source = match (beta_to, &configured) {
        (Some(index), _) => SensitivitySource::Beta { index },
        (None, Some(h)) => h.sensitivities.clone(),
        (None, None) => return Err("no sensitivities: pass --beta-to or add run.hedge".into()),
    };
    let constraints = HedgeConstraints {
        max_abs_weight: max_abs_weight
            .or_else(|| configured.as_ref().and_then(|h| h.constraints.max_abs_weight)),
    };

    let sensitivities = match source {
        SensitivitySource::Explicit { values } => values,
        SensitivitySource::Beta { index } => beta_sensitivities(
            &desk.factors,
            &desk.weights,
            &index,
            &CorrelationAnalyzer::default(),
        )?,
    };
    let engine = RiskEngine::new(desk.input.run.var)?;
    let outcome = HedgeSolver::new(constraints)?.evaluate(
        &desk.factors,
        &desk.weights,
        &sensitivities,
        &instruments,
        &engine,
    )?;

    match format {
        Format::Json => print_json(&outcome),
        Format::Text => {
            println!("Hedge weights:");
            for (id, delta) in outcome.solution.adjustments.iter() {
                println!(
                    "  {:<16} trade {:>16.2} -> {:>16.2}",
                    id,
                    delta,
                    outcome.solution.weights.get(id).unwrap_or_default()
                );
            }
            println!(
                "Net sensitivity:  {:.4} -> {:.4}",
                outcome.solution.net_before, outcome.solution.net_after
            );
            if outcome.solution.clamped {
                println!("Hedge weight capped; book is not fully neutral");
            }
            println!(
                "VaR:              {:.2} -> {:.2}",
                outcome.unhedged.var, outcome.hedged.var
            );
            println!(
                "ES:               {:.2} -> {:.2}",
                outcome.unhedged.es, outcome.hedged.es
            );
            if let Some(r) = outcome.var_reduction_pct {
                println!("VaR reduction:    {r:.1}%");
            }
            if let Some(rho) = outcome.hedge_correlation {
                println!("Corr(book, hedge): {rho:.3}");
            }
            Ok(())
        }
    }
}
