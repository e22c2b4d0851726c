//! One full risk recomputation pass.
//!
//! market data → factors → book weights → PnL → VaR/ES, followed by the
//! optional hedge, stress scenarios, limit checks and backtest configured in
//! [`RunConfig`]. Nothing is cached between runs.

use crate::book::TradingBook;
use keel_factors::{AssetClass, FactorBuilder, FactorError, FactorSet, InstrumentId, MarketInput};
use keel_output::{RiskSummary, generate_risk_summary};
use keel_risk::{
    BacktestConfig, BacktestReport, Backtester, CorrelationAnalyzer, HedgeConstraints,
    HedgeOutcome, HedgeSolver, LimitCheck, PnlSeries, PortfolioAggregator, PortfolioWeights,
    RiskEngine, RiskError, RiskLimits, RiskReport, SensitivityVector, StressResult,
    StressScenario, VarConfig, beta_sensitivities, run_scenarios,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::info;

/// Errors of a risk run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RunError {
    /// Factor construction failed
    #[error(transparent)]
    Factor(#[from] FactorError),

    /// A risk computation failed
    #[error(transparent)]
    Risk(#[from] RiskError),

    /// The book has no enabled position
    #[error("book has no enabled positions")]
    EmptyBook,

    /// A position refers to an instrument without market data
    #[error("position '{position}' refers to {instrument}, which has no market data")]
    MissingMarketData {
        /// Position name
        position: String,
        /// Instrument it refers to
        instrument: InstrumentId,
    },

    /// A position is booked under a different asset class than its data
    #[error(
        "position '{position}' is booked as {booked} but {instrument} is {actual} market data"
    )]
    AssetClassMismatch {
        /// Position name
        position: String,
        /// Instrument it refers to
        instrument: InstrumentId,
        /// Asset class on the position
        booked: AssetClass,
        /// Asset class of the market input
        actual: AssetClass,
    },
}

/// Where hedge sensitivities come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SensitivitySource {
    /// Supplied per instrument, e.g. deltas or DV01s from a pricer
    Explicit {
        /// Sensitivity per instrument
        values: SensitivityVector,
    },
    /// Betas to an index estimated from the factor history
    Beta {
        /// Index instrument
        index: InstrumentId,
    },
}

/// Hedge settings of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HedgeConfig {
    /// Hedge instruments; a single one is solved analytically
    pub instruments: Vec<InstrumentId>,
    /// Sensitivities to neutralise
    pub sensitivities: SensitivitySource,
    /// Weight caps
    #[serde(default)]
    pub constraints: HedgeConstraints,
}

fn default_name() -> String {
    "book".to_string()
}

/// Configuration of a risk run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Name used in reports
    pub name: String,
    /// VaR/ES settings
    pub var: VarConfig,
    /// Hedge to evaluate, if any
    pub hedge: Option<HedgeConfig>,
    /// Stress scenarios; the worst one is checked against the stress limit
    pub scenarios: Vec<StressScenario>,
    /// Loss limits
    pub limits: RiskLimits,
    /// Rolling VaR backtest, if any
    pub backtest: Option<BacktestConfig>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            var: VarConfig::default(),
            hedge: None,
            scenarios: vec![StressScenario::default()],
            limits: RiskLimits::default(),
            backtest: None,
        }
    }
}

/// Everything a run needs, as read from a JSON document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunInput {
    /// Market data per instrument
    pub market: BTreeMap<InstrumentId, MarketInput>,
    /// Positions
    pub book: TradingBook,
    /// Run settings
    #[serde(default)]
    pub run: RunConfig,
}

/// Results of a risk run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunOutput {
    /// Weights derived from the book
    pub weights: PortfolioWeights,
    /// Portfolio PnL on the aligned window
    pub pnl: PnlSeries,
    /// VaR/ES of the unhedged book
    pub risk: RiskReport,
    /// Summary with standalone figures, hedge effect and limits
    pub summary: RiskSummary,
    /// Hedge evaluation
    pub hedge: Option<HedgeOutcome>,
    /// Stress results, worst first
    pub stress: Vec<StressResult>,
    /// Limit checks on the unhedged book
    pub limits: Vec<LimitCheck>,
    /// Backtest of the rolling VaR
    pub backtest: Option<BacktestReport>,
}

/// A validated risk run.
#[derive(Debug, Clone)]
pub struct RiskRun {
    config: RunConfig,
    engine: RiskEngine,
    solver: Option<HedgeSolver>,
    backtester: Option<Backtester>,
}

impl RiskRun {
    /// Validate the configuration.
    ///
    /// # Errors
    /// Returns [`RunError::Risk`] for an invalid VaR, hedge, limit or
    /// backtest setting.
    pub fn new(config: RunConfig) -> Result<Self, RunError> {
        let engine = RiskEngine::new(config.var)?;
        config.limits.validate()?;
        let solver = config
            .hedge
            .as_ref()
            .map(|h| HedgeSolver::new(h.constraints))
            .transpose()?;
        let backtester = config.backtest.map(Backtester::new).transpose()?;
        Ok(Self {
            config,
            engine,
            solver,
            backtester,
        })
    }

    /// Configuration in use.
    pub const fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Risk engine built from the configuration.
    pub const fn engine(&self) -> &RiskEngine {
        &self.engine
    }

    /// Build factors from market data and run the book against them.
    ///
    /// # Errors
    /// Factor errors carry the failing instrument; see [`Self::run_factors`]
    /// for the rest.
    pub fn run(
        &self,
        market: &BTreeMap<InstrumentId, MarketInput>,
        book: &TradingBook,
    ) -> Result<RunOutput, RunError> {
        let factors = FactorBuilder::build_all(market)?;
        self.run_factors(&factors, book)
    }

    /// Run the book against already built factors.
    ///
    /// # Errors
    /// Book errors from [`TradingBook::check_against`], and any aggregation,
    /// VaR, hedge, stress or backtest error.
    pub fn run_factors(
        &self,
        factors: &FactorSet,
        book: &TradingBook,
    ) -> Result<RunOutput, RunError> {
        book.check_against(factors)?;
        let weights = book.weights();

        let pnl = PortfolioAggregator::aggregate(factors, &weights)?;
        let risk = self.engine.evaluate(&pnl)?;

        let hedge = match (&self.config.hedge, &self.solver) {
            (Some(config), Some(solver)) => {
                let sensitivities = match &config.sensitivities {
                    SensitivitySource::Explicit { values } => values.clone(),
                    SensitivitySource::Beta { index } => beta_sensitivities(
                        factors,
                        &weights,
                        index,
                        &CorrelationAnalyzer::default(),
                    )?,
                };
                Some(solver.evaluate(
                    factors,
                    &weights,
                    &sensitivities,
                    &config.instruments,
                    &self.engine,
                )?)
            }
            _ => None,
        };

        let stress = run_scenarios(factors, &weights, &self.config.scenarios)?;
        let limits = self.config.limits.check(&risk, stress.first());

        let backtest = self
            .backtester
            .as_ref()
            .map(|b| b.run(&pnl))
            .transpose()?;

        let mut summary =
            generate_risk_summary(self.config.name.clone(), factors, &weights, &self.engine)?
                .with_limits(limits.clone());
        if let Some(outcome) = &hedge {
            summary = summary.with_hedge(outcome);
        }

        info!(
            book = %self.config.name,
            observations = risk.sample_size,
            var = risk.var,
            es = risk.es,
            limit_status = %summary.limit_status(),
            "risk run complete"
        );

        Ok(RunOutput {
            weights,
            pnl,
            risk,
            summary,
            hedge,
            stress,
            limits,
            backtest,
        })
    }
}

impl RunInput {
    /// Validate the run settings and execute them on this input.
    ///
    /// # Errors
    /// See [`RiskRun::new`] and [`RiskRun::run`].
    pub fn execute(&self) -> Result<RunOutput, RunError> {
        RiskRun::new(self.run.clone())?.run(&self.market, &self.book)
    }
}
