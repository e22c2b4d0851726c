#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/keel/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod align;
pub mod backtest;
pub mod correlation;
pub mod covariance;
pub mod error;
pub mod hedge;
pub mod limits;
pub mod portfolio;
pub mod stress;
pub mod var;

// Re-export main types
pub use align::{AlignedFactors, align};
pub use backtest::{BacktestConfig, BacktestReport, Backtester, CoverageTest};
pub use correlation::{CorrelationAnalyzer, CorrelationConfig, CorrelationMatrix, RollingPoint};
pub use covariance::{CovarianceEstimator, EwmaConfig, EwmaCovarianceEstimator, SampleCovariance};
pub use error::{Result, RiskError, Shortfall};
pub use hedge::{
    HedgeConstraints, HedgeObjective, HedgeOutcome, HedgeProblem, HedgeSolution, HedgeSolver,
    SensitivityVector, beta_sensitivities,
};
pub use limits::{LimitCheck, LimitMetric, LimitStatus, RiskLimits, overall_status};
pub use portfolio::{InstrumentPnl, PnlSeries, PortfolioAggregator, PortfolioWeights};
pub use stress::{StressContribution, StressResult, StressScenario, apply_scenario, run_scenarios};
pub use var::{RiskEngine, RiskReport, RollingRisk, VarConfig, historical_var_es};
