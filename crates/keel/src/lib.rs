#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/keel/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod book;
pub mod run;

// Re-export main types from sub-crates
pub use keel_factors as factors;
pub use keel_output as output;
pub use keel_risk as risk;

pub use book::{Position, TradingBook};
pub use run::{HedgeConfig, RiskRun, RunConfig, RunError, RunInput, RunOutput, SensitivitySource};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
