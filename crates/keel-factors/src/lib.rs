#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/keel/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod builder;
pub mod error;
pub mod series;
pub mod tag;
pub mod transform;

pub use builder::{FactorBuilder, MarketInput};
pub use error::{FactorError, Result};
pub use series::{FactorSet, InstrumentId, Observation, PriceSeries, RiskFactorSeries, Timestamp};
pub use tag::{AssetClass, FactorTag, Transformation, YieldQuote};
pub use transform::{
    dv01_scaled_return, fx_mid_return, log_return, yield_change_bps, yield_change_bps_quoted,
};
