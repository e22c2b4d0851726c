//! Asset classes and the transformation rule attached to each.
//!
//! The set of asset classes is closed: every class maps to exactly one
//! transformation, and a [`FactorTag`] can only be built for a matching pair.

use crate::error::{FactorError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Asset classes covered by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetClass {
    /// Equities and equity indices
    Equity,
    /// Spot FX pairs quoted bid/ask
    Fx,
    /// Yield indices (rate level series)
    RateYield,
    /// Rate futures, scaled by their DV01
    RateFuture,
}

impl AssetClass {
    /// All asset classes, in declaration order.
    pub const ALL: [Self; 4] = [Self::Equity, Self::Fx, Self::RateYield, Self::RateFuture];

    /// The transformation rule used for this asset class.
    pub const fn transformation(&self) -> Transformation {
        match self {
            Self::Equity => Transformation::LogReturn,
            Self::Fx => Transformation::FxMidReturn,
            Self::RateYield => Transformation::YieldChangeBps,
            Self::RateFuture => Transformation::Dv01ScaledReturn,
        }
    }

    /// Whether factor values are in basis points rather than returns.
    pub const fn is_rates(&self) -> bool {
        matches!(self, Self::RateYield | Self::RateFuture)
    }

    /// Short identifier used in reports.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Equity => "EQ",
            Self::Fx => "FX",
            Self::RateYield => "RATES",
            Self::RateFuture => "RATES_FUT",
        }
    }
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Transformation rules from raw series to risk factors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transformation {
    /// ln(P_t / P_{t-1})
    LogReturn,
    /// Log return of the bid/ask mid
    FxMidReturn,
    /// (y_t - y_{t-1}) in basis points
    YieldChangeBps,
    /// Futures log return multiplied by DV01
    Dv01ScaledReturn,
}

impl fmt::Display for Transformation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::LogReturn => "log_return",
            Self::FxMidReturn => "fx_mid_return",
            Self::YieldChangeBps => "yield_change_bps",
            Self::Dv01ScaledReturn => "dv01_scaled_return",
        };
        f.write_str(name)
    }
}

/// Identifies the asset class and transformation behind a factor series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawTag", into = "RawTag")]
pub struct FactorTag {
    asset_class: AssetClass,
    transformation: Transformation,
}

impl FactorTag {
    /// Equity log returns.
    pub const EQUITY: Self = Self::for_class(AssetClass::Equity);
    /// FX mid log returns.
    pub const FX: Self = Self::for_class(AssetClass::Fx);
    /// Yield changes in bps.
    pub const RATE_YIELD: Self = Self::for_class(AssetClass::RateYield);
    /// DV01-scaled futures returns.
    pub const RATE_FUTURE: Self = Self::for_class(AssetClass::RateFuture);

    /// The tag of an asset class with its own transformation.
    pub const fn for_class(asset_class: AssetClass) -> Self {
        Self {
            asset_class,
            transformation: asset_class.transformation(),
        }
    }

    /// Build a tag, rejecting transformations that do not belong to the class.
    pub fn new(asset_class: AssetClass, transformation: Transformation) -> Result<Self> {
        if asset_class.transformation() != transformation {
            return Err(FactorError::TagMismatch {
                asset_class,
                transformation,
            });
        }
        Ok(Self::for_class(asset_class))
    }

    /// Asset class of the factor.
    pub const fn asset_class(&self) -> AssetClass {
        self.asset_class
    }

    /// Transformation used to derive the factor.
    pub const fn transformation(&self) -> Transformation {
        self.transformation
    }
}

impl fmt::Display for FactorTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.asset_class, self.transformation)
    }
}

#[derive(Serialize, Deserialize)]
struct RawTag {
    asset_class: AssetClass,
    transformation: Transformation,
}

impl TryFrom<RawTag> for FactorTag {
    type Error = FactorError;

    fn try_from(raw: RawTag) -> Result<Self> {
        Self::new(raw.asset_class, raw.transformation)
    }
}

impl From<FactorTag> for RawTag {
    fn from(tag: FactorTag) -> Self {
        Self {
            asset_class: tag.asset_class,
            transformation: tag.transformation,
        }
    }
}

/// Quote convention of a yield level series
///
/// Yield indices are published in different units; the convention fixes the
/// multiplier that turns a level difference into basis points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum YieldQuote {
    /// Levels in percent (4.194 means 4.194%)
    #[default]
    Percent,
    /// Levels in decimal (0.04194 means 4.194%)
    Decimal,
    /// Levels quoted as yield times ten (41.94 means 4.194%)
    TimesTen,
}

impl YieldQuote {
    /// Multiplier from a level difference to basis points.
    pub const fn bps_multiplier(&self) -> f64 {
        match self {
            Self::Percent => 100.0,
            Self::Decimal => 10_000.0,
            Self::TimesTen => 10.0,
        }
    }
}
