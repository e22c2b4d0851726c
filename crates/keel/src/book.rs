//! Desk positions and their mapping to portfolio weights.
//!
//! Every position is tied to one risk factor series. Its weight is the PnL
//! per unit of factor move:
//!
//! - return factors (equity, FX, rate futures): `notional * multiplier`
//! - yield factors: the DV01, PnL per basis point
//!
//! Positions on the same instrument add up.

use crate::run::RunError;
use keel_factors::{AssetClass, FactorSet, InstrumentId};
use keel_risk::PortfolioWeights;
use serde::{Deserialize, Serialize};
use tracing::debug;

const fn one() -> f64 {
    1.0
}

const fn enabled() -> bool {
    true
}

/// A desk position on one factor series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Display name, e.g. "SPX beta (short)"
    pub name: String,
    /// Asset class the position is booked under
    pub asset_class: AssetClass,
    /// Factor series the position moves with
    pub instrument: InstrumentId,
    /// Signed notional; unused for yield positions
    #[serde(default)]
    pub notional: f64,
    /// Delta, beta or contract multiplier applied to the notional
    #[serde(default = "one")]
    pub multiplier: f64,
    /// PnL per basis point; only used for yield positions
    #[serde(default)]
    pub dv01: f64,
    /// Disabled positions are kept in the book but carry no risk
    #[serde(default = "enabled")]
    pub enabled: bool,
}

impl Position {
    /// Return-factor position.
    pub fn new(
        name: impl Into<String>,
        asset_class: AssetClass,
        instrument: impl Into<InstrumentId>,
        notional: f64,
    ) -> Self {
        Self {
            name: name.into(),
            asset_class,
            instrument: instrument.into(),
            notional,
            multiplier: 1.0,
            dv01: 0.0,
            enabled: true,
        }
    }

    /// Yield position given by its DV01.
    pub fn dv01(name: impl Into<String>, instrument: impl Into<InstrumentId>, dv01: f64) -> Self {
        Self {
            dv01,
            ..Self::new(name, AssetClass::RateYield, instrument, 0.0)
        }
    }

    /// Builder-style multiplier.
    pub const fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Builder-style switch.
    pub const fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// PnL per unit move of the position's factor.
    pub fn exposure(&self) -> f64 {
        match self.asset_class {
            AssetClass::RateYield => self.dv01,
            AssetClass::Equity | AssetClass::Fx | AssetClass::RateFuture => {
                self.notional * self.multiplier
            }
        }
    }
}

/// Collection of desk positions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TradingBook {
    positions: Vec<Position>,
}

impl TradingBook {
    /// Create a book.
    pub const fn new(positions: Vec<Position>) -> Self {
        Self { positions }
    }

    /// Add a position.
    pub fn push(&mut self, position: Position) {
        self.positions.push(position);
    }

    /// All positions, including disabled ones.
    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    /// Positions that carry risk.
    pub fn enabled(&self) -> impl Iterator<Item = &Position> {
        self.positions.iter().filter(|p| p.enabled)
    }

    /// Number of positions.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Whether the book has no positions.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Exposure per instrument, summed over enabled positions.
    pub fn weights(&self) -> PortfolioWeights {
        let mut weights = PortfolioWeights::new();
        for position in self.enabled() {
            let current = weights.get(&position.instrument).unwrap_or(0.0);
            weights.insert(position.instrument.clone(), current + position.exposure());
        }
        debug!(
            positions = self.positions.len(),
            instruments = weights.len(),
            "book weights"
        );
        weights
    }

    /// Check that every enabled position has a factor series of its own
    /// asset class.
    ///
    /// # Errors
    /// [`RunError::EmptyBook`] without enabled positions,
    /// [`RunError::MissingMarketData`] or [`RunError::AssetClassMismatch`]
    /// for the first offending position.
    pub fn check_against(&self, factors: &FactorSet) -> Result<(), RunError> {
        if self.enabled().next().is_none() {
            return Err(RunError::EmptyBook);
        }
        for position in self.enabled() {
            let series =
                factors
                    .get(&position.instrument)
                    .ok_or_else(|| RunError::MissingMarketData {
                        position: position.name.clone(),
                        instrument: position.instrument.clone(),
                    })?;
            if series.asset_class() != position.asset_class {
                return Err(RunError::AssetClassMismatch {
                    position: position.name.clone(),
                    instrument: position.instrument.clone(),
                    booked: position.asset_class,
                    actual: series.asset_class(),
                });
            }
        }
        Ok(())
    }
}

impl FromIterator<Position> for TradingBook {
    fn from_iter<I: IntoIterator<Item = Position>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
