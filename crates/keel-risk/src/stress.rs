//! Deterministic stress scenarios.
//!
//! A scenario moves every factor of an asset class by the same amount, in
//! factor units (log return for equities and FX, basis points for yields,
//! DV01-scaled return for rate futures). Instrument overrides replace the
//! class shock. The stressed PnL of an instrument is `w_i * shock_i`.

use crate::error::{Result, RiskError, check_finite};
use crate::portfolio::PortfolioWeights;
use keel_factors::{AssetClass, FactorSet, InstrumentId};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::debug;

/// One-day shock scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressScenario {
    /// Scenario name
    pub name: String,
    /// Factor move per asset class; missing classes are not shocked
    #[serde(default)]
    pub shocks: BTreeMap<AssetClass, f64>,
    /// Factor move for specific instruments, taking precedence over the class
    #[serde(default)]
    pub overrides: BTreeMap<InstrumentId, f64>,
}

impl Default for StressScenario {
    /// Equities −10%, FX +5%, yields +100bp.
    fn default() -> Self {
        Self {
            name: "desk_default".to_string(),
            shocks: BTreeMap::from([
                (AssetClass::Equity, -0.10),
                (AssetClass::Fx, 0.05),
                (AssetClass::RateYield, 100.0),
            ]),
            overrides: BTreeMap::new(),
        }
    }
}

impl StressScenario {
    /// Empty scenario with a name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shocks: BTreeMap::new(),
            overrides: BTreeMap::new(),
        }
    }

    /// Builder-style class shock.
    pub fn with_shock(mut self, class: AssetClass, shock: f64) -> Self {
        self.shocks.insert(class, shock);
        self
    }

    /// Builder-style instrument override.
    pub fn with_override(mut self, instrument: impl Into<InstrumentId>, shock: f64) -> Self {
        self.overrides.insert(instrument.into(), shock);
        self
    }

    /// Shock applied to an instrument of a given class.
    pub fn shock_for(&self, instrument: &str, class: AssetClass) -> f64 {
        self.overrides
            .get(instrument)
            .or_else(|| self.shocks.get(&class))
            .copied()
            .unwrap_or(0.0)
    }
}

/// Stressed PnL of one instrument.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StressContribution {
    /// Instrument
    pub instrument: InstrumentId,
    /// Asset class of its factor
    pub asset_class: AssetClass,
    /// Position weight
    pub weight: f64,
    /// Factor move applied
    pub shock: f64,
    /// `weight * shock`
    pub pnl: f64,
}

/// Scenario result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StressResult {
    /// Scenario name
    pub scenario: String,
    /// Per-instrument PnL, worst first
    pub contributions: Vec<StressContribution>,
    /// Sum of contributions
    pub total_pnl: f64,
}

impl StressResult {
    /// Loss as a non-negative amount.
    pub fn loss(&self) -> f64 {
        (-self.total_pnl).max(0.0)
    }

    /// The `n` largest losing contributions.
    pub fn worst(&self, n: usize) -> impl Iterator<Item = &StressContribution> {
        self.contributions.iter().filter(|c| c.pnl < 0.0).take(n)
    }
}

/// Apply a scenario to weighted positions.
///
/// # Errors
/// [`RiskError::UnknownInstrument`] if a weight has no factor series (its
/// asset class is read from the series tag), [`RiskError::InvalidInput`] for
/// non-finite weights or shocks.
pub fn apply_scenario(
    factors: &FactorSet,
    weights: &PortfolioWeights,
    scenario: &StressScenario,
) -> Result<StressResult> {
    let shocks: Vec<f64> = scenario
        .shocks
        .values()
        .chain(scenario.overrides.values())
        .copied()
        .collect();
    check_finite(&shocks, "shock")?;
    check_finite(&weights.iter().map(|(_, w)| w).collect::<Vec<_>>(), "weight")?;

    let mut contributions = weights
        .iter()
        .map(|(id, weight)| {
            let class = factors
                .get(id)
                .ok_or_else(|| RiskError::UnknownInstrument(id.clone()))?
                .asset_class();
            let shock = scenario.shock_for(id, class);
            Ok(StressContribution {
                instrument: id.clone(),
                asset_class: class,
                weight,
                shock,
                pnl: weight * shock,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    contributions.sort_by(|a, b| {
        a.pnl
            .total_cmp(&b.pnl)
            .then_with(|| a.instrument.cmp(&b.instrument))
    });
    let total_pnl = contributions.iter().map(|c| c.pnl).sum();

    debug!(scenario = %scenario.name, total_pnl, "applied stress scenario");
    Ok(StressResult {
        scenario: scenario.name.clone(),
        contributions,
        total_pnl,
    })
}

/// Scenario results ordered from largest loss to largest gain.
pub fn run_scenarios(
    factors: &FactorSet,
    weights: &PortfolioWeights,
    scenarios: &[StressScenario],
) -> Result<Vec<StressResult>> {
    let mut results = scenarios
        .iter()
        .map(|s| apply_scenario(factors, weights, s))
        .collect::<Result<Vec<_>>>()?;
    results.sort_by(|a, b| match a.total_pnl.total_cmp(&b.total_pnl) {
        Ordering::Equal => a.scenario.cmp(&b.scenario),
        other => other,
    });
    Ok(results)
}
