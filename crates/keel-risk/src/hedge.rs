//! Hedge Solver
//!
//! Finds position adjustments that make a portfolio first-order neutral to a
//! risk driver:
//!
//! Σ_i s_i * w_i = 0
//!
//! where `s_i` is the sensitivity of instrument i (delta, DV01, beta to an
//! index, ...). The solver does not care what the sensitivity means.
//!
//! With one hedge instrument h the solution is analytic:
//!
//! w_h = −(Σ_{i≠h} s_i * w_i) / s_h
//!
//! Several hedge instruments leave the system under-determined. Choosing
//! among the solutions needs an objective, which callers plug in through
//! [`HedgeObjective`]; no objective is assumed by default.

use crate::correlation::CorrelationAnalyzer;
use crate::error::{Result, RiskError, check_finite};
use crate::portfolio::{PnlSeries, PortfolioAggregator, PortfolioWeights};
use crate::var::{RiskEngine, RiskReport};
use keel_factors::{AssetClass, FactorSet, InstrumentId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// First-order sensitivity per instrument.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SensitivityVector(BTreeMap<InstrumentId, f64>);

impl SensitivityVector {
    /// Empty sensitivities.
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Set the sensitivity of an instrument, returning the previous one.
    pub fn insert(&mut self, instrument: impl Into<InstrumentId>, value: f64) -> Option<f64> {
        self.0.insert(instrument.into(), value)
    }

    /// Builder-style [`Self::insert`].
    pub fn with(mut self, instrument: impl Into<InstrumentId>, value: f64) -> Self {
        self.insert(instrument, value);
        self
    }

    /// Sensitivity of an instrument.
    pub fn get(&self, instrument: &str) -> Option<f64> {
        self.0.get(instrument).copied()
    }

    /// Sensitivities in instrument order.
    pub fn iter(&self) -> impl Iterator<Item = (&InstrumentId, f64)> {
        self.0.iter().map(|(k, &v)| (k, v))
    }

    fn require(&self, instrument: &str) -> Result<f64> {
        self.get(instrument)
            .ok_or_else(|| RiskError::UnknownInstrument(instrument.to_string()))
    }

    /// Net sensitivity Σ s_i w_i over the non-zero weights.
    ///
    /// # Errors
    /// [`RiskError::UnknownInstrument`] if a non-zero weight has no sensitivity.
    pub fn net(&self, weights: &PortfolioWeights) -> Result<f64> {
        weights
            .active()
            .map(|(id, w)| -> Result<f64> { Ok(self.require(id)? * w) })
            .sum()
    }
}

impl<S: Into<InstrumentId>> FromIterator<(S, f64)> for SensitivityVector {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Limits on hedge weights
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HedgeConstraints {
    /// Largest absolute weight any hedge instrument may take
    pub max_abs_weight: Option<f64>,
}

impl HedgeConstraints {
    /// Check the constraints.
    pub fn validate(&self) -> Result<()> {
        match self.max_abs_weight {
            Some(cap) if !(cap.is_finite() && cap > 0.0) => Err(RiskError::InvalidParameter(
                format!("max_abs_weight must be positive and finite, got {cap}"),
            )),
            _ => Ok(()),
        }
    }

    /// Apply the cap to a weight; the flag is set when it binds.
    pub fn clamp(&self, weight: f64) -> (f64, bool) {
        match self.max_abs_weight {
            Some(cap) if weight.abs() > cap => (cap.copysign(weight), true),
            _ => (weight, false),
        }
    }
}

/// Inputs handed to a [`HedgeObjective`].
#[derive(Debug, Clone, Copy)]
pub struct HedgeProblem<'a> {
    /// Current weights
    pub weights: &'a PortfolioWeights,
    /// Sensitivities, covering every hedge and non-zero weight
    pub sensitivities: &'a SensitivityVector,
    /// Designated hedge instruments (distinct, at least two)
    pub hedges: &'a [InstrumentId],
    /// Net sensitivity of all non-hedge positions, the amount to offset
    pub exposure: f64,
}

/// Objective that picks one hedge among many neutral ones.
///
/// Implementations return a weight for every instrument in
/// [`HedgeProblem::hedges`]. The solver verifies the result, applies
/// [`HedgeConstraints`] and reports the remaining net sensitivity.
pub trait HedgeObjective: fmt::Debug + Send + Sync {
    /// Hedge weights for the problem.
    fn solve(&self, problem: &HedgeProblem<'_>) -> Result<BTreeMap<InstrumentId, f64>>;
}

/// Hedge weights and what they achieve.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HedgeSolution {
    /// Full weights after hedging
    pub weights: PortfolioWeights,
    /// New minus old weight for each hedge instrument
    pub adjustments: PortfolioWeights,
    /// Net sensitivity before hedging
    pub net_before: f64,
    /// Net sensitivity after hedging (zero up to rounding unless clamped)
    pub net_after: f64,
    /// Whether a weight cap was binding
    pub clamped: bool,
}

/// Hedge solution with its effect on historical risk.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HedgeOutcome {
    /// Weights and sensitivities
    pub solution: HedgeSolution,
    /// Risk of the original portfolio
    pub unhedged: RiskReport,
    /// Risk after hedging
    pub hedged: RiskReport,
    /// PnL of the hedged portfolio
    pub hedged_pnl: PnlSeries,
    /// PnL of the hedge adjustments alone, `None` when nothing changed
    pub hedge_pnl: Option<PnlSeries>,
    /// Relative VaR reduction in percent, `None` when the unhedged VaR is zero
    pub var_reduction_pct: Option<f64>,
    /// Relative ES reduction in percent, `None` when the unhedged ES is zero
    pub es_reduction_pct: Option<f64>,
    /// Correlation of unhedged and hedge-only PnL, `None` if undefined
    pub hedge_correlation: Option<f64>,
}

fn reduction_pct(before: f64, after: f64) -> Option<f64> {
    (before > 0.0).then(|| (before - after) / before * 100.0)
}

/// Neutralises a portfolio's net sensitivity with designated hedge instruments.
#[derive(Debug, Clone, Default)]
pub struct HedgeSolver {
    constraints: HedgeConstraints,
    objective: Option<Arc<dyn HedgeObjective>>,
}

impl HedgeSolver {
    /// Create a solver with constraints and no multi-hedge objective.
    ///
    /// # Errors
    /// See [`HedgeConstraints::validate`].
    pub fn new(constraints: HedgeConstraints) -> Result<Self> {
        constraints.validate()?;
        Ok(Self {
            constraints,
            objective: None,
        })
    }

    /// Install an objective used when several hedge instruments are given.
    pub fn with_objective(mut self, objective: Arc<dyn HedgeObjective>) -> Self {
        self.objective = Some(objective);
        self
    }

    /// Constraints in use.
    pub const fn constraints(&self) -> &HedgeConstraints {
        &self.constraints
    }

    /// Solve for hedge weights.
    ///
    /// # Errors
    /// - [`RiskError::InvalidParameter`] for an empty or repeated hedge list
    /// - [`RiskError::UnknownInstrument`] for a missing sensitivity
    /// - [`RiskError::DegenerateHedge`] if a single hedge has zero sensitivity
    /// - [`RiskError::UnderdeterminedHedge`] for several hedges without an objective
    pub fn solve(
        &self,
        weights: &PortfolioWeights,
        sensitivities: &SensitivityVector,
        hedges: &[InstrumentId],
    ) -> Result<HedgeSolution> {
        let distinct: BTreeSet<&InstrumentId> = hedges.iter().collect();
        if hedges.is_empty() || distinct.len() != hedges.len() {
            return Err(RiskError::InvalidParameter(format!(
                "hedge instruments must be distinct and non-empty, got {hedges:?}"
            )));
        }
        let raw: Vec<f64> = weights
            .iter()
            .map(|(_, w)| w)
            .chain(sensitivities.iter().map(|(_, s)| s))
            .collect();
        check_finite(&raw, "weight or sensitivity")?;

        let hedge_sens = hedges
            .iter()
            .map(|h| sensitivities.require(h))
            .collect::<Result<Vec<f64>>>()?;

        let net_before = sensitivities.net(weights)?;
        let exposure = weights
            .active()
            .filter(|(id, _)| !distinct.contains(id))
            .map(|(id, w)| -> Result<f64> { Ok(sensitivities.require(id)? * w) })
            .sum::<Result<f64>>()?;

        let targets: BTreeMap<InstrumentId, f64> = match hedges {
            [hedge] => {
                if hedge_sens[0] == 0.0 {
                    return Err(RiskError::DegenerateHedge(hedge.clone()));
                }
                // `+ 0.0` turns a -0.0 weight into 0.0
                BTreeMap::from([(hedge.clone(), -exposure / hedge_sens[0] + 0.0)])
            }
            _ => {
                let Some(objective) = &self.objective else {
                    return Err(RiskError::UnderdeterminedHedge {
                        hedges: hedges.len(),
                    });
                };
                let problem = HedgeProblem {
                    weights,
                    sensitivities,
                    hedges,
                    exposure,
                };
                let solved = objective.solve(&problem)?;
                if let Some(missing) = hedges.iter().find(|h| !solved.contains_key(*h)) {
                    return Err(RiskError::InvalidInput(format!(
                        "hedge objective returned no weight for {missing}"
                    )));
                }
                check_finite(&solved.values().copied().collect::<Vec<_>>(), "hedge weight")?;
                solved
            }
        };

        let mut updated = weights.clone();
        let mut adjustments = PortfolioWeights::new();
        let mut clamped = false;
        for hedge in hedges {
            let (target, bound) = self.constraints.clamp(targets[hedge]);
            if bound {
                warn!(
                    instrument = %hedge,
                    wanted = targets[hedge],
                    applied = target,
                    "hedge weight capped; portfolio is not neutral"
                );
            }
            clamped |= bound;
            let previous = updated.insert(hedge.clone(), target).unwrap_or(0.0);
            adjustments.insert(hedge.clone(), target - previous);
        }

        let net_after = sensitivities.net(&updated)?;
        debug!(net_before, net_after, clamped, "solved hedge");

        Ok(HedgeSolution {
            weights: updated,
            adjustments,
            net_before,
            net_after,
            clamped,
        })
    }

    /// Solve the hedge and measure risk before and after on historical PnL.
    ///
    /// Each PnL series is aligned on its own active instruments, so the
    /// hedged window may be shorter than the unhedged one when the hedge
    /// instrument has a shorter history.
    pub fn evaluate(
        &self,
        factors: &FactorSet,
        weights: &PortfolioWeights,
        sensitivities: &SensitivityVector,
        hedges: &[InstrumentId],
        engine: &RiskEngine,
    ) -> Result<HedgeOutcome> {
        let solution = self.solve(weights, sensitivities, hedges)?;

        let unhedged_pnl = PortfolioAggregator::aggregate(factors, weights)?;
        let hedged_pnl = PortfolioAggregator::aggregate(factors, &solution.weights)?;
        let unhedged = engine.evaluate(&unhedged_pnl)?;
        let hedged = engine.evaluate(&hedged_pnl)?;

        let hedge_pnl = if solution.adjustments.active().next().is_some() {
            Some(PortfolioAggregator::aggregate(factors, &solution.adjustments)?)
        } else {
            None
        };

        let hedge_correlation = match &hedge_pnl {
            Some(h) => match CorrelationAnalyzer::default()
                .correlation(unhedged_pnl.observations(), h.observations())
            {
                Ok(rho) => Some(rho),
                Err(e) if e.is_insufficient_data() => None,
                Err(e) => return Err(e),
            },
            None => None,
        };

        let outcome = HedgeOutcome {
            var_reduction_pct: reduction_pct(unhedged.var, hedged.var),
            es_reduction_pct: reduction_pct(unhedged.es, hedged.es),
            hedge_correlation,
            solution,
            unhedged,
            hedged,
            hedged_pnl,
            hedge_pnl,
        };
        info!(
            unhedged_var = outcome.unhedged.var,
            hedged_var = outcome.hedged.var,
            clamped = outcome.solution.clamped,
            "hedge evaluated"
        );
        Ok(outcome)
    }
}

/// Sensitivities to an index, expressed as betas.
///
/// The index itself gets 1, equity instruments their beta against the index
/// on the shared factor window, and every other asset class 0. Hedging with
/// the index then makes the book beta-neutral.
///
/// # Errors
/// [`RiskError::UnknownInstrument`] if the index or a weighted instrument has
/// no factor series; beta estimation errors otherwise.
pub fn beta_sensitivities(
    factors: &FactorSet,
    weights: &PortfolioWeights,
    index: &str,
    analyzer: &CorrelationAnalyzer,
) -> Result<SensitivityVector> {
    let market = factors
        .get(index)
        .ok_or_else(|| RiskError::UnknownInstrument(index.to_string()))?;

    let mut sensitivities = SensitivityVector::new().with(index, 1.0);
    for (id, _) in weights.iter().filter(|(id, _)| id.as_str() != index) {
        let series = factors
            .get(id)
            .ok_or_else(|| RiskError::UnknownInstrument(id.clone()))?;
        let beta = match series.asset_class() {
            AssetClass::Equity => analyzer.beta(series.observations(), market.observations())?,
            _ => 0.0,
        };
        debug!(instrument = %id, beta, "beta to {index}");
        sensitivities.insert(id.clone(), beta);
    }
    Ok(sensitivities)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use chrono::{Duration, NaiveDate};
    use keel_factors::{FactorTag, RiskFactorSeries};

    fn ids(names: &[&str]) -> Vec<InstrumentId> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn series(tag: FactorTag, values: &[f64]) -> RiskFactorSeries {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        RiskFactorSeries::from_pairs(
            tag,
            values
                .iter()
                .enumerate()
                .map(|(i, &v)| (start + Duration::days(i as i64), v)),
        )
        .unwrap()
    }

    #[derive(Debug)]
    struct EqualSplit;

    impl HedgeObjective for EqualSplit {
        fn solve(&self, problem: &HedgeProblem<'_>) -> Result<BTreeMap<InstrumentId, f64>> {
            let share = -problem.exposure / problem.hedges.len() as f64;
            problem
                .hedges
                .iter()
                .map(|h| {
                    let s = problem
                        .sensitivities
                        .get(h)
                        .ok_or_else(|| RiskError::UnknownInstrument(h.clone()))?;
                    Ok((h.clone(), share / s))
                })
                .collect()
        }
    }

    #[test]
    fn test_single_hedge_is_neutral() {
        let weights = PortfolioWeights::new().with("A", 1.0).with("B", 0.0);
        let sens = SensitivityVector::new().with("A", 5.0).with("B", -10.0);

        let solution = HedgeSolver::default()
            .solve(&weights, &sens, &ids(&["B"]))
            .unwrap();

        assert_abs_diff_eq!(solution.weights.get("B").unwrap(), 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(solution.adjustments.get("B").unwrap(), 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(solution.net_before, 5.0, epsilon = 1e-12);
        assert_abs_diff_eq!(solution.net_after, 0.0, epsilon = 1e-12);
        let residual = 5.0 * solution.weights.get("A").unwrap()
            - 10.0 * solution.weights.get("B").unwrap();
        assert_abs_diff_eq!(residual, 0.0, epsilon = 1e-12);
        assert!(!solution.clamped);
    }

    #[test]
    fn test_existing_hedge_position_is_replaced() {
        let weights = PortfolioWeights::new().with("A", 2.0).with("H", 1.0);
        let sens = SensitivityVector::new().with("A", 1.0).with("H", 2.0);

        let solution = HedgeSolver::default()
            .solve(&weights, &sens, &ids(&["H"]))
            .unwrap();
        assert_abs_diff_eq!(solution.weights.get("H").unwrap(), -1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(solution.adjustments.get("H").unwrap(), -2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(solution.net_before, 4.0, epsilon = 1e-12);
    }

    #[test]
    fn test_zero_sensitivity_hedge() {
        let weights = PortfolioWeights::new().with("A", 1.0);
        let sens = SensitivityVector::new().with("A", 0.5).with("B", 0.0);
        let err = HedgeSolver::default()
            .solve(&weights, &sens, &ids(&["B"]))
            .unwrap_err();
        assert_eq!(err, RiskError::DegenerateHedge("B".to_string()));
    }

    #[test]
    fn test_missing_sensitivity() {
        let weights = PortfolioWeights::new().with("A", 1.0).with("C", 2.0);
        let sens = SensitivityVector::new().with("A", 0.5).with("B", 1.0);
        let err = HedgeSolver::default()
            .solve(&weights, &sens, &ids(&["B"]))
            .unwrap_err();
        assert_eq!(err, RiskError::UnknownInstrument("C".to_string()));

        let err = HedgeSolver::default()
            .solve(&weights, &sens, &ids(&["Z"]))
            .unwrap_err();
        assert_eq!(err, RiskError::UnknownInstrument("Z".to_string()));
    }

    #[test]
    fn test_several_hedges_need_objective() {
        let weights = PortfolioWeights::new().with("A", 1.0);
        let sens = SensitivityVector::new()
            .with("A", 1.0)
            .with("B", 1.0)
            .with("C", 2.0);
        let hedges = ids(&["B", "C"]);

        let err = HedgeSolver::default()
            .solve(&weights, &sens, &hedges)
            .unwrap_err();
        assert_eq!(err, RiskError::UnderdeterminedHedge { hedges: 2 });

        let solver = HedgeSolver::default().with_objective(Arc::new(EqualSplit));
        let solution = solver.solve(&weights, &sens, &hedges).unwrap();
        assert_abs_diff_eq!(solution.weights.get("B").unwrap(), -0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(solution.weights.get("C").unwrap(), -0.25, epsilon = 1e-12);
        assert_abs_diff_eq!(solution.net_after, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_invalid_hedge_lists() {
        let weights = PortfolioWeights::new().with("A", 1.0);
        let sens = SensitivityVector::new().with("A", 1.0);
        let solver = HedgeSolver::default();
        assert!(matches!(
            solver.solve(&weights, &sens, &[]),
            Err(RiskError::InvalidParameter(_))
        ));
        assert!(matches!(
            solver.solve(&weights, &sens, &ids(&["A", "A"])),
            Err(RiskError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_cap_binds() {
        let weights = PortfolioWeights::new().with("A", 10.0);
        let sens = SensitivityVector::new().with("A", 1.0).with("H", 1.0);
        let solver = HedgeSolver::new(HedgeConstraints {
            max_abs_weight: Some(4.0),
        })
        .unwrap();

        let solution = solver.solve(&weights, &sens, &ids(&["H"])).unwrap();
        assert_eq!(solution.weights.get("H"), Some(-4.0));
        assert!(solution.clamped);
        assert_abs_diff_eq!(solution.net_after, 6.0, epsilon = 1e-12);
    }

    #[test]
    fn test_invalid_cap() {
        let constraints = HedgeConstraints {
            max_abs_weight: Some(-1.0),
        };
        assert!(HedgeSolver::new(constraints).is_err());
    }

    #[test]
    fn test_evaluate_reduces_risk_of_offsetting_pair() {
        let a = [0.01, -0.02, 0.015, -0.03, 0.005, 0.02, -0.01, -0.025];
        let mut factors = FactorSet::new();
        factors.insert("A".to_string(), series(FactorTag::EQUITY, &a));
        let proxy: Vec<f64> = a.iter().map(|r| 0.5 * r).collect();
        factors.insert("H".to_string(), series(FactorTag::EQUITY, &proxy));

        let weights = PortfolioWeights::new().with("A", 1.0);
        let sens = SensitivityVector::new().with("A", 1.0).with("H", 0.5);
        let engine = RiskEngine::with_confidence(0.9).unwrap();

        let outcome = HedgeSolver::default()
            .evaluate(&factors, &weights, &sens, &ids(&["H"]), &engine)
            .unwrap();

        assert_abs_diff_eq!(outcome.solution.weights.get("H").unwrap(), -2.0, epsilon = 1e-12);
        assert!(outcome.unhedged.var > 0.0);
        assert_abs_diff_eq!(outcome.hedged.var, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(outcome.var_reduction_pct.unwrap(), 100.0, epsilon = 1e-6);
        assert_abs_diff_eq!(outcome.hedge_correlation.unwrap(), -1.0, epsilon = 1e-9);
        assert_eq!(outcome.hedged_pnl.len(), a.len());
    }

    #[test]
    fn test_beta_sensitivities() {
        let market: Vec<f64> = (0..40).map(|i| ((i * 7) % 11) as f64 / 100.0 - 0.05).collect();
        let stock: Vec<f64> = market.iter().map(|m| 1.2 * m).collect();
        let mut factors = FactorSet::new();
        factors.insert("SPX".to_string(), series(FactorTag::EQUITY, &market));
        factors.insert("STOCK".to_string(), series(FactorTag::EQUITY, &stock));
        factors.insert("EURUSD".to_string(), series(FactorTag::FX, &market));

        let weights = PortfolioWeights::new()
            .with("STOCK", 100.0)
            .with("EURUSD", 50.0);
        let sens =
            beta_sensitivities(&factors, &weights, "SPX", &CorrelationAnalyzer::default()).unwrap();

        assert_eq!(sens.get("SPX"), Some(1.0));
        assert_abs_diff_eq!(sens.get("STOCK").unwrap(), 1.2, epsilon = 1e-9);
        assert_eq!(sens.get("EURUSD"), Some(0.0));

        let solution = HedgeSolver::default()
            .solve(&weights, &sens, &ids(&["SPX"]))
            .unwrap();
        assert_abs_diff_eq!(solution.weights.get("SPX").unwrap(), -120.0, epsilon = 1e-6);
    }
}
