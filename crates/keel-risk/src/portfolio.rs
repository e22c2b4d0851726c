//! Portfolio Aggregation
//!
//! Turns factor series and position weights into a single PnL series:
//!
//! PnL_t = Σ_i w_i * f_i,t
//!
//! over the timestamps shared by every series with a non-zero weight. Weights
//! are exposures in the units of the factor: notional for return factors,
//! DV01 (or contracts for DV01-scaled futures) for basis-point factors.

use crate::align::align;
use crate::error::{Result, RiskError, check_finite};
use keel_factors::{FactorSet, InstrumentId, Observation, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Position weight per instrument.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortfolioWeights(BTreeMap<InstrumentId, f64>);

impl PortfolioWeights {
    /// Empty weights.
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Set the weight of an instrument, returning the previous one.
    pub fn insert(&mut self, instrument: impl Into<InstrumentId>, weight: f64) -> Option<f64> {
        self.0.insert(instrument.into(), weight)
    }

    /// Builder-style [`Self::insert`].
    pub fn with(mut self, instrument: impl Into<InstrumentId>, weight: f64) -> Self {
        self.insert(instrument, weight);
        self
    }

    /// Weight of an instrument.
    pub fn get(&self, instrument: &str) -> Option<f64> {
        self.0.get(instrument).copied()
    }

    /// All weights in instrument order, zero weights included.
    pub fn iter(&self) -> impl Iterator<Item = (&InstrumentId, f64)> {
        self.0.iter().map(|(k, &v)| (k, v))
    }

    /// Instruments with a non-zero weight.
    pub fn active(&self) -> impl Iterator<Item = (&InstrumentId, f64)> {
        self.iter().filter(|(_, w)| *w != 0.0)
    }

    /// Number of instruments, zero weights included.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no instrument carries a weight.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sum of absolute weights.
    pub fn gross(&self) -> f64 {
        self.0.values().map(|w| w.abs()).sum()
    }
}

impl<S: Into<InstrumentId>> FromIterator<(S, f64)> for PortfolioWeights {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Portfolio PnL per timestamp.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PnlSeries {
    observations: Vec<Observation>,
}

impl PnlSeries {
    /// Create a PnL series.
    ///
    /// # Errors
    /// Returns [`RiskError::InvalidInput`] for non-increasing timestamps or
    /// non-finite values.
    pub fn new(observations: Vec<Observation>) -> Result<Self> {
        if let Some(pair) = observations
            .windows(2)
            .find(|p| p[1].timestamp <= p[0].timestamp)
        {
            return Err(RiskError::InvalidInput(format!(
                "PnL timestamps must be strictly increasing: {} follows {}",
                pair[1].timestamp, pair[0].timestamp
            )));
        }
        if let Some(bad) = observations.iter().find(|o| !o.value.is_finite()) {
            return Err(RiskError::InvalidInput(format!(
                "PnL at {} is not finite",
                bad.timestamp
            )));
        }
        Ok(Self { observations })
    }

    /// Create a PnL series from `(timestamp, value)` pairs.
    pub fn from_pairs<I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (Timestamp, f64)>,
    {
        Self::new(
            pairs
                .into_iter()
                .map(|(t, v)| Observation::new(t, v))
                .collect(),
        )
    }

    /// Number of observations.
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    /// Whether the series is empty.
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Observations in time order.
    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    /// Timestamps in time order.
    pub fn timestamps(&self) -> impl Iterator<Item = Timestamp> + '_ {
        self.observations.iter().map(|o| o.timestamp)
    }

    /// PnL values in time order.
    pub fn values(&self) -> Vec<f64> {
        self.observations.iter().map(|o| o.value).collect()
    }

    /// First and last timestamp.
    pub fn span(&self) -> Option<(Timestamp, Timestamp)> {
        Some((
            self.observations.first()?.timestamp,
            self.observations.last()?.timestamp,
        ))
    }
}

/// PnL contribution of every instrument on the aligned timestamps.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstrumentPnl {
    /// Shared timestamps
    pub timestamps: Vec<Timestamp>,
    /// `w_i * f_i,t` per instrument, aligned with `timestamps`
    pub contributions: BTreeMap<InstrumentId, Vec<f64>>,
}

impl InstrumentPnl {
    /// Sum of contributions per timestamp.
    pub fn total(&self) -> Result<PnlSeries> {
        let totals = self.timestamps.iter().enumerate().map(|(t, &date)| {
            let sum = self.contributions.values().map(|c| c[t]).sum();
            (date, sum)
        });
        PnlSeries::from_pairs(totals)
    }
}

/// Weighted aggregation of factor series into portfolio PnL.
#[derive(Debug, Clone, Copy, Default)]
pub struct PortfolioAggregator;

impl PortfolioAggregator {
    /// Portfolio PnL on the timestamps shared by all non-zero-weight series.
    ///
    /// # Errors
    /// - [`RiskError::UnknownInstrument`] if any weight key, zero or not, has
    ///   no factor series
    /// - [`RiskError::EmptyIntersection`] if the active series share no
    ///   timestamp or every weight is zero
    /// - [`RiskError::InvalidInput`] for non-finite weights
    pub fn aggregate(factors: &FactorSet, weights: &PortfolioWeights) -> Result<PnlSeries> {
        Self::pnl_by_instrument(factors, weights)?.total()
    }

    /// Per-instrument PnL contributions on the aligned timestamps.
    ///
    /// Only instruments with a non-zero weight appear in the result.
    pub fn pnl_by_instrument(
        factors: &FactorSet,
        weights: &PortfolioWeights,
    ) -> Result<InstrumentPnl> {
        let raw: Vec<f64> = weights.iter().map(|(_, w)| w).collect();
        check_finite(&raw, "weight")?;

        if let Some((missing, _)) = weights.iter().find(|(id, _)| !factors.contains_key(*id)) {
            return Err(RiskError::UnknownInstrument(missing.clone()));
        }

        let active: Vec<(InstrumentId, f64)> =
            weights.active().map(|(id, w)| (id.clone(), w)).collect();
        let skipped = weights.len() - active.len();
        if skipped > 0 {
            debug!(skipped, "zero-weight instruments left out of alignment");
        }

        let ids: Vec<InstrumentId> = active.iter().map(|(id, _)| id.clone()).collect();
        let aligned = align(factors, &ids)?;

        let mut mixed_units = false;
        let mut first_rates = None;
        for id in &ids {
            let rates = factors[id].asset_class().is_rates();
            match first_rates {
                None => first_rates = Some(rates),
                Some(r) if r != rates => mixed_units = true,
                Some(_) => {}
            }
        }
        if mixed_units {
            warn!("aggregating return and basis-point factors; weights must carry the unit conversion");
        }

        let contributions = active
            .iter()
            .enumerate()
            .map(|(k, (id, w))| {
                let column = aligned.values().column(k).iter().map(|f| w * f).collect();
                (id.clone(), column)
            })
            .collect();

        Ok(InstrumentPnl {
            timestamps: aligned.timestamps().to_vec(),
            contributions,
        })
    }
}
