//! Time series containers for prices and risk factors.

use crate::error::{FactorError, Result};
use crate::tag::{AssetClass, FactorTag};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Observation timestamp (daily horizon).
pub type Timestamp = NaiveDate;

/// Instrument identifier, e.g. a RIC such as `EUR=` or `.SPX`.
pub type InstrumentId = String;

/// Factor series keyed by instrument.
///
/// Ordered by key so that merges and reports are deterministic.
pub type FactorSet = BTreeMap<InstrumentId, RiskFactorSeries>;

/// A single (timestamp, value) pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Observation date
    pub timestamp: Timestamp,
    /// Observed value (`NaN` marks a missing price, `null` in JSON)
    #[serde(with = "missing_as_null")]
    pub value: f64,
}

mod missing_as_null {
    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_nan() {
            serializer.serialize_none()
        } else {
            serializer.serialize_some(value)
        }
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
    }
}

impl Observation {
    /// Create a new observation.
    pub const fn new(timestamp: Timestamp, value: f64) -> Self {
        Self { timestamp, value }
    }

    /// Whether the observation carries a value.
    pub const fn is_missing(&self) -> bool {
        self.value.is_nan()
    }
}

fn check_strictly_increasing(observations: &[Observation]) -> Result<()> {
    for pair in observations.windows(2) {
        if pair[1].timestamp <= pair[0].timestamp {
            return Err(FactorError::InvalidInput(format!(
                "timestamps must be strictly increasing: {} follows {}",
                pair[1].timestamp, pair[0].timestamp
            )));
        }
    }
    Ok(())
}

/// Raw market series for one instrument.
///
/// Values are prices, one side of an FX quote, or yield levels. Timestamps
/// are strictly increasing. `NaN` denotes a missing observation; infinite
/// values are rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Observation>", into = "Vec<Observation>")]
pub struct PriceSeries {
    observations: Vec<Observation>,
}

impl PriceSeries {
    /// Create a validated series.
    pub fn new(observations: Vec<Observation>) -> Result<Self> {
        check_strictly_increasing(&observations)?;
        if let Some(bad) = observations.iter().find(|o| o.value.is_infinite()) {
            return Err(FactorError::InvalidInput(format!(
                "infinite value at {}",
                bad.timestamp
            )));
        }
        Ok(Self { observations })
    }

    /// Create a series from `(timestamp, value)` pairs.
    pub fn from_pairs<I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (Timestamp, f64)>,
    {
        Self::new(
            pairs
                .into_iter()
                .map(|(timestamp, value)| Observation::new(timestamp, value))
                .collect(),
        )
    }

    /// Number of observations, missing ones included.
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    /// Whether the series has no observations.
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// All observations in time order.
    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    /// Timestamps in time order.
    pub fn timestamps(&self) -> impl Iterator<Item = Timestamp> + '_ {
        self.observations.iter().map(|o| o.timestamp)
    }

    /// Values in time order.
    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.observations.iter().map(|o| o.value)
    }
}

impl TryFrom<Vec<Observation>> for PriceSeries {
    type Error = FactorError;

    fn try_from(observations: Vec<Observation>) -> Result<Self> {
        Self::new(observations)
    }
}

impl From<PriceSeries> for Vec<Observation> {
    fn from(series: PriceSeries) -> Self {
        series.observations
    }
}

/// Risk factor series derived from one [`PriceSeries`].
///
/// The tag records which asset class and rule produced the values; downstream
/// aggregation relies on it to interpret units (returns vs basis points).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskFactorSeries {
    tag: FactorTag,
    observations: Vec<Observation>,
    excluded: Vec<Timestamp>,
}

impl RiskFactorSeries {
    /// Create a factor series.
    ///
    /// Values must be finite and timestamps strictly increasing. `excluded`
    /// lists the timestamps dropped because of missing source data.
    pub fn new(
        tag: FactorTag,
        observations: Vec<Observation>,
        excluded: Vec<Timestamp>,
    ) -> Result<Self> {
        check_strictly_increasing(&observations)?;
        if let Some(bad) = observations.iter().find(|o| !o.value.is_finite()) {
            return Err(FactorError::InvalidInput(format!(
                "factor value at {} is not finite",
                bad.timestamp
            )));
        }
        Ok(Self {
            tag,
            observations,
            excluded,
        })
    }

    /// Create a factor series from `(timestamp, value)` pairs with no exclusions.
    pub fn from_pairs<I>(tag: FactorTag, pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (Timestamp, f64)>,
    {
        Self::new(
            tag,
            pairs
                .into_iter()
                .map(|(timestamp, value)| Observation::new(timestamp, value))
                .collect(),
            Vec::new(),
        )
    }

    /// Tag of the series.
    pub const fn tag(&self) -> FactorTag {
        self.tag
    }

    /// Asset class of the series.
    pub const fn asset_class(&self) -> AssetClass {
        self.tag.asset_class()
    }

    /// Number of factor observations.
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    /// Whether the series has no observations.
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Factor observations in time order.
    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    /// Timestamps dropped because an adjacent source value was missing.
    pub fn excluded(&self) -> &[Timestamp] {
        &self.excluded
    }

    /// Timestamps in time order.
    pub fn timestamps(&self) -> impl Iterator<Item = Timestamp> + '_ {
        self.observations.iter().map(|o| o.timestamp)
    }

    /// Factor values in time order.
    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.observations.iter().map(|o| o.value)
    }

    /// Value at a timestamp, if present.
    pub fn value_at(&self, timestamp: Timestamp) -> Option<f64> {
        self.observations
            .binary_search_by(|o| o.timestamp.cmp(&timestamp))
            .ok()
            .map(|i| self.observations[i].value)
    }

    /// Same observations under a different tag.
    pub(crate) fn retag(self, tag: FactorTag) -> Self {
        Self { tag, ..self }
    }

    /// Map every value, keeping timestamps and exclusions.
    pub(crate) fn map_values(self, f: impl Fn(f64) -> f64) -> Self {
        let observations = self
            .observations
            .into_iter()
            .map(|o| Observation::new(o.timestamp, f(o.value)))
            .collect();
        Self {
            observations,
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> Timestamp {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    #[test]
    fn test_price_series_rejects_unordered_timestamps() {
        let result = PriceSeries::from_pairs([(d(2), 1.0), (d(1), 1.0)]);
        assert!(matches!(result, Err(FactorError::InvalidInput(_))));

        let dup = PriceSeries::from_pairs([(d(1), 1.0), (d(1), 1.1)]);
        assert!(matches!(dup, Err(FactorError::InvalidInput(_))));
    }

    #[test]
    fn test_price_series_allows_missing_but_not_infinite() {
        let series = PriceSeries::from_pairs([(d(1), 1.0), (d(2), f64::NAN)]).unwrap();
        assert!(series.observations()[1].is_missing());

        let inf = PriceSeries::from_pairs([(d(1), 1.0), (d(2), f64::INFINITY)]);
        assert!(inf.is_err());
    }

    #[test]
    fn test_factor_series_rejects_nan() {
        let result = RiskFactorSeries::from_pairs(FactorTag::EQUITY, [(d(1), f64::NAN)]);
        assert!(result.is_err());
    }

    #[test]
    fn test_value_at() {
        let series =
            RiskFactorSeries::from_pairs(FactorTag::FX, [(d(1), 0.1), (d(3), 0.3)]).unwrap();
        assert_eq!(series.value_at(d(3)), Some(0.3));
        assert_eq!(series.value_at(d(2)), None);
        assert_eq!(series.asset_class(), AssetClass::Fx);
    }

    #[test]
    fn test_missing_value_round_trips_as_null() {
        let json = r#"[{"timestamp":"2024-03-01","value":1.0},{"timestamp":"2024-03-02","value":null}]"#;
        let series: PriceSeries = serde_json::from_str(json).unwrap();
        assert!(series.observations()[1].is_missing());
        assert!(serde_json::to_string(&series).unwrap().contains("null"));
    }

    #[test]
    fn test_price_series_serde_validates() {
        let json = r#"[{"timestamp":"2024-03-02","value":1.0},{"timestamp":"2024-03-01","value":2.0}]"#;
        assert!(serde_json::from_str::<PriceSeries>(json).is_err());
    }
}
