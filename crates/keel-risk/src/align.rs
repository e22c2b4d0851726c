//! Timestamp alignment
//!
//! Factor series are joined on the intersection of their timestamps. A date
//! missing from any one series is dropped for all of them; values are never
//! filled forward or backward.

use crate::error::{Result, RiskError};
use keel_factors::{FactorSet, InstrumentId, Observation, Timestamp};
use ndarray::Array2;
use std::collections::BTreeSet;
use tracing::debug;

/// Factor values restricted to the timestamps shared by every instrument.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedFactors {
    timestamps: Vec<Timestamp>,
    instruments: Vec<InstrumentId>,
    /// T x K, one row per timestamp and one column per instrument
    values: Array2<f64>,
}

impl AlignedFactors {
    /// Shared timestamps in time order.
    pub fn timestamps(&self) -> &[Timestamp] {
        &self.timestamps
    }

    /// Instruments in column order.
    pub fn instruments(&self) -> &[InstrumentId] {
        &self.instruments
    }

    /// Value matrix (timestamps x instruments).
    pub const fn values(&self) -> &Array2<f64> {
        &self.values
    }

    /// Number of aligned timestamps.
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    /// Whether no timestamp survived alignment.
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Column index of an instrument.
    pub fn column_of(&self, instrument: &str) -> Option<usize> {
        self.instruments.iter().position(|i| i == instrument)
    }
}

/// Align the factor series of `instruments` on their common timestamps.
///
/// # Errors
/// - [`RiskError::UnknownInstrument`] if an instrument has no series in `factors`
/// - [`RiskError::EmptyIntersection`] if no instrument is given or the series
///   share no timestamp
pub fn align(factors: &FactorSet, instruments: &[InstrumentId]) -> Result<AlignedFactors> {
    let series = instruments
        .iter()
        .map(|id| {
            factors
                .get(id)
                .ok_or_else(|| RiskError::UnknownInstrument(id.clone()))
        })
        .collect::<Result<Vec<_>>>()?;

    let Some((first, rest)) = series.split_first() else {
        return Err(RiskError::EmptyIntersection { series: 0 });
    };

    let mut common: BTreeSet<Timestamp> = first.timestamps().collect();
    for s in rest {
        let dates: BTreeSet<Timestamp> = s.timestamps().collect();
        common.retain(|t| dates.contains(t));
    }

    if common.is_empty() {
        return Err(RiskError::EmptyIntersection {
            series: series.len(),
        });
    }

    let timestamps: Vec<Timestamp> = common.into_iter().collect();
    let mut values = Array2::<f64>::zeros((timestamps.len(), series.len()));
    for (k, s) in series.iter().enumerate() {
        // Both sides are sorted, so a single merge pass fills the column.
        let mut obs = s.observations().iter();
        for (t, &date) in timestamps.iter().enumerate() {
            if let Some(o) = obs.find(|o| o.timestamp == date) {
                values[[t, k]] = o.value;
            }
        }
    }

    let longest = series.iter().map(|s| s.len()).max().unwrap_or(0);
    debug!(
        instruments = series.len(),
        aligned = timestamps.len(),
        dropped = longest - timestamps.len(),
        "aligned factor series"
    );

    Ok(AlignedFactors {
        timestamps,
        instruments: instruments.to_vec(),
        values,
    })
}

/// Pair two observation sequences on their common timestamps.
///
/// Returns the shared timestamps with the matching values of each side.
pub fn intersect_pair(
    left: &[Observation],
    right: &[Observation],
) -> (Vec<Timestamp>, Vec<f64>, Vec<f64>) {
    let mut timestamps = Vec::new();
    let mut xs = Vec::new();
    let mut ys = Vec::new();

    let (mut i, mut j) = (0, 0);
    while i < left.len() && j < right.len() {
        match left[i].timestamp.cmp(&right[j].timestamp) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                timestamps.push(left[i].timestamp);
                xs.push(left[i].value);
                ys.push(right[j].value);
                i += 1;
                j += 1;
            }
        }
    }

    (timestamps, xs, ys)
}
