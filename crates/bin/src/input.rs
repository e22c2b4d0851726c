//! Loading the JSON input document.

use keel::RunInput;
use keel::factors::{FactorBuilder, FactorSet, InstrumentId, RiskFactorSeries};
use keel::output::ExportFormat;
use keel::risk::{PnlSeries, PortfolioAggregator, PortfolioWeights, RiskError};
use std::error::Error;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::info;

/// Read an input document.
pub(crate) fn load(path: &Path) -> Result<RunInput, Box<dyn Error>> {
    let file = File::open(path).map_err(|e| format!("cannot open {}: {e}", path.display()))?;
    let input: RunInput = serde_json::from_reader(BufReader::new(file))
        .map_err(|e| format!("invalid input document {}: {e}", path.display()))?;
    info!(
        instruments = input.market.len(),
        positions = input.book.len(),
        "loaded {}",
        path.display()
    );
    Ok(input)
}

/// Export format from a file extension.
pub(crate) fn export_format(path: &Path) -> Result<ExportFormat, Box<dyn Error>> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => Ok(ExportFormat::PrettyJson),
        Some(ext) => Ok(ext.parse()?),
        None => Err(format!("{} has no extension; use .csv or .json", path.display()).into()),
    }
}

/// A loaded document with its factors built and the book checked.
pub(crate) struct Desk {
    pub(crate) input: RunInput,
    pub(crate) factors: FactorSet,
    pub(crate) weights: PortfolioWeights,
}

impl Desk {
    pub(crate) fn load(path: &Path) -> Result<Self, Box<dyn Error>> {
        let input = load(path)?;
        let factors = FactorBuilder::build_all(&input.market)?;
        input.book.check_against(&factors)?;
        let weights = input.book.weights();
        Ok(Self {
            input,
            factors,
            weights,
        })
    }

    pub(crate) fn pnl(&self) -> Result<PnlSeries, RiskError> {
        PortfolioAggregator::aggregate(&self.factors, &self.weights)
    }

    /// Instruments with a non-zero book weight.
    pub(crate) fn instruments(&self) -> Vec<InstrumentId> {
        self.weights.active().map(|(id, _)| id.clone()).collect()
    }

    pub(crate) fn series(&self, instrument: &str) -> Result<&RiskFactorSeries, RiskError> {
        self.factors
            .get(instrument)
            .ok_or_else(|| RiskError::UnknownInstrument(instrument.to_string()))
    }
}
