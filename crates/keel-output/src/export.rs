//! CSV and JSON export of risk results.
//!
//! JSON mirrors the serde representation of each type. CSV flattens it into
//! one record per date, instrument or matrix row.

use crate::summary::RiskSummary;
use chrono::NaiveDate;
use keel_risk::{BacktestReport, CorrelationMatrix, PnlSeries, StressResult};
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during export operations.
#[derive(Debug, Error)]
pub enum ExportError {
    /// CSV serialization error.
    #[error("CSV serialization error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization error.
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid format error.
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

/// Export format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// Comma-separated values format.
    Csv,

    /// Compact JSON format.
    Json,

    /// Pretty-printed JSON format.
    PrettyJson,
}

impl ExportFormat {
    /// Get the file extension for this format.
    pub const fn extension(&self) -> &str {
        match self {
            Self::Csv => "csv",
            Self::Json | Self::PrettyJson => "json",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            "pretty" | "pretty-json" | "pretty_json" => Ok(Self::PrettyJson),
            other => Err(ExportError::InvalidFormat(other.to_string())),
        }
    }
}

/// Trait for exporting data in various formats.
pub trait Exporter {
    /// Export data to a string in the specified format.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError>;

    /// Export data to a file in the specified format.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or file writing fails.
    fn export_to_file(&self, path: &Path, format: ExportFormat) -> Result<(), ExportError> {
        let content = self.export_to_string(format)?;
        let mut file = File::create(path)?;
        file.write_all(content.as_bytes())?;
        Ok(())
    }
}

fn finish_csv(wtr: csv::Writer<Vec<u8>>) -> Result<String, ExportError> {
    let bytes = wtr.into_inner().map_err(|e| e.into_error())?;
    String::from_utf8(bytes).map_err(|e| ExportError::InvalidFormat(e.to_string()))
}

fn csv_records<T: Serialize>(records: impl IntoIterator<Item = T>) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    for record in records {
        wtr.serialize(record)?;
    }
    finish_csv(wtr)
}

fn json<T: Serialize + ?Sized>(value: &T, format: ExportFormat) -> Result<String, ExportError> {
    Ok(match format {
        ExportFormat::PrettyJson => serde_json::to_string_pretty(value)?,
        _ => serde_json::to_string(value)?,
    })
}

#[derive(Serialize)]
struct PnlRecord<'a> {
    portfolio: &'a str,
    date: NaiveDate,
    pnl: f64,
}

/// Named PnL series.
#[derive(Debug, Clone, Copy)]
pub struct PnlExport<'a> {
    /// Portfolio name.
    pub name: &'a str,

    /// PnL series.
    pub pnl: &'a PnlSeries,
}

impl Exporter for PnlExport<'_> {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        let records = self.pnl.observations().iter().map(|o| PnlRecord {
            portfolio: self.name,
            date: o.timestamp,
            pnl: o.value,
        });
        match format {
            ExportFormat::Csv => csv_records(records),
            _ => json(&records.collect::<Vec<_>>(), format),
        }
    }
}

impl Exporter for CorrelationMatrix {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        match format {
            ExportFormat::Csv => {
                let mut wtr = csv::Writer::from_writer(vec![]);
                let mut header = vec!["instrument".to_string()];
                header.extend(self.instruments().iter().cloned());
                wtr.write_record(&header)?;
                for (id, row) in self.instruments().iter().zip(self.rows()) {
                    let mut record = vec![id.clone()];
                    record.extend(row.iter().map(|v| v.map(|x| x.to_string()).unwrap_or_default()));
                    wtr.write_record(&record)?;
                }
                finish_csv(wtr)
            }
            _ => json(self, format),
        }
    }
}

#[derive(Serialize)]
struct BacktestRecord {
    date: NaiveDate,
    var: f64,
    es: f64,
    pnl: f64,
    breach: bool,
}

impl Exporter for BacktestReport {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        match format {
            ExportFormat::Csv => csv_records(self.points.iter().map(|p| BacktestRecord {
                date: p.timestamp,
                var: p.var,
                es: p.es,
                pnl: p.realized_pnl,
                breach: p.is_breach(),
            })),
            _ => json(self, format),
        }
    }
}

#[derive(Serialize)]
struct StressRecord<'a> {
    scenario: &'a str,
    instrument: &'a str,
    asset_class: &'a str,
    weight: f64,
    shock: f64,
    pnl: f64,
}

impl Exporter for Vec<StressResult> {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        match format {
            ExportFormat::Csv => csv_records(self.iter().flat_map(|result| {
                result.contributions.iter().map(|c| StressRecord {
                    scenario: &result.scenario,
                    instrument: &c.instrument,
                    asset_class: c.asset_class.code(),
                    weight: c.weight,
                    shock: c.shock,
                    pnl: c.pnl,
                })
            })),
            _ => json(self, format),
        }
    }
}

#[derive(Serialize)]
struct SummaryRecord<'a> {
    portfolio: &'a str,
    metric: String,
    value: f64,
}

impl Exporter for RiskSummary {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        match format {
            ExportFormat::Csv => {
                let record = |metric: String, value: f64| SummaryRecord {
                    portfolio: &self.name,
                    metric,
                    value,
                };
                let mut records = vec![
                    record("var".to_string(), self.var),
                    record("es".to_string(), self.es),
                ];
                for c in &self.contributions {
                    records.push(record(format!("var_{}", c.instrument), c.standalone_var));
                    records.push(record(format!("es_{}", c.instrument), c.standalone_es));
                }
                if let Some(hedge) = &self.hedge {
                    records.push(record("hedged_var".to_string(), hedge.hedged_var));
                    records.push(record("hedged_es".to_string(), hedge.hedged_es));
                }
                csv_records(records)
            }
            _ => json(self, format),
        }
    }
}
