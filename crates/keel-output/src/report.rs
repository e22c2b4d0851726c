//! Timestamped run reports.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during report generation.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Builder was missing a required field.
    #[error("Missing report field: {0}")]
    MissingField(&'static str),
}

/// The output of one risk run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    /// Portfolio or book name.
    pub portfolio: String,

    /// Report generation timestamp.
    pub timestamp: DateTime<Utc>,

    /// Business date the run refers to, usually the last PnL date.
    pub as_of: Option<NaiveDate>,

    /// Kind of run, e.g. `var` or `backtest`.
    pub kind: String,

    /// Report contents (JSON format).
    pub contents: serde_json::Value,
}

impl Report {
    /// Create a new report stamped with the current time.
    pub fn new(portfolio: String, kind: String, contents: serde_json::Value) -> Self {
        Self {
            portfolio,
            timestamp: Utc::now(),
            as_of: None,
            kind,
            contents,
        }
    }

    /// Convert report to JSON string.
    pub fn to_json(&self) -> Result<String, ReportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the report as pretty JSON.
    pub fn write_to(&self, path: &Path) -> Result<(), ReportError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

/// Builder for creating reports.
#[derive(Debug, Default)]
pub struct ReportBuilder {
    portfolio: Option<String>,
    kind: Option<String>,
    as_of: Option<NaiveDate>,
    contents: Option<serde_json::Value>,
}

impl ReportBuilder {
    /// Create a new report builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the portfolio name.
    pub fn portfolio(mut self, portfolio: impl Into<String>) -> Self {
        self.portfolio = Some(portfolio.into());
        self
    }

    /// Set the run kind.
    pub fn kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    /// Set the business date.
    pub const fn as_of(mut self, date: NaiveDate) -> Self {
        self.as_of = Some(date);
        self
    }

    /// Set the report contents.
    pub fn contents(mut self, contents: serde_json::Value) -> Self {
        self.contents = Some(contents);
        self
    }

    /// Serialize any value into the report contents.
    pub fn contents_from<T: Serialize>(mut self, value: &T) -> Result<Self, ReportError> {
        self.contents = Some(serde_json::to_value(value)?);
        Ok(self)
    }

    /// Build the report.
    ///
    /// # Errors
    ///
    /// [`ReportError::MissingField`] without a portfolio name.
    pub fn build(self) -> Result<Report, ReportError> {
        let portfolio = self
            .portfolio
            .ok_or(ReportError::MissingField("portfolio"))?;
        let mut report = Report::new(
            portfolio,
            self.kind.unwrap_or_else(|| "risk".to_string()),
            self.contents.unwrap_or(serde_json::Value::Null),
        );
        report.as_of = self.as_of;
        Ok(report)
    }
}
