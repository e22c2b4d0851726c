//! Portfolio risk summary.
//!
//! Collects the portfolio VaR/ES, the standalone risk of every position, the
//! effect of a hedge and limit utilisation into one printable structure.

use chrono::NaiveDate;
use keel_factors::{AssetClass, FactorSet, InstrumentId};
use keel_risk::{
    HedgeOutcome, LimitCheck, LimitStatus, PortfolioAggregator, PortfolioWeights, RiskEngine,
    RiskError, overall_status,
};
use serde::{Deserialize, Serialize};
use std::fmt;

fn amount(value: f64) -> String {
    if value.abs() >= 1.0 {
        format!("{value:.2}")
    } else {
        format!("{value:.6}")
    }
}

/// Standalone risk of one position.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InstrumentRiskContribution {
    /// Instrument identifier.
    pub instrument: InstrumentId,

    /// Asset class of the instrument's factor.
    pub asset_class: AssetClass,

    /// Position weight.
    pub weight: f64,

    /// VaR of the position on its own, on the portfolio window.
    pub standalone_var: f64,

    /// ES of the position on its own, on the portfolio window.
    pub standalone_es: f64,
}

impl fmt::Display for InstrumentRiskContribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}]: VaR {} / ES {} (weight {})",
            self.instrument,
            self.asset_class,
            amount(self.standalone_var),
            amount(self.standalone_es),
            amount(self.weight)
        )
    }
}

/// Effect of a hedge on portfolio risk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HedgeSummary {
    /// Hedge instruments and their final weights.
    pub hedge_weights: Vec<(InstrumentId, f64)>,

    /// VaR before hedging.
    pub unhedged_var: f64,

    /// VaR after hedging.
    pub hedged_var: f64,

    /// ES before hedging.
    pub unhedged_es: f64,

    /// ES after hedging.
    pub hedged_es: f64,

    /// VaR reduction in percent.
    pub var_reduction_pct: Option<f64>,

    /// Correlation of unhedged and hedge-only PnL.
    pub hedge_correlation: Option<f64>,

    /// Whether a hedge weight cap was binding.
    pub clamped: bool,
}

impl From<&HedgeOutcome> for HedgeSummary {
    fn from(outcome: &HedgeOutcome) -> Self {
        let hedge_weights = outcome
            .solution
            .adjustments
            .iter()
            .map(|(id, _)| {
                (
                    id.clone(),
                    outcome.solution.weights.get(id).unwrap_or_default(),
                )
            })
            .collect();
        Self {
            hedge_weights,
            unhedged_var: outcome.unhedged.var,
            hedged_var: outcome.hedged.var,
            unhedged_es: outcome.unhedged.es,
            hedged_es: outcome.hedged.es,
            var_reduction_pct: outcome.var_reduction_pct,
            hedge_correlation: outcome.hedge_correlation,
            clamped: outcome.solution.clamped,
        }
    }
}

/// Risk summary for a portfolio.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskSummary {
    /// Portfolio name.
    pub name: String,

    /// First date of the PnL window.
    pub period_start: NaiveDate,

    /// Last date of the PnL window.
    pub period_end: NaiveDate,

    /// Confidence level α.
    pub confidence: f64,

    /// Historical VaR.
    pub var: f64,

    /// Historical ES.
    pub es: f64,

    /// Number of PnL observations.
    pub sample_size: usize,

    /// ES fell back to the worst loss.
    pub tail_degenerate: bool,

    /// Standalone risk per position, largest VaR first.
    pub contributions: Vec<InstrumentRiskContribution>,

    /// Hedge effect, if a hedge was evaluated.
    pub hedge: Option<HedgeSummary>,

    /// Limit checks.
    pub limits: Vec<LimitCheck>,
}

impl RiskSummary {
    /// Attach a hedge outcome.
    pub fn with_hedge(mut self, outcome: &HedgeOutcome) -> Self {
        self.hedge = Some(HedgeSummary::from(outcome));
        self
    }

    /// Attach limit checks.
    pub fn with_limits(mut self, checks: Vec<LimitCheck>) -> Self {
        self.limits = checks;
        self
    }

    /// Sum of standalone VaRs minus portfolio VaR.
    pub fn diversification_benefit(&self) -> f64 {
        self.contributions
            .iter()
            .map(|c| c.standalone_var)
            .sum::<f64>()
            - self.var
    }

    /// Worst limit status, `Ok` without limits.
    pub fn limit_status(&self) -> LimitStatus {
        overall_status(&self.limits)
    }

    /// Format as ASCII table for terminal display.
    pub fn to_ascii_table(&self) -> String {
        let mut output = String::new();
        let pct = self.confidence * 100.0;

        output.push_str(&format!("\nRisk Summary: {}\n", self.name));
        output.push_str(&format!(
            "Period: {} to {} ({} observations)\n",
            self.period_start, self.period_end, self.sample_size
        ));
        output.push_str(&"=".repeat(80));
        output.push('\n');

        output.push_str("\nPortfolio Risk:\n");
        output.push_str(&"-".repeat(80));
        output.push('\n');
        output.push_str(&format!("  {pct:.1}% VaR:               {}\n", amount(self.var)));
        output.push_str(&format!("  {pct:.1}% ES:                {}", amount(self.es)));
        if self.tail_degenerate {
            output.push_str(" (degenerate tail)");
        }
        output.push('\n');
        output.push_str(&format!(
            "  Diversification:          {}\n",
            amount(self.diversification_benefit())
        ));

        if !self.contributions.is_empty() {
            output.push_str("\nStandalone Risk by Instrument:\n");
            output.push_str(&"-".repeat(80));
            output.push('\n');
            output.push_str(&format!(
                "{:<16} {:>10} {:>16} {:>16} {:>16}\n",
                "Instrument", "Class", "Weight", "VaR", "ES"
            ));
            output.push_str(&"-".repeat(80));
            output.push('\n');
            for c in &self.contributions {
                output.push_str(&format!(
                    "{:<16} {:>10} {:>16} {:>16} {:>16}\n",
                    c.instrument,
                    c.asset_class.code(),
                    amount(c.weight),
                    amount(c.standalone_var),
                    amount(c.standalone_es)
                ));
            }
        }

        if let Some(hedge) = &self.hedge {
            output.push_str("\nHedge:\n");
            output.push_str(&"-".repeat(80));
            output.push('\n');
            for (id, w) in &hedge.hedge_weights {
                output.push_str(&format!("  {:<24}{}\n", id, amount(*w)));
            }
            output.push_str(&format!(
                "  VaR:                      {} -> {}\n",
                amount(hedge.unhedged_var),
                amount(hedge.hedged_var)
            ));
            output.push_str(&format!(
                "  ES:                       {} -> {}\n",
                amount(hedge.unhedged_es),
                amount(hedge.hedged_es)
            ));
            if let Some(r) = hedge.var_reduction_pct {
                output.push_str(&format!("  VaR reduction:            {r:.1}%\n"));
            }
            if let Some(rho) = hedge.hedge_correlation {
                output.push_str(&format!("  Corr(unhedged, hedge):    {rho:.3}\n"));
            }
            if hedge.clamped {
                output.push_str("  Hedge weight capped, portfolio not fully neutral\n");
            }
        }

        if !self.limits.is_empty() {
            output.push_str("\nLimits:\n");
            output.push_str(&"-".repeat(80));
            output.push('\n');
            output.push_str(&format!(
                "{:<16} {:>16} {:>16} {:>12} {:>10}\n",
                "Metric", "Value", "Limit", "Used", "Status"
            ));
            for check in &self.limits {
                output.push_str(&format!(
                    "{:<16} {:>16} {:>16} {:>11.1}% {:>10}\n",
                    check.metric.to_string(),
                    amount(check.value),
                    amount(check.limit),
                    check.utilization * 100.0,
                    check.status.to_string()
                ));
            }
        }

        output.push_str(&"=".repeat(80));
        output.push('\n');

        output
    }

    /// Format as Markdown for documentation.
    pub fn to_markdown(&self) -> String {
        let mut output = String::new();
        let pct = self.confidence * 100.0;

        output.push_str(&format!("# Risk Summary: {}\n\n", self.name));
        output.push_str(&format!(
            "**Period:** {} to {} ({} observations)\n\n",
            self.period_start, self.period_end, self.sample_size
        ));

        output.push_str("## Portfolio Risk\n\n");
        output.push_str(&format!("- **{pct:.1}% VaR:** {}\n", amount(self.var)));
        output.push_str(&format!("- **{pct:.1}% ES:** {}\n", amount(self.es)));
        output.push_str(&format!(
            "- **Diversification:** {}\n\n",
            amount(self.diversification_benefit())
        ));

        if !self.contributions.is_empty() {
            output.push_str("## Standalone Risk\n\n");
            output.push_str("| Instrument | Class | Weight | VaR | ES |\n");
            output.push_str("|------------|-------|--------|-----|----|\n");
            for c in &self.contributions {
                output.push_str(&format!(
                    "| {} | {} | {} | {} | {} |\n",
                    c.instrument,
                    c.asset_class.code(),
                    amount(c.weight),
                    amount(c.standalone_var),
                    amount(c.standalone_es)
                ));
            }
            output.push('\n');
        }

        if let Some(hedge) = &self.hedge {
            output.push_str("## Hedge\n\n");
            output.push_str(&format!(
                "- **VaR:** {} → {}\n",
                amount(hedge.unhedged_var),
                amount(hedge.hedged_var)
            ));
            if let Some(r) = hedge.var_reduction_pct {
                output.push_str(&format!("- **VaR reduction:** {r:.1}%\n"));
            }
            output.push('\n');
        }

        if !self.limits.is_empty() {
            output.push_str("## Limits\n\n");
            output.push_str("| Metric | Value | Limit | Status |\n");
            output.push_str("|--------|-------|-------|--------|\n");
            for check in &self.limits {
                output.push_str(&format!(
                    "| {} | {} | {} | {} |\n",
                    check.metric,
                    amount(check.value),
                    amount(check.limit),
                    check.status
                ));
            }
        }

        output
    }
}

impl fmt::Display for RiskSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Risk Summary: {} ({} to {})",
            self.name, self.period_start, self.period_end
        )?;
        writeln!(f, "  VaR {:.1}%: {}", self.confidence * 100.0, amount(self.var))?;
        writeln!(f, "  ES {:.1}%: {}", self.confidence * 100.0, amount(self.es))?;
        if !self.limits.is_empty() {
            writeln!(f, "  Limits: {}", self.limit_status())?;
        }
        Ok(())
    }
}

/// Build a risk summary from factors and weights.
///
/// Standalone figures use the same aligned window as the portfolio, so they
/// are comparable with the portfolio VaR.
///
/// # Errors
///
/// Aggregation and VaR errors from [`keel_risk`].
pub fn generate_risk_summary(
    name: impl Into<String>,
    factors: &FactorSet,
    weights: &PortfolioWeights,
    engine: &RiskEngine,
) -> Result<RiskSummary, RiskError> {
    let by_instrument = PortfolioAggregator::pnl_by_instrument(factors, weights)?;
    let pnl = by_instrument.total()?;
    let report = engine.evaluate(&pnl)?;

    let mut contributions = by_instrument
        .contributions
        .iter()
        .map(|(id, column)| {
            let standalone = engine.evaluate_values(column)?;
            Ok(InstrumentRiskContribution {
                instrument: id.clone(),
                asset_class: factors[id].asset_class(),
                weight: weights.get(id).unwrap_or_default(),
                standalone_var: standalone.var,
                standalone_es: standalone.es,
            })
        })
        .collect::<Result<Vec<_>, RiskError>>()?;
    contributions.sort_by(|a, b| {
        b.standalone_var
            .total_cmp(&a.standalone_var)
            .then_with(|| a.instrument.cmp(&b.instrument))
    });

    let (period_start, period_end) = pnl.span().ok_or(RiskError::EmptyIntersection {
        series: contributions.len(),
    })?;

    Ok(RiskSummary {
        name: name.into(),
        period_start,
        period_end,
        confidence: report.confidence,
        var: report.var,
        es: report.es,
        sample_size: report.sample_size,
        tail_degenerate: report.tail_degenerate,
        contributions,
        hedge: None,
        limits: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use keel_factors::{FactorTag, RiskFactorSeries};
    use keel_risk::RiskLimits;

    fn factors() -> FactorSet {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let series = |tag, values: &[f64]| {
            RiskFactorSeries::from_pairs(
                tag,
                values
                    .iter()
                    .enumerate()
                    .map(|(i, &v)| (start + chrono::Duration::days(i as i64), v)),
            )
            .unwrap()
        };
        let mut set = FactorSet::new();
        set.insert(
            "SPX".to_string(),
            series(FactorTag::EQUITY, &[-0.05, -0.03, -0.01, 0.00, 0.02, 0.04]),
        );
        set.insert(
            "EURUSD".to_string(),
            series(FactorTag::FX, &[0.01, 0.02, -0.01, 0.00, -0.02, 0.01]),
        );
        set
    }

    fn summary() -> RiskSummary {
        let weights = PortfolioWeights::new().with("SPX", 1.0).with("EURUSD", 1.0);
        let engine = RiskEngine::with_confidence(0.95).unwrap();
        generate_risk_summary("Desk", &factors(), &weights, &engine).unwrap()
    }

    #[test]
    fn test_generate_risk_summary() {
        let summary = summary();
        assert_eq!(summary.name, "Desk");
        assert_eq!(summary.sample_size, 6);
        assert_eq!(summary.contributions.len(), 2);
        assert_eq!(summary.contributions[0].instrument, "SPX");
        assert_abs_diff_eq!(summary.contributions[0].standalone_var, 0.045, epsilon = 1e-12);
        assert_eq!(summary.contributions[1].asset_class, AssetClass::Fx);
        assert!(summary.diversification_benefit() >= 0.0);
    }

    #[test]
    fn test_risk_summary_ascii_table() {
        let checks = RiskLimits {
            var: Some(0.01),
            ..Default::default()
        }
        .check(
            &keel_risk::RiskReport {
                confidence: 0.95,
                var: 0.02,
                es: 0.03,
                sample_size: 6,
                tail_size: 1,
                tail_degenerate: false,
            },
            None,
        );
        let table = summary().with_limits(checks).to_ascii_table();
        assert!(table.contains("Risk Summary: Desk"));
        assert!(table.contains("95.0% VaR"));
        assert!(table.contains("SPX"));
        assert!(table.contains("BREACH"));
    }

    #[test]
    fn test_risk_summary_markdown() {
        let markdown = summary().to_markdown();
        assert!(markdown.contains("# Risk Summary: Desk"));
        assert!(markdown.contains("| Instrument | Class |"));
        assert!(markdown.contains("| EURUSD | FX |"));
    }

    #[test]
    fn test_risk_summary_display() {
        let text = summary().to_string();
        assert!(text.starts_with("Risk Summary: Desk (2024-01-01 to 2024-01-06)"));
        assert!(!text.contains("Limits"));
    }

    #[test]
    fn test_amount_format() {
        assert_eq!(amount(12_345.678), "12345.68");
        assert_eq!(amount(0.045), "0.045000");
    }
}
