//! Plain-text regression report.

use crate::inference::{InferenceSummary, TermInference};
use crate::model::FittedModel;
use crate::partition::ObservationCounts;
use std::fmt;

const RULE_WIDTH: usize = 78;
const LABEL_WIDTH: usize = 34;

/// Everything the report prints, detached from the model it was built from.
#[derive(Debug, Clone)]
pub struct TobitReport {
    pub response_name: String,
    pub counts: ObservationCounts,
    pub summary: InferenceSummary,
    /// The minimized objective, `−log_likelihood`.
    pub neg_log_likelihood: f64,
    pub log_likelihood: f64,
    pub iterations: usize,
    pub converged: bool,
}

impl TobitReport {
    pub fn new(model: &FittedModel, summary: InferenceSummary) -> Self {
        Self {
            response_name: model.response_name.clone(),
            counts: model.counts,
            summary,
            neg_log_likelihood: model.diagnostics.final_value,
            log_likelihood: model.log_likelihood(),
            iterations: model.diagnostics.iterations,
            converged: model.converged(),
        }
    }
}

fn write_field(f: &mut fmt::Formatter<'_>, label: &str, value: impl fmt::Display) -> fmt::Result {
    writeln!(f, "{:<width$}{}", format!("{label}:"), value, width = LABEL_WIDTH)
}

fn write_row(f: &mut fmt::Formatter<'_>, term: &TermInference) -> fmt::Result {
    write!(f, "{:<12}{:>10.4}", term.name, term.estimate)?;
    match &term.statistics {
        Ok(stats) => writeln!(
            f,
            "{:>11.4}{:>10.3}{:>9.4}{:>12.4}{:>12.4}",
            stats.std_error, stats.z, stats.p_value, stats.ci_lower, stats.ci_upper
        ),
        Err(_) => writeln!(
            f,
            "{:>11}{:>10}{:>9}{:>12}{:>12}",
            "n/a", "n/a", "n/a", "n/a", "n/a"
        ),
    }
}

impl fmt::Display for TobitReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let heavy = "=".repeat(RULE_WIDTH);
        let light = "-".repeat(RULE_WIDTH);

        writeln!(f, "{:^width$}", "Tobit Regression Results", width = RULE_WIDTH)?;
        writeln!(f, "{heavy}")?;
        write_field(f, "Dep. Variable", &self.response_name)?;
        write_field(f, "Model", "Tobit")?;
        write_field(f, "Method", "Maximum Likelihood")?;
        write_field(f, "No. Observations", self.counts.total)?;
        write_field(f, "No. Left-censored", self.counts.left)?;
        write_field(f, "No. Right-censored", self.counts.right)?;
        write_field(f, "No. Censored Observations", self.counts.censored())?;
        write_field(f, "No. Uncensored Observations", self.counts.uncensored)?;
        writeln!(f, "{heavy}")?;

        writeln!(
            f,
            "{:<12}{:>10}{:>11}{:>10}{:>9}{:>12}{:>12}",
            "", "coef", "std err", "z", "P>|z|", "[0.025", "0.975]"
        )?;
        writeln!(f, "{light}")?;
        for term in self.summary.coefficients() {
            write_row(f, term)?;
        }
        writeln!(f, "{light}")?;
        write_row(f, self.summary.scale())?;
        writeln!(f, "{heavy}")?;

        write_field(f, "Sigma (scale)", format!("{:.4}", self.summary.scale().estimate))?;
        write_field(f, "Log-likelihood", format!("{:.4}", self.log_likelihood))?;
        write_field(f, "Neg. Log-likelihood", format!("{:.4}", self.neg_log_likelihood))?;
        write_field(f, "Number of Iterations", self.iterations)?;
        write_field(f, "Converged", if self.converged { "yes" } else { "no" })?;
        if self.summary.unavailable() > 0 {
            writeln!(
                f,
                "Note: {} term(s) have no standard error (variance not positive and finite).",
                self.summary.unavailable()
            )?;
        }
        write!(f, "{heavy}")
    }
}
