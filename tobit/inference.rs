//! Wald inference from the inverse-curvature matrix.
//!
//! Standard errors are the square roots of its diagonal. Every term gets a
//! z-statistic, a two-sided normal p-value and a 95% confidence interval.
//! A term whose variance is not a positive finite number is reported as an
//! error on that term alone; the other rows are unaffected.

use crate::probability::two_sided_p_value;
use ndarray::{ArrayView1, ArrayView2};
use thiserror::Error;

/// Two-sided 95% normal critical value.
pub const CONFIDENCE_MULTIPLIER: f64 = 1.96;

/// Label of the intercept row.
pub const INTERCEPT_TERM: &str = "const";

/// Label of the scale row.
pub const SCALE_TERM: &str = "sigma";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum InferenceError {
    #[error("The variance of '{term}' is {variance}, so its standard error is undefined.")]
    NonPositiveVariance { term: String, variance: f64 },

    #[error(
        "The inverse-curvature matrix is {rows}x{cols} but {parameters} parameters were estimated."
    )]
    DimensionMismatch {
        rows: usize,
        cols: usize,
        parameters: usize,
    },

    #[error("{names} term names were given for {parameters} parameters (the scale is named automatically).")]
    NameMismatch { names: usize, parameters: usize },
}

/// Wald statistics of one estimated parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TermStatistics {
    pub std_error: f64,
    pub z: f64,
    pub p_value: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
}

/// One row of the summary.
#[derive(Debug, Clone, PartialEq)]
pub struct TermInference {
    pub name: String,
    pub estimate: f64,
    pub statistics: Result<TermStatistics, InferenceError>,
}

/// Per-parameter inference, ordered like the parameter vector: intercept
/// (when fitted), feature coefficients, then the scale.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceSummary {
    terms: Vec<TermInference>,
}

impl InferenceSummary {
    pub fn terms(&self) -> &[TermInference] {
        &self.terms
    }

    /// Every row except the scale.
    pub fn coefficients(&self) -> &[TermInference] {
        &self.terms[..self.terms.len() - 1]
    }

    pub fn scale(&self) -> &TermInference {
        &self.terms[self.terms.len() - 1]
    }

    pub fn term(&self, name: &str) -> Option<&TermInference> {
        self.terms.iter().find(|t| t.name == name)
    }

    /// Number of rows whose statistics could not be computed.
    pub fn unavailable(&self) -> usize {
        self.terms.iter().filter(|t| t.statistics.is_err()).count()
    }
}

/// Statistics for a single estimate given its variance.
pub fn term_statistics(name: &str, estimate: f64, variance: f64) -> Result<TermStatistics, InferenceError> {
    if !(variance.is_finite() && variance > 0.0) {
        return Err(InferenceError::NonPositiveVariance {
            term: name.to_string(),
            variance,
        });
    }
    let std_error = variance.sqrt();
    let z = estimate / std_error;
    let margin = CONFIDENCE_MULTIPLIER * std_error;
    Ok(TermStatistics {
        std_error,
        z,
        p_value: two_sided_p_value(z),
        ci_lower: estimate - margin,
        ci_upper: estimate + margin,
    })
}

/// Builds the summary for `[β..., σ]`.
///
/// `names` labels the coefficients only; the final row is always the scale,
/// labelled [`SCALE_TERM`].
pub fn summarize(
    names: &[String],
    estimates: ArrayView1<f64>,
    inverse_curvature: ArrayView2<f64>,
) -> Result<InferenceSummary, InferenceError> {
    let parameters = estimates.len();
    let (rows, cols) = inverse_curvature.dim();
    if rows != parameters || cols != parameters {
        return Err(InferenceError::DimensionMismatch {
            rows,
            cols,
            parameters,
        });
    }
    if parameters == 0 || names.len() + 1 != parameters {
        return Err(InferenceError::NameMismatch {
            names: names.len(),
            parameters,
        });
    }

    let terms: Vec<TermInference> = names
        .iter()
        .map(String::as_str)
        .chain(std::iter::once(SCALE_TERM))
        .enumerate()
        .map(|(j, name)| {
            let estimate = estimates[j];
            let statistics = term_statistics(name, estimate, inverse_curvature[[j, j]]);
            if let Err(e) = &statistics {
                log::warn!("{e}");
            }
            TermInference {
                name: name.to_string(),
                estimate,
                statistics,
            }
        })
        .collect();

    Ok(InferenceSummary { terms })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn wald_statistics_follow_from_the_diagonal() {
        let estimates = array![2.0, -0.5, 1.2];
        let cov = array![[0.25, 0.01, 0.0], [0.01, 0.04, 0.0], [0.0, 0.0, 0.09]];
        let summary = summarize(&names(&["const", "x"]), estimates.view(), cov.view()).unwrap();

        assert_eq!(summary.terms().len(), 3);
        assert_eq!(summary.coefficients().len(), 2);
        assert_eq!(summary.scale().name, SCALE_TERM);

        let intercept = summary.term("const").unwrap().statistics.as_ref().unwrap();
        assert_relative_eq!(intercept.std_error, 0.5);
        assert_relative_eq!(intercept.z, 4.0);
        assert_relative_eq!(intercept.ci_lower, 2.0 - 1.96 * 0.5);
        assert_relative_eq!(intercept.ci_upper, 2.0 + 1.96 * 0.5);
        assert!(intercept.p_value < 1e-4);

        let slope = summary.term("x").unwrap().statistics.as_ref().unwrap();
        assert_relative_eq!(slope.z, -2.5);
        // Two-sided normal tail at |z| = 2.5.
        assert_relative_eq!(slope.p_value, 0.012419330651552318, max_relative = 1e-8);

        let scale = summary.scale().statistics.as_ref().unwrap();
        assert_relative_eq!(scale.std_error, 0.3);
    }

    #[test]
    fn a_bad_variance_only_affects_its_own_row() {
        let estimates = array![1.0, 3.0, 0.8];
        let cov = array![[-0.1, 0.0, 0.0], [0.0, f64::NAN, 0.0], [0.0, 0.0, 0.01]];
        let summary = summarize(&names(&["const", "x"]), estimates.view(), cov.view()).unwrap();

        assert_eq!(summary.unavailable(), 2);
        match &summary.terms()[0].statistics {
            Err(InferenceError::NonPositiveVariance { term, variance }) => {
                assert_eq!(term, "const");
                assert_eq!(*variance, -0.1);
            }
            other => panic!("expected a variance error, got {other:?}"),
        }
        assert!(summary.terms()[1].statistics.is_err());
        assert!(summary.scale().statistics.is_ok());
        assert_eq!(summary.terms()[1].estimate, 3.0);
    }

    #[test]
    fn zero_variance_is_rejected() {
        assert!(term_statistics("x", 1.0, 0.0).is_err());
        assert!(term_statistics("x", 1.0, f64::INFINITY).is_err());
    }

    #[test]
    fn shape_errors_fail_the_whole_summary() {
        let estimates = array![1.0, 2.0];
        let cov = array![[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
        assert_eq!(
            summarize(&names(&["x"]), estimates.view(), cov.view()),
            Err(InferenceError::DimensionMismatch {
                rows: 3,
                cols: 3,
                parameters: 2
            })
        );

        let cov = array![[1.0, 0.0], [0.0, 1.0]];
        assert_eq!(
            summarize(&names(&["x", "z"]), estimates.view(), cov.view()),
            Err(InferenceError::NameMismatch {
                names: 2,
                parameters: 2
            })
        );
    }
}
