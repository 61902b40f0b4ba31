//! # Censored Negative Log-Likelihood
//!
//! For a parameter vector `[β..., σ]` the Tobit log-likelihood is the sum of
//! three independent terms, one per censoring group:
//!
//! - left-censored rows contribute `ln Φ((y − xβ)/σ)`, the mass at or below
//!   the recorded bound;
//! - right-censored rows contribute `ln Φ((xβ − y)/σ)`, the same form with the
//!   sign flipped by symmetry of the normal;
//! - uncensored rows contribute `ln φ((y − xβ)/σ) − ln σ`.
//!
//! Absent groups contribute nothing. The function returned for minimization is
//! the negated sum.

use crate::partition::{CensoredGroups, ObservationGroup};
use crate::probability::{log_normal_cdf, log_normal_pdf};
use ndarray::{Array1, ArrayView1, s};

/// Smallest scale the evaluators will use.
///
/// BFGS is unconstrained and may propose `σ <= 0`; every evaluation replaces
/// such values by this floor so the objective stays finite and the optimizer
/// can step back into the valid region.
pub const SCALE_FLOOR: f64 = f64::EPSILON;

/// Applies [`SCALE_FLOOR`]. `NaN` is mapped to the floor as well.
#[inline]
pub fn floored_scale(sigma: f64) -> f64 {
    sigma.max(SCALE_FLOOR)
}

/// Splits `[β..., σ]` into the coefficient view and the raw scale.
///
/// # Panics
/// If `params` is empty.
pub fn split_parameters(params: ArrayView1<'_, f64>) -> (ArrayView1<'_, f64>, f64) {
    let n = params.len();
    assert!(n > 0, "parameter vector must contain at least the scale");
    (params.slice_move(s![..n - 1]), params[n - 1])
}

/// Standardized residuals `(y − xβ)/σ` of one group.
pub(crate) fn lower_residuals(
    group: &ObservationGroup,
    beta: ArrayView1<f64>,
    sigma: f64,
) -> Array1<f64> {
    (&group.y - &group.x.dot(&beta)) / sigma
}

/// Standardized residuals `(xβ − y)/σ` of one group.
pub(crate) fn upper_residuals(
    group: &ObservationGroup,
    beta: ArrayView1<f64>,
    sigma: f64,
) -> Array1<f64> {
    (&group.x.dot(&beta) - &group.y) / sigma
}

/// Tobit log-likelihood split by group, before negation.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LogLikelihoodTerms {
    pub left: f64,
    pub mid: f64,
    pub right: f64,
}

impl LogLikelihoodTerms {
    pub fn total(&self) -> f64 {
        self.left + self.mid + self.right
    }
}

/// Evaluates each group's contribution to the log-likelihood.
pub fn log_likelihood_terms(groups: &CensoredGroups, params: ArrayView1<f64>) -> LogLikelihoodTerms {
    let (beta, raw_sigma) = split_parameters(params);
    let sigma = floored_scale(raw_sigma);

    let mut terms = LogLikelihoodTerms::default();

    if let Some(left) = &groups.left {
        terms.left = lower_residuals(left, beta, sigma)
            .iter()
            .map(|&z| log_normal_cdf(z))
            .sum();
    }

    if let Some(right) = &groups.right {
        terms.right = upper_residuals(right, beta, sigma)
            .iter()
            .map(|&z| log_normal_cdf(z))
            .sum();
    }

    if let Some(mid) = &groups.mid {
        let log_sigma = sigma.ln();
        terms.mid = lower_residuals(mid, beta, sigma)
            .iter()
            .map(|&z| log_normal_pdf(z) - log_sigma)
            .sum();
    }

    terms
}

/// Negative Tobit log-likelihood of `[β..., σ]`.
pub fn neg_log_likelihood(groups: &CensoredGroups, params: ArrayView1<f64>) -> f64 {
    -log_likelihood_terms(groups, params).total()
}
