// tobit/estimate.rs

//! # Maximum-Likelihood Estimation Driver
//!
//! Fits `[β..., σ]` by minimizing the censored negative log-likelihood:
//!
//! 1.  **Warm start:** an ordinary least-squares fit of the response on the
//!     design gives `β₀`, and the population standard deviation of its
//!     residuals gives `σ₀`. The censored likelihood is not convex in general
//!     and a poor start can drift toward a degenerate near-zero scale.
//!
//! 2.  **BFGS:** the objective and its analytic gradient are handed to the
//!     `wolfe_bfgs` quasi-Newton solver. Running out of iterations or failing
//!     the line search still yields the best iterate, flagged as not converged.
//!
//! 3.  **Curvature:** the observed information at the optimum is rebuilt by
//!     differencing the analytic gradient and inverted to give the
//!     inverse-curvature matrix used for inference.

// External Crate for Optimization
use wolfe_bfgs::{Bfgs, BfgsError, BfgsSolution};

// Crate-level imports
use crate::gradient::neg_log_likelihood_gradient;
use crate::hessian::{finite_difference_hessian, invert_information};
use crate::likelihood::{SCALE_FLOOR, floored_scale, neg_log_likelihood};
use crate::model::FitConfig;
use crate::partition::{CensoredGroups, CensoringCode, ObservationCounts, PartitionError, partition};

// Ndarray and Linalg
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use ndarray_linalg::LeastSquaresSvd;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Objective value handed to BFGS when an evaluation is not finite.
const NON_FINITE_PENALTY: f64 = 1e100;

/// Largest relative curvature step; keeps `σ − h_σ` above `3σ/4`.
const MAX_RELATIVE_STEP: f64 = 0.25;

/// A comprehensive error type for the estimation process.
#[derive(Error, Debug)]
pub enum EstimationError {
    #[error("Partitioning the observations by censoring status failed: {0}")]
    Partition(#[from] PartitionError),

    #[error("At least one observation is required to fit the model.")]
    NoObservations,

    #[error("The design matrix has no columns. Enable the intercept or supply at least one feature.")]
    EmptyDesign,

    #[error("The least-squares warm start failed: {0}")]
    WarmStartFailed(ndarray_linalg::error::LinalgError),

    #[error("The negative log-likelihood at the warm start is not finite: {0}")]
    NonFiniteInitialCost(f64),

    #[error("{names} feature names were given for {columns} feature columns.")]
    FeatureNameMismatch { names: usize, columns: usize },

    #[error("Feature '{0}' uses a name reserved for the intercept or scale row of the summary. Rename the column.")]
    ReservedFeatureName(String),

    #[error("BFGS optimization failed: {0}")]
    OptimizationFailed(String),
}

/// Starting point obtained from ordinary least squares.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarmStart {
    /// OLS coefficients on the same design the likelihood uses.
    pub beta: Array1<f64>,
    /// `sqrt(var(residuals))`, population variance.
    pub sigma: f64,
}

impl WarmStart {
    /// The warm start as a full parameter vector `[β₀..., σ₀]`.
    pub fn parameters(&self) -> Array1<f64> {
        let mut params = Array1::zeros(self.beta.len() + 1);
        params
            .slice_mut(ndarray::s![..self.beta.len()])
            .assign(&self.beta);
        params[self.beta.len()] = self.sigma;
        params
    }
}

/// What the optimizer reported at termination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerDiagnostics {
    /// The last iterate returned by BFGS, before any flooring of the scale.
    pub final_point: Array1<f64>,
    /// Negative log-likelihood at `final_point`.
    pub final_value: f64,
    pub iterations: usize,
    pub converged: bool,
    pub final_gradient_norm: f64,
    /// Inverse of the observed information at the optimum, ordered like
    /// the parameter vector. Filled with `NaN` when the information matrix
    /// could not be inverted.
    pub inverse_curvature: Array2<f64>,
}

/// Raw output of [`estimate`].
#[derive(Debug, Clone)]
pub struct Estimate {
    /// `[β..., σ]` with the scale floored at [`SCALE_FLOOR`].
    pub params: Array1<f64>,
    pub warm_start: WarmStart,
    pub counts: ObservationCounts,
    pub diagnostics: OptimizerDiagnostics,
}

/// Computes the least-squares warm start on the (already augmented) design.
///
/// A perfect fit leaves no residual spread to start the scale from; in that
/// case `σ₀ = 1` is used instead.
pub fn ols_warm_start(x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<WarmStart, EstimationError> {
    let beta = x
        .least_squares(&y)
        .map_err(EstimationError::WarmStartFailed)?
        .solution;

    let residuals = &y - &x.dot(&beta);
    let n = residuals.len() as f64;
    let mean = residuals.sum() / n;
    let variance = residuals.mapv(|r| (r - mean) * (r - mean)).sum() / n;
    let mut sigma = variance.sqrt();

    if !(sigma.is_finite() && sigma > SCALE_FLOOR) {
        log::warn!(
            "Least-squares residual spread is degenerate ({sigma:.3e}); starting the scale at 1.0."
        );
        sigma = 1.0;
    }

    Ok(WarmStart { beta, sigma })
}

/// Fits the Tobit model on a design that already carries any intercept column.
pub fn estimate(
    x: ArrayView2<f64>,
    y: ArrayView1<f64>,
    codes: &[CensoringCode],
    config: &FitConfig,
) -> Result<Estimate, EstimationError> {
    if x.nrows() == 0 {
        return Err(EstimationError::NoObservations);
    }
    if x.ncols() == 0 {
        return Err(EstimationError::EmptyDesign);
    }

    // 1. Partition before anything else so malformed input fails fast.
    let groups = partition(x, y, codes)?;
    let counts = groups.counts();
    log::info!(
        "Starting Tobit estimation. {} observations ({} left-censored, {} right-censored), {} coefficients.",
        counts.total,
        counts.left,
        counts.right,
        x.ncols()
    );

    // 2. Warm start from ordinary least squares.
    let warm_start = ols_warm_start(x, y)?;
    let initial = warm_start.parameters();
    log::debug!("Warm start: beta = {:?}, sigma = {:.6}", warm_start.beta.to_vec(), warm_start.sigma);

    let initial_cost = neg_log_likelihood(&groups, initial.view());
    if !initial_cost.is_finite() {
        return Err(EstimationError::NonFiniteInitialCost(initial_cost));
    }
    log::info!("Initial negative log-likelihood: {:.6}", initial_cost);

    // 3. Run BFGS on the objective and its analytic gradient.
    let solution = run_bfgs(&groups, initial, config)?;
    let converged = solution.converged;
    let BfgsSolution {
        final_point,
        final_value,
        final_gradient_norm,
        iterations,
        ..
    } = solution.solution;

    if converged {
        log::info!(
            "BFGS converged in {} iterations. Negative log-likelihood: {:.6}",
            iterations,
            final_value
        );
    }

    // 4. Floor the scale and rebuild the curvature at the reported optimum.
    let mut params = final_point.clone();
    let scale_index = params.len() - 1;
    params[scale_index] = floored_scale(params[scale_index]);

    let inverse_curvature = inverse_curvature_at(&groups, params.view(), config.hessian_step);

    Ok(Estimate {
        params,
        warm_start,
        counts,
        diagnostics: OptimizerDiagnostics {
            final_point,
            final_value,
            iterations,
            converged,
            final_gradient_norm,
            inverse_curvature,
        },
    })
}

/// A BFGS solution together with whether it met the convergence criterion.
struct BfgsOutcome {
    solution: BfgsSolution,
    converged: bool,
}

/// Objective and gradient as seen by BFGS.
///
/// A non-finite cost or gradient entry is replaced by the sample
/// `(NON_FINITE_PENALTY, 0)`, which the line search rejects.
fn guarded_cost_and_grad(groups: &CensoredGroups, params: &Array1<f64>) -> (f64, Array1<f64>) {
    let cost = neg_log_likelihood(groups, params.view());
    let grad = neg_log_likelihood_gradient(groups, params.view());
    if cost.is_finite() && grad.iter().all(|g| g.is_finite()) {
        (cost, grad)
    } else {
        log::warn!("Non-finite objective or gradient at {:?}; returning a penalty sample", params.to_vec());
        (NON_FINITE_PENALTY, Array1::zeros(params.len()))
    }
}

fn run_bfgs(
    groups: &CensoredGroups,
    initial: Array1<f64>,
    config: &FitConfig,
) -> Result<BfgsOutcome, EstimationError> {
    let cost_and_grad = |params: &Array1<f64>| guarded_cost_and_grad(groups, params);

    log::debug!("Starting BFGS optimization with {} parameters...", initial.len());
    let result = Bfgs::new(initial, cost_and_grad)
        .with_tolerance(config.tolerance)
        .with_max_iterations(config.max_iterations)
        .run();

    match result {
        Ok(solution) => Ok(BfgsOutcome {
            solution,
            converged: true,
        }),
        Err(BfgsError::MaxIterationsReached { last_solution, .. })
        | Err(BfgsError::LineSearchFailed { last_solution, .. }) => {
            log::warn!(
                "BFGS did not converge; using the best iterate found (iter={}, f={:.6e}, ||g||={:.3e}).",
                last_solution.iterations,
                last_solution.final_value,
                last_solution.final_gradient_norm
            );
            Ok(BfgsOutcome {
                solution: *last_solution,
                converged: false,
            })
        }
        Err(e) => Err(EstimationError::OptimizationFailed(format!("{e:?}"))),
    }
}

/// Central-difference steps for `[β..., σ]` in the units of the data.
///
/// Moving `β_j` by `h σ / rms(x_j)` or `σ` by `h σ` shifts every standardized
/// residual by about `h`, whatever the scale of the response or features.
/// `h` is capped at [`MAX_RELATIVE_STEP`] so the backward step never reaches
/// the scale floor.
fn curvature_steps(groups: &CensoredGroups, params: ArrayView1<f64>, relative_step: f64) -> Array1<f64> {
    let h = relative_step.min(MAX_RELATIVE_STEP);
    let p = params.len() - 1;
    let sigma = floored_scale(params[p]);

    let mut sum_squares = Array1::<f64>::zeros(p);
    let mut rows = 0usize;
    for group in [&groups.left, &groups.mid, &groups.right].into_iter().flatten() {
        for row in group.x.rows() {
            sum_squares += &row.mapv(|v| v * v);
        }
        rows += group.len();
    }

    let mut steps = Array1::from_elem(p + 1, h * sigma);
    for j in 0..p {
        let rms = (sum_squares[j] / rows.max(1) as f64).sqrt();
        if rms.is_finite() && rms > 0.0 {
            steps[j] = h * sigma / rms;
        }
    }
    steps
}

/// Inverse of the finite-difference observed information at `params`.
///
/// An information matrix that cannot be inverted is not fatal to the fit:
/// the point estimates stand, and the matrix is returned filled with `NaN` so
/// inference reports every term as unavailable.
fn inverse_curvature_at(groups: &CensoredGroups, params: ArrayView1<f64>, step: f64) -> Array2<f64> {
    let steps = curvature_steps(groups, params, step);
    let information = finite_difference_hessian(
        |theta| neg_log_likelihood_gradient(groups, theta),
        params,
        steps.view(),
    );
    match invert_information(information.view()) {
        Ok(inverse) => inverse,
        Err(e) => {
            log::warn!("Standard errors are unavailable: {e}");
            Array2::from_elem(information.raw_dim(), f64::NAN)
        }
    }
}
