//! Curvature of the objective at the optimum.
//!
//! The BFGS driver only hands back the final point, so the inverse-curvature
//! matrix used for inference is rebuilt here: the observed information is the
//! central finite difference of the analytic gradient, symmetrized, and then
//! inverted. Columns are independent and are differenced in parallel.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use ndarray_linalg::Inverse;
use ndarray_linalg::error::LinalgError;
use rayon::prelude::*;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CurvatureError {
    #[error("The observed information matrix contains non-finite entries.")]
    NonFinite,

    #[error("The observed information matrix could not be inverted: {0}")]
    Singular(#[from] LinalgError),
}

/// Observed information (Hessian of the negative log-likelihood) at `point`.
///
/// Each column `j` is `(g(θ + h_j e_j) − g(θ − h_j e_j)) / (2 h_j)` with the
/// absolute step `h_j = steps[j]`. The result is symmetrized as `(H + Hᵀ) / 2`.
///
/// # Panics
/// If `steps` and `point` differ in length.
pub fn finite_difference_hessian<G>(
    gradient: G,
    point: ArrayView1<f64>,
    steps: ArrayView1<f64>,
) -> Array2<f64>
where
    G: Fn(ArrayView1<f64>) -> Array1<f64> + Sync,
{
    let n = point.len();
    assert_eq!(steps.len(), n, "one step per coordinate");
    let columns: Vec<Array1<f64>> = (0..n)
        .into_par_iter()
        .map(|j| {
            let h = steps[j];
            let mut forward = point.to_owned();
            forward[j] += h;
            let mut backward = point.to_owned();
            backward[j] -= h;
            (gradient(forward.view()) - gradient(backward.view())) / (2.0 * h)
        })
        .collect();

    let mut hessian = Array2::<f64>::zeros((n, n));
    for (j, column) in columns.iter().enumerate() {
        hessian.index_axis_mut(Axis(1), j).assign(column);
    }
    symmetrize(hessian.view())
}

/// Returns the symmetric part `(A + Aᵀ) / 2`.
pub fn symmetrize(matrix: ArrayView2<f64>) -> Array2<f64> {
    (&matrix + &matrix.t()) * 0.5
}

/// Inverts the observed information into the inverse-curvature matrix.
///
/// Fails when the matrix contains non-finite entries or LAPACK reports it as
/// singular.
pub fn invert_information(information: ArrayView2<f64>) -> Result<Array2<f64>, CurvatureError> {
    if information.iter().any(|v| !v.is_finite()) {
        return Err(CurvatureError::NonFinite);
    }
    Ok(information.inv()?)
}
