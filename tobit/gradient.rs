//! # Analytic Gradient of the Censored Negative Log-Likelihood
//!
//! The gradient is accumulated for the positive log-likelihood, group by group,
//! and the combined vector is negated at the end so that it matches the sign of
//! [`neg_log_likelihood`](crate::likelihood::neg_log_likelihood).
//!
//! With `r_i = φ(z_i)/Φ(z_i)` (the inverse Mills ratio):
//!
//! | group | ∂/∂β               | ∂/∂σ (before the final `1/σ`) |
//! |-------|--------------------|-------------------------------|
//! | left  | `−Σ r_i x_i / σ`   | `−Σ r_i z_i`                  |
//! | right | `+Σ r_i x_i / σ`   | `−Σ r_i z_i`                  |
//! | mid   | `+Σ z_i x_i / σ`   | `+Σ (z_i² − 1)`               |

use crate::likelihood::{floored_scale, lower_residuals, split_parameters, upper_residuals};
use crate::partition::CensoredGroups;
use crate::probability::inverse_mills_ratio;
use ndarray::{Array1, ArrayView1, s};

/// Gradient of the negative Tobit log-likelihood with respect to `[β..., σ]`.
///
/// The returned vector has the same length and ordering as `params`:
/// coefficient derivatives first, the scale derivative last. The scale is
/// floored exactly as in the objective, so both always describe the same
/// function.
pub fn neg_log_likelihood_gradient(groups: &CensoredGroups, params: ArrayView1<f64>) -> Array1<f64> {
    let (beta, raw_sigma) = split_parameters(params);
    let sigma = floored_scale(raw_sigma);

    let mut beta_grad = Array1::<f64>::zeros(beta.len());
    let mut sigma_grad = 0.0;

    if let Some(left) = &groups.left {
        let z = lower_residuals(left, beta, sigma);
        let ratio = z.mapv(inverse_mills_ratio);
        beta_grad.scaled_add(-1.0 / sigma, &left.x.t().dot(&ratio));
        sigma_grad -= ratio.dot(&z);
    }

    if let Some(right) = &groups.right {
        let z = upper_residuals(right, beta, sigma);
        let ratio = z.mapv(inverse_mills_ratio);
        beta_grad.scaled_add(1.0 / sigma, &right.x.t().dot(&ratio));
        sigma_grad -= ratio.dot(&z);
    }

    if let Some(mid) = &groups.mid {
        let z = lower_residuals(mid, beta, sigma);
        beta_grad.scaled_add(1.0 / sigma, &mid.x.t().dot(&z));
        sigma_grad += z.iter().map(|&zi| zi * zi - 1.0).sum::<f64>();
    }

    let p = beta.len();
    let mut grad = Array1::<f64>::zeros(p + 1);
    grad.slice_mut(s![..p]).assign(&beta_grad);
    grad[p] = sigma_grad / sigma;
    -grad
}
