//! Standard normal helpers used by the censored likelihood.
//!
//! Everything the likelihood and its gradient need is evaluated in log space.
//! `log_normal_cdf` in particular must stay finite far into the left tail,
//! where `ln(Φ(z))` computed from the raw CDF underflows to `-inf` long before
//! the optimizer stops proposing such points.

use statrs::function::erf::erfc;
use std::f64::consts::SQRT_2;

/// `0.5 * ln(2π)`
const LN_SQRT_2PI: f64 = 0.918_938_533_204_672_8;

/// Below this point `Φ(z)` is evaluated through its asymptotic expansion.
const LOWER_TAIL_CUTOFF: f64 = -20.0;

/// Above this point `ln Φ(z)` is evaluated as `ln(1 - Φ(-z))`.
const UPPER_TAIL_CUTOFF: f64 = 5.0;

/// Number of terms of the asymptotic series `1 - 1/z² + 3/z⁴ - 15/z⁶ + ...`.
const ASYMPTOTIC_TERMS: usize = 8;

/// Log-density of the standard normal distribution.
#[inline]
pub fn log_normal_pdf(z: f64) -> f64 {
    -0.5 * z * z - LN_SQRT_2PI
}

/// Density of the standard normal distribution.
#[inline]
pub fn normal_pdf(z: f64) -> f64 {
    log_normal_pdf(z).exp()
}

/// Standard normal CDF.
///
/// Goes through `erfc` so that the lower tail keeps full relative precision
/// instead of being computed as `1 - something close to 1`.
#[inline]
pub fn normal_cdf(z: f64) -> f64 {
    0.5 * erfc(-z / SQRT_2)
}

/// Numerically stable `ln Φ(z)`.
///
/// Three regimes:
/// - `z > 5`: `Φ(z)` is within `3e-7` of one, so `ln1p(-Φ(-z))` keeps the
///   small correction exactly.
/// - `-20 <= z <= 5`: `erfc` is accurate and representable, take its log.
/// - `z < -20`: `Φ(z) = φ(z)/(-z) · (1 - 1/z² + 3/z⁴ - ...)`; the log is formed
///   term by term so it stays finite for any finite `z`.
pub fn log_normal_cdf(z: f64) -> f64 {
    if z.is_nan() {
        return f64::NAN;
    }
    if z > UPPER_TAIL_CUTOFF {
        return (-normal_cdf(-z)).ln_1p();
    }
    if z >= LOWER_TAIL_CUTOFF {
        return normal_cdf(z).ln();
    }
    if z == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }

    let inv_z2 = 1.0 / (z * z);
    let mut term = 1.0;
    let mut series = 1.0;
    for k in 1..=ASYMPTOTIC_TERMS {
        term *= -((2 * k - 1) as f64) * inv_z2;
        series += term;
    }
    log_normal_pdf(z) - (-z).ln() + series.ln()
}

/// Inverse Mills ratio `φ(z) / Φ(z)`, formed in log space.
#[inline]
pub fn inverse_mills_ratio(z: f64) -> f64 {
    (log_normal_pdf(z) - log_normal_cdf(z)).exp()
}

/// Two-sided p-value `2 · (1 − Φ(|z|))` of a standard normal test statistic.
///
/// Evaluated as `2 · Φ(−|z|)`, which is the same quantity without the
/// cancellation that makes large statistics collapse to exactly zero.
pub fn two_sided_p_value(z: f64) -> f64 {
    if z.is_nan() {
        return f64::NAN;
    }
    2.0 * normal_cdf(-z.abs())
}
