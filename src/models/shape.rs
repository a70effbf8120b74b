//! Line-shape evaluation for Gaussian / Lorentzian / pseudo-Voigt.
//!
//! The fitter relies on two primitive operations:
//! - predict `f(x)` given the four line parameters (for residuals)
//! - fill a Jacobian row `∂f/∂p` (for Levenberg–Marquardt)
//!
//! The line model is `f(x) = amplitude * φ(x - center; width) + baseline`,
//! where `φ` is normalized to a peak value of 1. Parameter order everywhere is
//! `[amplitude, center, width, baseline]`.

use std::f64::consts::LN_2;

use crate::domain::ShapeModel;

/// Number of free parameters of a line fit.
pub const LINE_PARAMS: usize = 4;

/// `2 sqrt(2 ln 2)`: Gaussian FWHM per σ.
pub const FWHM_PER_SIGMA: f64 = 2.354_820_045_030_949;

/// Lorentzian γ of a pseudo-Voigt with Gaussian σ = 1 (same FWHM).
fn voigt_gamma_factor() -> f64 {
    (2.0 * LN_2).sqrt()
}

fn gaussian(u: f64, sigma: f64) -> (f64, f64, f64) {
    let z = u / sigma;
    let g = (-0.5 * z * z).exp();
    // (value, ∂/∂center, ∂/∂sigma)
    (g, g * u / (sigma * sigma), g * u * u / (sigma * sigma * sigma))
}

fn lorentzian(u: f64, gamma: f64) -> (f64, f64, f64) {
    let z = u / gamma;
    let l = 1.0 / (1.0 + z * z);
    let l2 = l * l;
    (l, 2.0 * l2 * u / (gamma * gamma), 2.0 * l2 * u * u / (gamma * gamma * gamma))
}

/// Peak-normalized profile `φ(u)` with its partial derivatives with respect to
/// the line center and the width parameter.
pub fn profile_with_partials(shape: ShapeModel, u: f64, width: f64) -> (f64, f64, f64) {
    match shape {
        ShapeModel::Gaussian => gaussian(u, width),
        ShapeModel::Lorentzian => lorentzian(u, width),
        ShapeModel::Voigt { lorentz_fraction } => {
            let eta = lorentz_fraction;
            let k = voigt_gamma_factor();
            let (g, gc, gw) = gaussian(u, width);
            let (l, lc, lg) = lorentzian(u, k * width);
            (
                (1.0 - eta) * g + eta * l,
                (1.0 - eta) * gc + eta * lc,
                (1.0 - eta) * gw + eta * k * lg,
            )
        }
    }
}

/// Peak-normalized profile `φ(u)`.
pub fn profile(shape: ShapeModel, u: f64, width: f64) -> f64 {
    profile_with_partials(shape, u, width).0
}

/// Full width at half maximum for the shape's width parameter.
pub fn fwhm(shape: ShapeModel, width: f64) -> f64 {
    match shape {
        ShapeModel::Gaussian | ShapeModel::Voigt { .. } => FWHM_PER_SIGMA * width,
        ShapeModel::Lorentzian => 2.0 * width,
    }
}

/// Inverse of [`fwhm`].
pub fn width_from_fwhm(shape: ShapeModel, fwhm: f64) -> f64 {
    match shape {
        ShapeModel::Gaussian | ShapeModel::Voigt { .. } => fwhm / FWHM_PER_SIGMA,
        ShapeModel::Lorentzian => 0.5 * fwhm,
    }
}

/// Predict `f(x)` for the given parameters.
pub fn predict(shape: ShapeModel, x: f64, params: &[f64]) -> f64 {
    params[0] * profile(shape, x - params[1], params[2]) + params[3]
}

/// Fill one Jacobian row `∂f/∂p` at `x`.
///
/// # Panics
/// Panics if `params` or `out` is shorter than [`LINE_PARAMS`].
pub fn fill_jacobian_row(shape: ShapeModel, x: f64, params: &[f64], out: &mut [f64]) {
    let (phi, d_center, d_width) = profile_with_partials(shape, x - params[1], params[2]);
    out[0] = phi;
    out[1] = params[0] * d_center;
    out[2] = params[0] * d_width;
    out[3] = 1.0;
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHAPES: [ShapeModel; 3] = [
        ShapeModel::Gaussian,
        ShapeModel::Lorentzian,
        ShapeModel::Voigt {
            lorentz_fraction: 0.3,
        },
    ];

    #[test]
    fn profile_is_half_at_half_fwhm() {
        for shape in SHAPES {
            let width = 1.7;
            let half = 0.5 * fwhm(shape, width);
            let v = profile(shape, half, width);
            assert!((v - 0.5).abs() < 1e-12, "{shape:?}: φ(FWHM/2) = {v}");
            assert!((profile(shape, 0.0, width) - 1.0).abs() < 1e-15);
        }
    }

    #[test]
    fn fwhm_round_trips_through_width() {
        for shape in SHAPES {
            let w = width_from_fwhm(shape, fwhm(shape, 2.5));
            assert!((w - 2.5).abs() < 1e-12);
        }
    }

    #[test]
    fn analytic_jacobian_matches_finite_differences() {
        let params = [3.0, 10.2, 1.4, 0.5];
        for shape in SHAPES {
            for &x in &[8.0, 9.7, 10.2, 11.9] {
                let mut row = [0.0; LINE_PARAMS];
                fill_jacobian_row(shape, x, &params, &mut row);
                for j in 0..LINE_PARAMS {
                    let h = 1e-6;
                    let mut up = params;
                    let mut down = params;
                    up[j] += h;
                    down[j] -= h;
                    let numeric = (predict(shape, x, &up) - predict(shape, x, &down)) / (2.0 * h);
                    assert!(
                        (numeric - row[j]).abs() < 1e-6,
                        "{shape:?} x={x} p{j}: analytic {} vs numeric {numeric}",
                        row[j]
                    );
                }
            }
        }
    }
}
