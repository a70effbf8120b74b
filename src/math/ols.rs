//! Linear least squares solver.
//!
//! Two places in the crate reduce to small dense problems of the form
//!
//! ```text
//! minimize ||A x - b||^2
//! ```
//!
//! - the polynomial dispersion solution (`A` is a Vandermonde design matrix)
//! - every Levenberg–Marquardt step, written as the augmented system
//!   `[J; sqrt(λ) D] δ = [r; 0]`
//!
//! We solve both through an SVD so that tall, rank-deficient or badly scaled
//! systems degrade gracefully instead of panicking (nalgebra's `QR::solve`
//! only handles square systems).

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(a: &DMatrix<f64>, b: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = a.clone().svd(true, true);

    // Progressively looser singular value cutoffs.
    for &tol in &[1e-12, 1e-10, 1e-8] {
        if let Ok(x) = svd.solve(b, tol) {
            if x.iter().all(|v| v.is_finite()) {
                return Some(x);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn least_squares_solves_simple_system() {
        // Fit y = 2 + 3x on x = [0,1,2]
        let a = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let b = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let x = solve_least_squares(&a, &b).unwrap();
        assert!((x[0] - 2.0).abs() < 1e-10);
        assert!((x[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn least_squares_handles_overdetermined_noisy_rows() {
        // Symmetric perturbations cancel in the normal equations.
        let a = DMatrix::from_row_slice(4, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0, 1.0, 3.0]);
        let b = DVector::from_row_slice(&[1.1, 2.9, 5.1, 6.9]);

        let x = solve_least_squares(&a, &b).unwrap();
        assert!((x[1] - 1.96).abs() < 1e-9, "slope {}", x[1]);
    }
}
