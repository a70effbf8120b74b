//! Levenberg–Marquardt nonlinear least squares.
//!
//! Minimizes `Σ r_i(p)^2` where `r = y - f(p)`. Each iteration solves the
//! damped step
//!
//! ```text
//! [ J         ]       [ r ]
//! [ sqrt(λ) D ] δ  =  [ 0 ]
//! ```
//!
//! with `J = ∂f/∂p` and `D` the column norms of `J` (Marquardt scaling), via
//! the SVD solver in `math::ols`. λ shrinks after accepted steps and grows
//! after rejected ones.

use nalgebra::{DMatrix, DVector};

use crate::math::solve_least_squares;

const LAMBDA_MIN: f64 = 1e-12;
const LAMBDA_MAX: f64 = 1e16;

/// Optimizer settings.
#[derive(Debug, Clone, Copy)]
pub struct LmOptions {
    pub max_iterations: usize,
    /// Stop when an accepted step lowers the SSE by less than `ftol * sse`.
    pub ftol: f64,
    /// Stop when an accepted step is shorter than `xtol * (|p| + xtol)`.
    pub xtol: f64,
    pub initial_lambda: f64,
}

impl Default for LmOptions {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            ftol: 1e-12,
            xtol: 1e-10,
            initial_lambda: 1e-3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LmStatus {
    /// The residual is stable: the SSE or step size criteria were met, or no
    /// damping level produced a further decrease.
    Converged,
    /// The iteration budget ran out first.
    MaxIterations,
    /// Residuals or Jacobian became non-finite.
    NonFinite,
}

#[derive(Debug, Clone)]
pub struct LmOutcome {
    pub params: DVector<f64>,
    pub sse: f64,
    pub iterations: usize,
    pub status: LmStatus,
}

/// Run Levenberg–Marquardt from `p0`.
///
/// - `residual(p)` returns `y - f(p)`
/// - `jacobian(p)` returns `∂f/∂p` (rows = observations)
/// - `admissible(p)` rejects trial points outside the parameter domain
pub fn levenberg_marquardt<R, J, A>(
    p0: DVector<f64>,
    residual: R,
    jacobian: J,
    admissible: A,
    opts: &LmOptions,
) -> LmOutcome
where
    R: Fn(&DVector<f64>) -> DVector<f64>,
    J: Fn(&DVector<f64>) -> DMatrix<f64>,
    A: Fn(&DVector<f64>) -> bool,
{
    let mut p = p0;
    let mut r = residual(&p);
    let mut sse = r.norm_squared();
    if !sse.is_finite() {
        return LmOutcome {
            params: p,
            sse,
            iterations: 0,
            status: LmStatus::NonFinite,
        };
    }

    let mut lambda = opts.initial_lambda.max(LAMBDA_MIN);

    for iteration in 1..=opts.max_iterations {
        if sse <= f64::MIN_POSITIVE {
            return finish(p, sse, iteration - 1, LmStatus::Converged);
        }

        let jac = jacobian(&p);
        if jac.iter().any(|v| !v.is_finite()) {
            return finish(p, sse, iteration, LmStatus::NonFinite);
        }

        let n = jac.nrows();
        let k = jac.ncols();
        let col_norms: Vec<f64> = (0..k).map(|j| jac.column(j).norm()).collect();
        let norm_floor = col_norms.iter().cloned().fold(0.0_f64, f64::max) * 1e-12;
        let scale: Vec<f64> = col_norms.iter().map(|&c| c.max(norm_floor).max(1e-300)).collect();

        let mut accepted = false;
        while lambda <= LAMBDA_MAX {
            let mut aug = DMatrix::<f64>::zeros(n + k, k);
            aug.rows_mut(0, n).copy_from(&jac);
            for j in 0..k {
                aug[(n + j, j)] = lambda.sqrt() * scale[j];
            }
            let mut rhs = DVector::<f64>::zeros(n + k);
            rhs.rows_mut(0, n).copy_from(&r);

            let Some(delta) = solve_least_squares(&aug, &rhs) else {
                lambda *= 10.0;
                continue;
            };

            let trial = &p + &delta;
            if !admissible(&trial) {
                lambda *= 10.0;
                continue;
            }

            let r_trial = residual(&trial);
            let sse_trial = r_trial.norm_squared();
            if !sse_trial.is_finite() || sse_trial >= sse {
                lambda *= 10.0;
                continue;
            }

            let reduction = sse - sse_trial;
            let step = delta.norm();
            let sse_before = sse;
            p = trial;
            r = r_trial;
            sse = sse_trial;
            lambda = (lambda / 10.0).max(LAMBDA_MIN);
            accepted = true;

            if reduction <= opts.ftol * sse_before || step <= opts.xtol * (p.norm() + opts.xtol) {
                return finish(p, sse, iteration, LmStatus::Converged);
            }
            break;
        }

        if !accepted {
            // No damping level improves the SSE: we sit at a minimum.
            return finish(p, sse, iteration, LmStatus::Converged);
        }
    }

    finish(p, sse, opts.max_iterations, LmStatus::MaxIterations)
}

fn finish(params: DVector<f64>, sse: f64, iterations: usize, status: LmStatus) -> LmOutcome {
    LmOutcome {
        params,
        sse,
        iterations,
        status,
    }
}
