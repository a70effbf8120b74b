//! One-dimensional interpolants through strictly increasing knots.
//!
//! - `MonotoneCubic`: Fritsch–Carlson piecewise cubic Hermite. Preserves the
//!   monotonicity of the data on every interval, so it never overshoots.
//! - `NaturalSpline`: natural cubic spline (zero second derivative at both
//!   ends), C2 smooth but free to overshoot.
//!
//! Both pass exactly through the knots. Evaluation outside `[x_0, x_n]` uses the
//! boundary polynomial; callers that need a different extrapolation rule
//! handle it before calling `evaluate`.

/// Locate the interval `[xs[k], xs[k+1]]` containing `x` (clamped to the ends).
fn interval(xs: &[f64], x: f64) -> usize {
    xs.partition_point(|&v| v <= x)
        .saturating_sub(1)
        .min(xs.len() - 2)
}

fn check_knots(xs: &[f64], ys: &[f64]) -> bool {
    xs.len() == ys.len()
        && xs.len() >= 2
        && xs.iter().chain(ys.iter()).all(|v| v.is_finite())
        && xs.windows(2).all(|w| w[1] > w[0])
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonotoneCubic {
    xs: Vec<f64>,
    ys: Vec<f64>,
    slopes: Vec<f64>,
}

impl MonotoneCubic {
    /// Returns `None` unless `xs` is strictly increasing, finite, and matches
    /// `ys` in length (at least two knots).
    pub fn new(xs: Vec<f64>, ys: Vec<f64>) -> Option<Self> {
        if !check_knots(&xs, &ys) {
            return None;
        }

        let n = xs.len();
        let h: Vec<f64> = xs.windows(2).map(|w| w[1] - w[0]).collect();
        let delta: Vec<f64> = (0..n - 1).map(|k| (ys[k + 1] - ys[k]) / h[k]).collect();

        let mut slopes = vec![0.0; n];
        if n == 2 {
            slopes[0] = delta[0];
            slopes[1] = delta[0];
            return Some(Self { xs, ys, slopes });
        }

        for k in 1..n - 1 {
            if delta[k - 1] * delta[k] <= 0.0 {
                slopes[k] = 0.0;
            } else {
                // Weighted harmonic mean.
                let w1 = 2.0 * h[k] + h[k - 1];
                let w2 = h[k] + 2.0 * h[k - 1];
                slopes[k] = (w1 + w2) / (w1 / delta[k - 1] + w2 / delta[k]);
            }
        }
        slopes[0] = end_slope(h[0], h[1], delta[0], delta[1]);
        slopes[n - 1] = end_slope(h[n - 2], h[n - 3], delta[n - 2], delta[n - 3]);

        Some(Self { xs, ys, slopes })
    }

    pub fn evaluate(&self, x: f64) -> f64 {
        let k = interval(&self.xs, x);
        let h = self.xs[k + 1] - self.xs[k];
        let t = (x - self.xs[k]) / h;
        let t2 = t * t;
        let t3 = t2 * t;

        let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
        let h10 = t3 - 2.0 * t2 + t;
        let h01 = -2.0 * t3 + 3.0 * t2;
        let h11 = t3 - t2;

        h00 * self.ys[k] + h10 * h * self.slopes[k] + h01 * self.ys[k + 1] + h11 * h * self.slopes[k + 1]
    }

    /// Derivative at the first and last knot.
    pub fn boundary_slopes(&self) -> (f64, f64) {
        let n = self.slopes.len();
        (self.slopes[0], self.slopes[n - 1])
    }
}

/// Three-point end slope, limited to keep the end interval monotone.
fn end_slope(h0: f64, h1: f64, d0: f64, d1: f64) -> f64 {
    let slope = ((2.0 * h0 + h1) * d0 - h0 * d1) / (h0 + h1);
    if slope.signum() != d0.signum() || d0 == 0.0 {
        0.0
    } else if d0.signum() != d1.signum() && slope.abs() > 3.0 * d0.abs() {
        3.0 * d0
    } else {
        slope
    }
}

/// A natural cubic spline interpolator.
#[derive(Debug, Clone, PartialEq)]
pub struct NaturalSpline {
    xs: Vec<f64>,
    ys: Vec<f64>,
    /// Second derivatives at each knot.
    y2s: Vec<f64>,
}

impl NaturalSpline {
    pub fn new(xs: Vec<f64>, ys: Vec<f64>) -> Option<Self> {
        if !check_knots(&xs, &ys) {
            return None;
        }

        let n = xs.len();
        let mut y2s = vec![0.0; n];
        let mut u = vec![0.0; n - 1];

        // Tridiagonal forward sweep.
        for i in 1..n - 1 {
            let sig = (xs[i] - xs[i - 1]) / (xs[i + 1] - xs[i - 1]);
            let p = sig * y2s[i - 1] + 2.0;
            y2s[i] = (sig - 1.0) / p;
            u[i] = (ys[i + 1] - ys[i]) / (xs[i + 1] - xs[i]) - (ys[i] - ys[i - 1]) / (xs[i] - xs[i - 1]);
            u[i] = (6.0 * u[i] / (xs[i + 1] - xs[i - 1]) - sig * u[i - 1]) / p;
        }

        // Back substitution.
        for k in (0..n - 2).rev() {
            y2s[k + 1] = y2s[k + 1] * y2s[k + 2] + u[k + 1];
        }

        Some(Self { xs, ys, y2s })
    }

    pub fn evaluate(&self, x: f64) -> f64 {
        let lo = interval(&self.xs, x);
        let hi = lo + 1;

        let h = self.xs[hi] - self.xs[lo];
        let a = (self.xs[hi] - x) / h;
        let b = (x - self.xs[lo]) / h;

        a * self.ys[lo]
            + b * self.ys[hi]
            + ((a * a * a - a) * self.y2s[lo] + (b * b * b - b) * self.y2s[hi]) * h * h / 6.0
    }

    /// Derivative at the first and last knot.
    pub fn boundary_slopes(&self) -> (f64, f64) {
        let n = self.xs.len();
        let h0 = self.xs[1] - self.xs[0];
        let hn = self.xs[n - 1] - self.xs[n - 2];
        let first = (self.ys[1] - self.ys[0]) / h0 - h0 * (2.0 * self.y2s[0] + self.y2s[1]) / 6.0;
        let last = (self.ys[n - 1] - self.ys[n - 2]) / hn + hn * (self.y2s[n - 2] + 2.0 * self.y2s[n - 1]) / 6.0;
        (first, last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monotone_passes_through_knots() {
        let xs = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let ys = vec![2.0, 3.0, 5.0, 4.0, 1.0];
        let curve = MonotoneCubic::new(xs.clone(), ys.clone()).unwrap();
        for (x, y) in xs.iter().zip(ys.iter()) {
            let v = curve.evaluate(*x);
            assert!((v - y).abs() < 1e-12, "f({x}) = {v}, expected {y}");
        }
    }

    #[test]
    fn monotone_does_not_overshoot_step_data() {
        let xs = vec![0.0, 1.0, 2.0, 3.0, 4.0];
        let ys = vec![0.0, 0.0, 1.0, 1.0, 1.0];
        let curve = MonotoneCubic::new(xs, ys).unwrap();
        let mut prev = f64::NEG_INFINITY;
        for i in 0..=400 {
            let x = i as f64 * 0.01;
            let v = curve.evaluate(x);
            assert!((-1e-12..=1.0 + 1e-12).contains(&v), "overshoot at {x}: {v}");
            assert!(v >= prev - 1e-12, "not monotone at {x}");
            prev = v;
        }
    }

    #[test]
    fn two_knots_are_linear() {
        let curve = MonotoneCubic::new(vec![0.0, 2.0], vec![1.0, 3.0]).unwrap();
        assert!((curve.evaluate(0.5) - 1.5).abs() < 1e-12);
        let spline = NaturalSpline::new(vec![0.0, 2.0], vec![1.0, 3.0]).unwrap();
        assert!((spline.evaluate(1.5) - 2.5).abs() < 1e-12);
    }

    #[test]
    fn spline_passes_through_knots() {
        let xs = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let ys = vec![2.0, 3.0, 5.0, 4.0, 1.0];
        let spline = NaturalSpline::new(xs.clone(), ys.clone()).unwrap();
        for (x, y) in xs.iter().zip(ys.iter()) {
            let v = spline.evaluate(*x);
            assert!((v - y).abs() < 1e-10, "spline({x}) = {v}, expected {y}");
        }
    }

    #[test]
    fn boundary_slopes_match_finite_differences() {
        let xs = vec![0.0, 1.0, 2.5, 4.0];
        let ys = vec![1.0, 1.4, 2.6, 2.9];
        let eps = 1e-6;

        let curve = MonotoneCubic::new(xs.clone(), ys.clone()).unwrap();
        let (first, last) = curve.boundary_slopes();
        assert!((first - (curve.evaluate(eps) - curve.evaluate(0.0)) / eps).abs() < 1e-4);
        assert!((last - (curve.evaluate(4.0) - curve.evaluate(4.0 - eps)) / eps).abs() < 1e-4);

        let spline = NaturalSpline::new(xs, ys).unwrap();
        let (first, last) = spline.boundary_slopes();
        assert!((first - (spline.evaluate(eps) - spline.evaluate(0.0)) / eps).abs() < 1e-4);
        assert!((last - (spline.evaluate(4.0) - spline.evaluate(4.0 - eps)) / eps).abs() < 1e-4);
    }

    #[test]
    fn rejects_unsorted_knots() {
        assert!(MonotoneCubic::new(vec![0.0, 0.0, 1.0], vec![1.0, 2.0, 3.0]).is_none());
        assert!(NaturalSpline::new(vec![0.0], vec![1.0]).is_none());
    }
}
