//! One-dimensional interpolation kernels.
//!
//! An [`Interpolator`] is built once per column from its known control
//! points and then evaluated at each missing position. Control points must
//! have strictly increasing `x`; evaluation is only meaningful inside
//! `[x_first, x_last]` (edge gaps are the caller's concern).

use deforest_map_analytics_models::InterpolationMethod;

/// Control points with strictly increasing `x`.
#[derive(Debug, Clone)]
struct Points {
    xs: Vec<f64>,
    ys: Vec<f64>,
}

impl Points {
    fn len(&self) -> usize {
        self.xs.len()
    }

    /// Index `i` of the segment `[x_i, x_{i+1}]` containing `x`.
    fn segment(&self, x: f64) -> usize {
        let n = self.len();
        if n < 2 {
            return 0;
        }
        self.xs
            .partition_point(|&v| v <= x)
            .saturating_sub(1)
            .min(n - 2)
    }
}

#[derive(Debug, Clone)]
enum Kernel {
    Linear,
    Nearest,
    Previous,
    Next,
    /// Local Lagrange polynomial of the given order.
    Polynomial(usize),
    /// Normalized barycentric weights.
    Barycentric(Vec<f64>),
    /// PCHIP slopes at each control point.
    Hermite(Vec<f64>),
    /// Natural spline second derivatives at each control point.
    Spline(Vec<f64>),
}

/// A ready-to-evaluate interpolant for one column.
#[derive(Debug, Clone)]
pub struct Interpolator {
    points: Points,
    kernel: Kernel,
}

impl Interpolator {
    /// Builds an interpolant from `(x, y)` control points.
    ///
    /// `controls` must be non-empty and sorted by strictly increasing `x`.
    #[must_use]
    pub fn new(method: InterpolationMethod, order: usize, controls: &[(f64, f64)]) -> Self {
        let points = Points {
            xs: controls.iter().map(|&(x, _)| x).collect(),
            ys: controls.iter().map(|&(_, y)| y).collect(),
        };

        let kernel = match method {
            InterpolationMethod::Linear => Kernel::Linear,
            InterpolationMethod::Nearest => Kernel::Nearest,
            InterpolationMethod::ForwardFill => Kernel::Previous,
            InterpolationMethod::BackwardFill => Kernel::Next,
            InterpolationMethod::Polynomial => Kernel::Polynomial(order.max(1)),
            InterpolationMethod::Barycentric => {
                Kernel::Barycentric(barycentric_weights(&points.xs))
            }
            InterpolationMethod::Pchip => Kernel::Hermite(pchip_slopes(&points)),
            InterpolationMethod::Spline => {
                Kernel::Spline(natural_spline_second_derivatives(&points))
            }
        };

        Self { points, kernel }
    }

    /// Evaluates the interpolant at `x`.
    #[must_use]
    pub fn at(&self, x: f64) -> f64 {
        let p = &self.points;
        match &self.kernel {
            Kernel::Linear => linear(p, x),
            Kernel::Nearest => nearest(p, x),
            Kernel::Previous => {
                let i = p.xs.partition_point(|&v| v <= x).saturating_sub(1);
                p.ys[i]
            }
            Kernel::Next => {
                let j = p.xs.partition_point(|&v| v < x).min(p.len() - 1);
                p.ys[j]
            }
            Kernel::Polynomial(order) => local_polynomial(p, *order, x),
            Kernel::Barycentric(weights) => barycentric(p, weights, x),
            Kernel::Hermite(slopes) => hermite(p, slopes, x),
            Kernel::Spline(second) => spline(p, second, x),
        }
    }
}

fn linear(p: &Points, x: f64) -> f64 {
    if p.len() == 1 {
        return p.ys[0];
    }
    let i = p.segment(x);
    let (x0, x1) = (p.xs[i], p.xs[i + 1]);
    let (y0, y1) = (p.ys[i], p.ys[i + 1]);
    y0 + (y1 - y0) * (x - x0) / (x1 - x0)
}

fn nearest(p: &Points, x: f64) -> f64 {
    if p.len() == 1 {
        return p.ys[0];
    }
    let i = p.segment(x);
    if (x - p.xs[i]).abs() <= (p.xs[i + 1] - x).abs() {
        p.ys[i]
    } else {
        p.ys[i + 1]
    }
}

/// Lagrange polynomial through the `order + 1` control points closest to
/// `x` (fewer when the column has fewer points).
fn local_polynomial(p: &Points, order: usize, x: f64) -> f64 {
    let n = p.len();
    let want = (order + 1).min(n);
    if want == 1 {
        return p.ys[0];
    }

    let i = p.segment(x);
    let (mut lo, mut hi) = (i, i + 1);
    while hi - lo + 1 < want {
        let left = lo.checked_sub(1).map(|l| x - p.xs[l]);
        let right = (hi + 1 < n).then(|| p.xs[hi + 1] - x);
        match (left, right) {
            (Some(l), Some(r)) if l <= r => lo -= 1,
            (Some(_), None) => lo -= 1,
            (_, Some(_)) => hi += 1,
            (None, None) => break,
        }
    }

    lagrange(&p.xs[lo..=hi], &p.ys[lo..=hi], x)
}

fn lagrange(xs: &[f64], ys: &[f64], x: f64) -> f64 {
    let mut total = 0.0;
    for (j, (&xj, &yj)) in xs.iter().zip(ys).enumerate() {
        let mut basis = 1.0;
        for (k, &xk) in xs.iter().enumerate() {
            if k != j {
                basis *= (x - xk) / (xj - xk);
            }
        }
        total += yj * basis;
    }
    total
}

/// Barycentric weights `1 / prod(x_j - x_k)`, computed in log space and
/// rescaled so the largest has magnitude 1. The common scale cancels in the
/// barycentric formula.
fn barycentric_weights(xs: &[f64]) -> Vec<f64> {
    let logs: Vec<(f64, f64)> = xs
        .iter()
        .enumerate()
        .map(|(j, &xj)| {
            let mut log_mag = 0.0;
            let mut sign = 1.0;
            for (k, &xk) in xs.iter().enumerate() {
                if k != j {
                    let d = xj - xk;
                    log_mag -= d.abs().ln();
                    if d < 0.0 {
                        sign = -sign;
                    }
                }
            }
            (sign, log_mag)
        })
        .collect();

    let max_log = logs
        .iter()
        .map(|&(_, l)| l)
        .fold(f64::NEG_INFINITY, f64::max);

    logs.iter()
        .map(|&(sign, l)| sign * (l - max_log).exp())
        .collect()
}

fn barycentric(p: &Points, weights: &[f64], x: f64) -> f64 {
    let mut num = 0.0;
    let mut den = 0.0;
    for ((&xj, &yj), &wj) in p.xs.iter().zip(&p.ys).zip(weights) {
        let d = x - xj;
        if d == 0.0 {
            return yj;
        }
        let t = wj / d;
        num += t * yj;
        den += t;
    }
    num / den
}

/// Fritsch-Carlson monotone slopes with the three-point edge formula.
fn pchip_slopes(p: &Points) -> Vec<f64> {
    let n = p.len();
    if n < 2 {
        return vec![0.0; n];
    }

    let h: Vec<f64> = p.xs.windows(2).map(|w| w[1] - w[0]).collect();
    let delta: Vec<f64> = p
        .ys
        .windows(2)
        .zip(&h)
        .map(|(w, &hk)| (w[1] - w[0]) / hk)
        .collect();

    if n == 2 {
        return vec![delta[0]; 2];
    }

    let mut slopes = vec![0.0; n];
    for k in 1..n - 1 {
        let (d0, d1) = (delta[k - 1], delta[k]);
        if d0 * d1 > 0.0 {
            let w1 = 2.0f64.mul_add(h[k], h[k - 1]);
            let w2 = 2.0f64.mul_add(h[k - 1], h[k]);
            slopes[k] = (w1 + w2) / (w1 / d0 + w2 / d1);
        }
    }
    slopes[0] = pchip_edge(h[0], h[1], delta[0], delta[1]);
    slopes[n - 1] = pchip_edge(h[n - 2], h[n - 3], delta[n - 2], delta[n - 3]);
    slopes
}

fn pchip_edge(h0: f64, h1: f64, d0: f64, d1: f64) -> f64 {
    let d = (2.0f64.mul_add(h0, h1) * d0 - h0 * d1) / (h0 + h1);
    if d.signum() != d0.signum() || d0 == 0.0 {
        0.0
    } else if d0.signum() != d1.signum() && d.abs() > 3.0 * d0.abs() {
        3.0 * d0
    } else {
        d
    }
}

fn hermite(p: &Points, slopes: &[f64], x: f64) -> f64 {
    if p.len() == 1 {
        return p.ys[0];
    }
    let i = p.segment(x);
    let h = p.xs[i + 1] - p.xs[i];
    let t = (x - p.xs[i]) / h;
    let t2 = t * t;
    let t3 = t2 * t;

    let h00 = 2.0f64.mul_add(t3, -3.0 * t2) + 1.0;
    let h10 = t3 - 2.0 * t2 + t;
    let h01 = (-2.0f64).mul_add(t3, 3.0 * t2);
    let h11 = t3 - t2;

    h00 * p.ys[i] + h10 * h * slopes[i] + h01 * p.ys[i + 1] + h11 * h * slopes[i + 1]
}

/// Second derivatives of the natural cubic spline (zero at both ends),
/// solved with the Thomas algorithm.
fn natural_spline_second_derivatives(p: &Points) -> Vec<f64> {
    let n = p.len();
    let mut m = vec![0.0; n];
    if n < 3 {
        return m;
    }

    let h: Vec<f64> = p.xs.windows(2).map(|w| w[1] - w[0]).collect();
    let interior = n - 2;
    let mut diag = vec![0.0; interior];
    let mut rhs = vec![0.0; interior];

    for r in 0..interior {
        let i = r + 1;
        diag[r] = 2.0 * (h[i - 1] + h[i]);
        rhs[r] = 6.0 * ((p.ys[i + 1] - p.ys[i]) / h[i] - (p.ys[i] - p.ys[i - 1]) / h[i - 1]);
    }

    // Forward sweep: sub-diagonal of row r is h[r], super-diagonal is h[r + 1].
    for r in 1..interior {
        let factor = h[r] / diag[r - 1];
        diag[r] -= factor * h[r];
        rhs[r] -= factor * rhs[r - 1];
    }

    m[interior] = rhs[interior - 1] / diag[interior - 1];
    for r in (0..interior - 1).rev() {
        m[r + 1] = (rhs[r] - h[r + 1] * m[r + 2]) / diag[r];
    }
    m
}

fn spline(p: &Points, m: &[f64], x: f64) -> f64 {
    if p.len() == 1 {
        return p.ys[0];
    }
    let i = p.segment(x);
    let h = p.xs[i + 1] - p.xs[i];
    let a = p.xs[i + 1] - x;
    let b = x - p.xs[i];

    m[i] * a.powi(3) / (6.0 * h)
        + m[i + 1] * b.powi(3) / (6.0 * h)
        + (p.ys[i] / h - m[i] * h / 6.0) * a
        + (p.ys[i + 1] / h - m[i + 1] * h / 6.0) * b
}
