//! Geometric least-squares circle fit.
//!
//! Minimizes `sum_i (||p_i - c|| - r)^2` over `(cx, cy, r)` with an adaptive
//! Levenberg-Marquardt iteration started from the centroid and the mean
//! centroid distance. There is no algebraic fallback: degenerate input is
//! reported, never silently fitted.

use nalgebra::{Matrix2, Matrix3, Vector3};
use serde::{Deserialize, Serialize};
use sm_core::Point2;

use crate::FitError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Circle {
    pub cx: f64,
    pub cy: f64,
    pub r: f64,
}

impl Circle {
    pub const fn new(cx: f64, cy: f64, r: f64) -> Self {
        Self { cx, cy, r }
    }

    pub fn center(&self) -> Point2 {
        Point2::new(self.cx, self.cy)
    }

    /// Signed geometric residual `||p - c|| - r`.
    pub fn residual(&self, p: Point2) -> f64 {
        p.distance(self.center()) - self.r
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircleFitConfig {
    pub max_iterations: usize,
    /// Stop when the parameter step is below `step_tol * (|params| + step_tol)`.
    pub step_tol: f64,
    /// Stop when the relative cost decrease is below this.
    pub cost_tol: f64,
    /// Minimum ratio of the smaller to the larger principal variance.
    pub collinearity_tol: f64,
}

impl Default for CircleFitConfig {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            step_tol: 1e-12,
            cost_tol: 1e-15,
            collinearity_tol: 1e-10,
        }
    }
}

/// Damping schedule driven by the gain ratio `rho`.
struct AdaptiveLm {
    lambda: f64,
    factor: f64,
    min_lambda: f64,
    max_lambda: f64,
}

impl AdaptiveLm {
    fn new() -> Self {
        Self {
            lambda: 1e-3,
            factor: 10.0,
            min_lambda: 1e-12,
            max_lambda: 1e12,
        }
    }

    fn accept(&mut self, rho: f64) {
        if rho > 0.75 {
            self.lambda = (self.lambda / self.factor).max(self.min_lambda);
        } else if rho > 0.25 {
            self.lambda = (self.lambda / self.factor.sqrt()).max(self.min_lambda);
        }
    }

    fn reject(&mut self) {
        self.lambda = (self.lambda * self.factor).min(self.max_lambda);
    }

    fn is_stuck(&self) -> bool {
        self.lambda >= self.max_lambda * 0.99
    }
}

/// Fits a circle to `points`.
///
/// Errors:
/// - [`FitError::TooFewPoints`] for fewer than three points.
/// - [`FitError::NonFinite`] if any coordinate, or the result, is not finite.
/// - [`FitError::Degenerate`] if the points have no spread or are collinear.
/// - [`FitError::NotConverged`] if the iteration budget runs out.
pub fn fit_circle(points: &[Point2], cfg: &CircleFitConfig) -> Result<Circle, FitError> {
    let n = points.len();
    if n < 3 {
        return Err(FitError::TooFewPoints(n));
    }
    if points.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
        return Err(FitError::NonFinite);
    }

    let inv_n = 1.0 / n as f64;
    let mx = points.iter().map(|p| p.x).sum::<f64>() * inv_n;
    let my = points.iter().map(|p| p.y).sum::<f64>() * inv_n;
    check_spread(points, mx, my, cfg.collinearity_tol)?;

    let r0 = points.iter().map(|p| (p.x - mx).hypot(p.y - my)).sum::<f64>() * inv_n;
    let mut params = Vector3::new(mx, my, r0);
    let mut cost = cost_at(points, &params);
    let mut lm = AdaptiveLm::new();

    for iter in 0..cfg.max_iterations {
        let (h, g) = normal_equations(points, &params);

        if g.amax() <= f64::EPSILON * (1.0 + cost) {
            return finish(params, iter, cost);
        }

        let mut damped = h;
        for k in 0..3 {
            damped[(k, k)] += lm.lambda * h[(k, k)].max(1e-12);
        }
        let Some(step) = damped.lu().solve(&(-g)) else {
            lm.reject();
            if lm.is_stuck() {
                return Err(FitError::Degenerate("singular normal equations"));
            }
            continue;
        };

        let candidate = params + step;
        let new_cost = cost_at(points, &candidate);
        if !new_cost.is_finite() {
            return Err(FitError::NonFinite);
        }

        let predicted = -(g.dot(&step)) - 0.5 * step.dot(&(h * step));
        if new_cost < cost {
            let rho = if predicted > 0.0 {
                (cost - new_cost) / predicted
            } else {
                0.0
            };
            lm.accept(rho);

            let rel_decrease = (cost - new_cost) / cost.max(f64::MIN_POSITIVE);
            let small_step = step.norm() <= cfg.step_tol * (params.norm() + cfg.step_tol);
            params = candidate;
            cost = new_cost;

            if small_step || rel_decrease <= cfg.cost_tol {
                return finish(params, iter + 1, cost);
            }
        } else {
            lm.reject();
            let small_step = step.norm() <= cfg.step_tol * (params.norm() + cfg.step_tol);
            if small_step {
                return finish(params, iter + 1, cost);
            }
            if lm.is_stuck() {
                return Err(FitError::NotConverged {
                    iterations: iter + 1,
                    cost,
                });
            }
        }
    }

    Err(FitError::NotConverged {
        iterations: cfg.max_iterations,
        cost,
    })
}

fn finish(params: Vector3<f64>, iterations: usize, cost: f64) -> Result<Circle, FitError> {
    if !params.iter().all(|v| v.is_finite()) {
        return Err(FitError::NonFinite);
    }
    log::trace!(
        "circle fit converged in {iterations} iterations: c=({:.4}, {:.4}) r={:.4} cost={cost:.3e}",
        params[0],
        params[1],
        params[2].abs()
    );
    Ok(Circle::new(params[0], params[1], params[2].abs()))
}

fn check_spread(points: &[Point2], mx: f64, my: f64, tol: f64) -> Result<(), FitError> {
    let mut cov = Matrix2::<f64>::zeros();
    for p in points {
        let dx = p.x - mx;
        let dy = p.y - my;
        cov[(0, 0)] += dx * dx;
        cov[(0, 1)] += dx * dy;
        cov[(1, 1)] += dy * dy;
    }
    cov[(1, 0)] = cov[(0, 1)];

    let eig = cov.symmetric_eigen().eigenvalues;
    let (lo, hi) = if eig[0] <= eig[1] {
        (eig[0], eig[1])
    } else {
        (eig[1], eig[0])
    };

    if hi <= 0.0 {
        return Err(FitError::Degenerate("points have no spread"));
    }
    if lo <= tol * hi {
        return Err(FitError::Degenerate("points are collinear"));
    }
    Ok(())
}

fn cost_at(points: &[Point2], params: &Vector3<f64>) -> f64 {
    let (cx, cy, r) = (params[0], params[1], params[2]);
    0.5 * points
        .iter()
        .map(|p| {
            let d = (p.x - cx).hypot(p.y - cy) - r;
            d * d
        })
        .sum::<f64>()
}

/// `J^T J` and `J^T r` for residuals `r_i = ||p_i - c|| - r`.
fn normal_equations(points: &[Point2], params: &Vector3<f64>) -> (Matrix3<f64>, Vector3<f64>) {
    let (cx, cy, r) = (params[0], params[1], params[2]);
    let mut h = Matrix3::<f64>::zeros();
    let mut g = Vector3::<f64>::zeros();

    for p in points {
        let dx = p.x - cx;
        let dy = p.y - cy;
        let dist = dx.hypot(dy);
        let res = dist - r;

        // A point on the centre contributes only through the radius.
        let (ux, uy) = if dist > 1e-12 {
            (dx / dist, dy / dist)
        } else {
            (0.0, 0.0)
        };
        let j = Vector3::new(-ux, -uy, -1.0);
        h += j * j.transpose();
        g += j * res;
    }

    (h, g)
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use sm_core::Point2;

    use crate::{Circle, CircleFitConfig, FitError, fit_circle};

    fn ring(cx: f64, cy: f64, r: f64, n: usize, start: f64, sweep: f64) -> Vec<Point2> {
        (0..n)
            .map(|i| {
                let t = start + sweep * i as f64 / n as f64;
                Point2::new(cx + r * t.cos(), cy + r * t.sin())
            })
            .collect()
    }

    #[test]
    fn exact_points_recover_circle() {
        let pts = ring(50.0, -20.0, 12.5, 40, 0.3, std::f64::consts::TAU);
        let c = fit_circle(&pts, &CircleFitConfig::default()).expect("fit");
        assert_abs_diff_eq!(c.cx, 50.0, epsilon = 1e-9);
        assert_abs_diff_eq!(c.cy, -20.0, epsilon = 1e-9);
        assert_abs_diff_eq!(c.r, 12.5, epsilon = 1e-9);
    }

    #[test]
    fn partial_arc_is_fitted_geometrically() {
        // A quarter arc biases the centroid far from the centre.
        let pts = ring(3.0, 4.0, 20.0, 60, 0.2, std::f64::consts::FRAC_PI_2);
        let c = fit_circle(&pts, &CircleFitConfig::default()).expect("fit");
        assert_abs_diff_eq!(c.cx, 3.0, epsilon = 1e-7);
        assert_abs_diff_eq!(c.cy, 4.0, epsilon = 1e-7);
        assert_abs_diff_eq!(c.r, 20.0, epsilon = 1e-7);
        assert_abs_diff_eq!(c.residual(Point2::new(23.0, 4.0)), 0.0, epsilon = 1e-7);
    }

    #[test]
    fn noisy_ring_stays_close() {
        let mut pts = ring(0.0, 0.0, 10.0, 360, 0.0, std::f64::consts::TAU);
        for (i, p) in pts.iter_mut().enumerate() {
            // Deterministic +-0.05 perturbation along the radius.
            let s = if i % 2 == 0 { 1.005 } else { 0.995 };
            *p = Point2::new(p.x * s, p.y * s);
        }
        let c = fit_circle(&pts, &CircleFitConfig::default()).expect("fit");
        assert_abs_diff_eq!(c.r, 10.0, epsilon = 1e-3);
        assert!(c.center().distance(Point2::default()) < 1e-3);
    }

    #[test]
    fn rejects_degenerate_inputs() {
        let cfg = CircleFitConfig::default();
        assert_eq!(
            fit_circle(&[Point2::new(0.0, 0.0), Point2::new(1.0, 1.0)], &cfg),
            Err(FitError::TooFewPoints(2))
        );
        assert_eq!(fit_circle(&[], &cfg), Err(FitError::TooFewPoints(0)));

        let line: Vec<Point2> = (0..10).map(|i| Point2::new(i as f64, 2.0 * i as f64)).collect();
        assert!(matches!(fit_circle(&line, &cfg), Err(FitError::Degenerate(_))));

        let same = vec![Point2::new(1.0, 1.0); 5];
        assert!(matches!(fit_circle(&same, &cfg), Err(FitError::Degenerate(_))));

        let nan = vec![Point2::new(0.0, 0.0), Point2::new(1.0, 0.0), Point2::new(f64::NAN, 1.0)];
        assert_eq!(fit_circle(&nan, &cfg), Err(FitError::NonFinite));
    }

    #[test]
    fn exhausted_budget_is_an_error() {
        let pts = ring(3.0, 4.0, 20.0, 60, 0.2, std::f64::consts::FRAC_PI_2);
        let cfg = CircleFitConfig {
            max_iterations: 1,
            ..CircleFitConfig::default()
        };
        assert!(matches!(
            fit_circle(&pts, &cfg),
            Err(FitError::NotConverged { iterations: 1, .. })
        ));
    }

    #[test]
    fn center_accessor_matches_fields() {
        let c = Circle::new(1.0, 2.0, 3.0);
        assert_eq!(c.center(), Point2::new(1.0, 2.0));
    }
}
