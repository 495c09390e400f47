use serde::{Deserialize, Serialize};
use sm_core::Point2;

use crate::{Circle, FitError};

/// Residual and angular-coverage statistics of a fitted circle.
///
/// Residuals are absolute geometric distances `| ||p - c|| - r |`. Angles are
/// measured at the circle centre, in degrees normalized to `[0, 360)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitReport {
    pub circle: Circle,
    pub n_points: usize,
    pub mean_error: f64,
    pub rms_error: f64,
    pub std_error: f64,
    pub max_error: f64,
    pub min_error: f64,
    pub angle_range_deg: f64,
    pub angle_mean_deg: f64,
    /// Circular standard deviation, `sqrt(-2 ln R)` with `R` the mean
    /// resultant length.
    pub angle_circstd_deg: f64,
    /// Supporting points per 45 degree sector, starting at angle 0.
    pub sector_counts: [usize; 8],
}

impl FitReport {
    pub fn compute(points: &[Point2], circle: &Circle) -> Result<Self, FitError> {
        let n = points.len();
        if n == 0 {
            return Err(FitError::TooFewPoints(0));
        }
        let nf = n as f64;

        let errors: Vec<f64> = points.iter().map(|&p| circle.residual(p).abs()).collect();
        let mean_error = errors.iter().sum::<f64>() / nf;
        let rms_error = (errors.iter().map(|e| e * e).sum::<f64>() / nf).sqrt();
        let std_error = (errors
            .iter()
            .map(|e| (e - mean_error).powi(2))
            .sum::<f64>()
            / nf)
            .sqrt();
        let max_error = errors.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let min_error = errors.iter().copied().fold(f64::INFINITY, f64::min);

        let mut sector_counts = [0usize; 8];
        let (mut sin_sum, mut cos_sum) = (0.0, 0.0);
        let (mut amin, mut amax, mut asum) = (f64::INFINITY, f64::NEG_INFINITY, 0.0);
        for p in points {
            let rad = (p.y - circle.cy).atan2(p.x - circle.cx);
            sin_sum += rad.sin();
            cos_sum += rad.cos();

            let mut deg = rad.to_degrees();
            if deg < 0.0 {
                deg += 360.0;
            }
            amin = amin.min(deg);
            amax = amax.max(deg);
            asum += deg;

            let sector = ((deg / 45.0).floor() as usize).min(7);
            sector_counts[sector] += 1;
        }

        let resultant = (sin_sum / nf).hypot(cos_sum / nf);
        let angle_circstd_deg = if resultant >= 1.0 {
            0.0
        } else {
            (-2.0 * resultant.ln()).sqrt().to_degrees()
        };

        if !(mean_error.is_finite() && rms_error.is_finite()) {
            return Err(FitError::NonFinite);
        }

        Ok(Self {
            circle: *circle,
            n_points: n,
            mean_error,
            rms_error,
            std_error,
            max_error,
            min_error,
            angle_range_deg: amax - amin,
            angle_mean_deg: asum / nf,
            angle_circstd_deg,
            sector_counts,
        })
    }
}
