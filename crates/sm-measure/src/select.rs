//! Coordinate windows over point clouds and 2D projections.
//!
//! All windows are open intervals: a value exactly on a bound is outside.

use serde::{Deserialize, Serialize};
use sm_core::{Axis, Bounds, Point2, Point3, PointCloud};

use crate::MeasureError;

/// Open interval `(lo, hi)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub lo: f64,
    pub hi: f64,
}

impl Span {
    pub const fn new(lo: f64, hi: f64) -> Self {
        Self { lo, hi }
    }

    /// `(center - half_width, center + half_width)`.
    pub fn around(center: f64, half_width: f64) -> Self {
        Self::new(center - half_width, center + half_width)
    }

    /// Interval of `length` starting at `fraction` of `bounds`.
    pub fn from_fraction(bounds: Bounds, fraction: f64, length: f64) -> Self {
        let lo = bounds.at_fraction(fraction);
        Self::new(lo, lo + length)
    }

    pub fn contains(&self, v: f64) -> bool {
        self.lo < v && v < self.hi
    }
}

/// Axis-aligned open rectangle in a projection plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Window2 {
    pub u: Span,
    pub v: Span,
}

impl Window2 {
    pub fn contains(&self, p: &Point2) -> bool {
        self.u.contains(p.x) && self.v.contains(p.y)
    }

    pub fn select(&self, points: &[Point2]) -> Vec<Point2> {
        points.iter().copied().filter(|p| self.contains(p)).collect()
    }
}

/// Points of `cloud` whose `axis` coordinate lies in `span`.
pub fn within(cloud: &PointCloud, axis: Axis, span: Span) -> PointCloud {
    cloud.filter(|p| span.contains(p.get(axis)))
}

/// Points of `cloud` inside every `(axis, span)` pair.
pub fn within_all(cloud: &PointCloud, spans: &[(Axis, Span)]) -> PointCloud {
    cloud.filter(|p: &Point3| spans.iter().all(|&(axis, s)| s.contains(p.get(axis))))
}

pub(crate) fn bounds_of(
    cloud: &PointCloud,
    axis: Axis,
    stage: &'static str,
) -> Result<Bounds, MeasureError> {
    cloud.bounds(axis).ok_or(MeasureError::empty(stage))
}

pub(crate) fn median_of(
    cloud: &PointCloud,
    axis: Axis,
    stage: &'static str,
) -> Result<f64, MeasureError> {
    cloud.median(axis).ok_or(MeasureError::empty(stage))
}

pub(crate) fn non_empty(cloud: PointCloud, stage: &'static str) -> Result<PointCloud, MeasureError> {
    if cloud.is_empty() {
        return Err(MeasureError::empty(stage));
    }
    Ok(cloud)
}
