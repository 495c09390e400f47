use serde::{Deserialize, Serialize};

use crate::geom::{Axis, Plane, Point2, Point3};
use crate::stats::median;
use crate::Error;

/// Closed coordinate interval `[min, max]` of one axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

impl Bounds {
    pub fn span(&self) -> f64 {
        self.max - self.min
    }

    pub fn mid(&self) -> f64 {
        0.5 * (self.min + self.max)
    }

    /// `min + fraction * span`.
    pub fn at_fraction(&self, fraction: f64) -> f64 {
        self.min + fraction * self.span()
    }
}

/// Unordered set of 3D samples in millimetres.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PointCloud {
    points: Vec<Point3>,
}

impl PointCloud {
    pub fn new(points: Vec<Point3>) -> Self {
        Self { points }
    }

    pub fn from_rows(rows: &[[f64; 3]]) -> Self {
        rows.iter().copied().map(Point3::from).collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[Point3] {
        &self.points
    }

    pub fn iter(&self) -> core::slice::Iter<'_, Point3> {
        self.points.iter()
    }

    pub fn into_points(self) -> Vec<Point3> {
        self.points
    }

    pub fn coords(&self, axis: Axis) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().map(move |p| p.get(axis))
    }

    /// Extent of the finite coordinates along `axis`.
    pub fn bounds(&self, axis: Axis) -> Option<Bounds> {
        let mut it = self.coords(axis).filter(|v| v.is_finite());
        let first = it.next()?;
        let (min, max) = it.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v)));
        Some(Bounds { min, max })
    }

    pub fn min(&self, axis: Axis) -> Option<f64> {
        self.bounds(axis).map(|b| b.min)
    }

    pub fn max(&self, axis: Axis) -> Option<f64> {
        self.bounds(axis).map(|b| b.max)
    }

    pub fn median(&self, axis: Axis) -> Option<f64> {
        median(self.coords(axis))
    }

    pub fn filter(&self, mut keep: impl FnMut(&Point3) -> bool) -> PointCloud {
        self.points.iter().filter(|p| keep(p)).copied().collect()
    }

    pub fn project(&self, plane: Plane) -> Vec<Point2> {
        self.points.iter().map(|p| plane.project(p)).collect()
    }

    /// Rotates every point by `degrees` about `axis` (right-handed).
    pub fn rotated(&self, axis: Axis, degrees: f64) -> PointCloud {
        let (s, c) = degrees.to_radians().sin_cos();
        self.points
            .iter()
            .map(|p| match axis {
                Axis::X => Point3::new(p.x, c * p.y - s * p.z, s * p.y + c * p.z),
                Axis::Y => Point3::new(c * p.x + s * p.z, p.y, -s * p.x + c * p.z),
                Axis::Z => Point3::new(c * p.x - s * p.y, s * p.x + c * p.y, p.z),
            })
            .collect()
    }

    pub fn offset(&self, axis: Axis, delta: f64) -> PointCloud {
        self.map_axis(axis, |v| v + delta)
    }

    pub fn negated(&self, axis: Axis) -> PointCloud {
        self.map_axis(axis, |v| -v)
    }

    /// Shifts the listed axes so that their minimum becomes zero.
    pub fn to_origin(&self, axes: &[Axis]) -> Result<PointCloud, Error> {
        let mut out = self.clone();
        for &axis in axes {
            let min = self.min(axis).ok_or(Error::EmptyCloud)?;
            out = out.offset(axis, -min);
        }
        Ok(out)
    }

    /// Shifts all three axes to a zero minimum and returns the subtracted
    /// per-axis minima.
    pub fn shifted_to_min(&self) -> Result<(PointCloud, Point3), Error> {
        let mut mins = Point3::default();
        for axis in Axis::ALL {
            mins.set(axis, self.min(axis).ok_or(Error::EmptyCloud)?);
        }
        let out = self
            .points
            .iter()
            .map(|p| Point3::new(p.x - mins.x, p.y - mins.y, p.z - mins.z))
            .collect();
        Ok((out, mins))
    }

    pub fn extended(&self, extra: impl IntoIterator<Item = Point3>) -> PointCloud {
        let mut points = self.points.clone();
        points.extend(extra);
        PointCloud { points }
    }

    /// Drops the gripper jaws seen at the low-X end of a view.
    ///
    /// Points within `clearance` of the minimum X define a Y span; every
    /// point inside that span (inclusive) is removed.
    pub fn without_gripper(&self, clearance: f64) -> Result<PointCloud, Error> {
        let min_x = self.min(Axis::X).ok_or(Error::EmptyCloud)?;
        let jaws = self.filter(|p| p.x < min_x + clearance);
        let span = jaws.bounds(Axis::Y).ok_or(Error::EmptyCloud)?;
        Ok(self.filter(|p| p.y < span.min || p.y > span.max))
    }

    fn map_axis(&self, axis: Axis, f: impl Fn(f64) -> f64) -> PointCloud {
        self.points
            .iter()
            .map(|p| {
                let mut q = *p;
                q.set(axis, f(p.get(axis)));
                q
            })
            .collect()
    }
}

impl FromIterator<Point3> for PointCloud {
    fn from_iter<I: IntoIterator<Item = Point3>>(iter: I) -> Self {
        Self {
            points: iter.into_iter().collect(),
        }
    }
}

impl From<Vec<Point3>> for PointCloud {
    fn from(points: Vec<Point3>) -> Self {
        Self { points }
    }
}
