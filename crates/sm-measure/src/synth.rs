//! Synthetic clouds for tests.

use std::f64::consts::TAU;
use std::ops::Range;

use sm_core::{Point3, PointCloud};

fn steps(range: Range<f64>, step: f64) -> impl Iterator<Item = f64> {
    let Range { start, end } = range;
    (0..)
        .map(move |i| start + step * i as f64)
        .take_while(move |&v| v < end)
}

/// `n` points on a circle in a plane of constant `z`.
pub fn ring_xy(cx: f64, cy: f64, z: f64, r: f64, n: usize) -> PointCloud {
    (0..n)
        .map(|i| {
            let t = TAU * i as f64 / n as f64;
            Point3::new(cx + r * t.cos(), cy + r * t.sin(), z)
        })
        .collect()
}

/// `n` points on the arc from `from_deg` to `to_deg` (both included),
/// counter-clockwise in a plane of constant `z`.
pub fn arc_xy(cx: f64, cy: f64, z: f64, r: f64, n: usize, from_deg: f64, to_deg: f64) -> PointCloud {
    let last = n.saturating_sub(1).max(1) as f64;
    (0..n)
        .map(|i| {
            let t = (from_deg + (to_deg - from_deg) * i as f64 / last).to_radians();
            Point3::new(cx + r * t.cos(), cy + r * t.sin(), z)
        })
        .collect()
}

/// Circle in the YZ plane repeated at every `x` of `xs`, plus two points at
/// the circle centre with `x = -x_extra` and `x = x_extra`.
pub fn ring_yz(cy: f64, cz: f64, r: f64, n: usize, xs: &[f64], x_extra: f64) -> PointCloud {
    let mut pts = Vec::with_capacity(n * xs.len() + 2);
    for &x in xs {
        pts.extend((0..n).map(|i| {
            let t = TAU * i as f64 / n as f64;
            Point3::new(x, cy + r * t.cos(), cz + r * t.sin())
        }));
    }
    pts.push(Point3::new(-x_extra, cy, cz));
    pts.push(Point3::new(x_extra, cy, cz));
    PointCloud::new(pts)
}

/// Grid over `xs x ys` with height `z(x, y)`.
pub fn plate(xs: Range<f64>, ys: Range<f64>, step: f64, z: impl Fn(f64, f64) -> f64) -> PointCloud {
    let yv: Vec<f64> = steps(ys, step).collect();
    steps(xs, step)
        .flat_map(|x| yv.iter().map(move |&y| (x, y)))
        .map(|(x, y)| Point3::new(x, y, z(x, y)))
        .collect()
}

/// Base plate `x in [0, 2 * median]`, `y in [0, 120]` at `z = 0` with two
/// raised horns of `width` whose inner edges sit `a` either side of the
/// median, spanning `y in [65, 95]` at `z = 10`.
pub fn horn_pair(median: f64, a: f64, width: f64) -> PointCloud {
    let step = 0.25;
    let base = plate(0.0..2.0 * median + step, 0.0..120.0 + step, 0.5, |_, _| 0.0);
    let left = plate(median - a - width..median - a + step, 65.0..95.0 + step, step, |_, _| 10.0);
    let right = plate(median + a..median + a + width + step, 65.0..95.0 + step, step, |_, _| 10.0);
    base.extended(left.into_points()).extended(right.into_points())
}
