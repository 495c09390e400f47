//! Circle fit on a sloped transition surface.
//!
//! The band axis is flipped and the cloud re-zeroed, a band is cut along
//! it, a thin strip is cut across the strip axis, and the band/depth
//! projection of what remains is fitted like a bore.

use serde::{Deserialize, Serialize};
use sm_core::{Axis, Plane, PointCloud};
use sm_edge::extract_edges;
use sm_fit::{Circle, FitReport, fit_circle};

use crate::config::EdgeFitConfig;
use crate::select::{Span, bounds_of};
use crate::MeasureError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlopeParams {
    /// Flipped axis the band is cut along; the fitted `yc` lives here.
    pub band_axis: Axis,
    pub strip_axis: Axis,
    pub depth_axis: Axis,
    /// Band start as a fraction of the band axis range.
    pub y_divisor: f64,
    /// Strip half-width around the strip axis midpoint.
    pub delta_y: f64,
    /// Band length.
    pub crc_l: f64,
    /// Band start is pulled back by this much.
    pub band_lead: f64,
}

impl Default for SlopeParams {
    fn default() -> Self {
        Self {
            band_axis: Axis::Y,
            strip_axis: Axis::X,
            depth_axis: Axis::Z,
            y_divisor: 0.21,
            delta_y: 0.5,
            crc_l: 57.67,
            band_lead: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlopeFit {
    /// Circle in the flipped, re-zeroed (band, depth) plane.
    pub circle: Circle,
    /// Offset of the centre from the reference; `0.0` without reference.
    pub offset: f64,
    /// Band axis minimum subtracted after the flip.
    pub flipped_min: f64,
    pub report: FitReport,
}

impl SlopeFit {
    pub fn yc(&self) -> f64 {
        self.circle.cx
    }

    pub fn zc(&self) -> f64 {
        self.circle.cy
    }

    pub fn r(&self) -> f64 {
        self.circle.r
    }
}

/// Band-axis centre `yc` relative to `reference`, both expressed in the
/// unflipped frame: `yc - (-reference - flipped_min)`.
///
/// Since `flipped_min = -max`, this is `reference - yc_original`.
pub fn slope_offset(yc: f64, reference: f64, flipped_min: f64) -> f64 {
    yc - (-reference - flipped_min)
}

pub fn measure_slope(
    cloud: &PointCloud,
    reference: Option<f64>,
    params: &SlopeParams,
    cfg: &EdgeFitConfig,
) -> Result<SlopeFit, MeasureError> {
    const STAGE: &str = "slope window";

    let flipped = cloud.negated(params.band_axis);
    let (zeroed, mins) = flipped
        .shifted_to_min()
        .map_err(|_| MeasureError::empty("slope input"))?;
    let flipped_min = mins.get(params.band_axis);

    let band_bounds = bounds_of(&zeroed, params.band_axis, "slope input")?;
    let strip_bounds = bounds_of(&zeroed, params.strip_axis, "slope input")?;
    let band_lo = band_bounds.at_fraction(params.y_divisor) - params.band_lead;
    let band = Span::new(band_lo, band_lo + params.crc_l);
    let strip = Span::around(strip_bounds.mid(), params.delta_y);

    let windowed = zeroed.filter(|p| {
        band.contains(p.get(params.band_axis)) && strip.contains(p.get(params.strip_axis))
    });
    if windowed.is_empty() {
        return Err(MeasureError::empty(STAGE));
    }

    let projected = windowed.project(Plane::new(params.band_axis, params.depth_axis));
    let edges = extract_edges(&projected, &cfg.edges).descaled();
    if edges.is_empty() {
        return Err(MeasureError::empty("slope edges"));
    }

    let circle = fit_circle(&edges, &cfg.fit).map_err(MeasureError::fit(STAGE))?;
    let report = FitReport::compute(&edges, &circle).map_err(MeasureError::fit(STAGE))?;
    let offset = reference.map_or(0.0, |b| slope_offset(circle.cx, b, flipped_min));

    log::debug!(
        "slope: band ({:.3}, {:.3}), {} points, {} edges, yc={:.4} zc={:.4} r={:.4} offset={offset:.4}",
        band.lo,
        band.hi,
        windowed.len(),
        edges.len(),
        circle.cx,
        circle.cy,
        circle.r
    );

    Ok(SlopeFit {
        circle,
        offset,
        flipped_min,
        report,
    })
}
