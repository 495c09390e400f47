//! Bore and counterbore circles on a projected view.
//!
//! A [`CircleFitter`] owns one view cloud. It extracts edges of the cloud's
//! projection, fits a primary circle inside a calibration window and, on
//! request, a secondary circle in a thin band above the primary centre.
//! Reference values (`datum`, `B`) are read off coordinate strips around the
//! planar median.

use std::cell::OnceCell;

use serde::{Deserialize, Serialize};
use sm_core::{Axis, Bounds, Plane, Point2, PointCloud};
use sm_edge::extract_edges;
use sm_fit::{Circle, FitReport, fit_circle};

use crate::config::EdgeFitConfig;
use crate::select::{Span, Window2, bounds_of, median_of};
use crate::MeasureError;

/// Allowed distance between a fitted centre and its expected position.
pub const POSITION_TOLERANCE_MM: f64 = 3.0;

/// Fit window of the primary circle, as fractions of the projection bounds
/// plus fixed extents in millimetres.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoreWindow {
    pub find_second_circle: bool,
    /// Window start along the plane's `u` axis, as a fraction of its range.
    pub val_x: f64,
    /// Window start along the plane's `v` axis, as a fraction of its range.
    pub val_z: f64,
    pub window_width: f64,
    pub delta_z: f64,
    /// Height of the secondary band above the primary centre.
    pub second_band: f64,
}

impl Default for BoreWindow {
    fn default() -> Self {
        Self {
            find_second_circle: true,
            val_x: 0.18,
            val_z: 0.796,
            window_width: 26.0,
            delta_z: 14.0,
            second_band: 5.0,
        }
    }
}

impl BoreWindow {
    fn primary(&self, u: Bounds, v: Bounds) -> Window2 {
        Window2 {
            u: Span::from_fraction(u, self.val_x, self.window_width),
            v: Span::from_fraction(v, self.val_z, self.delta_z),
        }
    }
}

/// Datum: lowest `value_axis` coordinate in a strip around the median of
/// `strip_axis`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatumParams {
    pub strip_axis: Axis,
    pub value_axis: Axis,
    pub half_width: f64,
}

impl Default for DatumParams {
    fn default() -> Self {
        Self {
            strip_axis: Axis::X,
            value_axis: Axis::Y,
            half_width: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Extremum {
    Max,
    Min,
}

impl Extremum {
    pub fn of(self, b: Bounds) -> f64 {
        match self {
            Extremum::Max => b.max,
            Extremum::Min => b.min,
        }
    }
}

/// `B`: extremum of `value_axis` over a square strip around the planar
/// median.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StripParams {
    pub plane: Plane,
    pub value_axis: Axis,
    pub strip_width: f64,
    pub extremum: Extremum,
}

impl Default for StripParams {
    fn default() -> Self {
        Self {
            plane: Plane::XY,
            value_axis: Axis::Z,
            strip_width: 20.0,
            extremum: Extremum::Max,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CircleSelector {
    Primary,
    Secondary,
}

/// Fitted circle with its supporting edge statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedCircle {
    pub circle: Circle,
    pub window: Window2,
    pub report: FitReport,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoreFit {
    pub primary: FittedCircle,
    pub secondary: Option<FittedCircle>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistanceCheck {
    pub distance: f64,
    pub ok: bool,
}

#[derive(Debug)]
pub struct CircleFitter {
    cloud: PointCloud,
    plane: Plane,
    cfg: EdgeFitConfig,
    datum_params: DatumParams,
    datum: OnceCell<f64>,
    primary: Option<Circle>,
    secondary: Option<Circle>,
}

impl CircleFitter {
    /// Fitter projecting `cloud` onto the XY plane.
    pub fn new(cloud: PointCloud, cfg: EdgeFitConfig) -> Self {
        Self {
            cloud,
            plane: Plane::XY,
            cfg,
            datum_params: DatumParams::default(),
            datum: OnceCell::new(),
            primary: None,
            secondary: None,
        }
    }

    pub fn with_plane(mut self, plane: Plane) -> Self {
        self.plane = plane;
        self
    }

    pub fn with_datum_params(mut self, params: DatumParams) -> Self {
        self.datum_params = params;
        self.datum = OnceCell::new();
        self
    }

    pub fn cloud(&self) -> &PointCloud {
        &self.cloud
    }

    pub fn plane(&self) -> Plane {
        self.plane
    }

    pub fn circle(&self, which: CircleSelector) -> Option<Circle> {
        match which {
            CircleSelector::Primary => self.primary,
            CircleSelector::Secondary => self.secondary,
        }
    }

    /// Lowest datum-axis coordinate in the strip around the median; computed
    /// once.
    pub fn datum(&self) -> Result<f64, MeasureError> {
        if let Some(&d) = self.datum.get() {
            return Ok(d);
        }

        let p = &self.datum_params;
        let median = median_of(&self.cloud, p.strip_axis, "datum input")?;
        let strip = Span::around(median, p.half_width);
        let selected = self.cloud.filter(|q| strip.contains(q.get(p.strip_axis)));
        let datum = bounds_of(&selected, p.value_axis, "datum strip")?.min;

        log::debug!("datum {datum:.4} from {} strip points", selected.len());
        let _ = self.datum.set(datum);
        Ok(datum)
    }

    /// Extremum of the value axis over a square strip around the planar
    /// median.
    pub fn b_reference(&self, params: &StripParams) -> Result<f64, MeasureError> {
        let (u, v) = (params.plane.u, params.plane.v);
        let half = 0.5 * params.strip_width;
        let su = Span::around(median_of(&self.cloud, u, "B input")?, half);
        let sv = Span::around(median_of(&self.cloud, v, "B input")?, half);

        let selected = self
            .cloud
            .filter(|q| su.contains(q.get(u)) && sv.contains(q.get(v)));
        let b = params
            .extremum
            .of(bounds_of(&selected, params.value_axis, "B strip")?);
        log::debug!("B {b:.4} from {} strip points", selected.len());
        Ok(b)
    }

    /// Fits the primary circle and, if requested, the secondary circle.
    pub fn fit_circles(&mut self, window: &BoreWindow) -> Result<BoreFit, MeasureError> {
        let ub = bounds_of(&self.cloud, self.plane.u, "bore input")?;
        let vb = bounds_of(&self.cloud, self.plane.v, "bore input")?;
        let projected = self.cloud.project(self.plane);

        let edges = extract_edges(&projected, &self.cfg.edges).descaled();
        log::debug!("bore: {} projected points, {} edge points", projected.len(), edges.len());

        let w1 = window.primary(ub, vb);
        let primary = self.fit_in(&edges, w1, "bore primary window")?;
        self.primary = Some(primary.circle);
        self.secondary = None;

        let secondary = if window.find_second_circle {
            let w2 = Window2 {
                u: w1.u,
                v: Span::new(primary.circle.cy, primary.circle.cy + window.second_band),
            };
            let fitted = self.fit_in(&edges, w2, "bore secondary window")?;
            self.secondary = Some(fitted.circle);
            Some(fitted)
        } else {
            None
        };

        Ok(BoreFit { primary, secondary })
    }

    fn fit_in(
        &self,
        edges: &[Point2],
        window: Window2,
        stage: &'static str,
    ) -> Result<FittedCircle, MeasureError> {
        let selected = window.select(edges);
        if selected.is_empty() {
            return Err(MeasureError::empty(stage));
        }
        let circle = fit_circle(&selected, &self.cfg.fit).map_err(MeasureError::fit(stage))?;
        let report = FitReport::compute(&selected, &circle).map_err(MeasureError::fit(stage))?;
        log::debug!(
            "{stage}: c=({:.4}, {:.4}) r={:.4} from {} edges, rms {:.4}",
            circle.cx,
            circle.cy,
            circle.r,
            selected.len(),
            report.rms_error
        );
        Ok(FittedCircle {
            circle,
            window,
            report,
        })
    }

    /// Distance of a fitted centre from `(median u, datum + z_distance)`.
    ///
    /// `reel_datum` replaces the cloud's own datum when given.
    pub fn distance(
        &self,
        which: CircleSelector,
        z_distance: f64,
        reel_datum: Option<f64>,
    ) -> Result<DistanceCheck, MeasureError> {
        let circle = self.circle(which).ok_or(MeasureError::CircleNotFitted(which))?;
        let datum = match reel_datum {
            Some(d) => d,
            None => self.datum()?,
        };
        let expected = Point2::new(
            median_of(&self.cloud, self.plane.u, "distance input")?,
            datum + z_distance,
        );
        let distance = circle.center().distance(expected);
        let ok = distance < POSITION_TOLERANCE_MM;
        if !ok {
            log::debug!("{which:?} centre is {distance:.3} mm from its expected position");
        }
        Ok(DistanceCheck { distance, ok })
    }
}
