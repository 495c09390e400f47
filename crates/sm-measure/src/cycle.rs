//! One inspection cycle over the four scanner views.
//!
//! The small and horizontal views are measured in parallel; the vertical
//! view then borrows the horizontal `B` reference and bore radius. A failed
//! measurement leaves its features out of the report and is listed in
//! [`CycleOutcome::failures`].

use serde::Serialize;
use sm_core::{Axis, Point3, PointCloud};
use sm_fit::Circle;

use crate::bore::{CircleFitter, CircleSelector, DistanceCheck, StripParams};
use crate::config::{
    EdgeFitConfig, HorizontalViewParams, InspectionConfig, SmallViewParams, VerticalViewParams,
};
use crate::features::{FEATURE_NAMES, FeatureReport, QualityReport};
use crate::horn::{arm_horn_length, band_lengths, horn_gap, width};
use crate::select::bounds_of;
use crate::slope::measure_slope;
use crate::MeasureError;

pub const SMALL_POSITION_OK: &str = "small_position_ok";
pub const HORIZONTAL_POSITION_OK: &str = "horizontal_position_ok";

/// Raw clouds of one part, one per scanner pose.
#[derive(Debug, Clone, Default)]
pub struct ScanViews {
    pub small: PointCloud,
    pub horizontal: PointCloud,
    pub horizontal2: PointCloud,
    pub vertical: PointCloud,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SmallView {
    pub circle: Circle,
    pub datum: f64,
    pub distance: DistanceCheck,
}

impl SmallView {
    pub fn center_to_datum(&self) -> f64 {
        self.circle.cy - self.datum
    }
}

#[derive(Debug)]
pub struct HorizontalView {
    pub fitter: CircleFitter,
    pub secondary: Circle,
    pub distance: DistanceCheck,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VerticalFrames {
    /// Gripper removed and rotated.
    pub cloud: PointCloud,
    /// `cloud` with X and Y shifted to a zero minimum.
    pub reorigined: PointCloud,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StageFailure {
    pub stage: &'static str,
    pub error: MeasureError,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleOutcome {
    pub features: FeatureReport,
    pub quality: QualityReport,
    #[serde(serialize_with = "failures_as_text")]
    pub failures: Vec<StageFailure>,
}

fn failures_as_text<S: serde::Serializer>(
    failures: &[StageFailure],
    s: S,
) -> Result<S::Ok, S::Error> {
    s.collect_map(failures.iter().map(|f| (f.stage, f.error.to_string())))
}

pub fn prepare_small(raw: &PointCloud, p: &SmallViewParams) -> Result<PointCloud, MeasureError> {
    let rotated = raw.rotated(Axis::Z, p.rotate_z_deg);
    let floor = bounds_of(&rotated, Axis::Z, "small view")?.min + p.floor_offset;
    let lifted = rotated.filter(|q| q.z > floor);
    let x_end = bounds_of(&lifted, Axis::X, "small view above floor")?.min + p.x_extent;
    let cropped = lifted.filter(|q| q.x < x_end);
    Ok(cropped.to_origin(&[Axis::X, Axis::Y])?)
}

pub fn measure_small(
    raw: &PointCloud,
    p: &SmallViewParams,
    fitting: &EdgeFitConfig,
) -> Result<SmallView, MeasureError> {
    let cloud = prepare_small(raw, p)?;
    let mut fitter = CircleFitter::new(cloud, fitting.clone()).with_datum_params(p.datum.clone());
    let fit = fitter.fit_circles(&p.window)?;
    let datum = fitter.datum()?;
    let distance = fitter.distance(CircleSelector::Primary, p.z_distance, None)?;
    Ok(SmallView {
        circle: fit.primary.circle,
        datum,
        distance,
    })
}

/// Appends a datum line at the second scan's edge, rotates and re-origins.
pub fn prepare_horizontal(
    horizontal: &PointCloud,
    horizontal2: &PointCloud,
    p: &HorizontalViewParams,
) -> Result<PointCloud, MeasureError> {
    const STAGE: &str = "horizontal view";
    let hx = bounds_of(horizontal, Axis::X, STAGE)?;
    let hy = bounds_of(horizontal, Axis::Y, STAGE)?;
    let z_floor = bounds_of(horizontal, Axis::Z, STAGE)?.min;
    let second_x = bounds_of(horizontal2, Axis::X, "second horizontal view")?.min + p.second_scan_x_shift;
    let datum_x = hx.max - (hx.max - second_x).abs();

    let n = p.line_points;
    let line = (0..n).map(|i| {
        let t = if n > 1 { i as f64 / (n - 1) as f64 } else { 0.0 };
        Point3::new(datum_x, hy.at_fraction(t), z_floor)
    });
    let rotated = horizontal.extended(line).rotated(Axis::Z, p.rotate_z_deg);
    Ok(rotated.to_origin(&[Axis::X, Axis::Y])?)
}

pub fn measure_horizontal(
    horizontal: &PointCloud,
    horizontal2: &PointCloud,
    p: &HorizontalViewParams,
    fitting: &EdgeFitConfig,
) -> Result<HorizontalView, MeasureError> {
    let cloud = prepare_horizontal(horizontal, horizontal2, p)?;
    let mut fitter = CircleFitter::new(cloud, fitting.clone()).with_datum_params(p.datum.clone());
    let fit = fitter.fit_circles(&p.window)?;
    let secondary = fit
        .secondary
        .ok_or(MeasureError::CircleNotFitted(CircleSelector::Secondary))?
        .circle;
    let distance = fitter.distance(CircleSelector::Secondary, p.z_distance, None)?;
    Ok(HorizontalView {
        fitter,
        secondary,
        distance,
    })
}

pub fn prepare_vertical(raw: &PointCloud, p: &VerticalViewParams) -> Result<VerticalFrames, MeasureError> {
    let cloud = raw
        .without_gripper(p.gripper_clearance)?
        .rotated(Axis::Z, p.rotate_z_deg);
    let reorigined = cloud.to_origin(&[Axis::X, Axis::Y])?;
    Ok(VerticalFrames { cloud, reorigined })
}

#[derive(Default)]
struct Recorder {
    features: FeatureReport,
    failures: Vec<StageFailure>,
}

impl Recorder {
    fn keep<T>(&mut self, stage: &'static str, r: Result<T, MeasureError>) -> Option<T> {
        match r {
            Ok(v) => Some(v),
            Err(error) => {
                log::warn!("{stage} failed: {error}");
                self.failures.push(StageFailure { stage, error });
                None
            }
        }
    }

    fn set(&mut self, feature: usize, value: f64) {
        self.features.set_number(FEATURE_NAMES[feature - 1], value);
    }
}

pub fn run_cycle(views: &ScanViews, cfg: &InspectionConfig) -> CycleOutcome {
    let (small, horizontal) = rayon::join(
        || measure_small(&views.small, &cfg.small, &cfg.fitting),
        || measure_horizontal(&views.horizontal, &views.horizontal2, &cfg.horizontal, &cfg.fitting),
    );

    let mut rec = Recorder::default();
    let small = rec.keep("small view", small);
    let horizontal = rec.keep("horizontal view", horizontal);

    if let Some(s) = &small {
        log::debug!("small view: {:?}, datum {:.4}", s.circle, s.datum);
        rec.set(3, s.center_to_datum());
        rec.set(4, s.circle.r);
        rec.set(13, s.center_to_datum() - s.circle.r);
        rec.features.set_flag(SMALL_POSITION_OK, s.distance.ok);
    }

    if let Some(h) = &horizontal {
        log::debug!("horizontal view: secondary {:?}", h.secondary);
        rec.set(1, h.secondary.cy);
        rec.set(2, h.secondary.r);
        rec.features.set_flag(HORIZONTAL_POSITION_OK, h.distance.ok);
        if let Some(band) = rec.keep("band lengths", band_lengths(h.fitter.cloud(), &cfg.horizontal.band)) {
            rec.set(12, band.total());
            rec.set(14, band.offset);
        }
    }

    if let (Some(s), Some(h)) = (&small, &horizontal) {
        rec.set(11, 0.5 * (s.distance.distance + h.distance.distance));
    }

    if let Some(frames) = rec.keep("vertical view", prepare_vertical(&views.vertical, &cfg.vertical)) {
        measure_vertical(&mut rec, &frames, horizontal.as_ref(), cfg);
    }

    let quality = cfg.tolerances.check(&rec.features);
    log::info!(
        "cycle: {} features, {} failed stages, quality {}",
        rec.features.len(),
        rec.failures.len(),
        if quality.passed() { "passed" } else { "failed" }
    );
    CycleOutcome {
        features: rec.features,
        quality,
        failures: rec.failures,
    }
}

fn measure_vertical(
    rec: &mut Recorder,
    frames: &VerticalFrames,
    horizontal: Option<&HorizontalView>,
    cfg: &InspectionConfig,
) {
    let p = &cfg.vertical;
    let edges = &cfg.fitting.edges;
    let bore_radius = horizontal.map(|h| h.secondary.r);

    rec.set(5, width(&frames.reorigined, &p.width));

    if let Some(gap) = rec.keep("inner horn gap", horn_gap(&frames.reorigined, &p.horn_inner, edges)) {
        let (gap, deviation) = gap.values();
        rec.set(16, gap);
        rec.set(17, deviation);
    }
    if let Some(gap) = rec.keep("outer horn gap", horn_gap(&frames.reorigined, &p.horn_outer, edges)) {
        rec.set(15, gap.values().0);
    }

    let secondary = rec.keep(
        "secondary slope",
        measure_slope(&frames.cloud, None, &p.slope_secondary, &cfg.fitting),
    );
    if let (Some(slope), Some(r)) = (secondary, bore_radius) {
        rec.set(10, slope.r() + r);
    }

    let reference = vertical_reference(&frames.cloud, horizontal, &cfg.horizontal.b_strip);
    let Some((top, b_vertical)) = rec.keep("vertical reference", reference) else {
        return;
    };
    log::debug!("vertical reference B {b_vertical:.4}");
    rec.set(7, top - b_vertical);

    if let Some(slope) = rec.keep(
        "primary slope",
        measure_slope(&frames.cloud, Some(b_vertical), &p.slope_primary, &cfg.fitting),
    ) {
        rec.set(8, slope.offset);
        if let Some(r) = bore_radius {
            rec.set(9, slope.r() - r);
        }
    }

    if let Some(length) = rec.keep(
        "arm horn length",
        arm_horn_length(&frames.cloud, b_vertical, &p.arm_horn),
    ) {
        rec.set(6, length);
    }
}

/// Top of the vertical view and the horizontal `B` carried into its frame.
fn vertical_reference(
    vertical: &PointCloud,
    horizontal: Option<&HorizontalView>,
    strip: &StripParams,
) -> Result<(f64, f64), MeasureError> {
    let h = horizontal.ok_or(MeasureError::MissingReference("horizontal B"))?;
    let top = bounds_of(vertical, Axis::Y, "vertical view")?.max;
    let h_top = bounds_of(h.fitter.cloud(), Axis::Z, "horizontal view")?.max;
    let b = h.fitter.b_reference(strip)?;
    Ok((top, b + (top - h_top)))
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use sm_core::{Axis, Point3, PointCloud};

    use crate::config::{HorizontalViewParams, InspectionConfig, SmallViewParams};
    use crate::cycle::{
        CycleOutcome, HORIZONTAL_POSITION_OK, SMALL_POSITION_OK, ScanViews, prepare_horizontal,
        prepare_small, prepare_vertical, run_cycle,
    };
    use crate::features::{FEATURE_NAMES, FeatureValue, Verdict};
    use crate::slope::measure_slope;
    use crate::synth;
    use crate::MeasureError;

    #[test]
    fn small_view_is_rotated_cropped_and_reorigined() {
        let raw = PointCloud::from_rows(&[
            [0.0, 0.0, 0.0],
            [0.0, 10.0, 50.0],
            [0.0, 20.0, 60.0],
            [0.0, 200.0, 60.0],
        ]);
        let small = prepare_small(&raw, &SmallViewParams::default()).expect("small view");

        // -90 deg about z maps (x, y) to (y, -x); z > 37 and x < 10 + 50 remain.
        assert_eq!(small.len(), 2);
        let p = small.points();
        assert_abs_diff_eq!(p[0].x, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(p[1].x, 10.0, epsilon = 1e-9);
        assert_abs_diff_eq!(p[0].y, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(p[1].z, 60.0, epsilon = 1e-9);

        assert!(prepare_small(&PointCloud::default(), &SmallViewParams::default()).is_err());
    }

    #[test]
    fn horizontal_view_gets_a_datum_line() {
        let h = PointCloud::from_rows(&[[0.0, 0.0, 5.0], [10.0, 20.0, 7.0]]);
        let h2 = PointCloud::from_rows(&[[55.21, 0.0, 0.0]]);
        let params = HorizontalViewParams {
            line_points: 3,
            ..HorizontalViewParams::default()
        };
        let cloud = prepare_horizontal(&h, &h2, &params).expect("horizontal view");
        assert_eq!(cloud.len(), 5);

        // Line at x = 10 - |10 - 5| = 5 along y in {0, 10, 20}, on the floor;
        // +90 deg about z maps (x, y) to (-y, x), then both are re-zeroed.
        let line: Vec<&Point3> = cloud.iter().filter(|p| (p.z - 5.0).abs() < 1e-9).collect();
        assert_eq!(line.len(), 4);
        let mut xs: Vec<f64> = line[1..].iter().map(|p| p.x).collect();
        xs.sort_by(f64::total_cmp);
        for (x, want) in xs.iter().zip([0.0, 10.0, 20.0]) {
            assert_abs_diff_eq!(*x, want, epsilon = 1e-9);
        }
        assert!(line[1..].iter().all(|p| (p.y - 5.0).abs() < 1e-9));
        assert_abs_diff_eq!(cloud.min(Axis::X).expect("x"), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(cloud.min(Axis::Y).expect("y"), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn empty_views_leave_every_feature_missing() {
        let outcome = run_cycle(&ScanViews::default(), &InspectionConfig::default());
        assert!(outcome.features.is_empty());
        assert!(!outcome.quality.passed());
        for name in FEATURE_NAMES {
            assert_eq!(outcome.quality.verdicts[name], Verdict::Missing, "{name}");
        }
        let stages: Vec<&str> = outcome.failures.iter().map(|f| f.stage).collect();
        assert_eq!(stages, ["small view", "horizontal view", "vertical view"]);
        assert!(matches!(
            outcome.failures[0].error,
            MeasureError::EmptySelection { .. }
        ));

        let json = serde_json::to_value(&outcome).expect("serialize");
        assert!(json["failures"]["horizontal view"].is_string());
    }

    #[test]
    fn vertical_only_cycle_reports_horn_features() {
        // Horns as they appear after the 180 deg turn, plus gripper jaws far
        // from the part.
        let part = synth::horn_pair(50.0, 10.0, 20.0).rotated(Axis::Z, 180.0);
        let jaws = synth::plate(-1000.0..-990.0, -500.0..-490.0, 1.0, |_, _| 0.0);
        let views = ScanViews {
            vertical: part.extended(jaws.into_points()),
            ..ScanViews::default()
        };

        let outcome = run_cycle(&views, &InspectionConfig::default());
        let f = &outcome.features;
        assert_abs_diff_eq!(f.number("Feature5 (L40)").expect("width"), 100.0, epsilon = 1e-6);
        assert_abs_diff_eq!(f.number("Feature16 (L17.2)").expect("gap"), 20.0, epsilon = 0.5);
        assert_abs_diff_eq!(f.number("Feature17 (2C)").expect("deviation"), 0.0, epsilon = 0.1);
        // Nothing reaches the outer band: reported as not visible.
        assert_eq!(f.number("Feature15 (L23.4)"), Some(0.0));

        // Everything tied to the horizontal reference is missing.
        assert_eq!(f.number("Feature7 (L42)"), None);
        assert_eq!(f.number("Feature8 (L79.73)"), None);
        assert!(outcome
            .failures
            .iter()
            .any(|s| s.error == MeasureError::MissingReference("horizontal B")));
    }

    fn feature(outcome: &CycleOutcome, n: usize) -> f64 {
        let name = FEATURE_NAMES[n - 1];
        outcome
            .features
            .number(name)
            .unwrap_or_else(|| panic!("{name} missing, failures {:?}", outcome.failures))
    }

    /// Small view, prepared frame: a floor line along y = 0 and a 12.5 mm
    /// bore centred 23.1 above it. The raw cloud is the inverse of the
    /// -90 deg turn and re-origin, plus a floor point and a point beyond the
    /// crop.
    fn small_view() -> PointCloud {
        let line = synth::plate(0.0..49.01, 0.0..0.01, 0.05, |_, _| 100.0);
        let ring = synth::ring_xy(24.5, 23.1, 100.0, 12.5, 4000);
        let prepared = line.extended(ring.into_points());
        let raw = prepared.iter().map(|p| Point3::new(-(p.y + 20.0), p.x + 10.0, p.z));
        PointCloud::new(raw.collect()).extended([
            Point3::new(-20.0, 10.0, 0.0),
            Point3::new(-30.0, 80.0, 100.0),
        ])
    }

    /// Horizontal view, prepared frame `W` wide: the lower arc of a 12.5 mm
    /// bore, a 2 mm counterbore above its centre and a raised corner column
    /// at the median. The datum line lands on y = 0 once the second scan
    /// sits at x = 80.21.
    fn horizontal_views() -> (PointCloud, PointCloud) {
        const W: f64 = 40.625;
        let cx = 0.5 * W;
        let prepared = synth::arc_xy(cx, 101.56, 0.0, 12.5, 1000, 190.0, 350.0)
            .extended(synth::ring_xy(cx, 104.06, 0.0, 2.0, 400).into_points())
            .extended(synth::plate(cx..cx + 0.001, 70.0..80.004, 0.005, |_, _| 75.0).into_points())
            .extended([Point3::new(0.0, 110.0, 80.0), Point3::new(W, 110.0, 0.0)]);
        let raw = prepared.iter().map(|p| Point3::new(p.y + 30.0, -(p.x + 40.0), p.z));
        (
            PointCloud::new(raw.collect()),
            PointCloud::from_rows(&[[80.21, 0.0, 0.0]]),
        )
    }

    #[test]
    fn four_views_produce_every_derived_feature() {
        let (horizontal, horizontal2) = horizontal_views();
        // Slope profile centred at y = 100 with radius 20 once turned back.
        let slope = synth::ring_yz(100.0, 40.0, 20.0, 3000, &[-0.2, 0.0, 0.2], 5.0);
        let jaws = synth::plate(-1000.0..-990.0, -500.0..-490.0, 1.0, |_, _| 0.0);
        let views = ScanViews {
            small: small_view(),
            horizontal,
            horizontal2,
            vertical: slope.rotated(Axis::Z, 180.0).extended(jaws.into_points()),
        };
        let cfg = InspectionConfig::default();
        let outcome = run_cycle(&views, &cfg);

        for stage in [
            "small view",
            "horizontal view",
            "band lengths",
            "vertical reference",
            "primary slope",
            "secondary slope",
        ] {
            assert!(
                outcome.failures.iter().all(|f| f.stage != stage),
                "{stage} failed: {:?}",
                outcome.failures
            );
        }

        // Small view: datum on the floor line.
        let (f3, f4) = (feature(&outcome, 3), feature(&outcome, 4));
        assert_abs_diff_eq!(f3, 23.1, epsilon = 0.3);
        assert_abs_diff_eq!(f4, 12.5, epsilon = 0.3);
        assert_abs_diff_eq!(feature(&outcome, 13), f3 - f4, epsilon = 1e-9);
        assert_eq!(outcome.features.get(SMALL_POSITION_OK), Some(FeatureValue::Flag(true)));

        // Horizontal view: counterbore 102.1 + 1.96 above the datum line.
        let f2 = feature(&outcome, 2);
        assert_abs_diff_eq!(feature(&outcome, 1), 104.06, epsilon = 0.3);
        assert_abs_diff_eq!(f2, 2.0, epsilon = 0.15);
        assert_eq!(
            outcome.features.get(HORIZONTAL_POSITION_OK),
            Some(FeatureValue::Flag(true))
        );
        // Mean of the small (~0) and horizontal (~1.96) centre distances.
        assert_abs_diff_eq!(feature(&outcome, 11), 0.98, epsilon = 0.3);

        // Corner column y in [70, 80] at z = 75, under the 80 mm top.
        assert_abs_diff_eq!(feature(&outcome, 14), 70.0, epsilon = 1e-6);
        assert_abs_diff_eq!(feature(&outcome, 12), 80.0, epsilon = 1e-6);

        // B = 75 carried to the vertical frame: 75 + (120 - 80) = 115.
        assert_abs_diff_eq!(feature(&outcome, 7), 5.0, epsilon = 1e-6);
        assert_abs_diff_eq!(feature(&outcome, 8), 15.0, epsilon = 0.3);

        let frames = prepare_vertical(&views.vertical, &cfg.vertical).expect("vertical frames");
        let p = &cfg.vertical;
        let primary = measure_slope(&frames.cloud, Some(115.0), &p.slope_primary, &cfg.fitting)
            .expect("primary slope");
        let secondary = measure_slope(&frames.cloud, None, &p.slope_secondary, &cfg.fitting)
            .expect("secondary slope");
        assert_abs_diff_eq!(primary.r(), 20.0, epsilon = 0.3);
        assert_abs_diff_eq!(feature(&outcome, 8), primary.offset, epsilon = 1e-6);
        assert_abs_diff_eq!(feature(&outcome, 9), primary.r() - f2, epsilon = 1e-6);
        assert_abs_diff_eq!(feature(&outcome, 10), secondary.r() + f2, epsilon = 1e-9);
    }
}
