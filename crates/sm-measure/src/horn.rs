//! Edge and corner lengths of the arm and horn region.
//!
//! Each measurement cuts a window at fixed offsets from the cloud's bounding
//! box or median and reads an extremum, a span or the gap between two such
//! windows. No circle is fitted here.

use serde::{Deserialize, Serialize};
use sm_core::{Axis, Plane, PointCloud, mean};
use sm_edge::{EdgeExtractorConfig, extract_edges};

use crate::select::{Span, bounds_of, median_of, non_empty, within, within_all};
use crate::MeasureError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WidthParams {
    pub band_axis: Axis,
    pub width_axis: Axis,
    /// Height of the band below the band axis maximum.
    pub band_height: f64,
    /// Decimal places the width is rounded to.
    pub decimals: i32,
}

impl Default for WidthParams {
    fn default() -> Self {
        Self {
            band_axis: Axis::Y,
            width_axis: Axis::X,
            band_height: 50.0,
            decimals: 5,
        }
    }
}

/// Span of the width axis within `[max - band_height, max]` of the band axis.
///
/// Non-finite coordinates are ignored. An empty band yields `0.0`.
pub fn width(cloud: &PointCloud, params: &WidthParams) -> f64 {
    let Some(top) = cloud.max(params.band_axis) else {
        log::warn!("width: no finite points");
        return 0.0;
    };
    let lo = top - params.band_height;
    let band = cloud.filter(|p| {
        let b = p.get(params.band_axis);
        (lo..=top).contains(&b) && p.get(params.width_axis).is_finite()
    });
    let Some(span) = band.bounds(params.width_axis) else {
        log::warn!("width: band [{lo:.3}, {top:.3}] is empty");
        return 0.0;
    };

    let scale = 10f64.powi(params.decimals);
    (span.span() * scale).round() / scale
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HornGapParams {
    pub split_axis: Axis,
    pub band_axis: Axis,
    pub height_axis: Axis,
    pub y_offset_low: f64,
    pub y_offset_high: f64,
    /// Depth of the top slice kept on each side.
    pub z_threshold: f64,
    /// Inner edge cluster width, as a fraction of the side's edge range.
    pub margin_fraction: f64,
}

impl Default for HornGapParams {
    fn default() -> Self {
        Self {
            split_axis: Axis::X,
            band_axis: Axis::Y,
            height_axis: Axis::Z,
            y_offset_low: 60.0,
            y_offset_high: 100.0,
            z_threshold: 8.0,
            margin_fraction: 0.05,
        }
    }
}

impl HornGapParams {
    pub fn with_offsets(low: f64, high: f64) -> Self {
        Self {
            y_offset_low: low,
            y_offset_high: high,
            ..Self::default()
        }
    }
}

/// Outcome of [`horn_gap`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum HornGap {
    Measured { gap: f64, center_deviation: f64 },
    /// One side of the split had nothing to measure.
    NotVisible,
}

impl HornGap {
    /// `(gap, center_deviation)`, `(0.0, 0.0)` when not visible.
    pub fn values(&self) -> (f64, f64) {
        match *self {
            HornGap::Measured {
                gap,
                center_deviation,
            } => (gap, center_deviation),
            HornGap::NotVisible => (0.0, 0.0),
        }
    }

    pub fn is_visible(&self) -> bool {
        matches!(self, HornGap::Measured { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Left,
    Right,
}

/// Gap between the inner edges of the two horns either side of the median.
pub fn horn_gap(
    cloud: &PointCloud,
    params: &HornGapParams,
    edges: &EdgeExtractorConfig,
) -> Result<HornGap, MeasureError> {
    let median = median_of(cloud, params.split_axis, "horn gap input")?;
    let base = bounds_of(cloud, params.band_axis, "horn gap input")?.min;
    let band = Span::new(base + params.y_offset_low, base + params.y_offset_high);

    let left = inner_edge(cloud, Side::Left, median, band, params, edges);
    let right = inner_edge(cloud, Side::Right, median, band, params, edges);
    let (Some(left), Some(right)) = (left, right) else {
        log::warn!(
            "horn gap: band ({:.3}, {:.3}) not visible on both sides",
            band.lo,
            band.hi
        );
        return Ok(HornGap::NotVisible);
    };

    let gap = right - left;
    let center_deviation = (median - 0.5 * (left + right)).abs();
    log::debug!("horn gap: inner edges {left:.4} / {right:.4}, gap {gap:.4}, deviation {center_deviation:.4}");
    Ok(HornGap::Measured {
        gap,
        center_deviation,
    })
}

/// Mean split-axis coordinate of the edge cluster facing the median.
fn inner_edge(
    cloud: &PointCloud,
    side: Side,
    median: f64,
    band: Span,
    params: &HornGapParams,
    edges: &EdgeExtractorConfig,
) -> Option<f64> {
    let on_side = cloud.filter(|p| {
        let s = p.get(params.split_axis);
        let in_side = match side {
            Side::Left => s < median,
            Side::Right => s > median,
        };
        in_side && band.contains(p.get(params.band_axis))
    });
    let top = on_side.max(params.height_axis)?;
    let slice = on_side.filter(|p| p.get(params.height_axis) > top - params.z_threshold);

    let projected = slice.project(Plane::new(params.split_axis, params.band_axis));
    let xs: Vec<f64> = extract_edges(&projected, edges)
        .descaled()
        .into_iter()
        .map(|p| p.x)
        .collect();
    let lo = xs.iter().copied().reduce(f64::min)?;
    let hi = xs.iter().copied().reduce(f64::max)?;
    let margin = (hi - lo) * params.margin_fraction;

    match side {
        Side::Left => mean(xs.iter().copied().filter(|&x| x >= hi - margin)),
        Side::Right => mean(xs.iter().copied().filter(|&x| x <= lo + margin)),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BandLengthParams {
    pub strip_axis: Axis,
    pub band_axis: Axis,
    pub height_axis: Axis,
    pub x_half_width: f64,
    pub y_band_height: f64,
    pub z_band_height: f64,
}

impl Default for BandLengthParams {
    fn default() -> Self {
        Self {
            strip_axis: Axis::X,
            band_axis: Axis::Y,
            height_axis: Axis::Z,
            x_half_width: 1.0,
            y_band_height: 50.0,
            z_band_height: 13.0,
        }
    }
}

/// Corner window measurements along the band axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandLengths {
    /// Window minimum relative to the cloud minimum.
    pub offset: f64,
    /// Window maximum minus window minimum.
    pub extent: f64,
}

impl BandLengths {
    pub fn total(&self) -> f64 {
        self.offset + self.extent
    }
}

/// Window: median strip of the strip axis, top `y_band_height` of the band
/// axis and top `z_band_height` of the height axis.
pub fn band_lengths(cloud: &PointCloud, params: &BandLengthParams) -> Result<BandLengths, MeasureError> {
    const STAGE: &str = "band length input";
    let median = median_of(cloud, params.strip_axis, STAGE)?;
    let y = bounds_of(cloud, params.band_axis, STAGE)?;
    let z_top = bounds_of(cloud, params.height_axis, STAGE)?.max;

    let strip = Span::around(median, params.x_half_width);
    let band = Span::new(y.max - params.y_band_height, y.max);
    let window = cloud.filter(|p| {
        strip.contains(p.get(params.strip_axis))
            && band.contains(p.get(params.band_axis))
            && p.get(params.height_axis) > z_top - params.z_band_height
    });
    let w = bounds_of(&window, params.band_axis, "band length window")?;

    let lengths = BandLengths {
        offset: w.min - y.min,
        extent: w.span(),
    };
    log::debug!(
        "band lengths: {} window points, offset {:.4}, extent {:.4}",
        window.len(),
        lengths.offset,
        lengths.extent
    );
    Ok(lengths)
}

pub fn length_from_band(cloud: &PointCloud, params: &BandLengthParams) -> Result<f64, MeasureError> {
    band_lengths(cloud, params).map(|l| l.offset)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArmHornParams {
    pub strip_axis: Axis,
    pub band_axis: Axis,
    pub height_axis: Axis,
    /// Primary window start along the band axis, as a fraction of its range.
    pub val_y: f64,
    /// Primary window start along the height axis, as a fraction of its range.
    pub val_z: f64,
    pub primary_length: f64,
    pub primary_height: f64,
    /// Offsets of the secondary band bounds from the primary band bounds.
    pub secondary_offsets: (f64, f64),
    /// Offsets of the tertiary height bounds from the primary height bounds.
    pub tertiary_offsets: (f64, f64),
    pub end_half_width: f64,
}

impl Default for ArmHornParams {
    fn default() -> Self {
        Self {
            strip_axis: Axis::X,
            band_axis: Axis::Y,
            height_axis: Axis::Z,
            val_y: 0.1,
            val_z: 0.25,
            primary_length: 80.0,
            primary_height: 50.0,
            secondary_offsets: (70.0, 90.0),
            tertiary_offsets: (62.0, 75.0),
            end_half_width: 1.0,
        }
    }
}

/// Selections of the arm-horn view. The secondary window shares the primary
/// height band; the tertiary window only bounds the height axis.
#[derive(Debug, Clone, PartialEq)]
pub struct ArmHornWindows {
    pub primary: PointCloud,
    pub secondary: PointCloud,
    pub tertiary: PointCloud,
}

pub fn arm_horn_windows(
    cloud: &PointCloud,
    params: &ArmHornParams,
) -> Result<ArmHornWindows, MeasureError> {
    const STAGE: &str = "arm horn input";
    let (ya, za) = (params.band_axis, params.height_axis);
    let yb = bounds_of(cloud, ya, STAGE)?;
    let zb = bounds_of(cloud, za, STAGE)?;

    let y_win = Span::from_fraction(yb, params.val_y, params.primary_length);
    let z_win = Span::from_fraction(zb, params.val_z, params.primary_height);
    let in_window = |y: Span, z: Span| within_all(cloud, &[(ya, y), (za, z)]);

    let primary = non_empty(in_window(y_win, z_win), "arm horn primary window")?;

    let (s_lo, s_hi) = params.secondary_offsets;
    let secondary = in_window(Span::new(y_win.lo + s_lo, y_win.hi + s_hi), z_win);
    if secondary.is_empty() {
        log::warn!("arm horn: secondary window is empty");
    }
    let (t_lo, t_hi) = params.tertiary_offsets;
    let tz = Span::new(z_win.lo + t_lo, z_win.hi + t_hi);
    let tertiary = within(cloud, za, tz);
    if tertiary.is_empty() {
        log::warn!("arm horn: tertiary window is empty");
    }

    Ok(ArmHornWindows {
        primary,
        secondary,
        tertiary,
    })
}

/// `reference - min(y)` of the arm end: all points between the lowest
/// midpoint-strip point and the start of the primary window.
pub fn arm_horn_length(
    cloud: &PointCloud,
    reference: f64,
    params: &ArmHornParams,
) -> Result<f64, MeasureError> {
    let ya = params.band_axis;
    let xb = bounds_of(cloud, params.strip_axis, "arm horn input")?;
    let ArmHornWindows { primary, .. } = arm_horn_windows(cloud, params)?;

    let strip = Span::around(xb.mid(), params.end_half_width);
    let end = within(cloud, params.strip_axis, strip);
    let end_lo = bounds_of(&end, ya, "arm horn end strip")?.min;
    let primary_lo = bounds_of(&primary, ya, "arm horn primary window")?.min;

    let reach = Span::new(end_lo, primary_lo);
    let end_length = within(cloud, ya, reach);
    let tip = bounds_of(&end_length, ya, "arm horn end length")?.min;

    let length = reference - tip;
    log::debug!("arm horn: end ({end_lo:.4}, {primary_lo:.4}), tip {tip:.4}, length {length:.4}");
    Ok(length)
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use sm_core::{Point3, PointCloud};
    use sm_edge::EdgeExtractorConfig;

    use crate::horn::{
        ArmHornParams, BandLengthParams, HornGap, HornGapParams, WidthParams, arm_horn_length,
        arm_horn_windows, band_lengths, horn_gap, length_from_band, width,
    };
    use crate::synth;
    use crate::MeasureError;

    #[test]
    fn width_of_top_band() {
        // Wide below y = 50, narrow above.
        let mut cloud = synth::plate(0.0..100.5, 0.0..50.0, 0.5, |_, _| 0.0);
        cloud = cloud.extended(synth::plate(20.0..60.25, 50.0..100.25, 0.25, |_, _| 0.0).into_points());
        assert_abs_diff_eq!(width(&cloud, &WidthParams::default()), 40.0, epsilon = 1e-9);

        let with_nan = cloud.extended([Point3::new(f64::NAN, 99.0, 0.0), Point3::new(500.0, f64::NAN, 0.0)]);
        assert_abs_diff_eq!(width(&with_nan, &WidthParams::default()), 40.0, epsilon = 1e-9);

        assert_eq!(width(&PointCloud::default(), &WidthParams::default()), 0.0);
    }

    #[test]
    fn width_is_rounded() {
        let cloud = PointCloud::from_rows(&[[0.0, 0.0, 0.0], [1.234567891, 0.0, 0.0]]);
        assert_eq!(width(&cloud, &WidthParams::default()), 1.23457);
    }

    #[test]
    fn symmetric_horns_give_twice_the_half_gap() {
        let a = 10.0;
        let cloud = synth::horn_pair(50.0, a, 20.0);
        let gap = horn_gap(&cloud, &HornGapParams::default(), &EdgeExtractorConfig::default())
            .expect("horn gap");

        let HornGap::Measured {
            gap,
            center_deviation,
        } = gap
        else {
            panic!("horns should be visible: {gap:?}");
        };
        assert_abs_diff_eq!(gap, 2.0 * a, epsilon = 0.5);
        assert_abs_diff_eq!(center_deviation, 0.0, epsilon = 0.1);
    }

    #[test]
    fn missing_side_is_not_visible() {
        let cfg = EdgeExtractorConfig::default();

        // Every point sits on the median: both sides are empty.
        let column = synth::plate(10.0..10.1, 0.0..120.0, 0.5, |_, y| y * 0.1);
        let gap = horn_gap(&column, &HornGapParams::default(), &cfg).expect("soft failure");
        assert_eq!(gap, HornGap::NotVisible);
        assert_eq!(gap.values(), (0.0, 0.0));
        assert!(!gap.is_visible());

        // Right side exists but lies below the band.
        let mut lopsided = synth::plate(10.0..40.5, 60.5..100.0, 1.0, |_, _| 10.0);
        lopsided = lopsided.extended(synth::plate(60.0..90.5, 0.0..40.0, 1.0, |_, _| 10.0).into_points());
        assert_eq!(
            horn_gap(&lopsided, &HornGapParams::default(), &cfg),
            Ok(HornGap::NotVisible)
        );

        assert!(matches!(
            horn_gap(&PointCloud::default(), &HornGapParams::default(), &cfg),
            Err(MeasureError::EmptySelection { .. })
        ));
    }

    #[test]
    fn corner_band_offset_and_extent() {
        // Raised step between y = 70 and y = 90 on a flat strip.
        let cloud = synth::plate(-2.0..2.25, 0.0..100.25, 0.25, |_, y| {
            if (70.0..=90.0).contains(&y) { 20.0 } else { 0.0 }
        });
        let lengths = band_lengths(&cloud, &BandLengthParams::default()).expect("window");
        assert_abs_diff_eq!(lengths.offset, 70.0, epsilon = 1e-9);
        assert_abs_diff_eq!(lengths.extent, 20.0, epsilon = 1e-9);
        assert_abs_diff_eq!(lengths.total(), 90.0, epsilon = 1e-9);
        assert_abs_diff_eq!(
            length_from_band(&cloud, &BandLengthParams::default()).expect("window"),
            70.0,
            epsilon = 1e-9
        );

        // Flat cloud: nothing rises above the top slice floor within the band.
        let flat = synth::plate(-2.0..2.25, 0.0..100.25, 0.25, |_, _| 0.0);
        let ok = band_lengths(&flat, &BandLengthParams::default()).expect("window");
        assert!(ok.offset > 50.0);
        assert!(matches!(
            band_lengths(&PointCloud::default(), &BandLengthParams::default()),
            Err(MeasureError::EmptySelection { .. })
        ));
    }

    #[test]
    fn arm_horn_tip_against_reference() {
        // Ramp z = y / 2 over x in [0, 40], y in [0, 200].
        let cloud = synth::plate(0.0..40.5, 0.0..200.5, 1.0, |_, y| 0.5 * y);
        let params = ArmHornParams::default();

        // Primary window: y in (20, 100), z in (25, 75) -> starts at y = 51.
        // The end strip around x = 20 reaches down to y = 0, so the first
        // point strictly between 0 and 51 is at y = 1.
        let length = arm_horn_length(&cloud, 300.0, &params).expect("length");
        assert_abs_diff_eq!(length, 299.0, epsilon = 1e-9);

        assert!(matches!(
            arm_horn_length(&PointCloud::default(), 300.0, &params),
            Err(MeasureError::EmptySelection { .. })
        ));
    }

    #[test]
    fn arm_horn_tertiary_window_spans_the_whole_band_axis() {
        let cloud = synth::plate(0.0..40.5, 0.0..200.5, 1.0, |_, y| 0.5 * y);
        let windows = arm_horn_windows(&cloud, &ArmHornParams::default()).expect("windows");

        // Primary y in (20, 100), z in (25, 75); tertiary z in (87, 150)
        // lies entirely above the primary band, at y in [175, 200].
        assert!(windows.primary.points().iter().all(|p| p.y > 20.0 && p.y < 100.0));
        assert_eq!(windows.tertiary.len(), 41 * 26);
        assert!(windows.tertiary.points().iter().all(|p| p.z > 87.0 && p.y >= 175.0));

        // Secondary y in (90, 190) still bounded by the primary height band.
        assert!(windows.secondary.points().iter().all(|p| p.y > 90.0 && p.y < 150.0));
        assert!(!windows.secondary.is_empty());
    }
}
