//! Calibration of one inspection cycle.
//!
//! Every struct fills missing fields from its `Default`, so a JSON file only
//! needs to name what it changes.

use serde::{Deserialize, Serialize};
use sm_edge::EdgeExtractorConfig;
use sm_fit::CircleFitConfig;

use crate::bore::{BoreWindow, DatumParams, StripParams};
use crate::features::ToleranceTable;
use crate::horn::{ArmHornParams, BandLengthParams, HornGapParams, WidthParams};
use crate::slope::SlopeParams;

/// Edge extraction followed by a circle fit.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeFitConfig {
    pub edges: EdgeExtractorConfig,
    pub fit: CircleFitConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmallViewParams {
    pub rotate_z_deg: f64,
    /// Points at or below `min z + floor_offset` are dropped.
    pub floor_offset: f64,
    /// Points at or beyond `min x + x_extent` are dropped.
    pub x_extent: f64,
    pub window: BoreWindow,
    pub datum: DatumParams,
    pub z_distance: f64,
}

impl Default for SmallViewParams {
    fn default() -> Self {
        Self {
            rotate_z_deg: -90.0,
            floor_offset: 37.0,
            x_extent: 50.0,
            window: BoreWindow {
                find_second_circle: false,
                val_x: 0.175,
                val_z: 0.195,
                delta_z: 23.0,
                ..BoreWindow::default()
            },
            datum: DatumParams::default(),
            z_distance: 23.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HorizontalViewParams {
    /// X offset of the second horizontal scan in the first scan's frame.
    pub second_scan_x_shift: f64,
    /// Number of synthetic datum-line points appended before rotating.
    pub line_points: usize,
    pub rotate_z_deg: f64,
    pub window: BoreWindow,
    pub datum: DatumParams,
    pub z_distance: f64,
    pub b_strip: StripParams,
    pub band: BandLengthParams,
}

impl Default for HorizontalViewParams {
    fn default() -> Self {
        Self {
            second_scan_x_shift: -50.21,
            line_points: 100,
            rotate_z_deg: 90.0,
            window: BoreWindow::default(),
            datum: DatumParams::default(),
            z_distance: 102.1,
            b_strip: StripParams::default(),
            band: BandLengthParams::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerticalViewParams {
    pub gripper_clearance: f64,
    pub rotate_z_deg: f64,
    pub width: WidthParams,
    pub horn_inner: HornGapParams,
    pub horn_outer: HornGapParams,
    pub slope_primary: SlopeParams,
    pub slope_secondary: SlopeParams,
    pub arm_horn: ArmHornParams,
}

impl Default for VerticalViewParams {
    fn default() -> Self {
        Self {
            gripper_clearance: 23.0,
            rotate_z_deg: 180.0,
            width: WidthParams::default(),
            horn_inner: HornGapParams::with_offsets(60.0, 100.0),
            horn_outer: HornGapParams::with_offsets(240.0, 280.0),
            slope_primary: SlopeParams::default(),
            slope_secondary: SlopeParams {
                y_divisor: 0.11,
                crc_l: 28.0,
                ..SlopeParams::default()
            },
            arm_horn: ArmHornParams::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InspectionConfig {
    pub fitting: EdgeFitConfig,
    pub small: SmallViewParams,
    pub horizontal: HorizontalViewParams,
    pub vertical: VerticalViewParams,
    pub tolerances: ToleranceTable,
}
