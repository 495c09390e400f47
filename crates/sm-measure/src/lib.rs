//! Feature measurements on laser-scan point clouds of one part.
//!
//! - [`bore`]: primary and secondary bore circles, datum and `B` references,
//!   position check against the datum.
//! - [`slope`]: circle fit on the sloped transition, with an axis flip and a
//!   band/strip window.
//! - [`horn`]: width, horn gap, corner band lengths and arm length.
//! - [`cycle`]: the four-view inspection cycle producing a
//!   [`FeatureReport`] and its tolerance verdicts.
//!
//! Windows are open intervals cut at fixed offsets from a cloud's bounding
//! box or median; an empty window is an [`MeasureError::EmptySelection`],
//! never a NaN.

pub mod bore;
pub mod config;
pub mod cycle;
mod error;
pub mod features;
pub mod horn;
pub mod select;
pub mod slope;

#[cfg(test)]
mod synth;

pub use bore::{
    BoreFit, BoreWindow, CircleFitter, CircleSelector, DatumParams, DistanceCheck, Extremum,
    FittedCircle, POSITION_TOLERANCE_MM, StripParams,
};
pub use config::{
    EdgeFitConfig, HorizontalViewParams, InspectionConfig, SmallViewParams, VerticalViewParams,
};
pub use cycle::{CycleOutcome, ScanViews, StageFailure, run_cycle};
pub use error::MeasureError;
pub use features::{
    FEATURE_NAMES, FeatureReport, FeatureValue, QualityReport, Tolerance, ToleranceTable, Verdict,
};
pub use horn::{
    ArmHornParams, ArmHornWindows, BandLengthParams, BandLengths, HornGap, HornGapParams,
    WidthParams, arm_horn_length, arm_horn_windows, band_lengths, horn_gap, length_from_band, width,
};
pub use slope::{SlopeFit, SlopeParams, measure_slope, slope_offset};
