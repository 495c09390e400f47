//! Least-squares circle fitting.
//!
//! [`fit_circle`] minimizes geometric (not algebraic) residuals, so the fit is
//! unbiased on partial arcs. It operates on any 2D point set; callers in the
//! measurement layer feed it de-scaled edge pixels rather than raw samples.
//!
//! [`FitReport`] summarizes how well a circle is supported by its points.

mod circle;
mod error;
mod report;

pub use circle::{Circle, CircleFitConfig, fit_circle};
pub use error::FitError;
pub use report::FitReport;
