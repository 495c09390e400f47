//! Edge extraction for 2D point projections.
//!
//! Raw laser samples are unevenly dense, so boundaries are not fitted on the
//! samples directly. Instead a projection is rasterized at a fixed scale
//! (pixels per millimetre), blurred into continuous strokes and passed
//! through a Canny detector. The resulting edge pixels are a roughly uniform
//! boundary sample.
//!
//! Pixel `(row, col)` corresponds to projection coordinate
//! `(col / scale, row / scale)`; [`EdgeSet::descaled`] applies that mapping
//! with the scale the pixels were produced at, so the two cannot drift apart.

pub mod canny;
pub mod conv;
pub mod extract;
pub mod kernels;
pub mod outliers;
pub mod raster;

pub use canny::{CannyConfig, CannyDetector};
pub use extract::{EdgeDebug, EdgeExtractor, EdgeExtractorConfig, EdgePixel, EdgeSet, extract_edges};
pub use kernels::GaussianKernel1D;
pub use outliers::{RadiusOutlierConfig, remove_radius_outliers};
pub use raster::{Raster, RasterConfig, rasterize};
