//! Umbrella crate for the `scan-metrology` workspace.
//!
//! Re-exports the point-cloud primitives, the projection edge extractor, the
//! circle fitter and the per-feature measurements, so a caller can run a full
//! inspection with a single dependency:
//!
//! ```no_run
//! use scan_metrology::{InspectionConfig, PointCloud, ScanViews, run_cycle};
//!
//! let views = ScanViews {
//!     small: PointCloud::default(),
//!     horizontal: PointCloud::default(),
//!     horizontal2: PointCloud::default(),
//!     vertical: PointCloud::default(),
//! };
//! let outcome = run_cycle(&views, &InspectionConfig::default());
//! assert!(!outcome.quality.passed());
//! ```

pub use sm_core::*;
pub use sm_edge::*;
pub use sm_fit::*;
pub use sm_measure::*;
pub use sm_morph::*;
