use serde::{Deserialize, Serialize};
use sm_core::{Image, Point2};

use crate::canny::{CannyConfig, CannyDetector};
use crate::conv::gaussian_blur_f32;
use crate::kernels::GaussianKernel1D;
use crate::outliers::{RadiusOutlierConfig, remove_radius_outliers};
use crate::raster::{Raster, RasterConfig, rasterize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeExtractorConfig {
    pub raster: RasterConfig,
    /// Gaussian kernel size (odd); `1` disables blurring.
    pub blur_ksize: usize,
    /// Gaussian sigma; `<= 0` derives it from `blur_ksize`.
    pub blur_sigma: f32,
    pub canny: CannyConfig,
    pub outliers: Option<RadiusOutlierConfig>,
}

impl Default for EdgeExtractorConfig {
    fn default() -> Self {
        Self {
            raster: RasterConfig::default(),
            blur_ksize: 5,
            blur_sigma: 0.0,
            canny: CannyConfig::default(),
            outliers: None,
        }
    }
}

/// Edge pixel in canvas coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EdgePixel {
    pub row: usize,
    pub col: usize,
}

/// Edge pixels of one extraction, in row-major order, together with the
/// scale they were rasterized at.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EdgeSet {
    pixels: Vec<EdgePixel>,
    scale: f64,
}

impl EdgeSet {
    pub fn pixels(&self) -> &[EdgePixel] {
        &self.pixels
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    /// Edge points back in the projection's millimetre frame: `x` from the
    /// column, `y` from the row, both divided by the raster scale.
    pub fn descaled(&self) -> Vec<Point2> {
        self.pixels
            .iter()
            .map(|p| Point2::new(p.col as f64 / self.scale, p.row as f64 / self.scale))
            .collect()
    }
}

/// Intermediate rasters of one extraction, kept for debug output.
#[derive(Debug, Clone)]
pub struct EdgeDebug {
    pub raster: Raster,
    pub blurred: Image<f32>,
    pub edges: Image<u8>,
}

/// Rasterize, blur and Canny-detect 2D point projections.
///
/// Holds reusable filter buffers; one extractor per thread.
#[derive(Debug, Clone)]
pub struct EdgeExtractor {
    cfg: EdgeExtractorConfig,
    kernel: GaussianKernel1D,
    canny: CannyDetector,
}

impl EdgeExtractor {
    pub fn new(cfg: EdgeExtractorConfig) -> Self {
        let kernel = GaussianKernel1D::from_ksize(cfg.blur_ksize, cfg.blur_sigma);
        Self {
            cfg,
            kernel,
            canny: CannyDetector::new(),
        }
    }

    pub fn config(&self) -> &EdgeExtractorConfig {
        &self.cfg
    }

    /// Extracts edge pixels of `points`. An empty input, or one with no
    /// point on the canvas, yields an empty set.
    pub fn extract(&mut self, points: &[Point2]) -> EdgeSet {
        let Some(debug) = self.extract_debug(points) else {
            return EdgeSet {
                pixels: Vec::new(),
                scale: self.cfg.raster.scale,
            };
        };

        let raster = &debug.raster;
        let w = debug.edges.width();
        let mut pixels: Vec<EdgePixel> = debug
            .edges
            .data()
            .iter()
            .enumerate()
            .filter(|(_, v)| **v != 0)
            .map(|(i, _)| EdgePixel {
                row: raster.row0 + i / w,
                col: raster.col0 + i % w,
            })
            .collect();

        if let Some(outliers) = &self.cfg.outliers {
            pixels = remove_radius_outliers(&pixels, outliers);
        }

        log::debug!(
            "edge extraction: {} points -> {} edge pixels",
            points.len(),
            pixels.len()
        );

        EdgeSet {
            pixels,
            scale: raster.scale,
        }
    }

    /// Runs the pipeline and returns every intermediate raster.
    pub fn extract_debug(&mut self, points: &[Point2]) -> Option<EdgeDebug> {
        // Blur footprint plus the gradient stencil.
        let margin = 2 * self.kernel.radius + 2;
        let raster = rasterize(points, &self.cfg.raster, margin)?;

        let as_f32 = raster.image.as_view().map_to(f32::from);
        let blurred = gaussian_blur_f32(&as_f32.as_view(), &self.kernel);
        let edges = self.canny.detect(&blurred.as_view(), &self.cfg.canny);

        Some(EdgeDebug {
            raster,
            blurred,
            edges,
        })
    }
}

impl Default for EdgeExtractor {
    fn default() -> Self {
        Self::new(EdgeExtractorConfig::default())
    }
}

/// One-shot extraction with a fresh extractor.
pub fn extract_edges(points: &[Point2], cfg: &EdgeExtractorConfig) -> EdgeSet {
    EdgeExtractor::new(cfg.clone()).extract(points)
}

#[cfg(test)]
mod tests {
    use sm_core::Point2;

    use crate::extract::{EdgeExtractorConfig, extract_edges};
    use crate::outliers::RadiusOutlierConfig;
    use crate::raster::RasterConfig;

    fn filled_disk(cx: f64, cy: f64, r: f64, step: f64) -> Vec<Point2> {
        let mut pts = Vec::new();
        let n = (2.0 * r / step).ceil() as i64;
        for i in -n..=n {
            for j in -n..=n {
                let (x, y) = (i as f64 * step, j as f64 * step);
                if x * x + y * y <= r * r {
                    pts.push(Point2::new(cx + x, cy + y));
                }
            }
        }
        pts
    }

    #[test]
    fn empty_input_yields_empty_set() {
        let cfg = EdgeExtractorConfig::default();
        let edges = extract_edges(&[], &cfg);
        assert!(edges.is_empty());
        assert_eq!(edges.scale(), 12.0);
        assert!(extract_edges(&[Point2::new(-5.0, -5.0)], &cfg).is_empty());
    }

    #[test]
    fn disk_edges_lie_on_its_rim() {
        let cfg = EdgeExtractorConfig::default();
        let (cx, cy, r) = (40.0, 30.0, 6.0);
        let edges = extract_edges(&filled_disk(cx, cy, r, 0.05), &cfg);
        assert!(edges.len() > 200);

        for p in edges.descaled() {
            let d = (p.x - cx).hypot(p.y - cy);
            assert!((d - r).abs() < 0.25, "edge at distance {d}");
        }
    }

    #[test]
    fn outlier_filter_keeps_connected_contours() {
        let pts = filled_disk(20.0, 20.0, 4.0, 0.05);

        let plain = extract_edges(&pts, &EdgeExtractorConfig::default());
        let filtered = extract_edges(
            &pts,
            &EdgeExtractorConfig {
                outliers: Some(RadiusOutlierConfig::default()),
                ..EdgeExtractorConfig::default()
            },
        );

        assert!(!plain.is_empty());
        assert_eq!(filtered, plain);
    }

    #[test]
    fn descaling_uses_raster_scale() {
        let cfg = EdgeExtractorConfig {
            raster: RasterConfig {
                scale: 10.0,
                ..RasterConfig::default()
            },
            ..EdgeExtractorConfig::default()
        };
        let edges = extract_edges(&filled_disk(25.0, 25.0, 5.0, 0.05), &cfg);
        assert_eq!(edges.scale(), 10.0);
        let max_x = edges
            .descaled()
            .iter()
            .map(|p| p.x)
            .fold(f64::NEG_INFINITY, f64::max);
        // Rim plus the dot radius and rounding, at 10 px/mm.
        assert!((max_x - 30.0).abs() < 0.3, "max x {max_x}");
    }
}
