//! Point-projection rasterization.
//!
//! A point `(u, v)` in millimetres lands on pixel column `round(u * scale)`
//! and row `round(v * scale)` of a fixed canvas of
//! `canvas_mm * scale` pixels. Points off the canvas are dropped.
//!
//! Only the bounding box of the stamped pixels (plus a zero margin) is
//! allocated. The margin is wide enough that filtering the crop gives the
//! same result as filtering the full canvas, so pixel coordinates are
//! reported in canvas space via [`Raster::col0`] / [`Raster::row0`].

use serde::{Deserialize, Serialize};
use sm_core::{Image, Point2};
use sm_morph::{close_disk_binary_u8, disk_offsets, stamp_disk_u8};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RasterConfig {
    /// Pixels per millimetre.
    pub scale: f64,
    /// Canvas size before scaling, `(width, height)` in millimetres.
    pub canvas_mm: (f64, f64),
    /// Radius of the filled disk drawn per point.
    pub dot_radius_px: usize,
    /// Optional closing radius that bridges gaps between sparse dots.
    /// `0` disables closing.
    pub close_radius_px: usize,
}

impl Default for RasterConfig {
    fn default() -> Self {
        Self {
            scale: 12.0,
            canvas_mm: (500.0, 500.0),
            dot_radius_px: 1,
            close_radius_px: 0,
        }
    }
}

impl RasterConfig {
    /// Canvas size in pixels, `(width, height)`.
    pub fn canvas_px(&self) -> (usize, usize) {
        let w = (self.canvas_mm.0 * self.scale).floor().max(0.0) as usize;
        let h = (self.canvas_mm.1 * self.scale).floor().max(0.0) as usize;
        (w, h)
    }
}

/// Binary raster crop of the canvas.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    pub image: Image<u8>,
    /// Canvas column of the crop's first column.
    pub col0: usize,
    /// Canvas row of the crop's first row.
    pub row0: usize,
    pub scale: f64,
}

/// Rasterizes `points`, keeping at least `margin_px` background pixels
/// around the stamped region where the canvas allows it.
///
/// Returns `None` when no point lands on the canvas.
pub fn rasterize(points: &[Point2], cfg: &RasterConfig, margin_px: usize) -> Option<Raster> {
    let (canvas_w, canvas_h) = cfg.canvas_px();
    if canvas_w == 0 || canvas_h == 0 {
        return None;
    }

    let pixels: Vec<(usize, usize)> = points
        .iter()
        .filter_map(|p| {
            let col = (p.x * cfg.scale).round();
            let row = (p.y * cfg.scale).round();
            let on_canvas = col >= 0.0
                && row >= 0.0
                && col < canvas_w as f64
                && row < canvas_h as f64;
            on_canvas.then_some((col as usize, row as usize))
        })
        .collect();

    let (first_col, first_row) = *pixels.first()?;
    let (mut cmin, mut cmax, mut rmin, mut rmax) = (first_col, first_col, first_row, first_row);
    for &(c, r) in &pixels {
        cmin = cmin.min(c);
        cmax = cmax.max(c);
        rmin = rmin.min(r);
        rmax = rmax.max(r);
    }

    let reach = margin_px + cfg.dot_radius_px + cfg.close_radius_px;
    let col0 = cmin.saturating_sub(reach);
    let row0 = rmin.saturating_sub(reach);
    let col1 = (cmax + reach).min(canvas_w - 1);
    let row1 = (rmax + reach).min(canvas_h - 1);

    let mut image = Image::new_fill(col1 - col0 + 1, row1 - row0 + 1, 0u8);
    let offsets = disk_offsets(cfg.dot_radius_px);
    for &(c, r) in &pixels {
        stamp_disk_u8(&mut image, c - col0, r - row0, &offsets);
    }

    if cfg.close_radius_px > 0 {
        image = close_disk_binary_u8(&image.as_view(), cfg.close_radius_px);
    }

    log::trace!(
        "rasterized {} of {} points into {}x{} crop at ({col0}, {row0})",
        pixels.len(),
        points.len(),
        image.width(),
        image.height()
    );

    Some(Raster {
        image,
        col0,
        row0,
        scale: cfg.scale,
    })
}
