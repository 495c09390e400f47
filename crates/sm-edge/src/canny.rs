//! Canny edge map at a single scale.
//!
//! Coordinate convention: pixel index `(x, y)` is column `x`, row `y`.
//!
//! Gradients use a 3x3 Sobel aperture with replicated borders. Magnitude is
//! `|gx| + |gy|` unless `l2_gradient` is set, which matches how fixed
//! thresholds like 150/200 are usually tuned for 8-bit rasters.
//!
//! Threshold behavior:
//! - A pixel is a strong seed if its suppressed magnitude is `> high_thresh`,
//!   a weak candidate if `> low_thresh`.
//! - Weak candidates survive only when 8-connected to a strong seed.
//! - Thresholds are swapped if given out of order.

use serde::{Deserialize, Serialize};
use sm_core::{Image, ImageView};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CannyConfig {
    pub low_thresh: f32,
    pub high_thresh: f32,
    pub l2_gradient: bool,
}

impl Default for CannyConfig {
    fn default() -> Self {
        Self {
            low_thresh: 150.0,
            high_thresh: 200.0,
            l2_gradient: false,
        }
    }
}

/// Reusable Canny detector. Scratch buffers are kept between calls and
/// reallocated only when the input size changes.
#[derive(Debug, Clone)]
pub struct CannyDetector {
    src: Image<f32>,
    gx: Image<f32>,
    gy: Image<f32>,
    mag: Image<f32>,
    nms: Image<f32>,
    weak: Vec<u8>,
    visited: Vec<u8>,
    stack: Vec<usize>,
}

impl CannyDetector {
    pub fn new() -> Self {
        Self {
            src: Image::new_fill(0, 0, 0.0),
            gx: Image::new_fill(0, 0, 0.0),
            gy: Image::new_fill(0, 0, 0.0),
            mag: Image::new_fill(0, 0, 0.0),
            nms: Image::new_fill(0, 0, 0.0),
            weak: Vec::new(),
            visited: Vec::new(),
            stack: Vec::new(),
        }
    }

    /// Returns a binary edge map (`255` on edges, `0` elsewhere) of the same
    /// size as `img`.
    pub fn detect(&mut self, img: &ImageView<'_, f32>, cfg: &CannyConfig) -> Image<u8> {
        let (w, h) = (img.width(), img.height());
        self.ensure_dims(w, h);
        if w == 0 || h == 0 {
            return Image::new_fill(w, h, 0);
        }

        {
            let dst = self.src.data_mut();
            for y in 0..h {
                dst[y * w..(y + 1) * w].copy_from_slice(img.row(y));
            }
        }

        self.compute_gradient(cfg);
        self.non_max_suppression();
        let count = self.hysteresis(cfg);
        log::trace!("canny {w}x{h}: {count} edge pixels");

        let data = self
            .visited
            .iter()
            .map(|&v| if v != 0 { 255u8 } else { 0 })
            .collect();
        Image::from_vec(w, h, data).unwrap_or_else(|_| Image::new_fill(w, h, 0))
    }

    fn ensure_dims(&mut self, w: usize, h: usize) {
        if self.src.width() != w || self.src.height() != h {
            self.src = Image::new_fill(w, h, 0.0);
            self.gx = Image::new_fill(w, h, 0.0);
            self.gy = Image::new_fill(w, h, 0.0);
            self.mag = Image::new_fill(w, h, 0.0);
            self.nms = Image::new_fill(w, h, 0.0);
        }

        let n = w.saturating_mul(h);
        if self.weak.len() != n {
            self.weak = vec![0; n];
            self.visited = vec![0; n];
        }
    }

    fn compute_gradient(&mut self, cfg: &CannyConfig) {
        let w = self.src.width();
        let h = self.src.height();
        let src = self.src.data();

        let gx = self.gx.data_mut();
        let gy = self.gy.data_mut();
        let mag = self.mag.data_mut();

        for y in 0..h {
            let ym1 = y.saturating_sub(1);
            let yp1 = (y + 1).min(h - 1);
            for x in 0..w {
                let xm1 = x.saturating_sub(1);
                let xp1 = (x + 1).min(w - 1);

                let p00 = src[ym1 * w + xm1];
                let p01 = src[ym1 * w + x];
                let p02 = src[ym1 * w + xp1];
                let p10 = src[y * w + xm1];
                let p12 = src[y * w + xp1];
                let p20 = src[yp1 * w + xm1];
                let p21 = src[yp1 * w + x];
                let p22 = src[yp1 * w + xp1];

                let gxx = (p02 + 2.0 * p12 + p22) - (p00 + 2.0 * p10 + p20);
                let gyy = (p20 + 2.0 * p21 + p22) - (p00 + 2.0 * p01 + p02);

                let idx = y * w + x;
                gx[idx] = gxx;
                gy[idx] = gyy;
                mag[idx] = if cfg.l2_gradient {
                    (gxx * gxx + gyy * gyy).sqrt()
                } else {
                    gxx.abs() + gyy.abs()
                };
            }
        }
    }

    fn non_max_suppression(&mut self) {
        let w = self.src.width();
        let h = self.src.height();
        let gx = self.gx.data();
        let gy = self.gy.data();
        let mag = self.mag.data();
        let nms = self.nms.data_mut();

        nms.fill(0.0);
        if w < 3 || h < 3 {
            return;
        }

        const TAN22_5: f32 = 0.414_213_57;
        const TAN67_5: f32 = 2.414_213_7;

        for y in 1..(h - 1) {
            for x in 1..(w - 1) {
                let idx = y * w + x;
                let m = mag[idx];
                if m <= 0.0 {
                    continue;
                }

                let gxx = gx[idx];
                let gyy = gy[idx];
                let ax = gxx.abs();
                let ay = gyy.abs();

                let (i1, i2) = if ay <= ax * TAN22_5 {
                    (idx - 1, idx + 1)
                } else if ay >= ax * TAN67_5 {
                    (idx - w, idx + w)
                } else if gxx * gyy > 0.0 {
                    (idx - w - 1, idx + w + 1)
                } else {
                    (idx - w + 1, idx + w - 1)
                };

                // Strict on one side so plateaus of equal magnitude yield a
                // single-pixel ridge.
                if m > mag[i1] && m >= mag[i2] {
                    nms[idx] = m;
                }
            }
        }
    }

    fn hysteresis(&mut self, cfg: &CannyConfig) -> usize {
        let w = self.src.width();
        let h = self.src.height();

        self.weak.fill(0);
        self.visited.fill(0);
        self.stack.clear();

        let mut low = cfg.low_thresh;
        let mut high = cfg.high_thresh;
        if high < low {
            core::mem::swap(&mut high, &mut low);
        }

        for (idx, &v) in self.nms.data().iter().enumerate() {
            if v <= 0.0 {
                continue;
            }
            if v > low {
                self.weak[idx] = 1;
            }
            if v > high {
                self.visited[idx] = 1;
                self.stack.push(idx);
            }
        }

        let mut count = self.stack.len();

        while let Some(idx) = self.stack.pop() {
            let x = idx % w;
            let y = idx / w;

            let y0 = y.saturating_sub(1);
            let y1 = (y + 1).min(h - 1);
            let x0 = x.saturating_sub(1);
            let x1 = (x + 1).min(w - 1);

            for ny in y0..=y1 {
                for nx in x0..=x1 {
                    let nidx = ny * w + nx;
                    if self.visited[nidx] == 0 && self.weak[nidx] != 0 {
                        self.visited[nidx] = 1;
                        self.stack.push(nidx);
                        count += 1;
                    }
                }
            }
        }

        count
    }
}

impl Default for CannyDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use sm_core::Image;

    use crate::canny::{CannyConfig, CannyDetector};
    use crate::conv::gaussian_blur_f32;
    use crate::kernels::GaussianKernel1D;

    fn blurred_square(w: usize, h: usize, x0: usize, x1: usize) -> Image<f32> {
        let mut data = vec![0.0f32; w * h];
        for y in x0..x1 {
            for x in x0..x1 {
                data[y * w + x] = 255.0;
            }
        }
        let img = Image::from_vec(w, h, data).expect("valid image");
        let k = GaussianKernel1D::from_ksize(5, 0.0);
        gaussian_blur_f32(&img.as_view(), &k)
    }

    fn edge_pixels(map: &Image<u8>) -> Vec<(usize, usize)> {
        let w = map.width();
        map.data()
            .iter()
            .enumerate()
            .filter(|(_, v)| **v != 0)
            .map(|(i, _)| (i % w, i / w))
            .collect()
    }

    #[test]
    fn square_outline_is_thin_and_on_boundary() {
        let img = blurred_square(64, 64, 16, 48);
        let mut det = CannyDetector::new();
        let map = det.detect(&img.as_view(), &CannyConfig::default());
        let px = edge_pixels(&map);

        assert!(px.len() > 100);
        for &(x, y) in &px {
            let dx = (x as isize - 15).abs().min((x as isize - 48).abs());
            let dy = (y as isize - 15).abs().min((y as isize - 48).abs());
            assert!(dx <= 1 || dy <= 1, "edge pixel ({x}, {y}) off the boundary");
        }

        // Thin: along the middle row exactly one pixel per side.
        let row: Vec<usize> = px.iter().filter(|p| p.1 == 32).map(|p| p.0).collect();
        assert_eq!(row.len(), 2, "row 32 edges: {row:?}");
    }

    #[test]
    fn flat_and_empty_inputs_have_no_edges() {
        let mut det = CannyDetector::new();
        let flat = Image::new_fill(16, 16, 255.0f32);
        let map = det.detect(&flat.as_view(), &CannyConfig::default());
        assert!(map.data().iter().all(|&v| v == 0));

        let empty = Image::new_fill(0, 0, 0.0f32);
        let map = det.detect(&empty.as_view(), &CannyConfig::default());
        assert_eq!(map.width(), 0);
    }

    #[test]
    fn threshold_levels_affect_edge_count() {
        let img = blurred_square(48, 48, 12, 36);
        let mut det = CannyDetector::new();

        let lo = det.detect(&img.as_view(), &CannyConfig::default());
        let hi = det.detect(
            &img.as_view(),
            &CannyConfig {
                low_thresh: 1.0e9,
                high_thresh: 1.0e9,
                ..CannyConfig::default()
            },
        );
        let l2 = det.detect(
            &img.as_view(),
            &CannyConfig {
                l2_gradient: true,
                ..CannyConfig::default()
            },
        );

        let count = |m: &Image<u8>| m.data().iter().filter(|&&v| v != 0).count();
        assert!(count(&lo) > 0);
        assert_eq!(count(&hi), 0);
        assert!(count(&l2) > 0);
    }
}
