//! Minimal binary morphology helpers.
//!
//! Pixels are treated as binary with threshold `> 0`.
//! Outputs are `0` or `255` in `u8`.
//!
//! The structuring element is a discrete disk: offset `(dx, dy)` belongs to
//! the disk of radius `r` iff `dx^2 + dy^2 <= r^2`. Radius `0` is the single
//! centre pixel, radius `1` the 4-connected cross.

use sm_core::{Image, ImageView};

/// Offsets of the disk structuring element, row-major.
pub fn disk_offsets(radius: usize) -> Vec<(isize, isize)> {
    let r = radius as isize;
    let r2 = r * r;
    let mut out = Vec::with_capacity((2 * radius + 1).pow(2));
    for dy in -r..=r {
        for dx in -r..=r {
            if dx * dx + dy * dy <= r2 {
                out.push((dx, dy));
            }
        }
    }
    out
}

/// Sets every pixel of the disk centred at `(cx, cy)` to `255`, clipped to
/// the image.
pub fn stamp_disk_u8(img: &mut Image<u8>, cx: usize, cy: usize, offsets: &[(isize, isize)]) {
    let (w, h) = (img.width() as isize, img.height() as isize);
    for &(dx, dy) in offsets {
        let x = cx as isize + dx;
        let y = cy as isize + dy;
        if x < 0 || y < 0 || x >= w || y >= h {
            continue;
        }
        if let Some(px) = img.get_mut(x as usize, y as usize) {
            *px = 255;
        }
    }
}

/// Dilation by a disk of `radius` pixels.
///
/// Implemented as a scatter over set pixels, which is cheap for the sparse
/// dot patterns produced by point rasterization.
pub fn dilate_disk_binary_u8(src: &ImageView<'_, u8>, radius: usize) -> Image<u8> {
    let mut out = Image::new_fill(src.width(), src.height(), 0u8);
    if src.width() == 0 || src.height() == 0 {
        return out;
    }

    let offsets = disk_offsets(radius);
    for y in 0..src.height() {
        for (x, &v) in src.row(y).iter().enumerate() {
            if v != 0 {
                stamp_disk_u8(&mut out, x, y, &offsets);
            }
        }
    }

    out
}

/// Erosion by a disk of `radius` pixels. Pixels whose disk leaves the image
/// are cleared.
pub fn erode_disk_binary_u8(src: &ImageView<'_, u8>, radius: usize) -> Image<u8> {
    let mut out = Image::new_fill(src.width(), src.height(), 0u8);
    if src.width() == 0 || src.height() == 0 {
        return out;
    }

    let offsets = disk_offsets(radius);
    for y in 0..src.height() {
        for x in 0..src.width() {
            let all_set = offsets.iter().all(|&(dx, dy)| {
                let nx = x as isize + dx;
                let ny = y as isize + dy;
                nx >= 0
                    && ny >= 0
                    && src
                        .get(nx as usize, ny as usize)
                        .is_some_and(|&v| v != 0)
            });
            if all_set && let Some(px) = out.get_mut(x, y) {
                *px = 255;
            }
        }
    }

    out
}

/// Closing (dilate, then erode) with the same disk. Bridges gaps narrower
/// than the disk diameter between neighbouring dots.
pub fn close_disk_binary_u8(src: &ImageView<'_, u8>, radius: usize) -> Image<u8> {
    let dilated = dilate_disk_binary_u8(src, radius);
    erode_disk_binary_u8(&dilated.as_view(), radius)
}
