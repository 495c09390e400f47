use sm_core::{Image, ImageView, reflect_101};

use crate::kernels::GaussianKernel1D;

/// Correlates `signal` with a symmetric `kernel` of length `2*radius+1`,
/// reading past either end with reflect-101.
pub fn convolve_f32(signal: &[f32], kernel: &[f32], radius: usize, out: &mut [f32]) {
    assert_eq!(out.len(), signal.len(), "out must match signal length");
    assert_eq!(
        kernel.len(),
        2 * radius + 1,
        "kernel len must be 2*radius+1"
    );

    let n = signal.len();
    if n == 0 {
        return;
    }

    // Interior samples have their whole footprint in range.
    let interior = radius..n.saturating_sub(radius);
    for (i, out_i) in out.iter_mut().enumerate() {
        let mut acc = 0.0f32;
        if interior.contains(&i) {
            let base = i - radius;
            for (k, &kv) in kernel.iter().enumerate() {
                acc += signal[base + k] * kv;
            }
        } else {
            for (k, &kv) in kernel.iter().enumerate() {
                let idx = i as isize + k as isize - radius as isize;
                if let Some(j) = reflect_101(idx, n) {
                    acc += signal[j] * kv;
                }
            }
        }
        *out_i = acc;
    }
}

/// Separable Gaussian blur (rows first, then columns).
pub fn gaussian_blur_f32(src: &ImageView<'_, f32>, kernel: &GaussianKernel1D) -> Image<f32> {
    let (w, h) = (src.width(), src.height());
    let mut tmp = Image::new_fill(w, h, 0.0f32);
    if w == 0 || h == 0 {
        return tmp;
    }

    {
        let dst = tmp.data_mut();
        for y in 0..h {
            convolve_f32(src.row(y), &kernel.g, kernel.radius, &mut dst[y * w..(y + 1) * w]);
        }
    }

    let mut out = Image::new_fill(w, h, 0.0f32);
    let mut col = vec![0.0f32; h];
    let mut col_out = vec![0.0f32; h];
    let tmp_data = tmp.data();
    let dst = out.data_mut();
    for x in 0..w {
        for (y, c) in col.iter_mut().enumerate() {
            *c = tmp_data[y * w + x];
        }
        convolve_f32(&col, &kernel.g, kernel.radius, &mut col_out);
        for (y, &v) in col_out.iter().enumerate() {
            dst[y * w + x] = v;
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use sm_core::Image;

    use crate::conv::{convolve_f32, gaussian_blur_f32};
    use crate::kernels::GaussianKernel1D;

    #[test]
    fn convolve_matches_expected_identity() {
        let signal = [1.0f32, 2.0, 3.0, 4.0];
        let kernel = [1.0f32];
        let mut out = vec![0.0f32; signal.len()];
        convolve_f32(&signal, &kernel, 0, &mut out);
        assert_eq!(&out, &signal);
    }

    #[test]
    fn convolve_reflects_at_borders() {
        let signal = [1.0f32, 2.0, 3.0];
        let kernel = [1.0f32, 1.0, 1.0];
        let mut out = vec![0.0f32; signal.len()];

        // 2|1 2 3|2
        convolve_f32(&signal, &kernel, 1, &mut out);
        assert_eq!(out, vec![5.0, 6.0, 7.0]);

        // Radius wider than the signal: 2 3 2|1 2 3|2 1 2
        let kernel = [1.0f32; 7];
        convolve_f32(&signal, &kernel, 3, &mut out);
        assert_eq!(out, vec![15.0, 14.0, 13.0]);
    }

    #[test]
    fn blur_preserves_mass_and_flat_regions() {
        let (w, h) = (9usize, 7usize);
        let mut data = vec![0.0f32; w * h];
        data[3 * w + 4] = 255.0;
        let img = Image::from_vec(w, h, data).expect("valid image");
        let k = GaussianKernel1D::from_ksize(5, 0.0);

        let out = gaussian_blur_f32(&img.as_view(), &k);
        let sum: f32 = out.data().iter().sum();
        assert_abs_diff_eq!(sum, 255.0, epsilon = 1e-2);
        assert!(out.data()[3 * w + 4] > out.data()[3 * w + 5]);
        assert_eq!(out.data()[0], 0.0);

        let flat = Image::new_fill(5, 5, 10.0f32);
        let out = gaussian_blur_f32(&flat.as_view(), &k);
        for &v in out.data() {
            assert_abs_diff_eq!(v, 10.0, epsilon = 1e-4);
        }
    }
}
