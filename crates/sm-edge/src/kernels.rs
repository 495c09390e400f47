/// Sampled, normalized 1D Gaussian kernel.
///
/// Conventions:
/// - `ksize` is odd, `radius = ksize / 2`.
/// - `sigma <= 0` selects the sigma from the kernel size,
///   `sigma = 0.3 * ((ksize - 1) * 0.5 - 1) + 0.8`, the rule common image
///   libraries apply for "auto" sigma.
/// - `g` is normalized such that `sum(g) ~= 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct GaussianKernel1D {
    pub sigma: f32,
    pub radius: usize,
    pub g: Vec<f32>,
}

impl GaussianKernel1D {
    /// Builds a kernel of `ksize` taps. Even sizes are bumped to the next odd
    /// size; `ksize` 0 or 1 is the identity.
    pub fn from_ksize(ksize: usize, sigma: f32) -> Self {
        let ksize = if ksize % 2 == 0 { ksize + 1 } else { ksize };
        let radius = ksize / 2;

        let sigma = if sigma.is_finite() && sigma > 0.0 {
            sigma
        } else {
            auto_sigma(ksize)
        };

        if radius == 0 {
            return Self {
                sigma,
                radius,
                g: vec![1.0],
            };
        }

        let sigma2 = sigma * sigma;
        let mut g = vec![0.0f32; ksize];
        for (i, gi) in g.iter_mut().enumerate() {
            let xf = (i as isize - radius as isize) as f32;
            *gi = (-(xf * xf) / (2.0 * sigma2)).exp();
        }

        let sum_g: f32 = g.iter().sum();
        for gi in &mut g {
            *gi /= sum_g;
        }

        Self { sigma, radius, g }
    }
}

fn auto_sigma(ksize: usize) -> f32 {
    0.3 * ((ksize as f32 - 1.0) * 0.5 - 1.0) + 0.8
}
