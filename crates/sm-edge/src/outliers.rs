use kiddo::{ImmutableKdTree, SquaredEuclidean};
use serde::{Deserialize, Serialize};

use crate::extract::EdgePixel;

/// Density filter for edge pixels: a pixel survives if at least
/// `min_neighbors` other pixels lie within `radius_px` of it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RadiusOutlierConfig {
    pub radius_px: f64,
    pub min_neighbors: usize,
}

impl Default for RadiusOutlierConfig {
    fn default() -> Self {
        Self {
            radius_px: 5.0,
            min_neighbors: 3,
        }
    }
}

pub fn remove_radius_outliers(pixels: &[EdgePixel], cfg: &RadiusOutlierConfig) -> Vec<EdgePixel> {
    if pixels.is_empty() {
        return Vec::new();
    }

    let entries: Vec<[f64; 2]> = pixels
        .iter()
        .map(|p| [p.col as f64, p.row as f64])
        .collect();
    let tree: ImmutableKdTree<f64, 2> = ImmutableKdTree::new_from_slice(&entries);
    let r2 = cfg.radius_px * cfg.radius_px;

    let kept: Vec<EdgePixel> = pixels
        .iter()
        .zip(&entries)
        .filter(|(_, q)| {
            // The query pixel itself is always returned.
            let found = tree.within_unsorted::<SquaredEuclidean>(q, r2).len();
            found.saturating_sub(1) >= cfg.min_neighbors
        })
        .map(|(p, _)| *p)
        .collect();

    log::debug!(
        "radius outlier filter kept {}/{} edge pixels",
        kept.len(),
        pixels.len()
    );
    kept
}

#[cfg(test)]
mod tests {
    use crate::extract::EdgePixel;
    use crate::outliers::{RadiusOutlierConfig, remove_radius_outliers};

    #[test]
    fn isolated_pixels_are_removed() {
        let mut pixels: Vec<EdgePixel> = (0..20).map(|c| EdgePixel { row: 10, col: c }).collect();
        pixels.push(EdgePixel { row: 100, col: 100 });
        pixels.push(EdgePixel { row: 101, col: 100 });

        let kept = remove_radius_outliers(&pixels, &RadiusOutlierConfig::default());
        assert_eq!(kept.len(), 20);
        assert!(kept.iter().all(|p| p.row == 10));
    }

    #[test]
    fn neighbour_count_threshold_is_inclusive() {
        let pixels: Vec<EdgePixel> = (0..4).map(|c| EdgePixel { row: 0, col: c * 2 }).collect();
        let cfg = RadiusOutlierConfig {
            radius_px: 7.0,
            min_neighbors: 3,
        };
        // Every pixel sees the other three within 6 px.
        assert_eq!(remove_radius_outliers(&pixels, &cfg).len(), 4);
        assert!(remove_radius_outliers(&[], &cfg).is_empty());
    }
}
