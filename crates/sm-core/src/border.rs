/// Maps a possibly out-of-range index onto `[0, len)` by reflect-101
/// mirroring (`gfedcb|abcdefgh|gfedcba`), the default border of common
/// Gaussian/Sobel implementations.
///
/// Returns `None` only for an empty axis.
pub fn reflect_101(i: isize, len: usize) -> Option<usize> {
    if len == 0 {
        return None;
    }
    if i >= 0 && (i as usize) < len {
        return Some(i as usize);
    }
    if len == 1 {
        return Some(0);
    }
    let period = (2 * len - 2) as isize;
    let r = i.rem_euclid(period) as usize;
    if r < len { Some(r) } else { Some(2 * len - 2 - r) }
}

#[cfg(test)]
mod tests {
    use super::reflect_101;

    #[test]
    fn in_range_indices_pass_through() {
        for i in 0..4isize {
            assert_eq!(reflect_101(i, 4), Some(i as usize));
        }
        assert_eq!(reflect_101(0, 0), None);
    }

    #[test]
    fn mirrors_without_repeating_edge() {
        // 5x5 Gaussian footprint on a 4-pixel row: radius 2 on both sides.
        assert_eq!(reflect_101(-2, 4), Some(2));
        assert_eq!(reflect_101(-1, 4), Some(1));
        assert_eq!(reflect_101(4, 4), Some(2));
        assert_eq!(reflect_101(5, 4), Some(1));
        // Footprints wider than the row fold more than once.
        assert_eq!(reflect_101(-7, 4), Some(1));
        for i in -3..=3 {
            assert_eq!(reflect_101(i, 1), Some(0));
        }
    }
}
