//! Order statistics over coordinate samples.

/// Median with the even-count convention of averaging the two middle values.
///
/// Returns `None` for an empty input.
pub fn median(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let mut v: Vec<f64> = values.into_iter().collect();
    let n = v.len();
    if n == 0 {
        return None;
    }

    let mid = n / 2;
    let (lower, upper, _) = v.select_nth_unstable_by(mid, f64::total_cmp);
    let upper = *upper;
    if n % 2 == 1 {
        return Some(upper);
    }

    let lower_max = lower.iter().copied().max_by(f64::total_cmp)?;
    Some(0.5 * (lower_max + upper))
}

/// Arithmetic mean; `None` for an empty input.
pub fn mean(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let mut sum = 0.0;
    let mut n = 0usize;
    for v in values {
        sum += v;
        n += 1;
    }
    (n > 0).then(|| sum / n as f64)
}
