//! Centered rolling statistics over series with missing values.
//!
//! Conventions (shared by every function here):
//!
//! - the window at position `i` covers `[i - half, i + half]`, clipped to the series
//! - missing values (`None`) are skipped, not treated as zero
//! - a window yields a value only if it holds at least `min_periods` present values
//!
//! Near the series boundaries the window is simply narrower, so short series
//! still produce output instead of failing.

/// Inclusive `(lo, hi)` bounds of the centered window at `i`.
pub fn centered_bounds(i: usize, len: usize, half: usize) -> (usize, usize) {
    let lo = i.saturating_sub(half);
    let hi = (i + half).min(len.saturating_sub(1));
    (lo, hi)
}

/// Centered rolling median.
pub fn rolling_median_centered(values: &[Option<f64>], half: usize, min_periods: usize) -> Vec<Option<f64>> {
    let mut scratch = Vec::with_capacity(half * 2 + 1);
    (0..values.len())
        .map(|i| {
            let (lo, hi) = centered_bounds(i, values.len(), half);
            scratch.clear();
            scratch.extend(values[lo..=hi].iter().flatten().copied().filter(|v| !v.is_nan()));
            if scratch.len() < min_periods.max(1) {
                return None;
            }
            scratch.sort_by(f64::total_cmp);
            Some(median_of_sorted(&scratch))
        })
        .collect()
}

/// Centered rolling arithmetic mean.
pub fn rolling_mean_centered(values: &[Option<f64>], half: usize, min_periods: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| {
            let (lo, hi) = centered_bounds(i, values.len(), half);
            let (sum, n) = values[lo..=hi]
                .iter()
                .flatten()
                .filter(|v| !v.is_nan())
                .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
            if n < min_periods.max(1) {
                None
            } else {
                Some(sum / n as f64)
            }
        })
        .collect()
}

/// Shift a series forward by `periods`: position `i` takes the value at `i - periods`.
///
/// The first `periods` positions become missing.
pub fn lag(values: &[Option<f64>], periods: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| if i < periods { None } else { values[i - periods] })
        .collect()
}

fn median_of_sorted(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        0.5 * (sorted[n / 2 - 1] + sorted[n / 2])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn some(v: &[f64]) -> Vec<Option<f64>> {
        v.iter().copied().map(Some).collect()
    }

    #[test]
    fn bounds_clip_at_edges() {
        assert_eq!(centered_bounds(0, 10, 3), (0, 3));
        assert_eq!(centered_bounds(5, 10, 3), (2, 8));
        assert_eq!(centered_bounds(9, 10, 3), (6, 9));
        assert_eq!(centered_bounds(0, 1, 45), (0, 0));
    }

    #[test]
    fn median_uses_narrower_window_near_edges() {
        let v = some(&[1.0, 5.0, 2.0, 8.0, 3.0]);
        let m = rolling_median_centered(&v, 1, 1);
        // [1,5] -> 3, [1,5,2] -> 2, [5,2,8] -> 5, [2,8,3] -> 3, [8,3] -> 5.5
        assert_eq!(m, vec![Some(3.0), Some(2.0), Some(5.0), Some(3.0), Some(5.5)]);
    }

    #[test]
    fn missing_values_are_skipped() {
        let v = vec![Some(1.0), None, Some(3.0), None];
        let mean = rolling_mean_centered(&v, 1, 1);
        assert_eq!(mean, vec![Some(1.0), Some(2.0), Some(3.0), Some(3.0)]);

        let all_missing = vec![None, None];
        assert_eq!(rolling_median_centered(&all_missing, 1, 1), vec![None, None]);
    }

    #[test]
    fn lag_shifts_forward() {
        let v = some(&[1.0, 2.0, 3.0]);
        assert_eq!(lag(&v, 1), vec![None, Some(1.0), Some(2.0)]);
        assert_eq!(lag(&v, 5), vec![None, None, None]);
    }
}
