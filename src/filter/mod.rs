//! Barndorff-Nielsen style outlier filter for daily spread series.
//!
//! For a date-ordered series `x` and half-width `w` (full window `2w + 1` rows):
//!
//! 1. `med = lag(rolling_median(x), 1)`
//! 2. `dev = |x - med|`
//! 3. `mad = lag(rolling_mean(dev), 1)`
//! 4. outlier if `dev / mad >= threshold`
//!
//! Both rolling statistics are centered with `min_periods = 1`. The one-row lag
//! keeps each reference level from being computed around the point it judges.
//! Missing observations are never outliers.
//!
//! Ratio edge cases follow IEEE arithmetic: `dev > 0` over `mad = 0` is `+inf`
//! (an outlier), `0 / 0` is NaN (not an outlier).

use crate::domain::FilterParams;
use crate::math::{lag, rolling_mean_centered, rolling_median_centered};

/// Filter output, aligned index-for-index with the input series.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterOutcome {
    /// Input with outliers replaced by `None`.
    pub filtered: Vec<Option<f64>>,
    pub is_outlier: Vec<bool>,
    /// Lagged rolling median used as each point's reference level.
    pub reference: Vec<Option<f64>>,
    /// Lagged rolling mean absolute deviation.
    pub dispersion: Vec<Option<f64>>,
}

impl FilterOutcome {
    pub fn outlier_count(&self) -> usize {
        self.is_outlier.iter().filter(|&&b| b).count()
    }
}

pub fn barndorff_nielsen_filter(values: &[Option<f64>], params: &FilterParams) -> FilterOutcome {
    let half = params.window;

    let reference = lag(&rolling_median_centered(values, half, 1), 1);

    let abs_dev: Vec<Option<f64>> = values
        .iter()
        .zip(&reference)
        .map(|(x, m)| Some((x.as_ref()? - m.as_ref()?).abs()))
        .collect();

    let dispersion = lag(&rolling_mean_centered(&abs_dev, half, 1), 1);

    let is_outlier: Vec<bool> = abs_dev
        .iter()
        .zip(&dispersion)
        .zip(values)
        .map(|((dev, mad), x)| match (x, dev, mad) {
            (Some(_), Some(dev), Some(mad)) => dev / mad >= params.threshold,
            _ => false,
        })
        .collect();

    let filtered = values
        .iter()
        .zip(&is_outlier)
        .map(|(x, &bad)| if bad { None } else { *x })
        .collect();

    FilterOutcome {
        filtered,
        is_outlier,
        reference,
        dispersion,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spike_series(n: usize, level: f64, spike_at: usize, spike: f64) -> Vec<Option<f64>> {
        (0..n)
            .map(|i| Some(if i == spike_at { spike } else { level }))
            .collect()
    }

    #[test]
    fn central_spike_is_the_only_outlier() {
        let series = spike_series(91, 0.25, 45, 25.0);
        let out = barndorff_nielsen_filter(&series, &FilterParams::default());

        assert!(out.is_outlier[45], "spike should be flagged");
        assert_eq!(out.outlier_count(), 1);
        assert_eq!(out.filtered[45], None);
        assert_eq!(out.filtered[44], Some(0.25));

        // The dispersion at the spike is its deviation spread over the 89 lagged rows.
        let mad = out.dispersion[45].unwrap();
        let dev = (25.0_f64 - 0.25).abs();
        assert!((dev / mad - 89.0).abs() < 1e-9, "ratio was {}", dev / mad);
    }

    #[test]
    fn refiltering_a_filtered_series_flags_nothing() {
        let series = spike_series(91, -0.4, 45, 12.0);
        let params = FilterParams::default();
        let first = barndorff_nielsen_filter(&series, &params);
        assert_eq!(first.outlier_count(), 1);

        let second = barndorff_nielsen_filter(&first.filtered, &params);
        assert_eq!(second.outlier_count(), 0);
        assert_eq!(second.filtered, first.filtered);
    }

    #[test]
    fn missing_values_are_never_outliers() {
        let mut series = spike_series(21, 1.0, 10, 50.0);
        series[3] = None;
        series[10] = None;
        let out = barndorff_nielsen_filter(&series, &FilterParams { window: 5, threshold: 10.0 });
        assert!(!out.is_outlier[3]);
        assert!(!out.is_outlier[10]);
        assert_eq!(out.outlier_count(), 0);
    }

    #[test]
    fn first_row_has_no_reference_and_is_kept() {
        let series = vec![Some(100.0), Some(0.0), Some(0.0)];
        let out = barndorff_nielsen_filter(&series, &FilterParams::default());
        assert_eq!(out.reference[0], None);
        assert!(!out.is_outlier[0]);
        assert_eq!(out.filtered[0], Some(100.0));
    }

    #[test]
    fn short_series_still_runs() {
        let series = vec![Some(0.1), Some(0.2)];
        let out = barndorff_nielsen_filter(&series, &FilterParams::default());
        assert_eq!(out.filtered.len(), 2);
        assert_eq!(out.outlier_count(), 0);
        assert!(barndorff_nielsen_filter(&[], &FilterParams::default()).filtered.is_empty());
    }

    #[test]
    fn threshold_scale_matters() {
        // A moderate jump: flagged at threshold 3 but not at threshold 30.
        let mut series: Vec<Option<f64>> = (0..41).map(|i| Some(if i % 2 == 0 { 0.1 } else { 0.2 })).collect();
        series[20] = Some(1.5);
        let loose = barndorff_nielsen_filter(&series, &FilterParams { window: 10, threshold: 30.0 });
        let tight = barndorff_nielsen_filter(&series, &FilterParams { window: 10, threshold: 3.0 });
        assert!(!loose.is_outlier[20]);
        assert!(tight.is_outlier[20]);
    }
}
