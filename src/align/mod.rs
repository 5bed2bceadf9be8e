//! Put several independently dated series on one calendar.
//!
//! Each index rolls its futures on its own schedule, so observation dates
//! differ slightly between indices. The aligner builds the sorted union of all
//! dates, carries each series' last known value forward onto it (no
//! interpolation), and finally keeps only the requested window.

use std::collections::BTreeSet;

use chrono::NaiveDate;

use crate::domain::IndexCode;

/// A date-ordered series with possibly missing values.
pub type DatedSeries = Vec<(NaiveDate, Option<f64>)>;

/// Series aligned on a shared calendar.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedSeries {
    pub dates: Vec<NaiveDate>,
    /// One column per input series, same length as `dates`.
    pub columns: Vec<(IndexCode, Vec<Option<f64>>)>,
}

impl AlignedSeries {
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn column(&self, index: IndexCode) -> Option<&[Option<f64>]> {
        self.columns
            .iter()
            .find(|(code, _)| *code == index)
            .map(|(_, values)| values.as_slice())
    }

    /// `(min, max)` over all present values.
    pub fn value_range(&self) -> Option<(f64, f64)> {
        self.columns
            .iter()
            .flat_map(|(_, values)| values.iter().flatten())
            .fold(None, |acc, &v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }
}

/// Forward-fill every series onto the union of their dates, then keep `[start, end]`.
pub fn align_forward_fill(series: &[(IndexCode, DatedSeries)], start: NaiveDate, end: NaiveDate) -> AlignedSeries {
    let calendar: BTreeSet<NaiveDate> = series
        .iter()
        .flat_map(|(_, points)| points.iter().map(|(d, _)| *d))
        .collect();

    let columns = series
        .iter()
        .map(|(index, points)| {
            let mut sorted = points.clone();
            sorted.sort_by_key(|(d, _)| *d);
            let filled = forward_fill_onto(&sorted, &calendar);
            let windowed = calendar
                .iter()
                .zip(filled)
                .filter(|(d, _)| **d >= start && **d <= end)
                .map(|(_, v)| v)
                .collect();
            (*index, windowed)
        })
        .collect();

    let dates = calendar.into_iter().filter(|d| *d >= start && *d <= end).collect();

    AlignedSeries { dates, columns }
}

fn forward_fill_onto(sorted: &[(NaiveDate, Option<f64>)], calendar: &BTreeSet<NaiveDate>) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(calendar.len());
    let mut next = 0;
    let mut last = None;
    for date in calendar {
        while next < sorted.len() && sorted[next].0 <= *date {
            if let Some(v) = sorted[next].1 {
                last = Some(v);
            }
            next += 1;
        }
        out.push(last);
    }
    out
}
