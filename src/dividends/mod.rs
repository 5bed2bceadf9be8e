//! Cumulative dividend series and as-of dividend sums.
//!
//! The expected dividend between an observation date `t` and a settlement
//! date `T` is read off a running sum of daily dividends:
//!
//! `Div_Sum(t, T) = CumDiv(T) - CumDiv(t)`
//!
//! where `CumDiv(q)` is the cumulative value at the latest dividend date `<= q`
//! (settlement dates often fall on days with no dividend row, e.g. weekends).

use chrono::NaiveDate;

use crate::domain::DividendRecord;
use crate::math::asof_lookup;

/// Running dividend total, keyed by date.
#[derive(Debug, Clone, Default)]
pub struct CumulativeDividends {
    points: Vec<(NaiveDate, f64)>,
}

impl CumulativeDividends {
    /// Build the running sum. Records are ordered by date first; missing or
    /// negative daily values are expected to have been zeroed at ingest.
    pub fn from_records(records: &[DividendRecord]) -> Self {
        let mut sorted = records.to_vec();
        sorted.sort_by_key(|r| r.date);

        let mut total = 0.0;
        let points = sorted
            .into_iter()
            .map(|r| {
                total += r.daily_dividend;
                (r.date, total)
            })
            .collect();

        Self { points }
    }

    pub fn points(&self) -> &[(NaiveDate, f64)] {
        &self.points
    }

    /// `CumDiv(q)`; `None` when `q` precedes every dividend date.
    pub fn as_of(&self, query: NaiveDate) -> Option<f64> {
        asof_lookup(&self.points, query, |p| p.0).map(|p| p.1)
    }
}

/// The three cumulative values one contract row needs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DividendLegs {
    pub cum_current: f64,
    pub cum_term1: f64,
    pub cum_term2: f64,
}

impl DividendLegs {
    pub fn resolve(
        dividends: &CumulativeDividends,
        observation: NaiveDate,
        term1_settlement: NaiveDate,
        term2_settlement: NaiveDate,
    ) -> Option<Self> {
        Some(Self {
            cum_current: dividends.as_of(observation)?,
            cum_term1: dividends.as_of(term1_settlement)?,
            cum_term2: dividends.as_of(term2_settlement)?,
        })
    }

    pub fn div_sum1(&self) -> f64 {
        self.cum_term1 - self.cum_current
    }

    pub fn div_sum2(&self) -> f64 {
        self.cum_term2 - self.cum_current
    }
}
