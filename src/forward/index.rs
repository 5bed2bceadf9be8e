//! Per-index forward-rate series: as-of joins, row computation, outlier filtering.
//!
//! Pipeline for one index:
//!
//! contracts -> as-of short rate -> as-of cumulative dividends (t, T1, T2)
//! -> `compute_forward` -> outlier filter on the spread (percentage points)
//! -> null `cal_rf` + spread for outliers -> scale spread to bps
//!
//! The bps scaling must happen after filtering; the filter threshold is
//! calibrated on percentage-point spreads.

use serde::Serialize;
use tracing::{debug, warn};

use crate::dividends::{CumulativeDividends, DividendLegs};
use crate::domain::{ContractObservation, FilterParams, ForwardRateRow, IndexCode, ShortRateObservation};
use crate::filter::barndorff_nielsen_filter;
use crate::forward::{ForwardInputs, ForwardQuote, compute_forward};
use crate::math::asof_lookup;

/// Percentage points to basis points.
pub const BPS_PER_PERCENT: f64 = 100.0;

/// Row accounting for one index computation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JoinDiagnostics {
    pub rows_in: usize,
    /// Missing price or TTM on either leg.
    pub dropped_missing_inputs: usize,
    /// No short-rate fixing on or before the observation date.
    pub dropped_missing_short_rate: usize,
    /// Missing settlement date, or a reference date before the dividend history.
    pub dropped_missing_dividends: usize,
    /// `TTM_2 <= TTM_1` or a non-finite result.
    pub dropped_undefined: usize,
    /// Joined rows whose short-rate fixing is older than the stale threshold.
    pub stale_short_rate_joins: usize,
    pub max_short_rate_lag_days: i64,
    pub outliers: usize,
}

impl JoinDiagnostics {
    pub fn rows_dropped(&self) -> usize {
        self.dropped_missing_inputs
            + self.dropped_missing_short_rate
            + self.dropped_missing_dividends
            + self.dropped_undefined
    }
}

/// Computed forward-rate series for one index.
#[derive(Debug, Clone)]
pub struct IndexForwardRates {
    pub index: IndexCode,
    pub rows: Vec<ForwardRateRow>,
    pub diagnostics: JoinDiagnostics,
}

impl IndexForwardRates {
    /// `(date, spread_bps)` pairs, outliers included as `None`.
    pub fn spread_series(&self) -> Vec<(chrono::NaiveDate, Option<f64>)> {
        self.rows.iter().map(|r| (r.date(), r.spread_bps)).collect()
    }
}

/// Stage settings for `compute_index_forward_rates`.
#[derive(Debug, Clone, Copy)]
pub struct ForwardSettings {
    pub filter: FilterParams,
    pub stale_after_days: i64,
}

struct JoinedRow {
    observation: ContractObservation,
    short_rate: f64,
    lag_days: i64,
    legs: DividendLegs,
    quote: ForwardQuote,
}

/// Compute the forward-rate series for one index.
///
/// `short_rates` must be sorted by date. Contract rows are processed in date
/// order regardless of input order.
pub fn compute_index_forward_rates(
    index: IndexCode,
    contracts: &[ContractObservation],
    short_rates: &[ShortRateObservation],
    dividends: &CumulativeDividends,
    settings: &ForwardSettings,
) -> IndexForwardRates {
    let mut ordered: Vec<&ContractObservation> = contracts.iter().collect();
    ordered.sort_by_key(|c| c.date);

    let mut diagnostics = JoinDiagnostics {
        rows_in: ordered.len(),
        ..JoinDiagnostics::default()
    };

    let mut joined = Vec::with_capacity(ordered.len());
    for obs in ordered {
        let (Some(p1), Some(p2), Some(t1), Some(t2)) =
            (obs.term1_price, obs.term2_price, obs.term1_ttm, obs.term2_ttm)
        else {
            diagnostics.dropped_missing_inputs += 1;
            continue;
        };
        // TTM counts days forward from the observation.
        if t1 < 0 || t2 < 0 {
            diagnostics.dropped_missing_inputs += 1;
            continue;
        }

        let Some(fixing) = asof_lookup(short_rates, obs.date, |r| r.date) else {
            diagnostics.dropped_missing_short_rate += 1;
            continue;
        };
        let lag_days = (obs.date - fixing.date).num_days();

        let legs = match (obs.term1_settlement_date, obs.term2_settlement_date) {
            (Some(s1), Some(s2)) => DividendLegs::resolve(dividends, obs.date, s1, s2),
            _ => None,
        };
        let Some(legs) = legs else {
            diagnostics.dropped_missing_dividends += 1;
            continue;
        };

        let inputs = ForwardInputs {
            term1_price: p1,
            term2_price: p2,
            term1_ttm: t1,
            term2_ttm: t2,
            short_rate: fixing.rate,
            div_sum1: legs.div_sum1(),
            div_sum2: legs.div_sum2(),
        };
        let Some(quote) = compute_forward(&inputs) else {
            diagnostics.dropped_undefined += 1;
            continue;
        };

        if lag_days > settings.stale_after_days {
            diagnostics.stale_short_rate_joins += 1;
        }
        diagnostics.max_short_rate_lag_days = diagnostics.max_short_rate_lag_days.max(lag_days);

        joined.push(JoinedRow {
            observation: obs.clone(),
            short_rate: fixing.rate,
            lag_days,
            legs,
            quote,
        });
    }

    if diagnostics.stale_short_rate_joins > 0 {
        warn!(
            index = %index,
            stale = diagnostics.stale_short_rate_joins,
            max_lag_days = diagnostics.max_short_rate_lag_days,
            "short-rate as-of join reused old fixings"
        );
    }

    let rows = apply_outlier_filter(joined, &settings.filter, &mut diagnostics);
    debug!(index = %index, rows = rows.len(), outliers = diagnostics.outliers, "forward rates computed");

    IndexForwardRates {
        index,
        rows,
        diagnostics,
    }
}

fn apply_outlier_filter(
    joined: Vec<JoinedRow>,
    params: &FilterParams,
    diagnostics: &mut JoinDiagnostics,
) -> Vec<ForwardRateRow> {
    let spreads: Vec<Option<f64>> = joined.iter().map(|j| Some(j.quote.spread_pct)).collect();
    let outcome = barndorff_nielsen_filter(&spreads, params);
    diagnostics.outliers = outcome.outlier_count();

    joined
        .into_iter()
        .zip(outcome.filtered)
        .zip(outcome.is_outlier)
        .map(|((j, spread_filtered), is_outlier)| ForwardRateRow {
            observation: j.observation,
            short_rate: j.short_rate,
            short_rate_lag_days: j.lag_days,
            cum_div_current: j.legs.cum_current,
            cum_div_term1: j.legs.cum_term1,
            cum_div_term2: j.legs.cum_term2,
            div_sum1: j.legs.div_sum1(),
            div_sum2: j.legs.div_sum2(),
            div_sum1_comp: j.quote.div_sum1_comp,
            div_sum2_comp: j.quote.div_sum2_comp,
            implied_forward_raw: j.quote.implied_forward_raw,
            implied_forward_rate: if is_outlier { None } else { Some(j.quote.implied_forward_rate) },
            short_rate_forward_raw: j.quote.short_rate_forward_raw,
            short_rate_forward: j.quote.short_rate_forward,
            spread_filtered,
            spread_bps: spread_filtered.map(|s| s * BPS_PER_PERCENT),
            is_outlier,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DividendRecord;
    use chrono::{Duration, NaiveDate};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn contract(date: NaiveDate, p1: f64, p2: f64, t1: i64, t2: i64) -> ContractObservation {
        ContractObservation {
            date,
            term1_price: Some(p1),
            term2_price: Some(p2),
            term1_settlement_date: Some(date + Duration::days(t1)),
            term2_settlement_date: Some(date + Duration::days(t2)),
            term1_ttm: Some(t1),
            term2_ttm: Some(t2),
        }
    }

    fn flat_rates(from: NaiveDate, rate: f64) -> Vec<ShortRateObservation> {
        vec![ShortRateObservation { date: from, rate }]
    }

    fn zero_dividends(from: NaiveDate) -> CumulativeDividends {
        CumulativeDividends::from_records(&[DividendRecord {
            date: from,
            daily_dividend: 0.0,
        }])
    }

    fn settings() -> ForwardSettings {
        ForwardSettings {
            filter: FilterParams::default(),
            stale_after_days: 5,
        }
    }

    #[test]
    fn three_day_scenario_is_fully_computable() {
        let dates = [d(2024, 1, 2), d(2024, 1, 3), d(2024, 1, 4)];
        let p1 = [4000.0, 4010.0, 4020.0];
        let p2 = [4020.0, 4035.0, 4050.0];
        let t1 = [30, 29, 28];
        let t2 = [120, 119, 118];
        let contracts: Vec<_> = (0..3).map(|i| contract(dates[i], p1[i], p2[i], t1[i], t2[i])).collect();

        let out = compute_index_forward_rates(
            IndexCode::Spx,
            &contracts,
            &flat_rates(d(2024, 1, 1), 0.03),
            &zero_dividends(d(2023, 12, 29)),
            &settings(),
        );

        assert_eq!(out.rows.len(), 3);
        assert_eq!(out.diagnostics.rows_dropped(), 0);
        assert_eq!(out.diagnostics.outliers, 0);

        for (i, row) in out.rows.iter().enumerate() {
            let fwd = row.implied_forward_rate.unwrap();
            assert!(fwd.is_finite() && row.short_rate_forward.is_finite());
            let expected = 100.0 * (p2[i] / p1[i] - 1.0) * 360.0 / 90.0;
            assert!((fwd - expected).abs() < 1e-9);
            let bps = row.spread_bps.unwrap();
            assert!((bps - 100.0 * (fwd - row.short_rate_forward)).abs() < 1e-9);
        }

        // Same 90-day span every day: the short-rate leg barely moves.
        let ois: Vec<f64> = out.rows.iter().map(|r| r.short_rate_forward).collect();
        assert!(ois.windows(2).all(|w| (w[0] - w[1]).abs() * BPS_PER_PERCENT < 1.0));
    }

    #[test]
    fn negative_and_extreme_ttms_never_yield_a_rate() {
        let base = d(2024, 2, 1);
        let negative = contract(base, 4000.0, 4020.0, -30, 60);
        let mut extreme = contract(base + Duration::days(1), 4000.0, 4020.0, 30, 120);
        extreme.term1_ttm = Some(-9_200_000_000_000_000_000);
        extreme.term2_ttm = Some(9_200_000_000_000_000_000);
        let mut huge = contract(base + Duration::days(2), 4000.0, 4020.0, 30, 120);
        huge.term2_ttm = Some(i64::MAX);
        huge.term1_ttm = Some(0);
        let good = contract(base + Duration::days(3), 4000.0, 4020.0, 30, 120);

        let out = compute_index_forward_rates(
            IndexCode::Spx,
            &[negative, extreme, huge, good.clone()],
            &flat_rates(base, 0.05),
            &zero_dividends(base),
            &settings(),
        );

        assert_eq!(out.diagnostics.dropped_missing_inputs, 2);
        assert!(out.rows.iter().all(|r| r.observation.term1_ttm.unwrap_or(0) >= 0));
        assert_eq!(out.rows.last().map(|r| r.date()), Some(good.date));
    }

    #[test]
    fn undefined_rows_are_dropped_not_propagated() {
        let base = d(2024, 2, 1);
        let mut missing_price = contract(base, 4000.0, 4020.0, 30, 120);
        missing_price.term2_price = None;
        let same_maturity = contract(base + Duration::days(1), 4000.0, 4020.0, 30, 30);
        let mut missing_settlement = contract(base + Duration::days(2), 4000.0, 4020.0, 30, 120);
        missing_settlement.term1_settlement_date = None;
        let good = contract(base + Duration::days(3), 4000.0, 4020.0, 30, 120);

        let out = compute_index_forward_rates(
            IndexCode::Ndx,
            &[good.clone(), missing_price, same_maturity, missing_settlement],
            &flat_rates(base, 0.05),
            &zero_dividends(base),
            &settings(),
        );

        assert_eq!(out.rows.len(), 1);
        assert_eq!(out.rows[0].date(), good.date);
        assert_eq!(out.diagnostics.dropped_missing_inputs, 1);
        assert_eq!(out.diagnostics.dropped_undefined, 1);
        assert_eq!(out.diagnostics.dropped_missing_dividends, 1);
    }

    #[test]
    fn rows_before_any_short_rate_or_dividend_are_dropped() {
        let contracts = vec![
            contract(d(2024, 1, 2), 4000.0, 4020.0, 30, 120),
            contract(d(2024, 1, 10), 4000.0, 4020.0, 30, 120),
        ];
        let out = compute_index_forward_rates(
            IndexCode::Indu,
            &contracts,
            &flat_rates(d(2024, 1, 5), 0.03),
            &zero_dividends(d(2024, 1, 1)),
            &settings(),
        );
        assert_eq!(out.rows.len(), 1);
        assert_eq!(out.diagnostics.dropped_missing_short_rate, 1);

        let out = compute_index_forward_rates(
            IndexCode::Indu,
            &contracts,
            &flat_rates(d(2024, 1, 1), 0.03),
            &zero_dividends(d(2024, 1, 5)),
            &settings(),
        );
        assert_eq!(out.rows.len(), 1);
        assert_eq!(out.diagnostics.dropped_missing_dividends, 1);
    }

    #[test]
    fn stale_short_rate_joins_are_counted() {
        let contracts = vec![
            contract(d(2024, 1, 2), 4000.0, 4020.0, 30, 120),
            contract(d(2024, 1, 20), 4000.0, 4020.0, 30, 120),
        ];
        let out = compute_index_forward_rates(
            IndexCode::Spx,
            &contracts,
            &flat_rates(d(2024, 1, 2), 0.03),
            &zero_dividends(d(2024, 1, 1)),
            &settings(),
        );
        assert_eq!(out.rows.len(), 2);
        assert_eq!(out.diagnostics.stale_short_rate_joins, 1);
        assert_eq!(out.diagnostics.max_short_rate_lag_days, 18);
        assert_eq!(out.rows[1].short_rate_lag_days, 18);
    }

    #[test]
    fn outlier_nulls_forward_and_spread() {
        let start = d(2023, 1, 2);
        let contracts: Vec<_> = (0..91)
            .map(|i| {
                let p2 = if i == 45 { 4400.0 } else { 4020.0 };
                contract(start + Duration::days(i), 4000.0, p2, 30, 120)
            })
            .collect();

        let out = compute_index_forward_rates(
            IndexCode::Spx,
            &contracts,
            &flat_rates(start, 0.03),
            &zero_dividends(start),
            &settings(),
        );

        assert_eq!(out.diagnostics.outliers, 1);
        let spike = &out.rows[45];
        assert!(spike.is_outlier);
        assert_eq!(spike.implied_forward_rate, None);
        assert_eq!(spike.spread_bps, None);
        assert_eq!(spike.spread_filtered, None);
        assert!(spike.short_rate_forward.is_finite());

        let normal = &out.rows[44];
        assert!(!normal.is_outlier);
        let pct = normal.spread_filtered.unwrap();
        assert!((normal.spread_bps.unwrap() - pct * BPS_PER_PERCENT).abs() < 1e-12);
    }

    #[test]
    fn dividends_enter_through_both_legs() {
        let obs_date = d(2024, 3, 1);
        let dividends = CumulativeDividends::from_records(&[
            DividendRecord { date: d(2024, 2, 29), daily_dividend: 1.0 },
            DividendRecord { date: d(2024, 3, 15), daily_dividend: 3.0 },
            DividendRecord { date: d(2024, 5, 15), daily_dividend: 7.0 },
        ]);
        let out = compute_index_forward_rates(
            IndexCode::Spx,
            &[contract(obs_date, 5000.0, 5030.0, 30, 120)],
            &flat_rates(obs_date, 0.04),
            &dividends,
            &settings(),
        );
        let row = &out.rows[0];
        assert_eq!(row.cum_div_current, 1.0);
        assert_eq!(row.div_sum1, 3.0);
        assert_eq!(row.div_sum2, 10.0);
        assert!((row.div_sum1_comp - 3.0 * (1.0 + 0.04 * 15.0 / 360.0)).abs() < 1e-12);
        assert!((row.div_sum2_comp - 10.0 * (1.0 + 0.04 * 60.0 / 360.0)).abs() < 1e-12);
    }
}
