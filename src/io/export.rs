//! Persisted per-index forward-rate tables.
//!
//! One CSV per index, indexed by `Date`. Missing values are empty cells and
//! floats use Rust's shortest round-trip formatting, so reading a file back
//! reproduces the written values exactly.

use std::fs::File;
use std::path::Path;

use chrono::NaiveDate;
use csv::StringRecord;

use crate::domain::{ForwardRateRow, IndexCode};
use crate::error::PipelineError;
use crate::io::ingest::{build_header_map, cell, parse_date, parse_opt_f64};

/// The columns a reader needs back from a persisted table.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedForwardRate {
    pub date: NaiveDate,
    pub implied_forward_rate: Option<f64>,
    pub short_rate_forward: Option<f64>,
    /// Basis points.
    pub spread_bps: Option<f64>,
    pub is_outlier: bool,
}

pub fn forward_rate_headers(index: IndexCode) -> Vec<String> {
    let mut headers: Vec<String> = [
        "Date",
        "Term1_SettlementDate",
        "Term2_SettlementDate",
        "Term1_TTM",
        "Term2_TTM",
        "Term1_Futures_Price",
        "Term2_Futures_Price",
        "OIS",
        "OIS_lag_days",
        "CumDiv_current",
        "CumDiv_Term1",
        "CumDiv_Term2",
        "Div_Sum1",
        "Div_Sum2",
        "Div_Sum1_Comp",
        "Div_Sum2_Comp",
        "implied_forward_raw",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    let spread = index.spread_column();
    headers.push(index.implied_forward_column());
    headers.push("ois_fwd_raw".to_string());
    headers.push(index.short_rate_forward_column());
    headers.push(spread.clone());
    headers.push(format!("{spread}_filtered"));
    headers.push("is_outlier".to_string());
    headers
}

/// Write an index's forward-rate rows.
pub fn write_forward_rates_csv(path: &Path, index: IndexCode, rows: &[ForwardRateRow]) -> Result<(), PipelineError> {
    let write_err = |e: csv::Error| PipelineError::Write {
        path: path.to_path_buf(),
        message: e.to_string(),
    };

    let mut writer = csv::Writer::from_path(path).map_err(write_err)?;
    writer.write_record(forward_rate_headers(index)).map_err(write_err)?;

    for r in rows {
        let o = &r.observation;
        let record = [
            o.date.to_string(),
            opt_date(o.term1_settlement_date),
            opt_date(o.term2_settlement_date),
            opt_int(o.term1_ttm),
            opt_int(o.term2_ttm),
            opt_num(o.term1_price),
            opt_num(o.term2_price),
            num(r.short_rate),
            r.short_rate_lag_days.to_string(),
            num(r.cum_div_current),
            num(r.cum_div_term1),
            num(r.cum_div_term2),
            num(r.div_sum1),
            num(r.div_sum2),
            num(r.div_sum1_comp),
            num(r.div_sum2_comp),
            num(r.implied_forward_raw),
            opt_num(r.implied_forward_rate),
            num(r.short_rate_forward_raw),
            num(r.short_rate_forward),
            opt_num(r.spread_bps),
            opt_num(r.spread_filtered),
            r.is_outlier.to_string(),
        ];
        writer.write_record(&record).map_err(write_err)?;
    }

    writer.flush().map_err(|e| PipelineError::Write {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    Ok(())
}

/// Read back the rate and spread columns of a persisted table.
pub fn read_forward_rates_csv(path: &Path, index: IndexCode) -> Result<Vec<PersistedForwardRate>, PipelineError> {
    if !path.exists() {
        return Err(PipelineError::MissingInput {
            path: path.to_path_buf(),
        });
    }
    let read_err = |source: csv::Error| PipelineError::Read {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(|e| read_err(e.into()))?;
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(file);
    let headers: StringRecord = reader.headers().map_err(read_err)?.clone();
    let header_map = build_header_map(&headers);

    let column = |name: &str| {
        header_map
            .get(&name.to_ascii_lowercase())
            .copied()
            .ok_or_else(|| PipelineError::MissingColumn {
                path: path.to_path_buf(),
                column: name.to_string(),
            })
    };
    let date_idx = column("Date")?;
    let fwd_idx = column(&index.implied_forward_column())?;
    let ois_idx = column(&index.short_rate_forward_column())?;
    let spread_idx = column(&index.spread_column())?;
    let outlier_idx = header_map.get("is_outlier").copied();

    let mut out = Vec::new();
    for record in reader.records() {
        let record = record.map_err(read_err)?;
        // Rows without a readable date cannot be placed on the calendar.
        let Some(Ok(date)) = cell(&record, date_idx).map(parse_date) else {
            continue;
        };
        out.push(PersistedForwardRate {
            date,
            implied_forward_rate: parse_opt_f64(cell(&record, fwd_idx)),
            short_rate_forward: parse_opt_f64(cell(&record, ois_idx)),
            spread_bps: parse_opt_f64(cell(&record, spread_idx)),
            is_outlier: outlier_idx
                .and_then(|idx| cell(&record, idx))
                .is_some_and(|s| s.eq_ignore_ascii_case("true")),
        });
    }
    Ok(out)
}

fn num(v: f64) -> String {
    format!("{v}")
}

fn opt_num(v: Option<f64>) -> String {
    v.map(num).unwrap_or_default()
}

fn opt_int(v: Option<i64>) -> String {
    v.map(|x| x.to_string()).unwrap_or_default()
}

fn opt_date(v: Option<NaiveDate>) -> String {
    v.map(|d| d.to_string()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dividends::CumulativeDividends;
    use crate::domain::{ContractObservation, DividendRecord, FilterParams, ShortRateObservation};
    use crate::forward::{ForwardSettings, compute_index_forward_rates};
    use chrono::Duration;

    fn sample_rows() -> Vec<ForwardRateRow> {
        let start = NaiveDate::from_ymd_opt(2022, 6, 1).unwrap();
        let contracts: Vec<ContractObservation> = (0..40)
            .map(|i: i64| {
                let date = start + Duration::days(i);
                let p2 = if i == 20 { 6000.0 } else { 4020.0 + 0.37 * i as f64 };
                ContractObservation {
                    date,
                    term1_price: Some(4000.0 + 0.31 * i as f64),
                    term2_price: Some(p2),
                    term1_settlement_date: Some(date + Duration::days(40 - i % 7)),
                    term2_settlement_date: Some(date + Duration::days(131 - i % 7)),
                    term1_ttm: Some(40 - i % 7),
                    term2_ttm: Some(131 - i % 7),
                }
            })
            .collect();
        let rates = vec![ShortRateObservation { date: start, rate: 0.0137 }];
        let divs = CumulativeDividends::from_records(&[
            DividendRecord { date: start, daily_dividend: 0.4 },
            DividendRecord { date: start + Duration::days(60), daily_dividend: 3.1 },
        ]);
        compute_index_forward_rates(
            IndexCode::Ndx,
            &contracts,
            &rates,
            &divs,
            &ForwardSettings {
                filter: FilterParams { window: 5, threshold: 10.0 },
                stale_after_days: 5,
            },
        )
        .rows
    }

    #[test]
    fn spreads_survive_a_round_trip() {
        let rows = sample_rows();
        assert!(rows.iter().any(|r| r.is_outlier), "fixture should contain an outlier");

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("NDX_Forward_Rates.csv");
        write_forward_rates_csv(&path, IndexCode::Ndx, &rows).unwrap();
        let back = read_forward_rates_csv(&path, IndexCode::Ndx).unwrap();

        assert_eq!(back.len(), rows.len());
        for (orig, read) in rows.iter().zip(&back) {
            assert_eq!(orig.date(), read.date);
            assert_eq!(orig.is_outlier, read.is_outlier);
            match (orig.spread_bps, read.spread_bps) {
                (Some(a), Some(b)) => assert!((a - b).abs() < 1e-9),
                (None, None) => {}
                other => panic!("spread mismatch: {other:?}"),
            }
            assert_eq!(orig.implied_forward_rate, read.implied_forward_rate);
            assert_eq!(Some(orig.short_rate_forward), read.short_rate_forward);
        }
    }

    #[test]
    fn header_names_follow_index() {
        let headers = forward_rate_headers(IndexCode::Indu);
        for expected in ["cal_INDU_rf", "ois_fwd_INDU", "spread_INDU", "spread_INDU_filtered"] {
            assert!(headers.iter().any(|h| h == expected), "missing {expected}");
        }
    }

    #[test]
    fn reading_wrong_index_reports_missing_column() {
        let rows = sample_rows();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("NDX_Forward_Rates.csv");
        write_forward_rates_csv(&path, IndexCode::Ndx, &rows).unwrap();
        let err = read_forward_rates_csv(&path, IndexCode::Spx).unwrap_err();
        assert!(matches!(err, PipelineError::MissingColumn { .. }));
    }
}
