//! CSV ingest and normalization.
//!
//! This module turns the three input tables into typed rows:
//!
//! - per-index contract term structures -> `ContractObservation`
//! - the short-rate table -> `ShortRateObservation` (decimal, sorted, unique dates)
//! - per-index daily dividends -> `DividendRecord`
//!
//! Design goals:
//! - **Strict schema**: a missing file or column is a `PipelineError`
//! - **Permissive cells**: malformed numbers/dates become missing values; rows
//!   that cannot be placed in time (bad `Date`) are skipped and reported
//! - **No computation** beyond unit normalization

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use csv::StringRecord;
use tracing::{info, warn};

use crate::domain::{ContractObservation, DividendRecord, RateUnit, ShortRateObservation};
use crate::error::PipelineError;

const CONTRACT_COLUMNS: [&str; 7] = [
    "date",
    "term1_settlementdate",
    "term2_settlementdate",
    "term1_ttm",
    "term2_ttm",
    "term1_futures_price",
    "term2_futures_price",
];

/// Longest plausible time to settlement (about 100 years).
pub const MAX_TTM_DAYS: i64 = 36_500;

const SHORT_RATE_COLUMN: &str = "ois_3m";
const DIVIDEND_COLUMN: &str = "daily_div";

/// A row-level problem encountered during ingest.
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// Typed rows plus what was skipped on the way.
#[derive(Debug, Clone)]
pub struct Ingested<T> {
    pub path: PathBuf,
    pub rows: Vec<T>,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
}

/// Short-rate table after normalization.
#[derive(Debug, Clone)]
pub struct ShortRateTable {
    pub data: Ingested<ShortRateObservation>,
    pub duplicates_dropped: usize,
    /// Set when the unit convention changed the raw values (e.g. percent → decimal).
    pub unit_note: Option<String>,
}

impl ShortRateTable {
    pub fn observations(&self) -> &[ShortRateObservation] {
        &self.data.rows
    }
}

/// Load one index's contract term structure.
pub fn load_contract_observations(path: &Path) -> Result<Ingested<ContractObservation>, PipelineError> {
    let file = open_input(path)?;
    read_contract_observations(file, path)
}

pub fn read_contract_observations<R: Read>(
    reader: R,
    path: &Path,
) -> Result<Ingested<ContractObservation>, PipelineError> {
    let (mut reader, header_map) = csv_reader(reader, path)?;
    for column in CONTRACT_COLUMNS {
        require_column(&header_map, column, path)?;
    }

    let mut rows = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // +2: 1-based lines, plus the header line.
        let line = idx + 2;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        match parse_contract_row(&record, &header_map) {
            Ok(row) => rows.push(row),
            Err(message) => row_errors.push(RowError { line, message }),
        }
    }

    rows.sort_by_key(|r: &ContractObservation| r.date);
    finish(path, rows, row_errors, rows_read)
}

/// Load the short-rate table.
pub fn load_short_rates(path: &Path, unit: RateUnit) -> Result<ShortRateTable, PipelineError> {
    let file = open_input(path)?;
    read_short_rates(file, path, unit)
}

pub fn read_short_rates<R: Read>(reader: R, path: &Path, unit: RateUnit) -> Result<ShortRateTable, PipelineError> {
    let (mut reader, header_map) = csv_reader(reader, path)?;

    // A dataframe index written to CSV leaves the date column unnamed.
    let date_idx = match header_map.get("date") {
        Some(&idx) => idx,
        None => match header_map.get("").or_else(|| header_map.get("unnamed: 0")) {
            Some(&idx) => idx,
            None => return Err(missing_column(path, "Date")),
        },
    };
    let rate_idx = require_column(&header_map, SHORT_RATE_COLUMN, path)?;

    let mut rows: Vec<ShortRateObservation> = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        let line = idx + 2;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        let date = match cell(&record, date_idx).map(parse_date) {
            Some(Ok(d)) => d,
            Some(Err(e)) => {
                row_errors.push(RowError { line, message: e });
                continue;
            }
            None => {
                row_errors.push(RowError {
                    line,
                    message: "Missing required value: `Date`".to_string(),
                });
                continue;
            }
        };
        let Some(rate) = parse_opt_f64(cell(&record, rate_idx)) else {
            row_errors.push(RowError {
                line,
                message: format!("Missing/invalid `OIS_3M` value on {date}."),
            });
            continue;
        };

        rows.push(ShortRateObservation { date, rate });
    }

    rows.sort_by_key(|r| r.date);
    let before = rows.len();
    rows = keep_last_per_date(rows);
    let duplicates_dropped = before - rows.len();
    if duplicates_dropped > 0 {
        warn!(
            path = %path.display(),
            duplicates = duplicates_dropped,
            "duplicate short-rate dates; keeping the last row for each"
        );
    }

    let unit_note = apply_rate_unit(&mut rows, unit);
    if let Some(note) = &unit_note {
        info!(path = %path.display(), "{note}");
    }

    Ok(ShortRateTable {
        data: finish(path, rows, row_errors, rows_read)?,
        duplicates_dropped,
        unit_note,
    })
}

/// Load an index's daily dividends from `primary`, falling back to `fallback`.
pub fn load_dividends(primary: &Path, fallback: &Path) -> Result<Ingested<DividendRecord>, PipelineError> {
    let path = if primary.exists() {
        primary
    } else {
        warn!(
            primary = %primary.display(),
            fallback = %fallback.display(),
            "primary dividend file not found; using cached data"
        );
        fallback
    };
    let file = open_input(path)?;
    read_dividends(file, path)
}

pub fn read_dividends<R: Read>(reader: R, path: &Path) -> Result<Ingested<DividendRecord>, PipelineError> {
    let (mut reader, header_map) = csv_reader(reader, path)?;
    let date_idx = require_column(&header_map, "date", path)?;
    let div_idx = require_column(&header_map, DIVIDEND_COLUMN, path)?;

    let mut rows = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        let line = idx + 2;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        let date = match cell(&record, date_idx).map(parse_date) {
            Some(Ok(d)) => d,
            _ => {
                row_errors.push(RowError {
                    line,
                    message: "Missing/invalid `Date`; row dropped.".to_string(),
                });
                continue;
            }
        };

        // Unobserved dividends are zero; negative ones are not dividends.
        let daily_dividend = match parse_opt_f64(cell(&record, div_idx)) {
            None => 0.0,
            Some(v) if v < 0.0 => {
                row_errors.push(RowError {
                    line,
                    message: format!("Negative `Daily_Div` {v} on {date}; treated as 0."),
                });
                0.0
            }
            Some(v) => v,
        };

        rows.push(DividendRecord { date, daily_dividend });
    }

    rows.sort_by_key(|r: &DividendRecord| r.date);
    finish(path, rows, row_errors, rows_read)
}

fn parse_contract_row(record: &StringRecord, header_map: &HashMap<String, usize>) -> Result<ContractObservation, String> {
    let date = parse_date(get_required(record, header_map, "date")?)?;

    let date_col = |name: &str| get_optional(record, header_map, name).and_then(|s| parse_date(s).ok());
    let num_col = |name: &str| parse_opt_f64(get_optional(record, header_map, name));
    let days_col = |name: &str| parse_opt_days(get_optional(record, header_map, name));

    Ok(ContractObservation {
        date,
        term1_price: num_col("term1_futures_price"),
        term2_price: num_col("term2_futures_price"),
        term1_settlement_date: date_col("term1_settlementdate"),
        term2_settlement_date: date_col("term2_settlementdate"),
        term1_ttm: days_col("term1_ttm"),
        term2_ttm: days_col("term2_ttm"),
    })
}

fn keep_last_per_date(sorted: Vec<ShortRateObservation>) -> Vec<ShortRateObservation> {
    let mut out: Vec<ShortRateObservation> = Vec::with_capacity(sorted.len());
    for obs in sorted {
        match out.last_mut() {
            Some(last) if last.date == obs.date => *last = obs,
            _ => out.push(obs),
        }
    }
    out
}

fn apply_rate_unit(rows: &mut [ShortRateObservation], unit: RateUnit) -> Option<String> {
    let max_abs = rows.iter().map(|r| r.rate.abs()).fold(0.0, f64::max);

    let (scale, note) = match unit {
        RateUnit::Decimal => (1.0, None),
        RateUnit::Percent => (0.01, Some("short rate: percent→decimal (÷100)")),
        // A decimal short rate of 100% or more is not plausible.
        RateUnit::Auto if max_abs >= 1.0 => (0.01, Some("short rate: auto percent→decimal (÷100)")),
        RateUnit::Auto => (1.0, None),
    };

    if (scale - 1.0_f64).abs() < 1e-12 {
        return None;
    }
    for r in rows.iter_mut() {
        r.rate *= scale;
    }
    note.map(str::to_string)
}

fn finish<T>(path: &Path, rows: Vec<T>, row_errors: Vec<RowError>, rows_read: usize) -> Result<Ingested<T>, PipelineError> {
    if rows.is_empty() {
        return Err(PipelineError::EmptyInput {
            path: path.to_path_buf(),
        });
    }
    if !row_errors.is_empty() {
        info!(
            path = %path.display(),
            skipped_or_patched = row_errors.len(),
            rows_read,
            "row-level issues during ingest"
        );
    }
    Ok(Ingested {
        path: path.to_path_buf(),
        rows,
        row_errors,
        rows_read,
    })
}

fn open_input(path: &Path) -> Result<File, PipelineError> {
    if !path.exists() {
        return Err(PipelineError::MissingInput {
            path: path.to_path_buf(),
        });
    }
    File::open(path).map_err(|e| PipelineError::Read {
        path: path.to_path_buf(),
        source: e.into(),
    })
}

fn csv_reader<R: Read>(reader: R, path: &Path) -> Result<(csv::Reader<R>, HashMap<String, usize>), PipelineError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|source| PipelineError::Read {
            path: path.to_path_buf(),
            source,
        })?
        .clone();

    Ok((reader, build_header_map(&headers)))
}

pub(crate) fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    let mut map = HashMap::new();
    for (idx, name) in headers.iter().enumerate() {
        // First occurrence wins for repeated names.
        map.entry(normalize_header_name(name)).or_insert(idx);
    }
    map
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports sometimes prefix the first header with a UTF-8 BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn require_column(header_map: &HashMap<String, usize>, name: &str, path: &Path) -> Result<usize, PipelineError> {
    header_map
        .get(name)
        .copied()
        .ok_or_else(|| missing_column(path, name))
}

fn missing_column(path: &Path, name: &str) -> PipelineError {
    PipelineError::MissingColumn {
        path: path.to_path_buf(),
        column: name.to_string(),
    }
}

fn get_required<'a>(record: &'a StringRecord, header_map: &HashMap<String, usize>, name: &str) -> Result<&'a str, String> {
    let idx = header_map
        .get(name)
        .ok_or_else(|| format!("Missing required column: `{name}`"))?;
    cell(record, *idx).ok_or_else(|| format!("Missing required value: `{name}`"))
}

fn get_optional<'a>(record: &'a StringRecord, header_map: &HashMap<String, usize>, name: &str) -> Option<&'a str> {
    let idx = header_map.get(name)?;
    cell(record, *idx)
}

pub(crate) fn cell(record: &StringRecord, idx: usize) -> Option<&str> {
    record.get(idx).map(str::trim).filter(|s| !s.is_empty())
}

pub(crate) fn parse_date(s: &str) -> Result<NaiveDate, String> {
    // ISO dates are the norm, but dataframe exports may carry a midnight
    // timestamp and spreadsheet exports often use day-first formats.
    const FMTS: [&str; 4] = ["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%d-%m-%Y"];
    for fmt in FMTS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(d);
        }
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Ok(dt.date());
    }
    Err(format!(
        "Invalid date '{s}'. Expected one of: YYYY-MM-DD, YYYY-MM-DD HH:MM:SS, YYYY/MM/DD, DD/MM/YYYY, DD-MM-YYYY."
    ))
}

pub(crate) fn parse_opt_f64(s: Option<&str>) -> Option<f64> {
    let s = s?;
    let v = s.parse::<f64>().ok()?;
    if v.is_finite() { Some(v) } else { None }
}

/// Whole, non-negative days up to `MAX_TTM_DAYS`, accepting float spellings like `30.0`.
fn parse_opt_days(s: Option<&str>) -> Option<i64> {
    let v = parse_opt_f64(s)?;
    if v.fract().abs() > 1e-9 || v < 0.0 || v > MAX_TTM_DAYS as f64 {
        return None;
    }
    Some(v.round() as i64)
}
