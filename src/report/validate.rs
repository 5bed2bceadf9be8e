//! Reference validation of persisted spreads.
//!
//! Compares each index's persisted spread (bps) against an externally
//! produced reference series on the intersecting dates:
//!
//! - date-range overlap
//! - Pearson correlation and RMSE over paired finite values (need >= 2 pairs)
//! - strictly increasing persisted date index (no duplicates)

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::IndexCode;
use crate::error::PipelineError;
use crate::io::export::PersistedForwardRate;
use crate::io::ingest::{build_header_map, cell, parse_date, parse_opt_f64};

/// A reference spread file: one date column followed by named spread columns.
#[derive(Debug, Clone, Default)]
pub struct ReferenceTable {
    pub path: PathBuf,
    dates: Vec<NaiveDate>,
    /// Keyed by lowercased header name.
    columns: HashMap<String, Vec<Option<f64>>>,
}

impl ReferenceTable {
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Dated values of `column` (case-insensitive), missing cells skipped.
    pub fn series(&self, column: &str) -> Option<Vec<(NaiveDate, f64)>> {
        let values = self.columns.get(&column.to_ascii_lowercase())?;
        Some(
            self.dates
                .iter()
                .zip(values)
                .filter_map(|(d, v)| v.filter(|x| x.is_finite()).map(|x| (*d, x)))
                .collect(),
        )
    }
}

/// Load a reference spread CSV. The first column is the date whatever its header.
pub fn load_reference_spreads(path: &Path) -> Result<ReferenceTable, PipelineError> {
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
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(file);
    let headers = reader.headers().map_err(read_err)?.clone();
    let header_map = build_header_map(&headers);

    let value_columns: Vec<(String, usize)> = header_map
        .iter()
        .filter(|(_, idx)| **idx != 0)
        .map(|(name, idx)| (name.clone(), *idx))
        .collect();

    let mut table = ReferenceTable {
        path: path.to_path_buf(),
        ..ReferenceTable::default()
    };
    for (name, _) in &value_columns {
        table.columns.insert(name.clone(), Vec::new());
    }

    for record in reader.records() {
        let record = record.map_err(read_err)?;
        let Some(Ok(date)) = cell(&record, 0).map(parse_date) else {
            continue;
        };
        table.dates.push(date);
        for (name, idx) in &value_columns {
            if let Some(values) = table.columns.get_mut(name) {
                values.push(parse_opt_f64(cell(&record, *idx)));
            }
        }
    }

    if table.is_empty() {
        return Err(PipelineError::EmptyInput {
            path: path.to_path_buf(),
        });
    }
    Ok(table)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidationThresholds {
    pub min_correlation: f64,
    /// Strict upper bound, bps.
    pub max_rmse: f64,
}

impl Default for ValidationThresholds {
    fn default() -> Self {
        Self {
            min_correlation: 0.95,
            max_rmse: 5.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum ValidationStatus {
    Pass,
    Fail(String),
    Skipped(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexValidation {
    pub index: IndexCode,
    pub overlap: bool,
    pub paired: usize,
    pub correlation: Option<f64>,
    pub rmse: Option<f64>,
    pub dates_strictly_increasing: bool,
    pub status: ValidationStatus,
}

/// Validate one index's persisted rows against its reference series.
pub fn validate_index(
    index: IndexCode,
    computed: &[PersistedForwardRate],
    reference: Option<&[(NaiveDate, f64)]>,
    thresholds: &ValidationThresholds,
) -> IndexValidation {
    let dates: Vec<NaiveDate> = computed.iter().map(|r| r.date).collect();
    let mut out = IndexValidation {
        index,
        overlap: false,
        paired: 0,
        correlation: None,
        rmse: None,
        dates_strictly_increasing: is_strictly_increasing(&dates),
        status: ValidationStatus::Pass,
    };

    let Some(reference) = reference else {
        out.status = ValidationStatus::Skipped(format!("no `{}` column in reference", index.reference_column()));
        return out;
    };

    out.overlap = ranges_overlap(&dates, reference);
    if !out.overlap {
        out.status = ValidationStatus::Skipped("no overlapping dates".to_string());
        return out;
    }

    let by_date: BTreeMap<NaiveDate, f64> = reference.iter().copied().collect();
    let (ours, theirs): (Vec<f64>, Vec<f64>) = computed
        .iter()
        .filter_map(|r| {
            let ours = r.spread_bps.filter(|v| v.is_finite())?;
            by_date.get(&r.date).map(|theirs| (ours, *theirs))
        })
        .unzip();

    out.paired = ours.len();
    out.correlation = pearson(&ours, &theirs);
    out.rmse = rmse(&ours, &theirs);

    let mut problems = Vec::new();
    if !out.dates_strictly_increasing {
        problems.push("date index is not strictly increasing".to_string());
    }
    match out.correlation {
        Some(c) if c >= thresholds.min_correlation => {}
        Some(c) => problems.push(format!("correlation {c:.4} < {:.4}", thresholds.min_correlation)),
        None => problems.push(format!("correlation undefined over {} pairs", out.paired)),
    }
    match out.rmse {
        Some(e) if e < thresholds.max_rmse => {}
        Some(e) => problems.push(format!("RMSE {e:.4} >= {:.4}", thresholds.max_rmse)),
        None => problems.push(format!("RMSE undefined over {} pairs", out.paired)),
    }
    if !problems.is_empty() {
        out.status = ValidationStatus::Fail(problems.join("; "));
    }
    out
}

pub fn is_strictly_increasing(dates: &[NaiveDate]) -> bool {
    dates.windows(2).all(|w| w[0] < w[1])
}

fn ranges_overlap(dates: &[NaiveDate], reference: &[(NaiveDate, f64)]) -> bool {
    let (Some(a0), Some(a1)) = (dates.iter().min(), dates.iter().max()) else {
        return false;
    };
    let (Some(b0), Some(b1)) = (reference.iter().map(|r| r.0).min(), reference.iter().map(|r| r.0).max()) else {
        return false;
    };
    *a0 <= b1 && b0 <= *a1
}

/// Pearson correlation; `None` with fewer than two pairs or a constant side.
pub fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    let n = x.len().min(y.len());
    if n < 2 {
        return None;
    }
    let mx = x[..n].iter().sum::<f64>() / n as f64;
    let my = y[..n].iter().sum::<f64>() / n as f64;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (a, b) in x[..n].iter().zip(&y[..n]) {
        let (dx, dy) = (a - mx, b - my);
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx == 0.0 || syy == 0.0 {
        return None;
    }
    Some(sxy / (sxx * syy).sqrt())
}

/// Root mean squared difference; `None` with fewer than two pairs.
pub fn rmse(x: &[f64], y: &[f64]) -> Option<f64> {
    let n = x.len().min(y.len());
    if n < 2 {
        return None;
    }
    let sse: f64 = x[..n].iter().zip(&y[..n]).map(|(a, b)| (a - b).powi(2)).sum();
    Some((sse / n as f64).sqrt())
}
