//! JSON run summary: per-index diagnostics and failures.

use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::IndexCode;
use crate::error::PipelineError;
use crate::forward::{IndexForwardRates, JoinDiagnostics};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexSummary {
    pub rows_read: usize,
    pub rows_used: usize,
    pub dropped_missing_inputs: usize,
    pub dropped_missing_short_rate: usize,
    pub dropped_missing_dividends: usize,
    pub dropped_undefined: usize,
    pub stale_short_rate_joins: usize,
    pub max_short_rate_lag_days: i64,
    pub outliers: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    /// Mean of the non-missing final spreads, basis points.
    pub mean_spread_bps: Option<f64>,
}

impl IndexSummary {
    pub fn from_result(result: &IndexForwardRates) -> Self {
        let JoinDiagnostics {
            rows_in,
            dropped_missing_inputs,
            dropped_missing_short_rate,
            dropped_missing_dividends,
            dropped_undefined,
            stale_short_rate_joins,
            max_short_rate_lag_days,
            outliers,
        } = result.diagnostics.clone();

        let spreads: Vec<f64> = result.rows.iter().filter_map(|r| r.spread_bps).collect();
        let mean_spread_bps = if spreads.is_empty() {
            None
        } else {
            Some(spreads.iter().sum::<f64>() / spreads.len() as f64)
        };

        Self {
            rows_read: rows_in,
            rows_used: result.rows.len(),
            dropped_missing_inputs,
            dropped_missing_short_rate,
            dropped_missing_dividends,
            dropped_undefined,
            stale_short_rate_joins,
            max_short_rate_lag_days,
            outliers,
            first_date: result.rows.first().map(|r| r.date()),
            last_date: result.rows.last().map(|r| r.date()),
            mean_spread_bps,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunSummary {
    pub tool: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub window: usize,
    pub threshold: f64,
    pub indices: BTreeMap<IndexCode, IndexSummary>,
    pub failures: BTreeMap<IndexCode, String>,
}

pub fn write_run_summary_json(path: &Path, summary: &RunSummary) -> Result<(), PipelineError> {
    let file = File::create(path).map_err(|e| PipelineError::Write {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    serde_json::to_writer_pretty(file, summary).map_err(|e| PipelineError::Write {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}
