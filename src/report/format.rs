//! Plain-text terminal output.

use std::path::Path;

use crate::forward::IndexForwardRates;
use crate::report::validate::{IndexValidation, ValidationStatus};

/// Rows shown in the per-index tail table.
pub const TAIL_ROWS: usize = 5;

/// Row accounting plus the last few computed rows of one index.
pub fn format_index_summary(result: &IndexForwardRates, output: &Path) -> String {
    let d = &result.diagnostics;
    let mut out = String::new();

    out.push_str(&format!(
        "=== {} ({}) ===\n",
        result.index.code(),
        result.index.display_name()
    ));
    out.push_str(&format!(
        "Rows: read={} | used={} | dropped={}\n",
        d.rows_in,
        result.rows.len(),
        d.rows_dropped()
    ));
    if d.rows_dropped() > 0 {
        out.push_str(&format!(
            "Dropped: missing inputs={} | no short rate={} | no dividends={} | undefined={}\n",
            d.dropped_missing_inputs, d.dropped_missing_short_rate, d.dropped_missing_dividends, d.dropped_undefined
        ));
    }
    out.push_str(&format!(
        "Short-rate joins: stale={} | max lag={}d\n",
        d.stale_short_rate_joins, d.max_short_rate_lag_days
    ));
    out.push_str(&format!("Outliers removed: {}\n", d.outliers));
    out.push_str(&format!("Saved: {}\n", output.display()));

    if result.rows.is_empty() {
        out.push_str("(no computable rows)\n");
        return out;
    }

    out.push_str(&format!(
        "\n{:<12} {:>12} {:>12} {:>12}\n",
        "Date",
        result.index.implied_forward_column(),
        result.index.short_rate_forward_column(),
        "spread (bp)"
    ));
    let skip = result.rows.len().saturating_sub(TAIL_ROWS);
    for row in &result.rows[skip..] {
        out.push_str(&format!(
            "{:<12} {:>12} {:>12.4} {:>12}\n",
            row.date().to_string(),
            opt(row.implied_forward_rate, 4),
            row.short_rate_forward,
            opt(row.spread_bps, 2),
        ));
    }
    out
}

pub fn format_validation(results: &[IndexValidation]) -> String {
    let mut out = String::new();
    out.push_str("=== Reference validation ===\n");
    out.push_str(&format!(
        "{:<6} {:>7} {:>7} {:>10} {:>10} {:>10}  {}\n",
        "Index", "overlap", "pairs", "corr", "rmse(bp)", "monotonic", "status"
    ));
    for v in results {
        let status = match &v.status {
            ValidationStatus::Pass => "PASS".to_string(),
            ValidationStatus::Fail(why) => format!("FAIL ({why})"),
            ValidationStatus::Skipped(why) => format!("SKIP ({why})"),
        };
        out.push_str(&format!(
            "{:<6} {:>7} {:>7} {:>10} {:>10} {:>10}  {}\n",
            v.index.code(),
            yes_no(v.overlap),
            v.paired,
            opt(v.correlation, 4),
            opt(v.rmse, 3),
            yes_no(v.dates_strictly_increasing),
            status
        ));
    }
    out
}

fn opt(v: Option<f64>, decimals: usize) -> String {
    match v {
        Some(x) => format!("{x:.decimals$}"),
        None => "NaN".to_string(),
    }
}

fn yes_no(b: bool) -> &'static str {
    if b { "yes" } else { "no" }
}
