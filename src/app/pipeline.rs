//! Shared pipeline logic used by the `run`, `plot` and `validate` commands.
//!
//! One run:
//! short rates (shared) -> per index in parallel: contracts + dividends
//! -> forward rates -> CSV -> collect -> summary JSON -> aligned charts
//!
//! A failing index is recorded and logged; its siblings continue.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use chrono::NaiveDate;
use rayon::prelude::*;
use tracing::{error, info, warn};

use crate::align::{DatedSeries, align_forward_fill};
use crate::dividends::CumulativeDividends;
use crate::domain::{IndexCode, RunConfig, ShortRateObservation};
use crate::error::PipelineError;
use crate::forward::{ForwardSettings, IndexForwardRates, compute_index_forward_rates};
use crate::io::export::{read_forward_rates_csv, write_forward_rates_csv};
use crate::io::ingest::{load_contract_observations, load_dividends, load_short_rates};
use crate::io::summary::{IndexSummary, RunSummary, write_run_summary_json};
use crate::plot::SpreadChart;

/// One index's computed and persisted series.
#[derive(Debug, Clone)]
pub struct IndexRun {
    pub result: IndexForwardRates,
    pub output_path: PathBuf,
    /// Contract rows skipped at ingest (unreadable `Date`, CSV errors).
    pub contract_row_errors: usize,
}

/// All outputs of a `run`.
#[derive(Debug)]
pub struct RunOutput {
    pub runs: BTreeMap<IndexCode, IndexRun>,
    pub failures: BTreeMap<IndexCode, PipelineError>,
    pub summary_path: Option<PathBuf>,
    pub charts: Vec<PathBuf>,
}

/// Compute every configured index, persist results, then summarize and chart.
///
/// Fails only when the shared short-rate table cannot be loaded or when no
/// index produced a result.
pub fn run_all(config: &RunConfig) -> Result<RunOutput, PipelineError> {
    let short_rates = load_short_rates(&config.short_rates_path(), config.rate_unit)?;
    info!(
        path = %short_rates.data.path.display(),
        rows = short_rates.observations().len(),
        row_errors = short_rates.data.row_errors.len(),
        duplicates = short_rates.duplicates_dropped,
        "short rates loaded"
    );
    if let Some(note) = &short_rates.unit_note {
        info!("{note}");
    }

    let outcomes: Vec<(IndexCode, Result<IndexRun, PipelineError>)> = config
        .indices
        .par_iter()
        .map(|&index| (index, process_index(index, config, short_rates.observations())))
        .collect();

    let mut runs = BTreeMap::new();
    let mut failures = BTreeMap::new();
    for (index, outcome) in outcomes {
        match outcome {
            Ok(run) => {
                runs.insert(index, run);
            }
            Err(err) => {
                error!(index = %index, error = %err, "index failed");
                failures.insert(index, err);
            }
        }
    }

    if runs.is_empty() {
        return Err(PipelineError::EmptyInput {
            path: config.processed_dir.clone(),
        });
    }

    ensure_dir(&config.output_dir)?;
    let summary_path = config.summary_path();
    write_run_summary_json(&summary_path, &build_summary(config, &runs, &failures))?;
    info!(path = %summary_path.display(), "run summary written");

    let charts = if config.plot {
        let series: Vec<(IndexCode, DatedSeries)> = runs
            .iter()
            .map(|(index, run)| (*index, run.result.spread_series()))
            .collect();
        render_charts(config, &series)?
    } else {
        Vec::new()
    };

    Ok(RunOutput {
        runs,
        failures,
        summary_path: Some(summary_path),
        charts,
    })
}

/// Load, compute and persist one index.
pub fn process_index(
    index: IndexCode,
    config: &RunConfig,
    short_rates: &[ShortRateObservation],
) -> Result<IndexRun, PipelineError> {
    let contracts = load_contract_observations(&config.contracts_path(index))?;
    let (primary, fallback) = config.dividend_paths(index);
    let dividends = load_dividends(&primary, &fallback)?;
    if !dividends.row_errors.is_empty() {
        warn!(
            index = %index,
            path = %dividends.path.display(),
            count = dividends.row_errors.len(),
            first = %dividends.row_errors[0].message,
            "dividend rows treated as zero"
        );
    }
    let cumulative = CumulativeDividends::from_records(&dividends.rows);

    let result = compute_index_forward_rates(
        index,
        &contracts.rows,
        short_rates,
        &cumulative,
        &ForwardSettings {
            filter: config.filter,
            stale_after_days: config.stale_after_days,
        },
    );

    ensure_dir(&config.processed_dir)?;
    let output_path = config.forward_rates_path(index);
    write_forward_rates_csv(&output_path, index, &result.rows)?;

    let d = &result.diagnostics;
    info!(
        index = %index,
        rows_loaded = contracts.rows_read,
        rows_used = result.rows.len(),
        dropped_missing_inputs = d.dropped_missing_inputs,
        dropped_missing_short_rate = d.dropped_missing_short_rate,
        dropped_missing_dividends = d.dropped_missing_dividends,
        dropped_undefined = d.dropped_undefined,
        stale_joins = d.stale_short_rate_joins,
        max_lag_days = d.max_short_rate_lag_days,
        outliers = d.outliers,
        path = %output_path.display(),
        "forward rates saved"
    );

    Ok(IndexRun {
        contract_row_errors: contracts.row_errors.len(),
        result,
        output_path,
    })
}

/// Re-render the charts from persisted forward-rate tables.
pub fn replot(config: &RunConfig) -> Result<Vec<PathBuf>, PipelineError> {
    let mut series: Vec<(IndexCode, DatedSeries)> = Vec::new();
    let mut last_err = None;
    for &index in &config.indices {
        match read_forward_rates_csv(&config.forward_rates_path(index), index) {
            Ok(rows) => series.push((index, rows.into_iter().map(|r| (r.date, r.spread_bps)).collect())),
            Err(err) => {
                warn!(index = %index, error = %err, "skipping index in charts");
                last_err = Some(err);
            }
        }
    }
    if series.is_empty() {
        return Err(last_err.unwrap_or(PipelineError::EmptyInput {
            path: config.processed_dir.clone(),
        }));
    }
    render_charts(config, &series)
}

fn render_charts(config: &RunConfig, series: &[(IndexCode, DatedSeries)]) -> Result<Vec<PathBuf>, PipelineError> {
    ensure_dir(&config.output_dir)?;
    let mut written = Vec::new();
    for (end, path) in config.chart_paths() {
        let aligned = align_forward_fill(series, config.start_date, end);
        if aligned.is_empty() {
            warn!(path = %path.display(), start = %config.start_date, end = %end, "no data in chart window");
            continue;
        }
        SpreadChart {
            aligned: &aligned,
            start: config.start_date,
            end,
            width: config.chart_width,
            height: config.chart_height,
        }
        .render(&path)?;
        info!(path = %path.display(), dates = aligned.dates.len(), "chart written");
        written.push(path);
    }
    Ok(written)
}

fn build_summary(
    config: &RunConfig,
    runs: &BTreeMap<IndexCode, IndexRun>,
    failures: &BTreeMap<IndexCode, PipelineError>,
) -> RunSummary {
    RunSummary {
        tool: env!("CARGO_PKG_NAME").to_string(),
        start_date: config.start_date,
        end_date: config.end_date,
        window: config.filter.window,
        threshold: config.filter.threshold,
        indices: runs
            .iter()
            .map(|(index, run)| (*index, IndexSummary::from_result(&run.result)))
            .collect(),
        failures: failures.iter().map(|(index, err)| (*index, err.to_string())).collect(),
    }
}

fn ensure_dir(dir: &std::path::Path) -> Result<(), PipelineError> {
    fs::create_dir_all(dir).map_err(|e| PipelineError::Write {
        path: dir.to_path_buf(),
        message: e.to_string(),
    })
}

/// Earliest and latest dates across all computed indices.
pub fn date_span(runs: &BTreeMap<IndexCode, IndexRun>) -> Option<(NaiveDate, NaiveDate)> {
    let firsts = runs.values().filter_map(|r| r.result.rows.first().map(|row| row.date()));
    let lasts = runs.values().filter_map(|r| r.result.rows.last().map(|row| row.date()));
    Some((firsts.min()?, lasts.max()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FilterParams, RateUnit};
    use std::path::Path;

    fn config(root: &Path, indices: Vec<IndexCode>) -> RunConfig {
        RunConfig {
            indices,
            input_dir: root.join("input"),
            manual_dir: root.join("manual"),
            processed_dir: root.join("processed"),
            output_dir: root.join("output"),
            start_date: NaiveDate::from_ymd_opt(2019, 1, 1).unwrap(),
            mid_date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2020, 12, 31).unwrap(),
            filter: FilterParams { window: 3, threshold: 10.0 },
            rate_unit: RateUnit::Auto,
            stale_after_days: 5,
            plot: true,
            chart_width: 640,
            chart_height: 400,
        }
    }

    fn write(path: &Path, text: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, text).unwrap();
    }

    fn seed_inputs(root: &Path, index: IndexCode, manual: bool) {
        let mut contracts = String::from(
            "Date,Term1_SettlementDate,Term2_SettlementDate,Term1_TTM,Term2_TTM,Term1_Futures_Price,Term2_Futures_Price\n",
        );
        let rows = [
            ("2019-12-02", "2019-12-20", "2020-03-20", 18, 109, 3100.0, 3110.0),
            ("2019-12-03", "2019-12-20", "2020-03-20", 17, 108, 3090.0, 3101.0),
            ("2019-12-04", "2019-12-20", "2020-03-20", 16, 107, 3105.0, 3115.5),
            ("2020-01-02", "2020-03-20", "2020-06-19", 78, 169, 3250.0, 3262.0),
            ("2020-01-03", "2020-03-20", "2020-06-19", 77, 168, 3230.0, 3241.0),
        ];
        for (d, s1, s2, t1, t2, p1, p2) in rows {
            contracts.push_str(&format!("{d},{s1},{s2},{t1},{t2},{p1},{p2}\n"));
        }
        write(
            &root.join("processed").join(format!("{}_Calendar_spread.csv", index.code())),
            &contracts,
        );

        let dir = if manual { "manual" } else { "input" };
        write(
            &root.join(dir).join(format!("{}_daily_dividends.csv", index.code())),
            "Date,Daily_Div\n2019-11-01,0.0\n2019-12-15,1.5\n2020-03-01,2.0\n2020-06-01,2.5\n",
        );
    }

    fn seed_short_rates(root: &Path) {
        write(
            &root.join("processed").join("cleaned_ois_rates.csv"),
            ",OIS_3M\n2019-11-29,1.55\n2019-12-31,1.53\n",
        );
    }

    #[test]
    fn run_persists_tables_summary_and_charts() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        seed_short_rates(root);
        seed_inputs(root, IndexCode::Spx, false);
        seed_inputs(root, IndexCode::Ndx, true);

        let cfg = config(root, vec![IndexCode::Spx, IndexCode::Ndx]);
        let out = run_all(&cfg).unwrap();

        assert!(out.failures.is_empty());
        assert_eq!(out.runs.len(), 2);
        let spx = &out.runs[&IndexCode::Spx];
        assert_eq!(spx.result.rows.len(), 5);
        assert!(spx.output_path.exists());
        // Percent short rates are normalized before the forward computation.
        assert!(spx.result.rows.iter().all(|r| r.short_rate < 0.1));

        assert!(cfg.summary_path().exists());
        assert_eq!(out.charts.len(), 2);
        assert!(out.charts.iter().all(|p| p.exists()));
        assert_eq!(
            date_span(&out.runs),
            Some((
                NaiveDate::from_ymd_opt(2019, 12, 2).unwrap(),
                NaiveDate::from_ymd_opt(2020, 1, 3).unwrap()
            ))
        );

        let replotted = replot(&cfg).unwrap();
        assert_eq!(replotted.len(), 2);
    }

    #[test]
    fn a_failing_index_does_not_stop_its_siblings() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        seed_short_rates(root);
        seed_inputs(root, IndexCode::Spx, false);

        let mut cfg = config(root, vec![IndexCode::Spx, IndexCode::Indu]);
        cfg.plot = false;
        let out = run_all(&cfg).unwrap();

        assert!(out.runs.contains_key(&IndexCode::Spx));
        assert!(matches!(out.failures.get(&IndexCode::Indu), Some(PipelineError::MissingInput { .. })));
        assert!(out.charts.is_empty());

        let summary = fs::read_to_string(cfg.summary_path()).unwrap();
        assert!(summary.contains("INDU_Calendar_spread.csv"));
    }

    #[test]
    fn empty_mid_window_is_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        seed_short_rates(root);
        seed_inputs(root, IndexCode::Spx, false);

        let mut cfg = config(root, vec![IndexCode::Spx]);
        cfg.start_date = NaiveDate::from_ymd_opt(2020, 1, 2).unwrap();
        assert!(cfg.mid_date < cfg.start_date);

        let out = run_all(&cfg).unwrap();
        assert_eq!(out.runs.len(), 1);
        assert_eq!(out.charts, vec![cfg.output_dir.join("all_indices_spread_to_present.svg")]);
        assert_eq!(replot(&cfg).unwrap().len(), 1);
    }

    #[test]
    fn missing_short_rates_fail_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path(), vec![IndexCode::Spx]);
        assert!(matches!(run_all(&cfg), Err(PipelineError::MissingInput { .. })));
    }

    #[test]
    fn all_indices_failing_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        seed_short_rates(dir.path());
        let cfg = config(dir.path(), vec![IndexCode::Ndx]);
        let err = run_all(&cfg).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }
}
