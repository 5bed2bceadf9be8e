//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments and environment settings
//! - builds one `RunConfig`
//! - dispatches to the pipeline (`run`, `plot`, `validate`)
//! - prints reports

use clap::Parser;
use tracing::info;

use crate::cli::{ChartArgs, Command, PathArgs, PlotArgs, RunArgs, ValidateArgs};
use crate::domain::{FilterParams, IndexCode, RateUnit, RunConfig};
use crate::error::AppError;
use crate::report::{ValidationStatus, ValidationThresholds};
use crate::settings::Settings;

pub mod pipeline;

/// Entry point for the `fwdspread` binary.
pub fn run() -> Result<(), AppError> {
    // `fwdspread` and `fwdspread --index SPX` behave like `fwdspread run ...`.
    let argv = rewrite_args(std::env::args().collect());
    let cli = crate::cli::Cli::parse_from(argv);
    let settings = Settings::from_env()?;

    match cli.command {
        Command::Run(args) => handle_run(&settings, args),
        Command::Plot(args) => handle_plot(&settings, args),
        Command::Validate(args) => handle_validate(&settings, args),
    }
}

fn handle_run(settings: &Settings, args: RunArgs) -> Result<(), AppError> {
    let config = run_config_from_args(settings, &args)?;
    info!(
        indices = ?config.indices,
        window = config.filter.window,
        threshold = config.filter.threshold,
        "starting run"
    );
    let output = pipeline::run_all(&config)?;

    for run in output.runs.values() {
        println!("{}", crate::report::format_index_summary(&run.result, &run.output_path));
        if run.contract_row_errors > 0 {
            println!("Unreadable contract rows skipped: {}\n", run.contract_row_errors);
        }
    }
    for (index, err) in &output.failures {
        eprintln!("{index}: {err}");
    }
    if let Some((first, last)) = pipeline::date_span(&output.runs) {
        println!("Computed dates: {first} to {last}");
    }
    if let Some(path) = &output.summary_path {
        println!("Summary: {}", path.display());
    }
    for path in &output.charts {
        println!("Chart: {}", path.display());
    }
    Ok(())
}

fn handle_plot(settings: &Settings, args: PlotArgs) -> Result<(), AppError> {
    let mut config = base_config(settings, &args.paths)?;
    apply_chart_args(&mut config, &args.chart)?;
    for path in pipeline::replot(&config)? {
        println!("Chart: {}", path.display());
    }
    Ok(())
}

fn handle_validate(settings: &Settings, args: ValidateArgs) -> Result<(), AppError> {
    let config = base_config(settings, &args.paths)?;
    let thresholds = ValidationThresholds {
        min_correlation: args.min_correlation,
        max_rmse: args.max_rmse,
    };
    let reference = crate::report::load_reference_spreads(&args.reference)?;

    let results: Vec<_> = config
        .indices
        .iter()
        .map(|&index| {
            let path = config.forward_rates_path(index);
            let series = reference.series(index.reference_column());
            match crate::io::read_forward_rates_csv(&path, index) {
                Ok(rows) => crate::report::validate_index(index, &rows, series.as_deref(), &thresholds),
                Err(err) => crate::report::IndexValidation {
                    index,
                    overlap: false,
                    paired: 0,
                    correlation: None,
                    rmse: None,
                    dates_strictly_increasing: false,
                    status: ValidationStatus::Fail(err.to_string()),
                },
            }
        })
        .collect();

    println!("{}", crate::report::format_validation(&results));

    let failed: Vec<String> = results
        .iter()
        .filter(|v| matches!(v.status, ValidationStatus::Fail(_)))
        .map(|v| v.index.code().to_string())
        .collect();
    if failed.is_empty() {
        Ok(())
    } else {
        Err(AppError::new(1, format!("Validation failed for: {}", failed.join(", "))))
    }
}

/// Settings plus the flags shared by every command; computation knobs at defaults.
pub fn base_config(settings: &Settings, paths: &PathArgs) -> Result<RunConfig, AppError> {
    let indices = if paths.indices.is_empty() {
        IndexCode::ALL.to_vec()
    } else {
        let mut v = paths.indices.clone();
        v.sort();
        v.dedup();
        v
    };

    let config = RunConfig {
        indices,
        input_dir: paths.input_dir.clone().unwrap_or_else(|| settings.input_dir.clone()),
        manual_dir: paths.manual_dir.clone().unwrap_or_else(|| settings.manual_dir.clone()),
        processed_dir: paths
            .processed_dir
            .clone()
            .unwrap_or_else(|| settings.processed_dir.clone()),
        output_dir: paths.output_dir.clone().unwrap_or_else(|| settings.output_dir.clone()),
        start_date: paths.start.unwrap_or(settings.start_date),
        mid_date: paths.mid,
        end_date: paths.end.unwrap_or(settings.end_date),
        filter: FilterParams::default(),
        rate_unit: RateUnit::Auto,
        stale_after_days: 5,
        plot: true,
        chart_width: 1200,
        chart_height: 600,
    };

    if config.end_date < config.start_date {
        return Err(AppError::new(
            2,
            format!("End date {} is before start date {}.", config.end_date, config.start_date),
        ));
    }
    Ok(config)
}

pub fn run_config_from_args(settings: &Settings, args: &RunArgs) -> Result<RunConfig, AppError> {
    let mut config = base_config(settings, &args.paths)?;

    if !args.threshold.is_finite() || args.threshold <= 0.0 {
        return Err(AppError::new(2, "--threshold must be a positive number."));
    }
    if args.stale_days < 0 {
        return Err(AppError::new(2, "--stale-days must be >= 0."));
    }
    config.filter = FilterParams {
        window: args.window,
        threshold: args.threshold,
    };
    config.rate_unit = args.rate_unit;
    config.stale_after_days = args.stale_days;
    config.plot = !args.no_plot;
    apply_chart_args(&mut config, &args.chart)?;
    Ok(config)
}

fn apply_chart_args(config: &mut RunConfig, chart: &ChartArgs) -> Result<(), AppError> {
    if chart.width < 200 || chart.height < 150 {
        return Err(AppError::new(2, "Chart size must be at least 200x150 pixels."));
    }
    config.chart_width = chart.width;
    config.chart_height = chart.height;
    Ok(())
}

/// Rewrite argv so `fwdspread` defaults to `fwdspread run`.
///
/// Rules:
/// - `fwdspread`                      -> `fwdspread run`
/// - `fwdspread --index SPX ...`      -> `fwdspread run --index SPX ...`
/// - `fwdspread --help/--version/-h`  -> unchanged (show top-level help/version)
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        argv.push("run".to_string());
        return argv;
    };

    let is_top_level_help_or_version = matches!(
        arg1.as_str(),
        "-h" | "--help" | "-V" | "--version" | "help"
    );
    if is_top_level_help_or_version {
        return argv;
    }

    let is_subcommand = matches!(arg1.as_str(), "run" | "plot" | "validate");
    if is_subcommand {
        return argv;
    }

    if arg1.starts_with('-') {
        argv.insert(1, "run".to_string());
        return argv;
    }

    argv
}
