//! Command-line parsing for the forward-spread pipeline.
//!
//! Argument parsing and command dispatch stay separate from the computation
//! code. Every flag that overrides a setting is optional so the environment
//! (or its defaults) applies when the flag is absent.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

use crate::domain::{IndexCode, RateUnit};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "fwdspread",
    version,
    about = "Implied calendar forward rates and OIS spreads for equity index futures"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Compute forward rates and spreads for each index, persist them, and render charts.
    Run(RunArgs),
    /// Re-render the spread charts from previously persisted forward-rate files.
    Plot(PlotArgs),
    /// Compare persisted spreads against a reference spread file.
    Validate(ValidateArgs),
}

/// Directory and window overrides shared by every subcommand.
#[derive(Debug, Args, Clone)]
pub struct PathArgs {
    /// Indices to process (repeatable). Defaults to all of SPX, NDX, INDU.
    #[arg(short = 'i', long = "index", value_enum)]
    pub indices: Vec<IndexCode>,

    /// Directory with raw daily dividend files (overrides INPUT_DIR).
    #[arg(long, value_name = "DIR")]
    pub input_dir: Option<PathBuf>,

    /// Fallback directory for dividend files (overrides MANUAL_DATA_DIR).
    #[arg(long, value_name = "DIR")]
    pub manual_dir: Option<PathBuf>,

    /// Directory with term structures, short rates and forward-rate tables (overrides PROCESSED_DIR).
    #[arg(long, value_name = "DIR")]
    pub processed_dir: Option<PathBuf>,

    /// Directory for charts and the run summary (overrides OUTPUT_DIR).
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// First date shown in charts (overrides START_DATE).
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub start: Option<NaiveDate>,

    /// Last date of the full-history chart (overrides END_DATE).
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub end: Option<NaiveDate>,

    /// Last date of the shorter-history chart.
    #[arg(long, value_name = "YYYY-MM-DD", default_value = "2020-01-01")]
    pub mid: NaiveDate,
}

/// Chart output options.
#[derive(Debug, Args, Clone)]
pub struct ChartArgs {
    /// Chart width (pixels).
    #[arg(long, default_value_t = 1200)]
    pub width: u32,

    /// Chart height (pixels).
    #[arg(long, default_value_t = 600)]
    pub height: u32,
}

/// Options for a full computation run.
#[derive(Debug, Args, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub paths: PathArgs,

    #[command(flatten)]
    pub chart: ChartArgs,

    /// Half-width of the centered outlier-filter window (rows); the full window is 2w+1.
    #[arg(long, default_value_t = 45)]
    pub window: usize,

    /// Deviation-to-dispersion ratio at or above which a spread is an outlier.
    #[arg(long, default_value_t = 10.0)]
    pub threshold: f64,

    /// Count short-rate joins older than this many calendar days as stale.
    #[arg(long, default_value_t = 5)]
    pub stale_days: i64,

    /// How the short-rate file quotes its rates.
    #[arg(long, value_enum, default_value_t = RateUnit::Auto)]
    pub rate_unit: RateUnit,

    /// Skip chart rendering.
    #[arg(long)]
    pub no_plot: bool,
}

/// Options for re-rendering charts.
#[derive(Debug, Args, Clone)]
pub struct PlotArgs {
    #[command(flatten)]
    pub paths: PathArgs,

    #[command(flatten)]
    pub chart: ChartArgs,
}

/// Options for reference validation.
#[derive(Debug, Args, Clone)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub paths: PathArgs,

    /// Reference spread CSV (date in the first column, one spread column per index).
    #[arg(long, value_name = "CSV")]
    pub reference: PathBuf,

    /// Minimum Pearson correlation for a pass.
    #[arg(long, default_value_t = 0.95)]
    pub min_correlation: f64,

    /// Maximum RMSE (bps) for a pass; the comparison is strict.
    #[arg(long, default_value_t = 5.0)]
    pub max_rmse: f64,
}
