//! Shared domain types.
//!
//! Rows are strongly typed once, at the CSV boundary (`io::ingest`), so the
//! computational core never addresses fields by column name.

use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Equity index whose futures term structure is analysed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ValueEnum)]
pub enum IndexCode {
    #[serde(rename = "SPX")]
    #[value(name = "SPX", alias = "spx")]
    Spx,
    #[serde(rename = "NDX")]
    #[value(name = "NDX", alias = "ndx")]
    Ndx,
    #[serde(rename = "INDU")]
    #[value(name = "INDU", alias = "indu")]
    Indu,
}

impl IndexCode {
    pub const ALL: [IndexCode; 3] = [IndexCode::Spx, IndexCode::Ndx, IndexCode::Indu];

    /// Ticker-style code used in file and column names.
    pub fn code(self) -> &'static str {
        match self {
            IndexCode::Spx => "SPX",
            IndexCode::Ndx => "NDX",
            IndexCode::Indu => "INDU",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            IndexCode::Spx => "S&P 500",
            IndexCode::Ndx => "Nasdaq-100",
            IndexCode::Indu => "Dow Jones Industrial",
        }
    }

    /// Column holding this index's spread in the reference validation file.
    pub fn reference_column(self) -> &'static str {
        match self {
            IndexCode::Spx => "Eq_SF_SPX",
            IndexCode::Ndx => "Eq_SF_NDAQ",
            IndexCode::Indu => "Eq_SF_Dow",
        }
    }

    pub fn implied_forward_column(self) -> String {
        format!("cal_{}_rf", self.code())
    }

    pub fn short_rate_forward_column(self) -> String {
        format!("ois_fwd_{}", self.code())
    }

    pub fn spread_column(self) -> String {
        format!("spread_{}", self.code())
    }
}

impl std::fmt::Display for IndexCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// How short-rate inputs are quoted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RateUnit {
    /// Treat the series as percent when its largest absolute value is `>= 1.0`.
    Auto,
    /// Rates are already decimals (`0.0325`).
    Decimal,
    /// Rates are percentages (`3.25`) and are divided by 100.
    Percent,
}

/// One trading date of the two nearest futures contracts for one index.
///
/// Every field except `date` may be missing in the source file; rows that
/// lack something the forward computation needs are dropped by the engine,
/// not here.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractObservation {
    pub date: NaiveDate,
    pub term1_price: Option<f64>,
    pub term2_price: Option<f64>,
    pub term1_settlement_date: Option<NaiveDate>,
    pub term2_settlement_date: Option<NaiveDate>,
    /// Days from `date` to the Term-1 settlement.
    pub term1_ttm: Option<i64>,
    /// Days from `date` to the Term-2 settlement.
    pub term2_ttm: Option<i64>,
}

/// One short-rate fixing, in decimal form.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShortRateObservation {
    pub date: NaiveDate,
    pub rate: f64,
}

/// One day of index dividends (index points).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DividendRecord {
    pub date: NaiveDate,
    pub daily_dividend: f64,
}

/// A fully computed forward-rate row for one index and date.
///
/// `implied_forward_rate` and `spread_bps` are `None` when the outlier filter
/// flagged the row.
#[derive(Debug, Clone, PartialEq)]
pub struct ForwardRateRow {
    pub observation: ContractObservation,
    pub short_rate: f64,
    /// Calendar days between the observation date and the short-rate fixing used.
    pub short_rate_lag_days: i64,
    pub cum_div_current: f64,
    pub cum_div_term1: f64,
    pub cum_div_term2: f64,
    pub div_sum1: f64,
    pub div_sum2: f64,
    pub div_sum1_comp: f64,
    pub div_sum2_comp: f64,
    pub implied_forward_raw: f64,
    /// Annualized implied calendar forward rate, percent.
    pub implied_forward_rate: Option<f64>,
    pub short_rate_forward_raw: f64,
    /// Annualized short-rate-implied forward rate, percent.
    pub short_rate_forward: f64,
    /// Spread after filtering, percentage points (`None` for outliers).
    pub spread_filtered: Option<f64>,
    /// Final spread, basis points (`None` for outliers).
    pub spread_bps: Option<f64>,
    pub is_outlier: bool,
}

impl ForwardRateRow {
    pub fn date(&self) -> NaiveDate {
        self.observation.date
    }
}

/// Outlier filter settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterParams {
    /// Half-width of the centered window; the full window is `2 * window + 1` rows.
    pub window: usize,
    /// Deviation-to-dispersion ratio at or above which a point is an outlier.
    pub threshold: f64,
}

impl Default for FilterParams {
    fn default() -> Self {
        Self {
            window: 45,
            threshold: 10.0,
        }
    }
}

/// A full run's configuration as understood by the pipeline.
///
/// Built once from settings + CLI flags and passed by reference to every stage.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub indices: Vec<IndexCode>,
    /// Raw inputs (daily dividends).
    pub input_dir: PathBuf,
    /// Cached fallback for raw inputs.
    pub manual_dir: PathBuf,
    /// Term structures, short rates and forward-rate outputs.
    pub processed_dir: PathBuf,
    /// Charts and run summary.
    pub output_dir: PathBuf,

    pub start_date: NaiveDate,
    pub mid_date: NaiveDate,
    pub end_date: NaiveDate,

    pub filter: FilterParams,
    pub rate_unit: RateUnit,
    /// Short-rate as-of matches older than this many days are counted as stale.
    pub stale_after_days: i64,

    pub plot: bool,
    pub chart_width: u32,
    pub chart_height: u32,
}

impl RunConfig {
    pub fn contracts_path(&self, index: IndexCode) -> PathBuf {
        self.processed_dir.join(format!("{}_Calendar_spread.csv", index.code()))
    }

    pub fn short_rates_path(&self) -> PathBuf {
        self.processed_dir.join("cleaned_ois_rates.csv")
    }

    /// Primary and fallback locations of an index's daily dividend file.
    pub fn dividend_paths(&self, index: IndexCode) -> (PathBuf, PathBuf) {
        let name = format!("{}_daily_dividends.csv", index.code());
        (self.input_dir.join(&name), self.manual_dir.join(name))
    }

    pub fn forward_rates_path(&self, index: IndexCode) -> PathBuf {
        forward_rates_path(&self.processed_dir, index)
    }

    pub fn summary_path(&self) -> PathBuf {
        self.output_dir.join("forward_rate_run_summary.json")
    }

    pub fn chart_paths(&self) -> [(NaiveDate, PathBuf); 2] {
        [
            (
                self.mid_date,
                self.output_dir
                    .join(format!("all_indices_spread_to_{}.svg", self.mid_date.year())),
            ),
            (self.end_date, self.output_dir.join("all_indices_spread_to_present.svg")),
        ]
    }
}

pub fn forward_rates_path(processed_dir: &Path, index: IndexCode) -> PathBuf {
    processed_dir.join(format!("{}_Forward_Rates.csv", index.code()))
}
