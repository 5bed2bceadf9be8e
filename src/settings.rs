//! Directory and date-window settings from the environment (`.env` supported).
//!
//! Every key is optional; unset keys fall back to the project layout
//! defaults. Relative paths resolve against a base directory (the working
//! directory for `from_env`).

use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::error::AppError;
use crate::io::ingest::parse_date;

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub input_dir: PathBuf,
    pub manual_dir: PathBuf,
    pub processed_dir: PathBuf,
    pub output_dir: PathBuf,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl Settings {
    /// Load `.env` (if any) and resolve settings from the process environment.
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();
        let cwd = std::env::current_dir()
            .map_err(|e| AppError::new(2, format!("Cannot determine working directory: {e}")))?;
        Self::from_lookup(|key| std::env::var(key).ok(), &cwd)
    }

    /// Resolve settings through `lookup`, which returns the raw value of a key.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>, base: &Path) -> Result<Self, AppError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let resolve = |raw: String| {
            let path = PathBuf::from(raw);
            if path.is_absolute() { path } else { base.join(path) }
        };
        // INPUT_DIR and PROCESSED_DIR default to subdirectories of DATA_DIR.
        let data_dir = resolve(get("DATA_DIR").unwrap_or_else(|| "_data".to_string()));
        let under_data = |key: &str, sub: &str| get(key).map(&resolve).unwrap_or_else(|| data_dir.join(sub));
        let dir = |key: &str, default: &str| resolve(get(key).unwrap_or_else(|| default.to_string()));
        let date = |key: &str, default: &str| -> Result<NaiveDate, AppError> {
            let raw = get(key).unwrap_or_else(|| default.to_string());
            parse_date(&raw).map_err(|e| AppError::new(2, format!("Invalid {key} '{raw}': {e}")))
        };

        let settings = Settings {
            input_dir: under_data("INPUT_DIR", "input"),
            manual_dir: dir("MANUAL_DATA_DIR", "data_manual"),
            processed_dir: under_data("PROCESSED_DIR", "processed"),
            output_dir: dir("OUTPUT_DIR", "_output"),
            start_date: date("START_DATE", "2010-01-01")?,
            end_date: date("END_DATE", "2024-12-31")?,
        };

        if settings.end_date < settings.start_date {
            return Err(AppError::new(
                2,
                format!(
                    "END_DATE ({}) is before START_DATE ({})",
                    settings.end_date, settings.start_date
                ),
            ));
        }
        Ok(settings)
    }
}
