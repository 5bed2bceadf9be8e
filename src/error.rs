//! Error types.
//!
//! - `PipelineError` covers everything that can go wrong while computing one
//!   index (missing files, missing columns, unreadable CSV, output failures).
//!   It is fatal for that index only.
//! - `AppError` is what the binary ultimately reports: a message plus a
//!   process exit code.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Missing input file '{}'", path.display())]
    MissingInput { path: PathBuf },

    #[error("'{}' is missing required column `{column}`", path.display())]
    MissingColumn { path: PathBuf, column: String },

    #[error("Failed to read '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Failed to write '{}': {message}", path.display())]
    Write { path: PathBuf, message: String },

    #[error("No usable rows in '{}'", path.display())]
    EmptyInput { path: PathBuf },

    #[error("Failed to render chart '{}': {message}", path.display())]
    Chart { path: PathBuf, message: String },
}

impl PipelineError {
    pub fn exit_code(&self) -> u8 {
        match self {
            PipelineError::MissingInput { .. }
            | PipelineError::MissingColumn { .. }
            | PipelineError::Read { .. } => 2,
            PipelineError::EmptyInput { .. } => 3,
            PipelineError::Write { .. } | PipelineError::Chart { .. } => 4,
        }
    }
}

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        AppError::new(err.exit_code(), err.to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}
