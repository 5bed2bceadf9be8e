//! Reporting: terminal summaries and reference validation.
//!
//! Formatting lives in one place so the computation code stays free of
//! presentation concerns.

pub mod format;
pub mod validate;

pub use format::*;
pub use validate::*;
