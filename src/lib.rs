//! `fwd-spread` library crate.
//!
//! The binary (`fwdspread`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - the forward-rate engine, filter and aligner are reusable on their own

pub mod align;
pub mod app;
pub mod cli;
pub mod dividends;
pub mod domain;
pub mod error;
pub mod filter;
pub mod forward;
pub mod io;
pub mod math;
pub mod plot;
pub mod report;
pub mod settings;
