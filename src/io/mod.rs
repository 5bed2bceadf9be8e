//! Input/output helpers.
//!
//! - CSV ingest + validation of the three input tables (`ingest`)
//! - per-index forward-rate tables, write and read back (`export`)
//! - JSON run summary (`summary`)

pub mod export;
pub mod ingest;
pub mod summary;

pub use export::*;
pub use ingest::*;
pub use summary::*;
