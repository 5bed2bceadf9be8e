//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - the analysed indices and input conventions (`IndexCode`, `RateUnit`)
//! - typed input rows (`ContractObservation`, `ShortRateObservation`, `DividendRecord`)
//! - computed outputs (`ForwardRateRow`)
//! - run configuration (`RunConfig`, `FilterParams`)

pub mod types;

pub use types::*;
