//! Numerical primitives: as-of lookup and centered rolling statistics.

pub mod asof;
pub mod rolling;

pub use asof::*;
pub use rolling::*;
