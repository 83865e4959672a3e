//! Mathematical utilities: descriptive statistics and the normal distribution.

pub mod stats;

pub use stats::*;
