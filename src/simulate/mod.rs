//! Monte Carlo simulation of the aggregate electoral outcome.
//!
//! Responsibilities:
//!
//! - split one run seed into independent, reproducible per-replicate streams
//! - draw every modeled region per replicate (parallel over replicates)
//! - tally winner-take-all weights plus fixed outcomes into one total per replicate

pub mod engine;
pub mod seed;

pub use engine::*;
pub use seed::*;
