//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - cleaned inputs (`PollRecord`, `ElectoralMap`, `FixedOutcomes`)
//! - model configuration (`PriorSpec`, `BiasSpec`, `ForecastConfig`)
//! - derived estimates (`RegionSummary`, `PosteriorEstimate`)

pub mod types;

pub use types::*;
