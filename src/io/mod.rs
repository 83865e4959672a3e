//! Input/output helpers.
//!
//! - CSV ingest of polls and electoral maps (`ingest`)
//! - JSON/CSV result exports (`export`)

pub mod export;
pub mod ingest;

pub use export::*;
pub use ingest::*;
