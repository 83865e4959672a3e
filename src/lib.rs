//! `poll-forecast` library crate.
//!
//! The binary (`forecast`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - the pipeline stages (aggregate, model, simulate, report) are reusable on
//!   their own

pub mod aggregate;
pub mod app;
pub mod cli;
pub mod config;
pub mod data;
pub mod domain;
pub mod error;
pub mod io;
pub mod math;
pub mod model;
pub mod report;
pub mod simulate;
