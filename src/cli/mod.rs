//! Command-line parsing for the poll forecaster.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the aggregation/model code.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

use crate::config::resolve_z;
use crate::domain::{ForecastConfig, TieBreak};
use crate::error::ForecastError;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "forecast",
    version,
    about = "Poll aggregation, hierarchical Bayesian shrinkage and Monte Carlo electoral forecasts"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Forecast from a poll CSV and an electoral map CSV.
    Run(RunArgs),
    /// Forecast a synthetic scenario (no input files needed).
    Demo(DemoArgs),
}

#[derive(Debug, Args, Clone)]
pub struct RunArgs {
    /// Poll CSV (region, pollster, end_date, share_a, share_b, sample_size[, grade]).
    #[arg(long, value_name = "CSV")]
    pub polls: PathBuf,

    /// Electoral map CSV (region, weight[, fixed][, bias_sd]).
    #[arg(long, value_name = "CSV")]
    pub map: PathBuf,

    /// TOML run configuration; flags override its values.
    #[arg(long, value_name = "TOML")]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub model: ModelArgs,

    #[command(flatten)]
    pub export: ExportArgs,
}

#[derive(Debug, Args, Clone)]
pub struct DemoArgs {
    /// Seed for the synthetic polls (the simulation uses `--seed`).
    #[arg(long, default_value_t = 2016)]
    pub data_seed: u64,

    /// Polls generated per battleground region.
    #[arg(long, default_value_t = 6)]
    pub polls_per_region: usize,

    /// TOML run configuration; flags override its values.
    #[arg(long, value_name = "TOML")]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub model: ModelArgs,

    #[command(flatten)]
    pub export: ExportArgs,
}

#[derive(Debug, Args, Clone, Default)]
pub struct ExportArgs {
    /// Export the full report (summaries, posteriors, simulation summary) to JSON.
    #[arg(long = "export-json", value_name = "JSON")]
    pub export_json: Option<PathBuf>,

    /// Export per-replicate totals to CSV.
    #[arg(long = "export-totals", value_name = "CSV")]
    pub export_totals: Option<PathBuf>,
}

/// Model options. Unset flags fall back to the config file, then to defaults.
#[derive(Debug, Args, Clone, Default)]
pub struct ModelArgs {
    /// Prior mean of every region's spread (default 0).
    #[arg(long, allow_hyphen_values = true)]
    pub prior_mean: Option<f64>,

    /// Prior standard deviation τ (default 0.02; `inf` for a flat prior).
    #[arg(long)]
    pub prior_sd: Option<f64>,

    /// Systematic bias standard deviation σ_b (default 0.03).
    #[arg(long)]
    pub bias_sd: Option<f64>,

    /// Region id used by national polls (default US).
    #[arg(long)]
    pub national_id: Option<String>,

    #[arg(long, allow_hyphen_values = true)]
    pub national_prior_mean: Option<f64>,

    /// National prior sd (default 0.035).
    #[arg(long)]
    pub national_prior_sd: Option<f64>,

    /// National bias sd (default 0.025).
    #[arg(long)]
    pub national_bias_sd: Option<f64>,

    /// Drop polls that ended before this date (YYYY-MM-DD).
    #[arg(long, value_name = "DATE")]
    pub since: Option<NaiveDate>,

    /// Accepted quality grade; repeat for several. Ungraded polls are always kept.
    #[arg(long = "grade", value_name = "GRADE")]
    pub grades: Vec<String>,

    /// Number of Monte Carlo replicates (default 10000).
    #[arg(long = "sims")]
    pub replicates: Option<usize>,

    /// Simulation seed (default 42).
    #[arg(long)]
    pub seed: Option<u64>,

    /// Winner of a region whose simulated margin is exactly zero.
    #[arg(long, value_enum)]
    pub tie_break: Option<TieBreak>,

    /// Totals strictly above this value win (default: half the total weight).
    #[arg(long)]
    pub threshold: Option<u32>,

    /// Credible-interval multiplier (default 1.96).
    #[arg(long, conflicts_with = "confidence")]
    pub z: Option<f64>,

    /// Central credible level, e.g. 0.9; converted to z.
    #[arg(long)]
    pub confidence: Option<f64>,

    /// Histogram bin width (default 10).
    #[arg(long)]
    pub bin_width: Option<u32>,
}

impl ModelArgs {
    /// Overlay explicitly given flags onto `config`.
    pub fn apply(&self, config: &mut ForecastConfig) -> Result<(), ForecastError> {
        if let Some(v) = self.prior_mean {
            config.prior.mean = v;
        }
        if let Some(v) = self.prior_sd {
            config.prior.sd = v;
        }
        if let Some(v) = self.bias_sd {
            config.bias_sd = v;
        }
        if let Some(v) = &self.national_id {
            config.national.region = v.clone();
        }
        if let Some(v) = self.national_prior_mean {
            config.national.prior.mean = v;
        }
        if let Some(v) = self.national_prior_sd {
            config.national.prior.sd = v;
        }
        if let Some(v) = self.national_bias_sd {
            config.national.bias_sd = v;
        }
        if let Some(v) = self.since {
            config.min_end_date = Some(v);
        }
        if !self.grades.is_empty() {
            config.accepted_grades = self.grades.iter().map(|g| g.trim().to_string()).collect();
        }
        if let Some(v) = self.replicates {
            config.replicates = v;
        }
        if let Some(v) = self.seed {
            config.seed = v;
        }
        if let Some(v) = self.tie_break {
            config.tie_break = v;
        }
        if let Some(v) = self.threshold {
            config.threshold = Some(v);
        }
        if let Some(z) = resolve_z(self.z, self.confidence)? {
            config.z = z;
        }
        if let Some(v) = self.bin_width {
            config.bin_width = v;
        }
        Ok(())
    }
}
