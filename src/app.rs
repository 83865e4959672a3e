//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and initializes logging
//! - parses CLI arguments and resolves the run configuration
//! - loads or generates inputs
//! - runs the forecast pipeline
//! - prints the report and writes optional exports

use clap::Parser;
use log::{info, warn};

use crate::cli::{Command, DemoArgs, ExportArgs, ModelArgs, RunArgs};
use crate::config::RunFile;
use crate::domain::ForecastConfig;
use crate::error::{AppError, ForecastError};

pub mod pipeline;

use pipeline::{ForecastInputs, ForecastRun};

/// Entry point for the `forecast` binary.
pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    // `forecast` and `forecast --sims 500` behave like `forecast demo ...`.
    let argv = rewrite_args(std::env::args().collect());
    let cli = crate::cli::Cli::parse_from(argv);

    match cli.command {
        Command::Run(args) => handle_run(args),
        Command::Demo(args) => handle_demo(args),
    }
}

fn handle_run(args: RunArgs) -> Result<(), AppError> {
    let config = resolve_config(args.config.as_deref(), &args.model)?;

    let polls = crate::io::load_polls(&args.polls)?;
    if !polls.row_errors.is_empty() {
        warn!(
            "Skipped {} of {} poll rows in {}.",
            polls.row_errors.len(),
            polls.rows_read,
            args.polls.display()
        );
    }
    let map = crate::io::load_electoral_map(&args.map)?;

    let inputs = ForecastInputs {
        polls: polls.polls,
        map: map.map,
        fixed: map.fixed,
        bias_overrides: map.bias_overrides,
    };
    let run = pipeline::run_forecast(&inputs, &config)?;
    finish(&run, &config, &args.export)
}

fn handle_demo(args: DemoArgs) -> Result<(), AppError> {
    let config = resolve_config(args.config.as_deref(), &args.model)?;

    let mut spec = crate::data::demo_spec(args.data_seed, args.polls_per_region);
    if let Some((region, _)) = spec.national.as_mut() {
        region.clone_from(&config.national.region);
    }
    let sample = crate::data::generate_sample(&spec)?;
    info!(
        "Generated {} synthetic polls (realized bias {:+.4}).",
        sample.polls.len(),
        sample.realized_bias
    );

    let inputs = ForecastInputs {
        polls: sample.polls,
        map: sample.map,
        fixed: sample.fixed,
        bias_overrides: Default::default(),
    };
    let run = pipeline::run_forecast(&inputs, &config)?;
    finish(&run, &config, &args.export)
}

fn finish(run: &ForecastRun, config: &ForecastConfig, export: &ExportArgs) -> Result<(), AppError> {
    println!("{}", crate::report::format_run_summary(run, config));

    if let Some(path) = &export.export_json {
        crate::io::write_report_json(path, run)?;
        info!("Wrote report to {}.", path.display());
    }
    if let Some(path) = &export.export_totals {
        crate::io::write_totals_csv(path, &run.simulation.totals)?;
        info!("Wrote replicate totals to {}.", path.display());
    }
    Ok(())
}

/// Defaults, then the optional TOML file, then explicit flags.
pub fn resolve_config(
    file: Option<&std::path::Path>,
    flags: &ModelArgs,
) -> Result<ForecastConfig, ForecastError> {
    let mut config = ForecastConfig::default();
    if let Some(path) = file {
        RunFile::load(path)?.apply(&mut config)?;
    }
    flags.apply(&mut config)?;
    config.validate()?;
    Ok(config)
}

/// Rewrite argv so `forecast` defaults to `forecast demo`.
///
/// Rules:
/// - `forecast`                      -> `forecast demo`
/// - `forecast --sims 500 ...`       -> `forecast demo --sims 500 ...`
/// - `forecast --help/--version/-h`  -> unchanged (show top-level help/version)
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        argv.push("demo".to_string());
        return argv;
    };

    let is_top_level_help_or_version = matches!(
        arg1.as_str(),
        "-h" | "--help" | "-V" | "--version" | "help"
    );
    if is_top_level_help_or_version {
        return argv;
    }

    if arg1.starts_with('-') {
        argv.insert(1, "demo".to_string());
    }
    argv
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn bare_invocation_runs_demo() {
        assert_eq!(rewrite_args(args(&["forecast"])), args(&["forecast", "demo"]));
        assert_eq!(
            rewrite_args(args(&["forecast", "--sims", "5"])),
            args(&["forecast", "demo", "--sims", "5"])
        );
        assert_eq!(rewrite_args(args(&["forecast", "--help"])), args(&["forecast", "--help"]));
        assert_eq!(
            rewrite_args(args(&["forecast", "run", "--polls", "p.csv"])),
            args(&["forecast", "run", "--polls", "p.csv"])
        );
    }

    #[test]
    fn flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.toml");
        std::fs::write(&path, "prior_sd = 0.05\nseed = 9\n").unwrap();
        let flags = ModelArgs {
            seed: Some(11),
            ..ModelArgs::default()
        };
        let config = resolve_config(Some(&path), &flags).unwrap();
        assert_eq!(config.prior.sd, 0.05);
        assert_eq!(config.seed, 11);
    }

    #[test]
    fn invalid_resolved_config_is_rejected() {
        let flags = ModelArgs {
            replicates: Some(0),
            ..ModelArgs::default()
        };
        assert!(matches!(resolve_config(None, &flags), Err(ForecastError::Config(_))));
    }
}
