//! Shared forecast pipeline used by the `run` and `demo` front-ends.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! polls -> aggregation -> posteriors -> simulation -> summary
//!
//! The front-ends then only differ in where inputs come from.

use std::collections::BTreeMap;

use log::{debug, info, warn};
use serde::Serialize;

use crate::aggregate::{AggregationPolicy, aggregate_polls, aggregate_region};
use crate::domain::{
    BiasSpec, Candidate, ElectoralMap, FixedOutcomes, ForecastConfig, PollRecord, PosteriorEstimate,
    RegionSummary,
};
use crate::error::ForecastError;
use crate::math::median;
use crate::model::{BiasModel, estimate_posteriors, update_region};
use crate::report::{
    NationalSummary, TotalsSummary, majority_threshold, posterior_win_probability, summarize_national,
    summarize_totals,
};
use crate::simulate::{Simulation, SimulationOptions, simulate};

/// Materialized inputs of one forecast.
#[derive(Debug, Clone)]
pub struct ForecastInputs {
    pub polls: Vec<PollRecord>,
    pub map: ElectoralMap,
    /// Outcomes used for regions that end up with no accepted polls.
    pub fixed: FixedOutcomes,
    /// Per-region `σ_b` overrides.
    pub bias_overrides: BTreeMap<String, f64>,
}

/// A region decided by the caller rather than by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnmodeledRegion {
    pub region: String,
    pub weight: u32,
    pub outcome: Candidate,
}

/// Per-region view joining the summary with its posterior.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionForecast {
    pub summary: RegionSummary,
    pub posterior: PosteriorEstimate,
    pub bias_sd: f64,
    /// `Φ(mean / se)`.
    pub win_probability: f64,
}

/// All computed outputs of a single forecast run.
#[derive(Debug, Clone, Serialize)]
pub struct ForecastRun {
    pub regions: Vec<RegionForecast>,
    pub unmodeled: Vec<UnmodeledRegion>,
    pub unmapped: Vec<String>,
    pub imputed_sd: Option<f64>,
    pub polls_accepted: usize,
    pub polls_rejected: usize,
    pub national: Option<NationalSummary>,
    pub summary: TotalsSummary,
    #[serde(skip)]
    pub simulation: Simulation,
}

impl ForecastRun {
    pub fn summaries(&self) -> impl Iterator<Item = &RegionSummary> {
        self.regions.iter().map(|r| &r.summary)
    }

    pub fn posteriors(&self) -> impl Iterator<Item = &PosteriorEstimate> {
        self.regions.iter().map(|r| &r.posterior)
    }
}

/// Execute the full forecast and return the computed outputs.
pub fn run_forecast(inputs: &ForecastInputs, config: &ForecastConfig) -> Result<ForecastRun, ForecastError> {
    config.validate()?;
    let threshold = validate_inputs(inputs, config)?;
    let policy = AggregationPolicy::from_config(config);

    // 1) Split off national polls; they never carry electoral weight.
    let national_id = config.national.region.as_str();
    let (national_polls, region_polls): (Vec<PollRecord>, Vec<PollRecord>) =
        inputs.polls.iter().cloned().partition(|p| p.region == national_id);

    // 2) Aggregate region polls (two passes: accumulate, then impute).
    info!(
        "Aggregating {} region polls and {} national polls.",
        region_polls.len(),
        national_polls.len()
    );
    let agg = aggregate_polls(&region_polls, &inputs.map, &policy)?;
    if let Some(sd) = agg.imputed_sd {
        let imputed: Vec<&str> = agg.imputed_regions().collect();
        debug!("Imputed sd {sd:.4} for single-poll regions: {}.", imputed.join(", "));
    }

    // 3) Unmodeled regions take the caller's fixed outcome.
    let mut fixed = FixedOutcomes::new();
    let mut unmodeled = Vec::with_capacity(agg.unmodeled.len());
    for region in &agg.unmodeled {
        let outcome = inputs.fixed.get(region).copied().ok_or_else(|| {
            ForecastError::config(format!(
                "Region '{region}' has no accepted polls and no fixed outcome was supplied."
            ))
        })?;
        fixed.insert(region.clone(), outcome);
        unmodeled.push(UnmodeledRegion {
            region: region.clone(),
            weight: inputs.map.weight(region).unwrap_or(0),
            outcome,
        });
    }
    for region in inputs.fixed.keys().filter(|r| !fixed.contains_key(*r)) {
        debug!("Region '{region}' has polls; its fixed outcome is not used.");
    }

    // 4) Posteriors with the bias variance folded in.
    let bias = BiasModel::new(&BiasSpec {
        sd: config.bias_sd,
        overrides: inputs.bias_overrides.clone(),
    })?;
    for region in inputs.bias_overrides.keys() {
        if !inputs.map.contains(region) {
            warn!("Bias override for '{region}' ignored: region is not in the electoral map.");
        }
    }
    let posteriors = estimate_posteriors(&agg.summaries, &config.prior, &bias)?;

    // 5) Simulate.
    let simulation = simulate(
        &posteriors,
        &inputs.map,
        &fixed,
        &SimulationOptions {
            replicates: config.replicates,
            seed: config.seed,
            tie_break: config.tie_break,
        },
    )?;

    // 6) Summarize.
    let summary = summarize_totals(&simulation.totals, threshold, config.bin_width)?;
    info!(
        "Win probability {:.3} over {} replicates (threshold {threshold}).",
        summary.win_probability, summary.replicates
    );

    // 7) National popular vote, with its own prior and bias.
    let fallback_sd = median(
        &agg.summaries
            .iter()
            .filter(|s| s.count >= 2)
            .filter_map(|s| s.sd_spread)
            .collect::<Vec<_>>(),
    );
    let national = national_forecast(&national_polls, config, &policy, fallback_sd)?;

    let regions = agg
        .summaries
        .iter()
        .cloned()
        .zip(posteriors)
        .map(|(summary, posterior)| RegionForecast {
            bias_sd: bias.sd_for(&summary.region),
            win_probability: posterior_win_probability(&posterior, config.tie_break),
            summary,
            posterior,
        })
        .collect();

    Ok(ForecastRun {
        regions,
        unmodeled,
        unmapped: agg.unmapped,
        imputed_sd: agg.imputed_sd,
        polls_accepted: agg.accepted,
        polls_rejected: agg.rejected,
        national,
        summary,
        simulation,
    })
}

/// Input checks that need no aggregation. Returns the majority threshold.
fn validate_inputs(inputs: &ForecastInputs, config: &ForecastConfig) -> Result<u32, ForecastError> {
    let national_id = config.national.region.as_str();
    if inputs.map.contains(national_id) {
        return Err(ForecastError::config(format!(
            "National region id '{national_id}' must not appear in the electoral map."
        )));
    }
    if let Some(region) = inputs.fixed.keys().find(|r| !inputs.map.contains(r)) {
        return Err(ForecastError::config(format!(
            "Fixed outcome given for unknown region '{region}'."
        )));
    }

    let total_weight = inputs.map.total_weight();
    let threshold = config.threshold.unwrap_or_else(|| majority_threshold(total_weight));
    if threshold >= total_weight {
        return Err(ForecastError::config(format!(
            "Threshold {threshold} leaves no winning total (total weight {total_weight})."
        )));
    }
    Ok(threshold)
}

fn national_forecast(
    polls: &[PollRecord],
    config: &ForecastConfig,
    policy: &AggregationPolicy,
    fallback_sd: Option<f64>,
) -> Result<Option<NationalSummary>, ForecastError> {
    let region = config.national.region.as_str();
    let summary = match aggregate_region(polls, region, policy, fallback_sd) {
        Ok(Some(summary)) => summary,
        Ok(None) => {
            info!("No accepted national polls for '{region}'; skipping the popular-vote estimate.");
            return Ok(None);
        }
        Err(ForecastError::InsufficientData(msg)) => {
            warn!("Skipping the popular-vote estimate: {msg}");
            return Ok(None);
        }
        Err(e) => return Err(e),
    };

    let bias = BiasModel::uniform(config.national.bias_sd)?;
    let posterior = update_region(&summary, &config.national.prior, &bias)?;
    Ok(Some(summarize_national(posterior, config.z, config.tie_break)))
}
