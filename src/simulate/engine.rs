//! Monte Carlo electoral simulation.
//!
//! For each replicate:
//!
//! 1. draw `margin ~ N(posterior_mean, posterior_se)` for every modeled region,
//!    in electoral-map order, from the replicate's own random stream
//! 2. award the region's full weight to candidate A when `margin > 0`, to B when
//!    `margin < 0`, and to the tie-break winner when `margin == 0`
//! 3. add the weight of unmodeled regions fixed for A
//!
//! Posteriors are shared read-only across replicates; the systematic bias is
//! already inside each posterior se and is not drawn again here.

use std::collections::{BTreeMap, BTreeSet};

use log::info;
use rand::Rng;
use rand_distr::StandardNormal;
use rayon::prelude::*;
use serde::Serialize;

use crate::domain::{Candidate, ElectoralMap, FixedOutcomes, PosteriorEstimate, TieBreak};
use crate::error::ForecastError;
use crate::simulate::seed::replicate_rng;

/// Knobs for a simulation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulationOptions {
    pub replicates: usize,
    pub seed: u64,
    pub tie_break: TieBreak,
}

/// One modeled region, flattened for the hot loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contest {
    pub mean: f64,
    pub se: f64,
    pub weight: u32,
}

/// Result of a simulation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Simulation {
    /// Weight won by candidate A, indexed by replicate.
    pub totals: Vec<u32>,
    /// Weight of unmodeled regions fixed for candidate A (included in `totals`).
    pub fixed_for_a: u32,
    /// Weight of unmodeled regions fixed for candidate B.
    pub fixed_for_b: u32,
    /// Weight decided by the simulation.
    pub modeled_weight: u32,
    pub total_weight: u32,
    pub seed: u64,
}

/// Simulate `opts.replicates` outcomes.
///
/// Every region of `map` must be either modeled (a posterior) or fixed (an
/// entry of `fixed`), never both.
pub fn simulate(
    posteriors: &[PosteriorEstimate],
    map: &ElectoralMap,
    fixed: &FixedOutcomes,
    opts: &SimulationOptions,
) -> Result<Simulation, ForecastError> {
    if opts.replicates == 0 {
        return Err(ForecastError::config("Replicate count must be >= 1."));
    }

    let contests = build_contests(posteriors, map, fixed)?;
    let (fixed_for_a, fixed_for_b) = fixed_weights(fixed, map);
    let modeled_weight: u32 = contests.iter().map(|c| c.weight).sum();

    info!(
        "Simulating {} replicates over {} modeled regions (weight {modeled_weight}), seed={}.",
        opts.replicates,
        contests.len(),
        opts.seed
    );

    let totals: Vec<u32> = (0..opts.replicates)
        .into_par_iter()
        .map(|r| run_replicate(&contests, fixed_for_a, opts.seed, r as u64, opts.tie_break))
        .collect();

    Ok(Simulation {
        totals,
        fixed_for_a,
        fixed_for_b,
        modeled_weight,
        total_weight: map.total_weight(),
        seed: opts.seed,
    })
}

/// Aggregate weight won by A in replicate `index`.
pub fn run_replicate(contests: &[Contest], fixed_for_a: u32, seed: u64, index: u64, tie_break: TieBreak) -> u32 {
    let mut rng = replicate_rng(seed, index);
    let mut total = fixed_for_a;
    for contest in contests {
        let z: f64 = rng.sample(StandardNormal);
        let margin = contest.mean + contest.se * z;
        if winner(margin, tie_break) == Candidate::A {
            total += contest.weight;
        }
    }
    total
}

/// Which candidate a simulated margin favors.
pub fn winner(margin: f64, tie_break: TieBreak) -> Candidate {
    if margin > 0.0 {
        Candidate::A
    } else if margin < 0.0 {
        Candidate::B
    } else {
        tie_break.winner()
    }
}

fn build_contests(
    posteriors: &[PosteriorEstimate],
    map: &ElectoralMap,
    fixed: &FixedOutcomes,
) -> Result<Vec<Contest>, ForecastError> {
    let mut by_region: BTreeMap<&str, &PosteriorEstimate> = BTreeMap::new();
    for p in posteriors {
        if !map.contains(&p.region) {
            return Err(ForecastError::config(format!(
                "Posterior for region '{}' has no electoral weight.",
                p.region
            )));
        }
        if !(p.mean.is_finite() && p.se.is_finite() && p.se >= 0.0) {
            return Err(ForecastError::config(format!(
                "Posterior for region '{}' is not finite (mean={}, se={}).",
                p.region, p.mean, p.se
            )));
        }
        if fixed.contains_key(&p.region) {
            return Err(ForecastError::config(format!(
                "Region '{}' is both modeled and fixed.",
                p.region
            )));
        }
        if by_region.insert(p.region.as_str(), p).is_some() {
            return Err(ForecastError::config(format!(
                "Duplicate posterior for region '{}'.",
                p.region
            )));
        }
    }

    if let Some(region) = fixed.keys().find(|r| !map.contains(r)) {
        return Err(ForecastError::config(format!(
            "Fixed outcome given for unknown region '{region}'."
        )));
    }

    let missing: BTreeSet<&str> = map
        .iter()
        .map(|(r, _)| r)
        .filter(|r| !by_region.contains_key(r) && !fixed.contains_key(*r))
        .collect();
    if !missing.is_empty() {
        return Err(ForecastError::config(format!(
            "Unmodeled regions need a fixed outcome: {}.",
            missing.into_iter().collect::<Vec<_>>().join(", ")
        )));
    }

    Ok(map
        .iter()
        .filter_map(|(region, weight)| {
            by_region.get(region).map(|p| Contest {
                mean: p.mean,
                se: p.se,
                weight,
            })
        })
        .collect())
}

fn fixed_weights(fixed: &FixedOutcomes, map: &ElectoralMap) -> (u32, u32) {
    fixed.iter().fold((0, 0), |(a, b), (region, who)| {
        let w = map.weight(region).unwrap_or(0);
        match who {
            Candidate::A => (a + w, b),
            Candidate::B => (a, b + w),
        }
    })
}
