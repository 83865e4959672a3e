//! Shared domain types.
//!
//! Inputs (`PollRecord`, `ElectoralMap`) are immutable once constructed.
//! Derived values (`RegionSummary`, `PosteriorEstimate`) are plain serializable
//! records so they can be exported next to the simulation report.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::ForecastError;

/// One of the two candidates being compared.
///
/// Spreads are always measured as `share_a - share_b`, so a positive margin
/// favors `A`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Candidate {
    A,
    B,
}

impl Candidate {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "a" => Some(Candidate::A),
            "b" => Some(Candidate::B),
            _ => None,
        }
    }
}

/// Which candidate receives a region whose simulated margin is exactly zero.
///
/// Continuous draws make an exact zero a measure-zero event, but it still happens
/// when a posterior has zero standard error and a zero mean.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum TieBreak {
    FavorFirst,
    #[default]
    FavorSecond,
}

impl TieBreak {
    pub fn winner(self) -> Candidate {
        match self {
            TieBreak::FavorFirst => Candidate::A,
            TieBreak::FavorSecond => Candidate::B,
        }
    }
}

/// A single cleaned poll observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollRecord {
    pub region: String,
    pub pollster: String,
    pub end_date: NaiveDate,
    /// Vote share of candidate A as a fraction in `[0, 1]`.
    pub share_a: f64,
    /// Vote share of candidate B as a fraction in `[0, 1]`.
    pub share_b: f64,
    pub sample_size: u32,
    pub grade: Option<String>,
}

impl PollRecord {
    /// Signed spread `share_a - share_b`.
    pub fn spread(&self) -> f64 {
        self.share_a - self.share_b
    }

    pub fn validate(&self) -> Result<(), ForecastError> {
        if self.sample_size == 0 {
            return Err(ForecastError::config(format!(
                "Poll by '{}' in region '{}' has sample size 0.",
                self.pollster, self.region
            )));
        }
        for (name, v) in [("share_a", self.share_a), ("share_b", self.share_b)] {
            if !(v.is_finite() && (0.0..=1.0).contains(&v)) {
                return Err(ForecastError::config(format!(
                    "Poll by '{}' in region '{}' has {name}={v}, expected a fraction in [0, 1].",
                    self.pollster, self.region
                )));
            }
        }
        Ok(())
    }
}

/// Per-region aggregate of accepted polls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionSummary {
    pub region: String,
    pub mean_spread: f64,
    /// Sample standard deviation of the spread.
    ///
    /// `None` only before imputation, for regions with a single accepted poll.
    pub sd_spread: Option<f64>,
    pub count: usize,
    /// Electoral weight. National summaries carry `0`.
    pub weight: u32,
    /// Set when `sd_spread` was substituted by the cross-region median.
    pub imputed_sd: bool,
}

impl RegionSummary {
    /// Variance of the mean spread due to sampling, `s² / n`.
    pub fn sampling_variance(&self) -> Option<f64> {
        let sd = self.sd_spread?;
        Some(sd * sd / self.count as f64)
    }
}

/// Normal prior on a region's true spread.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriorSpec {
    pub mean: f64,
    /// Prior standard deviation `τ`. `f64::INFINITY` gives a flat prior.
    pub sd: f64,
}

impl PriorSpec {
    pub fn new(mean: f64, sd: f64) -> Result<Self, ForecastError> {
        let prior = Self { mean, sd };
        prior.validate()?;
        Ok(prior)
    }

    pub fn validate(&self) -> Result<(), ForecastError> {
        if !self.mean.is_finite() {
            return Err(ForecastError::config(format!(
                "Prior mean must be finite (got {}).",
                self.mean
            )));
        }
        if self.sd.is_nan() || self.sd <= 0.0 {
            return Err(ForecastError::config(format!(
                "Prior sd must be > 0 (got {}).",
                self.sd
            )));
        }
        Ok(())
    }
}

/// Systematic-bias configuration: a default `σ_b` and per-region overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BiasSpec {
    pub sd: f64,
    #[serde(default)]
    pub overrides: BTreeMap<String, f64>,
}

/// Posterior belief about a region's true spread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PosteriorEstimate {
    pub region: String,
    pub mean: f64,
    pub se: f64,
    /// Weight `B` given to the prior mean.
    pub shrinkage: f64,
}

/// Region → electoral weight. Winner-take-all and fixed for the run.
///
/// The total weight always fits in a `u32`, so per-replicate tallies cannot
/// overflow either.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, u32>", into = "BTreeMap<String, u32>")]
pub struct ElectoralMap {
    weights: BTreeMap<String, u32>,
}

impl ElectoralMap {
    pub fn new(weights: BTreeMap<String, u32>) -> Result<Self, ForecastError> {
        if weights.is_empty() {
            return Err(ForecastError::config("Electoral map is empty."));
        }
        if let Some((region, _)) = weights.iter().find(|(_, w)| **w == 0) {
            return Err(ForecastError::config(format!(
                "Region '{region}' has electoral weight 0."
            )));
        }
        weights
            .values()
            .try_fold(0u32, |acc, w| acc.checked_add(*w))
            .ok_or_else(|| {
                ForecastError::config(format!(
                    "Total electoral weight exceeds {} and cannot be tallied.",
                    u32::MAX
                ))
            })?;
        Ok(Self { weights })
    }

    pub fn weight(&self, region: &str) -> Option<u32> {
        self.weights.get(region).copied()
    }

    pub fn contains(&self, region: &str) -> bool {
        self.weights.contains_key(region)
    }

    pub fn total_weight(&self) -> u32 {
        self.weights.values().sum()
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Regions in their canonical (sorted) order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.weights.iter().map(|(r, w)| (r.as_str(), *w))
    }
}

impl TryFrom<BTreeMap<String, u32>> for ElectoralMap {
    type Error = ForecastError;

    fn try_from(weights: BTreeMap<String, u32>) -> Result<Self, Self::Error> {
        Self::new(weights)
    }
}

impl From<ElectoralMap> for BTreeMap<String, u32> {
    fn from(map: ElectoralMap) -> Self {
        map.weights
    }
}

/// Deterministic outcomes supplied by the caller for unmodeled regions.
pub type FixedOutcomes = BTreeMap<String, Candidate>;

/// National popular-vote settings (kept apart from the state-level model).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NationalConfig {
    /// Region id used by national polls.
    pub region: String,
    pub prior: PriorSpec,
    pub bias_sd: f64,
}

/// A full run's configuration as understood by the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastConfig {
    pub prior: PriorSpec,
    pub bias_sd: f64,
    pub national: NationalConfig,

    pub min_end_date: Option<NaiveDate>,
    /// Accepted quality grades. Empty accepts every grade.
    pub accepted_grades: BTreeSet<String>,

    pub replicates: usize,
    pub seed: u64,
    pub tie_break: TieBreak,

    /// Totals strictly above this value win. Defaults to half the total weight.
    pub threshold: Option<u32>,
    /// Credible-interval multiplier.
    pub z: f64,
    pub bin_width: u32,
}

impl ForecastConfig {
    pub fn validate(&self) -> Result<(), ForecastError> {
        self.prior.validate()?;
        self.national.prior.validate()?;
        validate_bias_sd("bias sd", self.bias_sd)?;
        validate_bias_sd("national bias sd", self.national.bias_sd)?;
        if self.replicates == 0 {
            return Err(ForecastError::config("Replicate count must be >= 1."));
        }
        if !(self.z.is_finite() && self.z >= 0.0) {
            return Err(ForecastError::config(format!(
                "Confidence multiplier z must be finite and >= 0 (got {}).",
                self.z
            )));
        }
        if self.bin_width == 0 {
            return Err(ForecastError::config("Histogram bin width must be >= 1."));
        }
        if self.national.region.trim().is_empty() {
            return Err(ForecastError::config("National region id must not be empty."));
        }
        Ok(())
    }
}

pub fn validate_bias_sd(label: &str, sd: f64) -> Result<(), ForecastError> {
    if !(sd.is_finite() && sd >= 0.0) {
        return Err(ForecastError::config(format!(
            "The {label} must be finite and >= 0 (got {sd})."
        )));
    }
    Ok(())
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            prior: PriorSpec { mean: 0.0, sd: 0.02 },
            bias_sd: 0.03,
            national: NationalConfig {
                region: "US".to_string(),
                prior: PriorSpec { mean: 0.0, sd: 0.035 },
                bias_sd: 0.025,
            },
            min_end_date: None,
            accepted_grades: BTreeSet::new(),
            replicates: 10_000,
            seed: 42,
            tie_break: TieBreak::default(),
            threshold: None,
            z: 1.96,
            bin_width: 10,
        }
    }
}
