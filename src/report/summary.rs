//! Reduce a replicate distribution to scalar and interval reports.

use serde::Serialize;

use crate::domain::{Candidate, PosteriorEstimate, TieBreak};
use crate::error::ForecastError;
use crate::math::{mean, quantile_sorted, sample_sd, standard_normal_cdf};

/// One histogram bin `[start, start + width)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HistogramBin {
    pub start: u32,
    pub count: usize,
}

/// `mean ± z·se` for a posterior.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CredibleInterval {
    pub lower: f64,
    pub upper: f64,
    pub z: f64,
}

/// Distribution of aggregate totals across replicates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TotalsSummary {
    pub replicates: usize,
    pub threshold: u32,
    /// Fraction of replicates strictly above `threshold`.
    pub win_probability: f64,
    /// Fraction of replicates exactly at `threshold`.
    pub tie_probability: f64,
    pub mean: f64,
    pub std_dev: f64,
    pub min: u32,
    pub max: u32,
    pub median: f64,
    pub p05: f64,
    pub p95: f64,
    pub bin_width: u32,
    pub histogram: Vec<HistogramBin>,
}

/// National popular-vote posterior report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NationalSummary {
    pub posterior: PosteriorEstimate,
    pub interval: CredibleInterval,
    /// `Φ(mean / se)`: probability the popular margin favors candidate A.
    pub win_probability: f64,
}

/// Default threshold: a total strictly above half the weight is a majority.
pub fn majority_threshold(total_weight: u32) -> u32 {
    total_weight / 2
}

pub fn win_probability(totals: &[u32], threshold: u32) -> f64 {
    if totals.is_empty() {
        return 0.0;
    }
    totals.iter().filter(|&&t| t > threshold).count() as f64 / totals.len() as f64
}

/// Histogram of totals with fixed-width bins aligned on multiples of `bin_width`.
///
/// Bins span the observed range without gaps; empty interior bins report 0.
pub fn histogram(totals: &[u32], bin_width: u32) -> Result<Vec<HistogramBin>, ForecastError> {
    if bin_width == 0 {
        return Err(ForecastError::config("Histogram bin width must be >= 1."));
    }
    let (Some(&lo), Some(&hi)) = (totals.iter().min(), totals.iter().max()) else {
        return Ok(Vec::new());
    };

    let first = lo / bin_width;
    let last = hi / bin_width;
    let mut counts = vec![0usize; (last - first) as usize + 1];
    for &t in totals {
        counts[(t / bin_width - first) as usize] += 1;
    }

    Ok(counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| HistogramBin {
            start: (first + i as u32) * bin_width,
            count,
        })
        .collect())
}

pub fn credible_interval(posterior: &PosteriorEstimate, z: f64) -> CredibleInterval {
    CredibleInterval {
        lower: posterior.mean - z * posterior.se,
        upper: posterior.mean + z * posterior.se,
        z,
    }
}

/// Closed-form probability that a posterior margin favors candidate A.
///
/// A point-mass posterior at exactly zero goes to the tie-break winner, the
/// same way the simulator awards it.
pub fn posterior_win_probability(posterior: &PosteriorEstimate, tie_break: TieBreak) -> f64 {
    if posterior.se > 0.0 {
        standard_normal_cdf(posterior.mean / posterior.se)
    } else if posterior.mean > 0.0 {
        1.0
    } else if posterior.mean < 0.0 {
        0.0
    } else if tie_break.winner() == Candidate::A {
        1.0
    } else {
        0.0
    }
}

pub fn summarize_national(posterior: PosteriorEstimate, z: f64, tie_break: TieBreak) -> NationalSummary {
    let interval = credible_interval(&posterior, z);
    let win_probability = posterior_win_probability(&posterior, tie_break);
    NationalSummary {
        posterior,
        interval,
        win_probability,
    }
}

pub fn summarize_totals(totals: &[u32], threshold: u32, bin_width: u32) -> Result<TotalsSummary, ForecastError> {
    if totals.is_empty() {
        return Err(ForecastError::InsufficientData("No replicates to summarize.".to_string()));
    }

    let values: Vec<f64> = totals.iter().map(|&t| t as f64).collect();
    let mut sorted = values.clone();
    sorted.sort_by(f64::total_cmp);
    let q = |p: f64| quantile_sorted(&sorted, p).unwrap_or(f64::NAN);

    let ties = totals.iter().filter(|&&t| t == threshold).count();

    Ok(TotalsSummary {
        replicates: totals.len(),
        threshold,
        win_probability: win_probability(totals, threshold),
        tie_probability: ties as f64 / totals.len() as f64,
        mean: mean(&values).unwrap_or(f64::NAN),
        std_dev: sample_sd(&values).unwrap_or(0.0),
        min: totals.iter().copied().min().unwrap_or(0),
        max: totals.iter().copied().max().unwrap_or(0),
        median: q(0.5),
        p05: q(0.05),
        p95: q(0.95),
        bin_width,
        histogram: histogram(totals, bin_width)?,
    })
}
