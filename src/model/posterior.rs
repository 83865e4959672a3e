//! Conjugate normal-normal update.
//!
//! Given a prior `N(μ₀, τ²)` and an observed mean `Y` with variance `σ²`:
//!
//! ```text
//! B              = σ² / (σ² + τ²)
//! posterior_mean = B·μ₀ + (1 − B)·Y
//! posterior_se   = sqrt(1 / (1/σ² + 1/τ²))
//! ```
//!
//! Numerical notes:
//! - `σ² = 0` is certainty about `Y`: `B = 0`, `se = 0` (the division is guarded).
//! - `τ = ∞` is a flat prior: `B = 0`, `se = σ`.

use crate::domain::{PosteriorEstimate, PriorSpec, RegionSummary};
use crate::error::ForecastError;
use crate::model::bias::BiasModel;

/// Shrinkage factor `B ∈ [0, 1]`.
pub fn shrinkage(sigma2: f64, tau: f64) -> f64 {
    if sigma2 <= 0.0 || tau.is_infinite() {
        return 0.0;
    }
    let b = sigma2 / (sigma2 + tau * tau);
    b.clamp(0.0, 1.0)
}

/// Update `prior` with an observation `y` of variance `sigma2`.
pub fn conjugate_update(region: &str, y: f64, sigma2: f64, prior: &PriorSpec) -> PosteriorEstimate {
    let b = shrinkage(sigma2, prior.sd);
    let mean = if b == 0.0 { y } else { b * prior.mean + (1.0 - b) * y };

    let se = if sigma2 <= 0.0 {
        0.0
    } else {
        let prior_precision = if prior.sd.is_infinite() {
            0.0
        } else {
            1.0 / (prior.sd * prior.sd)
        };
        (1.0 / (1.0 / sigma2 + prior_precision)).sqrt()
    };

    PosteriorEstimate {
        region: region.to_string(),
        mean,
        se,
        shrinkage: b,
    }
}

/// Posterior for one region summary, with the bias variance folded into `σ²`.
pub fn update_region(
    summary: &RegionSummary,
    prior: &PriorSpec,
    bias: &BiasModel,
) -> Result<PosteriorEstimate, ForecastError> {
    let sigma2 = bias.total_variance(summary).ok_or_else(|| {
        ForecastError::InsufficientData(format!(
            "Region '{}' has no sd (count={}); impute it before updating.",
            summary.region, summary.count
        ))
    })?;
    if !sigma2.is_finite() {
        return Err(ForecastError::InsufficientData(format!(
            "Region '{}' has a non-finite observation variance.",
            summary.region
        )));
    }
    Ok(conjugate_update(&summary.region, summary.mean_spread, sigma2, prior))
}

/// Lower bound on the posterior se when `σ_b > 0`, independent of sample size.
pub fn se_floor(bias_sd: f64, tau: f64) -> f64 {
    conjugate_update("", 0.0, bias_sd * bias_sd, &PriorSpec { mean: 0.0, sd: tau }).se
}
