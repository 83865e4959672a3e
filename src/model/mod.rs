//! Hierarchical model: systematic bias + conjugate posterior update.
//!
//! Responsibilities:
//!
//! - fold the per-cycle bias variance into each region's observation variance
//! - shrink each region's observed spread toward the prior (parallel over regions)

pub mod bias;
pub mod posterior;

pub use bias::*;
pub use posterior::*;

use log::debug;
use rayon::prelude::*;

use crate::domain::{PosteriorEstimate, PriorSpec, RegionSummary};
use crate::error::ForecastError;

/// Posterior estimates for every summary, in input order.
pub fn estimate_posteriors(
    summaries: &[RegionSummary],
    prior: &PriorSpec,
    bias: &BiasModel,
) -> Result<Vec<PosteriorEstimate>, ForecastError> {
    prior.validate()?;
    let posteriors = summaries
        .par_iter()
        .map(|s| update_region(s, prior, bias))
        .collect::<Result<Vec<_>, _>>()?;

    for p in &posteriors {
        debug!(
            "posterior {:<16} mean={:+.4} se={:.4} B={:.3}",
            p.region, p.mean, p.se, p.shrinkage
        );
    }
    Ok(posteriors)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_input_order() {
        let summaries: Vec<RegionSummary> = (0..50)
            .map(|i| RegionSummary {
                region: format!("R{i:02}"),
                mean_spread: i as f64 / 1000.0,
                sd_spread: Some(0.03),
                count: 5,
                weight: 1,
                imputed_sd: false,
            })
            .collect();
        let bias = BiasModel::uniform(0.03).unwrap();
        let prior = PriorSpec { mean: 0.0, sd: 0.02 };
        let posteriors = estimate_posteriors(&summaries, &prior, &bias).unwrap();
        for (s, p) in summaries.iter().zip(&posteriors) {
            assert_eq!(s.region, p.region);
        }
    }
}
