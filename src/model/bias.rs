//! Systematic (non-reducible) polling error.
//!
//! Every poll of one election cycle shares a single unknown offset `b` with
//! standard deviation `σ_b`. Averaging more polls does not shrink it, so its
//! variance is added once, in quadrature, to each region's sampling variance:
//!
//! ```text
//! σ² = s² / n + σ_b²
//! ```
//!
//! The offset is never drawn per poll, per region or per replicate; the
//! simulator only ever sees the already-inflated posterior.

use std::collections::BTreeMap;

use crate::domain::{BiasSpec, RegionSummary, validate_bias_sd};
use crate::error::ForecastError;

#[derive(Debug, Clone, PartialEq)]
pub struct BiasModel {
    default_sd: f64,
    overrides: BTreeMap<String, f64>,
}

impl BiasModel {
    pub fn new(spec: &BiasSpec) -> Result<Self, ForecastError> {
        validate_bias_sd("bias sd", spec.sd)?;
        for (region, sd) in &spec.overrides {
            validate_bias_sd(&format!("bias sd override for '{region}'"), *sd)?;
        }
        Ok(Self {
            default_sd: spec.sd,
            overrides: spec.overrides.clone(),
        })
    }

    /// A model with the same `σ_b` for every region.
    pub fn uniform(sd: f64) -> Result<Self, ForecastError> {
        Self::new(&BiasSpec {
            sd,
            overrides: BTreeMap::new(),
        })
    }

    pub fn sd_for(&self, region: &str) -> f64 {
        self.overrides.get(region).copied().unwrap_or(self.default_sd)
    }

    pub fn variance_for(&self, region: &str) -> f64 {
        let sd = self.sd_for(region);
        sd * sd
    }

    /// Total observation variance `s²/n + σ_b²` for a summary.
    ///
    /// Returns `None` when the summary still has an undefined sd.
    pub fn total_variance(&self, summary: &RegionSummary) -> Option<f64> {
        Some(summary.sampling_variance()? + self.variance_for(&summary.region))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(region: &str, sd: Option<f64>, count: usize) -> RegionSummary {
        RegionSummary {
            region: region.to_string(),
            mean_spread: 0.01,
            sd_spread: sd,
            count,
            weight: 10,
            imputed_sd: false,
        }
    }

    #[test]
    fn bias_variance_is_added_not_divided_by_n() {
        let bias = BiasModel::uniform(0.03).unwrap();
        let s = summary("Ohio", Some(0.04), 16);
        let v = bias.total_variance(&s).unwrap();
        assert!((v - (0.04 * 0.04 / 16.0 + 0.0009)).abs() < 1e-15);
    }

    #[test]
    fn overrides_take_precedence() {
        let mut overrides = BTreeMap::new();
        overrides.insert("Utah".to_string(), 0.05);
        let bias = BiasModel::new(&BiasSpec { sd: 0.03, overrides }).unwrap();
        assert_eq!(bias.sd_for("Utah"), 0.05);
        assert_eq!(bias.sd_for("Ohio"), 0.03);
    }

    #[test]
    fn rejects_negative_or_non_finite_sd() {
        assert!(BiasModel::uniform(-0.01).is_err());
        assert!(BiasModel::uniform(f64::INFINITY).is_err());
        let mut overrides = BTreeMap::new();
        overrides.insert("Utah".to_string(), f64::NAN);
        assert!(BiasModel::new(&BiasSpec { sd: 0.03, overrides }).is_err());
    }

    #[test]
    fn undefined_sd_has_no_total_variance() {
        let bias = BiasModel::uniform(0.03).unwrap();
        assert!(bias.total_variance(&summary("Ohio", None, 1)).is_none());
    }
}
