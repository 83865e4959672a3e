//! Run configuration file.
//!
//! Resolution order (highest priority first):
//! 1. CLI flags (applied by `cli::ModelArgs::apply`)
//! 2. TOML file given with `--config`
//! 3. Compiled defaults (`ForecastConfig::default()`)
//!
//! Example:
//!
//! ```toml
//! prior_mean = 0.0
//! prior_sd = 0.02
//! bias_sd = 0.03
//! since = "2016-10-31"
//! grades = ["A+", "A", "A-", "B+"]
//! replicates = 20000
//! seed = 7
//! tie_break = "favor-second"
//! confidence = 0.95
//!
//! [national]
//! region = "US"
//! prior_sd = 0.035
//! bias_sd = 0.025
//! ```

use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use log::debug;
use serde::Deserialize;

use crate::domain::{ForecastConfig, TieBreak};
use crate::error::ForecastError;
use crate::math::z_for_level;

/// On-disk configuration. Every field is optional; absent fields keep the
/// value from the layer below.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunFile {
    pub prior_mean: Option<f64>,
    pub prior_sd: Option<f64>,
    pub bias_sd: Option<f64>,
    /// Earliest accepted poll end date, `YYYY-MM-DD`.
    pub since: Option<NaiveDate>,
    pub grades: Option<Vec<String>>,
    pub replicates: Option<usize>,
    pub seed: Option<u64>,
    pub tie_break: Option<TieBreak>,
    pub threshold: Option<u32>,
    pub z: Option<f64>,
    /// Central credible level; converted to `z`. Mutually exclusive with `z`.
    pub confidence: Option<f64>,
    pub bin_width: Option<u32>,
    pub national: Option<NationalFile>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NationalFile {
    pub region: Option<String>,
    pub prior_mean: Option<f64>,
    pub prior_sd: Option<f64>,
    pub bias_sd: Option<f64>,
}

impl RunFile {
    pub fn load(path: &Path) -> Result<Self, ForecastError> {
        let text = fs::read_to_string(path).map_err(|e| ForecastError::io(path, e))?;
        let file = Self::parse(&text)
            .map_err(|e| ForecastError::Parse(format!("Invalid config '{}': {e}", path.display())))?;
        debug!("Loaded run config from {}.", path.display());
        Ok(file)
    }

    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Overlay this file's values onto `config`.
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
        if let Some(v) = self.since {
            config.min_end_date = Some(v);
        }
        if let Some(grades) = &self.grades {
            config.accepted_grades = grades.iter().map(|g| g.trim().to_string()).collect();
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
        if let Some(national) = &self.national {
            if let Some(v) = &national.region {
                config.national.region = v.clone();
            }
            if let Some(v) = national.prior_mean {
                config.national.prior.mean = v;
            }
            if let Some(v) = national.prior_sd {
                config.national.prior.sd = v;
            }
            if let Some(v) = national.bias_sd {
                config.national.bias_sd = v;
            }
        }
        Ok(())
    }
}

/// Pick the credible multiplier from either an explicit `z` or a level.
pub fn resolve_z(z: Option<f64>, confidence: Option<f64>) -> Result<Option<f64>, ForecastError> {
    match (z, confidence) {
        (Some(_), Some(_)) => Err(ForecastError::config("Give either z or confidence, not both.")),
        (Some(z), None) => Ok(Some(z)),
        (None, Some(level)) => z_for_level(level).map(Some),
        (None, None) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_overrides_only_given_fields() {
        let file = RunFile::parse(
            r#"
            prior_sd = 0.05
            since = "2016-10-31"
            grades = ["A", " B "]
            tie_break = "favor-first"

            [national]
            bias_sd = 0.01
            "#,
        )
        .unwrap();
        let mut config = ForecastConfig::default();
        file.apply(&mut config).unwrap();

        assert_eq!(config.prior.sd, 0.05);
        assert_eq!(config.prior.mean, 0.0);
        assert_eq!(config.bias_sd, 0.03);
        assert_eq!(config.min_end_date, NaiveDate::from_ymd_opt(2016, 10, 31));
        assert!(config.accepted_grades.contains("B"));
        assert_eq!(config.tie_break, TieBreak::FavorFirst);
        assert_eq!(config.national.bias_sd, 0.01);
        assert_eq!(config.national.prior.sd, 0.035);
        assert_eq!(config.replicates, 10_000);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(RunFile::parse("prior_sdd = 0.1").is_err());
    }

    #[test]
    fn confidence_becomes_z() {
        let file = RunFile::parse("confidence = 0.95").unwrap();
        let mut config = ForecastConfig::default();
        config.z = 0.0;
        file.apply(&mut config).unwrap();
        assert!((config.z - 1.959964).abs() < 1e-5);
    }

    #[test]
    fn z_and_confidence_conflict() {
        let file = RunFile::parse("z = 2.0\nconfidence = 0.9").unwrap();
        let err = file.apply(&mut ForecastConfig::default()).unwrap_err();
        assert!(matches!(err, ForecastError::Config(_)));
    }

    #[test]
    fn load_reports_missing_file_as_io() {
        let dir = tempfile::tempdir().unwrap();
        let err = RunFile::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ForecastError::Io { .. }));
    }
}
