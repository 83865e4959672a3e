//! Small descriptive-statistics helpers.
//!
//! Everything here is deterministic and allocation-light; callers pass plain
//! slices. Functions that are undefined for short inputs return `None` rather
//! than a sentinel value.

use statrs::distribution::{ContinuousCDF, Normal};
use statrs::function::erf::erfc;

use crate::error::ForecastError;

/// Streaming mean / variance accumulator (Welford).
#[derive(Debug, Clone, Copy, Default)]
pub struct RunningMoments {
    count: usize,
    mean: f64,
    m2: f64,
}

impl RunningMoments {
    pub fn push(&mut self, x: f64) {
        self.count += 1;
        let delta = x - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (x - self.mean);
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then_some(self.mean)
    }

    /// Sample standard deviation (`n - 1` denominator).
    pub fn sample_sd(&self) -> Option<f64> {
        if self.count < 2 {
            return None;
        }
        Some((self.m2 / (self.count as f64 - 1.0)).max(0.0).sqrt())
    }
}

pub fn mean(xs: &[f64]) -> Option<f64> {
    if xs.is_empty() {
        return None;
    }
    Some(xs.iter().sum::<f64>() / xs.len() as f64)
}

/// Sample standard deviation (`n - 1` denominator).
pub fn sample_sd(xs: &[f64]) -> Option<f64> {
    let mut m = RunningMoments::default();
    xs.iter().for_each(|&x| m.push(x));
    m.sample_sd()
}

/// Median; the mean of the two middle values for even lengths.
pub fn median(xs: &[f64]) -> Option<f64> {
    if xs.is_empty() {
        return None;
    }
    let mut sorted = xs.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Linear-interpolation quantile of already-sorted data, `p ∈ [0, 1]`.
pub fn quantile_sorted(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() || !(0.0..=1.0).contains(&p) {
        return None;
    }
    let h = (sorted.len() - 1) as f64 * p;
    let lo = h.floor() as usize;
    let hi = h.ceil() as usize;
    Some(sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo]))
}

/// Standard normal CDF `Φ(x)`.
pub fn standard_normal_cdf(x: f64) -> f64 {
    0.5 * erfc(-x / std::f64::consts::SQRT_2)
}

/// Two-sided z multiplier for a central credible level, e.g. `0.95 → 1.95996…`.
pub fn z_for_level(level: f64) -> Result<f64, ForecastError> {
    if !(level.is_finite() && level > 0.0 && level < 1.0) {
        return Err(ForecastError::config(format!(
            "Credible level must be in (0, 1) (got {level})."
        )));
    }
    let normal = Normal::new(0.0, 1.0)
        .map_err(|e| ForecastError::config(format!("Normal distribution error: {e}")))?;
    Ok(normal.inverse_cdf(0.5 + level / 2.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_sd_matches_textbook_value() {
        // Values 2,4,4,4,5,5,7,9: population sd = 2, sample sd = sqrt(32/7).
        let xs = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let sd = sample_sd(&xs).unwrap();
        assert!((sd - (32.0_f64 / 7.0).sqrt()).abs() < 1e-12);
        assert!((mean(&xs).unwrap() - 5.0).abs() < 1e-12);
    }

    #[test]
    fn sample_sd_undefined_for_single_value() {
        assert!(sample_sd(&[0.1]).is_none());
        assert!(sample_sd(&[]).is_none());
    }

    #[test]
    fn median_handles_odd_and_even() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn quantile_interpolates() {
        let sorted = [0.0, 10.0, 20.0, 30.0, 40.0];
        assert_eq!(quantile_sorted(&sorted, 0.5), Some(20.0));
        assert_eq!(quantile_sorted(&sorted, 0.125), Some(5.0));
        assert_eq!(quantile_sorted(&sorted, 1.0), Some(40.0));
    }

    #[test]
    fn normal_cdf_reference_points() {
        assert!((standard_normal_cdf(0.0) - 0.5).abs() < 1e-12);
        assert!((standard_normal_cdf(1.96) - 0.975).abs() < 1e-4);
        assert!((standard_normal_cdf(-1.0) - 0.158_655_25).abs() < 1e-6);
    }

    #[test]
    fn z_for_95_percent() {
        let z = z_for_level(0.95).unwrap();
        assert!((z - 1.959_964).abs() < 1e-5);
        assert!(z_for_level(1.0).is_err());
    }
}
