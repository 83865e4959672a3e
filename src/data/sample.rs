//! Synthetic poll generation for demos and tests.
//!
//! Each run draws **one** shared systematic bias `b ~ N(0, σ_b)` and shifts
//! every poll of every region by it, the same way a real cycle's polls share an
//! unknown error. Sampling noise is then added per poll:
//!
//! `observed_spread = true_margin + b + N(0, 2·sqrt(p(1 − p) / n))`
//!
//! where `p` is candidate A's two-party share implied by the shifted margin.

use chrono::Duration;
use chrono::NaiveDate;
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::{Candidate, ElectoralMap, FixedOutcomes, PollRecord};
use crate::error::ForecastError;

const GRADES: [&str; 6] = ["A+", "A", "A-", "B+", "B", "C-"];
const POLLSTERS: [&str; 5] = ["Keystone", "Harbor", "Meridian", "Northfield", "Summit"];

/// One region of a synthetic scenario.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticRegion {
    pub region: String,
    pub weight: u32,
    /// True spread `A − B`.
    pub true_margin: f64,
    /// Polls to generate. Regions with `0` are fixed by the sign of their margin.
    pub polls: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticSpec {
    pub regions: Vec<SyntheticRegion>,
    /// National region id and poll count; its true margin is the
    /// weight-averaged regional margin.
    pub national: Option<(String, usize)>,
    pub bias_sd: f64,
    pub sample_size_min: u32,
    pub sample_size_max: u32,
    /// Share of respondents undecided or voting for neither candidate.
    pub undecided: f64,
    pub election_day: NaiveDate,
    /// Polls end uniformly within this many days before election day.
    pub field_window_days: i64,
    pub seed: u64,
}

#[derive(Debug, Clone)]
pub struct SampleData {
    pub polls: Vec<PollRecord>,
    pub map: ElectoralMap,
    pub fixed: FixedOutcomes,
    /// The shared bias actually drawn for this sample.
    pub realized_bias: f64,
}

pub fn generate_sample(spec: &SyntheticSpec) -> Result<SampleData, ForecastError> {
    if spec.regions.is_empty() {
        return Err(ForecastError::config("Synthetic scenario has no regions."));
    }
    if !(spec.bias_sd.is_finite() && spec.bias_sd >= 0.0) {
        return Err(ForecastError::config("Invalid synthetic bias sd."));
    }
    if spec.sample_size_min == 0 || spec.sample_size_max < spec.sample_size_min {
        return Err(ForecastError::config("Invalid synthetic sample size range."));
    }
    if !(0.0..1.0).contains(&spec.undecided) {
        return Err(ForecastError::config("Undecided share must be in [0, 1)."));
    }
    if spec.field_window_days < 0 {
        return Err(ForecastError::config("Field window must be >= 0 days."));
    }

    let mut rng = StdRng::seed_from_u64(spec.seed);
    let bias = if spec.bias_sd > 0.0 {
        let dist = Normal::new(0.0, spec.bias_sd)
            .map_err(|e| ForecastError::config(format!("Bias distribution error: {e}")))?;
        dist.sample(&mut rng)
    } else {
        0.0
    };

    let map = ElectoralMap::new(spec.regions.iter().map(|r| (r.region.clone(), r.weight)).collect())?;

    let mut polls = Vec::new();
    let mut fixed = FixedOutcomes::new();
    for region in &spec.regions {
        if region.polls == 0 {
            let outcome = if region.true_margin > 0.0 { Candidate::A } else { Candidate::B };
            fixed.insert(region.region.clone(), outcome);
            continue;
        }
        for _ in 0..region.polls {
            polls.push(synthetic_poll(&mut rng, spec, &region.region, region.true_margin + bias)?);
        }
    }

    if let Some((national, count)) = &spec.national {
        let total: f64 = spec.regions.iter().map(|r| r.weight as f64).sum();
        let margin = spec
            .regions
            .iter()
            .map(|r| r.true_margin * r.weight as f64)
            .sum::<f64>()
            / total;
        for _ in 0..*count {
            polls.push(synthetic_poll(&mut rng, spec, national, margin + bias)?);
        }
    }

    Ok(SampleData {
        polls,
        map,
        fixed,
        realized_bias: bias,
    })
}

fn synthetic_poll(
    rng: &mut StdRng,
    spec: &SyntheticSpec,
    region: &str,
    margin: f64,
) -> Result<PollRecord, ForecastError> {
    let n = rng.gen_range(spec.sample_size_min..=spec.sample_size_max);
    let p = (0.5 + margin / 2.0).clamp(0.01, 0.99);
    let noise_sd = 2.0 * (p * (1.0 - p) / n as f64).sqrt();
    let noise = Normal::new(0.0, noise_sd)
        .map_err(|e| ForecastError::config(format!("Noise distribution error: {e}")))?;
    let observed = (margin + noise.sample(rng)).clamp(-0.98, 0.98);

    let decided = 1.0 - spec.undecided;
    let share_a = (decided * (1.0 + observed) / 2.0).clamp(0.0, 1.0);
    let share_b = (decided * (1.0 - observed) / 2.0).clamp(0.0, 1.0);

    let days_back = rng.gen_range(0..=spec.field_window_days);
    let end_date = spec
        .election_day
        .checked_sub_signed(Duration::days(days_back))
        .unwrap_or(spec.election_day);

    Ok(PollRecord {
        region: region.to_string(),
        pollster: POLLSTERS[rng.gen_range(0..POLLSTERS.len())].to_string(),
        end_date,
        share_a,
        share_b,
        sample_size: n,
        grade: Some(GRADES[rng.gen_range(0..GRADES.len())].to_string()),
    })
}

/// A small fictional map: a few safe regions, several battlegrounds, one
/// single-poll region and two unpolled regions.
pub fn demo_spec(seed: u64, polls_per_region: usize) -> SyntheticSpec {
    let regions = [
        ("Arden", 55, 0.12, polls_per_region),
        ("Brevia", 38, -0.10, polls_per_region),
        ("Calder", 29, 0.01, polls_per_region),
        ("Dunmore", 20, -0.015, polls_per_region),
        ("Eastmarch", 18, 0.005, polls_per_region),
        ("Fenwick", 16, 0.02, polls_per_region),
        ("Glenholm", 15, -0.03, polls_per_region),
        ("Harrow", 10, 0.002, 1),
        ("Isling", 6, 0.25, 0),
        ("Jorvale", 3, -0.30, 0),
    ]
    .into_iter()
    .map(|(region, weight, true_margin, polls)| SyntheticRegion {
        region: region.to_string(),
        weight,
        true_margin,
        polls,
    })
    .collect();

    SyntheticSpec {
        regions,
        national: Some(("US".to_string(), polls_per_region * 3)),
        bias_sd: 0.02,
        sample_size_min: 400,
        sample_size_max: 2_000,
        undecided: 0.08,
        election_day: NaiveDate::from_ymd_opt(2016, 11, 8).unwrap_or_default(),
        field_window_days: 21,
        seed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_polls() {
        let a = generate_sample(&demo_spec(11, 5)).unwrap();
        let b = generate_sample(&demo_spec(11, 5)).unwrap();
        assert_eq!(a.polls, b.polls);
        assert_eq!(a.realized_bias, b.realized_bias);
    }

    #[test]
    fn unpolled_regions_are_fixed_by_margin_sign() {
        let sample = generate_sample(&demo_spec(3, 4)).unwrap();
        assert_eq!(sample.fixed.get("Isling"), Some(&Candidate::A));
        assert_eq!(sample.fixed.get("Jorvale"), Some(&Candidate::B));
        assert!(!sample.polls.iter().any(|p| p.region == "Isling"));
        assert_eq!(sample.polls.iter().filter(|p| p.region == "Harrow").count(), 1);
        assert_eq!(sample.polls.iter().filter(|p| p.region == "US").count(), 12);
        assert_eq!(sample.map.total_weight(), 210);
    }

    #[test]
    fn generated_polls_are_valid_records() {
        let sample = generate_sample(&demo_spec(5, 6)).unwrap();
        for poll in &sample.polls {
            poll.validate().unwrap();
            assert!(poll.share_a + poll.share_b <= 1.0 + 1e-12);
        }
    }

    #[test]
    fn bias_is_shared_by_every_poll() {
        // With huge samples the only remaining error is the shared bias, so every
        // region's observed spread is offset by the same amount.
        let mut spec = demo_spec(8, 40);
        spec.sample_size_min = 5_000_000;
        spec.sample_size_max = 5_000_000;
        spec.bias_sd = 0.05;
        spec.undecided = 0.0;
        let sample = generate_sample(&spec).unwrap();
        for region in spec.regions.iter().filter(|r| r.polls > 1) {
            let spreads: Vec<f64> = sample
                .polls
                .iter()
                .filter(|p| p.region == region.region)
                .map(PollRecord::spread)
                .collect();
            let mean = spreads.iter().sum::<f64>() / spreads.len() as f64;
            assert!(
                (mean - region.true_margin - sample.realized_bias).abs() < 1e-3,
                "region {}",
                region.region
            );
        }
    }
}
