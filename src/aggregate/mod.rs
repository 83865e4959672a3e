//! Poll aggregation: raw poll records → one `RegionSummary` per region.
//!
//! The work happens in two passes:
//!
//! 1. group accepted polls into an ordered map of running accumulators
//!    (mean + sample sd of the spread, in one pass over the records)
//! 2. impute the standard deviation of single-poll regions with the median of
//!    every *defined* regional sd, computed before any substitution
//!
//! The median is taken over the complete set of multi-poll regions so the
//! result does not depend on the order in which regions or polls arrive.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use log::{debug, warn};

use crate::domain::{ElectoralMap, ForecastConfig, PollRecord, RegionSummary};
use crate::error::ForecastError;
use crate::math::{RunningMoments, median};

/// Which polls are admitted into the aggregate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregationPolicy {
    /// Polls that ended before this date are dropped.
    pub min_end_date: Option<NaiveDate>,
    /// Allowed quality grades. Empty allows every grade; ungraded polls are
    /// always allowed.
    pub accepted_grades: BTreeSet<String>,
}

impl AggregationPolicy {
    pub fn from_config(config: &ForecastConfig) -> Self {
        Self {
            min_end_date: config.min_end_date,
            accepted_grades: config.accepted_grades.clone(),
        }
    }

    pub fn accepts(&self, poll: &PollRecord) -> bool {
        if let Some(cutoff) = self.min_end_date {
            if poll.end_date < cutoff {
                return false;
            }
        }
        match poll.grade.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(_) if self.accepted_grades.is_empty() => true,
            Some(grade) => self.accepted_grades.contains(grade),
        }
    }
}

/// Output of `aggregate_polls`.
#[derive(Debug, Clone, Default)]
pub struct Aggregation {
    /// One summary per mapped region with at least one accepted poll, in map order.
    pub summaries: Vec<RegionSummary>,
    /// Mapped regions with zero accepted polls. The caller must decide them.
    pub unmodeled: Vec<String>,
    /// Poll regions that do not appear in the electoral map.
    pub unmapped: Vec<String>,
    /// Median sd substituted into single-poll regions, if any were imputed.
    pub imputed_sd: Option<f64>,
    pub accepted: usize,
    pub rejected: usize,
}

impl Aggregation {
    pub fn imputed_regions(&self) -> impl Iterator<Item = &str> {
        self.summaries
            .iter()
            .filter(|s| s.imputed_sd)
            .map(|s| s.region.as_str())
    }
}

/// Aggregate polls for every region of `map`.
pub fn aggregate_polls(
    polls: &[PollRecord],
    map: &ElectoralMap,
    policy: &AggregationPolicy,
) -> Result<Aggregation, ForecastError> {
    for poll in polls {
        poll.validate()?;
    }

    let mut groups: BTreeMap<&str, RunningMoments> = BTreeMap::new();
    let mut unmapped: BTreeSet<String> = BTreeSet::new();
    let mut accepted = 0usize;
    let mut rejected = 0usize;

    for poll in polls {
        if !map.contains(&poll.region) {
            unmapped.insert(poll.region.clone());
            continue;
        }
        if !policy.accepts(poll) {
            rejected += 1;
            continue;
        }
        accepted += 1;
        groups.entry(poll.region.as_str()).or_default().push(poll.spread());
    }

    let mut summaries = Vec::with_capacity(groups.len());
    let mut unmodeled = Vec::new();
    for (region, weight) in map.iter() {
        match groups.get(region) {
            Some(moments) => summaries.push(summarize(region, moments, weight)),
            None => {
                warn!("Region '{region}' has no accepted polls; it is unmodeled.");
                unmodeled.push(region.to_string());
            }
        }
    }

    let imputed_sd = impute_missing_sd(&mut summaries)?;

    for region in &unmapped {
        warn!("Polls for region '{region}' ignored: region is not in the electoral map.");
    }
    debug!("Aggregated {accepted} polls ({rejected} rejected) into {} regions.", summaries.len());

    Ok(Aggregation {
        summaries,
        unmodeled,
        unmapped: unmapped.into_iter().collect(),
        imputed_sd,
        accepted,
        rejected,
    })
}

/// Aggregate the polls of a single non-electoral region (the national race).
///
/// Returns `Ok(None)` when no accepted poll exists. A single-poll national
/// aggregate borrows `fallback_sd`; without one it is reported as insufficient.
pub fn aggregate_region(
    polls: &[PollRecord],
    region: &str,
    policy: &AggregationPolicy,
    fallback_sd: Option<f64>,
) -> Result<Option<RegionSummary>, ForecastError> {
    let mut moments = RunningMoments::default();
    for poll in polls.iter().filter(|p| p.region == region) {
        poll.validate()?;
        if policy.accepts(poll) {
            moments.push(poll.spread());
        }
    }
    if moments.count() == 0 {
        return Ok(None);
    }

    let mut summary = summarize(region, &moments, 0);
    if summary.sd_spread.is_none() {
        let sd = fallback_sd.ok_or_else(|| {
            ForecastError::InsufficientData(format!(
                "Region '{region}' has a single poll and no sd is available for imputation."
            ))
        })?;
        warn!("Region '{region}' has a single poll; imputing sd={sd:.5}.");
        summary.sd_spread = Some(sd);
        summary.imputed_sd = true;
    }
    Ok(Some(summary))
}

/// Substitute the median of all defined sds into summaries that lack one.
///
/// Returns the substituted value, or `None` when nothing needed imputation.
pub fn impute_missing_sd(summaries: &mut [RegionSummary]) -> Result<Option<f64>, ForecastError> {
    if summaries.iter().all(|s| s.sd_spread.is_some()) {
        return Ok(None);
    }

    // Collected in full before any substitution.
    let defined: Vec<f64> = summaries
        .iter()
        .filter(|s| s.count >= 2)
        .filter_map(|s| s.sd_spread)
        .collect();
    let fill = median(&defined).ok_or_else(|| {
        ForecastError::InsufficientData(
            "Every polled region has a single poll; no sd is available for imputation.".to_string(),
        )
    })?;

    for summary in summaries.iter_mut().filter(|s| s.sd_spread.is_none()) {
        warn!(
            "Region '{}' has a single poll; imputing sd={fill:.5} (median of {} regions).",
            summary.region,
            defined.len()
        );
        summary.sd_spread = Some(fill);
        summary.imputed_sd = true;
    }
    Ok(Some(fill))
}

fn summarize(region: &str, moments: &RunningMoments, weight: u32) -> RegionSummary {
    RegionSummary {
        region: region.to_string(),
        mean_spread: moments.mean().unwrap_or(0.0),
        sd_spread: moments.sample_sd(),
        count: moments.count(),
        weight,
        imputed_sd: false,
    }
}
