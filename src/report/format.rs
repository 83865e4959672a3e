//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the aggregation/model code stays clean and testable
//! - output changes are localized

use crate::app::pipeline::{ForecastRun, RegionForecast};
use crate::domain::{Candidate, ForecastConfig};
use crate::report::summary::{NationalSummary, TotalsSummary};

const HISTOGRAM_BAR: usize = 40;

/// Format the full run summary (inputs, per-region table, national estimate,
/// replicate distribution).
pub fn format_run_summary(run: &ForecastRun, config: &ForecastConfig) -> String {
    let mut out = String::new();

    out.push_str("=== forecast - Poll Aggregation + Monte Carlo ===\n");
    out.push_str(&format!(
        "Polls: accepted={} rejected={}",
        run.polls_accepted, run.polls_rejected
    ));
    if let Some(since) = config.min_end_date {
        out.push_str(&format!(" | since {since}"));
    }
    if !config.accepted_grades.is_empty() {
        let grades: Vec<&str> = config.accepted_grades.iter().map(String::as_str).collect();
        out.push_str(&format!(" | grades {}", grades.join(",")));
    }
    out.push('\n');
    out.push_str(&format!(
        "Prior: N({:+.4}, {:.4}) | bias sd={:.4}\n",
        config.prior.mean, config.prior.sd, config.bias_sd
    ));
    if let Some(sd) = run.imputed_sd {
        out.push_str(&format!("Imputed sd (median of multi-poll regions): {sd:.4}\n"));
    }

    out.push_str("\nRegions:\n");
    out.push_str(&format_region_table(&run.regions));

    if !run.unmodeled.is_empty() {
        out.push_str("\nUnmodeled (fixed):\n");
        for u in &run.unmodeled {
            out.push_str(&format!(
                "- {:<20} weight={:<4} -> {}\n",
                truncate(&u.region, 20),
                u.weight,
                candidate_label(u.outcome)
            ));
        }
    }
    if !run.unmapped.is_empty() {
        out.push_str(&format!("\nIgnored (not in map): {}\n", run.unmapped.join(", ")));
    }

    if let Some(national) = &run.national {
        out.push('\n');
        out.push_str(&format_national(national, &config.national.region));
    }

    out.push('\n');
    out.push_str(&format_totals(&run.summary, run.simulation.seed));
    out
}

fn format_region_table(rows: &[RegionForecast]) -> String {
    let mut out = String::new();
    out.push_str(
        format!(
            "{:<20} {:>6} {:>4} {:>9} {:>9} {:>9} {:>8} {:>7}",
            "region", "weight", "n", "spread", "sd", "post", "se", "P(A)"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(
        format!(
            "{:-<20} {:-<6} {:-<4} {:-<9} {:-<9} {:-<9} {:-<8} {:-<7}",
            "", "", "", "", "", "", "", ""
        )
        .trim_end(),
    );
    out.push('\n');

    for r in rows {
        let s = &r.summary;
        let sd = match s.sd_spread {
            Some(sd) if s.imputed_sd => format!("{sd:.4}*"),
            Some(sd) => format!("{sd:.4}"),
            None => "-".to_string(),
        };
        out.push_str(
            format!(
                "{:<20} {:>6} {:>4} {:>+9.4} {:>9} {:>+9.4} {:>8.4} {:>7.3}",
                truncate(&s.region, 20),
                s.weight,
                s.count,
                s.mean_spread,
                sd,
                r.posterior.mean,
                r.posterior.se,
                r.win_probability,
            )
            .trim_end(),
        );
        out.push('\n');
    }
    if rows.iter().any(|r| r.summary.imputed_sd) {
        out.push_str("(* sd imputed)\n");
    }
    out
}

fn format_national(national: &NationalSummary, region: &str) -> String {
    let p = &national.posterior;
    let i = &national.interval;
    format!(
        "National ({region}): {:+.4} ± {:.4} | [{:+.4}, {:+.4}] at z={:.2} | P(A)={:.3}\n",
        p.mean, p.se, i.lower, i.upper, i.z, national.win_probability
    )
}

fn format_totals(summary: &TotalsSummary, seed: u64) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Simulation: replicates={} seed={seed} threshold>{}\n",
        summary.replicates, summary.threshold
    ));
    out.push_str(&format!(
        "- P(A wins) = {:.4} | P(tie) = {:.4}\n",
        summary.win_probability, summary.tie_probability
    ));
    out.push_str(&format!(
        "- total: mean={:.1} sd={:.1} median={:.1} [p05={:.1}, p95={:.1}] range=[{}, {}]\n",
        summary.mean, summary.std_dev, summary.median, summary.p05, summary.p95, summary.min, summary.max
    ));

    let peak = summary.histogram.iter().map(|b| b.count).max().unwrap_or(0);
    if peak == 0 {
        return out;
    }
    out.push_str("\nDistribution of totals:\n");
    for bin in &summary.histogram {
        let end = bin.start + summary.bin_width - 1;
        let len = bin.count * HISTOGRAM_BAR / peak;
        let marker = if bin.start <= summary.threshold && summary.threshold <= end { "|" } else { " " };
        out.push_str(
            format!(
                "{:>5}-{:<5}{marker} {:>7} {}",
                bin.start,
                end,
                bin.count,
                "#".repeat(len)
            )
            .trim_end(),
        );
        out.push('\n');
    }
    out
}

fn candidate_label(c: Candidate) -> &'static str {
    match c {
        Candidate::A => "A",
        Candidate::B => "B",
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::summary::HistogramBin;

    #[test]
    fn truncate_keeps_short_names() {
        assert_eq!(truncate("Ohio", 20), "Ohio");
        assert_eq!(truncate("Massachusetts", 6), "Massa.");
    }

    #[test]
    fn totals_block_marks_threshold_bin() {
        let summary = TotalsSummary {
            replicates: 4,
            threshold: 269,
            win_probability: 0.5,
            tie_probability: 0.0,
            mean: 270.0,
            std_dev: 10.0,
            min: 255,
            max: 285,
            median: 270.0,
            p05: 256.0,
            p95: 284.0,
            bin_width: 10,
            histogram: vec![
                HistogramBin { start: 250, count: 1 },
                HistogramBin { start: 260, count: 2 },
                HistogramBin { start: 270, count: 0 },
                HistogramBin { start: 280, count: 1 },
            ],
        };
        let text = format_totals(&summary, 7);
        assert!(text.contains("P(A wins) = 0.5000"));
        assert!(text.contains("  260-269  |       2 "));
        assert!(text.contains("  270-279          0\n"));
    }
}
