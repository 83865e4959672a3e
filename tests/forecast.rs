use std::collections::BTreeMap;
use std::fs;

use poll_forecast::app::pipeline::{ForecastInputs, run_forecast};
use poll_forecast::data::{demo_spec, generate_sample};
use poll_forecast::domain::{Candidate, ElectoralMap, FixedOutcomes, ForecastConfig, PosteriorEstimate};
use poll_forecast::io::{load_electoral_map, load_polls, write_report_json};
use poll_forecast::math::{median, sample_sd, standard_normal_cdf};
use poll_forecast::report::{majority_threshold, summarize_totals};
use poll_forecast::simulate::{SimulationOptions, simulate};

fn posterior(region: &str, mean: f64, se: f64) -> PosteriorEstimate {
    PosteriorEstimate {
        region: region.to_string(),
        mean,
        se,
        shrinkage: 0.0,
    }
}

fn map(entries: &[(&str, u32)]) -> ElectoralMap {
    ElectoralMap::new(entries.iter().map(|(r, w)| (r.to_string(), *w)).collect()).unwrap()
}

fn opts(seed: u64) -> SimulationOptions {
    SimulationOptions {
        replicates: 10_000,
        seed,
        tie_break: Default::default(),
    }
}

fn three_regions() -> Vec<PosteriorEstimate> {
    vec![
        posterior("A", 0.05, 0.01),
        posterior("B", -0.04, 0.01),
        posterior("C", 0.00, 0.02),
    ]
}

#[test]
fn toss_up_region_splits_totals_evenly() {
    // A is near-certain for the first candidate, B near-certain against, so the
    // total is 10 or 15 depending only on the toss-up region C.
    let sim = simulate(&three_regions(), &map(&[("A", 10), ("B", 20), ("C", 5)]), &FixedOutcomes::new(), &opts(42))
        .unwrap();
    let with_c = sim.totals.iter().filter(|&&t| t == 15).count() as f64 / sim.totals.len() as f64;
    let without_c = sim.totals.iter().filter(|&&t| t == 10).count() as f64 / sim.totals.len() as f64;
    assert!(with_c + without_c > 0.999);
    assert!((with_c - standard_normal_cdf(0.0)).abs() < 0.03, "P(C) = {with_c}");
}

#[test]
fn toss_up_region_decides_the_majority() {
    // An unmodeled region fixed for A lifts the baseline so C alone flips the outcome:
    // total 43, threshold 21, totals are 18 (lose) or 23 (win).
    let m = map(&[("A", 10), ("B", 20), ("C", 5), ("D", 8)]);
    let fixed = FixedOutcomes::from([("D".to_string(), Candidate::A)]);
    let sim = simulate(&three_regions(), &m, &fixed, &opts(42)).unwrap();
    assert_eq!(sim.fixed_for_a, 8);

    let threshold = majority_threshold(m.total_weight());
    assert_eq!(threshold, 21);
    let summary = summarize_totals(&sim.totals, threshold, 5).unwrap();
    assert!((summary.win_probability - standard_normal_cdf(0.0)).abs() < 0.03);
    assert!(summary.min >= 18 && summary.max <= 23);
}

#[test]
fn same_seed_is_bit_identical_across_thread_counts() {
    let m = map(&[("A", 10), ("B", 20), ("C", 5)]);
    let posteriors = three_regions();
    let fixed = FixedOutcomes::new();

    let baseline = simulate(&posteriors, &m, &fixed, &opts(7)).unwrap();
    let single = rayon::ThreadPoolBuilder::new()
        .num_threads(1)
        .build()
        .unwrap()
        .install(|| simulate(&posteriors, &m, &fixed, &opts(7)).unwrap());
    assert_eq!(baseline.totals, single.totals);

    let other = simulate(&posteriors, &m, &fixed, &opts(8)).unwrap();
    assert_ne!(baseline.totals, other.totals);
}

#[test]
fn csv_inputs_run_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let polls_path = dir.path().join("polls.csv");
    let map_path = dir.path().join("map.csv");
    fs::write(
        &polls_path,
        "state,pollster,end_date,share_a,share_b,sample_size,grade\n\
         Ohio,Acme,2016-11-01,46,44,800,A\n\
         Ohio,Beta,2016-11-02,47,44,900,B\n\
         Ohio,Gamma,2016-11-03,45,45,1000,A\n\
         Iowa,Acme,2016-11-01,44,48,700,A\n\
         Iowa,Beta,2016-11-04,43,49,650,C\n\
         Maine,Gamma,2016-11-02,50,45,500,B\n\
         Nowhere,Acme,2016-11-02,50,45,500,B\n\
         US,Acme,2016-11-05,48,45,1500,A\n\
         US,Beta,2016-11-05,47,46,1200,A\n\
         US,Gamma,2016-11-06,49,46,2000,B\n",
    )
    .unwrap();
    fs::write(
        &map_path,
        "region,electoral_votes,fixed,bias_sd\n\
         Iowa,6,,\n\
         Maine,4,,\n\
         Ohio,18,b,0.04\n\
         Texas,38,b,\n",
    )
    .unwrap();

    let polls = load_polls(&polls_path).unwrap();
    assert_eq!(polls.polls.len(), 10);
    let map_ingest = load_electoral_map(&map_path).unwrap();
    let inputs = ForecastInputs {
        polls: polls.polls,
        map: map_ingest.map,
        fixed: map_ingest.fixed,
        bias_overrides: map_ingest.bias_overrides,
    };
    let config = ForecastConfig {
        replicates: 2_000,
        ..ForecastConfig::default()
    };

    let run = run_forecast(&inputs, &config).unwrap();

    let regions: Vec<&str> = run.summaries().map(|s| s.region.as_str()).collect();
    assert_eq!(regions, ["Iowa", "Maine", "Ohio"]);
    assert_eq!(run.unmapped, ["Nowhere"]);
    assert_eq!(run.unmodeled.len(), 1);
    assert_eq!(run.unmodeled[0].region, "Texas");
    assert_eq!(run.unmodeled[0].outcome, Candidate::B);

    // Maine has one poll: its sd is the median of the multi-poll regions' sds.
    let ohio_sd = sample_sd(&[0.02, 0.03, 0.00]).unwrap();
    let iowa_sd = sample_sd(&[-0.04, -0.06]).unwrap();
    let expected = median(&[ohio_sd, iowa_sd]).unwrap();
    let maine = &run.regions[1];
    assert!(maine.summary.imputed_sd);
    assert!((maine.summary.sd_spread.unwrap() - expected).abs() < 1e-12);
    assert!((run.imputed_sd.unwrap() - expected).abs() < 1e-12);

    // Per-region bias override reaches the posterior.
    assert_eq!(run.regions[2].bias_sd, 0.04);
    assert_eq!(run.regions[0].bias_sd, 0.03);

    // Texas (38 of 66) is fixed against A, so A can never pass 33.
    assert_eq!(run.summary.threshold, 33);
    assert_eq!(run.summary.win_probability, 0.0);
    assert!(run.summary.max <= 28);
    assert_eq!(run.simulation.totals.len(), 2_000);

    let national = run.national.as_ref().unwrap();
    assert!(national.posterior.mean > 0.0);
    assert!(national.interval.lower < national.posterior.mean);

    let report = dir.path().join("report.json");
    write_report_json(&report, &run).unwrap();
    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&report).unwrap()).unwrap();
    assert_eq!(json["summary"]["threshold"], 33);
    assert_eq!(json["regions"].as_array().unwrap().len(), 3);
    assert!(json.get("simulation").is_none());
}

#[test]
fn demo_scenario_is_reproducible() {
    let sample = generate_sample(&demo_spec(2016, 6)).unwrap();
    let inputs = ForecastInputs {
        polls: sample.polls,
        map: sample.map,
        fixed: sample.fixed,
        bias_overrides: BTreeMap::new(),
    };
    let config = ForecastConfig {
        replicates: 1_000,
        ..ForecastConfig::default()
    };
    let first = run_forecast(&inputs, &config).unwrap();
    let second = run_forecast(&inputs, &config).unwrap();
    assert_eq!(first.simulation.totals, second.simulation.totals);
    assert_eq!(first.unmodeled.len(), 2);
    assert!(first.national.is_some());
    assert!((0.0..=1.0).contains(&first.summary.win_probability));
}
