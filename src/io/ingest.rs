//! CSV ingest and normalization.
//!
//! This module turns already-cleaned poll tables and electoral maps into domain
//! values:
//!
//! - **Strict schema** for required columns (clear errors, exit code 2)
//! - **Row-level validation** for polls (skip bad rows, but report what happened)
//! - **Fatal validation** for the electoral map, which is a fixed input
//!
//! No modeling logic lives here.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use csv::StringRecord;
use log::warn;

use crate::domain::{Candidate, ElectoralMap, FixedOutcomes, PollRecord};
use crate::error::ForecastError;

/// A row-level error encountered during ingest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// Poll ingest output: parsed records + skipped rows.
#[derive(Debug, Clone, Default)]
pub struct PollIngest {
    pub polls: Vec<PollRecord>,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
}

/// Electoral map ingest output.
#[derive(Debug, Clone)]
pub struct MapIngest {
    pub map: ElectoralMap,
    pub fixed: FixedOutcomes,
    pub bias_overrides: BTreeMap<String, f64>,
}

/// Load poll records from a CSV file.
pub fn load_polls(path: &Path) -> Result<PollIngest, ForecastError> {
    let file = File::open(path).map_err(|e| ForecastError::io(path, e))?;
    read_polls(file)
}

/// Load the electoral map from a CSV file.
pub fn load_electoral_map(path: &Path) -> Result<MapIngest, ForecastError> {
    let file = File::open(path).map_err(|e| ForecastError::io(path, e))?;
    read_electoral_map(file)
}

/// Parse poll records.
///
/// Columns: `region`, `pollster`, `enddate`, `share_a`, `share_b`, `samplesize`,
/// optional `grade`. Shares may be fractions or percentages; a row with any
/// share above 1 is read as percentages.
pub fn read_polls<R: Read>(reader: R) -> Result<PollIngest, ForecastError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| ForecastError::Parse(format!("Failed to read poll CSV headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);
    for column in ["region", "pollster", "enddate", "share_a", "share_b", "samplesize"] {
        if lookup(&header_map, column).is_none() {
            return Err(ForecastError::Parse(format!("Missing required poll column: `{column}`")));
        }
    }

    let mut out = PollIngest::default();
    for (idx, result) in reader.records().enumerate() {
        // +2: records start after the header and lines are 1-based.
        let line = idx + 2;
        out.rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                out.row_errors.push(RowError {
                    line,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        match parse_poll_row(&record, &header_map) {
            Ok(poll) if poll.sample_size == 0 => {
                return Err(ForecastError::config(format!(
                    "Line {line}: poll by '{}' in '{}' has sample size 0.",
                    poll.pollster, poll.region
                )));
            }
            Ok(poll) => out.polls.push(poll),
            Err(message) => out.row_errors.push(RowError { line, message }),
        }
    }

    for e in &out.row_errors {
        warn!("Skipped poll row at line {}: {}", e.line, e.message);
    }
    Ok(out)
}

/// Parse the electoral map.
///
/// Columns: `region`, `weight`, optional `fixed` (`a`/`b`) and `bias_sd`.
pub fn read_electoral_map<R: Read>(reader: R) -> Result<MapIngest, ForecastError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| ForecastError::Parse(format!("Failed to read map CSV headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);
    for column in ["region", "weight"] {
        if lookup(&header_map, column).is_none() {
            return Err(ForecastError::Parse(format!("Missing required map column: `{column}`")));
        }
    }

    let mut weights = BTreeMap::new();
    let mut fixed = FixedOutcomes::new();
    let mut bias_overrides = BTreeMap::new();

    for (idx, result) in reader.records().enumerate() {
        let line = idx + 2;
        let record = result.map_err(|e| ForecastError::Parse(format!("Line {line}: {e}")))?;
        let at = |message: String| ForecastError::Parse(format!("Line {line}: {message}"));

        let region = get_required(&record, &header_map, "region").map_err(at)?.to_string();
        let weight_raw = get_required(&record, &header_map, "weight").map_err(at)?;
        let weight: u32 = weight_raw
            .parse()
            .map_err(|_| at(format!("Invalid weight '{weight_raw}' (expected a positive integer).")))?;

        if let Some(raw) = get_optional(&record, &header_map, "fixed") {
            let outcome =
                Candidate::parse(raw).ok_or_else(|| at(format!("Invalid fixed outcome '{raw}' (expected a or b).")))?;
            fixed.insert(region.clone(), outcome);
        }
        if let Some(raw) = get_optional(&record, &header_map, "bias_sd") {
            let sd = parse_opt_f64(Some(raw)).ok_or_else(|| at(format!("Invalid bias_sd '{raw}'.")))?;
            bias_overrides.insert(region.clone(), sd);
        }

        if weights.insert(region.clone(), weight).is_some() {
            return Err(at(format!("Duplicate region '{region}'.")));
        }
    }

    Ok(MapIngest {
        map: ElectoralMap::new(weights)?,
        fixed,
        bias_overrides,
    })
}

fn parse_poll_row(record: &StringRecord, header_map: &HashMap<String, usize>) -> Result<PollRecord, String> {
    let region = get_required(record, header_map, "region")?.to_string();
    let pollster = get_required(record, header_map, "pollster")?.to_string();
    let end_date = parse_date(get_required(record, header_map, "enddate")?)?;

    let share_a = parse_opt_f64(Some(get_required(record, header_map, "share_a")?))
        .ok_or("Invalid `share_a` value.")?;
    let share_b = parse_opt_f64(Some(get_required(record, header_map, "share_b")?))
        .ok_or("Invalid `share_b` value.")?;
    let (share_a, share_b) = normalize_shares(share_a, share_b)?;

    let raw_n = get_required(record, header_map, "samplesize")?;
    // Some exports write sample sizes as floats ("1200.0").
    let sample_size = raw_n
        .parse::<u32>()
        .ok()
        .or_else(|| {
            raw_n
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite() && *v >= 0.0 && v.fract() == 0.0 && *v <= u32::MAX as f64)
                .map(|v| v as u32)
        })
        .ok_or_else(|| format!("Invalid sample size '{raw_n}'."))?;

    let grade = get_optional(record, header_map, "grade").map(str::to_string);

    Ok(PollRecord {
        region,
        pollster,
        end_date,
        share_a,
        share_b,
        sample_size,
        grade,
    })
}

fn normalize_shares(a: f64, b: f64) -> Result<(f64, f64), String> {
    let (a, b) = if a > 1.0 || b > 1.0 { (a / 100.0, b / 100.0) } else { (a, b) };
    if !((0.0..=1.0).contains(&a) && (0.0..=1.0).contains(&b)) {
        return Err(format!("Vote shares out of range: share_a={a}, share_b={b}."));
    }
    if a + b > 1.0 + 1e-9 {
        return Err(format!("Vote shares sum above 100%: share_a={a}, share_b={b}."));
    }
    Ok((a, b))
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Strip a UTF-8 BOM on the first header, or schema checks report it missing.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

/// Accepted spellings per canonical column.
fn aliases(name: &str) -> &'static [&'static str] {
    match name {
        "region" => &["region", "state"],
        "pollster" => &["pollster"],
        "enddate" => &["enddate", "end_date"],
        "share_a" => &["share_a", "a"],
        "share_b" => &["share_b", "b"],
        "samplesize" => &["samplesize", "sample_size", "n"],
        "grade" => &["grade"],
        "weight" => &["weight", "electoral_votes", "ev"],
        "fixed" => &["fixed"],
        "bias_sd" => &["bias_sd"],
        _ => &[],
    }
}

fn lookup(header_map: &HashMap<String, usize>, name: &str) -> Option<usize> {
    aliases(name).iter().find_map(|alias| header_map.get(*alias).copied())
}

fn get_required<'a>(
    record: &'a StringRecord,
    header_map: &HashMap<String, usize>,
    name: &str,
) -> Result<&'a str, String> {
    let idx = lookup(header_map, name).ok_or_else(|| format!("Missing required column: `{name}`"))?;
    record
        .get(idx)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("Missing required value: `{name}`"))
}

fn get_optional<'a>(record: &'a StringRecord, header_map: &HashMap<String, usize>, name: &str) -> Option<&'a str> {
    let idx = lookup(header_map, name)?;
    record
        .get(idx)
        .map(str::trim)
        .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("na"))
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    const FMTS: [&str; 3] = ["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"];
    for fmt in FMTS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(d);
        }
    }
    Err(format!(
        "Invalid date '{s}'. Expected one of: YYYY-MM-DD, MM/DD/YYYY, YYYY/MM/DD."
    ))
}

fn parse_opt_f64(s: Option<&str>) -> Option<f64> {
    let s = s?;
    let v = s.parse::<f64>().ok()?;
    if v.is_finite() { Some(v) } else { None }
}
