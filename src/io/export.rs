//! Export forecast results.
//!
//! - JSON report (summaries, posteriors, unmodeled regions, national estimate,
//!   replicate summary) for downstream presentation
//! - CSV of per-replicate totals for external plotting

use std::fs::File;
use std::path::Path;

use crate::app::pipeline::ForecastRun;
use crate::error::ForecastError;

/// Write the forecast report as pretty-printed JSON.
pub fn write_report_json(path: &Path, run: &ForecastRun) -> Result<(), ForecastError> {
    let file = File::create(path).map_err(|e| ForecastError::io(path, e))?;
    serde_json::to_writer_pretty(file, run)
        .map_err(|e| ForecastError::Parse(format!("Failed to write report JSON: {e}")))?;
    Ok(())
}

/// Write one `replicate,total` row per replicate.
pub fn write_totals_csv(path: &Path, totals: &[u32]) -> Result<(), ForecastError> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| ForecastError::Parse(format!("Failed to create '{}': {e}", path.display())))?;
    writer
        .write_record(["replicate", "total"])
        .map_err(|e| ForecastError::Parse(format!("Failed to write totals CSV header: {e}")))?;
    for (i, total) in totals.iter().enumerate() {
        writer
            .write_record([i.to_string(), total.to_string()])
            .map_err(|e| ForecastError::Parse(format!("Failed to write totals CSV row: {e}")))?;
    }
    writer.flush().map_err(|e| ForecastError::io(path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn totals_csv_has_one_row_per_replicate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("totals.csv");
        write_totals_csv(&path, &[270, 232, 301]).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "replicate,total\n0,270\n1,232\n2,301\n");
    }
}
