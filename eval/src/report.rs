use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::judge::{Formatting, Judgment};
use crate::results::{Outcome, read_meta};

#[derive(Debug, Default)]
pub struct ReportSummary {
    pub runs: usize,
    pub scored: usize,
    pub error: usize,
    pub avg_relevance: Option<f64>,
    pub avg_accuracy: Option<f64>,
    pub formatting_pass: usize,
    pub avg_duration_secs: Option<f64>,
}

pub fn load_run_dirs(case_results_dir: &Path) -> Result<Vec<PathBuf>> {
    if !case_results_dir.exists() {
        return Ok(Vec::new());
    }
    let mut dirs = Vec::new();
    for entry in fs::read_dir(case_results_dir)
        .with_context(|| format!("read {}", case_results_dir.display()))?
    {
        let entry = entry.context("read entry")?;
        if entry.path().is_dir() {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

fn read_judgment(path: &Path) -> Result<Judgment> {
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&contents).context("parse judgment")
}

fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

pub fn aggregate(case_results_dir: &Path) -> Result<(ReportSummary, Vec<String>)> {
    let mut summary = ReportSummary::default();
    let mut warnings = Vec::new();
    let mut relevance = Vec::new();
    let mut accuracy = Vec::new();
    let mut durations = Vec::new();

    for run_dir in load_run_dirs(case_results_dir)? {
        let meta = match read_meta(&run_dir.join("meta.json")) {
            Ok(meta) => meta,
            Err(err) => {
                warnings.push(format!(
                    "skip {}: meta.json invalid ({err})",
                    run_dir.display()
                ));
                continue;
            }
        };

        summary.runs += 1;
        durations.push(meta.duration_secs);
        if meta.outcome == Outcome::Error {
            summary.error += 1;
            continue;
        }

        match read_judgment(&run_dir.join("judgment.json")) {
            Ok(judgment) => {
                summary.scored += 1;
                relevance.push(f64::from(judgment.relevance));
                accuracy.push(f64::from(judgment.accuracy));
                if judgment.formatting == Formatting::Pass {
                    summary.formatting_pass += 1;
                }
            }
            Err(err) => {
                summary.error += 1;
                warnings.push(format!(
                    "{}: judgment.json invalid ({err})",
                    run_dir.display()
                ));
            }
        }
    }

    summary.avg_relevance = mean(&relevance);
    summary.avg_accuracy = mean(&accuracy);
    summary.avg_duration_secs = mean(&durations);
    Ok((summary, warnings))
}
