//! Result capture and persistence.
//!
//! Each eval run gets `eval/results/<case_id>/<eval_run_id>/` holding
//! `meta.json`, and for scored runs `report.md` and `judgment.json`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, instrument, warn};

use crate::judge::{Judgment, write_judgment};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Report produced and judged.
    Scored,
    /// The agent or the judge failed, or the run was cancelled.
    Error,
}

/// Metadata for an eval run, persisted to `meta.json`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EvalMeta {
    pub case_id: String,
    pub eval_run_id: String,
    /// SHA-256 hash of the case file for reproducibility tracking.
    pub case_hash: String,
    /// Agent backend as `name (model)`.
    pub agent: String,
    pub judge: String,
    pub outcome: Outcome,
    pub start_time: String,
    pub end_time: String,
    pub duration_secs: f64,
    pub iterations: Option<u32>,
    pub findings: Option<usize>,
    /// Errors encountered while running, judging or capturing.
    pub errors: Vec<String>,
}

/// Everything a finished run leaves behind.
#[derive(Debug)]
pub struct CaptureInput<'a> {
    pub case_id: &'a str,
    pub case_path: &'a Path,
    pub eval_run_id: &'a str,
    pub agent: String,
    pub judge: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub report: Option<&'a str>,
    pub judgment: Option<&'a Judgment>,
    pub iterations: Option<u32>,
    pub findings: Option<usize>,
    pub errors: Vec<String>,
}

/// Write the run's artifacts and return its results directory.
#[instrument(skip_all, fields(case_id = %input.case_id, eval_run_id = %input.eval_run_id))]
pub fn capture_results(base_dir: &Path, input: CaptureInput<'_>) -> Result<(PathBuf, Outcome)> {
    let results_dir = results_dir(base_dir, input.case_id, input.eval_run_id);
    fs::create_dir_all(&results_dir)
        .with_context(|| format!("create results dir {}", results_dir.display()))?;

    let mut errors = input.errors;
    let case_hash = match file_sha256(input.case_path) {
        Ok(hash) => hash,
        Err(err) => {
            errors.push(format!("case hash: {err}"));
            String::new()
        }
    };

    if let Some(report) = input.report {
        let path = results_dir.join("report.md");
        fs::write(&path, report).with_context(|| format!("write {}", path.display()))?;
    }
    if let Some(judgment) = input.judgment {
        write_judgment(&results_dir.join("judgment.json"), judgment)?;
    }

    let outcome = if input.judgment.is_some() && errors.is_empty() {
        Outcome::Scored
    } else {
        Outcome::Error
    };
    if !errors.is_empty() {
        warn!(errors = ?errors, "eval run had errors");
    }

    let duration = input.finished_at - input.started_at;
    let meta = EvalMeta {
        case_id: input.case_id.to_string(),
        eval_run_id: input.eval_run_id.to_string(),
        case_hash,
        agent: input.agent,
        judge: input.judge,
        outcome,
        start_time: input.started_at.to_rfc3339(),
        end_time: input.finished_at.to_rfc3339(),
        duration_secs: duration.num_milliseconds() as f64 / 1000.0,
        iterations: input.iterations,
        findings: input.findings,
        errors,
    };
    write_meta(&results_dir.join("meta.json"), &meta)?;
    debug!(results_dir = %results_dir.display(), "results captured");
    Ok((results_dir, outcome))
}

pub fn results_dir(base_dir: &Path, case_id: &str, eval_run_id: &str) -> PathBuf {
    base_dir.join(case_id).join(eval_run_id)
}

/// `eval-%Y%m%d_%H%M%S`, suffixed when a run with that id already exists.
pub fn next_eval_run_id(base_dir: &Path, case_id: &str, now: DateTime<Utc>) -> String {
    let base = format!("eval-{}", now.format("%Y%m%d_%H%M%S"));
    if !results_dir(base_dir, case_id, &base).exists() {
        return base;
    }
    (2..)
        .map(|n| format!("{base}-{n}"))
        .find(|id| !results_dir(base_dir, case_id, id).exists())
        .unwrap_or(base)
}

pub fn read_meta(path: &Path) -> Result<EvalMeta> {
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&contents).context("parse meta")
}

fn write_meta(path: &Path, meta: &EvalMeta) -> Result<()> {
    let contents = serde_json::to_string_pretty(meta).context("serialize meta")?;
    fs::write(path, format!("{contents}\n"))
        .with_context(|| format!("write meta {}", path.display()))?;
    Ok(())
}

fn file_sha256(path: &Path) -> Result<String> {
    let contents = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    let mut hasher = Sha256::new();
    hasher.update(contents);
    let digest = hasher.finalize();
    Ok(hex::encode(digest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::judge::Formatting;
    use tempfile::tempdir;

    fn judgment() -> Judgment {
        Judgment {
            relevance: 8,
            accuracy: 7,
            formatting: Formatting::Pass,
            feedback: "Solid.".to_string(),
            raw_response: "raw".to_string(),
        }
    }

    fn input<'a>(case_path: &'a Path, report: Option<&'a str>, judgment: Option<&'a Judgment>) -> CaptureInput<'a> {
        CaptureInput {
            case_id: "case",
            case_path,
            eval_run_id: "eval-1",
            agent: "scripted (scripted-model)".to_string(),
            judge: "scripted (scripted-model)".to_string(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            report,
            judgment,
            iterations: Some(1),
            findings: Some(3),
            errors: Vec::new(),
        }
    }

    #[test]
    fn results_dir_is_stable() {
        let base = Path::new("/tmp/results");
        let dir = results_dir(base, "case", "run-1");
        assert_eq!(dir, PathBuf::from("/tmp/results/case/run-1"));
    }

    #[test]
    fn scored_run_writes_all_artifacts() {
        let temp = tempdir().expect("tempdir");
        let case_path = temp.path().join("case.toml");
        fs::write(&case_path, "[case]\nid = 'case'\n").expect("case");
        let judgment = judgment();

        let (dir, outcome) = capture_results(
            &temp.path().join("results"),
            input(&case_path, Some("# Report"), Some(&judgment)),
        )
        .expect("capture");

        assert_eq!(outcome, Outcome::Scored);
        assert_eq!(fs::read_to_string(dir.join("report.md")).expect("report"), "# Report");
        assert!(dir.join("judgment.json").exists());
        let meta = read_meta(&dir.join("meta.json")).expect("meta");
        assert_eq!(meta.case_hash.len(), 64);
        assert_eq!(meta.findings, Some(3));
    }

    #[test]
    fn failed_run_records_error_outcome() {
        let temp = tempdir().expect("tempdir");
        let case_path = temp.path().join("missing.toml");
        let mut failed = input(&case_path, None, None);
        failed.errors.push("agent: provider unreachable".to_string());

        let (dir, outcome) = capture_results(&temp.path().join("results"), failed).expect("capture");

        assert_eq!(outcome, Outcome::Error);
        assert!(!dir.join("report.md").exists());
        let meta = read_meta(&dir.join("meta.json")).expect("meta");
        assert_eq!(meta.outcome, Outcome::Error);
        assert_eq!(meta.errors.len(), 2);
    }

    #[test]
    fn run_ids_do_not_collide() {
        let temp = tempdir().expect("tempdir");
        let now = Utc::now();
        let first = next_eval_run_id(temp.path(), "case", now);
        fs::create_dir_all(results_dir(temp.path(), "case", &first)).expect("mkdir");
        let second = next_eval_run_id(temp.path(), "case", now);
        assert_eq!(second, format!("{first}-2"));
    }
}
