//! Case execution orchestration.
//!
//! Runs the agent on the case question, judges the report and captures results.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use researcher::io::config::{AgentConfig, RunSettings, process_env};
use researcher::observer::{CancelToken, NullSink};
use researcher::orchestrator::{Orchestrator, RunOutcome};
use tracing::{debug, info, instrument};

use crate::case::CaseFile;
use crate::config::case_overrides;
use crate::judge::{Judge, Judgment};
use crate::results::{CaptureInput, Outcome, capture_results, next_eval_run_id};

/// Builds the agent for a case run.
pub type BuildOrchestrator<'a> = &'a dyn Fn(RunSettings) -> Result<Orchestrator>;

/// Shared inputs for every case in one invocation.
pub struct CaseContext<'a> {
    pub results_root: PathBuf,
    pub config: AgentConfig,
    pub judge: &'a Judge,
    pub build: BuildOrchestrator<'a>,
}

/// Result of running a single case.
#[derive(Debug)]
pub struct CaseRun {
    /// Unique identifier for this eval run.
    pub eval_run_id: String,
    /// Path to the results directory.
    pub results_dir: PathBuf,
    pub outcome: Outcome,
    pub judgment: Option<Judgment>,
    pub duration_secs: f64,
}

/// Run a case end-to-end: agent run, judging, result capture.
///
/// Agent and judge failures are recorded in the results as an `error`
/// outcome; only setup and capture failures return `Err`.
#[instrument(skip_all, fields(case_id = %case.case.id))]
pub fn run_case(ctx: &CaseContext<'_>, case_path: &Path, case: &CaseFile) -> Result<CaseRun> {
    info!("case run started");
    let overrides = case_overrides(&case.config)?;
    let settings = ctx
        .config
        .resolve(&overrides, &process_env)
        .context("resolve agent settings")?;
    let agent = format!("{} ({})", settings.provider.kind, settings.provider.model);
    let mut orchestrator = (ctx.build)(settings).context("build agent")?;

    let started_at = Utc::now();
    let eval_run_id = next_eval_run_id(&ctx.results_root, &case.case.id, started_at);
    let mut errors = Vec::new();

    debug!("running agent");
    let (report, iterations, findings) =
        match orchestrator.run(&case.case.question, &NullSink, &CancelToken::new()) {
            Ok(RunOutcome::Complete(report)) => (
                Some(report.markdown),
                Some(report.iterations),
                Some(report.findings),
            ),
            Ok(RunOutcome::Cancelled) => {
                errors.push("agent: run cancelled".to_string());
                (None, None, None)
            }
            Err(err) => {
                errors.push(format!("agent: {err:#}"));
                (None, None, None)
            }
        };
    let finished_at = Utc::now();

    let judgment = report.as_deref().and_then(|markdown| {
        debug!("judging report");
        match ctx
            .judge
            .score(&case.case.question, &case.case.expected_facts, markdown)
        {
            Ok(judgment) => Some(judgment),
            Err(err) => {
                errors.push(format!("judge: {err:#}"));
                None
            }
        }
    });

    let (results_dir, outcome) = capture_results(
        &ctx.results_root,
        CaptureInput {
            case_id: &case.case.id,
            case_path,
            eval_run_id: &eval_run_id,
            agent,
            judge: ctx.judge.describe(),
            started_at,
            finished_at,
            report: report.as_deref(),
            judgment: judgment.as_ref(),
            iterations,
            findings,
            errors,
        },
    )
    .context("capture results")?;

    let duration_secs = (finished_at - started_at).num_milliseconds() as f64 / 1000.0;
    info!(outcome = ?outcome, duration_secs, results_dir = %results_dir.display(), "case run complete");

    Ok(CaseRun {
        eval_run_id,
        results_dir,
        outcome,
        judgment,
        duration_secs,
    })
}
