//! CLI command implementations.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use researcher::io::config::{load_config, process_env};
use researcher::orchestrator::Orchestrator;
use tracing::{debug, info};

use crate::case::{CaseFile, discover_cases};
use crate::judge::Judge;
use crate::report::aggregate;
use crate::run::{CaseContext, CaseRun, run_case};

fn cases_dir(repo_root: &Path) -> PathBuf {
    repo_root.join("eval").join("cases")
}

fn results_root(repo_root: &Path) -> PathBuf {
    repo_root.join("eval").join("results")
}

/// List all available cases.
pub fn list_cases(repo_root: &Path) -> Result<()> {
    let cases = discover_cases(&cases_dir(repo_root))?;
    for case in cases {
        println!("{}\t{}", case.case.id, case.case.question);
    }
    Ok(())
}

fn print_run(case_id: &str, run: &CaseRun) {
    println!(
        "run: case={} eval_run_id={} outcome={:?} duration_secs={:.1} results={}",
        case_id,
        run.eval_run_id,
        run.outcome,
        run.duration_secs,
        run.results_dir.display()
    );
    if let Some(judgment) = &run.judgment {
        println!(
            "run: relevance={}/10 accuracy={}/10 formatting={:?}",
            judgment.relevance, judgment.accuracy, judgment.formatting
        );
        println!("run: feedback={}", judgment.feedback);
    }
}

fn with_context<T>(
    repo_root: &Path,
    config_path: &Path,
    body: impl FnOnce(&CaseContext<'_>) -> Result<T>,
) -> Result<T> {
    let config = load_config(config_path)?;
    let judge = Judge::from_config(&config, &process_env)?;
    info!(judge = %judge.describe(), "judge ready");
    let ctx = CaseContext {
        results_root: results_root(repo_root),
        config,
        judge: &judge,
        build: &Orchestrator::from_settings,
    };
    body(&ctx)
}

/// Run a case by id (optionally multiple times).
pub fn run_case_by_id(repo_root: &Path, config_path: &Path, case_id: &str, runs: u32) -> Result<()> {
    let case_path = cases_dir(repo_root).join(format!("{case_id}.toml"));
    if !case_path.exists() {
        bail!("case {} not found at {}", case_id, case_path.display());
    }
    let case = CaseFile::load(&case_path).context("load case")?;
    debug!(case_id, runs, "case loaded");

    with_context(repo_root, config_path, |ctx| {
        for run_num in 1..=runs {
            debug!(case_id, run_num, runs, "starting run");
            let run = run_case(ctx, &case_path, &case).context("run case")?;
            print_run(case_id, &run);
        }
        Ok(())
    })
}

/// Run every case once per requested run.
pub fn run_all(repo_root: &Path, config_path: &Path, runs: u32) -> Result<()> {
    let cases = discover_cases(&cases_dir(repo_root))?;
    if cases.is_empty() {
        bail!("no cases in {}", cases_dir(repo_root).display());
    }
    with_context(repo_root, config_path, |ctx| {
        for case in &cases {
            let case_path = cases_dir(repo_root).join(format!("{}.toml", case.case.id));
            for _ in 0..runs {
                let run = run_case(ctx, &case_path, case).context("run case")?;
                print_run(&case.case.id, &run);
            }
        }
        Ok(())
    })?;
    for case in &cases {
        report_case(repo_root, &case.case.id)?;
    }
    Ok(())
}

/// Show aggregated results for a case.
pub fn report_case(repo_root: &Path, case_id: &str) -> Result<()> {
    let (summary, warnings) = aggregate(&results_root(repo_root).join(case_id))?;
    println!("report: case={} runs={}", case_id, summary.runs);
    println!("report: scored={} error={}", summary.scored, summary.error);
    if let Some(avg) = summary.avg_relevance {
        println!("report: avg_relevance={avg:.1}/10");
    }
    if let Some(avg) = summary.avg_accuracy {
        println!("report: avg_accuracy={avg:.1}/10");
    }
    println!(
        "report: formatting_pass={}/{}",
        summary.formatting_pass, summary.scored
    );
    if let Some(avg) = summary.avg_duration_secs {
        println!("report: avg_duration_secs={avg:.2}");
    }
    for warning in warnings {
        eprintln!("warning: {}", warning);
    }
    Ok(())
}

/// Remove results for a case.
pub fn clean_case(repo_root: &Path, case_id: &str) -> Result<()> {
    let case_results = results_root(repo_root).join(case_id);
    if case_results.exists() {
        std::fs::remove_dir_all(&case_results)
            .with_context(|| format!("remove {}", case_results.display()))?;
    }
    println!("clean: case={} results={}", case_id, case_results.display());
    Ok(())
}
