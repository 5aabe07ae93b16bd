//! Autonomous research agent CLI.
//!
//! `researcher run <GOAL>` plans web searches for the goal, researches and
//! self-reviews until the findings are good enough, then saves a markdown
//! report under the configured output directory.

use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use tracing::{debug, info, warn};

use researcher::exit_codes;
use researcher::io::config::{
    DEFAULT_CONFIG_PATH, RunOverrides, load_config, process_env, provider_catalog,
};
use researcher::io::llm::ProviderKind;
use researcher::io::report_store::{list_reports, save_report};
use researcher::logging;
use researcher::observer::CancelToken;
use researcher::orchestrator::{Orchestrator, RunOutcome};
use researcher::session::LogEntry;

#[derive(Parser)]
#[command(name = "researcher", version, about = "Autonomous web research agent")]
struct Cli {
    /// Path to the TOML config; defaults apply when the file is missing.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Research a goal and save the report.
    Run {
        goal: String,
        /// ollama, openai, anthropic or google.
        #[arg(long, value_parser = parse_provider)]
        provider: Option<ProviderKind>,
        #[arg(long)]
        model: Option<String>,
        #[arg(long, value_parser = ["quick", "detailed", "exhaustive"])]
        depth: Option<String>,
        /// Report file name inside the output directory.
        #[arg(long)]
        output: Option<String>,
        /// Ask the model to check the report against the findings.
        #[arg(long)]
        check_groundedness: bool,
    },
    /// List generation backends and whether each is usable.
    Providers,
    /// List saved reports, newest first.
    Reports,
}

fn parse_provider(name: &str) -> Result<ProviderKind, String> {
    ProviderKind::parse(name).ok_or_else(|| {
        format!("unknown provider {name:?} (expected ollama, openai, anthropic or google)")
    })
}

fn main() {
    // `.env` may set RUST_LOG, so it is loaded before the subscriber.
    let dotenv = dotenvy::dotenv();
    logging::init();
    if let Err(err) = dotenv
        && !err.not_found()
    {
        warn!(error = %err, "ignoring .env");
    }
    let code = match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            exit_codes::FAILED
        }
    };
    std::process::exit(code);
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run {
            goal,
            provider,
            model,
            depth,
            output,
            check_groundedness,
        } => {
            let overrides = RunOverrides {
                provider,
                model,
                depth,
                output_dir: None,
                check_groundedness: check_groundedness.then_some(true),
                max_iterations: None,
            };
            cmd_run(&cli.config, &goal, &overrides, output.as_deref())
        }
        Command::Providers => cmd_providers(&cli.config),
        Command::Reports => cmd_reports(&cli.config),
    }
}

fn cmd_run(
    config_path: &Path,
    goal: &str,
    overrides: &RunOverrides,
    output: Option<&str>,
) -> Result<i32> {
    let goal = goal.trim();
    if goal.is_empty() {
        return Err(anyhow!("goal must be non-empty"));
    }
    let config = load_config(config_path)?;
    let settings = config.resolve(overrides, &process_env)?;
    let output_dir = settings.output_dir.clone();
    let run_timeout = settings.run_timeout;
    let mut orchestrator = Orchestrator::from_settings(settings)?;

    let cancel = CancelToken::new();
    if let Some(limit) = run_timeout {
        spawn_watchdog(limit, cancel.clone());
    }
    let sink = |entry: &LogEntry| println!("{}", format_progress(entry));

    match orchestrator.run(goal, &sink, &cancel)? {
        RunOutcome::Complete(report) => {
            let path = save_report(&output_dir, goal, &report.markdown, output)?;
            println!();
            println!("Report saved to {}", path.display());
            println!(
                "Findings: {}  Iterations: {}",
                report.findings, report.iterations
            );
            if let Some(grounded) = report.grounded {
                println!("Groundedness: {}", if grounded { "PASS" } else { "FAIL" });
            }
            println!();
            println!("{}", report.markdown);
            Ok(exit_codes::OK)
        }
        RunOutcome::Cancelled => {
            eprintln!("research stopped before completion (run timeout)");
            Ok(exit_codes::CANCELLED)
        }
    }
}

/// Cancel the run cooperatively once `limit` has elapsed.
fn spawn_watchdog(limit: Duration, cancel: CancelToken) {
    thread::spawn(move || {
        thread::sleep(limit);
        info!(secs = limit.as_secs(), "run timeout elapsed; cancelling");
        cancel.cancel();
    });
}

/// `[HH:MM:SS] [     PHASE] message`
fn format_progress(entry: &LogEntry) -> String {
    format!(
        "[{}] [{:>10}] {}",
        entry.timestamp,
        entry.phase.as_str().to_uppercase(),
        entry.message
    )
}

fn cmd_providers(config_path: &Path) -> Result<i32> {
    let config = load_config(config_path)?;
    for info in provider_catalog(&config, &process_env) {
        let marker = if info.id == config.provider { "*" } else { " " };
        let state = match (info.available, info.requires_key) {
            (true, _) => "available",
            (false, true) => "missing API key",
            (false, false) => "not running",
        };
        println!(
            "{marker} {:<10} {:<16} model={:<28} {state}",
            info.id.as_str(),
            info.name,
            info.active_model
        );
        println!("    models: {}", info.models.join(", "));
    }
    Ok(exit_codes::OK)
}

fn cmd_reports(config_path: &Path) -> Result<i32> {
    let config = load_config(config_path)?;
    let dir = &config.output.directory;
    debug!(dir = %dir.display(), "listing reports");
    let reports =
        list_reports(dir).with_context(|| format!("list reports in {}", dir.display()))?;
    if reports.is_empty() {
        println!("No reports in {}", dir.display());
        return Ok(exit_codes::OK);
    }
    for report in reports {
        println!("{:<80} {:>9}  {}", report.filename, report.size, report.modified);
    }
    Ok(exit_codes::OK)
}
