//! The research loop: plan, execute, reflect, decide, synthesize.
//!
//! [`Orchestrator::run`] owns the [`SessionState`] for the duration of a run
//! and is the only writer. Observers see progress through the [`LogSink`]
//! passed to `run`, and may stop the run through its [`CancelToken`].

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::agents::executor::{TaskExecutor, WebResearchExecutor};
use crate::agents::guardrails::OutputGuardrails;
use crate::agents::planner::TaskPlanner;
use crate::agents::reflector::QualityReflector;
use crate::agents::synthesizer::{ReportSynthesizer, empty_report};
use crate::core::continuation::{Continuation, decide};
use crate::core::format_check::missing_markers;
use crate::core::types::{Phase, Status};
use crate::io::config::RunSettings;
use crate::io::extract::HttpExtractor;
use crate::io::llm::{LlmProvider, build_provider};
use crate::io::prompt::PromptEngine;
use crate::io::search::WebSearch;
use crate::observer::{CancelToken, Cancelled, LogSink, Progress};
use crate::session::{SessionSnapshot, SessionState};

/// Final product of a completed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResearchReport {
    pub title: String,
    pub markdown: String,
    /// Groundedness verdict when the check was enabled.
    pub grounded: Option<bool>,
    pub iterations: u32,
    pub findings: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Complete(ResearchReport),
    /// A stop was requested; the session is left in `cancelled` status.
    Cancelled,
}

struct Agents {
    planner: TaskPlanner,
    executor: Box<dyn TaskExecutor>,
    reflector: QualityReflector,
    guardrails: OutputGuardrails,
    synthesizer: ReportSynthesizer,
}

pub struct Orchestrator {
    settings: RunSettings,
    llm: Arc<dyn LlmProvider>,
    agents: Agents,
    session: SessionState,
}

impl Orchestrator {
    /// Compose an orchestrator from explicit collaborators.
    pub fn new(
        settings: RunSettings,
        llm: Arc<dyn LlmProvider>,
        executor: Box<dyn TaskExecutor>,
    ) -> Self {
        Self::with_prompts(settings, llm, executor, Arc::new(PromptEngine::new()))
    }

    fn with_prompts(
        settings: RunSettings,
        llm: Arc<dyn LlmProvider>,
        executor: Box<dyn TaskExecutor>,
        prompts: Arc<PromptEngine>,
    ) -> Self {
        let profile = settings.profile;
        let agents = Agents {
            planner: TaskPlanner::new(llm.clone(), prompts.clone(), profile),
            executor,
            reflector: QualityReflector::new(llm.clone(), prompts.clone(), profile),
            guardrails: OutputGuardrails::new(llm.clone(), prompts.clone(), profile),
            synthesizer: ReportSynthesizer::new(llm.clone(), prompts, profile),
        };
        Self {
            settings,
            llm,
            agents,
            session: SessionState::new(),
        }
    }

    /// Real provider, DuckDuckGo search and HTTP extraction.
    pub fn from_settings(settings: RunSettings) -> Result<Self> {
        let llm = build_provider(&settings.provider)
            .with_context(|| format!("build {} provider", settings.provider.kind))?;
        let prompts = Arc::new(PromptEngine::new());
        let executor = WebResearchExecutor::new(
            llm.clone(),
            prompts.clone(),
            Box::new(WebSearch::new(settings.search_timeout)?),
            Box::new(HttpExtractor::new(settings.extract_timeout)?),
            settings.max_search_results,
            settings.profile,
        );
        Ok(Self::with_prompts(settings, llm, Box::new(executor), prompts))
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.session.snapshot()
    }

    /// Run one research session for `goal`.
    ///
    /// Prior session data is discarded. Errors are fatal collaborator
    /// failures; the session is left in `failed` status with an `error` log entry.
    #[instrument(skip_all, fields(provider = self.llm.name(), model = %self.llm.model()))]
    pub fn run(&mut self, goal: &str, sink: &dyn LogSink, cancel: &CancelToken) -> Result<RunOutcome> {
        self.session.reset(goal);
        let mut progress = Progress::new(&mut self.session, sink, cancel);
        let result = self
            .agents
            .drive(&self.settings, self.llm.as_ref(), goal, &mut progress);
        match result {
            Ok(report) => {
                info!(
                    iterations = report.iterations,
                    findings = report.findings,
                    "research run complete"
                );
                Ok(RunOutcome::Complete(report))
            }
            Err(err) if err.is::<Cancelled>() => {
                progress.session_mut().set_status(Status::Cancelled);
                progress.record(Phase::Stopped, "Research stopped by request");
                progress.publish();
                info!("research run cancelled");
                Ok(RunOutcome::Cancelled)
            }
            Err(err) => {
                progress.session_mut().set_status(Status::Failed);
                progress.record(Phase::Error, format!("Run failed: {err:#}"));
                progress.publish();
                warn!(error = %format!("{err:#}"), "research run failed");
                Err(err)
            }
        }
    }
}

fn transition(progress: &mut Progress<'_>, status: Status) {
    progress.session_mut().set_status(status);
    progress.publish();
}

impl Agents {
    fn drive(
        &self,
        settings: &RunSettings,
        llm: &dyn LlmProvider,
        goal: &str,
        progress: &mut Progress<'_>,
    ) -> Result<ResearchReport> {
        progress.log(Phase::Init, "Research agent started")?;
        progress.log(Phase::Init, format!("Provider: {}", llm.describe()))?;
        progress.log(Phase::Init, format!("Mode: {}", settings.profile.mode_label()))?;
        progress.log(Phase::Init, format!("Goal: {goal}"))?;
        progress.publish();

        self.plan(settings, goal, progress)?;
        self.research(settings, goal, progress)?;
        self.synthesize(settings, goal, progress)
    }

    fn plan(&self, settings: &RunSettings, goal: &str, progress: &mut Progress<'_>) -> Result<()> {
        transition(progress, Status::Planning);
        progress.log(Phase::Plan, "Planning: breaking the goal into research tasks")?;
        let plan = self.planner.create_plan(goal, &settings.depth)?;
        progress.session_mut().set_plan(plan.clone());
        if plan.is_empty() {
            progress.log(Phase::Plan, "Planner produced no usable queries")?;
            return Ok(());
        }
        progress.log(
            Phase::Plan,
            format!("Plan created with {} research tasks", plan.len()),
        )?;
        for (idx, query) in plan.iter().enumerate() {
            progress.log(Phase::Plan, format!("  {}. {query}", idx + 1))?;
        }
        Ok(())
    }

    fn research(&self, settings: &RunSettings, goal: &str, progress: &mut Progress<'_>) -> Result<()> {
        let max_iterations = settings.max_iterations;
        while progress.session().iteration() < max_iterations {
            let iteration = progress.session_mut().begin_iteration();
            transition(progress, Status::Researching);
            progress.log(
                Phase::Research,
                format!("Iteration {iteration}/{max_iterations}"),
            )?;

            let pending = progress.session().pending_queries();
            if pending.is_empty() {
                progress.log(Phase::Research, "All planned queries completed")?;
                break;
            }
            progress.log(
                Phase::Research,
                format!("Executing {} research tasks", pending.len()),
            )?;
            for (idx, query) in pending.iter().enumerate() {
                progress.log(
                    Phase::Research,
                    format!("Task {}/{}: {query}", idx + 1, pending.len()),
                )?;
                let result = self.executor.execute(query, progress)?;
                progress
                    .session_mut()
                    .record_finding(query, &result.analysis, result.sources);
            }

            transition(progress, Status::Reflecting);
            progress.log(Phase::Reflect, "Reflecting: evaluating research quality")?;
            let summary = progress.session().findings_summary();
            let reflection = self.reflector.evaluate(goal, &summary)?;
            if !self.guardrails.validate_format(&reflection.raw) {
                progress.log(
                    Phase::Guardrail,
                    format!(
                        "Reflection is missing {}; using defaults",
                        missing_markers(&reflection.raw).join(", ")
                    ),
                )?;
            }
            progress.session_mut().record_reflection(
                reflection.completeness,
                reflection.depth,
                &reflection.gaps,
                reflection.verdict,
            );
            progress.log(
                Phase::Reflect,
                format!(
                    "Completeness {}/10, depth {}/10, verdict {}",
                    reflection.completeness, reflection.depth, reflection.verdict
                ),
            )?;
            progress.log(Phase::Reflect, format!("Gaps: {}", reflection.gaps))?;
            progress.publish();

            match decide(&reflection, max_iterations, iteration) {
                Continuation::Continue => {
                    progress.log(Phase::Reflect, "More research needed")?;
                    for query in &reflection.additional_queries {
                        progress.log(Phase::Reflect, format!("  + {query}"))?;
                    }
                    progress
                        .session_mut()
                        .extend_plan(&reflection.additional_queries);
                }
                stop => {
                    progress.log(Phase::Reflect, format!("Stopping: {}", stop.describe()))?;
                    break;
                }
            }
        }
        Ok(())
    }

    fn synthesize(
        &self,
        settings: &RunSettings,
        goal: &str,
        progress: &mut Progress<'_>,
    ) -> Result<ResearchReport> {
        transition(progress, Status::Synthesizing);
        progress.log(Phase::Synthesize, "Synthesizing the final report")?;

        let findings = progress.session().findings().len();
        let (title, markdown, grounded) = if findings == 0 {
            progress.log(
                Phase::Synthesize,
                "No findings to synthesize; writing an empty report",
            )?;
            let title = format!("Research Report: {}", goal.trim());
            (title, empty_report(goal), None)
        } else {
            let summary = progress.session().findings_summary();
            let title = self.synthesizer.title(goal)?;
            progress.log(Phase::Synthesize, format!("Title: {title}"))?;
            let markdown = self.synthesizer.report(goal, &summary, &title)?;
            let grounded = if settings.check_groundedness {
                progress.log(Phase::Guardrail, "Running groundedness check")?;
                let grounded = self.guardrails.check_groundedness(&markdown, &summary);
                let verdict = if grounded {
                    "Groundedness check passed"
                } else {
                    "Groundedness check failed: report may contain unsupported claims"
                };
                progress.log(Phase::Guardrail, verdict)?;
                Some(grounded)
            } else {
                None
            };
            (title, markdown, grounded)
        };

        let iterations = progress.session().iteration();
        progress.session_mut().set_status(Status::Complete);
        progress.record(Phase::Done, "Report complete");
        progress.record(Phase::Done, format!("Total findings: {findings}"));
        progress.record(Phase::Done, format!("Total iterations: {iterations}"));
        progress.publish();

        Ok(ResearchReport {
            title,
            markdown,
            grounded,
            iterations,
            findings,
        })
    }
}
