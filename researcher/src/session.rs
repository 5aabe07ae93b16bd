//! In-memory record of one research run.
//!
//! A [`SessionState`] is owned by the orchestrator and mutated only from its
//! thread. Observers get a cloned [`SessionSnapshot`].

use chrono::{Local, Utc};
use serde::Serialize;

use crate::core::types::{Phase, Status, Verdict};

/// Placeholder rendered by [`SessionState::findings_summary`] before any finding exists.
pub const NO_FINDINGS: &str = "No findings yet.";

/// Analysis and sources recorded for one executed query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub query: String,
    pub analysis: String,
    pub sources: Vec<String>,
    pub iteration: u32,
}

/// Scores and verdict recorded for one completed iteration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReflectionRecord {
    pub iteration: u32,
    pub completeness: u8,
    pub depth: u8,
    pub gaps: String,
    pub verdict: Verdict,
}

/// One progress line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    /// Local wall-clock time, `HH:MM:SS`.
    pub timestamp: String,
    pub phase: Phase,
    pub message: String,
}

/// Read-only view used for status polling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub goal: String,
    pub started_at: Option<String>,
    pub iteration: u32,
    pub status: Status,
    pub plan: Vec<String>,
    pub completed_queries: Vec<String>,
    pub findings_count: usize,
    pub reflections: Vec<ReflectionRecord>,
    pub log: Vec<LogEntry>,
}

#[derive(Debug, Clone, Default)]
pub struct SessionState {
    goal: String,
    started_at: Option<String>,
    iteration: u32,
    status: Status,
    plan: Vec<String>,
    /// Set semantics; kept as a vector to preserve completion order.
    completed: Vec<String>,
    findings: Vec<Finding>,
    reflections: Vec<ReflectionRecord>,
    log: Vec<LogEntry>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discard everything from a previous run and start over for `goal`.
    pub fn reset(&mut self, goal: &str) {
        *self = Self {
            goal: goal.to_string(),
            started_at: Some(Utc::now().to_rfc3339()),
            status: Status::Initialized,
            ..Self::default()
        };
    }

    pub fn goal(&self) -> &str {
        &self.goal
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn set_status(&mut self, status: Status) {
        self.status = status;
    }

    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    /// Advance the iteration counter and return the new value.
    pub fn begin_iteration(&mut self) -> u32 {
        self.iteration += 1;
        self.iteration
    }

    pub fn plan(&self) -> &[String] {
        &self.plan
    }

    pub fn set_plan(&mut self, plan: Vec<String>) {
        self.plan = plan;
    }

    /// Append reflector-proposed queries verbatim.
    pub fn extend_plan(&mut self, queries: &[String]) {
        self.plan.extend(queries.iter().cloned());
    }

    pub fn is_completed(&self, query: &str) -> bool {
        self.completed.iter().any(|done| done == query)
    }

    pub fn completed_queries(&self) -> &[String] {
        &self.completed
    }

    /// Plan entries not yet completed, in plan order.
    pub fn pending_queries(&self) -> Vec<String> {
        self.plan
            .iter()
            .filter(|query| !self.is_completed(query))
            .cloned()
            .collect()
    }

    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    pub fn reflections(&self) -> &[ReflectionRecord] {
        &self.reflections
    }

    pub fn log(&self) -> &[LogEntry] {
        &self.log
    }

    pub fn record_log(&mut self, phase: Phase, message: impl Into<String>) -> LogEntry {
        let entry = LogEntry {
            timestamp: Local::now().format("%H:%M:%S").to_string(),
            phase,
            message: message.into(),
        };
        self.log.push(entry.clone());
        entry
    }

    /// Append a finding for the current iteration and mark `query` completed.
    ///
    /// Every call appends a finding; the completion mark is recorded once.
    pub fn record_finding(&mut self, query: &str, analysis: &str, sources: Vec<String>) {
        self.findings.push(Finding {
            query: query.to_string(),
            analysis: analysis.to_string(),
            sources,
            iteration: self.iteration,
        });
        if !self.is_completed(query) {
            self.completed.push(query.to_string());
        }
    }

    pub fn record_reflection(&mut self, completeness: u8, depth: u8, gaps: &str, verdict: Verdict) {
        self.reflections.push(ReflectionRecord {
            iteration: self.iteration,
            completeness,
            depth,
            gaps: gaps.to_string(),
            verdict,
        });
    }

    /// Deterministic rendering of all findings, in recording order.
    pub fn findings_summary(&self) -> String {
        if self.findings.is_empty() {
            return NO_FINDINGS.to_string();
        }
        self.findings
            .iter()
            .enumerate()
            .map(|(idx, finding)| {
                let sources = if finding.sources.is_empty() {
                    "N/A".to_string()
                } else {
                    finding.sources.join("\n")
                };
                format!(
                    "### Research Task {}: {}\n{}\n**Sources:** {}\n",
                    idx + 1,
                    finding.query,
                    finding.analysis,
                    sources
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            goal: self.goal.clone(),
            started_at: self.started_at.clone(),
            iteration: self.iteration,
            status: self.status,
            plan: self.plan.clone(),
            completed_queries: self.completed.clone(),
            findings_count: self.findings.len(),
            reflections: self.reflections.clone(),
            log: self.log.clone(),
        }
    }
}
