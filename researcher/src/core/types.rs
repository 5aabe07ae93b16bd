//! Shared deterministic types for the research loop.
//!
//! These types define stable contracts between core components, the session
//! record and its observers. They carry no I/O and serialize in lowercase so
//! status payloads stay stable for the web service.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle of one research session.
///
/// The happy path runs `Idle -> Initialized -> Planning -> (Researching ->
/// Reflecting)* -> Synthesizing -> Complete`. `Cancelled` and `Failed` are
/// terminal and never reached from `Complete`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Idle,
    Initialized,
    Planning,
    Researching,
    Reflecting,
    Synthesizing,
    Complete,
    Cancelled,
    Failed,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Idle => "idle",
            Status::Initialized => "initialized",
            Status::Planning => "planning",
            Status::Researching => "researching",
            Status::Reflecting => "reflecting",
            Status::Synthesizing => "synthesizing",
            Status::Complete => "complete",
            Status::Cancelled => "cancelled",
            Status::Failed => "failed",
        }
    }

    /// True once the session can no longer change.
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Complete | Status::Cancelled | Status::Failed)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reflector judgment driving continuation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    More,
    #[default]
    Sufficient,
}

impl Verdict {
    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::More => "MORE",
            Verdict::Sufficient => "SUFFICIENT",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log phase attached to every progress entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Init,
    Plan,
    Research,
    Search,
    Extract,
    Analyze,
    Reflect,
    Guardrail,
    Synthesize,
    Done,
    Stopped,
    Error,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Init => "init",
            Phase::Plan => "plan",
            Phase::Research => "research",
            Phase::Search => "search",
            Phase::Extract => "extract",
            Phase::Analyze => "analyze",
            Phase::Reflect => "reflect",
            Phase::Guardrail => "guardrail",
            Phase::Synthesize => "synthesize",
            Phase::Done => "done",
            Phase::Stopped => "stopped",
            Phase::Error => "error",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured self-assessment parsed from one reflector response.
///
/// Every field is always populated; missing markers resolve to documented
/// defaults (see [`crate::core::reflection::parse_reflection`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reflection {
    /// Completeness score, clamped to `0..=10`.
    pub completeness: u8,
    /// Depth score, clamped to `0..=10`.
    pub depth: u8,
    pub gaps: String,
    pub verdict: Verdict,
    /// At most two follow-up queries.
    pub additional_queries: Vec<String>,
    /// Unparsed model text, kept for format checks.
    pub raw: String,
}
