//! Agents composed by the orchestrator. Each wraps one kind of model call.

pub mod executor;
pub mod guardrails;
pub mod planner;
pub mod reflector;
pub mod synthesizer;
