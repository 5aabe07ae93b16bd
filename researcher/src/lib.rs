//! Autonomous research agent.
//!
//! Given a goal, the agent plans web search queries, researches each one,
//! scores its own findings and iterates until the research is good enough or
//! the iteration budget runs out, then writes a markdown report.
//!
//! - **[`core`]**: Pure, deterministic logic (plan cleanup, reflection parsing,
//!   continuation policy, format checks). No I/O, fully testable in isolation.
//! - **[`io`]**: Side effects (configuration, model backends, web search,
//!   page extraction, report files). Each capability sits behind a trait.
//! - **[`agents`]**: Planner, executor, reflector, guardrails and synthesizer,
//!   each wrapping one kind of model call.
//! - **[`orchestrator`]**: The loop that drives a [`session::SessionState`]
//!   through one run.

pub mod agents;
pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod observer;
pub mod orchestrator;
pub mod session;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
