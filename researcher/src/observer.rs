//! Progress sink and cooperative cancellation.
//!
//! A run reports every significant event through a [`LogSink`]. The same
//! emission point checks the run's [`CancelToken`]: once a stop is requested,
//! the next emission returns [`Cancelled`] and the orchestrator unwinds to a
//! `cancelled` status without issuing further collaborator calls.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;

use crate::core::types::Phase;
use crate::session::{LogEntry, SessionSnapshot, SessionState};

/// Receives progress entries synchronously while a run executes.
pub trait LogSink: Send + Sync {
    fn on_log(&self, entry: &LogEntry);

    /// Called at status transitions with the full session view.
    fn on_snapshot(&self, _snapshot: &SessionSnapshot) {}
}

impl<F> LogSink for F
where
    F: Fn(&LogEntry) + Send + Sync,
{
    fn on_log(&self, entry: &LogEntry) {
        self(entry);
    }
}

/// Sink that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl LogSink for NullSink {
    fn on_log(&self, _entry: &LogEntry) {}
}

/// Shared stop flag for one run.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Marker error returned from a log emission after a stop request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

impl fmt::Display for Cancelled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("run cancelled")
    }
}

impl std::error::Error for Cancelled {}

/// Emission handle threaded through one run.
///
/// Borrows the session mutably so agents can log without owning it.
pub struct Progress<'a> {
    session: &'a mut SessionState,
    sink: &'a dyn LogSink,
    cancel: &'a CancelToken,
}

impl<'a> Progress<'a> {
    pub fn new(session: &'a mut SessionState, sink: &'a dyn LogSink, cancel: &'a CancelToken) -> Self {
        Self {
            session,
            sink,
            cancel,
        }
    }

    /// Record and deliver a log entry, then honour any pending stop request.
    pub fn log(&mut self, phase: Phase, message: impl Into<String>) -> Result<()> {
        self.record(phase, message);
        if self.cancel.is_cancelled() {
            return Err(Cancelled.into());
        }
        Ok(())
    }

    /// Record and deliver without a cancellation check.
    pub fn record(&mut self, phase: Phase, message: impl Into<String>) {
        let entry = self.session.record_log(phase, message);
        self.sink.on_log(&entry);
    }

    /// Push the current session view to the sink.
    pub fn publish(&self) {
        self.sink.on_snapshot(&self.session.snapshot());
    }

    pub fn session(&self) -> &SessionState {
        self.session
    }

    pub fn session_mut(&mut self) -> &mut SessionState {
        self.session
    }
}
