//! Per-session progress channel and its Server-Sent Events stream.
//!
//! The run thread pushes into a bounded channel with `try_send`, so a slow or
//! absent consumer never stalls research. The stream ends after exactly one
//! terminal event (`done`, `stopped` or `error`).

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{info, warn};

use researcher::io::config::RunSettings;
use researcher::io::report_store::save_report;
use researcher::observer::LogSink;
use researcher::orchestrator::RunOutcome;
use researcher::session::{LogEntry, SessionSnapshot};

use crate::state::{AppState, RunEvent, SessionHandle};

/// Forwards progress into the session channel and keeps the latest snapshot.
struct ChannelSink {
    handle: Arc<SessionHandle>,
    tx: mpsc::Sender<RunEvent>,
}

impl ChannelSink {
    fn push(&self, event: RunEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                warn!(session = %self.handle.id, event = event.name(), "event channel full; dropping");
            }
            Err(TrySendError::Closed(_)) => {}
        }
    }
}

impl LogSink for ChannelSink {
    fn on_log(&self, entry: &LogEntry) {
        self.push(RunEvent::Log(entry.clone()));
    }

    fn on_snapshot(&self, snapshot: &SessionSnapshot) {
        self.handle.set_snapshot(snapshot.clone());
    }
}

/// Execute one run to completion on the current (blocking) thread.
pub fn run_session(
    state: &AppState,
    handle: Arc<SessionHandle>,
    settings: RunSettings,
    tx: mpsc::Sender<RunEvent>,
) {
    let output_dir = settings.output_dir.clone();
    let sink = ChannelSink {
        handle: handle.clone(),
        tx,
    };
    let terminal = match (state.factory)(settings) {
        Err(err) => RunEvent::Error {
            message: format!("{err:#}"),
        },
        Ok(mut orchestrator) => {
            let outcome = orchestrator.run(&handle.goal, &sink, &handle.cancel);
            handle.set_snapshot(orchestrator.snapshot());
            match outcome {
                Ok(RunOutcome::Complete(report)) => {
                    let path = match save_report(&output_dir, &handle.goal, &report.markdown, None) {
                        Ok(path) => Some(path.display().to_string()),
                        Err(err) => {
                            warn!(session = %handle.id, error = %format!("{err:#}"), "failed to save report");
                            None
                        }
                    };
                    RunEvent::Done { report, path }
                }
                Ok(RunOutcome::Cancelled) => RunEvent::Stopped,
                Err(err) => RunEvent::Error {
                    message: format!("{err:#}"),
                },
            }
        }
    };
    info!(session = %handle.id, outcome = terminal.name(), "session finished");
    handle.finish(&terminal);
    sink.push(terminal);
}

fn to_sse(event: &RunEvent) -> Event {
    Event::default()
        .event(event.name())
        .data(event.data().to_string())
}

/// GET /api/sessions/{id}/events - progress stream for one session.
pub async fn events_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, StatusCode> {
    let handle = state.session(&id).ok_or(StatusCode::NOT_FOUND)?;
    let mut rx = handle.take_events().ok_or(StatusCode::CONFLICT)?;

    let stream = async_stream::stream! {
        loop {
            match rx.recv().await {
                Some(event) => {
                    let terminal = event.is_terminal();
                    yield Ok(to_sse(&event));
                    if terminal {
                        break;
                    }
                }
                None => {
                    // The terminal event was dropped on a full channel.
                    if let Some(event) = handle.result().terminal {
                        yield Ok(to_sse(&event));
                    }
                    break;
                }
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    ))
}
