//! Shared application state for the web server.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Result;
use chrono::Utc;
use serde::Serialize;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::debug;

use researcher::io::config::RunSettings;
use researcher::observer::CancelToken;
use researcher::orchestrator::{Orchestrator, ResearchReport};
use researcher::session::{LogEntry, SessionSnapshot};

/// Bound on buffered progress events per session.
pub const EVENT_CAPACITY: usize = 256;

/// Finished sessions kept for status queries; older ones are evicted on insert.
pub const RETAINED_FINISHED_SESSIONS: usize = 32;

/// Builds the orchestrator for a run; swapped for scripted collaborators in tests.
pub type OrchestratorFactory = Arc<dyn Fn(RunSettings) -> Result<Orchestrator> + Send + Sync>;

/// Events delivered on a session's stream.
#[derive(Debug, Clone)]
pub enum RunEvent {
    Log(LogEntry),
    Done {
        report: ResearchReport,
        path: Option<String>,
    },
    Stopped,
    Error {
        message: String,
    },
}

impl RunEvent {
    pub fn name(&self) -> &'static str {
        match self {
            RunEvent::Log(_) => "log",
            RunEvent::Done { .. } => "done",
            RunEvent::Stopped => "stopped",
            RunEvent::Error { .. } => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunEvent::Log(_))
    }

    pub fn data(&self) -> Value {
        match self {
            RunEvent::Log(entry) => json!(entry),
            RunEvent::Done { report, path } => json!({ "report": report, "path": path }),
            RunEvent::Stopped => json!({ "status": "cancelled" }),
            RunEvent::Error { message } => json!({ "message": message }),
        }
    }
}

/// Result fields exposed by the status endpoint.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionResult {
    pub running: bool,
    pub report: Option<ResearchReport>,
    pub saved_path: Option<String>,
    pub error: Option<String>,
    /// Terminal event kept so a late stream still ends with it.
    #[serde(skip)]
    pub terminal: Option<RunEvent>,
}

/// One web-initiated run.
pub struct SessionHandle {
    pub id: String,
    pub goal: String,
    pub created_at: String,
    pub cancel: CancelToken,
    snapshot: Mutex<Option<SessionSnapshot>>,
    result: Mutex<SessionResult>,
    events: Mutex<Option<mpsc::Receiver<RunEvent>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

impl SessionHandle {
    /// New running session plus the sending half of its event channel.
    pub fn new(id: String, goal: String) -> (Arc<Self>, mpsc::Sender<RunEvent>) {
        let (tx, rx) = mpsc::channel(EVENT_CAPACITY);
        let handle = Self {
            id,
            goal,
            created_at: Utc::now().to_rfc3339(),
            cancel: CancelToken::new(),
            snapshot: Mutex::new(None),
            result: Mutex::new(SessionResult {
                running: true,
                ..SessionResult::default()
            }),
            events: Mutex::new(Some(rx)),
        };
        (Arc::new(handle), tx)
    }

    /// Hand the event stream to its single consumer.
    pub fn take_events(&self) -> Option<mpsc::Receiver<RunEvent>> {
        lock(&self.events).take()
    }

    pub fn snapshot(&self) -> Option<SessionSnapshot> {
        lock(&self.snapshot).clone()
    }

    pub fn set_snapshot(&self, snapshot: SessionSnapshot) {
        *lock(&self.snapshot) = Some(snapshot);
    }

    pub fn result(&self) -> SessionResult {
        lock(&self.result).clone()
    }

    pub fn is_running(&self) -> bool {
        lock(&self.result).running
    }

    /// Record the terminal event; the session stops counting as running.
    pub fn finish(&self, terminal: &RunEvent) {
        let mut result = lock(&self.result);
        result.running = false;
        match terminal {
            RunEvent::Done { report, path } => {
                result.report = Some(report.clone());
                result.saved_path.clone_from(path);
            }
            RunEvent::Error { message } => result.error = Some(message.clone()),
            RunEvent::Stopped | RunEvent::Log(_) => {}
        }
        result.terminal = Some(terminal.clone());
    }
}

/// Shared state accessible from all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub config_path: PathBuf,
    pub sessions: Arc<Mutex<HashMap<String, Arc<SessionHandle>>>>,
    pub factory: OrchestratorFactory,
    pub retained_finished: usize,
}

impl AppState {
    pub fn new(config_path: PathBuf) -> Self {
        Self::with_factory(config_path, Arc::new(Orchestrator::from_settings))
    }

    pub fn with_factory(config_path: PathBuf, factory: OrchestratorFactory) -> Self {
        Self {
            config_path,
            sessions: Arc::new(Mutex::new(HashMap::new())),
            factory,
            retained_finished: RETAINED_FINISHED_SESSIONS,
        }
    }

    pub fn with_retention(self, retained_finished: usize) -> Self {
        Self {
            retained_finished,
            ..self
        }
    }

    pub fn session(&self, id: &str) -> Option<Arc<SessionHandle>> {
        lock(&self.sessions).get(id).cloned()
    }

    /// Register a session, then drop the oldest finished sessions beyond the
    /// retention limit. Running sessions are never evicted.
    pub fn insert(&self, handle: Arc<SessionHandle>) {
        let mut sessions = lock(&self.sessions);
        sessions.insert(handle.id.clone(), handle);

        let mut finished: Vec<(String, String)> = sessions
            .values()
            .filter(|session| !session.is_running())
            .map(|session| (session.created_at.clone(), session.id.clone()))
            .collect();
        if finished.len() <= self.retained_finished {
            return;
        }
        finished.sort();
        let excess = finished.len() - self.retained_finished;
        for (_, id) in finished.into_iter().take(excess) {
            debug!(session = %id, "evicting finished session");
            sessions.remove(&id);
        }
    }

    /// All sessions, oldest first.
    pub fn list(&self) -> Vec<Arc<SessionHandle>> {
        let mut sessions: Vec<_> = lock(&self.sessions).values().cloned().collect();
        sessions.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        sessions
    }
}
