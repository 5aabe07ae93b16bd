//! Scripted collaborators for deterministic tests.
//!
//! Nothing here touches the network. Each fake records what it was asked so
//! tests can assert on call order and parameters.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Result, anyhow};

use crate::agents::executor::{TaskExecutor, TaskResult};
use crate::core::profile::ResourceProfile;
use crate::core::types::Phase;
use crate::io::config::RunSettings;
use crate::io::extract::ContentExtractor;
use crate::io::llm::{ChatMessage, LlmProvider, ProviderError, ProviderKind, ProviderSettings};
use crate::io::search::{SearchResult, SearchTool};
use crate::observer::{CancelToken, LogSink, Progress};
use crate::session::{LogEntry, SessionSnapshot};

/// One recorded `generate` call.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

type Responder = Box<dyn Fn(&[ChatMessage]) -> Result<String, ProviderError> + Send + Sync>;

enum Script {
    Queue(VecDeque<Result<String, ProviderError>>),
    Responder(Responder),
}

/// Generation backend that replays queued replies or answers through a closure.
pub struct ScriptedLlm {
    script: Mutex<Script>,
    requests: Mutex<Vec<LlmRequest>>,
}

impl ScriptedLlm {
    /// Replies returned in order; an exhausted queue is an error.
    pub fn new<S: Into<String>>(replies: impl IntoIterator<Item = S>) -> Self {
        Self::from_results(replies.into_iter().map(|reply| Ok(reply.into())))
    }

    pub fn from_results(
        results: impl IntoIterator<Item = Result<String, ProviderError>>,
    ) -> Self {
        Self {
            script: Mutex::new(Script::Queue(results.into_iter().collect())),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answer each call by inspecting its messages.
    pub fn responder(
        respond: impl Fn(&[ChatMessage]) -> Result<String, ProviderError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            script: Mutex::new(Script::Responder(Box::new(respond))),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Every call fails with an authentication error.
    pub fn failing() -> Self {
        Self::responder(|_| Err(auth_error()))
    }

    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().expect("requests lock").clone()
    }
}

pub fn auth_error() -> ProviderError {
    ProviderError::Auth {
        provider: "scripted",
        status: 401,
    }
}

impl LlmProvider for ScriptedLlm {
    fn generate(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, ProviderError> {
        self.requests.lock().expect("requests lock").push(LlmRequest {
            messages: messages.to_vec(),
            temperature,
            max_tokens,
        });
        let mut script = self.script.lock().expect("script lock");
        match &mut *script {
            Script::Queue(queue) => queue.pop_front().unwrap_or_else(|| {
                Err(ProviderError::InvalidResponse {
                    provider: "scripted",
                    detail: "script exhausted".to_string(),
                })
            }),
            Script::Responder(respond) => respond(messages),
        }
    }

    fn is_available(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-model"
    }
}

pub fn result(title: &str, url: &str, snippet: &str) -> SearchResult {
    SearchResult {
        title: title.to_string(),
        url: url.to_string(),
        snippet: snippet.to_string(),
    }
}

/// Search tool with a default result list and per-query overrides.
#[derive(Default)]
pub struct ScriptedSearch {
    default: Vec<SearchResult>,
    per_query: HashMap<String, Vec<SearchResult>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedSearch {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn always(results: Vec<SearchResult>) -> Self {
        Self {
            default: results,
            ..Self::default()
        }
    }

    pub fn with_query(mut self, query: &str, results: Vec<SearchResult>) -> Self {
        self.per_query.insert(query.to_string(), results);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }
}

impl SearchTool for ScriptedSearch {
    fn search(&self, query: &str, max_results: usize) -> Vec<SearchResult> {
        self.calls.lock().expect("calls lock").push(query.to_string());
        self.per_query
            .get(query)
            .unwrap_or(&self.default)
            .iter()
            .take(max_results)
            .cloned()
            .collect()
    }
}

/// Extractor serving fixed text per URL.
#[derive(Default)]
pub struct ScriptedExtractor {
    pages: HashMap<String, String>,
}

impl ScriptedExtractor {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new<'a>(pages: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self {
            pages: pages
                .into_iter()
                .map(|(url, text)| (url.to_string(), text.to_string()))
                .collect(),
        }
    }
}

impl ContentExtractor for ScriptedExtractor {
    fn extract(&self, url: &str, max_chars: usize) -> Option<String> {
        self.pages
            .get(url)
            .map(|text| text.chars().take(max_chars).collect())
    }
}

/// Task executor that fabricates a finding per query.
///
/// Clones share the record of executed queries.
#[derive(Clone, Default)]
pub struct ScriptedTaskExecutor {
    overrides: Arc<HashMap<String, TaskResult>>,
    fail_on: Option<String>,
    executed: Arc<Mutex<Vec<String>>>,
}

impl ScriptedTaskExecutor {
    /// `Analysis of {query}` with one source per query.
    pub fn echo() -> Self {
        Self::default()
    }

    pub fn with_result(self, query: &str, result: TaskResult) -> Self {
        let mut overrides = (*self.overrides).clone();
        overrides.insert(query.to_string(), result);
        Self {
            overrides: Arc::new(overrides),
            ..self
        }
    }

    /// Fail fatally when `query` is executed.
    pub fn failing_on(self, query: &str) -> Self {
        Self {
            fail_on: Some(query.to_string()),
            ..self
        }
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().expect("executed lock").clone()
    }
}

impl TaskExecutor for ScriptedTaskExecutor {
    fn execute(&self, query: &str, progress: &mut Progress<'_>) -> Result<TaskResult> {
        progress.log(Phase::Search, format!("Searching: {query}"))?;
        self.executed
            .lock()
            .expect("executed lock")
            .push(query.to_string());
        if self.fail_on.as_deref() == Some(query) {
            return Err(anyhow!(auth_error()));
        }
        if let Some(result) = self.overrides.get(query) {
            return Ok(result.clone());
        }
        let slug: String = query
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
            .collect();
        Ok(TaskResult {
            analysis: format!("Analysis of {query}"),
            sources: vec![format!("https://example.com/{slug}")],
        })
    }
}

/// Sink that keeps everything it receives and can trigger a stop.
#[derive(Default)]
pub struct RecordingSink {
    entries: Mutex<Vec<LogEntry>>,
    snapshots: Mutex<Vec<SessionSnapshot>>,
    cancel_on: Option<(String, CancelToken)>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel `token` when a message containing `needle` is delivered.
    pub fn cancelling_on(needle: &str, token: CancelToken) -> Self {
        Self {
            cancel_on: Some((needle.to_string(), token)),
            ..Self::default()
        }
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().expect("entries lock").clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.entries().into_iter().map(|e| e.message).collect()
    }

    pub fn snapshots(&self) -> Vec<SessionSnapshot> {
        self.snapshots.lock().expect("snapshots lock").clone()
    }
}

impl LogSink for RecordingSink {
    fn on_log(&self, entry: &LogEntry) {
        if let Some((needle, token)) = &self.cancel_on
            && entry.message.contains(needle.as_str())
        {
            token.cancel();
        }
        self.entries.lock().expect("entries lock").push(entry.clone());
    }

    fn on_snapshot(&self, snapshot: &SessionSnapshot) {
        self.snapshots
            .lock()
            .expect("snapshots lock")
            .push(snapshot.clone());
    }
}

/// Full-profile settings for a scripted backend.
pub fn run_settings(depth: &str, max_iterations: u32) -> RunSettings {
    RunSettings {
        provider: ProviderSettings {
            kind: ProviderKind::Ollama,
            model: "scripted-model".to_string(),
            base_url: "http://127.0.0.1:9".to_string(),
            api_key: None,
            timeout: Duration::from_secs(1),
        },
        depth: depth.to_string(),
        max_iterations,
        max_search_results: 5,
        profile: ResourceProfile::for_mode(false),
        check_groundedness: false,
        output_dir: PathBuf::from("outputs"),
        search_timeout: Duration::from_secs(1),
        extract_timeout: Duration::from_secs(1),
        run_timeout: None,
    }
}

/// Reflector reply in the expected marker format.
pub fn reflection_reply(completeness: u8, depth: u8, verdict: &str, queries: &[&str]) -> String {
    let queries = if queries.is_empty() {
        "none".to_string()
    } else {
        queries.join("\n")
    };
    format!(
        "COMPLETENESS: {completeness}\nDEPTH: {depth}\nGAPS: scripted gaps\nVERDICT: {verdict}\nADDITIONAL_QUERIES:\n{queries}"
    )
}
