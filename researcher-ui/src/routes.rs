//! HTTP route handlers for the research API.

use axum::Router;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::info;
use uuid::Uuid;

use researcher::core::types::Status;
use researcher::io::config::{AgentConfig, RunOverrides, load_config, process_env, provider_catalog};
use researcher::io::llm::{ProviderInfo, ProviderKind};
use researcher::io::report_store::{InvalidReportName, ReportEntry, list_reports, read_report};
use researcher::orchestrator::ResearchReport;
use researcher::session::SessionSnapshot;

use crate::sse;
use crate::state::{AppState, SessionHandle};

/// Build the API router.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/providers", get(providers))
        .route("/run", post(start_run))
        .route("/sessions", get(list_sessions))
        .route("/sessions/{id}/status", get(session_status))
        .route("/sessions/{id}/stop", post(stop_session))
        .route("/sessions/{id}/events", get(sse::events_handler))
        .route("/reports", get(reports))
        .route("/reports/{filename}", get(report))
}

/// JSON `{error}` body with a status code.
#[derive(Debug)]
pub struct ApiError(StatusCode, String);

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self(StatusCode::BAD_REQUEST, message.into())
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self(StatusCode::NOT_FOUND, message.into())
    }

    fn internal(err: &anyhow::Error) -> Self {
        Self(StatusCode::INTERNAL_SERVER_ERROR, format!("{err:#}"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(json!({ "error": self.1 }))).into_response()
    }
}

fn config(state: &AppState) -> Result<AgentConfig, ApiError> {
    load_config(&state.config_path).map_err(|err| ApiError::internal(&err))
}

async fn health() -> &'static str {
    "ok"
}

#[derive(Serialize)]
struct ProvidersResponse {
    providers: Vec<ProviderInfo>,
    ollama_available: bool,
    active_provider: ProviderKind,
}

/// GET /api/providers - catalogue with availability.
async fn providers(State(state): State<AppState>) -> Result<Json<ProvidersResponse>, ApiError> {
    let config = config(&state)?;
    let active_provider = config.provider;
    // Probing Ollama is a blocking HTTP call.
    let providers = tokio::task::spawn_blocking(move || provider_catalog(&config, &process_env))
        .await
        .map_err(|err| ApiError::internal(&anyhow::Error::from(err)))?;
    let ollama_available = providers
        .iter()
        .any(|p| p.id == ProviderKind::Ollama && p.available);
    Ok(Json(ProvidersResponse {
        providers,
        ollama_available,
        active_provider,
    }))
}

#[derive(Debug, Deserialize)]
pub struct RunRequest {
    goal: String,
    provider: Option<String>,
    model: Option<String>,
    depth: Option<String>,
}

#[derive(Serialize)]
struct RunStarted {
    session_id: String,
    status: &'static str,
    goal: String,
}

/// POST /api/run - start a research session in the background.
async fn start_run(
    State(state): State<AppState>,
    Json(request): Json<RunRequest>,
) -> Result<Json<RunStarted>, ApiError> {
    let goal = request.goal.trim().to_string();
    if goal.is_empty() {
        return Err(ApiError::bad_request("goal must be non-empty"));
    }
    let provider = match request.provider.as_deref() {
        Some(name) => Some(
            ProviderKind::parse(name)
                .ok_or_else(|| ApiError::bad_request(format!("unknown provider: {name}")))?,
        ),
        None => None,
    };
    let overrides = RunOverrides {
        provider,
        model: request.model.filter(|m| !m.trim().is_empty()),
        depth: request.depth,
        ..RunOverrides::default()
    };
    let settings = config(&state)?
        .resolve(&overrides, &process_env)
        .map_err(|err| ApiError::bad_request(format!("{err:#}")))?;

    let id = Uuid::new_v4().to_string();
    let (handle, tx) = SessionHandle::new(id.clone(), goal.clone());
    state.insert(handle.clone());
    info!(session = %id, goal = %goal, "starting research session");

    let worker_state = state.clone();
    tokio::task::spawn_blocking(move || sse::run_session(&worker_state, handle, settings, tx));

    Ok(Json(RunStarted {
        session_id: id,
        status: "started",
        goal,
    }))
}

#[derive(Serialize)]
struct SessionSummary {
    id: String,
    goal: String,
    created_at: String,
    running: bool,
    status: Option<Status>,
}

/// GET /api/sessions - every session started by this server.
async fn list_sessions(State(state): State<AppState>) -> Json<Vec<SessionSummary>> {
    let sessions = state
        .list()
        .into_iter()
        .map(|handle| SessionSummary {
            id: handle.id.clone(),
            goal: handle.goal.clone(),
            created_at: handle.created_at.clone(),
            running: handle.is_running(),
            status: handle.snapshot().map(|s| s.status),
        })
        .collect();
    Json(sessions)
}

#[derive(Serialize)]
struct StatusResponse {
    running: bool,
    state: Option<SessionSnapshot>,
    report: Option<ResearchReport>,
    saved_path: Option<String>,
    error: Option<String>,
}

/// GET /api/sessions/{id}/status - latest snapshot and result.
async fn session_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StatusResponse>, ApiError> {
    let handle = state
        .session(&id)
        .ok_or_else(|| ApiError::not_found("session not found"))?;
    let result = handle.result();
    Ok(Json(StatusResponse {
        running: result.running,
        state: handle.snapshot(),
        report: result.report,
        saved_path: result.saved_path,
        error: result.error,
    }))
}

/// POST /api/sessions/{id}/stop - request cooperative cancellation.
async fn stop_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let handle = state
        .session(&id)
        .ok_or_else(|| ApiError::not_found("session not found"))?;
    if !handle.is_running() {
        return Err(ApiError(StatusCode::CONFLICT, "session already finished".into()));
    }
    handle.cancel.cancel();
    info!(session = %id, "stop requested");
    Ok(Json(json!({ "status": "stopping" })))
}

/// GET /api/reports - saved reports, newest first.
async fn reports(State(state): State<AppState>) -> Result<Json<Vec<ReportEntry>>, ApiError> {
    let config = config(&state)?;
    let entries = list_reports(&config.output.directory).map_err(|err| ApiError::internal(&err))?;
    Ok(Json(entries))
}

/// GET /api/reports/{filename} - one report as markdown.
async fn report(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    let config = config(&state)?;
    match read_report(&config.output.directory, &filename) {
        Ok(Some(markdown)) => Ok((
            [(header::CONTENT_TYPE, "text/markdown; charset=utf-8")],
            markdown,
        )
            .into_response()),
        Ok(None) => Err(ApiError::not_found("report not found")),
        Err(err) if err.is::<InvalidReportName>() => Err(ApiError::bad_request(format!("{err}"))),
        Err(err) => Err(ApiError::internal(&err)),
    }
}
