use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;

use crate::sessions::EnvironmentSummary;
use crate::workflow::{ChatRequest, Orchestrator};

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
}

pub type SharedState = Arc<AppState>;

// ── Request payload types ─────────────────────────────────────────────

#[derive(Deserialize)]
pub struct DownloadThemeRequest {
    pub theme_id: String,
}

// ── Error handling ────────────────────────────────────────────────────

pub enum ApiError {
    NotFound(String),
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
        };
        (status, Json(json!({"error": message}))).into_response()
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/themes/list", post(list_themes))
        .route("/themes/download", post(download_theme))
        .route("/environments", get(list_environments))
        .route(
            "/environments/{env_id}",
            get(get_environment).delete(delete_environment),
        )
        .route("/environments/{env_id}/chat", post(chat))
        .route("/environments/{env_id}/chat/stream", post(chat_stream))
        .route("/health", get(health_check))
}

fn accepted(body: serde_json::Value) -> impl IntoResponse {
    (StatusCode::ACCEPTED, Json(body))
}

fn validate_prompt(request: &ChatRequest) -> Result<(), ApiError> {
    if request.prompt.trim().is_empty() {
        return Err(ApiError::BadRequest("prompt must not be empty".into()));
    }
    Ok(())
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn health_check() -> &'static str {
    "ok"
}

async fn list_themes(State(state): State<SharedState>) -> impl IntoResponse {
    state.orchestrator.submit_list_themes();
    accepted(json!({"status": "accepted"}))
}

async fn download_theme(
    State(state): State<SharedState>,
    Json(req): Json<DownloadThemeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let theme_id = req.theme_id.trim().to_string();
    if theme_id.is_empty() {
        return Err(ApiError::BadRequest("theme_id must not be empty".into()));
    }
    state.orchestrator.submit_download(theme_id.clone());
    Ok(accepted(json!({"status": "accepted", "theme_id": theme_id})))
}

async fn list_environments(State(state): State<SharedState>) -> impl IntoResponse {
    let mut summaries: Vec<EnvironmentSummary> = state
        .orchestrator
        .registry()
        .list()
        .iter()
        .map(EnvironmentSummary::from)
        .collect();
    summaries.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    Json(summaries)
}

async fn get_environment(
    State(state): State<SharedState>,
    Path(env_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .orchestrator
        .registry()
        .get(&env_id)
        .map(|env| Json(EnvironmentSummary::from(&env)))
        .ok_or_else(|| ApiError::NotFound(format!("Environment {} not found", env_id)))
}

async fn delete_environment(
    State(state): State<SharedState>,
    Path(env_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    match state.orchestrator.registry().remove(&env_id) {
        true => Ok(StatusCode::NO_CONTENT),
        false => Err(ApiError::NotFound(format!("Environment {} not found", env_id))),
    }
}

async fn chat(
    State(state): State<SharedState>,
    Path(env_id): Path<String>,
    Json(req): Json<ChatRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_prompt(&req)?;
    state.orchestrator.submit_chat(env_id.clone(), req);
    Ok(accepted(json!({"status": "accepted", "env_id": env_id})))
}

async fn chat_stream(
    State(state): State<SharedState>,
    Path(env_id): Path<String>,
    Json(req): Json<ChatRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_prompt(&req)?;
    state.orchestrator.submit_chat_stream(env_id.clone(), req);
    Ok(accepted(json!({"status": "accepted", "env_id": env_id})))
}
