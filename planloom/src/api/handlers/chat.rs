//! `POST /chat/message`, `GET /chat/actions/{tracking_id}`,
//! `GET /chat/history/{session_id}` (spec §6).

use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::db::models::JobStatus;
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use std::str::FromStr;

#[derive(Debug, Deserialize)]
pub struct ChatMessageRequest {
    pub message: String,
    pub session_id: String,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub history: Option<Value>,
    #[serde(default)]
    pub context: Option<Value>,
    #[serde(default)]
    pub default_search_provider: Option<String>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

/// `POST /chat/message` (spec §6): runs one chat turn through the
/// Structured Action Agent and returns its response, dispatched actions, and
/// metadata (a `tracking_id` when part of the turn runs as a background job).
pub async fn send_message(
    State(state): State<AppState>,
    Json(request): Json<ChatMessageRequest>,
) -> ApiResult<impl IntoResponse> {
    if request.message.trim().is_empty() {
        return Err(ApiError::ValidationError("message must not be empty".to_string()));
    }
    if request.session_id.trim().is_empty() {
        return Err(ApiError::ValidationError("session_id must not be empty".to_string()));
    }

    let turn = crate::agent::handle_turn(&state.deps, &state.config, &request.session_id, &request.message)
        .await
        .map_err(ApiError::from)?;

    Ok(crate::api::response::ok(turn))
}

/// `GET /chat/actions/{tracking_id}` (spec §6): poll a background turn's job
/// for status, dispatched actions, and any terminal result or errors.
pub async fn action_status(
    State(state): State<AppState>,
    Path(tracking_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let job = state.deps.jobs.get_job(&tracking_id).await.map_err(ApiError::from)?;
    let action_logs = state.deps.jobs.action_logs(&tracking_id).await.map_err(ApiError::from)?;

    let status = JobStatus::from_str(&job.status).unwrap_or(JobStatus::Queued);
    let mapped_status = match status {
        JobStatus::Queued => "pending",
        JobStatus::Running => "running",
        JobStatus::Succeeded => "completed",
        JobStatus::Failed => "failed",
    };

    let actions: Vec<Value> = action_logs
        .iter()
        .map(|a| {
            json!({
                "kind": a.action_kind,
                "name": a.action_name,
                "status": a.status,
                "success": a.success,
                "message": a.message,
                "details": a.details_json.as_deref().and_then(|s| serde_json::from_str::<Value>(s).ok()),
            })
        })
        .collect();

    let mut errors: Vec<String> = action_logs
        .iter()
        .filter(|a| !a.success)
        .filter_map(|a| a.message.clone())
        .collect();
    if let Some(err) = &job.error {
        errors.push(err.clone());
    }

    let result = job
        .result_json
        .as_deref()
        .and_then(|s| serde_json::from_str::<Value>(s).ok());

    Ok(crate::api::response::ok(json!({
        "status": mapped_status,
        "plan_id": job.plan_id,
        "actions": actions,
        "errors": errors,
        "result": result,
        "finished_at": job.finished_at,
    })))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub limit: Option<i64>,
}

/// `GET /chat/history/{session_id}?limit=N` (spec §6).
pub async fn history(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<impl IntoResponse> {
    let limit = query.limit.unwrap_or(50).clamp(1, 500);
    let messages = state.deps.sessions.history(&session_id, limit).await.map_err(ApiError::from)?;
    Ok(crate::api::response::ok(messages))
}
