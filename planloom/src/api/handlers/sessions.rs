//! `GET /chat/sessions`, `PATCH /chat/sessions/{id}`,
//! `POST /chat/sessions/{id}/autotitle`, `DELETE /chat/sessions/{id}` (spec §6).

use crate::api::error::{ApiError, ApiResult};
use crate::api::middleware::validation::validate_pagination;
use crate::api::state::AppState;
use crate::db::models::{NameSource, SessionSettings};
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ListSessionsQuery {
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
    #[serde(default)]
    pub active: Option<bool>,
}

/// `GET /chat/sessions?limit&offset&active` (spec §6).
pub async fn list_sessions(
    State(state): State<AppState>,
    Query(query): Query<ListSessionsQuery>,
) -> ApiResult<impl IntoResponse> {
    let (limit, offset) = validate_pagination(query.limit, query.offset);
    let sessions = state
        .deps
        .sessions
        .list(limit, offset, query.active.unwrap_or(false))
        .await
        .map_err(ApiError::from)?;
    Ok(crate::api::response::ok(sessions))
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateSessionRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub default_search_provider: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

/// `PATCH /chat/sessions/{id}` (spec §6): a non-empty `name` is treated as an
/// explicit user rename and sets `is_user_named`.
pub async fn update_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<UpdateSessionRequest>,
) -> ApiResult<impl IntoResponse> {
    if let Some(name) = &request.name {
        if !name.trim().is_empty() {
            state.deps.sessions.set_user_name(&session_id, name).await.map_err(ApiError::from)?;
        }
    }
    if let Some(provider) = request.default_search_provider {
        let settings = SessionSettings { default_search_provider: Some(provider) };
        state.deps.sessions.set_settings(&session_id, &settings).await.map_err(ApiError::from)?;
    }
    if let Some(is_active) = request.is_active {
        state.deps.sessions.set_active(&session_id, is_active).await.map_err(ApiError::from)?;
    }
    let row = state.deps.sessions.get(&session_id).await.map_err(ApiError::from)?;
    Ok(crate::api::response::ok(row))
}

#[derive(Debug, Default, Deserialize)]
pub struct AutoTitleRequest {
    #[serde(default)]
    pub force: bool,
    #[serde(default)]
    pub strategy: Option<String>,
}

/// `POST /chat/sessions/{id}/autotitle` (spec §6): re-run the heuristic
/// title generator; `force: true` overwrites even a user-given name.
pub async fn auto_title(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<AutoTitleRequest>,
) -> ApiResult<impl IntoResponse> {
    let history = state.deps.sessions.history(&session_id, 1).await.map_err(ApiError::from)?;
    let seed = history
        .first()
        .map(|m| m.content.clone())
        .unwrap_or_else(|| "a new planning conversation".to_string());

    let prompt = format!(
        "Give a short (<=6 word) title for a planning conversation that starts with: {seed}"
    );
    let strategy = request.strategy.as_deref().unwrap_or("heuristic");
    let llm_request = planloom_llm::ChatRequest::new(vec![planloom_llm::Message::human(prompt)]).with_max_tokens(32);
    let response = state.deps.conversation_llm.chat(llm_request).await.map_err(|e| ApiError::InternalError(e.to_string()))?;
    let title = response.message.content.trim().trim_matches('"').to_string();
    if title.is_empty() {
        return Err(ApiError::InternalError("model returned an empty title".to_string()));
    }

    let row = if request.force {
        state.deps.sessions.set_auto_title_forced(&session_id, &title, NameSource::Heuristic).await
    } else {
        state.deps.sessions.set_auto_title(&session_id, &title, NameSource::Heuristic).await
    }
    .map_err(ApiError::from)?;

    let _ = strategy;
    Ok(crate::api::response::ok(row))
}

#[derive(Debug, Deserialize)]
pub struct DeleteSessionQuery {
    #[serde(default)]
    pub archive: Option<bool>,
}

/// `DELETE /chat/sessions/{id}?archive=bool` (spec §6).
pub async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(query): Query<DeleteSessionQuery>,
) -> ApiResult<impl IntoResponse> {
    state
        .deps
        .sessions
        .delete(&session_id, query.archive.unwrap_or(false))
        .await
        .map_err(ApiError::from)?;
    Ok(crate::api::response::no_content())
}
