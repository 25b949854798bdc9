//! `GET /jobs/{id}?cursor=…` and `GET /jobs/{id}/stream` (spec §6, §4.3
//! `subscribe`: snapshot then live events then a terminal marker).

use crate::api::error::ApiError;
use crate::api::state::AppState;
use crate::jobs::stream::StreamEvent;
use axum::extract::{Path, Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use serde::Deserialize;
use serde_json::json;
use std::convert::Infallible;
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct JobSnapshotQuery {
    #[serde(default)]
    pub cursor: Option<i64>,
}

/// `GET /jobs/{id}?cursor=…` (spec §6): job snapshot, logs since `cursor`,
/// the full action-log history, and the cursor to resume from.
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
    Query(query): Query<JobSnapshotQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let job = state.deps.jobs.get_job(&job_id).await.map_err(ApiError::from)?;
    let cursor = query.cursor.unwrap_or(0);
    let logs = state.deps.jobs.logs_since(&job_id, cursor).await.map_err(ApiError::from)?;
    let action_logs = state.deps.jobs.action_logs(&job_id).await.map_err(ApiError::from)?;
    let next_cursor = logs.last().map(|l| l.sequence).unwrap_or(cursor);

    Ok(crate::api::response::ok(json!({
        "job": job,
        "logs": logs,
        "action_logs": action_logs,
        "next_cursor": next_cursor,
    })))
}

/// `GET /jobs/{id}/stream` (spec §6, §8 scenario E): an SSE stream that opens
/// with a `snapshot` event, follows with one `event` per log line as they
/// arrive, periodic `heartbeat`s, and closes once the job reaches a terminal
/// status.
pub async fn stream_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let job = state.deps.jobs.get_job(&job_id).await.map_err(ApiError::from)?;
    let already_terminal = crate::jobs::manager::JobManager::is_terminal_status(&job.status);

    let snapshot_event = Event::default().json_data(json!({"type": "snapshot", "job": job})).unwrap_or_else(|_| Event::default());

    let deps = state.deps.clone();
    let stream = async_stream::stream! {
        yield Ok(snapshot_event);

        if already_terminal {
            return;
        }

        let mut rx = deps.jobs.subscribe(&job_id).await;
        let mut heartbeat = tokio::time::interval(Duration::from_secs(15));
        heartbeat.tick().await; // first tick fires immediately; skip it

        loop {
            tokio::select! {
                event = rx.recv() => {
                    match event {
                        Ok(StreamEvent::Log(log)) => {
                            let payload = json!({"type": "event", "job_id": &job_id, "event": log});
                            yield Ok(Event::default().json_data(payload).unwrap_or_else(|_| Event::default()));
                        }
                        Ok(StreamEvent::Terminal(status)) => {
                            let payload = json!({"type": "event", "job_id": &job_id, "status": status});
                            yield Ok(Event::default().json_data(payload).unwrap_or_else(|_| Event::default()));
                            break;
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    }
                }
                _ = heartbeat.tick() => {
                    let job = match deps.jobs.get_job(&job_id).await {
                        Ok(job) => job,
                        Err(_) => break,
                    };
                    let payload = json!({"type": "heartbeat", "job": {"job_id": &job_id, "status": job.status}});
                    yield Ok(Event::default().json_data(payload).unwrap_or_else(|_| Event::default()));
                    if crate::jobs::manager::JobManager::is_terminal_status(&job.status) {
                        break;
                    }
                }
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
