//! `GET /plans`, `GET /plans/{id}/tree`, `GET /plans/{id}/subgraph`,
//! `GET /plans/{id}/results`, `GET /tasks/{id}/result`,
//! `GET /plans/{id}/execution/summary`, `POST /tasks/{id}/decompose` (spec §6).

use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::db::models::job::JobType;
use crate::decomposer::bfs::{self, DecomposeMode, DecomposerConfig};
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

/// `GET /plans` (spec §6).
pub async fn list_plans(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let plans = state.deps.plans.list_plans().await.map_err(ApiError::from)?;
    Ok(crate::api::response::ok(plans))
}

/// `GET /plans/{id}/tree` (spec §6).
pub async fn plan_tree(State(state): State<AppState>, Path(plan_id): Path<i64>) -> ApiResult<impl IntoResponse> {
    let tree = state.deps.plans.get_plan_tree(plan_id).await.map_err(ApiError::from)?;
    Ok(crate::api::response::ok(tree))
}

#[derive(Debug, Deserialize)]
pub struct SubgraphQuery {
    pub node_id: i64,
    #[serde(default)]
    pub max_depth: Option<i64>,
}

/// `GET /plans/{id}/subgraph?node_id&max_depth` (spec §6).
pub async fn subgraph(
    State(state): State<AppState>,
    Path(plan_id): Path<i64>,
    Query(query): Query<SubgraphQuery>,
) -> ApiResult<impl IntoResponse> {
    let mut tree = state.deps.plans.subgraph(plan_id, query.node_id).await.map_err(ApiError::from)?;
    if let Some(max_depth) = query.max_depth {
        let root_depth = tree.get(query.node_id).map(|n| n.depth).unwrap_or(0);
        tree.nodes.retain(|_, node| node.depth - root_depth <= max_depth);
        tree.roots.retain(|id| tree.nodes.contains_key(id));
    }
    Ok(crate::api::response::ok(tree))
}

#[derive(Debug, Deserialize)]
pub struct ResultsQuery {
    #[serde(default)]
    pub only_with_output: Option<bool>,
}

/// `GET /plans/{id}/results?only_with_output=bool` (spec §6).
pub async fn plan_results(
    State(state): State<AppState>,
    Path(plan_id): Path<i64>,
    Query(query): Query<ResultsQuery>,
) -> ApiResult<impl IntoResponse> {
    let results = state.deps.plans.get_plan_results(plan_id).await.map_err(ApiError::from)?;
    let only_with_output = query.only_with_output.unwrap_or(false);
    let results: Vec<_> = results
        .into_iter()
        .filter(|(_, _, content)| !only_with_output || content.is_some())
        .map(|(task_id, name, content)| json!({"task_id": task_id, "name": name, "content": content}))
        .collect();
    Ok(crate::api::response::ok(results))
}

#[derive(Debug, Deserialize)]
pub struct TaskResultQuery {
    pub plan_id: i64,
}

/// `GET /tasks/{id}/result?plan_id=...` (spec §6).
pub async fn task_result(
    State(state): State<AppState>,
    Path(task_id): Path<i64>,
    Query(query): Query<TaskResultQuery>,
) -> ApiResult<impl IntoResponse> {
    let tree = state.deps.plans.get_plan_tree(query.plan_id).await.map_err(ApiError::from)?;
    let node = tree
        .get(task_id)
        .ok_or_else(|| ApiError::NotFound(format!("task {task_id}")))?;
    Ok(crate::api::response::ok(json!({
        "task_id": node.id,
        "status": node.status.as_str(),
        "result": node.execution_result,
    })))
}

/// `GET /plans/{id}/execution/summary` (spec §6): counts of tasks by status.
pub async fn execution_summary(
    State(state): State<AppState>,
    Path(plan_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let tree = state.deps.plans.get_plan_tree(plan_id).await.map_err(ApiError::from)?;
    let mut counts: HashMap<&'static str, u64> = HashMap::new();
    for node in tree.nodes.values() {
        *counts.entry(node.status.as_str()).or_insert(0) += 1;
    }
    Ok(crate::api::response::ok(json!({
        "plan_id": plan_id,
        "total": tree.node_count(),
        "counts": counts,
    })))
}

#[derive(Debug, Default, Deserialize)]
pub struct DecomposeRequest {
    #[serde(default)]
    pub plan_id: Option<i64>,
    #[serde(default = "default_async_mode")]
    pub async_mode: bool,
    #[serde(default)]
    pub max_depth: Option<i64>,
    #[serde(default)]
    pub max_children: Option<usize>,
    #[serde(default)]
    pub total_node_budget: Option<usize>,
    #[serde(default)]
    pub replace_existing: bool,
}

fn default_async_mode() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct DecomposeQuery {
    #[serde(default)]
    pub plan_id: Option<i64>,
}

/// `POST /tasks/{id}/decompose` (spec §6): expand a task's subtree through
/// the BFS decomposer, either as a tracked background job (the default) or
/// synchronously when `async_mode: false`.
pub async fn decompose_task(
    State(state): State<AppState>,
    Path(task_id): Path<i64>,
    Query(query): Query<DecomposeQuery>,
    Json(request): Json<DecomposeRequest>,
) -> ApiResult<impl IntoResponse> {
    let plan_id = request
        .plan_id
        .or(query.plan_id)
        .ok_or_else(|| ApiError::ValidationError("plan_id is required".to_string()))?;

    if request.replace_existing {
        let tree = state.deps.plans.get_plan_tree(plan_id).await.map_err(ApiError::from)?;
        for child in tree.children_of(Some(task_id)) {
            state.deps.plans.delete_task(plan_id, child.id).await.map_err(ApiError::from)?;
        }
    }

    let mut config = state.deps.decomposer_config.clone();
    if let Some(max_depth) = request.max_depth {
        config.max_depth = max_depth;
    }
    if let Some(max_children) = request.max_children {
        config.max_children = max_children;
    }
    if let Some(budget) = request.total_node_budget {
        config.total_node_budget = budget;
    }

    let job = state
        .deps
        .jobs
        .create(JobType::PlanDecompose, Some(plan_id), Some(task_id), None, json!({"mode": "single_node"}))
        .await
        .map_err(ApiError::from)?;
    let job_id = job.id.clone();

    if request.async_mode {
        let deps = state.deps.clone();
        let job_id_bg = job_id.clone();
        tokio::spawn(async move {
            run_decompose_job(deps, job_id_bg, plan_id, task_id, config).await;
        });
        Ok(crate::api::response::ok(json!({"job_id": job_id, "status": "queued"})))
    } else {
        run_decompose_job(state.deps.clone(), job_id.clone(), plan_id, task_id, config).await;
        let job = state.deps.jobs.get_job(&job_id).await.map_err(ApiError::from)?;
        Ok(crate::api::response::ok(json!({"job_id": job_id, "status": job.status})))
    }
}

async fn run_decompose_job(
    deps: crate::agent::AgentDeps,
    job_id: String,
    plan_id: i64,
    task_id: i64,
    config: DecomposerConfig,
) {
    if deps.jobs.mark_running(&job_id).await.is_err() {
        return;
    }
    let result = bfs::decompose(
        &deps.plans,
        &deps.jobs,
        &job_id,
        Arc::clone(&deps.decomposer_llm),
        plan_id,
        DecomposeMode::SingleNode,
        Some(task_id),
        config,
    )
    .await;

    use crate::db::models::job::JobStats;
    match result {
        Ok(outcome) => {
            let stats = JobStats { llm_calls: outcome.llm_calls, nodes_created: outcome.nodes_created, duration_ms: 0, extra: Default::default() };
            let _ = deps
                .jobs
                .mark_success(&job_id, Some(json!({"nodes_created": outcome.nodes_created})), stats)
                .await;
        }
        Err(err) => {
            let _ = deps.jobs.mark_failure(&job_id, &err.to_string(), JobStats::default()).await;
        }
    }
}
