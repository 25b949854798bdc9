//! Turn orchestration (spec §4.6): prompt assembly, the conversation LLM
//! call, response validation, and action dispatch. Fast actions execute
//! inline and are reflected in the turn's response; long-running actions
//! (`execute_plan`, `decompose_task`, any `tool_operation`) are handed to a
//! background job and the turn returns with a `tracking_id` (spec §4.6 step
//! 3 "Asynchronous actions").

use crate::agent::catalog::validate_action;
use crate::agent::error::{AgentError, AgentResult};
use crate::agent::prompt::{build_plan_outline, build_system_prompt};
use crate::agent::schema::{extract_raw_message, parse_response, Action, ActionKind, AgentStep};
use crate::agent::tools::ToolInvoker;
use crate::context::manager::ContextLimits;
use crate::context::trimmer::ContextTrimmer;
use crate::db::models::job::{JobStats, JobType};
use crate::db::models::NameSource;
use crate::decomposer::bfs::{self, DecomposeMode, DecomposerConfig};
use crate::executor::{self, ExecutorConfig};
use crate::jobs::manager::JobManager;
use crate::plan::anchor::Anchor;
use crate::plan::repository::{NewTask, PlanRepository, TaskUpdate};
use crate::session::SessionStore;
use planloom_llm::{ChatModel, ChatRequest, Message};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

/// Action kinds/names that run as a background job rather than inline (spec
/// §4.6 step 3).
fn is_async_action(action: &Action) -> bool {
    matches!(
        (action.kind, action.name.as_str()),
        (ActionKind::PlanOperation, "execute_plan")
            | (ActionKind::TaskOperation, "decompose_task")
            | (ActionKind::ToolOperation, _)
    )
}

/// LLM clients and stores a turn needs. Each subsystem gets its own
/// conversation/decomposition/execution model (spec §6 "Conversation LLM",
/// "Decomposition LLM", "Executor LLM" are independently configured).
#[derive(Clone)]
pub struct AgentDeps {
    pub plans: Arc<PlanRepository>,
    pub sessions: Arc<SessionStore>,
    pub jobs: Arc<JobManager>,
    pub conversation_llm: Arc<dyn ChatModel>,
    pub decomposer_llm: Arc<dyn ChatModel>,
    pub executor_llm: Arc<dyn ChatModel>,
    pub tool_invoker: Arc<dyn ToolInvoker>,
    pub decomposer_config: DecomposerConfig,
    pub executor_config: ExecutorConfig,
}

#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Trigger a background `plan_decompose` job right after a successful
    /// `create_plan` (spec §4.6 "`auto_decompose_on_create`").
    pub auto_decompose_on_create: bool,
    pub history_limit: i64,
    pub outline_max_depth: i64,
    pub outline_max_nodes: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            auto_decompose_on_create: true,
            history_limit: 20,
            outline_max_depth: 3,
            outline_max_nodes: 200,
        }
    }
}

/// Everything a chat turn produces (spec §6 `POST /chat/message` response
/// body).
#[derive(Debug, Clone, serde::Serialize, Default)]
pub struct ChatTurnMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracking_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<i64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tool_results: Vec<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ChatTurnResponse {
    pub response: String,
    pub actions: Vec<AgentStep>,
    pub metadata: ChatTurnMetadata,
}

/// Handle one inbound chat message for `session_id` (spec §4.6 full
/// algorithm). Holds the session's turn mutex for the duration of the call
/// (spec §5 "per-session mutex... for a turn's duration").
pub async fn handle_turn(deps: &AgentDeps, config: &AgentConfig, session_id: &str, message: &str) -> AgentResult<ChatTurnResponse> {
    let turn_lock = deps.sessions.lock_for(session_id).await;
    let _guard = turn_lock.lock().await;

    let session = deps.sessions.get_or_create(session_id).await?;
    deps.sessions.append_message(session_id, "user", message, json!({})).await?;

    let bound = session.plan_id.is_some();
    let mut plan_outline = None;
    let mut existing_plans = None;
    if let Some(plan_id) = session.plan_id {
        let tree = deps.plans.get_plan_tree(plan_id).await?;
        plan_outline = Some(build_plan_outline(&tree, config.outline_max_depth, config.outline_max_nodes));
    } else {
        existing_plans = Some(deps.plans.list_plans().await?);
    }
    let system_prompt = build_system_prompt(bound, plan_outline.as_deref(), existing_plans.as_deref());

    let history = deps.sessions.history(session_id, config.history_limit).await?;
    let system_message = Message::system(system_prompt);
    let mut history_messages = Vec::with_capacity(history.len());
    for row in &history {
        history_messages.push(match row.role.as_str() {
            "assistant" => Message::assistant(row.content.clone()),
            "system" => Message::system(row.content.clone()),
            _ => Message::human(row.content.clone()),
        });
    }

    // Trim conversation history to the model's context window before the
    // call (spec §9 "ambient concerns... logging, error handling,
    // configuration" carried regardless of feature Non-goals).
    let limits = ContextLimits::for_model(deps.conversation_llm.model_name());
    let trimmer = ContextTrimmer::new(deps.conversation_llm.model_name(), limits.available_for_history());
    let trimmed_history = trimmer.trim_messages(&history_messages);

    let mut messages = vec![system_message];
    messages.extend(trimmed_history);

    let chat_result = deps.conversation_llm.chat(ChatRequest::new(messages)).await;
    let raw = match chat_result {
        Ok(response) => response.message.content,
        Err(err) => {
            let reply = "I ran into a problem reaching the model for this turn. Please try again.".to_string();
            deps.sessions.append_message(session_id, "assistant", &reply, json!({"error": err.to_string()})).await?;
            return Ok(ChatTurnResponse {
                response: reply,
                actions: vec![],
                metadata: ChatTurnMetadata { errors: vec![err.to_string()], ..Default::default() },
            });
        }
    };

    let parsed = match parse_response(&raw) {
        Ok(parsed) => parsed,
        Err(err) => {
            let reply = extract_raw_message(&raw).unwrap_or_else(|| {
                "I couldn't produce a valid structured response for that; could you rephrase?".to_string()
            });
            deps.sessions.append_message(session_id, "assistant", &reply, json!({"error": err.to_string()})).await?;
            return Ok(ChatTurnResponse {
                response: reply,
                actions: vec![],
                metadata: ChatTurnMetadata { errors: vec![err.to_string()], ..Default::default() },
            });
        }
    };

    let mut actions = parsed.actions;
    actions.sort_by_key(|a| a.order);

    let mut steps = Vec::with_capacity(actions.len());
    let mut metadata = ChatTurnMetadata { plan_id: session.plan_id, ..Default::default() };
    let mut skip_remaining = false;
    let mut bound_plan_id = session.plan_id;

    if actions.iter().any(is_async_action) {
        // The whole batch dispatches as a single background job (see module
        // doc), so it's validated as a single unit: one bound-only action on
        // an unbound session rejects the whole turn rather than queuing a job
        // that would only partially make sense (spec §8 property 9).
        let mut validation_errors: Vec<String> = Vec::with_capacity(actions.len());
        for action in &actions {
            match validate_action(action.kind, &action.name, bound_plan_id.is_some()) {
                Ok(()) => validation_errors.push(String::new()),
                Err(err) => validation_errors.push(err.to_string()),
            }
        }

        if validation_errors.iter().any(|e| !e.is_empty()) {
            for (action, err) in actions.iter().zip(&validation_errors) {
                let (success, message) = if err.is_empty() {
                    (false, "skipped: another action in the turn failed validation".to_string())
                } else {
                    metadata.errors.push(err.clone());
                    (false, err.clone())
                };
                steps.push(AgentStep {
                    kind: action.kind,
                    name: action.name.clone(),
                    parameters: action.parameters.clone(),
                    success,
                    message: Some(message),
                    details: None,
                });
            }
        } else {
            let tracking_id = spawn_async_turn(deps.clone(), session_id.to_string(), bound_plan_id, actions.clone()).await?;
            metadata.tracking_id = Some(tracking_id);
            for action in &actions {
                steps.push(AgentStep {
                    kind: action.kind,
                    name: action.name.clone(),
                    parameters: action.parameters.clone(),
                    success: true,
                    message: Some("queued".to_string()),
                    details: None,
                });
            }
        }
    } else {
        for action in &actions {
            if skip_remaining && action.blocking {
                steps.push(AgentStep {
                    kind: action.kind,
                    name: action.name.clone(),
                    parameters: action.parameters.clone(),
                    success: false,
                    message: Some("skipped: a preceding blocking action failed".to_string()),
                    details: None,
                });
                continue;
            }

            if let Err(err) = validate_action(action.kind, &action.name, bound_plan_id.is_some()) {
                let step = AgentStep {
                    kind: action.kind,
                    name: action.name.clone(),
                    parameters: action.parameters.clone(),
                    success: false,
                    message: Some(err.to_string()),
                    details: None,
                };
                metadata.errors.push(err.to_string());
                if action.blocking {
                    skip_remaining = true;
                }
                steps.push(step);
                continue;
            }

            let step = match execute_sync_action(deps, config, session_id, bound_plan_id, action).await {
                Ok((step, new_plan_id)) => {
                    if let Some(plan_id) = new_plan_id {
                        bound_plan_id = Some(plan_id);
                        metadata.plan_id = Some(plan_id);
                        deps.sessions.bind_plan(session_id, plan_id).await?;
                        if config.auto_decompose_on_create {
                            let tracking_id = spawn_auto_decompose(deps.clone(), session_id.to_string(), plan_id).await?;
                            metadata.tracking_id = Some(tracking_id);
                        }
                    }
                    step
                }
                Err(err) => {
                    metadata.errors.push(err.to_string());
                    AgentStep {
                        kind: action.kind,
                        name: action.name.clone(),
                        parameters: action.parameters.clone(),
                        success: false,
                        message: Some(err.to_string()),
                        details: None,
                    }
                }
            };
            if !step.success && action.blocking {
                skip_remaining = true;
            }
            steps.push(step);
        }
    }

    deps.sessions
        .append_message(session_id, "assistant", &parsed.llm_reply.message, json!({"action_count": actions.len()}))
        .await?;

    maybe_auto_title(deps, session_id, message).await;

    Ok(ChatTurnResponse { response: parsed.llm_reply.message, actions: steps, metadata })
}

/// Execute one fast, synchronous action inline. Returns the step plus a
/// freshly created plan id on a successful `create_plan` (so the caller can
/// auto-bind the session).
async fn execute_sync_action(
    deps: &AgentDeps,
    _config: &AgentConfig,
    session_id: &str,
    bound_plan_id: Option<i64>,
    action: &Action,
) -> AgentResult<(AgentStep, Option<i64>)> {
    let params = &action.parameters;
    let ok = |details: Option<Value>, message: Option<String>| AgentStep {
        kind: action.kind,
        name: action.name.clone(),
        parameters: params.clone(),
        success: true,
        message,
        details,
    };

    match (action.kind, action.name.as_str()) {
        (ActionKind::PlanOperation, "create_plan") => {
            let title = params.get("title").and_then(Value::as_str).unwrap_or("Untitled plan");
            let description = params.get("description").and_then(Value::as_str);
            let metadata = params.get("metadata").cloned().unwrap_or_else(|| json!({}));
            let plan = deps.plans.create_plan(title, description, metadata).await?;
            Ok((ok(Some(json!({"plan_id": plan.id, "title": plan.title})), None), Some(plan.id)))
        }
        (ActionKind::PlanOperation, "list_plans") => {
            let plans = deps.plans.list_plans().await?;
            Ok((ok(Some(json!({"plans": plans})), None), None))
        }
        (ActionKind::PlanOperation, "delete_plan") => {
            let plan_id = require_plan_id(bound_plan_id, params)?;
            deps.plans.delete_plan(plan_id).await?;
            Ok((ok(None, None), None))
        }
        (ActionKind::TaskOperation, "create_task") => {
            let plan_id = require_plan_id(bound_plan_id, params)?;
            let new_task = new_task_from_params(params)?;
            let node = deps.plans.create_task(plan_id, new_task).await?;
            Ok((ok(Some(json!({"task_id": node.id, "name": node.name})), None), None))
        }
        (ActionKind::TaskOperation, "update_task") | (ActionKind::TaskOperation, "update_task_instruction") => {
            let plan_id = require_bound(bound_plan_id)?;
            let task_id = require_task_id(params)?;
            let update = task_update_from_params(params);
            let node = deps.plans.update_task(plan_id, task_id, update).await?;
            Ok((ok(Some(json!({"task_id": node.id})), None), None))
        }
        (ActionKind::TaskOperation, "move_task") => {
            let plan_id = require_bound(bound_plan_id)?;
            let task_id = require_task_id(params)?;
            let new_parent_id = params.get("parent_id").and_then(Value::as_i64);
            let position = params.get("position").and_then(Value::as_i64);
            let anchor = anchor_from_params(params)?;
            let node = deps.plans.move_task(plan_id, task_id, new_parent_id, position, anchor).await?;
            Ok((ok(Some(json!({"task_id": node.id})), None), None))
        }
        (ActionKind::TaskOperation, "delete_task") => {
            let plan_id = require_bound(bound_plan_id)?;
            let task_id = require_task_id(params)?;
            deps.plans.delete_task(plan_id, task_id).await?;
            Ok((ok(None, None), None))
        }
        (ActionKind::TaskOperation, "show_tasks") => {
            let plan_id = require_bound(bound_plan_id)?;
            let tree = deps.plans.get_plan_tree(plan_id).await?;
            let outline = build_plan_outline(&tree, i64::MAX, usize::MAX);
            Ok((ok(Some(json!({"outline": outline})), None), None))
        }
        (ActionKind::TaskOperation, "query_status") => {
            let plan_id = require_bound(bound_plan_id)?;
            let summary = deps.plans.get_plan_summary(plan_id).await?;
            let results = deps.plans.get_plan_results(plan_id).await?;
            Ok((ok(Some(json!({"summary": summary, "results": results})), None), None))
        }
        (ActionKind::TaskOperation, "rerun_task") => {
            let plan_id = require_bound(bound_plan_id)?;
            let task_id = require_task_id(params)?;
            let node = executor::rerun_task(&deps.plans, plan_id, task_id).await?;
            Ok((ok(Some(json!({"task_id": node.id, "status": node.status.as_str()})), None), None))
        }
        (ActionKind::ContextRequest, "request_subgraph") => {
            let plan_id = require_bound(bound_plan_id)?;
            let task_id = require_task_id(params)?;
            let subgraph = deps.plans.subgraph(plan_id, task_id).await?;
            let outline = build_plan_outline(&subgraph, i64::MAX, usize::MAX);
            Ok((ok(Some(json!({"subgraph": outline})), None), None))
        }
        (ActionKind::SystemOperation, "help") => {
            Ok((ok(Some(json!({"help": help_text(bound_plan_id.is_some())})), None), None))
        }
        (ActionKind::SystemOperation, other) => {
            Err(AgentError::ValidationError(format!("unsupported system_operation: {other}")))
        }
        other => {
            let _ = session_id;
            Err(AgentError::ValidationError(format!("action not dispatchable inline: {}:{}", other.0.as_str(), other.1)))
        }
    }
}

fn help_text(bound: bool) -> &'static str {
    if bound {
        "You can create, update, move, or delete tasks, run or rerun the plan, check status, or ask for a subgraph."
    } else {
        "Ask me to create a new plan, or list existing plans to resume one."
    }
}

fn require_bound(bound_plan_id: Option<i64>) -> AgentResult<i64> {
    bound_plan_id.ok_or(AgentError::PlanNotBound)
}

fn require_plan_id(bound_plan_id: Option<i64>, params: &Value) -> AgentResult<i64> {
    params
        .get("plan_id")
        .and_then(Value::as_i64)
        .or(bound_plan_id)
        .ok_or_else(|| AgentError::ValidationError("missing plan_id".to_string()))
}

fn require_task_id(params: &Value) -> AgentResult<i64> {
    params
        .get("task_id")
        .and_then(Value::as_i64)
        .ok_or_else(|| AgentError::ValidationError("missing task_id".to_string()))
}

/// Resolve explicit `anchor`, or the legacy `insert_before`/`insert_after`
/// aliases (spec §6 `create_task` parameter contract).
fn anchor_from_params(params: &Value) -> AgentResult<Option<Anchor>> {
    if let Some(anchor_task_id) = params.get("insert_before").and_then(Value::as_i64) {
        return Ok(Some(Anchor::Before { sibling_id: anchor_task_id }));
    }
    if let Some(anchor_task_id) = params.get("insert_after").and_then(Value::as_i64) {
        return Ok(Some(Anchor::After { sibling_id: anchor_task_id }));
    }
    match (params.get("anchor_task_id").and_then(Value::as_i64), params.get("anchor_position").and_then(Value::as_str)) {
        (Some(sibling_id), Some("before")) => Ok(Some(Anchor::Before { sibling_id })),
        (Some(sibling_id), Some("after")) | (Some(sibling_id), None) => Ok(Some(Anchor::After { sibling_id })),
        (None, Some("first_child")) => Ok(Some(Anchor::FirstChild)),
        (None, Some("last_child")) => Ok(Some(Anchor::LastChild)),
        (None, None) => Ok(None),
        (None, Some(other)) => Err(AgentError::ValidationError(format!("unknown anchor_position: {other}"))),
    }
}

fn new_task_from_params(params: &Value) -> AgentResult<NewTask> {
    let name = params
        .get("name")
        .or_else(|| params.get("task_name"))
        .and_then(Value::as_str)
        .ok_or_else(|| AgentError::ValidationError("create_task requires 'name'".to_string()))?
        .to_string();
    let dependencies = params
        .get("dependencies")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(Value::as_i64).collect())
        .unwrap_or_default();
    Ok(NewTask {
        parent_id: params.get("parent_id").and_then(Value::as_i64),
        position: params.get("position").and_then(Value::as_i64),
        anchor: anchor_from_params(params)?,
        name,
        instruction: params.get("instruction").and_then(Value::as_str).map(str::to_string),
        metadata: params.get("metadata").cloned().unwrap_or_else(|| json!({})),
        dependencies,
    })
}

fn task_update_from_params(params: &Value) -> TaskUpdate {
    TaskUpdate {
        name: params.get("name").and_then(Value::as_str).map(str::to_string),
        instruction: params
            .get("instruction")
            .map(|v| v.as_str().map(str::to_string)),
        metadata: params.get("metadata").cloned(),
        dependencies: params
            .get("dependencies")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(Value::as_i64).collect()),
        context: params.get("context").map(|v| crate::plan::repository::TaskContextUpdate {
            combined: v.get("combined").and_then(Value::as_str).map(str::to_string),
            sections: v
                .get("sections")
                .and_then(|s| serde_json::from_value(s.clone()).ok())
                .unwrap_or_default(),
            meta: v.get("meta").cloned(),
        }),
    }
}

/// Queue a `plan_decompose` job right after a successful `create_plan`
/// (spec §4.6 "`auto_decompose_on_create`", §8 scenario A).
async fn spawn_auto_decompose(deps: AgentDeps, session_id: String, plan_id: i64) -> AgentResult<String> {
    let job = deps
        .jobs
        .create(JobType::PlanDecompose, Some(plan_id), None, Some(session_id.as_str()), json!({"mode": "plan_bfs"}))
        .await?;
    let job_id = job.id.clone();
    tokio::spawn(run_decompose_job(deps, job_id.clone(), plan_id, None, DecomposeMode::PlanBfs));
    Ok(job_id)
}

/// Queue and background-execute the actions of a turn that contains at
/// least one long-running action (spec §4.6 step 3 "Asynchronous"). The
/// whole action list runs in the job, in order, so a turn mixing fast and
/// slow actions still observes `order`.
async fn spawn_async_turn(deps: AgentDeps, session_id: String, plan_id: Option<i64>, actions: Vec<Action>) -> AgentResult<String> {
    let job = deps
        .jobs
        .create(
            JobType::ChatAction,
            plan_id,
            None,
            Some(session_id.as_str()),
            json!({"actions": actions.iter().map(|a| json!({"kind": a.kind.as_str(), "name": a.name})).collect::<Vec<_>>()}),
        )
        .await?;
    let job_id = job.id.clone();
    tokio::spawn(run_action_job(deps, job_id.clone(), session_id, plan_id, actions));
    Ok(job_id)
}

async fn run_action_job(deps: AgentDeps, job_id: String, session_id: String, mut plan_id: Option<i64>, actions: Vec<Action>) {
    if deps.jobs.mark_running(&job_id).await.is_err() {
        return;
    }
    let mut llm_calls = 0u64;
    let mut had_failure = false;

    for action in &actions {
        let outcome: Result<Value, AgentError> = match (action.kind, action.name.as_str()) {
            (ActionKind::PlanOperation, "execute_plan") => {
                let Some(pid) = plan_id.or_else(|| action.parameters.get("plan_id").and_then(Value::as_i64)) else {
                    had_failure = true;
                    continue;
                };
                let task_filter = action
                    .parameters
                    .get("task_ids")
                    .and_then(Value::as_array)
                    .map(|arr| arr.iter().filter_map(Value::as_i64).collect());
                let result = executor::execute(
                    &deps.plans,
                    &deps.jobs,
                    &job_id,
                    Arc::clone(&deps.executor_llm),
                    pid,
                    task_filter,
                    deps.executor_config.clone(),
                )
                .await;
                match result {
                    Ok(summary) => {
                        llm_calls += summary.steps.len() as u64;
                        Ok(json!({"counts": summary.counts}))
                    }
                    Err(err) => Err(AgentError::from(err)),
                }
            }
            (ActionKind::TaskOperation, "decompose_task") => {
                let Some(pid) = plan_id.or_else(|| action.parameters.get("plan_id").and_then(Value::as_i64)) else {
                    had_failure = true;
                    continue;
                };
                let Some(task_id) = action.parameters.get("task_id").and_then(Value::as_i64) else {
                    had_failure = true;
                    continue;
                };
                let result = bfs::decompose(
                    &deps.plans,
                    &deps.jobs,
                    &job_id,
                    Arc::clone(&deps.decomposer_llm),
                    pid,
                    DecomposeMode::SingleNode,
                    Some(task_id),
                    deps.decomposer_config.clone(),
                )
                .await;
                match result {
                    Ok(outcome) => {
                        llm_calls += outcome.llm_calls;
                        Ok(json!({"nodes_created": outcome.nodes_created}))
                    }
                    Err(err) => Err(AgentError::from(err)),
                }
            }
            (ActionKind::ToolOperation, name) => {
                match deps.tool_invoker.invoke(name, action.parameters.clone()).await {
                    Ok(result) => Ok(json!({"result": result.redacted_result(), "summary": result.summary})),
                    Err(err) => Err(AgentError::ToolFailure(err.to_string())),
                }
            }
            _ => continue,
        };

        let success = outcome.is_ok();
        if !success {
            had_failure = true;
        }
        let message = outcome.as_ref().err().map(ToString::to_string);
        let details = outcome.ok();
        let _ = deps
            .jobs
            .append_action_log(
                plan_id,
                &job_id,
                Some(session_id.as_str()),
                action.kind.as_str(),
                &action.name,
                if success { "completed" } else { "failed" },
                success,
                message.as_deref(),
                details,
            )
            .await;

        if action.name == "execute_plan" || action.name == "decompose_task" {
            // plan_id may have been set by an earlier create_plan step in the
            // same batch; nothing further to resolve here.
            let _ = &mut plan_id;
        }
    }

    let stats = JobStats { llm_calls, nodes_created: 0, duration_ms: 0, extra: Default::default() };
    if had_failure {
        let _ = deps.jobs.mark_failure(&job_id, "one or more actions failed", stats).await;
    } else {
        let _ = deps.jobs.mark_success(&job_id, None, stats).await;
    }
}

async fn run_decompose_job(deps: AgentDeps, job_id: String, plan_id: i64, target_task_id: Option<i64>, mode: DecomposeMode) {
    if deps.jobs.mark_running(&job_id).await.is_err() {
        return;
    }
    let result = bfs::decompose(
        &deps.plans,
        &deps.jobs,
        &job_id,
        Arc::clone(&deps.decomposer_llm),
        plan_id,
        mode,
        target_task_id,
        deps.decomposer_config.clone(),
    )
    .await;

    match result {
        Ok(outcome) => {
            let stats = JobStats {
                llm_calls: outcome.llm_calls,
                nodes_created: outcome.nodes_created,
                duration_ms: 0,
                extra: Default::default(),
            };
            info!(job_id = %job_id, nodes_created = outcome.nodes_created, "auto-decompose finished");
            let _ = deps
                .jobs
                .mark_success(&job_id, Some(json!({"nodes_created": outcome.nodes_created})), stats)
                .await;
        }
        Err(err) => {
            warn!(job_id = %job_id, error = %err, "auto-decompose failed");
            let _ = deps.jobs.mark_failure(&job_id, &err.to_string(), JobStats::default()).await;
        }
    }
}

/// Fire-and-forget background auto-title (spec §4.6 "Session auto-title"):
/// best effort, never blocks or fails the turn.
async fn maybe_auto_title(deps: &AgentDeps, session_id: &str, user_message: &str) {
    let Ok(session) = deps.sessions.get(session_id).await else { return };
    if session.is_user_named || session.name.is_some() {
        return;
    }
    let prompt = format!(
        "Give a short (<=6 word) title for a planning conversation that starts with: {user_message}"
    );
    let request = ChatRequest::new(vec![Message::human(prompt)]).with_max_tokens(32);
    if let Ok(response) = deps.conversation_llm.chat(request).await {
        let title = response.message.content.trim().trim_matches('"').to_string();
        if !title.is_empty() {
            let _ = deps.sessions.set_auto_title(session_id, &title, NameSource::Heuristic).await;
        }
    }
}
