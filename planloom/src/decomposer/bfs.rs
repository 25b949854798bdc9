//! BFS Plan Decomposer (C4, spec §4.4): bounded LLM-driven tree expansion.

use crate::decomposer::prompt::build_decompose_prompt;
use crate::decomposer::schema::{parse_response, ChildSpec};
use crate::jobs::manager::JobManager;
use crate::plan::error::PlanError;
use crate::plan::node::PlanNode;
use crate::plan::repository::{NewTask, PlanRepository};
use planloom_llm::{ChatModel, ChatRequest};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum DecomposerError {
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error(transparent)]
    Job(#[from] crate::jobs::JobError),
    #[error("decomposition llm error: {0}")]
    Llm(#[from] planloom_llm::LlmError),
}

pub type DecomposerResult<T> = Result<T, DecomposerError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecomposeMode {
    PlanBfs,
    SingleNode,
}

#[derive(Debug, Clone)]
pub struct DecomposerConfig {
    pub max_depth: i64,
    pub max_children: usize,
    pub total_node_budget: usize,
    pub stop_on_empty: bool,
    pub retry_limit: u32,
}

impl Default for DecomposerConfig {
    fn default() -> Self {
        Self {
            max_depth: 4,
            max_children: 8,
            total_node_budget: 200,
            stop_on_empty: true,
            retry_limit: 2,
        }
    }
}

impl DecomposerConfig {
    /// Environment variables: `DECOMP_MAX_DEPTH`, `DECOMP_MAX_CHILDREN`,
    /// `DECOMP_TOTAL_NODE_BUDGET` (spec §6 environment configuration table).
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("DECOMP_MAX_DEPTH") {
            if let Ok(value) = v.parse() {
                self.max_depth = value;
            }
        }
        if let Ok(v) = std::env::var("DECOMP_MAX_CHILDREN") {
            if let Ok(value) = v.parse() {
                self.max_children = value;
            }
        }
        if let Ok(v) = std::env::var("DECOMP_TOTAL_NODE_BUDGET") {
            if let Ok(value) = v.parse() {
                self.total_node_budget = value;
            }
        }
    }

    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoppedReason {
    DepthLimit,
    ChildLimit,
    NodeBudget,
    StopOnEmpty,
    LlmErrorCap,
    TargetCompleted,
    QueueDrained,
}

#[derive(Debug, Clone, Default)]
pub struct DecomposeOutcome {
    pub nodes_created: u64,
    pub llm_calls: u64,
    pub failed_nodes: Vec<i64>,
    pub stopped_reason: Option<StoppedReason>,
}

/// Run the bounded BFS expansion described in spec §4.4.
pub async fn decompose(
    plans: &PlanRepository,
    jobs: &JobManager,
    job_id: &str,
    chat_model: Arc<dyn ChatModel>,
    plan_id: i64,
    mode: DecomposeMode,
    target_task_id: Option<i64>,
    config: DecomposerConfig,
) -> DecomposerResult<DecomposeOutcome> {
    let start = Instant::now();
    let mut outcome = DecomposeOutcome::default();

    let tree = plans.get_plan_tree(plan_id).await?;
    let mut queue: VecDeque<(i64, i64)> = VecDeque::new();
    match mode {
        DecomposeMode::PlanBfs => {
            for root in &tree.roots {
                queue.push_back((*root, 0));
            }
        }
        DecomposeMode::SingleNode => {
            let target = target_task_id.ok_or_else(|| {
                PlanError::InvalidAnchor("single_node mode requires target_task_id".to_string())
            })?;
            // Depth here is relative to the decomposition target, not the
            // target's absolute position in the tree (spec §8 property 11).
            queue.push_back((target, 0));
        }
    }

    if queue.is_empty() {
        outcome.stopped_reason = Some(StoppedReason::TargetCompleted);
        jobs.append_log(job_id, "info", "nothing to decompose", None).await?;
        return Ok(outcome);
    }

    let mut llm_error_count = 0u32;
    const LLM_ERROR_CAP: u32 = 5;
    let mut stopped_reason = StoppedReason::QueueDrained;

    'outer: while let Some((node_id, depth)) = queue.pop_front() {
        if outcome.nodes_created as usize >= config.total_node_budget {
            stopped_reason = StoppedReason::NodeBudget;
            break;
        }

        let current_tree = plans.get_plan_tree(plan_id).await?;
        let node = match current_tree.get(node_id) {
            Some(n) => n.clone(),
            None => continue,
        };

        jobs.append_log(job_id, "debug", &format!("decomposing node {node_id}"), None).await?;

        let prompt = build_decompose_prompt(&current_tree, &node, config.max_children);
        let mut attempt = 0u32;
        let mut parsed = None;

        while attempt <= config.retry_limit {
            let request = ChatRequest::new(prompt.clone());
            outcome.llm_calls += 1;
            match chat_model.chat(request).await {
                Ok(response) => match parse_response(&response.message.content) {
                    Ok(decoded) => {
                        parsed = Some(decoded);
                        break;
                    }
                    Err(err) => {
                        warn!(node_id, attempt, error = %err, "decomposer response failed validation");
                        attempt += 1;
                    }
                },
                Err(err) => {
                    llm_error_count += 1;
                    warn!(node_id, error = %err, "decomposer llm call failed");
                    if llm_error_count >= LLM_ERROR_CAP {
                        stopped_reason = StoppedReason::LlmErrorCap;
                        break 'outer;
                    }
                    attempt += 1;
                }
            }
        }

        let Some(decoded) = parsed else {
            outcome.failed_nodes.push(node_id);
            jobs.append_log(job_id, "warn", &format!("node {node_id} failed decomposition"), None).await?;
            continue;
        };

        if decoded.should_stop || decoded.children.is_empty() {
            if decoded.children.is_empty() && config.stop_on_empty {
                debug!(node_id, "decomposer stopped: empty response");
                queue.clear();
                stopped_reason = StoppedReason::StopOnEmpty;
                break 'outer;
            }
            continue;
        }

        let children: Vec<ChildSpec> = decoded.children.into_iter().take(config.max_children).collect();
        let mut name_to_id: HashMap<String, i64> = HashMap::new();

        for child in &children {
            if outcome.nodes_created as usize >= config.total_node_budget {
                stopped_reason = StoppedReason::NodeBudget;
                break 'outer;
            }

            let new_task = NewTask {
                parent_id: Some(node_id),
                position: None,
                anchor: None,
                name: child.name.clone(),
                instruction: child.instruction.clone(),
                metadata: child
                    .context
                    .as_ref()
                    .map(|c| serde_json::json!({ "context": c }))
                    .unwrap_or_else(|| serde_json::json!({})),
                dependencies: Vec::new(),
            };
            let created: PlanNode = plans.create_task(plan_id, new_task).await?;
            name_to_id.insert(child.name.clone(), created.id);
            outcome.nodes_created += 1;

            if !child.leaf && depth + 1 < config.max_depth {
                queue.push_back((created.id, depth + 1));
            } else if depth + 1 >= config.max_depth {
                stopped_reason = StoppedReason::DepthLimit;
            }
        }

        // Resolve dependencies expressed as sibling names within this batch.
        for child in &children {
            if child.dependencies.is_empty() {
                continue;
            }
            let Some(&child_id) = name_to_id.get(&child.name) else {
                continue;
            };
            let deps: Vec<i64> = child
                .dependencies
                .iter()
                .filter_map(|name| name_to_id.get(name).copied())
                .collect();
            if !deps.is_empty() {
                plans
                    .update_task(
                        plan_id,
                        child_id,
                        crate::plan::repository::TaskUpdate {
                            dependencies: Some(deps),
                            ..Default::default()
                        },
                    )
                    .await?;
            }
        }
    }

    outcome.stopped_reason.get_or_insert(stopped_reason);
    let duration_ms = start.elapsed().as_millis() as u64;
    jobs.append_log(
        job_id,
        "success",
        "decomposition complete",
        Some(serde_json::json!({
            "nodes_created": outcome.nodes_created,
            "llm_calls": outcome.llm_calls,
            "duration_ms": duration_ms,
            "stopped_reason": outcome.stopped_reason,
        })),
    )
    .await?;

    Ok(outcome)
}
