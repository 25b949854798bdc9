//! Plan Executor (C5, spec §4.5): runs a plan's tasks in dependency order,
//! one LLM call per ready node, until nothing is left to do.

use crate::executor::config::ExecutorConfig;
use crate::executor::error::{ExecutorError, ExecutorResult};
use crate::executor::parser::ResponseParser;
use crate::executor::retry::retry_with_backoff;
use crate::jobs::manager::JobManager;
use crate::plan::node::{ExecutionResult, PlanNode, PlanNodeStatus};
use crate::plan::repository::PlanRepository;
use crate::plan::tree::PlanTree;
use planloom_llm::{ChatModel, ChatRequest, Message};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, warn};

/// Outcome of executing a single task.
#[derive(Debug, Clone, Serialize)]
pub struct StepResult {
    pub task_id: i64,
    pub name: String,
    pub status: PlanNodeStatus,
}

/// Final summary returned once no further node is ready (spec §4.5 step 4:
/// "counts per status + ordered step list with per-task result references").
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExecutionSummary {
    pub counts: HashMap<String, u64>,
    pub steps: Vec<StepResult>,
}

fn default_system_prompt() -> String {
    r#"You are a task execution assistant carrying out one step of a larger plan.
Given the task instruction, any ancestor context, and the outputs of its
dependencies, perform the task and reply with JSON only, nothing else:

{"status": "completed" | "failed", "content": "...", "notes": "...", "metadata": {}}

"content" holds the task's output. "notes" and "metadata" are optional;
omit them if you have nothing to add."#
        .to_string()
}

/// Detect a cycle in the dependency graph via DFS with a recursion-stack
/// marker. This is distinct from the parent/child forest, which `PlanTree`
/// already guarantees is acyclic (spec §4.5 step 1: "compute a DAG over
/// dependencies; validate acyclic (fail fast with `CycleDetected`)").
fn detect_cycle(tree: &PlanTree) -> ExecutorResult<()> {
    #[derive(Clone, Copy, PartialEq, Eq)]
    enum Mark {
        Visiting,
        Done,
    }

    fn visit(tree: &PlanTree, id: i64, marks: &mut HashMap<i64, Mark>) -> ExecutorResult<()> {
        match marks.get(&id) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => {
                return Err(ExecutorError::CycleDetected(format!("dependency cycle involving task {id}")));
            }
            None => {}
        }
        marks.insert(id, Mark::Visiting);
        if let Some(node) = tree.get(id) {
            for dep in &node.dependencies {
                visit(tree, *dep, marks)?;
            }
        }
        marks.insert(id, Mark::Done);
        Ok(())
    }

    let mut marks = HashMap::new();
    for id in tree.nodes.keys().copied().collect::<Vec<_>>() {
        visit(tree, id, &mut marks)?;
    }
    Ok(())
}

/// True if any transitive prerequisite of `id` is `failed` (spec §4.5 step
/// 3: "a node becomes `skipped` when any of its transitive prerequisites is
/// `failed`").
fn is_transitively_failed(tree: &PlanTree, statuses: &HashMap<i64, PlanNodeStatus>, id: i64) -> bool {
    let node = match tree.get(id) {
        Some(n) => n,
        None => return false,
    };
    node.dependencies.iter().any(|dep| {
        matches!(statuses.get(dep), Some(PlanNodeStatus::Failed)) || is_transitively_failed(tree, statuses, *dep)
    })
}

fn ancestor_chain(tree: &PlanTree, id: i64) -> Vec<&PlanNode> {
    let mut chain = Vec::new();
    let mut current = tree.get(id).and_then(|n| n.parent_id);
    while let Some(pid) = current {
        match tree.get(pid) {
            Some(node) => {
                chain.push(node);
                current = node.parent_id;
            }
            None => break,
        }
    }
    chain.reverse();
    chain
}

/// Build the execution prompt: node instruction, ancestor context,
/// dependency outputs (spec §4.5 step 2).
fn build_prompt(tree: &PlanTree, node: &PlanNode, results: &HashMap<i64, ExecutionResult>, config: &ExecutorConfig) -> String {
    let mut sections = vec![format!("Task: {}", node.name)];
    if let Some(instruction) = &node.instruction {
        sections.push(format!("Instruction: {instruction}"));
    }

    if config.use_context {
        let ancestors = ancestor_chain(tree, node.id);
        if !ancestors.is_empty() {
            let chain = ancestors.iter().map(|n| n.name.clone()).collect::<Vec<_>>().join(" > ");
            sections.push(format!("Ancestor path: {chain}"));
        }
        if let Some(combined) = &node.context_combined {
            sections.push(format!("Retrieved context:\n{combined}"));
        }

        if !node.dependencies.is_empty() {
            let mut dep_lines = Vec::new();
            for dep_id in &node.dependencies {
                let dep_name = tree.get(*dep_id).map(|n| n.name.as_str()).unwrap_or("unknown task");
                let output = results
                    .get(dep_id)
                    .and_then(|r| r.content.clone())
                    .unwrap_or_else(|| "(no output)".to_string());
                dep_lines.push(format!("- {dep_name} ({dep_id}): {output}"));
            }
            sections.push(format!("Dependency outputs:\n{}", dep_lines.join("\n")));
        }
    }

    sections.push("Respond with JSON only as specified in the system prompt.".to_string());
    sections.join("\n\n")
}

/// Run the dependency-ordered execution loop for a plan (spec §4.5).
/// `task_filter` restricts execution to the given task ids; `None` runs the
/// whole plan.
pub async fn execute(
    plans: &PlanRepository,
    jobs: &JobManager,
    job_id: &str,
    chat_model: Arc<dyn ChatModel>,
    plan_id: i64,
    task_filter: Option<Vec<i64>>,
    config: ExecutorConfig,
) -> ExecutorResult<ExecutionSummary> {
    config.validate()?;
    let tree = plans.get_plan_tree(plan_id).await?;
    detect_cycle(&tree)?;

    let target: HashSet<i64> = match task_filter {
        Some(ids) => ids.into_iter().collect(),
        None => tree.nodes.keys().copied().collect(),
    };

    let mut statuses: HashMap<i64, PlanNodeStatus> = tree.nodes.iter().map(|(id, n)| (*id, n.status)).collect();
    let mut results: HashMap<i64, ExecutionResult> = tree
        .nodes
        .iter()
        .filter_map(|(id, n)| n.execution_result.clone().map(|r| (*id, r)))
        .collect();
    let mut summary = ExecutionSummary::default();
    let parser = ResponseParser::new();

    loop {
        let mut candidate_ids: Vec<i64> = target
            .iter()
            .copied()
            .filter(|id| matches!(statuses.get(id), Some(PlanNodeStatus::Pending)))
            .collect();
        candidate_ids.sort_by_key(|id| tree.path_of(*id).unwrap_or("").to_string());

        if candidate_ids.is_empty() {
            break;
        }

        let mut made_progress = false;
        let mut ready_task = None;

        for id in &candidate_ids {
            if is_transitively_failed(&tree, &statuses, *id) {
                statuses.insert(*id, PlanNodeStatus::Skipped);
                let updated = plans.set_task_status(plan_id, *id, PlanNodeStatus::Skipped).await?;
                jobs.append_log(job_id, "info", &format!("skipping task {id}: prerequisite failed"), None)
                    .await?;
                summary.steps.push(StepResult {
                    task_id: updated.id,
                    name: updated.name.clone(),
                    status: PlanNodeStatus::Skipped,
                });
                made_progress = true;
                continue;
            }

            let node = match tree.get(*id) {
                Some(n) => n,
                None => continue,
            };
            let deps_satisfied = node
                .dependencies
                .iter()
                .all(|dep| matches!(statuses.get(dep), Some(PlanNodeStatus::Completed) | Some(PlanNodeStatus::Skipped)));
            if deps_satisfied {
                ready_task = Some(*id);
                made_progress = true;
                break;
            }
        }

        let Some(task_id) = ready_task else {
            if !made_progress {
                warn!(plan_id, "execution stalled: no ready task among remaining pending nodes");
                break;
            }
            continue;
        };

        run_task(plans, jobs, job_id, &chat_model, plan_id, &tree, &config, &parser, task_id, &mut statuses, &mut results, &mut summary)
            .await?;
    }

    for id in &target {
        let status = statuses.get(id).copied().unwrap_or(PlanNodeStatus::Pending);
        *summary.counts.entry(status.as_str().to_string()).or_insert(0) += 1;
    }

    info!(plan_id, job_id, counts = ?summary.counts, "plan execution pass complete");
    Ok(summary)
}

#[allow(clippy::too_many_arguments)]
async fn run_task(
    plans: &PlanRepository,
    jobs: &JobManager,
    job_id: &str,
    chat_model: &Arc<dyn ChatModel>,
    plan_id: i64,
    tree: &PlanTree,
    config: &ExecutorConfig,
    parser: &ResponseParser,
    task_id: i64,
    statuses: &mut HashMap<i64, PlanNodeStatus>,
    results: &mut HashMap<i64, ExecutionResult>,
    summary: &mut ExecutionSummary,
) -> ExecutorResult<()> {
    plans.set_task_status(plan_id, task_id, PlanNodeStatus::Running).await?;
    statuses.insert(task_id, PlanNodeStatus::Running);
    jobs.append_log(job_id, "info", &format!("executing task {task_id}"), None).await?;

    let node = tree.get(task_id).ok_or_else(|| ExecutorError::ParseError(format!("task {task_id} vanished mid-run")))?;
    let prompt = build_prompt(tree, node, results, config);
    let system_prompt = config.system_prompt.clone().unwrap_or_else(default_system_prompt);

    let mut request = ChatRequest::new(vec![Message::system(system_prompt), Message::human(prompt)]).with_temperature(config.temperature);
    if let Some(max_tokens) = config.max_tokens {
        request = request.with_max_tokens(max_tokens);
    }

    let operation_name = format!("execute_task_{task_id}");
    let start = std::time::Instant::now();
    let outcome = retry_with_backoff(&config.retry, &operation_name, {
        let chat_model = Arc::clone(chat_model);
        let request = request.clone();
        move || {
            let chat_model = Arc::clone(&chat_model);
            let request = request.clone();
            async move { chat_model.chat(request).await.map_err(ExecutorError::from) }
        }
    })
    .await;

    let duration_ms = start.elapsed().as_millis() as u64;
    let (status, result) = match outcome {
        Ok(response) => match parser.parse(&response.message.content) {
            Ok((status, mut result)) => {
                result.duration_ms = Some(duration_ms);
                (status, result)
            }
            Err(err) => {
                warn!(task_id, error = %err, "executor response failed to parse");
                (
                    PlanNodeStatus::Failed,
                    ExecutionResult {
                        status: "failed".to_string(),
                        content: None,
                        notes: Some(err.to_string()),
                        metadata: serde_json::json!({}),
                        duration_ms: Some(duration_ms),
                    },
                )
            }
        },
        Err(err) => {
            warn!(task_id, error = %err, "task execution exhausted retries");
            (
                PlanNodeStatus::Failed,
                ExecutionResult {
                    status: "failed".to_string(),
                    content: None,
                    notes: Some(err.to_string()),
                    metadata: serde_json::json!({}),
                    duration_ms: Some(duration_ms),
                },
            )
        }
    };

    let updated = plans.record_execution_result(plan_id, task_id, status, result.clone()).await?;
    statuses.insert(task_id, status);
    results.insert(task_id, result);

    let level = if status == PlanNodeStatus::Failed { "error" } else { "success" };
    jobs.append_log(job_id, level, &format!("task {task_id} -> {}", status.as_str()), None).await?;
    summary.steps.push(StepResult {
        task_id: updated.id,
        name: updated.name.clone(),
        status,
    });
    Ok(())
}

/// Reset a node to `pending` and clear its prior result (spec §4.5
/// "resumability": "explicit `rerun_task` resets a node to pending and
/// reschedules").
pub async fn rerun_task(plans: &PlanRepository, plan_id: i64, task_id: i64) -> ExecutorResult<PlanNode> {
    Ok(plans.rerun_task(plan_id, task_id).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::tree::PlanMeta;
    use chrono::Utc;
    use std::collections::BTreeSet;

    fn node(id: i64, deps: &[i64]) -> PlanNode {
        let mut n = PlanNode::new_child(id, None, 0, 0, format!("/{id}"), format!("task-{id}"));
        n.dependencies = deps.iter().copied().collect::<BTreeSet<_>>();
        n
    }

    fn tree_of(nodes: Vec<PlanNode>) -> PlanTree {
        PlanTree {
            plan: PlanMeta {
                id: 1,
                title: "t".to_string(),
                description: None,
                metadata: serde_json::json!({}),
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
            nodes: nodes.into_iter().map(|n| (n.id, n)).collect(),
            roots: vec![],
        }
    }

    #[test]
    fn detects_no_cycle_in_dag() {
        let tree = tree_of(vec![node(1, &[]), node(2, &[1]), node(3, &[1, 2])]);
        assert!(detect_cycle(&tree).is_ok());
    }

    #[test]
    fn detects_a_cycle() {
        let tree = tree_of(vec![node(1, &[2]), node(2, &[1])]);
        assert!(detect_cycle(&tree).is_err());
    }

    #[test]
    fn transitive_failure_propagates() {
        let tree = tree_of(vec![node(1, &[]), node(2, &[1]), node(3, &[2])]);
        let mut statuses = HashMap::new();
        statuses.insert(1, PlanNodeStatus::Failed);
        statuses.insert(2, PlanNodeStatus::Pending);
        statuses.insert(3, PlanNodeStatus::Pending);
        assert!(is_transitively_failed(&tree, &statuses, 2));
        assert!(is_transitively_failed(&tree, &statuses, 3));
    }

    #[test]
    fn build_prompt_includes_dependency_output() {
        let mut dependent = node(2, &[1]);
        dependent.instruction = Some("summarize the prior step".to_string());
        let tree = tree_of(vec![node(1, &[]), dependent]);
        let mut results = HashMap::new();
        results.insert(
            1,
            ExecutionResult {
                status: "completed".to_string(),
                content: Some("step one output".to_string()),
                notes: None,
                metadata: serde_json::json!({}),
                duration_ms: None,
            },
        );
        let prompt = build_prompt(&tree, tree.get(2).unwrap(), &results, &ExecutorConfig::default());
        assert!(prompt.contains("step one output"));
        assert!(prompt.contains("summarize the prior step"));
    }
}
