//! Plan Repository (C2/C1, spec §4.2): the service composing the main
//! registry, the per-plan-file LRU cache, and the task/dependency repos into
//! the public plan-tree operations.

use crate::db::connection::{DatabaseConnection, DatabasePool};
use crate::db::models::{PlanRow, PlanSummary, SnapshotRow};
use crate::db::plan_store::PlanFileCache;
use crate::db::repositories::plan_repo::PlanRepository as PlanRegistry;
use crate::db::repositories::snapshot_repo::SnapshotRepository;
use crate::db::repositories::task_repo::TaskRepository;
use crate::plan::anchor::{resolve_position, Anchor};
use crate::plan::error::{PlanError, PlanResult};
use crate::plan::node::{ContextSection, ExecutionResult, PlanNode, PlanNodeStatus};
use crate::plan::tree::{PlanMeta, PlanTree};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Fields accepted when creating a task (spec §4.2 `create_task`). `position`
/// takes precedence over `anchor`, which takes precedence over appending as
/// the last child (spec §9).
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub parent_id: Option<i64>,
    pub position: Option<i64>,
    pub anchor: Option<Anchor>,
    pub name: String,
    pub instruction: Option<String>,
    pub metadata: serde_json::Value,
    pub dependencies: Vec<i64>,
}

/// A task's context snapshot, written wholesale by whichever component most
/// recently produced it (spec §3 "context fields are owned by whichever
/// component most recently produced them").
#[derive(Debug, Clone, Default)]
pub struct TaskContextUpdate {
    pub combined: Option<String>,
    pub sections: Vec<ContextSection>,
    pub meta: Option<serde_json::Value>,
}

/// Partial update for `update_task` (spec §4.2 `update_task`); `None` fields
/// are left untouched.
#[derive(Debug, Clone, Default)]
pub struct TaskUpdate {
    pub name: Option<String>,
    pub instruction: Option<Option<String>>,
    pub metadata: Option<serde_json::Value>,
    pub dependencies: Option<Vec<i64>>,
    pub context: Option<TaskContextUpdate>,
}

/// One node to upsert into a plan tree (spec §4.2 `upsert_plan_tree`, used
/// by the decomposer to write back BFS results in one shot). `id` identifies
/// an existing node to update; `None` inserts a new one. `temp_id` lets
/// callers reference siblings/parents created earlier in the same batch
/// before they have a real id.
#[derive(Debug, Clone)]
pub struct UpsertNode {
    pub id: Option<i64>,
    pub temp_id: Option<String>,
    pub parent_id: Option<i64>,
    pub parent_temp_id: Option<String>,
    pub name: String,
    pub instruction: Option<String>,
    pub metadata: serde_json::Value,
    pub dependencies: Vec<i64>,
}

pub struct PlanRepository {
    registry: Arc<DatabaseConnection>,
    files: Arc<PlanFileCache>,
}

impl PlanRepository {
    pub fn new(registry: Arc<DatabaseConnection>, files: Arc<PlanFileCache>) -> Self {
        Self { registry, files }
    }

    fn registry_pool(&self) -> &DatabasePool {
        self.registry.pool()
    }

    pub async fn list_plans(&self) -> PlanResult<Vec<PlanSummary>> {
        let rows = PlanRegistry::list(self.registry_pool()).await?;
        let mut summaries = Vec::with_capacity(rows.len());
        for row in rows {
            let task_count = match self.files.get(row.id).await {
                Ok(file) => TaskRepository::count_all(file.pool()).await.unwrap_or(0),
                Err(_) => 0,
            };
            summaries.push(PlanSummary {
                id: row.id,
                title: row.title,
                task_count,
                created_at: row.created_at,
                updated_at: row.updated_at,
            });
        }
        Ok(summaries)
    }

    async fn require_plan_row(&self, plan_id: i64) -> PlanResult<PlanRow> {
        PlanRegistry::get(self.registry_pool(), plan_id)
            .await?
            .ok_or_else(|| PlanError::NotFound(format!("plan {plan_id}")))
    }

    pub async fn get_plan_tree(&self, plan_id: i64) -> PlanResult<PlanTree> {
        let plan_row = self.require_plan_row(plan_id).await?;
        let file = self.files.get(plan_id).await?;
        let tasks = TaskRepository::list_all(file.pool()).await?;
        let deps = TaskRepository::all_dependencies(file.pool()).await?;
        Ok(PlanTree::assemble(plan_row, tasks, deps))
    }

    pub async fn get_plan_summary(&self, plan_id: i64) -> PlanResult<PlanSummary> {
        let plan_row = self.require_plan_row(plan_id).await?;
        let file = self.files.get(plan_id).await?;
        let task_count = TaskRepository::count_all(file.pool()).await?;
        Ok(PlanSummary {
            id: plan_row.id,
            title: plan_row.title,
            task_count,
            created_at: plan_row.created_at,
            updated_at: plan_row.updated_at,
        })
    }

    /// Collected execution results for every completed node, in plan order
    /// (spec §4.2 `get_plan_results`).
    pub async fn get_plan_results(&self, plan_id: i64) -> PlanResult<Vec<(i64, String, Option<serde_json::Value>)>> {
        let tree = self.get_plan_tree(plan_id).await?;
        let mut ids: Vec<i64> = tree.nodes.keys().copied().collect();
        ids.sort_by_key(|id| tree.nodes.get(id).map(|n| n.path.clone()).unwrap_or_default());
        Ok(ids
            .into_iter()
            .filter_map(|id| {
                let node = tree.nodes.get(&id)?;
                let result = node.execution_result.as_ref()?;
                Some((id, node.name.clone(), result.content.as_ref().map(|c| serde_json::json!(c))))
            })
            .collect())
    }

    pub async fn create_plan(
        &self,
        title: &str,
        description: Option<&str>,
        metadata: serde_json::Value,
    ) -> PlanResult<PlanMeta> {
        let metadata_json = metadata.to_string();
        // plan_db_path is finalized once we know the assigned id; insert with
        // a placeholder then patch it, mirroring how an autoincrement id must
        // exist before it can be part of its own file name.
        let row = PlanRegistry::create(self.registry_pool(), title, description, &metadata_json, "")
            .await?;
        let path = self.files.file_path(row.id);
        sqlx::query("UPDATE plans SET plan_db_path = ? WHERE id = ?")
            .bind(path.to_string_lossy().to_string())
            .bind(row.id)
            .execute(self.registry_pool())
            .await
            .map_err(PlanError::from)?;

        // Touch the per-plan file so it exists with a fully-applied schema
        // even for a plan with no tasks yet.
        self.files.get(row.id).await?;

        let row = self.require_plan_row(row.id).await?;
        Ok(row.into())
    }

    pub async fn delete_plan(&self, plan_id: i64) -> PlanResult<()> {
        self.require_plan_row(plan_id).await?;
        self.files.evict(plan_id).await;
        let path = self.files.file_path(plan_id);
        let _ = tokio::fs::remove_file(&path).await;
        PlanRegistry::delete(self.registry_pool(), plan_id).await?;
        Ok(())
    }

    /// Filter `dependencies` down to ids that exist among `valid_ids`,
    /// warning (not rejecting) on drops (spec §3 invariant "dependency
    /// validity").
    fn filter_dependencies(task_id: Option<i64>, dependencies: &[i64], valid_ids: &std::collections::HashSet<i64>) -> Vec<i64> {
        dependencies
            .iter()
            .copied()
            .filter(|dep| {
                let ok = valid_ids.contains(dep) && Some(*dep) != task_id;
                if !ok {
                    warn!(dependency = dep, task_id = ?task_id, "dropping invalid task dependency");
                }
                ok
            })
            .collect()
    }

    pub async fn create_task(&self, plan_id: i64, new_task: NewTask) -> PlanResult<PlanNode> {
        self.require_plan_row(plan_id).await?;
        let file = self.files.get(plan_id).await?;
        let pool = file.pool();

        let siblings = TaskRepository::list_by_parent(pool, new_task.parent_id).await?;
        let sibling_positions: Vec<(i64, i64)> = siblings.iter().map(|t| (t.id, t.position)).collect();
        let resolved = resolve_position(new_task.position, new_task.anchor, &sibling_positions)
            .map_err(PlanError::InvalidAnchor)?;

        let (parent_path, parent_depth) = match new_task.parent_id {
            Some(pid) => {
                let parent = TaskRepository::get(pool, pid)
                    .await?
                    .ok_or_else(|| PlanError::InvalidAnchor(format!("parent {pid} not found")))?;
                (Some(parent.path), parent.depth)
            }
            None => (None, -1),
        };

        TaskRepository::shift_siblings(pool, new_task.parent_id, resolved.position, 1).await?;

        let metadata_json = new_task.metadata.to_string();
        let depth = parent_depth + 1;
        let path = match &parent_path {
            Some(p) => format!("{p}.{}", resolved.position),
            None => resolved.position.to_string(),
        };

        let row = TaskRepository::insert(
            pool,
            new_task.parent_id,
            resolved.position,
            &path,
            depth,
            &new_task.name,
            new_task.instruction.as_deref(),
            &metadata_json,
        )
        .await?;

        TaskRepository::resequence_siblings(pool, new_task.parent_id).await?;
        self.reassign_paths(pool, new_task.parent_id).await?;

        let all_ids: std::collections::HashSet<i64> = TaskRepository::list_all(pool)
            .await?
            .into_iter()
            .map(|t| t.id)
            .collect();
        let deps = Self::filter_dependencies(Some(row.id), &new_task.dependencies, &all_ids);
        TaskRepository::replace_dependencies(pool, row.id, &deps).await?;

        PlanRegistry::touch(self.registry_pool(), plan_id).await?;
        self.node_from_id(pool, row.id).await
    }

    async fn node_from_id(&self, pool: &DatabasePool, id: i64) -> PlanResult<PlanNode> {
        let row = TaskRepository::get(pool, id)
            .await?
            .ok_or_else(|| PlanError::NotFound(format!("task {id}")))?;
        let deps = TaskRepository::dependencies_for(pool, id).await?;
        let mut map = HashMap::new();
        map.insert(id, deps);
        let plan_row = PlanRow {
            id: 0,
            title: String::new(),
            description: None,
            metadata_json: "{}".to_string(),
            plan_db_path: String::new(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        };
        let tree = PlanTree::assemble(plan_row, vec![row], map);
        tree.nodes
            .into_iter()
            .next()
            .map(|(_, node)| node)
            .ok_or_else(|| PlanError::NotFound(format!("task {id}")))
    }

    /// Recompute `path`/`depth` for every node after a structural change.
    /// Paths are derived purely from parent chain + position, so this is a
    /// full re-derivation rather than an incremental patch.
    async fn reassign_paths(&self, pool: &DatabasePool, _touched_parent: Option<i64>) -> Result<(), sqlx::Error> {
        let all = TaskRepository::list_all(pool).await?;
        let mut by_parent: HashMap<Option<i64>, Vec<(i64, i64)>> = HashMap::new();
        for t in &all {
            by_parent.entry(t.parent_id).or_default().push((t.id, t.position));
        }
        for siblings in by_parent.values_mut() {
            siblings.sort_by_key(|(_, pos)| *pos);
        }

        let mut stack: Vec<(Option<i64>, Option<String>, i64)> = vec![(None, None, -1)];
        while let Some((parent_id, parent_path, parent_depth)) = stack.pop() {
            if let Some(children) = by_parent.get(&parent_id) {
                for (id, position) in children {
                    let depth = parent_depth + 1;
                    let path = match &parent_path {
                        Some(p) => format!("{p}.{position}"),
                        None => position.to_string(),
                    };
                    TaskRepository::set_path_and_depth(pool, *id, &path, depth).await?;
                    stack.push((Some(*id), Some(path), depth));
                }
            }
        }
        Ok(())
    }

    pub async fn update_task(&self, plan_id: i64, task_id: i64, update: TaskUpdate) -> PlanResult<PlanNode> {
        self.require_plan_row(plan_id).await?;
        let file = self.files.get(plan_id).await?;
        let pool = file.pool();

        TaskRepository::get(pool, task_id)
            .await?
            .ok_or_else(|| PlanError::NotFound(format!("task {task_id}")))?;

        let metadata_json = update.metadata.as_ref().map(|m| m.to_string());
        TaskRepository::update_fields(
            pool,
            task_id,
            update.name.as_deref(),
            update.instruction.as_ref().map(|o| o.as_deref()),
            metadata_json.as_deref(),
        )
        .await?;

        if let Some(dependencies) = update.dependencies {
            let all_ids: std::collections::HashSet<i64> = TaskRepository::list_all(pool)
                .await?
                .into_iter()
                .map(|t| t.id)
                .collect();
            let deps = Self::filter_dependencies(Some(task_id), &dependencies, &all_ids);
            TaskRepository::replace_dependencies(pool, task_id, &deps).await?;
        }

        if let Some(context) = update.context {
            let sections_json = serde_json::to_string(&context.sections).ok();
            let meta_json = context.meta.as_ref().map(|m| m.to_string());
            TaskRepository::update_context(
                pool,
                task_id,
                context.combined.as_deref(),
                sections_json.as_deref(),
                meta_json.as_deref(),
            )
            .await?;
        }

        PlanRegistry::touch(self.registry_pool(), plan_id).await?;
        self.node_from_id(pool, task_id).await
    }

    /// Move a task to a new parent/position, rejecting moves that would
    /// create a cycle (spec §3 invariant "forest shape / no cycles").
    pub async fn move_task(
        &self,
        plan_id: i64,
        task_id: i64,
        new_parent_id: Option<i64>,
        position: Option<i64>,
        anchor: Option<Anchor>,
    ) -> PlanResult<PlanNode> {
        self.require_plan_row(plan_id).await?;
        let file = self.files.get(plan_id).await?;
        let pool = file.pool();

        let tree = {
            let plan_row = self.require_plan_row(plan_id).await?;
            let tasks = TaskRepository::list_all(pool).await?;
            let deps = TaskRepository::all_dependencies(pool).await?;
            PlanTree::assemble(plan_row, tasks, deps)
        };

        if !tree.nodes.contains_key(&task_id) {
            return Err(PlanError::NotFound(format!("task {task_id}")));
        }
        if let Some(new_parent) = new_parent_id {
            if new_parent == task_id || tree.is_ancestor_or_self(task_id, new_parent) {
                return Err(PlanError::CycleDetected(format!(
                    "moving task {task_id} under {new_parent} would create a cycle"
                )));
            }
        }

        let old_parent_id = tree.nodes.get(&task_id).and_then(|n| n.parent_id);

        let siblings = TaskRepository::list_by_parent(pool, new_parent_id).await?;
        let sibling_positions: Vec<(i64, i64)> = siblings
            .iter()
            .filter(|t| t.id != task_id)
            .map(|t| (t.id, t.position))
            .collect();
        let resolved = resolve_position(position, anchor, &sibling_positions)
            .map_err(PlanError::InvalidAnchor)?;

        TaskRepository::shift_siblings(pool, new_parent_id, resolved.position, 1).await?;
        TaskRepository::set_parent(pool, task_id, new_parent_id, resolved.position, "", 0).await?;
        TaskRepository::resequence_siblings(pool, new_parent_id).await?;
        if old_parent_id != new_parent_id {
            TaskRepository::resequence_siblings(pool, old_parent_id).await?;
        }
        self.reassign_paths(pool, new_parent_id).await?;

        PlanRegistry::touch(self.registry_pool(), plan_id).await?;
        self.node_from_id(pool, task_id).await
    }

    pub async fn delete_task(&self, plan_id: i64, task_id: i64) -> PlanResult<()> {
        self.require_plan_row(plan_id).await?;
        let file = self.files.get(plan_id).await?;
        let pool = file.pool();

        let task = TaskRepository::get(pool, task_id)
            .await?
            .ok_or_else(|| PlanError::NotFound(format!("task {task_id}")))?;

        let tasks = TaskRepository::list_all(pool).await?;
        let deps = TaskRepository::all_dependencies(pool).await?;
        let plan_row = self.require_plan_row(plan_id).await?;
        let tree = PlanTree::assemble(plan_row, tasks, deps);
        let subtree = tree.subtree_ids(task_id);

        TaskRepository::delete_subtree(pool, &subtree).await?;
        TaskRepository::resequence_siblings(pool, task.parent_id).await?;

        PlanRegistry::touch(self.registry_pool(), plan_id).await?;
        Ok(())
    }

    /// A task's subtree as its own [`PlanTree`] view (spec §4.2 `subgraph`,
    /// used to hand a `decompose_task`/`request_subgraph` action only the
    /// relevant slice of the plan).
    pub async fn subgraph(&self, plan_id: i64, task_id: i64) -> PlanResult<PlanTree> {
        let full = self.get_plan_tree(plan_id).await?;
        if !full.nodes.contains_key(&task_id) {
            return Err(PlanError::NotFound(format!("task {task_id}")));
        }
        let ids = full.subtree_ids(task_id);
        let nodes: HashMap<i64, PlanNode> = ids
            .iter()
            .filter_map(|id| full.nodes.get(id).map(|n| (*id, n.clone())))
            .collect();
        Ok(PlanTree {
            plan: full.plan,
            nodes,
            roots: vec![task_id],
        })
    }

    /// Set a node's status with no other change (spec §4.5 execution loop:
    /// "mark `running` (persist)" before invoking the executor LLM).
    pub async fn set_task_status(&self, plan_id: i64, task_id: i64, status: PlanNodeStatus) -> PlanResult<PlanNode> {
        self.require_plan_row(plan_id).await?;
        let file = self.files.get(plan_id).await?;
        let pool = file.pool();
        TaskRepository::update_status(pool, task_id, status.as_str()).await?;
        PlanRegistry::touch(self.registry_pool(), plan_id).await?;
        self.node_from_id(pool, task_id).await
    }

    /// Persist a node's `execution_result` and the status it translates to
    /// (spec §4.5 execution loop step 2).
    pub async fn record_execution_result(
        &self,
        plan_id: i64,
        task_id: i64,
        status: PlanNodeStatus,
        result: ExecutionResult,
    ) -> PlanResult<PlanNode> {
        self.require_plan_row(plan_id).await?;
        let file = self.files.get(plan_id).await?;
        let pool = file.pool();
        let result_json = serde_json::to_string(&result).unwrap_or_else(|_| "{}".to_string());
        TaskRepository::update_execution_result(pool, task_id, status.as_str(), &result_json).await?;
        PlanRegistry::touch(self.registry_pool(), plan_id).await?;
        self.node_from_id(pool, task_id).await
    }

    /// Reset a node to `pending` and clear its `execution_result`, for
    /// `rerun_task` (spec §4.5 "resumability": "explicit `rerun_task` resets
    /// a node to `pending` and reschedules").
    pub async fn rerun_task(&self, plan_id: i64, task_id: i64) -> PlanResult<PlanNode> {
        self.require_plan_row(plan_id).await?;
        let file = self.files.get(plan_id).await?;
        let pool = file.pool();
        TaskRepository::update_execution_result(pool, task_id, PlanNodeStatus::Pending.as_str(), "null").await?;
        PlanRegistry::touch(self.registry_pool(), plan_id).await?;
        self.node_from_id(pool, task_id).await
    }

    /// Batch-insert/update nodes in one transaction-like sweep (spec §4.2
    /// `upsert_plan_tree(tree, note?)`), used by the decomposer to write back
    /// a whole BFS round. Idempotent: re-running with the same
    /// `UpsertNode::id` values updates those rows rather than duplicating
    /// them (spec §8 property 5). When `note` is `Some`, also records a full
    /// JSON snapshot of the resulting tree, keyed by that note.
    pub async fn upsert_plan_tree(&self, plan_id: i64, nodes: Vec<UpsertNode>, note: Option<&str>) -> PlanResult<Vec<PlanNode>> {
        self.require_plan_row(plan_id).await?;
        let file = self.files.get(plan_id).await?;
        let pool = file.pool();

        let mut temp_to_real: HashMap<String, i64> = HashMap::new();
        let mut inserted_ids = Vec::with_capacity(nodes.len());

        for node in &nodes {
            let parent_id = match &node.parent_temp_id {
                Some(temp) => temp_to_real.get(temp).copied(),
                None => node.parent_id,
            };

            let real_id = match node.id {
                Some(existing_id) => {
                    let metadata_json = node.metadata.to_string();
                    TaskRepository::update_fields(
                        pool,
                        existing_id,
                        Some(&node.name),
                        Some(node.instruction.as_deref()),
                        Some(&metadata_json),
                    )
                    .await?;
                    existing_id
                }
                None => {
                    let siblings = TaskRepository::list_by_parent(pool, parent_id).await?;
                    let position = siblings.len() as i64;
                    let (parent_path, parent_depth) = match parent_id {
                        Some(pid) => match TaskRepository::get(pool, pid).await? {
                            Some(p) => (Some(p.path), p.depth),
                            None => (None, -1),
                        },
                        None => (None, -1),
                    };
                    let path = match &parent_path {
                        Some(p) => format!("{p}.{position}"),
                        None => position.to_string(),
                    };
                    let metadata_json = node.metadata.to_string();
                    let row = TaskRepository::insert(
                        pool,
                        parent_id,
                        position,
                        &path,
                        parent_depth + 1,
                        &node.name,
                        node.instruction.as_deref(),
                        &metadata_json,
                    )
                    .await?;
                    row.id
                }
            };

            if let Some(temp) = &node.temp_id {
                temp_to_real.insert(temp.clone(), real_id);
            }
            inserted_ids.push((real_id, node.dependencies.clone()));
        }

        let all_ids: std::collections::HashSet<i64> = TaskRepository::list_all(pool)
            .await?
            .into_iter()
            .map(|t| t.id)
            .collect();
        for (id, deps) in &inserted_ids {
            let resolved_deps: Vec<i64> = deps
                .iter()
                .map(|d| temp_to_real.get(&d.to_string()).copied().unwrap_or(*d))
                .collect();
            let filtered = Self::filter_dependencies(Some(*id), &resolved_deps, &all_ids);
            TaskRepository::replace_dependencies(pool, *id, &filtered).await?;
        }

        self.reassign_paths(pool, None).await?;
        PlanRegistry::touch(self.registry_pool(), plan_id).await?;

        let mut out = Vec::with_capacity(inserted_ids.len());
        for (id, _) in inserted_ids {
            out.push(self.node_from_id(pool, id).await?);
        }

        if let Some(note) = note {
            let tree = self.get_plan_tree(plan_id).await?;
            let snapshot_json = serde_json::to_string(&tree).map_err(|e| PlanError::StorageFailure(e.to_string()))?;
            SnapshotRepository::insert(pool, Some(note), &snapshot_json).await?;
        }

        Ok(out)
    }

    /// List recorded snapshots for a plan, most recent first (spec §4.2
    /// "optionally records a snapshot").
    pub async fn list_snapshots(&self, plan_id: i64) -> PlanResult<Vec<SnapshotRow>> {
        self.require_plan_row(plan_id).await?;
        let file = self.files.get(plan_id).await?;
        Ok(SnapshotRepository::list(file.pool()).await?)
    }
}
