//! `PlanTree` — the in-memory assembly of a plan's nodes (spec §3 "PlanTree").

use crate::db::models::{PlanRow, TaskRow};
use crate::plan::node::{ExecutionResult, PlanNode, PlanNodeStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::str::FromStr;

/// Plan-level metadata (spec §3 "Plan"), separate from its node set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanMeta {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<PlanRow> for PlanMeta {
    fn from(row: PlanRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            description: row.description,
            metadata: serde_json::from_str(&row.metadata_json).unwrap_or(serde_json::json!({})),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// A plan's full node set plus adjacency, assembled from per-plan-file rows
/// (spec §3 "PlanTree": "a plan's nodes form a forest keyed by `parent_id`").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanTree {
    pub plan: PlanMeta,
    pub nodes: HashMap<i64, PlanNode>,
    pub roots: Vec<i64>,
}

impl PlanTree {
    /// Assemble a tree from raw rows. Dependencies referencing ids outside
    /// `tasks` are silently dropped (spec §3 invariant "dependency validity":
    /// "a repository that encounters an invalid dependency id drops it and
    /// logs a warning rather than rejecting the whole write").
    pub fn assemble(
        plan_row: PlanRow,
        task_rows: Vec<TaskRow>,
        dependencies: HashMap<i64, Vec<i64>>,
    ) -> Self {
        let valid_ids: BTreeSet<i64> = task_rows.iter().map(|t| t.id).collect();
        let mut nodes = HashMap::with_capacity(task_rows.len());
        let mut children: HashMap<Option<i64>, Vec<i64>> = HashMap::new();

        for row in task_rows {
            let deps: BTreeSet<i64> = dependencies
                .get(&row.id)
                .into_iter()
                .flatten()
                .copied()
                .filter(|dep| valid_ids.contains(dep) && *dep != row.id)
                .collect();

            let status = PlanNodeStatus::from_str(&row.status).unwrap_or(PlanNodeStatus::Pending);
            let execution_result = row
                .execution_result_json
                .as_deref()
                .and_then(|s| serde_json::from_str::<ExecutionResult>(s).ok());
            let context_sections = row
                .context_sections_json
                .as_deref()
                .and_then(|s| serde_json::from_str(s).ok())
                .unwrap_or_default();
            let context_meta = row
                .context_meta_json
                .as_deref()
                .and_then(|s| serde_json::from_str(s).ok());

            children.entry(row.parent_id).or_default().push(row.id);

            let node = PlanNode {
                id: row.id,
                parent_id: row.parent_id,
                position: row.position,
                depth: row.depth,
                path: row.path,
                name: row.name,
                instruction: row.instruction,
                metadata: serde_json::from_str(&row.metadata_json).unwrap_or(serde_json::json!({})),
                status,
                execution_result,
                context_combined: row.context_combined,
                context_sections,
                context_meta,
                context_updated_at: row.context_updated_at,
                dependencies: deps,
                created_at: row.created_at,
                updated_at: row.updated_at,
            };
            nodes.insert(node.id, node);
        }

        let mut roots = children.remove(&None).unwrap_or_default();
        roots.sort_by_key(|id| nodes.get(id).map(|n| n.position).unwrap_or(0));

        Self {
            plan: plan_row.into(),
            nodes,
            roots,
        }
    }

    pub fn get(&self, id: i64) -> Option<&PlanNode> {
        self.nodes.get(&id)
    }

    pub fn children_of(&self, parent_id: Option<i64>) -> Vec<&PlanNode> {
        let mut kids: Vec<&PlanNode> = self
            .nodes
            .values()
            .filter(|n| n.parent_id == parent_id)
            .collect();
        kids.sort_by_key(|n| n.position);
        kids
    }

    /// All descendant ids of `id`, including `id` itself (spec §4.2 `subgraph`).
    pub fn subtree_ids(&self, id: i64) -> Vec<i64> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            out.push(current);
            for child in self.children_of(Some(current)) {
                stack.push(child.id);
            }
        }
        out
    }

    /// True if `ancestor_candidate` is `node_id` or one of its ancestors —
    /// used to reject a `move_task` that would create a cycle (spec §3
    /// invariant "forest shape / no cycles").
    pub fn is_ancestor_or_self(&self, ancestor_candidate: i64, node_id: i64) -> bool {
        let mut current = Some(node_id);
        while let Some(id) = current {
            if id == ancestor_candidate {
                return true;
            }
            current = self.nodes.get(&id).and_then(|n| n.parent_id);
        }
        false
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn path_of(&self, id: i64) -> Option<&str> {
        self.nodes.get(&id).map(|n| n.path.as_str())
    }
}
