//! Prompt assembly for a chat turn (spec §4.6 step 1): branches on whether
//! the session is bound to a plan, and always embeds the exact JSON schema
//! of the expected reply.

use crate::agent::catalog::{allowed_action_names, BOUND_ONLY_ACTIONS, UNBOUND_ACTIONS};
use crate::db::models::PlanSummary;
use crate::plan::tree::PlanTree;
use std::collections::VecDeque;

const RESPONSE_SCHEMA: &str = r#"{
  "llm_reply": { "message": "<string>" },
  "actions": [
    { "kind": "plan_operation|task_operation|context_request|system_operation|tool_operation",
      "name": "<string>",
      "parameters": {},
      "blocking": true,
      "order": 1,
      "retry_policy": {"max_retries": 0, "backoff_sec": 0.0},
      "metadata": {} }
  ]
}"#;

fn catalog_text(bound: bool) -> String {
    let mut lines = vec!["Available actions:".to_string()];
    for (kind, name) in UNBOUND_ACTIONS {
        lines.push(format!("- {}:{}", kind.as_str(), name));
    }
    if bound {
        for (kind, name) in BOUND_ONLY_ACTIONS {
            lines.push(format!("- {}:{}", kind.as_str(), name));
        }
    }
    let _ = allowed_action_names(bound);
    lines.join("\n")
}

/// A depth- and node-capped textual outline of a bound plan (spec §4.6
/// "Bound session: outline of the bound plan (depth- and node-capped)").
pub fn build_plan_outline(tree: &PlanTree, max_depth: i64, max_nodes: usize) -> String {
    let mut lines = vec![format!("Plan #{}: {}", tree.plan.id, tree.plan.title)];
    let mut queue: VecDeque<i64> = tree.roots.iter().copied().collect();
    let mut emitted = 0usize;

    while let Some(id) = queue.pop_front() {
        if emitted >= max_nodes {
            lines.push(format!("... ({} more nodes omitted)", tree.node_count().saturating_sub(emitted)));
            break;
        }
        let Some(node) = tree.get(id) else { continue };
        if node.depth > max_depth {
            continue;
        }
        let indent = "  ".repeat(node.depth as usize);
        lines.push(format!("{indent}- [{}] {} ({})", node.id, node.name, node.status.as_str()));
        emitted += 1;
        for child in tree.children_of(Some(id)) {
            queue.push_back(child.id);
        }
    }
    lines.join("\n")
}

/// Build the system prompt for one turn (spec §4.6 step 1).
pub fn build_system_prompt(bound: bool, plan_outline: Option<&str>, existing_plans: Option<&[PlanSummary]>) -> String {
    let mut sections = Vec::new();

    if bound {
        sections.push("You are the planning assistant for a bound plan.".to_string());
        if let Some(outline) = plan_outline {
            sections.push(format!("Current plan outline:\n{outline}"));
        }
        sections.push(
            "Guidelines: check dependency validity before referencing tasks; only emit actions the user explicitly \
             asked for or that are clearly implied; prefer minimal tool use; `request_subgraph` must be the only \
             action in a turn if used."
                .to_string(),
        );
    } else {
        sections.push("You are the planning assistant. No plan is currently bound to this session.".to_string());
        if let Some(plans) = existing_plans {
            if !plans.is_empty() {
                let list = plans.iter().map(|p| format!("- #{}: {}", p.id, p.title)).collect::<Vec<_>>().join("\n");
                sections.push(format!("Existing plans the user may want to resume:\n{list}"));
            }
        }
        sections.push(
            "Guidelines: do not act unless the user explicitly asks to create or pick a plan; stay in \
             exploration/clarification mode otherwise."
                .to_string(),
        );
    }

    sections.push(catalog_text(bound));
    sections.push(format!(
        "Respond with JSON only, matching exactly this schema, and nothing else:\n{RESPONSE_SCHEMA}"
    ));
    sections.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbound_prompt_omits_bound_only_actions() {
        let prompt = build_system_prompt(false, None, None);
        assert!(!prompt.contains("execute_plan"));
        assert!(prompt.contains("create_plan"));
    }

    #[test]
    fn bound_prompt_includes_outline_and_full_catalog() {
        let prompt = build_system_prompt(true, Some("- [1] root (pending)"), None);
        assert!(prompt.contains("execute_plan"));
        assert!(prompt.contains("root"));
    }
}
