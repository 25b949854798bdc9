//! Prompt assembly for the decomposition LLM (spec §4.4 step b: target node,
//! truncated plan outline, constraints).

use crate::plan::tree::PlanTree;
use crate::plan::node::PlanNode;
use planloom_llm::Message;

const MAX_OUTLINE_NODES: usize = 40;
const MAX_OUTLINE_DEPTH: i64 = 3;

/// A depth- and node-capped text outline of the plan, used both here and by
/// the Structured Action Agent's bound-session prompt (spec §4.6 step 1).
pub fn plan_outline(tree: &PlanTree) -> String {
    let mut lines = Vec::new();
    let mut visited = 0usize;

    // Simple DFS in position order, capped by node count and depth; good
    // enough for an LLM-facing outline, not a canonical traversal.
    let mut ordered: Vec<&PlanNode> = Vec::new();
    fn walk<'a>(tree: &'a PlanTree, id: i64, depth: i64, out: &mut Vec<&'a PlanNode>) {
        if depth > MAX_OUTLINE_DEPTH || out.len() >= MAX_OUTLINE_NODES {
            return;
        }
        if let Some(node) = tree.get(id) {
            out.push(node);
            for child in tree.children_of(Some(id)) {
                walk(tree, child.id, depth + 1, out);
            }
        }
    }
    for root in &tree.roots {
        walk(tree, *root, 0, &mut ordered);
        if ordered.len() >= MAX_OUTLINE_NODES {
            break;
        }
    }

    for node in ordered.iter().take(MAX_OUTLINE_NODES) {
        visited += 1;
        let indent = "  ".repeat(node.depth.max(0) as usize);
        lines.push(format!("{indent}- [{}] {} ({})", node.id, node.name, node.status.as_str()));
    }
    if visited >= MAX_OUTLINE_NODES {
        lines.push("  ... (outline truncated)".to_string());
    }
    lines.join("\n")
}

pub fn build_decompose_prompt(
    tree: &PlanTree,
    target: &PlanNode,
    max_children: usize,
) -> Vec<Message> {
    let system = Message::system(
        "You are a planning assistant that expands a single task into an ordered \
         list of child subtasks. Respond with JSON only, matching exactly: \
         {\"target_node_id\": string, \"mode\": string, \"should_stop\": bool, \
         \"reason\": string?, \"children\": [{\"name\": string, \"instruction\": \
         string?, \"dependencies\": [string]?, \"context\": string?, \"leaf\": bool?}]}. \
         Do not include any prose outside the JSON object.",
    );

    let outline = plan_outline(tree);
    let human = Message::human(format!(
        "Plan outline (depth- and node-capped):\n{outline}\n\n\
         Target node to expand:\n- id: {}\n- name: {}\n- instruction: {}\n- path: {}\n\n\
         Produce at most {max_children} children. Set should_stop=true with a reason \
         if this node needs no further decomposition.",
        target.id,
        target.name,
        target.instruction.as_deref().unwrap_or("(none)"),
        target.path,
    ));

    vec![system, human]
}
