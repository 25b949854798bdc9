//! Action catalog per session-binding state (spec §4.6 step 1, §9 "Prompt
//! branching": "the catalog and guidelines [must be kept] in lockstep with
//! the backend's enforcement").

use crate::agent::error::{AgentError, AgentResult};
use crate::agent::schema::ActionKind;

/// Actions usable regardless of binding (spec §4.6 "Unbound session").
pub const UNBOUND_ACTIONS: &[(ActionKind, &str)] = &[
    (ActionKind::PlanOperation, "create_plan"),
    (ActionKind::PlanOperation, "list_plans"),
    (ActionKind::SystemOperation, "help"),
    (ActionKind::ToolOperation, "web_search"),
    (ActionKind::ToolOperation, "graph_rag"),
];

/// Additional actions available once a session is bound to a plan (spec
/// §4.6 "Bound session").
pub const BOUND_ONLY_ACTIONS: &[(ActionKind, &str)] = &[
    (ActionKind::PlanOperation, "execute_plan"),
    (ActionKind::PlanOperation, "delete_plan"),
    (ActionKind::TaskOperation, "create_task"),
    (ActionKind::TaskOperation, "update_task"),
    (ActionKind::TaskOperation, "update_task_instruction"),
    (ActionKind::TaskOperation, "move_task"),
    (ActionKind::TaskOperation, "delete_task"),
    (ActionKind::TaskOperation, "show_tasks"),
    (ActionKind::TaskOperation, "query_status"),
    (ActionKind::TaskOperation, "rerun_task"),
    (ActionKind::TaskOperation, "decompose_task"),
    (ActionKind::ContextRequest, "request_subgraph"),
];

pub fn allowed_action_names(bound: bool) -> Vec<(ActionKind, &'static str)> {
    let mut names: Vec<(ActionKind, &'static str)> = UNBOUND_ACTIONS.to_vec();
    if bound {
        names.extend_from_slice(BOUND_ONLY_ACTIONS);
    }
    names
}

/// Reject an action unknown to the catalog outright, or one that requires a
/// bound plan when none is bound (spec §8 property 9: "unbound sessions
/// never execute an action in {execute_plan, delete_plan, create_task,
/// update_task, move_task, delete_task, rerun_task, decompose_task}").
pub fn validate_action(kind: ActionKind, name: &str, bound: bool) -> AgentResult<()> {
    if allowed_action_names(bound).iter().any(|(k, n)| *k == kind && *n == name) {
        return Ok(());
    }
    if !bound && allowed_action_names(true).iter().any(|(k, n)| *k == kind && *n == name) {
        return Err(AgentError::PlanNotBound);
    }
    Err(AgentError::ValidationError(format!("unknown action: {}:{}", kind.as_str(), name)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbound_session_rejects_execute_plan() {
        let err = validate_action(ActionKind::PlanOperation, "execute_plan", false).unwrap_err();
        assert!(matches!(err, AgentError::PlanNotBound));
    }

    #[test]
    fn unbound_session_allows_create_plan() {
        assert!(validate_action(ActionKind::PlanOperation, "create_plan", false).is_ok());
    }

    #[test]
    fn unknown_action_name_is_rejected() {
        let err = validate_action(ActionKind::PlanOperation, "nuke_everything", true).unwrap_err();
        assert!(matches!(err, AgentError::ValidationError(_)));
    }
}
