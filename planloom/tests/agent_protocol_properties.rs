//! Structured Action Agent protocol properties (spec §8 properties 6-9).

mod support;

use planloom::agent::tools::NullToolInvoker;
use planloom::agent::{handle_turn, AgentConfig, AgentDeps, AgentError};
use planloom::decomposer::DecomposerConfig;
use planloom::executor::ExecutorConfig;
use std::sync::Arc;
use support::scripted_model::ScriptedModel;
use support::Harness;

fn deps(h: &Harness, conversation_reply: &str) -> AgentDeps {
    let conversation_llm: Arc<dyn planloom_llm::ChatModel> = Arc::new(ScriptedModel::new(vec![conversation_reply]));
    let decomposer_llm: Arc<dyn planloom_llm::ChatModel> = Arc::new(ScriptedModel::new(vec!["{}"]));
    let executor_llm: Arc<dyn planloom_llm::ChatModel> = Arc::new(ScriptedModel::new(vec!["{}"]));
    AgentDeps {
        plans: Arc::clone(&h.plans),
        sessions: Arc::clone(&h.sessions),
        jobs: Arc::clone(&h.jobs),
        conversation_llm,
        decomposer_llm,
        executor_llm,
        tool_invoker: Arc::new(NullToolInvoker),
        decomposer_config: DecomposerConfig::default(),
        executor_config: ExecutorConfig::default(),
    }
}

/// Property 6: for a schema-valid reply, exactly one `AgentStep` is produced
/// per action, ordered ascending by the action's `order` field (not the
/// order the LLM happened to list them in).
#[tokio::test]
async fn one_step_per_action_in_ascending_order() {
    let h = Harness::new().await;
    let reply = r#"{"llm_reply":{"message":"done"},"actions":[
        {"kind":"plan_operation","name":"list_plans","parameters":{},"order":2},
        {"kind":"system_operation","name":"help","parameters":{},"order":1}
    ]}"#;
    let deps = deps(&h, reply);
    let config = AgentConfig::default();

    let result = handle_turn(&deps, &config, "session-1", "hello").await.unwrap();

    assert_eq!(result.actions.len(), 2);
    assert_eq!(result.actions[0].name, "help");
    assert_eq!(result.actions[1].name, "list_plans");
    assert!(result.actions[0].success && result.actions[1].success);
}

/// Property 7: a schema-invalid reply yields zero actions and a non-empty
/// error in the turn's metadata; the raw reply's message is still surfaced
/// to the user rather than discarded.
#[tokio::test]
async fn schema_invalid_reply_yields_no_actions_and_an_error() {
    let h = Harness::new().await;
    // `actions` entries missing the required `order` field fail schema parsing.
    let reply = r#"{"llm_reply":{"message":"oops"},"actions":[{"kind":"system_operation","name":"help","parameters":{}}]}"#;
    let deps = deps(&h, reply);
    let config = AgentConfig::default();

    let result = handle_turn(&deps, &config, "session-2", "hello").await.unwrap();

    assert!(result.actions.is_empty());
    assert!(!result.metadata.errors.is_empty());
    assert_eq!(result.response, "oops");
}

/// Property 8: a turn combining `request_subgraph` with any other action is
/// rejected wholesale at parse time (schema-invalid), not partially executed.
#[tokio::test]
async fn request_subgraph_rejects_turns_with_additional_actions() {
    let h = Harness::new().await;
    let reply = r#"{"llm_reply":{"message":"checking"},"actions":[
        {"kind":"context_request","name":"request_subgraph","parameters":{"task_id":1},"order":1},
        {"kind":"system_operation","name":"help","parameters":{},"order":2}
    ]}"#;
    let deps = deps(&h, reply);
    let config = AgentConfig::default();

    let result = handle_turn(&deps, &config, "session-3", "hello").await.unwrap();

    assert!(result.actions.is_empty(), "the whole turn must be rejected, not partially run");
    assert!(!result.metadata.errors.is_empty());
}

/// Spec §4.6: "subsequent blocking actions are skipped; non-blocking actions
/// still run" once an earlier blocking action has failed.
#[tokio::test]
async fn non_blocking_action_still_runs_after_a_blocking_failure() {
    let h = Harness::new().await;
    let reply = r#"{"llm_reply":{"message":"mixed batch"},"actions":[
        {"kind":"plan_operation","name":"delete_plan","parameters":{"plan_id":999999},"order":1,"blocking":true},
        {"kind":"system_operation","name":"help","parameters":{},"order":2,"blocking":false},
        {"kind":"plan_operation","name":"list_plans","parameters":{},"order":3,"blocking":true}
    ]}"#;
    let deps = deps(&h, reply);
    let config = AgentConfig::default();

    let result = handle_turn(&deps, &config, "session-5", "hello").await.unwrap();

    assert_eq!(result.actions.len(), 3);
    assert!(!result.actions[0].success, "the blocking delete_plan must fail (plan doesn't exist)");
    assert!(result.actions[1].success, "a non-blocking action must still run after a blocking failure");
    assert_eq!(result.actions[1].name, "help");
    assert!(!result.actions[2].success, "a later blocking action must be skipped");
    assert_eq!(result.actions[2].message.as_deref(), Some("skipped: a preceding blocking action failed"));
}

/// Property 9: an unbound session rejects a bound-only action with
/// `PlanNotBound`, surfaced as a failed step rather than a panic or silent
/// no-op.
#[tokio::test]
async fn unbound_session_rejects_bound_only_action() {
    let h = Harness::new().await;
    let reply = r#"{"llm_reply":{"message":"let's run it"},"actions":[
        {"kind":"plan_operation","name":"execute_plan","parameters":{"plan_id":1},"order":1}
    ]}"#;
    let deps = deps(&h, reply);
    let config = AgentConfig::default();

    let result = handle_turn(&deps, &config, "session-4", "run the plan").await.unwrap();

    assert_eq!(result.actions.len(), 1);
    assert!(!result.actions[0].success);
    let message = result.actions[0].message.as_deref().unwrap_or("");
    assert_eq!(message, AgentError::PlanNotBound.to_string());
    assert!(result.metadata.errors.iter().any(|e| e.contains("bound")));
}
