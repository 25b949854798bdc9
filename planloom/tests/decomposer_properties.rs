//! BFS decomposer properties (spec §8 properties 10-12).

mod support;

use planloom::decomposer::{decompose, DecomposeMode, DecomposerConfig, StoppedReason};
use planloom::db::models::JobType;
use planloom::plan::repository::NewTask;
use std::sync::Arc;
use support::scripted_model::ScriptedModel;
use support::Harness;

async fn seed_root(h: &Harness, plan_id: i64) -> i64 {
    h.plans
        .create_task(
            plan_id,
            NewTask {
                parent_id: None,
                name: "root".to_string(),
                metadata: serde_json::json!({}),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .id
}

/// Property 10: total nodes created across a run never exceeds the
/// configured node budget, even when the LLM keeps proposing more children.
#[tokio::test]
async fn nodes_created_never_exceeds_budget() {
    let h = Harness::new().await;
    let plan = h.plans.create_plan("budget", None, serde_json::json!({})).await.unwrap();
    seed_root(&h, plan.id).await;

    let always_five_children = r#"{"target_node_id":"x","mode":"plan_bfs","should_stop":false,"children":[
        {"name":"c1","leaf":true},{"name":"c2","leaf":true},{"name":"c3","leaf":true},
        {"name":"c4","leaf":true},{"name":"c5","leaf":true}
    ]}"#;
    let model: Arc<dyn planloom_llm::ChatModel> = Arc::new(ScriptedModel::new(vec![always_five_children]));

    let job = h.jobs.create(JobType::PlanDecompose, Some(plan.id), None, None, serde_json::json!({})).await.unwrap();

    let config = DecomposerConfig {
        total_node_budget: 3,
        max_children: 8,
        ..Default::default()
    };

    let outcome = decompose(&h.plans, &h.jobs, &job.id, model, plan.id, DecomposeMode::PlanBfs, None, config.clone())
        .await
        .unwrap();

    assert!(outcome.nodes_created as usize <= config.total_node_budget, "created {} nodes, budget was {}", outcome.nodes_created, config.total_node_budget);
    assert_eq!(outcome.stopped_reason, Some(StoppedReason::NodeBudget));

    let tree = h.plans.get_plan_tree(plan.id).await.unwrap();
    // root + whatever fit under budget
    assert!(tree.node_count() as u64 <= config.total_node_budget as u64 + 1);
}

/// Property 11: no node created by a run sits deeper than `max_depth` below
/// the decomposition's starting point.
#[tokio::test]
async fn new_nodes_never_exceed_max_depth() {
    let h = Harness::new().await;
    let plan = h.plans.create_plan("depth", None, serde_json::json!({})).await.unwrap();
    seed_root(&h, plan.id).await;

    let one_non_leaf_child = r#"{"target_node_id":"x","mode":"plan_bfs","should_stop":false,"children":[
        {"name":"child","leaf":false}
    ]}"#;
    let model: Arc<dyn planloom_llm::ChatModel> = Arc::new(ScriptedModel::new(vec![one_non_leaf_child]));

    let job = h.jobs.create(JobType::PlanDecompose, Some(plan.id), None, None, serde_json::json!({})).await.unwrap();

    let config = DecomposerConfig {
        max_depth: 2,
        total_node_budget: 50,
        ..Default::default()
    };

    let outcome = decompose(&h.plans, &h.jobs, &job.id, model, plan.id, DecomposeMode::PlanBfs, None, config.clone())
        .await
        .unwrap();

    assert_eq!(outcome.stopped_reason, Some(StoppedReason::DepthLimit));

    let tree = h.plans.get_plan_tree(plan.id).await.unwrap();
    for node in tree.nodes.values() {
        assert!(node.depth <= config.max_depth, "node {} at depth {} exceeds max_depth {}", node.id, node.depth, config.max_depth);
    }
}

/// Property 11 (`SingleNode` mode): the depth budget is measured relative to
/// the decomposition target, not the target's absolute depth in the tree —
/// decomposing an already-deep node still gets the full `max_depth` worth of
/// new levels below it.
#[tokio::test]
async fn single_node_mode_measures_depth_relative_to_target() {
    let h = Harness::new().await;
    let plan = h.plans.create_plan("single-node-depth", None, serde_json::json!({})).await.unwrap();
    let root_id = seed_root(&h, plan.id).await;
    let child_id = h
        .plans
        .create_task(plan.id, NewTask { parent_id: Some(root_id), name: "child".to_string(), metadata: serde_json::json!({}), ..Default::default() })
        .await
        .unwrap()
        .id;
    let grandchild_id = h
        .plans
        .create_task(plan.id, NewTask { parent_id: Some(child_id), name: "grandchild".to_string(), metadata: serde_json::json!({}), ..Default::default() })
        .await
        .unwrap()
        .id;

    let tree_before = h.plans.get_plan_tree(plan.id).await.unwrap();
    let target_depth = tree_before.get(grandchild_id).unwrap().depth;
    assert_eq!(target_depth, 2, "grandchild should sit three levels deep (root=0, child=1, grandchild=2)");

    let one_non_leaf_child = r#"{"target_node_id":"x","mode":"single_node","should_stop":false,"children":[
        {"name":"child","leaf":false}
    ]}"#;
    let model: Arc<dyn planloom_llm::ChatModel> = Arc::new(ScriptedModel::new(vec![one_non_leaf_child]));

    let job = h.jobs.create(JobType::PlanDecompose, Some(plan.id), None, None, serde_json::json!({})).await.unwrap();

    let config = DecomposerConfig {
        max_depth: 2,
        total_node_budget: 50,
        ..Default::default()
    };

    let outcome = decompose(&h.plans, &h.jobs, &job.id, model, plan.id, DecomposeMode::SingleNode, Some(grandchild_id), config.clone())
        .await
        .unwrap();

    assert_eq!(outcome.stopped_reason, Some(StoppedReason::DepthLimit));

    let tree = h.plans.get_plan_tree(plan.id).await.unwrap();
    let max_new_depth = tree.nodes.values().map(|n| n.depth).max().unwrap();
    assert_eq!(
        max_new_depth,
        target_depth + config.max_depth,
        "depth budget must be measured from the decomposition target, not its absolute tree depth"
    );
}

/// Property 12: an empty `children` response with `stop_on_empty=true`
/// drains the queue and reports `StoppedReason::StopOnEmpty`.
#[tokio::test]
async fn empty_children_with_stop_on_empty_drains_queue() {
    let h = Harness::new().await;
    let plan = h.plans.create_plan("stop-empty", None, serde_json::json!({})).await.unwrap();
    let root_id = seed_root(&h, plan.id).await;
    // a second root so the queue would otherwise have more work to do
    h.plans
        .create_task(plan.id, NewTask { parent_id: None, name: "root2".to_string(), metadata: serde_json::json!({}), ..Default::default() })
        .await
        .unwrap();

    let empty_response = r#"{"target_node_id":"x","mode":"plan_bfs","should_stop":false,"children":[]}"#;
    let model: Arc<dyn planloom_llm::ChatModel> = Arc::new(ScriptedModel::new(vec![empty_response]));

    let job = h.jobs.create(JobType::PlanDecompose, Some(plan.id), None, None, serde_json::json!({})).await.unwrap();

    let config = DecomposerConfig { stop_on_empty: true, ..Default::default() };

    let outcome = decompose(&h.plans, &h.jobs, &job.id, model, plan.id, DecomposeMode::PlanBfs, None, config)
        .await
        .unwrap();

    assert_eq!(outcome.stopped_reason, Some(StoppedReason::StopOnEmpty));
    assert_eq!(outcome.nodes_created, 0);

    // Only the two hand-created roots exist; the second root was never
    // visited because the queue was drained after the first.
    let tree = h.plans.get_plan_tree(plan.id).await.unwrap();
    assert_eq!(tree.node_count(), 2);
    assert!(tree.get(root_id).is_some());
}
