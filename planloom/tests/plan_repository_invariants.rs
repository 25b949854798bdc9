//! Plan Repository invariants (spec §8 properties 1-5).

mod support;

use planloom::plan::repository::{NewTask, TaskUpdate, UpsertNode};
use planloom::plan::{Anchor, PlanNodeStatus};
use support::Harness;

fn new_task(parent: Option<i64>, name: &str) -> NewTask {
    NewTask {
        parent_id: parent,
        name: name.to_string(),
        metadata: serde_json::json!({}),
        ..Default::default()
    }
}

/// Property 1: sibling positions are always a contiguous 0..n run after
/// insert, move, and delete.
#[tokio::test]
async fn sibling_positions_stay_contiguous_through_mutation() {
    let h = Harness::new().await;
    let plan = h.plans.create_plan("root plan", None, serde_json::json!({})).await.unwrap();

    let a = h.plans.create_task(plan.id, new_task(None, "a")).await.unwrap();
    let b = h.plans.create_task(plan.id, new_task(None, "b")).await.unwrap();
    let c = h.plans.create_task(plan.id, new_task(None, "c")).await.unwrap();
    assert_positions_contiguous(&h, plan.id, None).await;

    // insert "d" before "b"
    let mut new_d = new_task(None, "d");
    new_d.anchor = Some(Anchor::Before { sibling_id: b.id });
    h.plans.create_task(plan.id, new_d).await.unwrap();
    assert_positions_contiguous(&h, plan.id, None).await;

    // move "a" to be a child of "c"
    h.plans.move_task(plan.id, a.id, Some(c.id), None, None).await.unwrap();
    assert_positions_contiguous(&h, plan.id, None).await;
    assert_positions_contiguous(&h, plan.id, Some(c.id)).await;

    // delete "b"
    h.plans.delete_task(plan.id, b.id).await.unwrap();
    assert_positions_contiguous(&h, plan.id, None).await;
}

async fn assert_positions_contiguous(h: &Harness, plan_id: i64, parent_id: Option<i64>) {
    let tree = h.plans.get_plan_tree(plan_id).await.unwrap();
    let children = tree.children_of(parent_id);
    let positions: Vec<i64> = children.iter().map(|n| n.position).collect();
    let expected: Vec<i64> = (0..positions.len() as i64).collect();
    assert_eq!(positions, expected, "sibling positions under {parent_id:?} are not contiguous");
}

/// Property 2: dependencies referencing ids outside the plan, or a task's
/// own id, are silently dropped rather than rejected.
#[tokio::test]
async fn invalid_dependencies_are_dropped_not_rejected() {
    let h = Harness::new().await;
    let plan = h.plans.create_plan("deps", None, serde_json::json!({})).await.unwrap();
    let a = h.plans.create_task(plan.id, new_task(None, "a")).await.unwrap();

    let mut with_bad_dep = new_task(None, "b");
    with_bad_dep.dependencies = vec![a.id, a.id + 9999, 0];
    let b = h.plans.create_task(plan.id, with_bad_dep).await.unwrap();

    let tree = h.plans.get_plan_tree(plan.id).await.unwrap();
    let node = tree.get(b.id).unwrap();
    assert_eq!(node.dependencies.iter().copied().collect::<Vec<_>>(), vec![a.id]);

    // Same via update_task.
    let updated = h
        .plans
        .update_task(
            plan.id,
            b.id,
            TaskUpdate {
                dependencies: Some(vec![a.id, 424242]),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.dependencies.iter().copied().collect::<Vec<_>>(), vec![a.id]);
}

/// Property 3: `move_task` rejects a move that would create a cycle, and
/// performs no mutation when it does.
#[tokio::test]
async fn move_task_rejects_cycles_without_mutating() {
    let h = Harness::new().await;
    let plan = h.plans.create_plan("cycles", None, serde_json::json!({})).await.unwrap();
    let parent = h.plans.create_task(plan.id, new_task(None, "parent")).await.unwrap();
    let child = h.plans.create_task(plan.id, new_task(Some(parent.id), "child")).await.unwrap();

    let before = h.plans.get_plan_tree(plan.id).await.unwrap();

    // Moving parent under its own child would create a cycle.
    let err = h.plans.move_task(plan.id, parent.id, Some(child.id), None, None).await;
    assert!(err.is_err());

    // Moving a node under itself is likewise rejected.
    let err_self = h.plans.move_task(plan.id, parent.id, Some(parent.id), None, None).await;
    assert!(err_self.is_err());

    let after = h.plans.get_plan_tree(plan.id).await.unwrap();
    assert_eq!(before.get(parent.id).unwrap().parent_id, after.get(parent.id).unwrap().parent_id);
    assert_eq!(before.get(child.id).unwrap().parent_id, after.get(child.id).unwrap().parent_id);
}

/// Property 4: a freshly created plan's tree matches what was asked for,
/// modulo the ids the repository assigns.
#[tokio::test]
async fn created_plan_tree_matches_requested_shape() {
    let h = Harness::new().await;
    let plan = h.plans.create_plan("shape", Some("a description"), serde_json::json!({"k": "v"})).await.unwrap();

    let root = h.plans.create_task(plan.id, new_task(None, "root")).await.unwrap();
    let child_a = h.plans.create_task(plan.id, new_task(Some(root.id), "child-a")).await.unwrap();
    let _child_b = h.plans.create_task(plan.id, new_task(Some(root.id), "child-b")).await.unwrap();
    let _grandchild = h.plans.create_task(plan.id, new_task(Some(child_a.id), "grandchild")).await.unwrap();

    let tree = h.plans.get_plan_tree(plan.id).await.unwrap();
    assert_eq!(tree.plan.title, "shape");
    assert_eq!(tree.plan.description.as_deref(), Some("a description"));
    assert_eq!(tree.roots, vec![root.id]);

    let root_children: Vec<&str> = tree.children_of(Some(root.id)).iter().map(|n| n.name.as_str()).collect();
    assert_eq!(root_children, vec!["child-a", "child-b"]);

    let grandchildren: Vec<&str> = tree.children_of(Some(child_a.id)).iter().map(|n| n.name.as_str()).collect();
    assert_eq!(grandchildren, vec!["grandchild"]);

    for node in tree.nodes.values() {
        assert_eq!(node.status, PlanNodeStatus::Pending);
    }
}

/// Property 5: `upsert_plan_tree` is idempotent — re-running with the same
/// `id`s updates in place rather than duplicating rows.
#[tokio::test]
async fn upsert_plan_tree_is_idempotent() {
    let h = Harness::new().await;
    let plan = h.plans.create_plan("upsert", None, serde_json::json!({})).await.unwrap();

    let first_batch = vec![
        UpsertNode {
            id: None,
            temp_id: Some("t1".to_string()),
            parent_id: None,
            parent_temp_id: None,
            name: "alpha".to_string(),
            instruction: None,
            metadata: serde_json::json!({}),
            dependencies: vec![],
        },
        UpsertNode {
            id: None,
            temp_id: Some("t2".to_string()),
            parent_id: None,
            parent_temp_id: Some("t1".to_string()),
            name: "beta".to_string(),
            instruction: None,
            metadata: serde_json::json!({}),
            dependencies: vec![],
        },
    ];
    let created = h.plans.upsert_plan_tree(plan.id, first_batch, Some("first batch")).await.unwrap();
    assert_eq!(created.len(), 2);
    let alpha_id = created[0].id;
    let beta_id = created[1].id;

    let tree_after_first = h.plans.get_plan_tree(plan.id).await.unwrap();
    assert_eq!(tree_after_first.node_count(), 2);

    // Re-run referencing the same real ids: should update, not duplicate.
    let second_batch = vec![
        UpsertNode {
            id: Some(alpha_id),
            temp_id: None,
            parent_id: None,
            parent_temp_id: None,
            name: "alpha-renamed".to_string(),
            instruction: Some("now with instructions".to_string()),
            metadata: serde_json::json!({}),
            dependencies: vec![],
        },
        UpsertNode {
            id: Some(beta_id),
            temp_id: None,
            parent_id: None,
            parent_temp_id: None,
            name: "beta".to_string(),
            instruction: None,
            metadata: serde_json::json!({}),
            dependencies: vec![alpha_id],
        },
    ];
    h.plans.upsert_plan_tree(plan.id, second_batch, None).await.unwrap();

    let tree_after_second = h.plans.get_plan_tree(plan.id).await.unwrap();
    assert_eq!(tree_after_second.node_count(), 2, "idempotent upsert must not duplicate rows");
    assert_eq!(tree_after_second.get(alpha_id).unwrap().name, "alpha-renamed");

    let snapshots = h.plans.list_snapshots(plan.id).await.unwrap();
    assert_eq!(snapshots.len(), 1, "only the noted upsert should have recorded a snapshot");
    assert_eq!(snapshots[0].note.as_deref(), Some("first batch"));

    assert_eq!(
        tree_after_second.get(beta_id).unwrap().dependencies.iter().copied().collect::<Vec<_>>(),
        vec![alpha_id]
    );
}
