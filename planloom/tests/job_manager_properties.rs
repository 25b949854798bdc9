//! Job Manager properties (spec §8 properties 15-16).

mod support;

use planloom::db::models::{JobStats, JobType};
use planloom::jobs::stream::StreamEvent;
use support::Harness;

/// Property 15: log sequences are strictly increasing with no gaps, for both
/// the log stream and the action-log stream, independently per job.
#[tokio::test]
async fn log_and_action_log_sequences_are_gapless() {
    let h = Harness::new().await;
    let job = h.jobs.create(JobType::ChatAction, None, None, None, serde_json::json!({})).await.unwrap();

    for i in 0..5 {
        h.jobs.append_log(&job.id, "info", &format!("step {i}"), None).await.unwrap();
    }
    for i in 0..3 {
        h.jobs
            .append_action_log(None, &job.id, None, "tool_call", &format!("action-{i}"), "completed", true, None, None)
            .await
            .unwrap();
    }

    let logs = h.jobs.logs_since(&job.id, 0).await.unwrap();
    let sequences: Vec<i64> = logs.iter().map(|l| l.sequence).collect();
    assert_eq!(sequences, vec![1, 2, 3, 4, 5]);

    let actions = h.jobs.action_logs(&job.id).await.unwrap();
    let action_sequences: Vec<i64> = actions.iter().map(|a| a.sequence).collect();
    assert_eq!(action_sequences, vec![1, 2, 3]);
}

/// A second, unrelated job's sequence starts fresh at 1 rather than
/// continuing the first job's counter (sequences are per-job, not global).
#[tokio::test]
async fn sequences_are_independent_per_job() {
    let h = Harness::new().await;
    let job_a = h.jobs.create(JobType::ChatAction, None, None, None, serde_json::json!({})).await.unwrap();
    let job_b = h.jobs.create(JobType::ChatAction, None, None, None, serde_json::json!({})).await.unwrap();

    h.jobs.append_log(&job_a.id, "info", "a1", None).await.unwrap();
    h.jobs.append_log(&job_a.id, "info", "a2", None).await.unwrap();
    h.jobs.append_log(&job_b.id, "info", "b1", None).await.unwrap();

    let logs_a = h.jobs.logs_since(&job_a.id, 0).await.unwrap();
    let logs_b = h.jobs.logs_since(&job_b.id, 0).await.unwrap();
    assert_eq!(logs_a.iter().map(|l| l.sequence).collect::<Vec<_>>(), vec![1, 2]);
    assert_eq!(logs_b.iter().map(|l| l.sequence).collect::<Vec<_>>(), vec![1]);
}

/// Property 16: a subscriber first drains a snapshot (via `logs_since`), then
/// observes live log events, then a terminal marker once the job finishes;
/// nothing further arrives after that.
#[tokio::test]
async fn subscribe_emits_snapshot_then_live_events_then_terminal() {
    let h = Harness::new().await;
    let job = h.jobs.create(JobType::PlanExecute, None, None, None, serde_json::json!({})).await.unwrap();

    h.jobs.append_log(&job.id, "info", "before subscribing", None).await.unwrap();
    let snapshot = h.jobs.logs_since(&job.id, 0).await.unwrap();
    assert_eq!(snapshot.len(), 1);
    let cursor = snapshot.last().unwrap().sequence;

    let mut rx = h.jobs.subscribe(&job.id).await;

    h.jobs.append_log(&job.id, "info", "after subscribing", None).await.unwrap();
    let live = rx.recv().await.unwrap();
    match live {
        StreamEvent::Log(row) => {
            assert!(row.sequence > cursor, "live event must be newer than the snapshot cursor");
            assert_eq!(row.message, "after subscribing");
        }
        other => panic!("expected a log event, got {other:?}"),
    }

    h.jobs.mark_success(&job.id, None, JobStats::default()).await.unwrap();
    let terminal = rx.recv().await.unwrap();
    assert!(matches!(terminal, StreamEvent::Terminal(_)));
}
