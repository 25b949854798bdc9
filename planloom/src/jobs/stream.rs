//! Per-job log broadcaster (spec §5 "per-job single-producer multi-subscriber
//! log stream"; §4.3 `subscribe`: snapshot, then live events, then a
//! terminal marker once the job finishes). Slow subscribers fall behind and
//! simply miss events rather than block the producer (spec §5 "the
//! broadcaster drops events for slow subscribers"); callers reconnect with a
//! cursor to pick up anything they missed (spec §8 scenario E).

use crate::db::models::{JobLogRow, JobStatus};
use std::collections::HashMap;
use tokio::sync::{broadcast, Mutex};

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub enum StreamEvent {
    Log(JobLogRow),
    Terminal(JobStatus),
}

/// Registry of live broadcast channels, one per in-flight job. Channels are
/// created lazily on first log/subscribe and dropped once the job manager
/// forgets them (it does not proactively clean these up; a channel with no
/// subscribers and no sender activity is simply garbage once the `JobManager`
/// holding the `Sender` is dropped).
#[derive(Default)]
pub struct JobBroadcastRegistry {
    channels: Mutex<HashMap<String, broadcast::Sender<StreamEvent>>>,
}

impl JobBroadcastRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    async fn sender(&self, job_id: &str) -> broadcast::Sender<StreamEvent> {
        let mut channels = self.channels.lock().await;
        channels
            .entry(job_id.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }

    pub async fn publish(&self, job_id: &str, event: StreamEvent) {
        let sender = self.sender(job_id).await;
        // No receivers is a normal, common case (nobody is watching this job
        // right now); the send error is not worth surfacing.
        let _ = sender.send(event);
    }

    pub async fn subscribe(&self, job_id: &str) -> broadcast::Receiver<StreamEvent> {
        self.sender(job_id).await.subscribe()
    }

    pub async fn forget(&self, job_id: &str) {
        self.channels.lock().await.remove(job_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn published_events_reach_subscriber() {
        let registry = JobBroadcastRegistry::new();
        let mut rx = registry.subscribe("job-1").await;
        registry.publish("job-1", StreamEvent::Terminal(JobStatus::Succeeded)).await;

        let event = rx.recv().await.unwrap();
        assert!(matches!(event, StreamEvent::Terminal(JobStatus::Succeeded)));
    }

    #[tokio::test]
    async fn subscribers_on_different_jobs_are_isolated() {
        let registry = JobBroadcastRegistry::new();
        let mut rx_a = registry.subscribe("job-a").await;
        let _rx_b = registry.subscribe("job-b").await;

        registry.publish("job-a", StreamEvent::Terminal(JobStatus::Failed)).await;
        let event = rx_a.recv().await.unwrap();
        assert!(matches!(event, StreamEvent::Terminal(JobStatus::Failed)));
    }
}
