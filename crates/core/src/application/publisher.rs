// Progress Publisher - push-channel fan-out of job state changes
// One forwarding task per subscriber, fed by the registry's watch channel

use crate::application::registry::JobRegistry;
use crate::domain::{Job, JobId, JobStatus};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

/// Buffered events per subscriber before backpressure
const CHANNEL_CAPACITY: usize = 16;

/// Wire payload for progress and terminal events
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProgressPayload {
    pub job_id: JobId,
    pub status: JobStatus,
    pub progress: i32,
    pub files_completed: i32,
    pub total_files: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProgressPayload {
    fn from_job(job: &Job) -> Self {
        Self {
            job_id: job.id.clone(),
            status: job.status,
            progress: job.progress,
            files_completed: job.files_completed,
            total_files: job.total_files,
            result_url: job.result_url.clone(),
            error: job.error.clone(),
        }
    }
}

/// One push-channel event
///
/// Serialized form: `{"event": "...", "data": {...}}`. Terminal events close
/// the stream; `notFound` is the only event for an unknown job id.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ProgressEvent {
    Progress(ProgressPayload),
    Complete(ProgressPayload),
    Error(ProgressPayload),
    NotFound {
        #[serde(rename = "jobId")]
        job_id: JobId,
    },
}

impl ProgressEvent {
    fn for_job(job: &Job) -> Self {
        let payload = ProgressPayload::from_job(job);
        match job.status {
            JobStatus::Completed => ProgressEvent::Complete(payload),
            JobStatus::Failed => ProgressEvent::Error(payload),
            _ => ProgressEvent::Progress(payload),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProgressEvent::Complete(_) | ProgressEvent::Error(_) | ProgressEvent::NotFound { .. }
        )
    }
}

/// Fans job state changes out to push-channel subscribers.
///
/// Subscribing at any point in the job's life yields the current snapshot
/// first, then every subsequent change, closing after the terminal event.
/// The pull endpoint and this stream read the same registry record, so the
/// two can never disagree.
pub struct ProgressPublisher {
    registry: Arc<JobRegistry>,
}

impl ProgressPublisher {
    pub fn new(registry: Arc<JobRegistry>) -> Self {
        Self { registry }
    }

    /// Open a per-subscriber event stream for one job.
    ///
    /// The receiver yields at least one event; the last one is always
    /// terminal. The forwarding task stops when the subscriber hangs up.
    pub fn subscribe(&self, job_id: JobId) -> mpsc::Receiver<ProgressEvent> {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let registry = Arc::clone(&self.registry);
        tokio::spawn(async move {
            forward(registry, job_id, tx).await;
        });
        rx
    }
}

async fn forward(registry: Arc<JobRegistry>, job_id: JobId, tx: mpsc::Sender<ProgressEvent>) {
    let mut rx: watch::Receiver<Job> = match registry.watch(&job_id).await {
        Ok(Some(rx)) => rx,
        Ok(None) => {
            let _ = tx.send(ProgressEvent::NotFound { job_id }).await;
            return;
        }
        Err(e) => {
            warn!(job_id = %job_id, error = %e, "Subscription lookup failed");
            let _ = tx.send(ProgressEvent::NotFound { job_id }).await;
            return;
        }
    };

    // current snapshot first, so late subscribers see terminal state too
    let snapshot = rx.borrow_and_update().clone();
    let mut last = (snapshot.status, snapshot.progress);
    let event = ProgressEvent::for_job(&snapshot);
    let terminal = event.is_terminal();
    if tx.send(event).await.is_err() || terminal {
        return;
    }

    loop {
        if rx.changed().await.is_err() {
            // registry entry dropped; nothing more will ever arrive
            debug!(job_id = %job_id, "Watch channel closed");
            break;
        }
        let job = rx.borrow_and_update().clone();

        // emit only on observable change
        if (job.status, job.progress) == last {
            continue;
        }
        last = (job.status, job.progress);

        let event = ProgressEvent::for_job(&job);
        let terminal = event.is_terminal();
        if tx.send(event).await.is_err() || terminal {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::JobUpdate;
    use crate::port::job_repository::mocks::MemoryJobRepository;
    use crate::port::time_provider::mocks::ManualTimeProvider;

    fn setup() -> (Arc<JobRegistry>, ProgressPublisher) {
        let registry = Arc::new(JobRegistry::new(
            Arc::new(MemoryJobRepository::new()),
            Arc::new(ManualTimeProvider::new(1_000)),
        ));
        let publisher = ProgressPublisher::new(Arc::clone(&registry));
        (registry, publisher)
    }

    fn job(id: &str) -> Job {
        Job::new(id, 500, vec!["a".to_string(), "b".to_string()])
    }

    #[tokio::test]
    async fn unknown_job_yields_not_found() {
        let (_registry, publisher) = setup();
        let mut rx = publisher.subscribe("ghost".to_string());

        let event = rx.recv().await.unwrap();
        assert_eq!(
            event,
            ProgressEvent::NotFound {
                job_id: "ghost".to_string()
            }
        );
        // stream closes after the terminal event
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn subscriber_sees_snapshot_then_changes() {
        let (registry, publisher) = setup();
        registry.create(job("j1")).await.unwrap();

        let mut rx = publisher.subscribe("j1".to_string());
        match rx.recv().await.unwrap() {
            ProgressEvent::Progress(p) => {
                assert_eq!(p.status, JobStatus::Queued);
                assert_eq!(p.progress, 0);
            }
            other => panic!("expected initial snapshot, got {:?}", other),
        }

        registry
            .update(&"j1".to_string(), JobUpdate::processing())
            .await
            .unwrap();
        match rx.recv().await.unwrap() {
            ProgressEvent::Progress(p) => assert_eq!(p.status, JobStatus::Processing),
            other => panic!("expected progress event, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn terminal_event_closes_the_stream() {
        let (registry, publisher) = setup();
        registry.create(job("j2")).await.unwrap();
        registry
            .update(&"j2".to_string(), JobUpdate::processing())
            .await
            .unwrap();

        let mut rx = publisher.subscribe("j2".to_string());
        rx.recv().await.unwrap(); // snapshot

        registry
            .update(&"j2".to_string(), JobUpdate::failed("b missing"))
            .await
            .unwrap();
        match rx.recv().await.unwrap() {
            ProgressEvent::Error(p) => {
                assert_eq!(p.status, JobStatus::Failed);
                assert_eq!(p.error.as_deref(), Some("b missing"));
            }
            other => panic!("expected error event, got {:?}", other),
        }
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn attach_after_completion_gets_terminal_snapshot_only() {
        let (registry, publisher) = setup();
        registry.create(job("j3")).await.unwrap();
        registry
            .update(&"j3".to_string(), JobUpdate::processing())
            .await
            .unwrap();
        registry
            .update(
                &"j3".to_string(),
                JobUpdate::completed("https://example.test/j3.zip"),
            )
            .await
            .unwrap();

        let mut rx = publisher.subscribe("j3".to_string());
        match rx.recv().await.unwrap() {
            ProgressEvent::Complete(p) => {
                assert_eq!(p.progress, 100);
                assert_eq!(p.result_url.as_deref(), Some("https://example.test/j3.zip"));
            }
            other => panic!("expected complete event, got {:?}", other),
        }
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn events_serialize_with_tagged_envelope() {
        let payload = ProgressPayload {
            job_id: "j4".to_string(),
            status: JobStatus::Processing,
            progress: 30,
            files_completed: 2,
            total_files: 2,
            result_url: None,
            error: None,
        };
        let json = serde_json::to_value(ProgressEvent::Progress(payload)).unwrap();
        assert_eq!(json["event"], "progress");
        assert_eq!(json["data"]["jobId"], "j4");
        assert_eq!(json["data"]["status"], "PROCESSING");
        assert_eq!(json["data"]["filesCompleted"], 2);
        assert!(json["data"].get("resultUrl").is_none());
    }
}
