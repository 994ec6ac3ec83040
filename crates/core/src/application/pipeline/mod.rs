// Pipeline Executor - four-phase bundling state machine
// Collect -> Verify & Archive -> Upload -> Publish

pub mod archive;
pub mod checksum;

use crate::application::registry::JobRegistry;
use crate::domain::{Job, JobId, JobUpdate};
use crate::port::{ObjectStore, StoreError};
use archive::ArchiveEntry;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

/// Upper bound of the Collect band
const COLLECT_BAND_MAX: i32 = 25;

// Fixed checkpoints after Collect. These exact values are part of the
// observable contract; clients key off them.
const CHECKPOINT_VERIFIED: i32 = 30;
const CHECKPOINT_ARCHIVED: i32 = 50;
const CHECKPOINT_UPLOADED: i32 = 75;

/// Presigned retrieval link lifetime (fixed 1 hour)
pub const LINK_TTL_SECS: u64 = 3600;

/// Pipeline failure causes; each terminates the job as FAILED
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("source object not found: {0}")]
    NotFound(String),

    #[error("source object is empty: {0}")]
    Empty(String),

    #[error("checksum mismatch for {key}: expected {expected}, got {actual}")]
    Integrity {
        key: String,
        expected: String,
        actual: String,
    },

    #[error("store operation failed: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Archive(#[from] archive::ArchiveError),

    #[error("job state update rejected: {0}")]
    State(String),
}

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub source_bucket: String,
    pub archive_bucket: String,
    pub link_ttl_secs: u64,
}

impl PipelineConfig {
    pub fn new(source_bucket: impl Into<String>, archive_bucket: impl Into<String>) -> Self {
        Self {
            source_bucket: source_bucket.into(),
            archive_bucket: archive_bucket.into(),
            link_ttl_secs: LINK_TTL_SECS,
        }
    }
}

/// One fetched source object; lives only inside a single executor run
struct CollectedArtifact {
    key: String,
    bytes: Vec<u8>,
    checksum: String,
}

/// Runs the four-phase state machine for one job, reading and writing job
/// state only through the registry.
///
/// `presigner` may be a differently-addressed client than `destination`:
/// the retrieval link must resolve for the external caller, which can see
/// the store under another endpoint than this process does.
pub struct PipelineExecutor {
    registry: Arc<JobRegistry>,
    source: Arc<dyn ObjectStore>,
    destination: Arc<dyn ObjectStore>,
    presigner: Arc<dyn ObjectStore>,
    config: PipelineConfig,
}

impl PipelineExecutor {
    pub fn new(
        registry: Arc<JobRegistry>,
        source: Arc<dyn ObjectStore>,
        destination: Arc<dyn ObjectStore>,
        presigner: Arc<dyn ObjectStore>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            registry,
            source,
            destination,
            presigner,
            config,
        }
    }

    /// Run the pipeline for one job to a terminal state.
    ///
    /// Invoked exactly once per job, by a detached task nobody awaits: every
    /// exit path therefore persists a terminal registry update before
    /// returning. Collected artifacts and any partially built archive are
    /// owned by `execute` and dropped with it on success and failure alike.
    pub async fn run(&self, job: Job) {
        let id = job.id.clone();
        match self.execute(&job).await {
            Ok(url) => {
                info!(job_id = %id, result_url = %url, "Bundle completed");
            }
            Err(e) => {
                error!(job_id = %id, error = %e, "Bundle failed");
                let update = JobUpdate::failed(e.to_string());
                if let Err(update_err) = self.registry.update(&id, update).await {
                    error!(
                        job_id = %id,
                        error = %update_err,
                        "Failed to persist terminal failure"
                    );
                }
            }
        }
    }

    async fn execute(&self, job: &Job) -> Result<String, PipelineError> {
        let id = &job.id;
        let total = job.keys.len();

        self.track(id, JobUpdate::processing()).await?;

        // Phase 1: Collect (0 -> 25), sequentially in key order
        let mut artifacts = Vec::with_capacity(total);
        for (index, key) in job.keys.iter().enumerate() {
            let size = match self.source.head(&self.config.source_bucket, key).await {
                Ok(size) => size,
                Err(StoreError::NotFound { .. }) => {
                    return Err(PipelineError::NotFound(key.clone()))
                }
                Err(e) => return Err(e.into()),
            };
            if size == 0 {
                return Err(PipelineError::Empty(key.clone()));
            }

            let bytes = match self.source.get(&self.config.source_bucket, key).await {
                Ok(bytes) => bytes,
                Err(StoreError::NotFound { .. }) => {
                    return Err(PipelineError::NotFound(key.clone()))
                }
                Err(e) => return Err(e.into()),
            };
            if bytes.is_empty() {
                return Err(PipelineError::Empty(key.clone()));
            }

            // checksum captured on receipt, verified before archiving
            let checksum = checksum::sha256_hex(&bytes);
            artifacts.push(CollectedArtifact {
                key: key.clone(),
                bytes,
                checksum,
            });

            let fetched = (index + 1) as i32;
            let update = JobUpdate::collected(collect_progress(fetched, total as i32), fetched);
            self.track(id, update).await?;
        }

        // Phase 2: Verify & Archive (25 -> 30 -> 50)
        verify(&artifacts)?;
        self.track(id, JobUpdate::progress(CHECKPOINT_VERIFIED)).await?;

        let entries = artifacts
            .into_iter()
            .map(|artifact| ArchiveEntry {
                name: artifact.key,
                bytes: artifact.bytes,
            })
            .collect();
        // archive bytes are complete only after this await resolves
        let archive_bytes = archive::build(entries).await?;
        self.track(id, JobUpdate::progress(CHECKPOINT_ARCHIVED)).await?;

        // Phase 3: Upload (50 -> 75)
        let archive_key = format!("{}.zip", id);
        let mut metadata = HashMap::new();
        metadata.insert("job-id".to_string(), id.clone());
        metadata.insert("file-count".to_string(), total.to_string());
        metadata.insert("created-at".to_string(), job.created_at.to_string());
        self.destination
            .put(&self.config.archive_bucket, &archive_key, archive_bytes, metadata)
            .await?;
        self.track(id, JobUpdate::progress(CHECKPOINT_UPLOADED)).await?;

        // Phase 4: Publish (75 -> 100)
        let url = self
            .presigner
            .presign_get(&self.config.archive_bucket, &archive_key, self.config.link_ttl_secs)
            .await?;
        self.track(id, JobUpdate::completed(url.clone())).await?;

        Ok(url)
    }

    async fn track(&self, id: &JobId, update: JobUpdate) -> Result<(), PipelineError> {
        self.registry
            .update(id, update)
            .await
            .map(|_| ())
            .map_err(|e| PipelineError::State(e.to_string()))
    }
}

/// Recompute each artifact's checksum and compare it with the one captured
/// at Collect time; the first mismatch aborts, naming the key
fn verify(artifacts: &[CollectedArtifact]) -> Result<(), PipelineError> {
    for artifact in artifacts {
        let actual = checksum::sha256_hex(&artifact.bytes);
        if actual != artifact.checksum {
            return Err(PipelineError::Integrity {
                key: artifact.key.clone(),
                expected: artifact.checksum.clone(),
                actual,
            });
        }
    }
    Ok(())
}

/// Progress after completing `fetched` of `total` Collect-phase fetches
fn collect_progress(fetched: i32, total: i32) -> i32 {
    ((f64::from(fetched) / f64::from(total)) * f64::from(COLLECT_BAND_MAX)).round() as i32
}
