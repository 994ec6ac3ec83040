// Create Bundle Use Case

use crate::application::pipeline::PipelineExecutor;
use crate::application::registry::JobRegistry;
use crate::domain::{Job, JobId, JobUpdate};
use crate::error::{AppError, Result};
use crate::port::{IdProvider, TimeProvider};
use serde::Deserialize;
use std::sync::Arc;
use tokio_util::task::TaskTracker;
use tracing::{error, info};

/// Bundle creation request
#[derive(Debug, Clone, Deserialize)]
pub struct CreateRequest {
    /// Source object keys, order preserved into the archive
    pub keys: Vec<String>,
}

/// Validate, register, and dispatch a new bundle job.
///
/// Returns once the job is durably QUEUED; the pipeline itself runs in a
/// detached task. The inner spawn isolates a pipeline panic so it marks
/// only its own job FAILED instead of taking the dispatcher down.
pub async fn execute(
    registry: &Arc<JobRegistry>,
    executor: &Arc<PipelineExecutor>,
    tracker: &TaskTracker,
    id_provider: &dyn IdProvider,
    time_provider: &dyn TimeProvider,
    request: CreateRequest,
) -> Result<JobId> {
    if request.keys.is_empty() {
        return Err(AppError::Validation("keys must not be empty".to_string()));
    }
    if request.keys.iter().any(|key| key.trim().is_empty()) {
        return Err(AppError::Validation(
            "keys must not contain blank entries".to_string(),
        ));
    }

    let id = id_provider.generate_id();
    let job = Job::new(id.clone(), time_provider.now_millis(), request.keys);

    registry.create(job.clone()).await?;
    info!(job_id = %id, total_files = job.total_files, "Bundle job accepted");

    let registry = Arc::clone(registry);
    let executor = Arc::clone(executor);
    tracker.spawn(async move {
        let job_id = job.id.clone();
        let pipeline = tokio::spawn(async move { executor.run(job).await });
        if let Err(e) = pipeline.await {
            error!(job_id = %job_id, error = %e, "Pipeline task aborted");
            let update = JobUpdate::failed("pipeline task aborted unexpectedly");
            if let Err(update_err) = registry.update(&job_id, update).await {
                error!(job_id = %job_id, error = %update_err, "Failed to mark aborted job");
            }
        }
    });

    Ok(id)
}
