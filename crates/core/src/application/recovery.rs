// Startup Recovery
// Jobs interrupted by a restart cannot resume: their in-flight artifacts
// died with the process, so they are failed terminally before the server
// accepts new work.

use crate::domain::{JobStatus, JobUpdate};
use crate::error::Result;
use crate::port::{JobRepository, TimeProvider};
use std::sync::Arc;
use tracing::{info, warn};

const INTERRUPTED_MESSAGE: &str = "bundling interrupted by process restart";

pub struct RecoveryService {
    repo: Arc<dyn JobRepository>,
    time_provider: Arc<dyn TimeProvider>,
}

impl RecoveryService {
    pub fn new(repo: Arc<dyn JobRepository>, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            repo,
            time_provider,
        }
    }

    /// Mark every durably QUEUED or PROCESSING job FAILED.
    ///
    /// Runs once at startup, before the RPC server binds. Returns the number
    /// of jobs failed.
    pub async fn fail_interrupted_jobs(&self) -> Result<usize> {
        let now = self.time_provider.now_millis();
        let mut failed = 0;

        for status in [JobStatus::Queued, JobStatus::Processing] {
            for mut job in self.repo.find_by_status(status).await? {
                if let Err(e) = job.apply(&JobUpdate::failed(INTERRUPTED_MESSAGE), now) {
                    warn!(job_id = %job.id, error = %e, "Skipping unrecoverable row");
                    continue;
                }
                self.repo.update(&job).await?;
                info!(job_id = %job.id, was = %status, "Failed interrupted job");
                failed += 1;
            }
        }

        if failed > 0 {
            info!(count = failed, "Startup recovery complete");
        }
        Ok(failed)
    }
}
