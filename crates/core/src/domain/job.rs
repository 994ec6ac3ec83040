// Job Domain Model

use crate::domain::error::DomainError;
use serde::{Deserialize, Serialize};

/// Job ID (UUID v4)
pub type JobId = String;

/// Job Status
///
/// Transitions: QUEUED -> PROCESSING -> {COMPLETED | FAILED}.
/// Terminal statuses never transition further.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Queued => write!(f, "QUEUED"),
            JobStatus::Processing => write!(f, "PROCESSING"),
            JobStatus::Completed => write!(f, "COMPLETED"),
            JobStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// Job Entity
///
/// The unit of work: an immutable ordered set of source keys plus tracked
/// status/progress. Exactly one of `result_url`/`error` is ever set, and only
/// once the job is terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub status: JobStatus,

    /// Requested source keys, fixed at creation
    pub keys: Vec<String>,

    /// 0-100, monotonically non-decreasing
    pub progress: i32,
    pub files_completed: i32,
    pub total_files: i32,

    /// Present only when status = COMPLETED
    pub result_url: Option<String>,
    /// Present only when status = FAILED; names the failing key or cause
    pub error: Option<String>,

    pub created_at: i64, // epoch ms
    pub updated_at: i64,
}

/// Partial-field merge applied through `Job::apply`
///
/// Only the executor assigned to a job produces updates for it, so updates
/// never race; the guards in `apply` still enforce the domain invariants.
#[derive(Debug, Clone, Default)]
pub struct JobUpdate {
    pub status: Option<JobStatus>,
    pub progress: Option<i32>,
    pub files_completed: Option<i32>,
    pub result_url: Option<String>,
    pub error: Option<String>,
}

impl JobUpdate {
    /// QUEUED -> PROCESSING
    pub fn processing() -> Self {
        Self {
            status: Some(JobStatus::Processing),
            ..Default::default()
        }
    }

    /// Progress checkpoint within the current phase
    pub fn progress(progress: i32) -> Self {
        Self {
            progress: Some(progress),
            ..Default::default()
        }
    }

    /// Collect-phase step: band progress plus fetched-file counter
    pub fn collected(progress: i32, files_completed: i32) -> Self {
        Self {
            progress: Some(progress),
            files_completed: Some(files_completed),
            ..Default::default()
        }
    }

    /// Terminal success with the presigned retrieval link
    pub fn completed(result_url: impl Into<String>) -> Self {
        Self {
            status: Some(JobStatus::Completed),
            progress: Some(100),
            result_url: Some(result_url.into()),
            ..Default::default()
        }
    }

    /// Terminal failure with a cause-identifying message
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: Some(JobStatus::Failed),
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

impl Job {
    /// Create a new QUEUED job
    ///
    /// # Arguments
    ///
    /// * `id` - Unique job ID (injected, not generated)
    /// * `created_at` - Creation timestamp in epoch ms (injected, not system time)
    /// * `keys` - Ordered source keys; fixes `total_files`
    pub fn new(id: impl Into<String>, created_at: i64, keys: Vec<String>) -> Self {
        let total_files = keys.len() as i32;
        Self {
            id: id.into(),
            status: JobStatus::Queued,
            keys,
            progress: 0,
            files_completed: 0,
            total_files,
            result_url: None,
            error: None,
            created_at,
            updated_at: created_at,
        }
    }

    /// Merge a partial update into this job with explicit timestamp.
    ///
    /// Enforces the domain invariants: legal status transitions only,
    /// monotonically non-decreasing progress and file counter, and
    /// `result_url`/`error` accepted only alongside their terminal status.
    pub fn apply(&mut self, update: &JobUpdate, now_millis: i64) -> crate::domain::error::Result<()> {
        if self.status.is_terminal() {
            return Err(DomainError::TerminalJobMutation(self.id.clone()));
        }

        if let Some(next) = update.status {
            self.check_transition(next)?;
            self.status = next;
        }

        if let Some(progress) = update.progress {
            self.progress = self.progress.max(progress.clamp(0, 100));
        }

        if let Some(files_completed) = update.files_completed {
            self.files_completed = self.files_completed.max(files_completed.min(self.total_files));
        }

        match self.status {
            JobStatus::Completed => {
                if let Some(url) = &update.result_url {
                    self.result_url = Some(url.clone());
                }
            }
            JobStatus::Failed => {
                if let Some(error) = &update.error {
                    self.error = Some(error.clone());
                }
            }
            _ => {}
        }

        self.updated_at = now_millis;
        Ok(())
    }

    fn check_transition(&self, to: JobStatus) -> crate::domain::error::Result<()> {
        use JobStatus::*;
        let legal = matches!(
            (self.status, to),
            (Queued, Processing) | (Processing, Completed) | (Queued | Processing, Failed)
        ) || self.status == to;

        if legal {
            Ok(())
        } else {
            Err(DomainError::InvalidStatusTransition {
                from: self.status.to_string(),
                to: to.to_string(),
            })
        }
    }
}
