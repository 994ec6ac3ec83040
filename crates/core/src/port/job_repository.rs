// Durable Job Store Port (Interface)

use crate::domain::{Job, JobId, JobStatus};
use crate::error::Result;
use async_trait::async_trait;

/// Repository interface for durable Job persistence
///
/// The registry reads through its in-memory cache first and treats writes
/// here as best-effort (see `JobRegistry::update`); this store is what
/// survives a process restart.
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Insert a new job
    async fn insert(&self, job: &Job) -> Result<()>;

    /// Overwrite the mutable fields of an existing job
    async fn update(&self, job: &Job) -> Result<()>;

    /// Find job by ID
    async fn find_by_id(&self, id: &JobId) -> Result<Option<Job>>;

    /// Find all jobs with the given status (startup recovery)
    async fn find_by_status(&self, status: JobStatus) -> Result<Vec<Job>>;

    /// Page of jobs ordered by creation time descending
    async fn list(&self, status: Option<JobStatus>, limit: i64, offset: i64) -> Result<Vec<Job>>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// In-memory JobRepository for tests
    ///
    /// `set_fail_writes` makes subsequent writes error, to exercise the
    /// registry's best-effort durable path.
    pub struct MemoryJobRepository {
        jobs: Mutex<HashMap<JobId, Job>>,
        fail_writes: AtomicBool,
        update_count: AtomicUsize,
    }

    impl MemoryJobRepository {
        pub fn new() -> Self {
            Self {
                jobs: Mutex::new(HashMap::new()),
                fail_writes: AtomicBool::new(false),
                update_count: AtomicUsize::new(0),
            }
        }

        pub fn set_fail_writes(&self, fail: bool) {
            self.fail_writes.store(fail, Ordering::SeqCst);
        }

        pub fn update_count(&self) -> usize {
            self.update_count.load(Ordering::SeqCst)
        }

        /// Direct snapshot of the stored row (what a restart would see)
        pub fn stored(&self, id: &str) -> Option<Job> {
            self.jobs.lock().unwrap().get(id).cloned()
        }

        /// Seed a row without going through insert (restart scenarios)
        pub fn seed(&self, job: Job) {
            self.jobs.lock().unwrap().insert(job.id.clone(), job);
        }

        fn check_writable(&self) -> Result<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                Err(AppError::Database("injected write failure".to_string()))
            } else {
                Ok(())
            }
        }
    }

    impl Default for MemoryJobRepository {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl JobRepository for MemoryJobRepository {
        async fn insert(&self, job: &Job) -> Result<()> {
            self.check_writable()?;
            self.jobs
                .lock()
                .unwrap()
                .insert(job.id.clone(), job.clone());
            Ok(())
        }

        async fn update(&self, job: &Job) -> Result<()> {
            self.check_writable()?;
            self.update_count.fetch_add(1, Ordering::SeqCst);
            let mut jobs = self.jobs.lock().unwrap();
            match jobs.get_mut(&job.id) {
                Some(slot) => {
                    *slot = job.clone();
                    Ok(())
                }
                None => Err(AppError::NotFound(format!("Job {} not found", job.id))),
            }
        }

        async fn find_by_id(&self, id: &JobId) -> Result<Option<Job>> {
            Ok(self.jobs.lock().unwrap().get(id).cloned())
        }

        async fn find_by_status(&self, status: JobStatus) -> Result<Vec<Job>> {
            let jobs = self.jobs.lock().unwrap();
            let mut found: Vec<Job> = jobs.values().filter(|j| j.status == status).cloned().collect();
            found.sort_by_key(|j| j.created_at);
            Ok(found)
        }

        async fn list(
            &self,
            status: Option<JobStatus>,
            limit: i64,
            offset: i64,
        ) -> Result<Vec<Job>> {
            let jobs = self.jobs.lock().unwrap();
            let mut found: Vec<Job> = jobs
                .values()
                .filter(|j| status.map_or(true, |s| j.status == s))
                .cloned()
                .collect();
            found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(found
                .into_iter()
                .skip(offset.max(0) as usize)
                .take(limit.max(0) as usize)
                .collect())
        }
    }
}
