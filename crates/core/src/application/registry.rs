// State Registry - canonical in-process view of every job
// Dual path: in-memory cache first, durable store behind it

use crate::domain::{Job, JobId, JobStatus, JobUpdate};
use crate::error::{AppError, Result};
use crate::port::{JobRepository, TimeProvider};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tracing::warn;

/// Result of a registry lookup
#[derive(Debug, Clone)]
pub enum Lookup {
    /// Present in the in-memory cache
    Cached(Job),
    /// Missed the cache; fetched from the durable store and cached
    Rehydrated(Job),
    /// Neither the cache nor the durable store has the job
    Absent,
}

impl Lookup {
    pub fn into_job(self) -> Option<Job> {
        match self {
            Lookup::Cached(job) | Lookup::Rehydrated(job) => Some(job),
            Lookup::Absent => None,
        }
    }
}

struct CacheEntry {
    job: Job,
    changed: watch::Sender<Job>,
}

impl CacheEntry {
    fn new(job: Job) -> Self {
        let (changed, _) = watch::channel(job.clone());
        Self { job, changed }
    }
}

/// Owns the job cache, the durable store handle, and a per-job change
/// channel. Constructed once at startup and passed explicitly to whoever
/// needs it - no global state.
///
/// Each job id has exactly one writer (its pipeline executor), so entries
/// never see competing updates; the map lock only guards the map itself.
pub struct JobRegistry {
    cache: RwLock<HashMap<JobId, CacheEntry>>,
    repo: Arc<dyn JobRepository>,
    time_provider: Arc<dyn TimeProvider>,
}

impl JobRegistry {
    pub fn new(repo: Arc<dyn JobRepository>, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
            repo,
            time_provider,
        }
    }

    /// Insert a new QUEUED job into the durable store and the cache.
    ///
    /// Unlike `update`, a durable failure here fails the whole create: a job
    /// that was never persisted must not start a pipeline.
    pub async fn create(&self, job: Job) -> Result<()> {
        self.repo.insert(&job).await?;
        let mut cache = self.cache.write().await;
        cache.insert(job.id.clone(), CacheEntry::new(job));
        Ok(())
    }

    /// Merge fields into the cached record, bump `updated_at`, signal
    /// watchers, then best-effort write the merged row to the durable store.
    ///
    /// A durable-write failure is logged and does NOT fail the operation:
    /// the in-memory record stays authoritative for the rest of the process
    /// lifetime. A crash inside that window loses the update - restart
    /// recovery rehydrates only what was durably persisted.
    pub async fn update(&self, id: &JobId, update: JobUpdate) -> Result<Job> {
        let now = self.time_provider.now_millis();
        let snapshot = {
            let mut cache = self.cache.write().await;
            let entry = cache
                .get_mut(id)
                .ok_or_else(|| AppError::NotFound(format!("Job {} not in registry", id)))?;
            entry.job.apply(&update, now)?;
            let snapshot = entry.job.clone();
            // send only fails with zero receivers, which is fine
            let _ = entry.changed.send(snapshot.clone());
            snapshot
        };

        if let Err(e) = self.repo.update(&snapshot).await {
            warn!(
                job_id = %id,
                error = %e,
                "Durable write failed; in-memory record stays authoritative"
            );
        }

        Ok(snapshot)
    }

    /// Cached record, or lazily rehydrate from the durable store
    pub async fn get(&self, id: &JobId) -> Result<Lookup> {
        {
            let cache = self.cache.read().await;
            if let Some(entry) = cache.get(id) {
                return Ok(Lookup::Cached(entry.job.clone()));
            }
        }

        match self.repo.find_by_id(id).await? {
            Some(job) => {
                let mut cache = self.cache.write().await;
                // a concurrent lookup may have rehydrated this id already
                let entry = cache
                    .entry(id.clone())
                    .or_insert_with(|| CacheEntry::new(job));
                Ok(Lookup::Rehydrated(entry.job.clone()))
            }
            None => Ok(Lookup::Absent),
        }
    }

    /// Subscribe to mutations of one job; `None` when the job is absent.
    ///
    /// The receiver holds the latest snapshot immediately; every `update`
    /// publishes a new one.
    pub async fn watch(&self, id: &JobId) -> Result<Option<watch::Receiver<Job>>> {
        {
            let cache = self.cache.read().await;
            if let Some(entry) = cache.get(id) {
                return Ok(Some(entry.changed.subscribe()));
            }
        }

        // rehydrate, then subscribe to the freshly created entry
        match self.get(id).await? {
            Lookup::Absent => Ok(None),
            _ => {
                let cache = self.cache.read().await;
                Ok(cache.get(id).map(|entry| entry.changed.subscribe()))
            }
        }
    }

    /// Durable-store listing, newest first
    pub async fn list(
        &self,
        status: Option<JobStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Job>> {
        self.repo.list(status, limit, offset).await
    }
}
