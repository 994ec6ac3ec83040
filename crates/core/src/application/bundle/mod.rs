// Bundle Service - request intake and pipeline dispatch

mod create;

pub use create::CreateRequest;

use crate::application::pipeline::PipelineExecutor;
use crate::application::registry::JobRegistry;
use crate::domain::JobId;
use crate::error::Result;
use crate::port::{IdProvider, TimeProvider};
use std::sync::Arc;
use tokio_util::task::TaskTracker;

/// Entry point for bundle requests.
///
/// Validates and registers the job, then hands it to a detached pipeline
/// task tracked for shutdown. The caller gets the job id back immediately;
/// everything after that is observable only through the registry.
pub struct BundleService {
    registry: Arc<JobRegistry>,
    executor: Arc<PipelineExecutor>,
    tracker: TaskTracker,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
}

impl BundleService {
    pub fn new(
        registry: Arc<JobRegistry>,
        executor: Arc<PipelineExecutor>,
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            registry,
            executor,
            tracker: TaskTracker::new(),
            id_provider,
            time_provider,
        }
    }

    /// Accept a bundle request and start its pipeline detached
    pub async fn create(&self, request: CreateRequest) -> Result<JobId> {
        create::execute(
            &self.registry,
            &self.executor,
            &self.tracker,
            self.id_provider.as_ref(),
            self.time_provider.as_ref(),
            request,
        )
        .await
    }

    /// Tracker over all in-flight pipeline tasks, for shutdown draining
    pub fn tracker(&self) -> &TaskTracker {
        &self.tracker
    }
}
