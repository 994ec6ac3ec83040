//! RPC Method Handlers
//!
//! Implements the business logic for each JSON-RPC method.

use crate::error::to_rpc_error;
use crate::types::{
    CreateBundleRequest, CreateBundleResponse, JobView, ListRequest, ListResponse, StatusRequest,
};
use baler_core::application::{BundleService, CreateRequest, JobRegistry, Lookup};
use baler_core::domain::JobStatus;
use baler_core::error::AppError;
use jsonrpsee::types::ErrorObjectOwned;
use std::sync::Arc;

/// RPC Handler with injected dependencies
pub struct RpcHandler {
    bundle_service: Arc<BundleService>,
    registry: Arc<JobRegistry>,
}

impl RpcHandler {
    pub fn new(bundle_service: Arc<BundleService>, registry: Arc<JobRegistry>) -> Self {
        Self {
            bundle_service,
            registry,
        }
    }

    /// bundle.create.v1
    pub async fn create(
        &self,
        params: CreateBundleRequest,
    ) -> Result<CreateBundleResponse, ErrorObjectOwned> {
        let job_id = self
            .bundle_service
            .create(CreateRequest { keys: params.keys })
            .await
            .map_err(to_rpc_error)?;

        Ok(CreateBundleResponse {
            job_id,
            status: JobStatus::Queued,
        })
    }

    /// bundle.status.v1
    pub async fn status(&self, params: StatusRequest) -> Result<JobView, ErrorObjectOwned> {
        match self
            .registry
            .get(&params.job_id)
            .await
            .map_err(to_rpc_error)?
        {
            Lookup::Cached(job) | Lookup::Rehydrated(job) => Ok(JobView::from(job)),
            Lookup::Absent => Err(to_rpc_error(AppError::NotFound(format!(
                "Job {} not found",
                params.job_id
            )))),
        }
    }

    /// bundle.list.v1
    pub async fn list(&self, params: ListRequest) -> Result<ListResponse, ErrorObjectOwned> {
        let jobs = self
            .registry
            .list(params.status, params.limit, params.offset)
            .await
            .map_err(to_rpc_error)?;

        Ok(ListResponse {
            jobs: jobs.into_iter().map(JobView::from).collect(),
        })
    }
}
