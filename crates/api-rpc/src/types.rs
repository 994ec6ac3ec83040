//! RPC Request/Response Types
//!
//! Defines the JSON-RPC method parameters and results. Wire fields are
//! camelCase; statuses are SCREAMING_SNAKE.

use baler_core::domain::{Job, JobStatus};
use serde::{Deserialize, Serialize};

/// bundle.create.v1 - Accept a bundle request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBundleRequest {
    pub keys: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBundleResponse {
    pub job_id: String,
    pub status: JobStatus,
}

/// bundle.status.v1 - Poll one job
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRequest {
    pub job_id: String,
}

/// Full job snapshot, shared by bundle.status.v1 and bundle.list.v1
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobView {
    pub job_id: String,
    pub status: JobStatus,
    pub keys: Vec<String>,
    pub progress: i32,
    pub files_completed: i32,
    pub total_files: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<Job> for JobView {
    fn from(job: Job) -> Self {
        Self {
            job_id: job.id,
            status: job.status,
            keys: job.keys,
            progress: job.progress,
            files_completed: job.files_completed,
            total_files: job.total_files,
            result_url: job.result_url,
            error: job.error,
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }
}

/// bundle.list.v1 - Page through jobs
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRequest {
    #[serde(default)]
    pub status: Option<JobStatus>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse {
    pub jobs: Vec<JobView>,
}

/// bundle.subscribe.v1 - Open a progress stream
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeRequest {
    pub job_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_view_serializes_camel_case() {
        let view = JobView::from(Job::new("j1", 1_000, vec!["a.txt".to_string()]));
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["jobId"], "j1");
        assert_eq!(json["status"], "QUEUED");
        assert_eq!(json["totalFiles"], 1);
        // absent optionals stay off the wire
        assert!(json.get("resultUrl").is_none());
        assert!(json.get("error").is_none());
    }

    #[test]
    fn list_request_defaults() {
        let req: ListRequest = serde_json::from_str("{}").unwrap();
        assert!(req.status.is_none());
        assert_eq!(req.limit, 50);
        assert_eq!(req.offset, 0);
    }

    #[test]
    fn list_request_parses_status_filter() {
        let req: ListRequest = serde_json::from_str(r#"{"status": "FAILED", "limit": 5}"#).unwrap();
        assert_eq!(req.status, Some(JobStatus::Failed));
        assert_eq!(req.limit, 5);
    }
}
