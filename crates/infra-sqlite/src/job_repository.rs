// SQLite JobRepository Implementation

use async_trait::async_trait;
use baler_core::domain::{Job, JobId, JobStatus};
use baler_core::error::{AppError, Result};
use baler_core::port::JobRepository;
use sqlx::SqlitePool;

// Helper to convert sqlx::Error to AppError with structured information
fn map_sqlx_error(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) => {
            if let Some(code) = db_err.code() {
                let code_str = code.as_ref();

                // SQLite error codes: https://www.sqlite.org/rescode.html
                match code_str {
                    "2067" | "1555" => AppError::Database(format!(
                        "Unique constraint violation: {} ({})",
                        db_err.message(),
                        code_str
                    )),
                    "5" => AppError::Database(format!(
                        "Database locked (SQLITE_BUSY): {}",
                        db_err.message()
                    )),
                    "13" => AppError::Database(format!("Database full: {}", db_err.message())),
                    _ => AppError::Database(format!(
                        "Database error [{}]: {}",
                        code_str,
                        db_err.message()
                    )),
                }
            } else {
                AppError::Database(format!("Database error: {}", db_err.message()))
            }
        }
        sqlx::Error::RowNotFound => AppError::Database("Row not found".to_string()),
        sqlx::Error::ColumnNotFound(col) => {
            AppError::Database(format!("Column not found: {}", col))
        }
        _ => AppError::Database(err.to_string()),
    }
}

pub struct SqliteJobRepository {
    pool: SqlitePool,
}

impl SqliteJobRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobRepository for SqliteJobRepository {
    async fn insert(&self, job: &Job) -> Result<()> {
        let keys_json = serde_json::to_string(&job.keys)?;

        sqlx::query(
            r#"
            INSERT INTO jobs (
                id, status, keys, progress, files_completed, total_files,
                result_url, error, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&job.id)
        .bind(job.status.to_string())
        .bind(&keys_json)
        .bind(job.progress)
        .bind(job.files_completed)
        .bind(job.total_files)
        .bind(&job.result_url)
        .bind(&job.error)
        .bind(job.created_at)
        .bind(job.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn update(&self, job: &Job) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = ?, progress = ?, files_completed = ?,
                result_url = ?, error = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(job.status.to_string())
        .bind(job.progress)
        .bind(job.files_completed)
        .bind(&job.result_url)
        .bind(&job.error)
        .bind(job.updated_at)
        .bind(&job.id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Job {} not found", job.id)));
        }
        Ok(())
    }

    async fn find_by_id(&self, id: &JobId) -> Result<Option<Job>> {
        let row = sqlx::query_as::<_, JobRow>("SELECT * FROM jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.map(JobRow::into_job).transpose()
    }

    async fn find_by_status(&self, status: JobStatus) -> Result<Vec<Job>> {
        let rows: Vec<JobRow> = sqlx::query_as(
            r#"
            SELECT * FROM jobs
            WHERE status = ?
            ORDER BY created_at ASC
            "#,
        )
        .bind(status.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(JobRow::into_job).collect()
    }

    async fn list(&self, status: Option<JobStatus>, limit: i64, offset: i64) -> Result<Vec<Job>> {
        let rows: Vec<JobRow> = match status {
            Some(status) => {
                sqlx::query_as(
                    r#"
                    SELECT * FROM jobs
                    WHERE status = ?
                    ORDER BY created_at DESC
                    LIMIT ? OFFSET ?
                    "#,
                )
                .bind(status.to_string())
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as(
                    r#"
                    SELECT * FROM jobs
                    ORDER BY created_at DESC
                    LIMIT ? OFFSET ?
                    "#,
                )
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(JobRow::into_job).collect()
    }
}

/// SQLite row representation
#[derive(Debug, sqlx::FromRow)]
struct JobRow {
    id: String,
    status: String,
    keys: String,
    progress: i32,
    files_completed: i32,
    total_files: i32,
    result_url: Option<String>,
    error: Option<String>,
    created_at: i64,
    updated_at: i64,
}

impl JobRow {
    fn into_job(self) -> Result<Job> {
        let status = match self.status.as_str() {
            "QUEUED" => JobStatus::Queued,
            "PROCESSING" => JobStatus::Processing,
            "COMPLETED" => JobStatus::Completed,
            "FAILED" => JobStatus::Failed,
            other => {
                return Err(AppError::Database(format!(
                    "Unknown job status in row {}: {}",
                    self.id, other
                )))
            }
        };

        let keys: Vec<String> = serde_json::from_str(&self.keys)?;

        Ok(Job {
            id: self.id,
            status,
            keys,
            progress: self.progress,
            files_completed: self.files_completed,
            total_files: self.total_files,
            result_url: self.result_url,
            error: self.error,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_pool, run_migrations};
    use baler_core::domain::JobUpdate;

    async fn setup_repo() -> SqliteJobRepository {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        SqliteJobRepository::new(pool)
    }

    fn job(id: &str, created_at: i64) -> Job {
        Job::new(
            id,
            created_at,
            vec!["a.txt".to_string(), "b.txt".to_string()],
        )
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let repo = setup_repo().await;
        let job = job("j1", 1_000);

        repo.insert(&job).await.unwrap();

        let found = repo.find_by_id(&job.id).await.unwrap().unwrap();
        assert_eq!(found.id, "j1");
        assert_eq!(found.status, JobStatus::Queued);
        assert_eq!(found.keys, vec!["a.txt", "b.txt"]);
        assert_eq!(found.total_files, 2);
    }

    #[tokio::test]
    async fn test_find_missing_is_none() {
        let repo = setup_repo().await;
        assert!(repo.find_by_id(&"nope".to_string()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_overwrites_mutable_fields() {
        let repo = setup_repo().await;
        let mut job = job("j2", 1_000);
        repo.insert(&job).await.unwrap();

        job.apply(&JobUpdate::processing(), 2_000).unwrap();
        job.apply(&JobUpdate::collected(13, 1), 3_000).unwrap();
        repo.update(&job).await.unwrap();

        let found = repo.find_by_id(&job.id).await.unwrap().unwrap();
        assert_eq!(found.status, JobStatus::Processing);
        assert_eq!(found.progress, 13);
        assert_eq!(found.files_completed, 1);
        assert_eq!(found.updated_at, 3_000);
        // immutable fields untouched
        assert_eq!(found.created_at, 1_000);
        assert_eq!(found.keys, vec!["a.txt", "b.txt"]);
    }

    #[tokio::test]
    async fn test_update_unknown_id_is_not_found() {
        let repo = setup_repo().await;
        let ghost = job("ghost", 1_000);
        assert!(matches!(
            repo.update(&ghost).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_find_by_status() {
        let repo = setup_repo().await;
        repo.insert(&job("q1", 1_000)).await.unwrap();
        repo.insert(&job("q2", 2_000)).await.unwrap();

        let mut done = job("d1", 3_000);
        done.apply(&JobUpdate::processing(), 3_100).unwrap();
        done.apply(&JobUpdate::completed("url"), 3_200).unwrap();
        repo.insert(&done).await.unwrap();

        let queued = repo.find_by_status(JobStatus::Queued).await.unwrap();
        let ids: Vec<&str> = queued.iter().map(|j| j.id.as_str()).collect();
        // oldest first for recovery sweeps
        assert_eq!(ids, vec!["q1", "q2"]);

        let completed = repo.find_by_status(JobStatus::Completed).await.unwrap();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].result_url.as_deref(), Some("url"));
    }

    #[tokio::test]
    async fn test_list_pages_newest_first() {
        let repo = setup_repo().await;
        for i in 0..5i64 {
            repo.insert(&job(&format!("j{}", i), 1_000 + i)).await.unwrap();
        }

        let page = repo.list(None, 2, 0).await.unwrap();
        let ids: Vec<&str> = page.iter().map(|j| j.id.as_str()).collect();
        assert_eq!(ids, vec!["j4", "j3"]);

        let next = repo.list(None, 2, 2).await.unwrap();
        let ids: Vec<&str> = next.iter().map(|j| j.id.as_str()).collect();
        assert_eq!(ids, vec!["j2", "j1"]);
    }

    #[tokio::test]
    async fn test_list_filters_by_status() {
        let repo = setup_repo().await;
        repo.insert(&job("q1", 1_000)).await.unwrap();

        let mut failed = job("f1", 2_000);
        failed.apply(&JobUpdate::failed("a.txt missing"), 2_100).unwrap();
        repo.insert(&failed).await.unwrap();

        let only_failed = repo.list(Some(JobStatus::Failed), 10, 0).await.unwrap();
        assert_eq!(only_failed.len(), 1);
        assert_eq!(only_failed[0].error.as_deref(), Some("a.txt missing"));
    }

    #[tokio::test]
    async fn test_duplicate_insert_is_rejected() {
        let repo = setup_repo().await;
        let job = job("dup", 1_000);
        repo.insert(&job).await.unwrap();
        assert!(repo.insert(&job).await.is_err());
    }
}
