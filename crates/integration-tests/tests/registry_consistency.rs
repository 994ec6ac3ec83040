//! Registry / Durable Store Consistency Tests
//!
//! The in-memory record is authoritative for the process lifetime; the
//! SQLite row is what a restart sees. These tests pin down both sides.

use std::sync::Arc;

use baler_core::application::{JobRegistry, Lookup, RecoveryService};
use baler_core::domain::{Job, JobStatus, JobUpdate};
use baler_core::port::time_provider::mocks::ManualTimeProvider;
use baler_core::port::JobRepository;
use baler_infra_sqlite::{create_pool, run_migrations, SqliteJobRepository};

async fn sqlite_repo() -> Arc<SqliteJobRepository> {
    let pool = create_pool(":memory:").await.unwrap();
    run_migrations(&pool).await.unwrap();
    Arc::new(SqliteJobRepository::new(pool))
}

fn job(id: &str, created_at: i64) -> Job {
    Job::new(id, created_at, vec!["a.txt".to_string()])
}

#[tokio::test]
async fn create_writes_both_cache_and_store() {
    let repo = sqlite_repo().await;
    let registry = JobRegistry::new(repo.clone(), Arc::new(ManualTimeProvider::new(1_000)));

    registry.create(job("j1", 500)).await.unwrap();

    assert!(matches!(
        registry.get(&"j1".to_string()).await.unwrap(),
        Lookup::Cached(_)
    ));
    let row = repo.find_by_id(&"j1".to_string()).await.unwrap().unwrap();
    assert_eq!(row.status, JobStatus::Queued);
}

#[tokio::test]
async fn cache_miss_rehydrates_from_sqlite() {
    let repo = sqlite_repo().await;
    repo.insert(&job("j2", 500)).await.unwrap();

    // fresh registry, empty cache
    let registry = JobRegistry::new(repo.clone(), Arc::new(ManualTimeProvider::new(1_000)));
    match registry.get(&"j2".to_string()).await.unwrap() {
        Lookup::Rehydrated(found) => assert_eq!(found.id, "j2"),
        other => panic!("expected rehydration, got {:?}", other),
    }
    assert!(matches!(
        registry.get(&"j2".to_string()).await.unwrap(),
        Lookup::Cached(_)
    ));
}

#[tokio::test]
async fn updates_flow_through_to_the_row() {
    let repo = sqlite_repo().await;
    let registry = JobRegistry::new(repo.clone(), Arc::new(ManualTimeProvider::new(2_000)));
    registry.create(job("j3", 500)).await.unwrap();

    registry
        .update(&"j3".to_string(), JobUpdate::processing())
        .await
        .unwrap();
    registry
        .update(&"j3".to_string(), JobUpdate::collected(25, 1))
        .await
        .unwrap();

    let row = repo.find_by_id(&"j3".to_string()).await.unwrap().unwrap();
    assert_eq!(row.status, JobStatus::Processing);
    assert_eq!(row.progress, 25);
    assert_eq!(row.files_completed, 1);
    assert_eq!(row.updated_at, 2_000);
}

#[tokio::test]
async fn recovery_fails_interrupted_jobs_in_sqlite() {
    let repo = sqlite_repo().await;

    // simulate rows left behind by a crashed process
    repo.insert(&job("stuck-queued", 100)).await.unwrap();
    let mut stuck = job("stuck-processing", 200);
    stuck.apply(&JobUpdate::processing(), 300).unwrap();
    repo.insert(&stuck).await.unwrap();
    let mut done = job("finished", 400);
    done.apply(&JobUpdate::processing(), 500).unwrap();
    done.apply(&JobUpdate::completed("https://example.test/finished.zip"), 600)
        .unwrap();
    repo.insert(&done).await.unwrap();

    let recovery = RecoveryService::new(repo.clone(), Arc::new(ManualTimeProvider::new(10_000)));
    assert_eq!(recovery.fail_interrupted_jobs().await.unwrap(), 2);

    for id in ["stuck-queued", "stuck-processing"] {
        let row = repo.find_by_id(&id.to_string()).await.unwrap().unwrap();
        assert_eq!(row.status, JobStatus::Failed);
        assert!(row.error.as_deref().unwrap().contains("restart"));
    }

    let untouched = repo
        .find_by_id(&"finished".to_string())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(untouched.status, JobStatus::Completed);

    // a registry started after recovery serves the failed state
    let registry = JobRegistry::new(repo, Arc::new(ManualTimeProvider::new(11_000)));
    let rehydrated = registry
        .get(&"stuck-processing".to_string())
        .await
        .unwrap()
        .into_job()
        .unwrap();
    assert_eq!(rehydrated.status, JobStatus::Failed);
}

#[tokio::test]
async fn list_serves_pages_newest_first_across_restart() {
    let repo = sqlite_repo().await;
    for i in 0..4i64 {
        repo.insert(&job(&format!("j{}", i), 1_000 + i)).await.unwrap();
    }

    let registry = JobRegistry::new(repo, Arc::new(ManualTimeProvider::new(5_000)));
    let page = registry.list(None, 3, 0).await.unwrap();
    let ids: Vec<&str> = page.iter().map(|j| j.id.as_str()).collect();
    assert_eq!(ids, vec!["j3", "j2", "j1"]);

    let filtered = registry
        .list(Some(JobStatus::Queued), 10, 0)
        .await
        .unwrap();
    assert_eq!(filtered.len(), 4);
}
