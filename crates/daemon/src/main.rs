//! Baler - Main Entry Point
//! Bundles source objects into downloadable zip archives on request.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use baler_api_rpc::{RpcServer, RpcServerConfig};
use baler_core::application::{
    BundleService, JobRegistry, PipelineConfig, PipelineExecutor, ProgressPublisher,
    RecoveryService,
};
use baler_core::port::id_provider::UuidProvider;
use baler_core::port::time_provider::SystemTimeProvider;
use baler_core::port::ObjectStore;
use baler_infra_s3::{build_client, S3Config, S3ObjectStore};
use baler_infra_sqlite::{create_pool, run_migrations, SqliteJobRepository};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const DEFAULT_DB_PATH: &str = "~/.baler/baler.db";
const DEFAULT_RPC_PORT: u16 = 9620;
const DEFAULT_REGION: &str = "us-east-1";
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize logging
    let log_format = std::env::var("BALER_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("baler=info"))
        .expect("Failed to create env filter");

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty())
                .init();
        }
    }

    info!("Baler v{} starting...", VERSION);

    // 2. Load configuration
    let db_path = std::env::var("BALER_DB_PATH")
        .unwrap_or_else(|_| shellexpand::tilde(DEFAULT_DB_PATH).into_owned());

    let rpc_port: u16 = std::env::var("BALER_RPC_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_RPC_PORT);

    let source_bucket = std::env::var("BALER_SOURCE_BUCKET")
        .map_err(|_| anyhow::anyhow!("BALER_SOURCE_BUCKET must be set"))?;
    let archive_bucket = std::env::var("BALER_ARCHIVE_BUCKET")
        .map_err(|_| anyhow::anyhow!("BALER_ARCHIVE_BUCKET must be set"))?;

    let region = std::env::var("BALER_S3_REGION").unwrap_or_else(|_| DEFAULT_REGION.to_string());

    // 3. Initialize database
    info!(db_path = %db_path, "Initializing database...");
    if let Some(parent) = std::path::Path::new(&db_path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    let pool = create_pool(&db_path)
        .await
        .map_err(|e| anyhow::anyhow!("DB pool creation failed: {}", e))?;
    run_migrations(&pool)
        .await
        .map_err(|e| anyhow::anyhow!("Migration failed: {}", e))?;

    // 4. Setup dependencies (DI wiring)
    let time_provider = Arc::new(SystemTimeProvider);
    let id_provider = Arc::new(UuidProvider);
    let job_repo = Arc::new(SqliteJobRepository::new(pool.clone()));

    let mut store_config = S3Config::new(region.clone());
    if let Ok(endpoint) = std::env::var("BALER_S3_ENDPOINT") {
        store_config = store_config.with_endpoint(endpoint);
    }
    let store: Arc<dyn ObjectStore> =
        Arc::new(S3ObjectStore::new(build_client(&store_config).await));

    // Retrieval links must resolve for external callers; behind a proxy or
    // MinIO setup that needs a second client signed against the public
    // endpoint.
    let presigner: Arc<dyn ObjectStore> = match std::env::var("BALER_S3_PUBLIC_ENDPOINT") {
        Ok(public_endpoint) => {
            let public_config = S3Config::new(region).with_endpoint(public_endpoint);
            Arc::new(S3ObjectStore::new(build_client(&public_config).await))
        }
        Err(_) => store.clone(),
    };

    let registry = Arc::new(JobRegistry::new(job_repo.clone(), time_provider.clone()));
    let executor = Arc::new(PipelineExecutor::new(
        Arc::clone(&registry),
        store.clone(),
        store.clone(),
        presigner,
        PipelineConfig::new(source_bucket, archive_bucket),
    ));
    let bundle_service = Arc::new(BundleService::new(
        Arc::clone(&registry),
        executor,
        id_provider,
        time_provider.clone(),
    ));
    let publisher = Arc::new(ProgressPublisher::new(Arc::clone(&registry)));

    // 5. Run startup recovery before accepting new work
    info!("Running startup recovery...");
    let recovery = RecoveryService::new(job_repo, time_provider);
    match recovery.fail_interrupted_jobs().await {
        Ok(count) => info!(failed_jobs = count, "Startup recovery completed"),
        Err(e) => tracing::error!(error = ?e, "Startup recovery failed"),
    }

    // 6. Start JSON-RPC server
    info!("Starting JSON-RPC server...");
    let rpc_config = RpcServerConfig {
        port: rpc_port,
        ..Default::default()
    };
    let rpc_server = RpcServer::new(
        rpc_config,
        bundle_service.clone(),
        registry,
        publisher,
    );
    let rpc_handle = rpc_server
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("RPC server start failed: {}", e))?;

    info!("System ready. Waiting for bundle requests...");
    info!("Press Ctrl+C to shutdown");

    // 7. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;

    info!("Shutdown signal received. Exiting gracefully...");

    // 8. Graceful shutdown: stop intake, then drain in-flight pipelines
    rpc_handle
        .stop()
        .map_err(|e| anyhow::anyhow!("RPC server stop failed: {}", e))?;

    let tracker = bundle_service.tracker();
    tracker.close();
    if tokio::time::timeout(SHUTDOWN_GRACE, tracker.wait())
        .await
        .is_err()
    {
        tracing::warn!(
            remaining = tracker.len(),
            "Shutdown grace period expired with pipelines still running"
        );
    }

    info!("Shutdown complete.");

    Ok(())
}
