//! Auditvault worker runtime hosting the index, archive and cleanup pools.

#![forbid(unsafe_code)]

use std::env;
use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::EnvFilter;

use auditvault_application::{ArchiveWorker, CleanupWorker, IndexWorker};
use auditvault_core::{AppError, AppResult};
use auditvault_infrastructure::{
    OpenSearchSearchRepository, OpenSearchTarget, PostgresAuditLogRepository, S3ArchiveConfig,
    S3ArchiveStore, SqsEventQueue, SqsQueueConfig,
};

#[derive(Debug, Clone)]
struct WorkerConfig {
    writer_database_url: String,
    reader_database_url: String,
    db_max_open_conns: u32,
    worker_count: usize,
    poll_interval: Duration,
    sqs: SqsQueueConfig,
    s3: S3ArchiveConfig,
    opensearch: OpenSearchTarget,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = WorkerConfig::load()?;

    let writer = connect_pool(&config, &config.writer_database_url).await?;
    let reader = connect_pool(&config, &config.reader_database_url).await?;

    let events = Arc::new(PostgresAuditLogRepository::new(writer, reader));
    let search = Arc::new(OpenSearchSearchRepository::connect(&config.opensearch)?);
    let queue = Arc::new(SqsEventQueue::connect(config.sqs.clone()).await);
    let archive = Arc::new(S3ArchiveStore::connect(config.s3.clone()).await);

    let mut index_worker = IndexWorker::new(
        queue.clone(),
        search,
        config.worker_count,
        config.poll_interval,
    );
    let mut archive_worker = ArchiveWorker::new(
        queue.clone(),
        events.clone(),
        archive,
        config.worker_count,
        config.poll_interval,
    );
    let mut cleanup_worker = CleanupWorker::new(
        queue,
        events,
        config.worker_count,
        config.poll_interval,
    );

    index_worker.start();
    archive_worker.start();
    cleanup_worker.start();
    info!(
        worker_count = config.worker_count,
        poll_interval_ms = config.poll_interval.as_millis() as u64,
        "auditvault-worker started"
    );

    shutdown_signal().await;
    info!("shutting down workers");

    index_worker.stop().await;
    archive_worker.stop().await;
    cleanup_worker.stop().await;
    info!("all workers stopped");

    Ok(())
}

impl WorkerConfig {
    fn load() -> AppResult<Self> {
        Ok(Self {
            writer_database_url: postgres_url("WRITER"),
            reader_database_url: postgres_url("READER"),
            db_max_open_conns: parse_env_u32("DB_MAX_OPEN_CONNS", 50)?,
            worker_count: parse_env_usize("WORKER_COUNT", 1)?,
            poll_interval: Duration::from_millis(parse_env_u64("WORKER_POLL_INTERVAL_MS", 5000)?),
            sqs: SqsQueueConfig {
                region: env_or("AWS_REGION", "us-east-1"),
                endpoint: optional_env("AWS_SQS_ENDPOINT"),
                index_queue_url: env_or(
                    "AWS_SQS_INDEX_QUEUE_URL",
                    "http://localhost:4566/000000000000/audit-log-index-queue",
                ),
                archive_queue_url: env_or(
                    "AWS_SQS_ARCHIVE_QUEUE_URL",
                    "http://localhost:4566/000000000000/audit-log-archive-queue",
                ),
                cleanup_queue_url: env_or(
                    "AWS_SQS_CLEANUP_QUEUE_URL",
                    "http://localhost:4566/000000000000/audit-log-cleanup-queue",
                ),
            },
            s3: S3ArchiveConfig {
                bucket: env_or("S3_ARCHIVE_BUCKET", "audit-log-archives"),
                region: env_or("AWS_REGION", "us-east-1"),
                endpoint: optional_env("AWS_ENDPOINT_URL"),
            },
            opensearch: OpenSearchTarget {
                host: env_or("OPENSEARCH_HOST", "localhost"),
                port: parse_env_u16("OPENSEARCH_PORT", 9200)?,
                username: optional_env("OPENSEARCH_USERNAME"),
                password: optional_env("OPENSEARCH_PASSWORD"),
            },
        })
    }
}

async fn connect_pool(config: &WorkerConfig, database_url: &str) -> AppResult<sqlx::PgPool> {
    PgPoolOptions::new()
        .max_connections(config.db_max_open_conns)
        .connect(database_url)
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))
}

fn postgres_url(role: &str) -> String {
    let host = env_or(&format!("POSTGRES_{role}_HOST"), "localhost");
    let port = env_or(&format!("POSTGRES_{role}_PORT"), "5432");
    let user = env_or(&format!("POSTGRES_{role}_USER"), "postgres");
    let password = env_or(&format!("POSTGRES_{role}_PASSWORD"), "");
    let db_name = env_or(&format!("POSTGRES_{role}_DB_NAME"), "audit_log");
    let ssl_mode = env_or(&format!("POSTGRES_{role}_SSL_MODE"), "disable");

    format!("postgres://{user}:{password}@{host}:{port}/{db_name}?sslmode={ssl_mode}")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn env_or(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| default.to_owned())
}

fn optional_env(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn parse_env_u16(name: &str, default: u16) -> AppResult<u16> {
    match env::var(name) {
        Ok(value) => value.parse::<u16>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}

fn parse_env_u32(name: &str, default: u32) -> AppResult<u32> {
    match env::var(name) {
        Ok(value) => value.parse::<u32>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}

fn parse_env_u64(name: &str, default: u64) -> AppResult<u64> {
    match env::var(name) {
        Ok(value) => value.parse::<u64>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}

fn parse_env_usize(name: &str, default: usize) -> AppResult<usize> {
    match env::var(name) {
        Ok(value) => value.parse::<usize>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}
