use std::env;

use auditvault_core::{AppError, AppResult};
use auditvault_infrastructure::{OpenSearchTarget, S3ArchiveConfig, SqsQueueConfig};
use tracing_subscriber::EnvFilter;

/// Runtime configuration for the API binary, loaded from the environment.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub server_port: u16,
    pub app_env: String,
    pub jwt_secret_key: String,
    pub jwt_expiration_hours: i64,
    pub default_rate_limit: i64,
    pub global_rate_limit: i64,
    pub writer_database_url: String,
    pub reader_database_url: String,
    pub db_max_open_conns: u32,
    pub db_max_idle_conns: u32,
    pub db_conn_max_lifetime_seconds: u64,
    pub redis_url: String,
    pub sqs: SqsQueueConfig,
    pub s3: S3ArchiveConfig,
    pub opensearch: OpenSearchTarget,
}

impl ApiConfig {
    pub fn load() -> AppResult<Self> {
        let server_port = parse_env_u16("SERVER_PORT", 10_000)?;
        let app_env = env_or("APP_ENV", "development");

        let jwt_secret_key = required_env("JWT_SECRET_KEY")?;
        let jwt_expiration_hours = parse_env_i64("JWT_EXPIRATION_HOURS", 24)?;

        let default_rate_limit = parse_env_i64("DEFAULT_RATE_LIMIT", 1000)?;
        let global_rate_limit = parse_env_i64("GLOBAL_RATE_LIMIT", 10_000)?;

        Ok(Self {
            server_port,
            app_env,
            jwt_secret_key,
            jwt_expiration_hours,
            default_rate_limit,
            global_rate_limit,
            writer_database_url: postgres_url("WRITER"),
            reader_database_url: postgres_url("READER"),
            db_max_open_conns: parse_env_u32("DB_MAX_OPEN_CONNS", 50)?,
            db_max_idle_conns: parse_env_u32("DB_MAX_IDLE_CONNS", 10)?,
            db_conn_max_lifetime_seconds: parse_env_duration_seconds("DB_CONN_MAX_LIFETIME", 3600)?,
            redis_url: redis_url(),
            sqs: sqs_config(),
            s3: s3_config(),
            opensearch: opensearch_target()?,
        })
    }
}

/// Builds the DSN for one side of the writer/reader split from
/// `POSTGRES_<ROLE>_*` variables.
pub fn postgres_url(role: &str) -> String {
    let host = env_or(&format!("POSTGRES_{role}_HOST"), "localhost");
    let port = env_or(&format!("POSTGRES_{role}_PORT"), "5432");
    let user = env_or(&format!("POSTGRES_{role}_USER"), "postgres");
    let password = env_or(&format!("POSTGRES_{role}_PASSWORD"), "");
    let db_name = env_or(&format!("POSTGRES_{role}_DB_NAME"), "audit_log");
    let ssl_mode = env_or(&format!("POSTGRES_{role}_SSL_MODE"), "disable");

    format!("postgres://{user}:{password}@{host}:{port}/{db_name}?sslmode={ssl_mode}")
}

pub fn redis_url() -> String {
    let host = env_or("REDIS_HOST", "localhost");
    let port = env_or("REDIS_PORT", "6379");
    let password = env_or("REDIS_PASSWORD", "");

    if password.is_empty() {
        format!("redis://{host}:{port}")
    } else {
        format!("redis://:{password}@{host}:{port}")
    }
}

pub fn sqs_config() -> SqsQueueConfig {
    SqsQueueConfig {
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
    }
}

pub fn s3_config() -> S3ArchiveConfig {
    S3ArchiveConfig {
        bucket: env_or("S3_ARCHIVE_BUCKET", "audit-log-archives"),
        region: env_or("AWS_REGION", "us-east-1"),
        endpoint: optional_env("AWS_ENDPOINT_URL"),
    }
}

pub fn opensearch_target() -> AppResult<OpenSearchTarget> {
    Ok(OpenSearchTarget {
        host: env_or("OPENSEARCH_HOST", "localhost"),
        port: parse_env_u16("OPENSEARCH_PORT", 9200)?,
        username: optional_env("OPENSEARCH_USERNAME"),
        password: optional_env("OPENSEARCH_PASSWORD"),
    })
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

pub fn required_env(name: &str) -> AppResult<String> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}

pub fn env_or(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| default.to_owned())
}

pub fn optional_env(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

pub fn parse_env_u16(name: &str, default: u16) -> AppResult<u16> {
    match env::var(name) {
        Ok(value) => value.parse::<u16>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}

pub fn parse_env_u32(name: &str, default: u32) -> AppResult<u32> {
    match env::var(name) {
        Ok(value) => value.parse::<u32>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}

pub fn parse_env_u64(name: &str, default: u64) -> AppResult<u64> {
    match env::var(name) {
        Ok(value) => value.parse::<u64>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}

pub fn parse_env_i64(name: &str, default: i64) -> AppResult<i64> {
    match env::var(name) {
        Ok(value) => value.parse::<i64>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}

/// Parses a duration that is either bare seconds or carries an `s`, `m` or
/// `h` suffix (the form the deployment manifests use, e.g. `1h`).
pub fn parse_env_duration_seconds(name: &str, default: u64) -> AppResult<u64> {
    let Ok(value) = env::var(name) else {
        return Ok(default);
    };

    let value = value.trim();
    let (digits, scale) = match value.as_bytes().last() {
        Some(b'h') => (&value[..value.len() - 1], 3600),
        Some(b'm') => (&value[..value.len() - 1], 60),
        Some(b's') => (&value[..value.len() - 1], 1),
        _ => (value, 1),
    };

    digits
        .parse::<u64>()
        .map(|seconds| seconds * scale)
        .map_err(|error| AppError::Validation(format!("invalid {name} value '{value}': {error}")))
}
