use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::primitives::ByteStream;
use chrono::{DateTime, Utc};
use tracing::info;

use auditvault_application::{ArchiveStore, LogArchive};
use auditvault_core::{AppError, AppResult, TenantId};

/// Connection coordinates for the archive bucket.
#[derive(Debug, Clone)]
pub struct S3ArchiveConfig {
    pub bucket: String,
    pub region: String,
    /// Custom endpoint for LocalStack-style deployments.
    pub endpoint: Option<String>,
}

/// S3-backed store for immutable archive envelopes.
#[derive(Clone)]
pub struct S3ArchiveStore {
    client: aws_sdk_s3::Client,
    bucket: String,
}

/// Object key for one archived window:
/// `audit-logs/<tenant>/audit_logs_<tenant>_before_<YYYY-MM-DD_HH-MM-SS>.json`.
fn archive_object_key(tenant_id: TenantId, before_date: DateTime<Utc>) -> String {
    format!(
        "audit-logs/{tenant_id}/audit_logs_{tenant_id}_before_{}.json",
        before_date.format("%Y-%m-%d_%H-%M-%S")
    )
}

impl S3ArchiveStore {
    /// Builds the S3 client. Custom endpoints switch to path-style
    /// addressing, which LocalStack requires.
    pub async fn connect(config: S3ArchiveConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));
        if let Some(endpoint) = &config.endpoint {
            loader = loader.endpoint_url(endpoint.clone());
        }
        let shared = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if config.endpoint.is_some() {
            builder = builder.force_path_style(true);
        }

        Self {
            client: aws_sdk_s3::Client::from_conf(builder.build()),
            bucket: config.bucket,
        }
    }
}

#[async_trait]
impl ArchiveStore for S3ArchiveStore {
    async fn store(&self, archive: &LogArchive) -> AppResult<String> {
        let key = archive_object_key(archive.tenant_id, archive.before_date);

        let body = serde_json::to_vec_pretty(archive).map_err(|error| {
            AppError::Internal(format!("failed to serialize archive envelope: {error}"))
        })?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(body))
            .content_type("application/json")
            .metadata("tenant-id", archive.tenant_id.to_string())
            .metadata("archived-at", archive.archived_at.to_rfc3339())
            .metadata("log-count", archive.log_count.to_string())
            .metadata("before-date", archive.before_date.to_rfc3339())
            .send()
            .await
            .map_err(|error| {
                AppError::Unavailable(format!("failed to upload archive object: {error}"))
            })?;

        info!(bucket = %self.bucket, key = %key, count = archive.log_count, "uploaded archive");

        Ok(key)
    }
}
