use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use auditvault_application::EventRepository;
use auditvault_core::{AppError, AppResult, TenantId};
use auditvault_domain::{AuditLog, AuditLogFilter, AuditLogStats, Severity};


const BULK_INSERT_CHUNK: usize = 100;

const SELECT_COLUMNS: &str = "id, tenant_id, user_id, session_id, ip_address, user_agent, \
     action, resource_type, resource_id, message, severity, before_state, after_state, \
     metadata, timestamp, created_at, updated_at";

/// PostgreSQL-backed event repository over separate writer and reader pools.
#[derive(Clone)]
pub struct PostgresAuditLogRepository {
    writer: PgPool,
    reader: PgPool,
}

impl PostgresAuditLogRepository {
    /// Creates a repository over the writer and read-replica pools.
    #[must_use]
    pub fn new(writer: PgPool, reader: PgPool) -> Self {
        Self { writer, reader }
    }
}

#[derive(Debug, FromRow)]
struct AuditLogRow {
    id: Uuid,
    tenant_id: Uuid,
    user_id: Option<String>,
    session_id: Option<String>,
    ip_address: Option<String>,
    user_agent: Option<String>,
    action: String,
    resource_type: Option<String>,
    resource_id: Option<String>,
    message: Option<String>,
    severity: String,
    before_state: Option<Value>,
    after_state: Option<Value>,
    metadata: Option<Value>,
    timestamp: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<AuditLogRow> for AuditLog {
    type Error = AppError;

    fn try_from(row: AuditLogRow) -> AppResult<Self> {
        Ok(AuditLog {
            id: row.id,
            tenant_id: TenantId::from_uuid(row.tenant_id),
            user_id: row.user_id,
            session_id: row.session_id,
            ip_address: row.ip_address,
            user_agent: row.user_agent,
            action: row.action,
            resource_type: row.resource_type,
            resource_id: row.resource_id,
            message: row.message,
            severity: Severity::parse(&row.severity)
                .map_err(|_| AppError::Internal(format!("corrupt severity '{}'", row.severity)))?,
            before_state: row.before_state,
            after_state: row.after_state,
            metadata: row.metadata,
            timestamp: row.timestamp,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn push_log_values(builder: &mut QueryBuilder<'_, Postgres>, logs: &[AuditLog]) {
    builder.push_values(logs, |mut row, log| {
        row.push_bind(log.id)
            .push_bind(log.tenant_id.as_uuid())
            .push_bind(log.user_id.clone())
            .push_bind(log.session_id.clone())
            .push_bind(log.ip_address.clone())
            .push_bind(log.user_agent.clone())
            .push_bind(log.action.clone())
            .push_bind(log.resource_type.clone())
            .push_bind(log.resource_id.clone())
            .push_bind(log.message.clone())
            .push_bind(log.severity.as_str())
            .push_bind(log.before_state.clone())
            .push_bind(log.after_state.clone())
            .push_bind(log.metadata.clone())
            .push_bind(log.timestamp)
            .push_bind(log.created_at)
            .push_bind(log.updated_at);
    });
}

fn insert_error(error: sqlx::Error) -> AppError {
    if let Some(database_error) = error.as_database_error() {
        if database_error.code().as_deref() == Some("23505") {
            return AppError::Conflict("audit log with this id already exists".to_owned());
        }
    }
    AppError::Internal(format!("failed to store audit log: {error}"))
}

#[async_trait]
impl EventRepository for PostgresAuditLogRepository {
    async fn create(&self, log: &AuditLog) -> AppResult<()> {
        let mut builder = QueryBuilder::new(
            "INSERT INTO audit_logs (id, tenant_id, user_id, session_id, ip_address, \
             user_agent, action, resource_type, resource_id, message, severity, \
             before_state, after_state, metadata, timestamp, created_at, updated_at) ",
        );
        push_log_values(&mut builder, std::slice::from_ref(log));

        builder
            .build()
            .execute(&self.writer)
            .await
            .map_err(insert_error)?;

        Ok(())
    }

    async fn bulk_create(&self, logs: &[AuditLog]) -> AppResult<()> {
        if logs.is_empty() {
            return Ok(());
        }

        let mut transaction = self.writer.begin().await.map_err(|error| {
            AppError::Internal(format!("failed to begin bulk insert: {error}"))
        })?;

        for chunk in logs.chunks(BULK_INSERT_CHUNK) {
            let mut builder = QueryBuilder::new(
                "INSERT INTO audit_logs (id, tenant_id, user_id, session_id, ip_address, \
                 user_agent, action, resource_type, resource_id, message, severity, \
                 before_state, after_state, metadata, timestamp, created_at, updated_at) ",
            );
            push_log_values(&mut builder, chunk);

            builder
                .build()
                .execute(&mut *transaction)
                .await
                .map_err(insert_error)?;
        }

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit bulk insert: {error}"))
        })?;

        Ok(())
    }

    async fn find_by_id(&self, tenant_id: TenantId, id: Uuid) -> AppResult<Option<AuditLog>> {
        let row = sqlx::query_as::<_, AuditLogRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM audit_logs WHERE tenant_id = $1 AND id = $2 LIMIT 1"
        ))
        .bind(tenant_id.as_uuid())
        .bind(id)
        .fetch_optional(&self.reader)
        .await
        .map_err(|error| AppError::Internal(format!("failed to fetch audit log: {error}")))?;

        row.map(AuditLog::try_from).transpose()
    }

    async fn list(&self, filter: &AuditLogFilter) -> AppResult<Vec<AuditLog>> {
        let mut builder = QueryBuilder::new(format!(
            "SELECT {SELECT_COLUMNS} FROM audit_logs WHERE tenant_id = "
        ));
        builder.push_bind(filter.tenant_id.as_uuid());

        if let Some(user_id) = &filter.user_id {
            builder.push(" AND user_id = ").push_bind(user_id);
        }
        if let Some(action) = &filter.action {
            builder.push(" AND action = ").push_bind(action);
        }
        if let Some(resource_type) = &filter.resource_type {
            builder.push(" AND resource_type = ").push_bind(resource_type);
        }
        if let Some(resource_id) = &filter.resource_id {
            builder.push(" AND resource_id = ").push_bind(resource_id);
        }
        if let Some(severity) = &filter.severity {
            builder.push(" AND severity = ").push_bind(severity);
        }
        builder.push(" AND timestamp >= ").push_bind(filter.start_time);
        builder.push(" AND timestamp <= ").push_bind(filter.end_time);
        builder.push(" ORDER BY timestamp DESC");

        if filter.limit > 0 {
            builder.push(" LIMIT ").push_bind(filter.limit);
        }
        if filter.offset > 0 {
            builder.push(" OFFSET ").push_bind(filter.offset);
        }

        let rows = builder
            .build_query_as::<AuditLogRow>()
            .fetch_all(&self.reader)
            .await
            .map_err(|error| AppError::Internal(format!("failed to list audit logs: {error}")))?;

        rows.into_iter().map(AuditLog::try_from).collect()
    }

    async fn stats(&self, filter: &AuditLogFilter) -> AppResult<AuditLogStats> {
        // Windows of at most 24 hours are served from the hourly rollup;
        // anything wider scans the base table.
        let use_rollup = filter.end_time - filter.start_time <= Duration::hours(24);

        let query = if use_rollup {
            "SELECT category, key, SUM(count)::BIGINT AS count FROM (
                 SELECT 'action' AS category, action AS key, count
                 FROM audit_logs_hourly_stats
                 WHERE tenant_id = $1 AND bucket >= $2 AND bucket < $3
                 UNION ALL
                 SELECT 'severity', severity, count
                 FROM audit_logs_hourly_stats
                 WHERE tenant_id = $1 AND bucket >= $2 AND bucket < $3
                 UNION ALL
                 SELECT 'resource_type', resource_type, count
                 FROM audit_logs_hourly_stats
                 WHERE tenant_id = $1 AND bucket >= $2 AND bucket < $3
                     AND resource_type <> ''
             ) rollup GROUP BY category, key"
        } else {
            "WITH time_filtered_logs AS (
                 SELECT action, severity, resource_type FROM audit_logs
                 WHERE tenant_id = $1 AND timestamp >= $2 AND timestamp < $3
             )
             (SELECT 'action' AS category, action AS key, COUNT(*)::BIGINT AS count
              FROM time_filtered_logs GROUP BY action)
             UNION ALL
             (SELECT 'severity', severity, COUNT(*)::BIGINT
              FROM time_filtered_logs GROUP BY severity)
             UNION ALL
             (SELECT 'resource_type', resource_type, COUNT(*)::BIGINT
              FROM time_filtered_logs
              WHERE resource_type IS NOT NULL AND resource_type <> ''
              GROUP BY resource_type)"
        };

        let rows: Vec<(String, String, i64)> = sqlx::query_as(query)
            .bind(filter.tenant_id.as_uuid())
            .bind(filter.start_time)
            .bind(filter.end_time)
            .fetch_all(&self.reader)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to aggregate audit log stats: {error}"))
            })?;

        let mut stats = AuditLogStats::default();
        for (category, key, count) in rows {
            match category.as_str() {
                "action" => {
                    stats.total_logs += count;
                    stats.action_counts.insert(key, count);
                }
                "severity" => {
                    stats.severity_counts.insert(key, count);
                }
                "resource_type" => {
                    stats.resource_counts.insert(key, count);
                }
                _ => {}
            }
        }

        Ok(stats)
    }

    async fn list_before(
        &self,
        tenant_id: TenantId,
        before: DateTime<Utc>,
    ) -> AppResult<Vec<AuditLog>> {
        let rows = sqlx::query_as::<_, AuditLogRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM audit_logs \
             WHERE tenant_id = $1 AND timestamp < $2 ORDER BY timestamp DESC"
        ))
        .bind(tenant_id.as_uuid())
        .bind(before)
        .fetch_all(&self.reader)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to list audit logs for archival: {error}"))
        })?;

        rows.into_iter().map(AuditLog::try_from).collect()
    }

    async fn delete_before(&self, tenant_id: TenantId, before: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM audit_logs WHERE tenant_id = $1 AND timestamp < $2")
            .bind(tenant_id.as_uuid())
            .bind(before)
            .execute(&self.writer)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to delete audit logs: {error}"))
            })?;

        Ok(result.rows_affected())
    }
}
