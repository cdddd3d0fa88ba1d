use std::collections::HashMap;
use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use auditvault_core::{AppError, AppResult, TenantId};

/// Severity of an audit event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    #[default]
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
        }
    }

    /// Parses the canonical severity labels.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "INFO" => Ok(Self::Info),
            "WARNING" => Ok(Self::Warning),
            "ERROR" => Ok(Self::Error),
            "CRITICAL" => Ok(Self::Critical),
            other => Err(AppError::Validation(format!(
                "severity must be one of INFO, WARNING, ERROR, CRITICAL, got '{other}'"
            ))),
        }
    }
}

impl Display for Severity {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// One audit record.
///
/// Identity is the composite `(id, timestamp)` because the primary store is
/// time-partitioned; `id` alone is not unique across partitions. Records are
/// append-only from the ingestion path; only the cleanup worker deletes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLog {
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub action: String,
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    pub message: Option<String>,
    #[serde(default)]
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before_state: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after_state: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    /// Event time supplied by the writer, not ingestion wall-clock.
    pub timestamp: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating an audit record. The ingestion service assigns `id`
/// when the writer did not supply one.
#[derive(Debug, Clone)]
pub struct NewAuditLog {
    pub id: Option<Uuid>,
    pub tenant_id: TenantId,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub action: String,
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    pub message: Option<String>,
    pub severity: Severity,
    pub before_state: Option<Value>,
    pub after_state: Option<Value>,
    pub metadata: Option<Value>,
    pub timestamp: DateTime<Utc>,
}

impl NewAuditLog {
    /// Validates the input and materializes a full record.
    pub fn into_audit_log(self, now: DateTime<Utc>) -> AppResult<AuditLog> {
        if self.action.trim().is_empty() {
            return Err(AppError::Validation("action is required".to_owned()));
        }

        Ok(AuditLog {
            id: self.id.unwrap_or_else(Uuid::new_v4),
            tenant_id: self.tenant_id,
            user_id: self.user_id,
            session_id: self.session_id,
            ip_address: self.ip_address,
            user_agent: self.user_agent,
            action: self.action,
            resource_type: self.resource_type,
            resource_id: self.resource_id,
            message: self.message,
            severity: self.severity,
            before_state: self.before_state,
            after_state: self.after_state,
            metadata: self.metadata,
            timestamp: self.timestamp,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Query filter for list, export and stats operations.
///
/// `tenant_id` is always rebound from the caller's token before the filter
/// reaches a repository.
#[derive(Debug, Clone)]
pub struct AuditLogFilter {
    pub tenant_id: TenantId,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub action: Option<String>,
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    pub message: Option<String>,
    pub severity: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub page: i64,
    pub page_size: i64,
    pub limit: i64,
    pub offset: i64,
}

impl AuditLogFilter {
    /// Creates a filter covering `[start_time, end_time]` for one tenant.
    #[must_use]
    pub fn time_range(
        tenant_id: TenantId,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Self {
        Self {
            tenant_id,
            user_id: None,
            session_id: None,
            ip_address: None,
            user_agent: None,
            action: None,
            resource_type: None,
            resource_id: None,
            message: None,
            severity: None,
            start_time,
            end_time,
            page: 0,
            page_size: 0,
            limit: 0,
            offset: 0,
        }
    }

    /// Whether any content predicate is present. Content predicates route
    /// the query to the search index; pure time-range queries stay on the
    /// primary store.
    #[must_use]
    pub fn has_search_criteria(&self) -> bool {
        self.user_id.is_some()
            || self.action.is_some()
            || self.resource_type.is_some()
            || self.severity.is_some()
            || self.session_id.is_some()
            || self.ip_address.is_some()
            || self.user_agent.is_some()
            || self.message.is_some()
    }

    /// Clamps pagination inputs and derives `limit`/`offset`.
    pub fn normalize_pagination(&mut self) {
        if self.page < 1 {
            self.page = 1;
        }
        if self.page_size < 1 {
            self.page_size = 10;
        }
        self.limit = self.page_size;
        self.offset = (self.page - 1) * self.page_size;
    }
}

/// Counter maps produced by the stats operations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditLogStats {
    pub total_logs: i64,
    pub action_counts: HashMap<String, i64>,
    pub severity_counts: HashMap<String, i64>,
    pub resource_counts: HashMap<String, i64>,
}
