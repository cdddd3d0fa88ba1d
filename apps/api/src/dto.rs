use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use auditvault_core::{AppError, AppResult, CallerIdentity, TenantId};
use auditvault_domain::{AuditLogFilter, NewAuditLog, Severity, Tenant, parse_user_time};

#[derive(Debug, Deserialize)]
pub struct CreateTenantRequest {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct TenantResponse {
    pub id: TenantId,
    pub name: String,
    pub rate_limit: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Tenant> for TenantResponse {
    fn from(tenant: Tenant) -> Self {
        Self {
            id: tenant.id,
            name: tenant.name,
            rate_limit: tenant.rate_limit,
            created_at: tenant.created_at,
            updated_at: tenant.updated_at,
        }
    }
}

/// Writer-supplied event. The body's `tenant_id` is accepted as-is; the
/// route's role gate is the authorization boundary for writes.
#[derive(Debug, Deserialize)]
pub struct CreateAuditLogRequest {
    pub tenant_id: Uuid,
    pub id: Option<Uuid>,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub action: String,
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    pub severity: Option<String>,
    pub message: Option<String>,
    pub before_state: Option<Value>,
    pub after_state: Option<Value>,
    pub metadata: Option<Value>,
    pub timestamp: DateTime<Utc>,
}

impl CreateAuditLogRequest {
    pub fn into_new_audit_log(self) -> AppResult<NewAuditLog> {
        let severity = match self.severity.as_deref() {
            None | Some("") => Severity::default(),
            Some(value) => Severity::parse(value)?,
        };

        Ok(NewAuditLog {
            id: self.id,
            tenant_id: TenantId::from_uuid(self.tenant_id),
            user_id: self.user_id,
            session_id: self.session_id,
            ip_address: self.ip_address,
            user_agent: self.user_agent,
            action: self.action,
            resource_type: self.resource_type,
            resource_id: self.resource_id,
            message: self.message,
            severity,
            before_state: self.before_state,
            after_state: self.after_state,
            metadata: self.metadata,
            timestamp: self.timestamp,
        })
    }
}

/// Query parameters shared by list, export and stats.
#[derive(Debug, Default, Deserialize)]
pub struct ListLogsQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub action: Option<String>,
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    pub message: Option<String>,
    pub severity: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub format: Option<String>,
}

impl ListLogsQuery {
    /// Builds the repository filter. Tenant scope always comes from the
    /// caller's token, never from the query.
    pub fn into_filter(self, caller: &CallerIdentity) -> AppResult<AuditLogFilter> {
        let start_time = self
            .start_time
            .as_deref()
            .filter(|value| !value.is_empty())
            .ok_or_else(|| AppError::Validation("start_time is required".to_owned()))?;
        let end_time = self
            .end_time
            .as_deref()
            .filter(|value| !value.is_empty())
            .ok_or_else(|| AppError::Validation("end_time is required".to_owned()))?;

        let start_time = parse_user_time(start_time, false)?;
        let end_time = parse_user_time(end_time, true)?;
        if start_time > end_time {
            return Err(AppError::Validation(
                "start_time must be before end_time".to_owned(),
            ));
        }

        let mut filter = AuditLogFilter::time_range(caller.tenant_id(), start_time, end_time);
        filter.user_id = none_if_empty(self.user_id);
        filter.session_id = none_if_empty(self.session_id);
        filter.ip_address = none_if_empty(self.ip_address);
        filter.user_agent = none_if_empty(self.user_agent);
        filter.action = none_if_empty(self.action);
        filter.resource_type = none_if_empty(self.resource_type);
        filter.resource_id = none_if_empty(self.resource_id);
        filter.message = none_if_empty(self.message);
        filter.severity = none_if_empty(self.severity);
        filter.page = self.page.unwrap_or(0);
        filter.page_size = self.page_size.unwrap_or(0);

        Ok(filter)
    }
}

fn none_if_empty(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.is_empty())
}
