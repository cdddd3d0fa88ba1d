use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use auditvault_core::{AppError, CallerIdentity};
use auditvault_domain::{AuditLog, AuditLogStats, parse_user_time};

use crate::dto::{CreateAuditLogRequest, ListLogsQuery};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn create_log_handler(
    State(state): State<AppState>,
    Json(request): Json<CreateAuditLogRequest>,
) -> ApiResult<(StatusCode, Json<AuditLog>)> {
    let log = state
        .audit_log_service
        .create(request.into_new_audit_log()?)
        .await?;
    Ok((StatusCode::CREATED, Json(log)))
}

pub async fn bulk_create_logs_handler(
    State(state): State<AppState>,
    Json(requests): Json<Vec<CreateAuditLogRequest>>,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    let inputs = requests
        .into_iter()
        .map(CreateAuditLogRequest::into_new_audit_log)
        .collect::<Result<Vec<_>, _>>()?;

    let logs = state.audit_log_service.bulk_create(inputs).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Logs created successfully",
            "count": logs.len(),
        })),
    ))
}

pub async fn get_log_handler(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<AuditLog>> {
    let log = state
        .audit_log_service
        .find_by_id(caller.tenant_id(), id)
        .await?;
    Ok(Json(log))
}

pub async fn list_logs_handler(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Query(query): Query<ListLogsQuery>,
) -> ApiResult<Json<Vec<AuditLog>>> {
    let mut filter = query.into_filter(&caller)?;
    let logs = state.audit_log_service.list(&mut filter, true).await?;
    Ok(Json(logs))
}

pub async fn get_stats_handler(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Query(query): Query<ListLogsQuery>,
) -> ApiResult<Json<AuditLogStats>> {
    let filter = query.into_filter(&caller)?;
    let stats = state.audit_log_service.get_stats(&filter).await?;
    Ok(Json(stats))
}

/// Streams the filtered events as a JSON or CSV attachment. Export shares
/// the list filter but never paginates.
pub async fn export_logs_handler(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Query(query): Query<ListLogsQuery>,
) -> ApiResult<Response> {
    let format = query.format.clone().unwrap_or_else(|| "json".to_owned());
    if format != "json" && format != "csv" {
        return Err(AppError::Validation(
            "Invalid format. Must be 'json' or 'csv'".to_owned(),
        )
        .into());
    }

    let mut filter = query.into_filter(&caller)?;
    let logs = state.audit_log_service.list(&mut filter, false).await?;

    if format == "json" {
        let body = serde_json::to_vec(&logs)
            .map_err(|error| AppError::Internal(format!("failed to serialize export: {error}")))?;
        return Ok((
            [
                (header::CONTENT_TYPE, "application/json"),
                (
                    header::CONTENT_DISPOSITION,
                    "attachment; filename=audit_logs.json",
                ),
            ],
            body,
        )
            .into_response());
    }

    let body = logs_to_csv(&logs)?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=audit_logs.csv",
            ),
        ],
        body,
    )
        .into_response())
}

fn logs_to_csv(logs: &[AuditLog]) -> ApiResult<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    writer
        .write_record([
            "ID",
            "TenantID",
            "UserID",
            "SessionID",
            "Action",
            "ResourceType",
            "ResourceID",
            "IPAddress",
            "UserAgent",
            "Severity",
            "Message",
            "BeforeState",
            "AfterState",
            "Metadata",
            "Timestamp",
        ])
        .map_err(|error| AppError::Internal(format!("failed to write CSV header: {error}")))?;

    for log in logs {
        writer
            .write_record([
                log.id.to_string(),
                log.tenant_id.to_string(),
                log.user_id.clone().unwrap_or_default(),
                log.session_id.clone().unwrap_or_default(),
                log.action.clone(),
                log.resource_type.clone().unwrap_or_default(),
                log.resource_id.clone().unwrap_or_default(),
                log.ip_address.clone().unwrap_or_default(),
                log.user_agent.clone().unwrap_or_default(),
                log.severity.as_str().to_owned(),
                log.message.clone().unwrap_or_default(),
                json_column(&log.before_state),
                json_column(&log.after_state),
                json_column(&log.metadata),
                log.timestamp.to_rfc3339(),
            ])
            .map_err(|error| AppError::Internal(format!("failed to write CSV record: {error}")))?;
    }

    writer
        .into_inner()
        .map_err(|error| AppError::Internal(format!("failed to finish CSV export: {error}")).into())
}

fn json_column(value: &Option<serde_json::Value>) -> String {
    value
        .as_ref()
        .map(|blob| blob.to_string())
        .unwrap_or_default()
}

#[derive(Debug, serde::Deserialize)]
pub struct CleanupQuery {
    pub before_date: Option<String>,
}

/// Schedules the archive-then-delete chain for the caller's tenant and
/// returns 202 without waiting for the workers.
pub async fn cleanup_logs_handler(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Query(query): Query<CleanupQuery>,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    let before_date = query
        .before_date
        .as_deref()
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AppError::Validation("before_date parameter is required".to_owned()))?;
    let before_date = parse_user_time(before_date, true)?;

    if before_date > Utc::now() {
        return Err(
            AppError::Validation("before_date cannot be in the future".to_owned()).into(),
        );
    }

    let tenant_id = caller.tenant_id();
    state
        .audit_log_service
        .schedule_archive(tenant_id, before_date)
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "message": "Cleanup operation scheduled successfully",
            "tenant_id": tenant_id,
            "before_date": before_date.to_rfc3339(),
        })),
    ))
}
