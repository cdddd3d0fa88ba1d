use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::dto::{CreateTenantRequest, TenantResponse};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn create_tenant_handler(
    State(state): State<AppState>,
    Json(request): Json<CreateTenantRequest>,
) -> ApiResult<(StatusCode, Json<TenantResponse>)> {
    let tenant = state.tenant_service.create(&request.name).await?;
    Ok((StatusCode::CREATED, Json(tenant.into())))
}

pub async fn list_tenants_handler(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<TenantResponse>>> {
    let tenants = state
        .tenant_service
        .list()
        .await?
        .into_iter()
        .map(TenantResponse::from)
        .collect();
    Ok(Json(tenants))
}
