use std::net::SocketAddr;

use axum::Json;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::warn;

use auditvault_application::{RateLimitDecision, RateLimitScope};
use auditvault_core::CallerIdentity;

use crate::state::AppState;

/// Per-IP budget applied before authentication. The counter substrate
/// failing must not take the API down: on error the request proceeds.
pub async fn global_rate_limit(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    let ip = client_ip(request.headers(), addr);

    match state
        .rate_limit_service
        .check(RateLimitScope::GlobalIp(&ip), state.global_rate_limit)
        .await
    {
        Ok(decision) if !decision.allowed => {
            too_many_requests("Global rate limit exceeded", &decision)
        }
        Ok(decision) => {
            let mut response = next.run(request).await;
            apply_headers(&mut response, &decision);
            response
        }
        Err(error) => {
            warn!(error = %error, "rate limiter unreachable; failing open");
            next.run(request).await
        }
    }
}

/// Per-tenant budget applied after authentication, using the tenant's
/// configured limit when one exists. Same fail-open policy.
pub async fn tenant_rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(caller) = request.extensions().get::<CallerIdentity>().cloned() else {
        return StatusCode::UNAUTHORIZED.into_response();
    };
    let tenant_id = caller.tenant_id();

    let limit = match state.tenant_service.rate_limit_for(tenant_id).await {
        Ok(Some(limit)) if limit > 0 => limit,
        Ok(_) => state.default_rate_limit,
        Err(error) => {
            warn!(%tenant_id, error = %error, "tenant budget lookup failed; using default");
            state.default_rate_limit
        }
    };

    match state
        .rate_limit_service
        .check(RateLimitScope::Tenant(tenant_id), limit)
        .await
    {
        Ok(decision) if !decision.allowed => too_many_requests("Rate limit exceeded", &decision),
        Ok(decision) => {
            let mut response = next.run(request).await;
            apply_headers(&mut response, &decision);
            response
        }
        Err(error) => {
            warn!(%tenant_id, error = %error, "rate limiter unreachable; failing open");
            next.run(request).await
        }
    }
}

/// The client address, honoring `X-Forwarded-For` when present.
fn client_ip(headers: &HeaderMap, addr: SocketAddr) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| addr.ip().to_string())
}

fn apply_headers(response: &mut Response, decision: &RateLimitDecision) {
    let headers = response.headers_mut();
    insert_header(headers, "x-ratelimit-limit", decision.limit);
    insert_header(headers, "x-ratelimit-remaining", decision.remaining);
    insert_header(headers, "x-ratelimit-reset", decision.reset_at.timestamp());
}

fn insert_header(headers: &mut axum::http::HeaderMap, name: &'static str, value: i64) {
    if let Ok(value) = HeaderValue::from_str(&value.to_string()) {
        headers.insert(
            header::HeaderName::from_static(name),
            value,
        );
    }
}

fn too_many_requests(message: &str, decision: &RateLimitDecision) -> Response {
    let mut response = (
        StatusCode::TOO_MANY_REQUESTS,
        Json(json!({
            "error": message,
            "limit": decision.limit,
            "reset": decision.reset_at.timestamp(),
        })),
    )
        .into_response();
    apply_headers(&mut response, decision);
    response
}
