use axum::Extension;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{delete, get, post};
use tower_http::trace::TraceLayer;

use auditvault_domain::Role;

use crate::handlers;
use crate::middleware::{self, RequiredRole};
use crate::state::AppState;

#[cfg(test)]
mod tests;

/// Assembles the full route tree with the request pipeline applied.
///
/// Pipeline order, outermost first: pattern block, sanitize, size/type,
/// global rate limit, auth, tenant rate limit, role gate. Later layers
/// wrap earlier ones, so the layer calls below appear in reverse.
pub fn build_router(state: AppState) -> Router {
    let log_routes = Router::new()
        .route(
            "/logs",
            post(handlers::logs::create_log_handler).get(handlers::logs::list_logs_handler),
        )
        .route("/logs/bulk", post(handlers::logs::bulk_create_logs_handler))
        .route("/logs/export", get(handlers::logs::export_logs_handler))
        .route("/logs/stats", get(handlers::logs::get_stats_handler))
        .route("/logs/stream", get(handlers::stream::stream_logs_handler))
        .route("/logs/{id}", get(handlers::logs::get_log_handler))
        .route_layer(from_fn(middleware::require_role))
        .layer(Extension(RequiredRole(Role::User)));

    let cleanup_routes = Router::new()
        .route("/logs/cleanup", delete(handlers::logs::cleanup_logs_handler))
        .route_layer(from_fn(middleware::require_role))
        .layer(Extension(RequiredRole(Role::Auditor)));

    let tenant_routes = Router::new()
        .route(
            "/tenants",
            post(handlers::tenants::create_tenant_handler)
                .get(handlers::tenants::list_tenants_handler),
        )
        .route_layer(from_fn(middleware::require_role))
        .layer(Extension(RequiredRole(Role::Admin)));

    let api_routes = Router::new()
        .merge(log_routes)
        .merge(cleanup_routes)
        .merge(tenant_routes)
        .layer(from_fn_with_state(
            state.clone(),
            middleware::tenant_rate_limit,
        ))
        .layer(from_fn_with_state(state.clone(), middleware::require_auth))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::global_rate_limit,
        ))
        .layer(from_fn(middleware::enforce_size_and_type))
        .layer(DefaultBodyLimit::max(middleware::MAX_BODY_BYTES))
        .layer(from_fn(middleware::sanitize_input))
        .layer(from_fn(middleware::block_suspicious_patterns));

    Router::new()
        .route("/health", get(handlers::health::health_handler))
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
