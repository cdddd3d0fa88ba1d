//! Auditvault API composition root.

#![forbid(unsafe_code)]

mod api_config;
mod api_router;
mod auth;
mod dto;
mod error;
mod handlers;
mod hub;
mod middleware;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tracing::info;

use auditvault_application::{
    AuditLogService, EventPubSub, RateLimitService, TenantService,
};
use auditvault_core::AppError;
use auditvault_infrastructure::{
    OpenSearchSearchRepository, PostgresAuditLogRepository, PostgresTenantRepository,
    RedisEventPubSub, RedisRateLimitRepository, SqsEventQueue,
};

use crate::api_config::{ApiConfig, init_tracing};
use crate::api_router::build_router;
use crate::auth::JwtAuthenticator;
use crate::hub::LiveHub;
use crate::state::AppState;

/// Grace period for in-flight requests on shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ApiConfig::load()?;

    let writer = connect_pool(&config, &config.writer_database_url).await?;
    let reader = connect_pool(&config, &config.reader_database_url).await?;

    sqlx::migrate!("../../crates/infrastructure/migrations")
        .run(&writer)
        .await
        .map_err(|error| AppError::Internal(format!("failed to run migrations: {error}")))?;

    info!("database connections established for writer and reader");

    let audit_log_repository = Arc::new(PostgresAuditLogRepository::new(
        writer.clone(),
        reader.clone(),
    ));
    let tenant_repository = Arc::new(PostgresTenantRepository::new(writer.clone()));
    let search_repository = Arc::new(OpenSearchSearchRepository::connect(&config.opensearch)?);
    let queue = Arc::new(SqsEventQueue::connect(config.sqs.clone()).await);
    let rate_limit_store = Arc::new(RedisRateLimitRepository::connect(&config.redis_url)?);
    let pubsub: Arc<dyn EventPubSub> = Arc::new(RedisEventPubSub::connect(&config.redis_url)?);

    let audit_log_service =
        AuditLogService::new(audit_log_repository, search_repository, queue);
    let tenant_service = TenantService::new(tenant_repository);
    let rate_limit_service = RateLimitService::new(rate_limit_store);

    // The hub is built after the ingestion service and wired back onto it.
    let live_hub = LiveHub::start(pubsub);
    audit_log_service.set_broadcaster(live_hub.clone());

    let authenticator = Arc::new(JwtAuthenticator::new(
        &config.jwt_secret_key,
        config.jwt_expiration_hours,
    ));

    let app_state = AppState {
        audit_log_service,
        tenant_service,
        rate_limit_service,
        authenticator,
        live_hub: live_hub.clone(),
        global_rate_limit: config.global_rate_limit,
        default_rate_limit: config.default_rate_limit,
    };

    let app = build_router(app_state);

    let address = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = TcpListener::bind(address)
        .await
        .map_err(|error| AppError::Internal(format!("failed to bind listener: {error}")))?;

    info!(%address, env = %config.app_env, "auditvault-api listening");

    let service = app.into_make_service_with_connect_info::<SocketAddr>();
    tokio::select! {
        result = axum::serve(listener, service).with_graceful_shutdown(shutdown_signal()) => {
            result.map_err(|error| AppError::Internal(format!("api server error: {error}")))?;
        }
        () = force_shutdown_after_grace() => {
            info!("grace period expired; forcing shutdown");
        }
    }

    live_hub.shutdown().await;
    info!("server exiting");
    Ok(())
}

async fn connect_pool(config: &ApiConfig, database_url: &str) -> Result<sqlx::PgPool, AppError> {
    PgPoolOptions::new()
        .max_connections(config.db_max_open_conns)
        .min_connections(config.db_max_idle_conns)
        .max_lifetime(Duration::from_secs(config.db_conn_max_lifetime_seconds))
        .connect(database_url)
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))
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

    info!("shutting down server");
}

async fn force_shutdown_after_grace() {
    shutdown_signal().await;
    tokio::time::sleep(SHUTDOWN_GRACE).await;
}
