use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, StatusCode};
use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use tokio::sync::{Mutex, mpsc};
use tower::ServiceExt;
use uuid::Uuid;

use auditvault_application::{
    AttemptInfo, AuditLogService, EventPubSub, EventQueue, EventRepository, QueueKind,
    QueueMessage, QueueMessageType, RateLimitService, RateLimitStore, ReceivedMessage,
    SearchRepository, TenantRepository, TenantService,
};
use auditvault_core::{AppError, AppResult, TenantId};
use auditvault_domain::{AuditLog, AuditLogFilter, AuditLogStats, Tenant};

use super::build_router;
use crate::auth::JwtAuthenticator;
use crate::hub::LiveHub;
use crate::state::AppState;

const TEST_SECRET: &str = "router-test-secret";

#[derive(Default)]
struct FakeEvents {
    logs: Mutex<Vec<AuditLog>>,
    reads: Mutex<usize>,
}

#[async_trait]
impl EventRepository for FakeEvents {
    async fn create(&self, log: &AuditLog) -> AppResult<()> {
        let mut logs = self.logs.lock().await;
        if logs.iter().any(|existing| existing.id == log.id) {
            return Err(AppError::Conflict(
                "audit log with this id already exists".to_owned(),
            ));
        }
        logs.push(log.clone());
        Ok(())
    }

    async fn bulk_create(&self, logs: &[AuditLog]) -> AppResult<()> {
        self.logs.lock().await.extend_from_slice(logs);
        Ok(())
    }

    async fn find_by_id(&self, tenant_id: TenantId, id: Uuid) -> AppResult<Option<AuditLog>> {
        *self.reads.lock().await += 1;
        Ok(self
            .logs
            .lock()
            .await
            .iter()
            .find(|log| log.tenant_id == tenant_id && log.id == id)
            .cloned())
    }

    async fn list(&self, filter: &AuditLogFilter) -> AppResult<Vec<AuditLog>> {
        *self.reads.lock().await += 1;
        let mut matching: Vec<AuditLog> = self
            .logs
            .lock()
            .await
            .iter()
            .filter(|log| {
                log.tenant_id == filter.tenant_id
                    && log.timestamp >= filter.start_time
                    && log.timestamp <= filter.end_time
            })
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(matching)
    }

    async fn stats(&self, filter: &AuditLogFilter) -> AppResult<AuditLogStats> {
        *self.reads.lock().await += 1;
        let total = self
            .logs
            .lock()
            .await
            .iter()
            .filter(|log| log.tenant_id == filter.tenant_id)
            .count() as i64;
        Ok(AuditLogStats {
            total_logs: total,
            ..AuditLogStats::default()
        })
    }

    async fn list_before(
        &self,
        tenant_id: TenantId,
        before: DateTime<Utc>,
    ) -> AppResult<Vec<AuditLog>> {
        Ok(self
            .logs
            .lock()
            .await
            .iter()
            .filter(|log| log.tenant_id == tenant_id && log.timestamp < before)
            .cloned()
            .collect())
    }

    async fn delete_before(&self, tenant_id: TenantId, before: DateTime<Utc>) -> AppResult<u64> {
        let mut logs = self.logs.lock().await;
        let initial = logs.len();
        logs.retain(|log| !(log.tenant_id == tenant_id && log.timestamp < before));
        Ok((initial - logs.len()) as u64)
    }
}

#[derive(Default)]
struct FakeSearch {
    searches: Mutex<usize>,
}

#[async_trait]
impl SearchRepository for FakeSearch {
    async fn index(&self, _log: &AuditLog) -> AppResult<()> {
        Ok(())
    }

    async fn bulk_index(&self, _logs: &[AuditLog]) -> AppResult<()> {
        Ok(())
    }

    async fn search(&self, _filter: &AuditLogFilter) -> AppResult<Vec<AuditLog>> {
        *self.searches.lock().await += 1;
        Ok(Vec::new())
    }
}

#[derive(Default)]
struct FakeQueue {
    sent: Mutex<Vec<(QueueKind, QueueMessage)>>,
}

#[async_trait]
impl EventQueue for FakeQueue {
    async fn send(&self, kind: QueueKind, message: &QueueMessage) -> AppResult<()> {
        self.sent.lock().await.push((kind, message.clone()));
        Ok(())
    }

    async fn receive(
        &self,
        _kind: QueueKind,
        _max_messages: i32,
        _wait_seconds: i32,
    ) -> AppResult<Vec<ReceivedMessage>> {
        Ok(Vec::new())
    }

    async fn delete(&self, _kind: QueueKind, _receipt_handle: &str) -> AppResult<()> {
        Ok(())
    }
}

#[derive(Default)]
struct FakeTenants {
    tenants: Mutex<Vec<Tenant>>,
}

#[async_trait]
impl TenantRepository for FakeTenants {
    async fn create(&self, name: &str, rate_limit: i64) -> AppResult<Tenant> {
        let tenant = Tenant {
            id: TenantId::new(),
            name: name.to_owned(),
            rate_limit,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        self.tenants.lock().await.push(tenant.clone());
        Ok(tenant)
    }

    async fn list(&self) -> AppResult<Vec<Tenant>> {
        Ok(self.tenants.lock().await.clone())
    }

    async fn find_by_id(&self, tenant_id: TenantId) -> AppResult<Option<Tenant>> {
        Ok(self
            .tenants
            .lock()
            .await
            .iter()
            .find(|tenant| tenant.id == tenant_id)
            .cloned())
    }

    async fn rate_limit_for(&self, tenant_id: TenantId) -> AppResult<Option<i64>> {
        Ok(self
            .tenants
            .lock()
            .await
            .iter()
            .find(|tenant| tenant.id == tenant_id)
            .map(|tenant| tenant.rate_limit))
    }
}

#[derive(Default)]
struct FakeRateStore {
    counts: Mutex<HashMap<String, i64>>,
}

#[async_trait]
impl RateLimitStore for FakeRateStore {
    async fn record_attempt(
        &self,
        key: &str,
        _window_duration_seconds: i64,
    ) -> AppResult<AttemptInfo> {
        let mut counts = self.counts.lock().await;
        let count = counts.entry(key.to_owned()).or_insert(0);
        *count += 1;
        Ok(AttemptInfo {
            attempt_count: *count,
            window_started_at: Utc::now(),
        })
    }
}

struct NoopPubSub;

#[async_trait]
impl EventPubSub for NoopPubSub {
    async fn publish(&self, _log: &AuditLog) -> AppResult<()> {
        Ok(())
    }

    async fn subscribe(
        &self,
        _tenant_id: TenantId,
        _sink: mpsc::Sender<AuditLog>,
    ) -> AppResult<()> {
        Ok(())
    }

    async fn unsubscribe(&self, _tenant_id: TenantId) {}

    async fn close(&self) {}
}

struct Harness {
    app: Router,
    authenticator: Arc<JwtAuthenticator>,
    events: Arc<FakeEvents>,
    search: Arc<FakeSearch>,
    queue: Arc<FakeQueue>,
}

fn harness_with_global_limit(global_rate_limit: i64) -> Harness {
    let events = Arc::new(FakeEvents::default());
    let search = Arc::new(FakeSearch::default());
    let queue = Arc::new(FakeQueue::default());
    let tenants = Arc::new(FakeTenants::default());
    let rate_store = Arc::new(FakeRateStore::default());
    let authenticator = Arc::new(JwtAuthenticator::new(TEST_SECRET, 24));

    let audit_log_service = AuditLogService::new(events.clone(), search.clone(), queue.clone());
    let live_hub = LiveHub::start(Arc::new(NoopPubSub));
    audit_log_service.set_broadcaster(live_hub.clone());

    let state = AppState {
        audit_log_service,
        tenant_service: TenantService::new(tenants),
        rate_limit_service: RateLimitService::new(rate_store),
        authenticator: authenticator.clone(),
        live_hub,
        global_rate_limit,
        default_rate_limit: 1000,
    };

    Harness {
        app: build_router(state),
        authenticator,
        events,
        search,
        queue,
    }
}

fn harness() -> Harness {
    harness_with_global_limit(10_000)
}

fn token_for(harness: &Harness, tenant_id: Uuid, roles: &[&str]) -> String {
    harness
        .authenticator
        .generate(
            "user-1",
            tenant_id,
            roles.iter().map(|role| (*role).to_owned()).collect(),
        )
        .expect("token signs")
}

fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }

    let body = match body {
        Some(value) => {
            builder = builder.header("content-type", "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };

    let mut request = builder.body(body).expect("request builds");
    request
        .extensions_mut()
        .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 40000))));
    request
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body reads");
    serde_json::from_slice(&bytes).expect("body is json")
}

fn create_log_body(tenant_id: Uuid) -> Value {
    json!({
        "tenant_id": tenant_id,
        "action": "CREATE",
        "resource_type": "user",
        "resource_id": "u1",
        "severity": "INFO",
        "message": "hi",
        "timestamp": "2025-01-02T03:04:05Z",
    })
}

const RANGE: &str = "start_time=2025-01-01T00:00:00Z&end_time=2025-01-03T00:00:00Z";

#[tokio::test]
async fn health_needs_no_credentials() {
    let harness = harness();
    let response = harness
        .app
        .oneshot(request("GET", "/health", None, None))
        .await
        .expect("request completes");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "status": "ok" }));
}

#[tokio::test]
async fn missing_token_is_unauthorized() {
    let harness = harness();
    let response = harness
        .app
        .oneshot(request("GET", &format!("/api/v1/logs?{RANGE}"), None, None))
        .await
        .expect("request completes");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn suspicious_query_is_blocked_before_any_backend() {
    let harness = harness();
    let tenant_id = Uuid::new_v4();
    let token = token_for(&harness, tenant_id, &["user"]);

    let response = harness
        .app
        .clone()
        .oneshot(request(
            "GET",
            "/api/v1/logs?user_id=%27%20OR%201%3D1%20--",
            Some(&token),
            None,
        ))
        .await
        .expect("request completes");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await, json!({ "error": "Invalid request" }));
    assert_eq!(*harness.events.reads.lock().await, 0);
    assert_eq!(*harness.search.searches.lock().await, 0);
}

#[tokio::test]
async fn tenant_routes_require_the_admin_role() {
    let harness = harness();
    let tenant_id = Uuid::new_v4();

    let user_token = token_for(&harness, tenant_id, &["user", "auditor"]);
    let denied = harness
        .app
        .clone()
        .oneshot(request("GET", "/api/v1/tenants", Some(&user_token), None))
        .await
        .expect("request completes");
    assert_eq!(denied.status(), StatusCode::FORBIDDEN);

    let admin_token = token_for(&harness, tenant_id, &["admin"]);
    let allowed = harness
        .app
        .clone()
        .oneshot(request("GET", "/api/v1/tenants", Some(&admin_token), None))
        .await
        .expect("request completes");
    assert_eq!(allowed.status(), StatusCode::OK);
}

#[tokio::test]
async fn cleanup_requires_the_auditor_role_and_schedules_archive() {
    let harness = harness();
    let tenant_id = Uuid::new_v4();

    let user_token = token_for(&harness, tenant_id, &["user"]);
    let denied = harness
        .app
        .clone()
        .oneshot(request(
            "DELETE",
            "/api/v1/logs/cleanup?before_date=2025-01-01",
            Some(&user_token),
            None,
        ))
        .await
        .expect("request completes");
    assert_eq!(denied.status(), StatusCode::FORBIDDEN);
    assert!(harness.queue.sent.lock().await.is_empty());

    let auditor_token = token_for(&harness, tenant_id, &["auditor"]);
    let accepted = harness
        .app
        .clone()
        .oneshot(request(
            "DELETE",
            "/api/v1/logs/cleanup?before_date=2025-01-01",
            Some(&auditor_token),
            None,
        ))
        .await
        .expect("request completes");
    assert_eq!(accepted.status(), StatusCode::ACCEPTED);

    let sent = harness.queue.sent.lock().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, QueueKind::Archive);
    assert_eq!(sent[0].1.message_type, QueueMessageType::Archive);
    assert_eq!(sent[0].1.tenant_id.as_uuid(), tenant_id);
}

#[tokio::test]
async fn cleanup_rejects_future_cutoffs() {
    let harness = harness();
    let token = token_for(&harness, Uuid::new_v4(), &["auditor"]);

    let response = harness
        .app
        .oneshot(request(
            "DELETE",
            "/api/v1/logs/cleanup?before_date=2999-01-01",
            Some(&token),
            None,
        ))
        .await
        .expect("request completes");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn created_logs_are_fetchable_within_their_tenant_only() {
    let harness = harness();
    let tenant_id = Uuid::new_v4();
    let token = token_for(&harness, tenant_id, &["user"]);

    let created = harness
        .app
        .clone()
        .oneshot(request(
            "POST",
            "/api/v1/logs",
            Some(&token),
            Some(create_log_body(tenant_id)),
        ))
        .await
        .expect("request completes");
    assert_eq!(created.status(), StatusCode::CREATED);
    let created_body = body_json(created).await;
    let log_id = created_body["id"].as_str().expect("id present").to_owned();

    // The index enqueue happened on the index queue.
    {
        let sent = harness.queue.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, QueueKind::Index);
        assert_eq!(sent[0].1.message_type, QueueMessageType::Index);
    }

    let fetched = harness
        .app
        .clone()
        .oneshot(request(
            "GET",
            &format!("/api/v1/logs/{log_id}"),
            Some(&token),
            None,
        ))
        .await
        .expect("request completes");
    assert_eq!(fetched.status(), StatusCode::OK);
    assert_eq!(body_json(fetched).await["tenant_id"], json!(tenant_id));

    let foreign_token = token_for(&harness, Uuid::new_v4(), &["user"]);
    let cross_tenant = harness
        .app
        .clone()
        .oneshot(request(
            "GET",
            &format!("/api/v1/logs/{log_id}"),
            Some(&foreign_token),
            None,
        ))
        .await
        .expect("request completes");
    assert_eq!(cross_tenant.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn list_requires_a_time_range() {
    let harness = harness();
    let token = token_for(&harness, Uuid::new_v4(), &["user"]);

    let response = harness
        .app
        .oneshot(request("GET", "/api/v1/logs", Some(&token), None))
        .await
        .expect("request completes");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn list_returns_only_the_callers_tenant() {
    let harness = harness();
    let tenant_id = Uuid::new_v4();
    let token = token_for(&harness, tenant_id, &["user"]);

    for target in [tenant_id, Uuid::new_v4()] {
        let response = harness
            .app
            .clone()
            .oneshot(request(
                "POST",
                "/api/v1/logs",
                Some(&token),
                Some(create_log_body(target)),
            ))
            .await
            .expect("request completes");
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let listed = harness
        .app
        .oneshot(request(
            "GET",
            &format!("/api/v1/logs?{RANGE}"),
            Some(&token),
            None,
        ))
        .await
        .expect("request completes");
    assert_eq!(listed.status(), StatusCode::OK);

    let logs = body_json(listed).await;
    let logs = logs.as_array().expect("array body");
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0]["tenant_id"], json!(tenant_id));
}

#[tokio::test]
async fn breaching_the_global_budget_returns_429_with_headers() {
    let harness = harness_with_global_limit(2);
    let token = token_for(&harness, Uuid::new_v4(), &["user"]);
    let uri = format!("/api/v1/logs?{RANGE}");

    for _ in 0..2 {
        let response = harness
            .app
            .clone()
            .oneshot(request("GET", &uri, Some(&token), None))
            .await
            .expect("request completes");
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-ratelimit-limit"));
        assert!(response.headers().contains_key("x-ratelimit-reset"));
    }

    let limited = harness
        .app
        .oneshot(request("GET", &uri, Some(&token), None))
        .await
        .expect("request completes");
    assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(
        limited.headers()["x-ratelimit-remaining"],
        "0",
        "remaining must be zero on the breach"
    );

    let body = body_json(limited).await;
    assert_eq!(body["limit"], 2);
    assert!(body["error"].as_str().is_some());
    assert!(body["reset"].as_i64().is_some());
}

#[tokio::test]
async fn oversized_declared_bodies_are_rejected() {
    let harness = harness();
    let token = token_for(&harness, Uuid::new_v4(), &["user"]);

    let mut request = Request::builder()
        .method("POST")
        .uri("/api/v1/logs")
        .header("authorization", format!("Bearer {token}"))
        .header("content-type", "application/json")
        .header("content-length", (11 * 1024 * 1024).to_string())
        .body(Body::empty())
        .expect("request builds");
    request
        .extensions_mut()
        .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 40000))));

    let response = harness.app.oneshot(request).await.expect("request completes");
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn unsupported_content_types_are_rejected() {
    let harness = harness();
    let token = token_for(&harness, Uuid::new_v4(), &["user"]);

    let mut request = Request::builder()
        .method("POST")
        .uri("/api/v1/logs")
        .header("authorization", format!("Bearer {token}"))
        .header("content-type", "application/xml")
        .body(Body::from("<log/>"))
        .expect("request builds");
    request
        .extensions_mut()
        .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 40000))));

    let response = harness.app.oneshot(request).await.expect("request completes");
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn csv_export_carries_the_header_row() {
    let harness = harness();
    let tenant_id = Uuid::new_v4();
    let token = token_for(&harness, tenant_id, &["user"]);

    let created = harness
        .app
        .clone()
        .oneshot(request(
            "POST",
            "/api/v1/logs",
            Some(&token),
            Some(create_log_body(tenant_id)),
        ))
        .await
        .expect("request completes");
    assert_eq!(created.status(), StatusCode::CREATED);

    let exported = harness
        .app
        .oneshot(request(
            "GET",
            &format!("/api/v1/logs/export?format=csv&{RANGE}"),
            Some(&token),
            None,
        ))
        .await
        .expect("request completes");
    assert_eq!(exported.status(), StatusCode::OK);
    assert_eq!(exported.headers()["content-type"], "text/csv");

    let bytes = axum::body::to_bytes(exported.into_body(), usize::MAX)
        .await
        .expect("body reads");
    let text = String::from_utf8(bytes.to_vec()).expect("utf8 body");
    assert!(text.starts_with("ID,TenantID"));
    assert_eq!(text.lines().count(), 2);
}
