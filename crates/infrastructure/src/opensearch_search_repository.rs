use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use opensearch::auth::Credentials;
use opensearch::cert::CertificateValidation;
use opensearch::http::request::JsonBody;
use opensearch::http::StatusCode;
use opensearch::http::transport::{SingleNodeConnectionPool, TransportBuilder};
use opensearch::indices::{IndicesCreateParts, IndicesExistsParts};
use opensearch::{BulkParts, IndexParts, OpenSearch, SearchParts};
use serde_json::{Value, json};
use url::Url;

use auditvault_application::SearchRepository;
use auditvault_core::{AppError, AppResult, TenantId};
use auditvault_domain::{AuditLog, AuditLogFilter};

/// Connection coordinates for the search engine.
#[derive(Debug, Clone)]
pub struct OpenSearchTarget {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// OpenSearch-backed projection of audit events, one index per
/// `(tenant, day)`.
#[derive(Clone)]
pub struct OpenSearchSearchRepository {
    client: OpenSearch,
}

/// Index name for one tenant-day: `audit_logs_<tenant>_<YYYY_MM_DD>`.
fn index_name(tenant_id: TenantId, timestamp: DateTime<Utc>) -> String {
    format!("audit_logs_{tenant_id}_{}", timestamp.format("%Y_%m_%d"))
}

/// Pattern matching every daily index of one tenant.
fn index_pattern(tenant_id: TenantId) -> String {
    format!("audit_logs_{tenant_id}_*")
}

fn index_mapping() -> Value {
    json!({
        "mappings": {
            "properties": {
                "id": { "type": "keyword" },
                "tenant_id": { "type": "keyword" },
                "user_id": { "type": "keyword" },
                "session_id": { "type": "keyword" },
                "action": { "type": "keyword" },
                "resource_type": { "type": "keyword" },
                "resource_id": { "type": "keyword" },
                "message": { "type": "text" },
                "metadata": { "type": "object", "dynamic": true },
                "before_state": { "type": "object", "dynamic": true },
                "after_state": { "type": "object", "dynamic": true },
                "severity": { "type": "keyword" },
                "timestamp": { "type": "date" },
                "ip_address": { "type": "ip" },
                "user_agent": { "type": "text" }
            }
        },
        "settings": {
            "index": {
                "number_of_shards": 1,
                "number_of_replicas": 1,
                "refresh_interval": "1s",
                "mapping": { "total_fields": { "limit": 2000 } }
            }
        }
    })
}

impl OpenSearchSearchRepository {
    /// Builds a client against a single node.
    pub fn connect(target: &OpenSearchTarget) -> AppResult<Self> {
        let url = Url::parse(&format!("http://{}:{}", target.host, target.port))
            .map_err(|error| AppError::Validation(format!("invalid OpenSearch address: {error}")))?;

        let mut builder = TransportBuilder::new(SingleNodeConnectionPool::new(url))
            .cert_validation(CertificateValidation::None);

        if let (Some(username), Some(password)) = (&target.username, &target.password) {
            builder = builder.auth(Credentials::Basic(username.clone(), password.clone()));
        }

        let transport = builder.build().map_err(|error| {
            AppError::Internal(format!("failed to build OpenSearch transport: {error}"))
        })?;

        Ok(Self {
            client: OpenSearch::new(transport),
        })
    }

    /// Creates the daily index for `(tenant, timestamp)` unless it exists.
    async fn ensure_index(&self, tenant_id: TenantId, timestamp: DateTime<Utc>) -> AppResult<String> {
        let name = index_name(tenant_id, timestamp);

        let exists = self
            .client
            .indices()
            .exists(IndicesExistsParts::Index(&[name.as_str()]))
            .send()
            .await
            .map_err(|error| {
                AppError::Unavailable(format!("failed to check index existence: {error}"))
            })?;

        if exists.status_code() == StatusCode::OK {
            return Ok(name);
        }

        let created = self
            .client
            .indices()
            .create(IndicesCreateParts::Index(&name))
            .body(index_mapping())
            .send()
            .await
            .map_err(|error| AppError::Unavailable(format!("failed to create index: {error}")))?;

        // A concurrent worker may have won the race; the write below will
        // surface any real failure.
        if !created.status_code().is_success()
            && created.status_code() != StatusCode::BAD_REQUEST
        {
            return Err(AppError::Internal(format!(
                "error creating index {name}: status {}",
                created.status_code()
            )));
        }

        Ok(name)
    }

    fn build_search_body(filter: &AuditLogFilter) -> Value {
        let mut must: Vec<Value> = Vec::new();

        let term_fields = [
            ("user_id", &filter.user_id),
            ("action", &filter.action),
            ("resource_type", &filter.resource_type),
            ("severity", &filter.severity),
            ("session_id", &filter.session_id),
            ("ip_address", &filter.ip_address),
        ];
        for (field, value) in term_fields {
            if let Some(value) = value {
                must.push(json!({ "term": { field: value } }));
            }
        }

        let text_fields = [
            ("user_agent", &filter.user_agent),
            ("message", &filter.message),
        ];
        for (field, value) in text_fields {
            if let Some(value) = value {
                must.push(json!({ "match": { field: value } }));
            }
        }

        must.push(json!({
            "range": {
                "timestamp": { "gte": filter.start_time, "lte": filter.end_time }
            }
        }));

        let mut body = json!({
            "query": { "bool": { "must": must } },
            "sort": [{ "timestamp": { "order": "desc" } }],
        });

        if filter.page > 0 && filter.page_size > 0 {
            body["from"] = json!((filter.page - 1) * filter.page_size);
            body["size"] = json!(filter.page_size);
        }

        body
    }
}

#[async_trait]
impl SearchRepository for OpenSearchSearchRepository {
    async fn index(&self, log: &AuditLog) -> AppResult<()> {
        let name = self.ensure_index(log.tenant_id, log.timestamp).await?;

        let response = self
            .client
            .index(IndexParts::IndexId(&name, &log.id.to_string()))
            .body(log)
            .send()
            .await
            .map_err(|error| AppError::Unavailable(format!("failed to index document: {error}")))?;

        if !response.status_code().is_success() {
            return Err(AppError::Internal(format!(
                "error indexing document {}: status {}",
                log.id,
                response.status_code()
            )));
        }

        Ok(())
    }

    async fn bulk_index(&self, logs: &[AuditLog]) -> AppResult<()> {
        if logs.is_empty() {
            return Ok(());
        }

        // Group by daily index so each bulk request targets one index.
        let mut groups: BTreeMap<String, Vec<&AuditLog>> = BTreeMap::new();
        for log in logs {
            groups
                .entry(index_name(log.tenant_id, log.timestamp))
                .or_default()
                .push(log);
        }

        for (name, group) in groups {
            self.ensure_index(group[0].tenant_id, group[0].timestamp)
                .await?;

            let mut body: Vec<JsonBody<Value>> = Vec::with_capacity(group.len() * 2);
            for log in &group {
                body.push(json!({ "index": { "_id": log.id.to_string() } }).into());
                body.push(serde_json::to_value(log).map_err(|error| {
                    AppError::Internal(format!("failed to serialize document: {error}"))
                })?.into());
            }

            let response = self
                .client
                .bulk(BulkParts::Index(&name))
                .body(body)
                .send()
                .await
                .map_err(|error| {
                    AppError::Unavailable(format!("failed to execute bulk request: {error}"))
                })?;

            if !response.status_code().is_success() {
                return Err(AppError::Internal(format!(
                    "bulk request for index {name} failed: status {}",
                    response.status_code()
                )));
            }
        }

        Ok(())
    }

    async fn search(&self, filter: &AuditLogFilter) -> AppResult<Vec<AuditLog>> {
        let pattern = index_pattern(filter.tenant_id);
        let body = Self::build_search_body(filter);

        let response = self
            .client
            .search(SearchParts::Index(&[pattern.as_str()]))
            .body(body)
            .send()
            .await
            .map_err(|error| AppError::Unavailable(format!("failed to execute search: {error}")))?;

        // No index yet for this tenant: nothing has been projected.
        if response.status_code() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }

        if !response.status_code().is_success() {
            return Err(AppError::Internal(format!(
                "search request failed: status {}",
                response.status_code()
            )));
        }

        let result: Value = response.json().await.map_err(|error| {
            AppError::Internal(format!("failed to decode search response: {error}"))
        })?;

        let hits = result["hits"]["hits"].as_array().cloned().unwrap_or_default();
        hits.into_iter()
            .map(|hit| {
                serde_json::from_value::<AuditLog>(hit["_source"].clone()).map_err(|error| {
                    AppError::Internal(format!("failed to decode search hit: {error}"))
                })
            })
            .collect()
    }
}
