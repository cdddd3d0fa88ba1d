use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use auditvault_core::TenantId;

/// Declarative retention policy for one tenant.
///
/// Policies are scheduler input only: the lifecycle workers act on concrete
/// `(tenant, before_date)` tasks derived from them. Policy names are unique
/// per tenant; rules apply in descending `priority` order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub name: String,
    pub description: Option<String>,
    pub rules: Vec<RetentionRule>,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RetentionPolicy {
    /// Rules ordered by descending priority.
    #[must_use]
    pub fn ordered_rules(&self) -> Vec<&RetentionRule> {
        let mut rules: Vec<&RetentionRule> = self.rules.iter().collect();
        rules.sort_by(|a, b| b.priority.cmp(&a.priority));
        rules
    }
}

/// One condition/action pair inside a policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetentionRule {
    pub name: String,
    pub priority: i32,
    pub conditions: RetentionConditions,
    pub actions: RetentionActions,
}

/// When a retention rule applies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetentionConditions {
    /// Age cutoff in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub older_than_seconds: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severities: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actions: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_types: Option<Vec<String>>,
    /// Keep only the most recent N records.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_records: Option<i64>,
}

/// What to do with matching records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetentionActions {
    pub archive: bool,
    pub delete: bool,
    pub compress: bool,
    pub notify_on_completion: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive_metadata: Option<Value>,
}

/// Lifecycle states of a retention job.
///
/// Only the scheduler moves `Pending` to `Running`; only the executing
/// worker writes a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetentionJobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl RetentionJobStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Whether moving to `next` respects the lifecycle state machine.
    #[must_use]
    pub fn can_transition_to(&self, next: RetentionJobStatus) -> bool {
        match self {
            Self::Pending => matches!(next, Self::Running | Self::Cancelled),
            Self::Running => next.is_terminal(),
            _ => false,
        }
    }
}

/// Execution record for one retention run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetentionJob {
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub policy_id: Uuid,
    pub status: RetentionJobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    pub processed_records: i64,
    pub archived_records: i64,
    pub deleted_records: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const DAY_SECONDS: i64 = 24 * 60 * 60;

/// Built-in policy presets offered to new tenants.
#[must_use]
pub fn default_retention_policies(tenant_id: TenantId) -> Vec<RetentionPolicy> {
    let now = Utc::now();
    let policy = |name: &str, description: &str, rules: Vec<RetentionRule>, enabled: bool| {
        RetentionPolicy {
            id: Uuid::new_v4(),
            tenant_id,
            name: name.to_owned(),
            description: Some(description.to_owned()),
            rules,
            enabled,
            created_at: now,
            updated_at: now,
        }
    };

    vec![
        policy(
            "Standard 90-Day Retention",
            "Archive logs older than 90 days, keep high-severity logs for 1 year",
            vec![
                RetentionRule {
                    name: "Archive old INFO logs".to_owned(),
                    priority: 1,
                    conditions: RetentionConditions {
                        older_than_seconds: Some(90 * DAY_SECONDS),
                        severities: Some(vec!["INFO".to_owned()]),
                        ..RetentionConditions::default()
                    },
                    actions: RetentionActions {
                        archive: true,
                        delete: true,
                        compress: true,
                        ..RetentionActions::default()
                    },
                },
                RetentionRule {
                    name: "Archive old WARNING logs".to_owned(),
                    priority: 2,
                    conditions: RetentionConditions {
                        older_than_seconds: Some(180 * DAY_SECONDS),
                        severities: Some(vec!["WARNING".to_owned()]),
                        ..RetentionConditions::default()
                    },
                    actions: RetentionActions {
                        archive: true,
                        delete: true,
                        compress: true,
                        ..RetentionActions::default()
                    },
                },
                RetentionRule {
                    name: "Keep ERROR and CRITICAL logs longer".to_owned(),
                    priority: 3,
                    conditions: RetentionConditions {
                        older_than_seconds: Some(365 * DAY_SECONDS),
                        severities: Some(vec!["ERROR".to_owned(), "CRITICAL".to_owned()]),
                        ..RetentionConditions::default()
                    },
                    actions: RetentionActions {
                        archive: true,
                        delete: true,
                        compress: true,
                        notify_on_completion: true,
                        archive_metadata: Some(serde_json::json!({
                            "retention_reason": "high_severity",
                            "compliance": "required",
                        })),
                    },
                },
            ],
            true,
        ),
        policy(
            "Compliance 7-Year Retention",
            "Long-term retention for compliance requirements",
            vec![
                RetentionRule {
                    name: "Long-term archive for compliance".to_owned(),
                    priority: 1,
                    conditions: RetentionConditions {
                        older_than_seconds: Some(30 * DAY_SECONDS),
                        ..RetentionConditions::default()
                    },
                    actions: RetentionActions {
                        archive: true,
                        compress: true,
                        archive_metadata: Some(serde_json::json!({
                            "retention_period": "7_years",
                            "compliance_type": "financial",
                        })),
                        ..RetentionActions::default()
                    },
                },
                RetentionRule {
                    name: "Delete after 7 years".to_owned(),
                    priority: 2,
                    conditions: RetentionConditions {
                        older_than_seconds: Some(7 * 365 * DAY_SECONDS),
                        ..RetentionConditions::default()
                    },
                    actions: RetentionActions {
                        delete: true,
                        notify_on_completion: true,
                        ..RetentionActions::default()
                    },
                },
            ],
            false,
        ),
        policy(
            "High-Volume Data Management",
            "Size-based retention for high-volume resource types",
            vec![RetentionRule {
                name: "Keep only recent records for high-volume resources".to_owned(),
                priority: 1,
                conditions: RetentionConditions {
                    resource_types: Some(vec!["api_request".to_owned(), "page_view".to_owned()]),
                    max_records: Some(1_000_000),
                    ..RetentionConditions::default()
                },
                actions: RetentionActions {
                    archive: true,
                    delete: true,
                    compress: true,
                    ..RetentionActions::default()
                },
            }],
            false,
        ),
    ]
}
