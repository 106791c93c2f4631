//! Database models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-tenant vendor connection with stored credentials
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Integration {
    pub guid: String,
    pub tenant_guid: String,
    pub provider: String,
    pub external_workspace_id: String,
    pub credential: Option<String>,
    pub webhook_secret: Option<String>,
    pub active: bool,
}

/// Normalized event produced by a webhook receiver or poller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedEvent {
    pub tenant_guid: String,
    pub service_name: String,
    pub event_type: String,
    pub occurred_at: DateTime<Utc>,
    pub source: String,
    pub metadata: serde_json::Value,
}

/// Raw per-observation counters for one integration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSample {
    pub integration_name: String,
    pub success_count: u64,
    pub failure_count: u64,
    pub avg_response_time_ms: f64,
    pub data_quality_score: f64,
    pub uptime_percentage: f64,
}

/// Derived per-(tenant, integration) fusion record, upserted on recomputation
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct FusionMetricRecord {
    pub tenant_guid: String,
    pub integration_name: String,
    pub fusion_score: f64,
    pub efficiency_index: f64,
    pub trend_7d: f64,
    pub stability_confidence: f64,
    pub last_anomaly_at: Option<String>,
}

/// Per-(tenant, integration, service) polling bookkeeping
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct IngestionState {
    pub tenant_guid: String,
    pub integration_guid: String,
    pub service_name: String,
    pub last_polled_at: Option<String>,
    pub last_event_timestamp: Option<String>,
    pub next_poll_after: Option<String>,
    pub metadata: Option<String>,
}
