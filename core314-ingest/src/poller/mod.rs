//! Scheduled vendor pollers
//!
//! Each poll run walks the active integrations for one provider, asks the
//! vendor API for recent activity, and records what it finds as normalized
//! integration events. Bookkeeping lives in `ingestion_state`: a run that
//! touches an integration stamps `last_polled_at` and pushes
//! `next_poll_after` out by the configured interval, and integrations still
//! inside that cooldown window are skipped rather than re-polled.
//!
//! A failing integration (bad credential, vendor outage) is reported in the
//! run's error list and never aborts the rest of the batch.

pub mod monday;
pub mod quickbooks;

use chrono::{DateTime, Duration, Utc};
use core314_common::db::init::get_setting;
use core314_common::db::models::{Integration, IngestionState, NormalizedEvent};
use core314_common::{Error, Result};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use crate::webhook::insert_event;
use crate::Provider;

/// Default minutes between polls of the same integration
pub const DEFAULT_POLL_INTERVAL_MINUTES: i64 = 15;

/// Vendor poll failure
#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Vendor API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse vendor response: {0}")]
    Parse(String),
}

/// Most recent activity reported by a vendor API
#[derive(Debug, Clone)]
pub struct VendorActivity {
    pub event_type: String,
    pub occurred_at: DateTime<Utc>,
    pub metadata: serde_json::Value,
}

/// Summary of one poll run across a provider's integrations
#[derive(Debug, Serialize)]
pub struct PollReport {
    pub processed: usize,
    pub skipped: usize,
    pub total: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

/// Poll every active integration for `provider`
pub async fn run(state: &crate::AppState, provider: Provider, now: DateTime<Utc>) -> Result<PollReport> {
    let integrations = sqlx::query_as::<_, Integration>(
        "SELECT guid, tenant_guid, provider, external_workspace_id, credential,
                webhook_secret, active
         FROM integrations
         WHERE provider = ? AND active = 1",
    )
    .bind(provider.as_str())
    .fetch_all(&state.db)
    .await?;

    let interval = poll_interval_minutes(&state.db).await?;

    let mut report = PollReport {
        processed: 0,
        skipped: 0,
        total: integrations.len(),
        errors: Vec::new(),
    };

    for integration in &integrations {
        // Bookkeeping failures for one integration are reported and the
        // rest of the batch still runs
        match in_cooldown(&state.db, integration, provider, now).await {
            Ok(true) => {
                debug!(
                    tenant = %integration.tenant_guid,
                    workspace = %integration.external_workspace_id,
                    "Integration still in poll cooldown, skipping"
                );
                report.skipped += 1;
                continue;
            }
            Ok(false) => {}
            Err(e) => {
                warn!(
                    tenant = %integration.tenant_guid,
                    workspace = %integration.external_workspace_id,
                    error = %e,
                    "Failed to read poll state; continuing batch"
                );
                report
                    .errors
                    .push(format!("{}: {}", integration.external_workspace_id, e));
                continue;
            }
        }

        let credential = match integration.credential.as_deref().filter(|c| !c.is_empty()) {
            Some(c) => c,
            None => {
                report.errors.push(format!(
                    "{}: no credential configured",
                    integration.external_workspace_id
                ));
                continue;
            }
        };

        let activity = match provider {
            Provider::Monday => {
                state
                    .monday
                    .fetch_recent_activity(credential, &integration.external_workspace_id)
                    .await
            }
            Provider::QuickBooks => {
                state
                    .quickbooks
                    .fetch_recent_changes(credential, &integration.external_workspace_id, now)
                    .await
            }
            Provider::Slack => {
                return Err(Error::InvalidInput(
                    "slack integrations are webhook-only".to_string(),
                ))
            }
        };

        match activity {
            Ok(activity) => {
                match record_poll(&state.db, provider, integration, activity.as_ref(), now, interval)
                    .await
                {
                    Ok(()) => report.processed += 1,
                    Err(e) => {
                        warn!(
                            tenant = %integration.tenant_guid,
                            workspace = %integration.external_workspace_id,
                            error = %e,
                            "Failed to record poll outcome; continuing batch"
                        );
                        report
                            .errors
                            .push(format!("{}: {}", integration.external_workspace_id, e));
                    }
                }
            }
            Err(e) => {
                warn!(
                    tenant = %integration.tenant_guid,
                    workspace = %integration.external_workspace_id,
                    error = %e,
                    "Vendor poll failed"
                );
                report
                    .errors
                    .push(format!("{}: {}", integration.external_workspace_id, e));
            }
        }
    }

    info!(
        provider = provider.as_str(),
        processed = report.processed,
        skipped = report.skipped,
        total = report.total,
        errors = report.errors.len(),
        "Poll run complete"
    );

    Ok(report)
}

async fn poll_interval_minutes(pool: &SqlitePool) -> Result<i64> {
    let interval = get_setting(pool, "poll_interval_minutes", "15")
        .await?
        .parse::<i64>()
        .unwrap_or(DEFAULT_POLL_INTERVAL_MINUTES);
    Ok(interval)
}

/// Load the bookkeeping row for one (tenant, integration, service)
async fn load_state(
    pool: &SqlitePool,
    integration: &Integration,
    provider: Provider,
) -> Result<Option<IngestionState>> {
    let state = sqlx::query_as::<_, IngestionState>(
        "SELECT tenant_guid, integration_guid, service_name, last_polled_at,
                last_event_timestamp, next_poll_after, metadata
         FROM ingestion_state
         WHERE tenant_guid = ? AND integration_guid = ? AND service_name = ?",
    )
    .bind(&integration.tenant_guid)
    .bind(&integration.guid)
    .bind(provider.as_str())
    .fetch_optional(pool)
    .await?;

    Ok(state)
}

async fn in_cooldown(
    pool: &SqlitePool,
    integration: &Integration,
    provider: Provider,
    now: DateTime<Utc>,
) -> Result<bool> {
    let state = load_state(pool, integration, provider).await?;

    let Some(next_poll_after) = state.and_then(|s| s.next_poll_after) else {
        return Ok(false);
    };

    match DateTime::parse_from_rfc3339(&next_poll_after) {
        Ok(t) => Ok(now < t.with_timezone(&Utc)),
        Err(_) => Ok(false),
    }
}

/// Persist the outcome of one integration's poll
///
/// Always stamps the bookkeeping row; inserts an event only when the vendor
/// reported activity.
async fn record_poll(
    pool: &SqlitePool,
    provider: Provider,
    integration: &Integration,
    activity: Option<&VendorActivity>,
    now: DateTime<Utc>,
    interval_minutes: i64,
) -> Result<()> {
    if let Some(activity) = activity {
        let event = NormalizedEvent {
            tenant_guid: integration.tenant_guid.clone(),
            service_name: provider.as_str().to_string(),
            event_type: activity.event_type.clone(),
            occurred_at: activity.occurred_at,
            source: "poll".to_string(),
            metadata: activity.metadata.clone(),
        };
        insert_event(pool, &event).await?;
    }

    let state = IngestionState {
        tenant_guid: integration.tenant_guid.clone(),
        integration_guid: integration.guid.clone(),
        service_name: provider.as_str().to_string(),
        last_polled_at: Some(now.to_rfc3339()),
        last_event_timestamp: activity.map(|a| a.occurred_at.to_rfc3339()),
        next_poll_after: Some((now + Duration::minutes(interval_minutes)).to_rfc3339()),
        metadata: None,
    };

    sqlx::query(
        "INSERT INTO ingestion_state
         (tenant_guid, integration_guid, service_name, last_polled_at,
          last_event_timestamp, next_poll_after)
         VALUES (?, ?, ?, ?, ?, ?)
         ON CONFLICT (tenant_guid, integration_guid, service_name) DO UPDATE SET
             last_polled_at = excluded.last_polled_at,
             last_event_timestamp = COALESCE(excluded.last_event_timestamp,
                                             ingestion_state.last_event_timestamp),
             next_poll_after = excluded.next_poll_after",
    )
    .bind(&state.tenant_guid)
    .bind(&state.integration_guid)
    .bind(&state.service_name)
    .bind(&state.last_polled_at)
    .bind(&state.last_event_timestamp)
    .bind(&state.next_poll_after)
    .execute(pool)
    .await?;

    Ok(())
}
