//! Generic webhook receive pipeline
//!
//! Order of operations for every provider:
//!
//! 1. Parse the vendor JSON body (malformed bodies are the caller's fault
//!    and get a 400).
//! 2. Look up the owning tenant via the embedded workspace identifier and
//!    verify the HMAC signature against that integration's stored secret.
//!    Verification is skipped only when the integration has no secret.
//! 3. Answer challenge/verification handshakes immediately.
//! 4. Normalize the event, insert it plus an automation-hook record.
//!
//! Once the signature has passed, the response is always 200 even when no
//! owning tenant is found or a downstream insert fails. Vendors retry on
//! non-2xx responses and a retry storm helps nobody; failures are logged
//! instead.

pub mod monday;
pub mod slack;

use chrono::{DateTime, Utc};
use core314_common::api::signature::{verify, SignatureError};
use core314_common::db::models::{Integration, NormalizedEvent};
use core314_common::Result;
use sqlx::SqlitePool;
use tracing::{error, warn};
use uuid::Uuid;

use crate::Provider;

/// Provider-independent view of a parsed webhook body
#[derive(Debug, Clone, Default)]
pub struct ParsedWebhook {
    /// Workspace/team/board identifier embedded in the payload
    pub workspace_id: Option<String>,
    /// Challenge value for a verification handshake
    pub challenge: Option<String>,
    pub event_type: Option<String>,
    pub occurred_at: Option<DateTime<Utc>>,
    pub metadata: serde_json::Value,
}

/// What the HTTP layer should do with a delivery
#[derive(Debug)]
pub enum WebhookOutcome {
    /// Respond 200 with `{"challenge": ...}`
    Challenge(String),
    /// Respond 200 `{"ok": true}`
    Accepted,
    /// Respond 401
    Rejected(SignatureError),
}

/// Signature header names for a provider: (signature, timestamp)
pub fn signature_headers(provider: Provider) -> (&'static str, &'static str) {
    match provider {
        Provider::Slack => ("x-slack-signature", "x-slack-request-timestamp"),
        Provider::Monday => ("x-monday-signature", "x-monday-request-timestamp"),
        Provider::QuickBooks => ("intuit-signature", "intuit-request-timestamp"),
    }
}

/// Run the full receive pipeline for one delivery
///
/// `signature` and `timestamp` are the raw header values, when present.
pub async fn process(
    pool: &SqlitePool,
    provider: Provider,
    parsed: ParsedWebhook,
    raw_body: &str,
    signature: Option<&str>,
    timestamp: Option<i64>,
    now_secs: i64,
    tolerance_secs: i64,
) -> Result<WebhookOutcome> {
    let integration = match &parsed.workspace_id {
        Some(workspace_id) => find_integration(pool, provider, workspace_id).await?,
        None => None,
    };

    // Signature check comes before everything else, challenge included
    if let Some(integration) = &integration {
        if let Some(secret) = integration.webhook_secret.as_deref().filter(|s| !s.is_empty()) {
            let signature = match signature {
                Some(s) => s,
                None => return Ok(WebhookOutcome::Rejected(SignatureError::MissingSignature)),
            };
            let timestamp = match timestamp {
                Some(t) => t,
                None => return Ok(WebhookOutcome::Rejected(SignatureError::MissingTimestamp)),
            };
            if let Err(e) = verify(secret, signature, timestamp, raw_body, now_secs, tolerance_secs) {
                warn!(provider = provider.as_str(), error = %e, "Webhook signature rejected");
                return Ok(WebhookOutcome::Rejected(e));
            }
        }
    }

    if let Some(challenge) = parsed.challenge {
        return Ok(WebhookOutcome::Challenge(challenge));
    }

    let integration = match integration {
        Some(integration) => integration,
        None => {
            // Accepted but unroutable; 200 prevents vendor retry storms
            warn!(
                provider = provider.as_str(),
                workspace = parsed.workspace_id.as_deref().unwrap_or("<missing>"),
                "Webhook for unknown workspace; acknowledging without processing"
            );
            return Ok(WebhookOutcome::Accepted);
        }
    };

    // Downstream failures are logged, never surfaced to the vendor
    if let Err(e) = record_event(pool, provider, &integration, &parsed).await {
        error!(
            provider = provider.as_str(),
            tenant = %integration.tenant_guid,
            error = %e,
            "Failed to record webhook event"
        );
    }

    Ok(WebhookOutcome::Accepted)
}

async fn find_integration(
    pool: &SqlitePool,
    provider: Provider,
    workspace_id: &str,
) -> Result<Option<Integration>> {
    let integration = sqlx::query_as::<_, Integration>(
        "SELECT guid, tenant_guid, provider, external_workspace_id, credential,
                webhook_secret, active
         FROM integrations
         WHERE provider = ? AND external_workspace_id = ? AND active = 1",
    )
    .bind(provider.as_str())
    .bind(workspace_id)
    .fetch_optional(pool)
    .await?;

    Ok(integration)
}

/// Insert the normalized event plus its follow-up automation hook
async fn record_event(
    pool: &SqlitePool,
    provider: Provider,
    integration: &Integration,
    parsed: &ParsedWebhook,
) -> Result<()> {
    let event = NormalizedEvent {
        tenant_guid: integration.tenant_guid.clone(),
        service_name: provider.as_str().to_string(),
        event_type: parsed.event_type.clone().unwrap_or_else(|| "unknown".to_string()),
        occurred_at: parsed.occurred_at.unwrap_or_else(Utc::now),
        source: "webhook".to_string(),
        metadata: parsed.metadata.clone(),
    };

    insert_event(pool, &event).await?;

    sqlx::query(
        "INSERT INTO automation_hooks (guid, tenant_guid, service_name, action, payload)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(&event.tenant_guid)
    .bind(&event.service_name)
    .bind(format!("review_{}", event.event_type))
    .bind(event.metadata.to_string())
    .execute(pool)
    .await?;

    Ok(())
}

/// Insert one normalized event into the append-only event log
pub async fn insert_event(pool: &SqlitePool, event: &NormalizedEvent) -> Result<()> {
    sqlx::query(
        "INSERT INTO integration_events
         (guid, tenant_guid, service_name, event_type, occurred_at, source, metadata)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(&event.tenant_guid)
    .bind(&event.service_name)
    .bind(&event.event_type)
    .bind(event.occurred_at.to_rfc3339())
    .bind(&event.source)
    .bind(event.metadata.to_string())
    .execute(pool)
    .await?;

    Ok(())
}
