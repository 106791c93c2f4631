//! QuickBooks Online API client
//!
//! Uses the Change Data Capture endpoint to ask whether any invoices
//! changed in the last day. Only the most recent change is surfaced; the
//! fusion layer cares about activity, not the full ledger.

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::time::Duration as StdDuration;

use super::{PollError, VendorActivity};

const QUICKBOOKS_BASE_URL: &str = "https://quickbooks.api.intuit.com";

/// Lookback window for change-data-capture queries
const CDC_LOOKBACK_HOURS: i64 = 24;

/// QuickBooks Online API client
#[derive(Clone)]
pub struct QuickBooksClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl QuickBooksClient {
    pub fn new(timeout_secs: u64) -> Result<Self, PollError> {
        let http_client = reqwest::Client::builder()
            .timeout(StdDuration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            http_client,
            base_url: QUICKBOOKS_BASE_URL.to_string(),
        })
    }

    /// Fetch the most recent invoice change for a company realm
    ///
    /// Returns `None` when nothing changed inside the lookback window.
    pub async fn fetch_recent_changes(
        &self,
        credential: &str,
        realm_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<VendorActivity>, PollError> {
        let changed_since = (now - Duration::hours(CDC_LOOKBACK_HOURS)).to_rfc3339();
        let url = format!(
            "{}/v3/company/{}/cdc?entities=Invoice&changedSince={}",
            self.base_url, realm_id, changed_since
        );

        tracing::debug!(realm = %realm_id, "Querying QuickBooks change data capture");

        let response = self
            .http_client
            .get(&url)
            .header("Authorization", format!("Bearer {}", credential))
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(PollError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| PollError::Parse(e.to_string()))?;

        Ok(extract_invoice_change(&body, now))
    }
}

/// Pull the first changed invoice out of a CDC response
fn extract_invoice_change(body: &Value, now: DateTime<Utc>) -> Option<VendorActivity> {
    let invoice = body
        .get("CDCResponse")?
        .as_array()?
        .iter()
        .filter_map(|r| r.get("QueryResponse"))
        .filter_map(Value::as_array)
        .flatten()
        .filter_map(|q| q.get("Invoice"))
        .filter_map(Value::as_array)
        .flatten()
        .next()?;

    let occurred_at = invoice
        .get("MetaData")
        .and_then(|m| m.get("LastUpdatedTime"))
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(now);

    Some(VendorActivity {
        event_type: "invoice_changed".to_string(),
        occurred_at,
        metadata: invoice.clone(),
    })
}
