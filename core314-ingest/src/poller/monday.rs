//! Monday.com API client
//!
//! Queries the GraphQL v2 endpoint for the most recent activity-log entry
//! on a board. Monday's `created_at` values are 17-digit "unixtime"
//! integers in units of 10^-7 seconds.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use super::{PollError, VendorActivity};

const MONDAY_API_URL: &str = "https://api.monday.com/v2";

/// Divisor converting Monday's activity-log timestamps to epoch seconds
const MONDAY_UNIXTIME_DIVISOR: i64 = 10_000_000;

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<BoardsData>,
}

#[derive(Debug, Deserialize)]
struct BoardsData {
    boards: Vec<Board>,
}

#[derive(Debug, Deserialize)]
struct Board {
    activity_logs: Option<Vec<ActivityLog>>,
}

#[derive(Debug, Deserialize)]
struct ActivityLog {
    event: String,
    created_at: String,
    data: Option<String>,
}

/// Monday.com API client
#[derive(Clone)]
pub struct MondayClient {
    http_client: reqwest::Client,
    api_url: String,
}

impl MondayClient {
    pub fn new(timeout_secs: u64) -> Result<Self, PollError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            http_client,
            api_url: MONDAY_API_URL.to_string(),
        })
    }

    /// Fetch the most recent activity-log entry for a board
    ///
    /// Returns `None` when the board exists but has no recorded activity.
    pub async fn fetch_recent_activity(
        &self,
        credential: &str,
        board_id: &str,
    ) -> Result<Option<VendorActivity>, PollError> {
        let query = format!(
            "query {{ boards(ids: [{}]) {{ activity_logs(limit: 1) {{ event created_at data }} }} }}",
            board_id
        );

        tracing::debug!(board = %board_id, "Querying Monday activity logs");

        let response = self
            .http_client
            .post(&self.api_url)
            .header("Authorization", credential)
            .json(&json!({ "query": query }))
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

        let body: GraphQlResponse = response
            .json()
            .await
            .map_err(|e| PollError::Parse(e.to_string()))?;

        let log = body
            .data
            .and_then(|d| d.boards.into_iter().next())
            .and_then(|b| b.activity_logs)
            .and_then(|logs| logs.into_iter().next());

        let Some(log) = log else {
            return Ok(None);
        };

        let occurred_at = parse_monday_timestamp(&log.created_at)
            .ok_or_else(|| PollError::Parse(format!("bad created_at: {}", log.created_at)))?;

        let metadata = log
            .data
            .as_deref()
            .and_then(|d| serde_json::from_str(d).ok())
            .unwrap_or(serde_json::Value::Null);

        Ok(Some(VendorActivity {
            event_type: log.event,
            occurred_at,
            metadata,
        }))
    }
}

fn parse_monday_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let unixtime = raw.parse::<i64>().ok()?;
    DateTime::from_timestamp(unixtime / MONDAY_UNIXTIME_DIVISOR, 0)
}
