//! Slack Events API payload parsing

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::ParsedWebhook;

/// Parse a Slack Events API delivery into the provider-independent form
///
/// Handles both `url_verification` handshakes and `event_callback`
/// deliveries. The event timestamp (`event.ts`) is Slack's epoch-seconds
/// string, possibly with a fractional part.
pub fn parse(body: &Value) -> ParsedWebhook {
    let challenge = body
        .get("challenge")
        .and_then(Value::as_str)
        .map(str::to_string);

    let workspace_id = body
        .get("team_id")
        .and_then(Value::as_str)
        .map(str::to_string);

    let event = body.get("event");
    let event_type = event
        .and_then(|e| e.get("type"))
        .and_then(Value::as_str)
        .map(str::to_string);

    let occurred_at = event
        .and_then(|e| e.get("ts"))
        .and_then(Value::as_str)
        .and_then(parse_slack_ts);

    let metadata = event.cloned().unwrap_or(Value::Null);

    ParsedWebhook {
        workspace_id,
        challenge,
        event_type,
        occurred_at,
        metadata,
    }
}

fn parse_slack_ts(ts: &str) -> Option<DateTime<Utc>> {
    let secs = ts.split('.').next()?.parse::<i64>().ok()?;
    DateTime::from_timestamp(secs, 0)
}
