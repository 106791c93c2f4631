//! Monday.com webhook payload parsing

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::ParsedWebhook;

/// Parse a Monday webhook delivery
///
/// Monday sends a bare `{"challenge": ...}` handshake on subscription and
/// wraps real deliveries in an `event` object whose `boardId` is numeric.
/// The board id doubles as our workspace identifier and is stored as a
/// string.
pub fn parse(body: &Value) -> ParsedWebhook {
    let challenge = body
        .get("challenge")
        .and_then(Value::as_str)
        .map(str::to_string);

    let event = body.get("event");

    let workspace_id = event
        .and_then(|e| e.get("boardId"))
        .and_then(as_id_string);

    let event_type = event
        .and_then(|e| e.get("type"))
        .and_then(Value::as_str)
        .map(str::to_string);

    let occurred_at = event
        .and_then(|e| e.get("triggerTime"))
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc));

    let metadata = event.cloned().unwrap_or(Value::Null);

    ParsedWebhook {
        workspace_id,
        challenge,
        event_type,
        occurred_at,
        metadata,
    }
}

/// Monday ids arrive as JSON numbers or strings depending on the endpoint
fn as_id_string(v: &Value) -> Option<String> {
    match v {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}
