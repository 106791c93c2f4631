//! HTTP API handlers

pub mod health;

pub use health::health_routes;

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use core314_common::api::signature::DEFAULT_TOLERANCE_SECS;
use core314_common::db::init::get_setting;
use serde_json::{json, Value};

use crate::poller;
use crate::webhook::{self, signature_headers, WebhookOutcome};
use crate::{ApiError, ApiResult, AppState, Provider};

/// POST /webhooks/slack
pub async fn receive_slack(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> ApiResult<Response> {
    receive(state, Provider::Slack, headers, body).await
}

/// POST /webhooks/monday
pub async fn receive_monday(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> ApiResult<Response> {
    receive(state, Provider::Monday, headers, body).await
}

/// Shared webhook receive path
///
/// The body is taken raw so the HMAC check covers the exact bytes the
/// vendor signed, then parsed once for routing.
async fn receive(
    state: AppState,
    provider: Provider,
    headers: HeaderMap,
    body: String,
) -> ApiResult<Response> {
    let parsed_body: Value = serde_json::from_str(&body)
        .map_err(|e| ApiError::Validation(vec![format!("malformed JSON body: {}", e)]))?;

    let parsed = match provider {
        Provider::Slack => webhook::slack::parse(&parsed_body),
        Provider::Monday => webhook::monday::parse(&parsed_body),
        Provider::QuickBooks => {
            return Err(ApiError::Validation(vec![
                "quickbooks integrations are poll-only".to_string(),
            ]))
        }
    };

    let (sig_header, ts_header) = signature_headers(provider);
    let signature = header_str(&headers, sig_header);
    let timestamp = header_str(&headers, ts_header).and_then(|v| v.parse::<i64>().ok());

    let tolerance = get_setting(&state.db, "webhook_timestamp_tolerance_seconds", "300")
        .await
        .map_err(ApiError::Common)?
        .parse::<i64>()
        .unwrap_or(DEFAULT_TOLERANCE_SECS);

    let outcome = webhook::process(
        &state.db,
        provider,
        parsed,
        &body,
        signature,
        timestamp,
        Utc::now().timestamp(),
        tolerance,
    )
    .await
    .map_err(ApiError::Common)?;

    match outcome {
        WebhookOutcome::Challenge(challenge) => {
            Ok(Json(json!({ "challenge": challenge })).into_response())
        }
        WebhookOutcome::Accepted => Ok(Json(json!({ "ok": true })).into_response()),
        WebhookOutcome::Rejected(e) => Err(ApiError::Unauthorized(e.to_string())),
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// POST /poll/:provider
///
/// Operator-triggered poll run across every active integration for one
/// provider. Per-integration failures come back in the `errors` list with
/// an overall 200.
pub async fn run_poll(
    State(state): State<AppState>,
    Path(provider): Path<String>,
) -> ApiResult<Response> {
    let provider = Provider::parse(&provider)
        .ok_or_else(|| ApiError::Validation(vec![format!("unknown provider: {}", provider)]))?;

    if provider == Provider::Slack {
        return Err(ApiError::Validation(vec![
            "slack integrations are webhook-only".to_string(),
        ]));
    }

    let report = poller::run(&state, provider, Utc::now())
        .await
        .map_err(ApiError::Common)?;

    Ok(Json(json!({
        "success": report.errors.is_empty(),
        "processed": report.processed,
        "skipped": report.skipped,
        "total": report.total,
        "errors": report.errors,
    }))
    .into_response())
}
