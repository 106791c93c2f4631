//! core314-ingest library interface
//!
//! Webhook receivers and scheduled pollers that turn vendor signals into
//! normalized integration events.

pub mod api;
pub mod error;
pub mod poller;
pub mod webhook;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use poller::{monday::MondayClient, quickbooks::QuickBooksClient};
use sqlx::SqlitePool;

/// Vendor integration providers handled by this service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Slack,
    Monday,
    QuickBooks,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Slack => "slack",
            Provider::Monday => "monday",
            Provider::QuickBooks => "quickbooks",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "slack" => Some(Provider::Slack),
            "monday" => Some(Provider::Monday),
            "quickbooks" => Some(Provider::QuickBooks),
            _ => None,
        }
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Monday.com API client
    pub monday: MondayClient,
    /// QuickBooks API client
    pub quickbooks: QuickBooksClient,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(db: SqlitePool, monday: MondayClient, quickbooks: QuickBooksClient) -> Self {
        Self {
            db,
            monday,
            quickbooks,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
///
/// Webhook endpoints authenticate via per-integration HMAC signatures, not
/// bearer tokens; poll endpoints are operator-triggered.
pub fn build_router(state: AppState) -> Router {
    use axum::routing::post;
    use tower_http::trace::TraceLayer;

    Router::new()
        .route("/webhooks/slack", post(api::receive_slack))
        .route("/webhooks/monday", post(api::receive_monday))
        .route("/poll/:provider", post(api::run_poll))
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
