//! core314-fusion library interface
//!
//! Exposes the fusion metric calculator, learning-state deriver, and the
//! dashboard API for integration testing.

pub mod api;
pub mod engine;
pub mod error;
pub mod learning;
pub mod metrics;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use engine::FusionEngine;
use sqlx::SqlitePool;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Dashboard bearer token; empty disables auth
    pub api_token: String,
    /// Proprietary-engine adapter (null or remote)
    pub engine: Arc<dyn FusionEngine>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(db: SqlitePool, api_token: String, engine: Arc<dyn FusionEngine>) -> Self {
        Self {
            db,
            api_token,
            engine,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
///
/// Protected routes require bearer-token auth; /health does not.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;
    use axum::routing::{get, post};
    use tower_http::trace::TraceLayer;

    let protected = Router::new()
        .route("/api/status", get(api::system_status))
        .route("/api/metrics/ingest", post(api::ingest_metrics))
        .route("/api/learning/:integration", get(api::learning_state))
        .route("/api/engine/evaluate", post(api::evaluate_engine))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::auth_middleware,
        ));

    Router::new()
        .merge(protected)
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
