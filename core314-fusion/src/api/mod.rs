//! HTTP API handlers for core314-fusion

pub mod auth;
pub mod engine;
pub mod health;
pub mod learning;
pub mod metrics;
pub mod status;

pub use auth::auth_middleware;
pub use engine::evaluate_engine;
pub use health::health_routes;
pub use learning::learning_state;
pub use metrics::ingest_metrics;
pub use status::system_status;
