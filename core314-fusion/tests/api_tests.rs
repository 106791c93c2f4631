//! Integration tests for core314-fusion API endpoints
//!
//! Covers bearer authentication, batch metric ingestion, the dashboard
//! status aggregate, learning-state derivation over HTTP, and the engine
//! passthrough. All tests run against an in-memory database with the full
//! schema.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use core314_fusion::engine::NullEngine;
use core314_fusion::{build_router, AppState};
use serde_json::{json, Value};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower::util::ServiceExt; // for `oneshot` method

/// Test helper: in-memory database with full schema and one tenant
async fn setup_test_db() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Should open in-memory database");

    // Match production connections, which enforce foreign keys
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await
        .unwrap();

    core314_common::db::create_schema(&pool)
        .await
        .expect("Should create schema");

    sqlx::query("INSERT INTO tenants (guid, name) VALUES ('tenant-1', 'Acme')")
        .execute(&pool)
        .await
        .unwrap();

    pool
}

/// Test helper: app with auth disabled (empty token)
fn setup_app(db: SqlitePool) -> axum::Router {
    let state = AppState::new(db, String::new(), Arc::new(NullEngine));
    build_router(state)
}

/// Test helper: app with a fixed bearer token
fn setup_app_with_token(db: SqlitePool, token: &str) -> axum::Router {
    let state = AppState::new(db, token.to_string(), Arc::new(NullEngine));
    build_router(state)
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder().method("GET").uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

fn sample_body(integration: &str, success: u64, failure: u64) -> Value {
    json!({
        "tenant_guid": "tenant-1",
        "samples": [{
            "integration_name": integration,
            "success_count": success,
            "failure_count": failure,
            "avg_response_time_ms": 500.0,
            "data_quality_score": 90.0,
            "uptime_percentage": 99.0
        }]
    })
}

// =============================================================================
// Health endpoint
// =============================================================================

#[tokio::test]
async fn test_health_endpoint_no_auth_required() {
    let db = setup_test_db().await;
    let app = setup_app_with_token(db, "secret-token");

    let response = app.oneshot(get_request("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "core314-fusion");
}

// =============================================================================
// Authentication
// =============================================================================

#[tokio::test]
async fn test_missing_bearer_token_rejected() {
    let db = setup_test_db().await;
    let app = setup_app_with_token(db, "secret-token");

    let response = app.oneshot(get_request("/api/status")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_wrong_bearer_token_rejected() {
    let db = setup_test_db().await;
    let app = setup_app_with_token(db, "secret-token");

    let request = Request::builder()
        .method("GET")
        .uri("/api/status")
        .header(header::AUTHORIZATION, "Bearer not-the-token")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_valid_bearer_token_accepted() {
    let db = setup_test_db().await;
    let app = setup_app_with_token(db, "secret-token");

    let request = Request::builder()
        .method("GET")
        .uri("/api/status")
        .header(header::AUTHORIZATION, "Bearer secret-token")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

// =============================================================================
// Metric ingestion
// =============================================================================

#[tokio::test]
async fn test_ingest_computes_spec_scenario_scores() {
    let db = setup_test_db().await;
    let app = setup_app(db.clone());

    let body = sample_body("slack", 80, 20);
    let response = app
        .oneshot(post_json("/api/metrics/ingest", &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["processed"], 1);
    assert_eq!(body["total"], 1);

    // 0.4*80 + 0.3*90 + 0.3*99 = 88.7
    let (score,): (f64,) = sqlx::query_as(
        "SELECT fusion_score FROM fusion_metrics
         WHERE tenant_guid = 'tenant-1' AND integration_name = 'slack'",
    )
    .fetch_one(&db)
    .await
    .unwrap();
    assert!((score - 88.7).abs() < 1e-9);
}

#[tokio::test]
async fn test_ingest_validation_itemizes_errors() {
    let db = setup_test_db().await;
    let app = setup_app(db);

    let body = json!({
        "tenant_guid": "tenant-1",
        "samples": [{
            "integration_name": "",
            "success_count": 1,
            "failure_count": 0,
            "avg_response_time_ms": -5.0,
            "data_quality_score": 150.0,
            "uptime_percentage": 99.0
        }]
    });

    let response = app
        .oneshot(post_json("/api/metrics/ingest", &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"]["code"], "VALIDATION_FAILED");
    let errors = body["error"]["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 3);
}

#[tokio::test]
async fn test_ingest_negative_counts_get_itemized_400() {
    let db = setup_test_db().await;
    let app = setup_app(db);

    let body = json!({
        "tenant_guid": "tenant-1",
        "samples": [{
            "integration_name": "slack",
            "success_count": -5,
            "failure_count": -1,
            "avg_response_time_ms": 100.0,
            "data_quality_score": 90.0,
            "uptime_percentage": 99.0
        }]
    });

    let response = app
        .oneshot(post_json("/api/metrics/ingest", &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = extract_json(response.into_body()).await;
    let errors = body["error"]["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 2);
    assert!(errors[0].as_str().unwrap().contains("success_count"));
    assert!(errors[1].as_str().unwrap().contains("failure_count"));
}

#[tokio::test]
async fn test_ingest_partial_failure_reports_errors_but_succeeds_for_rest() {
    let db = setup_test_db().await;
    let app = setup_app(db);

    // Unknown tenant fails the foreign key for every sample but keeps 200
    let body = json!({
        "tenant_guid": "ghost-tenant",
        "samples": [{
            "integration_name": "slack",
            "success_count": 10,
            "failure_count": 0,
            "avg_response_time_ms": 100.0,
            "data_quality_score": 90.0,
            "uptime_percentage": 99.0
        }]
    });

    let response = app
        .oneshot(post_json("/api/metrics/ingest", &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["processed"], 0);
    assert_eq!(body["errors"].as_array().unwrap().len(), 1);
}

// =============================================================================
// Dashboard status
// =============================================================================

#[tokio::test]
async fn test_status_baseline_before_any_metrics() {
    let db = setup_test_db().await;
    let app = setup_app(db);

    let response = app.oneshot(get_request("/api/status")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    let status = &body["system_status"];
    assert_eq!(status["global_fusion_score"], 75.0);
    assert_eq!(status["score_origin"], "baseline");
    assert_eq!(status["system_health"], "observing");
    assert_eq!(status["connected_integrations"], 0);
    assert_eq!(status["has_efficiency_metrics"], false);
    assert_eq!(status["ai_insight_phase"], "observe");
}

#[tokio::test]
async fn test_status_computed_after_ingest() {
    let db = setup_test_db().await;
    let app = setup_app(db.clone());

    let response = app
        .clone()
        .oneshot(post_json("/api/metrics/ingest", &sample_body("slack", 80, 20)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(get_request("/api/status")).await.unwrap();
    let body = extract_json(response.into_body()).await;
    let status = &body["system_status"];

    assert_eq!(status["score_origin"], "computed");
    assert_eq!(status["system_health"], "active");
    assert_eq!(status["connected_integrations"], 1);
    assert_eq!(status["has_efficiency_metrics"], true);
    assert_eq!(status["global_fusion_score"], 88.7);
    assert_eq!(status["phase_metadata"]["observe"], 1);
}

// =============================================================================
// Learning state
// =============================================================================

#[tokio::test]
async fn test_learning_state_observe_with_sparse_history() {
    let db = setup_test_db().await;
    let app = setup_app(db.clone());

    // 3 snapshots, 3 samples: snapshot check forces observe
    for _ in 0..3 {
        let response = app
            .clone()
            .oneshot(post_json("/api/metrics/ingest", &sample_body("slack", 80, 20)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .oneshot(get_request("/api/learning/slack?tenant=tenant-1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    let state = &body["learning_state"];
    assert_eq!(state["snapshot_count"], 3);
    assert_eq!(state["maturity_stage"], "observe");
    assert!(body["events"].as_array().unwrap().iter().any(|e| e["kind"] == "BASELINE_ESTABLISHED"));
}

#[tokio::test]
async fn test_learning_state_predict_with_rich_history() {
    let db = setup_test_db().await;
    let app = setup_app(db.clone());

    // 16 snapshots and 16 samples clear both predict thresholds
    for _ in 0..16 {
        let response = app
            .clone()
            .oneshot(post_json("/api/metrics/ingest", &sample_body("monday", 95, 5)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .oneshot(get_request("/api/learning/monday?tenant=tenant-1"))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    let state = &body["learning_state"];

    assert_eq!(state["maturity_stage"], "predict");

    let events = body["events"].as_array().unwrap();
    let promotions: Vec<_> = events
        .iter()
        .filter(|e| e["kind"] == "MATURITY_PROMOTED")
        .collect();
    assert!(!promotions.is_empty());
}

#[tokio::test]
async fn test_learning_state_requires_tenant() {
    let db = setup_test_db().await;
    let app = setup_app(db);

    let response = app
        .oneshot(get_request("/api/learning/slack?tenant="))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_learning_state_is_idempotent_across_reads() {
    let db = setup_test_db().await;
    let app = setup_app(db.clone());

    for _ in 0..6 {
        app.clone()
            .oneshot(post_json("/api/metrics/ingest", &sample_body("slack", 80, 20)))
            .await
            .unwrap();
    }

    let first = extract_json(
        app.clone()
            .oneshot(get_request("/api/learning/slack?tenant=tenant-1"))
            .await
            .unwrap()
            .into_body(),
    )
    .await;
    let second = extract_json(
        app.oneshot(get_request("/api/learning/slack?tenant=tenant-1"))
            .await
            .unwrap()
            .into_body(),
    )
    .await;

    assert_eq!(first["learning_state"]["confidence_current"], second["learning_state"]["confidence_current"]);
    assert_eq!(first["events"], second["events"]);
}

// =============================================================================
// Engine passthrough
// =============================================================================

#[tokio::test]
async fn test_engine_evaluate_returns_null_placeholder() {
    let db = setup_test_db().await;
    let app = setup_app(db);

    let body = json!({
        "data_type": "integration_metrics",
        "normalized_data": {"fusion_score": 88.7}
    });

    let response = app
        .oneshot(post_json("/api/engine/evaluate", &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["engine"], "null");
    assert_eq!(body["confidence"], 0.0);
    assert_eq!(body["core_score"], 50.0);
    assert!(body["reasoning"].as_str().unwrap().contains("Placeholder"));
}
