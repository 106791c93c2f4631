//! Proprietary-engine adapter seam
//!
//! The actual scoring engine is a private, external service. This module
//! only defines the contract it must satisfy and two implementations:
//!
//! - `NullEngine`: a deterministic placeholder used whenever no remote URL
//!   is configured. Fixed, documented output with confidence 0.0 and an
//!   explicit disclaimer. Deliberately contains no randomness so tests and
//!   derived displays stay reproducible.
//! - `RemoteEngine`: delegates to the configured HTTP endpoint.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub const PLACEHOLDER_DISCLAIMER: &str =
    "Placeholder response from the local null engine; no proprietary scoring was performed";

/// Engine adapter errors
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Engine returned status {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Fixed request shape expected by the external engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineRequest {
    pub data_type: String,
    pub normalized_data: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
}

/// Fixed response shape produced by the external engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineResponse {
    pub core_score: Option<f64>,
    pub efficiency_index: Option<f64>,
    pub risk_factor: Option<f64>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    pub reasoning: Option<String>,
    pub confidence: Option<f64>,
}

/// Capability interface for the external scoring engine
#[async_trait]
pub trait FusionEngine: Send + Sync {
    /// Adapter identifier for logging ("null", "remote")
    fn engine_id(&self) -> &'static str;

    async fn evaluate(&self, request: &EngineRequest) -> Result<EngineResponse, EngineError>;
}

/// Deterministic stand-in used when no remote engine is configured
pub struct NullEngine;

#[async_trait]
impl FusionEngine for NullEngine {
    fn engine_id(&self) -> &'static str {
        "null"
    }

    async fn evaluate(&self, request: &EngineRequest) -> Result<EngineResponse, EngineError> {
        Ok(EngineResponse {
            core_score: Some(50.0),
            efficiency_index: Some(50.0),
            risk_factor: Some(0.5),
            recommendations: vec![format!(
                "Connect the external engine to score '{}' data",
                request.data_type
            )],
            reasoning: Some(PLACEHOLDER_DISCLAIMER.to_string()),
            confidence: Some(0.0),
        })
    }
}

/// Delegate to the configured external engine over HTTP
pub struct RemoteEngine {
    http_client: reqwest::Client,
    base_url: String,
}

impl RemoteEngine {
    pub fn new(base_url: String) -> Result<Self, EngineError> {
        let http_client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| EngineError::Network(e.to_string()))?;

        Ok(Self { http_client, base_url })
    }
}

#[async_trait]
impl FusionEngine for RemoteEngine {
    fn engine_id(&self) -> &'static str {
        "remote"
    }

    async fn evaluate(&self, request: &EngineRequest) -> Result<EngineResponse, EngineError> {
        let response = self
            .http_client
            .post(&self.base_url)
            .json(request)
            .send()
            .await
            .map_err(|e| EngineError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(EngineError::Api(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| EngineError::Parse(e.to_string()))
    }
}

/// Select the engine implementation from the configured URL setting
///
/// An empty URL selects the null engine.
pub fn select_engine(engine_url: &str) -> Result<Arc<dyn FusionEngine>, EngineError> {
    if engine_url.is_empty() {
        Ok(Arc::new(NullEngine))
    } else {
        Ok(Arc::new(RemoteEngine::new(engine_url.to_string())?))
    }
}
