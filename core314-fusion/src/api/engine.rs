//! Proprietary-engine passthrough endpoint

use axum::{extract::State, Json};
use serde::Serialize;
use tracing::debug;

use crate::engine::{EngineRequest, EngineResponse};
use crate::{ApiResult, AppState};

#[derive(Debug, Serialize)]
pub struct EvaluateResponse {
    pub success: bool,
    pub engine: &'static str,
    #[serde(flatten)]
    pub result: EngineResponse,
}

/// POST /api/engine/evaluate
///
/// Forwards the request to the configured engine adapter. With no remote
/// engine configured this returns the null engine's fixed placeholder.
pub async fn evaluate_engine(
    State(state): State<AppState>,
    Json(request): Json<EngineRequest>,
) -> ApiResult<Json<EvaluateResponse>> {
    debug!(engine = state.engine.engine_id(), data_type = %request.data_type, "Engine evaluation");

    let result = state.engine.evaluate(&request).await?;

    Ok(Json(EvaluateResponse {
        success: true,
        engine: state.engine.engine_id(),
        result,
    }))
}
