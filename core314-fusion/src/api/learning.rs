//! Learning-state display endpoint

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::learning::events::{generate, truncate_for_display, LearningEvent, DISPLAY_LIMIT};
use crate::learning::history::{inputs_from, load_history};
use crate::learning::{derive, LearningState};
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct LearningQuery {
    pub tenant: String,
}

#[derive(Debug, Serialize)]
pub struct LearningResponse {
    pub success: bool,
    pub integration_name: String,
    pub learning_state: LearningState,
    pub events: Vec<LearningEvent>,
    pub has_more_events: bool,
}

/// GET /api/learning/:integration?tenant=<guid>
///
/// Recomputes the learning state and event timeline from the append-only
/// history on every request; nothing here is cached or persisted.
pub async fn learning_state(
    State(state): State<AppState>,
    Path(integration): Path<String>,
    Query(query): Query<LearningQuery>,
) -> ApiResult<Json<LearningResponse>> {
    if query.tenant.is_empty() {
        return Err(ApiError::Validation(vec!["tenant must not be empty".to_string()]));
    }

    let history = load_history(&state.db, &query.tenant, &integration).await?;

    let inputs = inputs_from(&integration, &history, Utc::now());
    let learning = derive(&inputs);

    let events = generate(&integration, &history);
    let (events, has_more_events) = truncate_for_display(events, DISPLAY_LIMIT);

    Ok(Json(LearningResponse {
        success: true,
        integration_name: integration,
        learning_state: learning,
        events,
        has_more_events,
    }))
}
