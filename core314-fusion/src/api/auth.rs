//! Bearer-token authentication middleware
//!
//! Applied to protected routes only; /health passes through unauthenticated.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use core314_common::api::auth::{bearer_token, validate_token};
use tracing::warn;

use crate::{ApiError, AppState};

pub async fn auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    // Empty stored token disables auth checking
    if state.api_token.is_empty() {
        return Ok(next.run(request).await);
    }

    let header_value = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let presented = bearer_token(header_value)
        .map_err(|e| ApiError::Unauthorized(e.to_string()))?;

    validate_token(presented, &state.api_token).map_err(|e| {
        warn!(path = %request.uri().path(), "Rejected request: {}", e);
        ApiError::Unauthorized(e.to_string())
    })?;

    Ok(next.run(request).await)
}
