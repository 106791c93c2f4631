//! Dashboard API authentication via bearer token
//!
//! The dashboard token lives in the settings table. It is generated once on
//! first startup (crypto-random, hex encoded) and compared in constant time
//! on every request. An empty stored token disables auth checking, which
//! keeps integration tests free of token plumbing.
//!
//! This module contains only pure functions and database operations.
//! No HTTP framework dependencies - those live in module-specific code.

use sha2::{Digest, Sha256};
use sqlx::SqlitePool;

/// Authentication error types
#[derive(Debug, Clone)]
pub enum ApiAuthError {
    /// Authorization header missing or not a Bearer scheme
    MissingToken,

    /// Presented token does not match the stored token
    InvalidToken,

    /// Database error loading the stored token
    DatabaseError(String),
}

impl std::fmt::Display for ApiAuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiAuthError::MissingToken => write!(f, "Missing bearer token"),
            ApiAuthError::InvalidToken => write!(f, "Invalid bearer token"),
            ApiAuthError::DatabaseError(err) => write!(f, "Database error: {}", err),
        }
    }
}

impl std::error::Error for ApiAuthError {}

/// Load the dashboard API token from settings
///
/// Empty string disables auth checking. When the setting is absent a new
/// token is generated and stored.
pub async fn load_api_token(db: &SqlitePool) -> Result<String, ApiAuthError> {
    let result: Option<(String,)> =
        sqlx::query_as("SELECT value FROM settings WHERE key = 'dashboard_api_token'")
            .fetch_optional(db)
            .await
            .map_err(|e| ApiAuthError::DatabaseError(e.to_string()))?;

    match result {
        Some((value,)) => Ok(value),
        None => initialize_api_token(db).await,
    }
}

/// Generate and store a fresh dashboard API token
pub async fn initialize_api_token(db: &SqlitePool) -> Result<String, ApiAuthError> {
    use rand::RngCore;

    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    let token = hex::encode(bytes);

    sqlx::query("INSERT OR REPLACE INTO settings (key, value) VALUES ('dashboard_api_token', ?)")
        .bind(&token)
        .execute(db)
        .await
        .map_err(|e| ApiAuthError::DatabaseError(e.to_string()))?;

    Ok(token)
}

/// Validate a presented bearer token against the stored token
///
/// Comparison is constant-time over SHA-256 digests so neither token length
/// nor prefix match leaks through timing.
pub fn validate_token(presented: &str, stored: &str) -> Result<(), ApiAuthError> {
    // Empty stored token disables auth checking
    if stored.is_empty() {
        return Ok(());
    }

    if constant_time_digest_eq(presented, stored) {
        Ok(())
    } else {
        Err(ApiAuthError::InvalidToken)
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header value
pub fn bearer_token(header_value: &str) -> Result<&str, ApiAuthError> {
    header_value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(ApiAuthError::MissingToken)
}

fn constant_time_digest_eq(a: &str, b: &str) -> bool {
    let da = Sha256::digest(a.as_bytes());
    let db = Sha256::digest(b.as_bytes());

    let mut diff = 0u8;
    for (x, y) in da.iter().zip(db.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matching_token_accepted() {
        assert!(validate_token("abc123", "abc123").is_ok());
    }

    #[test]
    fn test_wrong_token_rejected() {
        assert!(validate_token("abc124", "abc123").is_err());
        assert!(validate_token("", "abc123").is_err());
    }

    #[test]
    fn test_empty_stored_token_disables_auth() {
        assert!(validate_token("anything", "").is_ok());
        assert!(validate_token("", "").is_ok());
    }

    #[test]
    fn test_bearer_extraction() {
        assert_eq!(bearer_token("Bearer tok-1").unwrap(), "tok-1");
        assert!(bearer_token("Basic dXNlcg==").is_err());
        assert!(bearer_token("Bearer ").is_err());
        assert!(bearer_token("").is_err());
    }
}
