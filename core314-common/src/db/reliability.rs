//! Adaptive reliability profiles
//!
//! The `fusion_adaptive_reliability` table is populated by an external
//! self-test process that probes delivery channels. This module only reads
//! it; the adaptive backoff logic that will consume the recommendations is
//! not built yet.

use crate::Result;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

/// Delivery channel probed by the self-test process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Slack,
    Email,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Slack => "slack",
            Channel::Email => "email",
        }
    }
}

/// Measured reliability profile for one delivery channel
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ReliabilityProfile {
    pub channel: String,
    pub avg_latency_ms: f64,
    /// Fraction of probe deliveries that failed, 0.0-1.0
    pub failure_rate: f64,
    /// Suggested retry spacing, clamped to 500-10000 ms at the schema level
    pub recommended_retry_ms: i64,
    pub confidence_score: f64,
    pub last_updated: String,
}

/// Load the reliability profile for one channel, if the self-test process
/// has recorded one
pub async fn load_profile(pool: &SqlitePool, channel: Channel) -> Result<Option<ReliabilityProfile>> {
    let profile = sqlx::query_as::<_, ReliabilityProfile>(
        "SELECT channel, avg_latency_ms, failure_rate, recommended_retry_ms,
                confidence_score, last_updated
         FROM fusion_adaptive_reliability
         WHERE channel = ?",
    )
    .bind(channel.as_str())
    .fetch_optional(pool)
    .await?;

    Ok(profile)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn pool_with_schema() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();

        sqlx::query(
            r#"
            CREATE TABLE fusion_adaptive_reliability (
                channel TEXT PRIMARY KEY CHECK (channel IN ('slack', 'email')),
                avg_latency_ms REAL NOT NULL,
                failure_rate REAL NOT NULL,
                recommended_retry_ms INTEGER NOT NULL,
                confidence_score REAL NOT NULL,
                last_updated TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&pool)
        .await
        .unwrap();

        pool
    }

    #[tokio::test]
    async fn test_missing_profile_returns_none() {
        let pool = pool_with_schema().await;
        let profile = load_profile(&pool, Channel::Slack).await.unwrap();
        assert!(profile.is_none());
    }

    #[tokio::test]
    async fn test_profile_round_trip() {
        let pool = pool_with_schema().await;

        sqlx::query(
            "INSERT INTO fusion_adaptive_reliability
             (channel, avg_latency_ms, failure_rate, recommended_retry_ms, confidence_score)
             VALUES ('email', 840.5, 0.12, 2500, 0.8)",
        )
        .execute(&pool)
        .await
        .unwrap();

        let profile = load_profile(&pool, Channel::Email).await.unwrap().unwrap();
        assert_eq!(profile.channel, "email");
        assert_eq!(profile.recommended_retry_ms, 2500);
        assert!((profile.failure_rate - 0.12).abs() < 1e-9);
    }
}
