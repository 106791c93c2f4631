//! Database initialization
//!
//! Creates the shared SQLite database on first run and keeps the schema
//! idempotent across restarts. Every Core314 binary calls `init_database`
//! at startup; table creation uses CREATE TABLE IF NOT EXISTS so the first
//! binary to start wins and the rest are no-ops.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // Enable foreign keys
    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;

    // WAL mode allows concurrent readers with one writer, which matters
    // when the ingest and fusion binaries share the database file.
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;

    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create all tables and seed defaults (idempotent)
///
/// Split out from `init_database` so tests can run the full schema against
/// an in-memory pool.
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_settings_table(pool).await?;
    create_module_config_table(pool).await?;
    create_tenants_table(pool).await?;
    create_integrations_table(pool).await?;
    create_integration_events_table(pool).await?;
    create_automation_hooks_table(pool).await?;
    create_metric_samples_table(pool).await?;
    create_fusion_metrics_table(pool).await?;
    create_fusion_metric_history_table(pool).await?;
    create_ingestion_state_table(pool).await?;
    create_fusion_adaptive_reliability_table(pool).await?;

    init_default_settings(pool).await?;

    Ok(())
}

/// Create the settings table
///
/// Stores application configuration key-value pairs.
pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_module_config_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS module_config (
            module_name TEXT PRIMARY KEY,
            host TEXT NOT NULL DEFAULT '127.0.0.1',
            port INTEGER NOT NULL,
            enabled INTEGER NOT NULL DEFAULT 1
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Seed default host/port rows for the two binaries
    sqlx::query(
        "INSERT OR IGNORE INTO module_config (module_name, host, port, enabled)
         VALUES ('signal-ingest', '127.0.0.1', 6310, 1)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "INSERT OR IGNORE INTO module_config (module_name, host, port, enabled)
         VALUES ('fusion-metrics', '127.0.0.1', 6320, 1)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_tenants_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tenants (
            guid TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_integrations_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS integrations (
            guid TEXT PRIMARY KEY,
            tenant_guid TEXT NOT NULL REFERENCES tenants(guid),
            provider TEXT NOT NULL,
            external_workspace_id TEXT NOT NULL,
            credential TEXT,
            webhook_secret TEXT,
            active INTEGER NOT NULL DEFAULT 1,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (provider, external_workspace_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_integration_events_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS integration_events (
            guid TEXT PRIMARY KEY,
            tenant_guid TEXT NOT NULL REFERENCES tenants(guid),
            service_name TEXT NOT NULL,
            event_type TEXT NOT NULL,
            occurred_at TEXT NOT NULL,
            source TEXT NOT NULL,
            metadata TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_automation_hooks_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS automation_hooks (
            guid TEXT PRIMARY KEY,
            tenant_guid TEXT NOT NULL REFERENCES tenants(guid),
            service_name TEXT NOT NULL,
            action TEXT NOT NULL,
            payload TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_metric_samples_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS metric_samples (
            guid TEXT PRIMARY KEY,
            tenant_guid TEXT NOT NULL REFERENCES tenants(guid),
            integration_name TEXT NOT NULL,
            success_count INTEGER NOT NULL,
            failure_count INTEGER NOT NULL,
            avg_response_time_ms REAL NOT NULL,
            data_quality_score REAL NOT NULL,
            uptime_percentage REAL NOT NULL,
            recorded_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_fusion_metrics_table(pool: &SqlitePool) -> Result<()> {
    // One logical row per (tenant, integration), replaced on recomputation
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS fusion_metrics (
            tenant_guid TEXT NOT NULL REFERENCES tenants(guid),
            integration_name TEXT NOT NULL,
            fusion_score REAL NOT NULL,
            efficiency_index REAL NOT NULL,
            trend_7d REAL NOT NULL,
            stability_confidence REAL NOT NULL,
            last_anomaly_at TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (tenant_guid, integration_name)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_fusion_metric_history_table(pool: &SqlitePool) -> Result<()> {
    // Append-only score log consumed by trend and stddev windows
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS fusion_metric_history (
            guid TEXT PRIMARY KEY,
            tenant_guid TEXT NOT NULL REFERENCES tenants(guid),
            integration_name TEXT NOT NULL,
            fusion_score REAL NOT NULL,
            recorded_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_fusion_history_lookup
         ON fusion_metric_history (tenant_guid, integration_name, recorded_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_ingestion_state_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS ingestion_state (
            tenant_guid TEXT NOT NULL REFERENCES tenants(guid),
            integration_guid TEXT NOT NULL REFERENCES integrations(guid),
            service_name TEXT NOT NULL,
            last_polled_at TEXT,
            last_event_timestamp TEXT,
            next_poll_after TEXT,
            metadata TEXT,
            PRIMARY KEY (tenant_guid, integration_guid, service_name)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_fusion_adaptive_reliability_table(pool: &SqlitePool) -> Result<()> {
    // Populated by an external self-test process; read-only from this side
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS fusion_adaptive_reliability (
            channel TEXT PRIMARY KEY CHECK (channel IN ('slack', 'email')),
            avg_latency_ms REAL NOT NULL,
            failure_rate REAL NOT NULL CHECK (failure_rate >= 0.0 AND failure_rate <= 1.0),
            recommended_retry_ms INTEGER NOT NULL CHECK (recommended_retry_ms BETWEEN 500 AND 10000),
            confidence_score REAL NOT NULL CHECK (confidence_score >= 0.0 AND confidence_score <= 1.0),
            last_updated TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Initialize or update default settings
///
/// Ensures all required settings exist with default values.
async fn init_default_settings(pool: &SqlitePool) -> Result<()> {
    // Poller cadence
    ensure_setting(pool, "poll_interval_minutes", "15").await?;
    ensure_setting(pool, "vendor_request_timeout_seconds", "30").await?;

    // Webhook signature freshness window
    ensure_setting(pool, "webhook_timestamp_tolerance_seconds", "300").await?;

    // Dashboard baseline shown before any fusion metric exists
    ensure_setting(pool, "baseline_fusion_score", "75.0").await?;

    // Remote proprietary-engine delegate; empty selects the null engine
    ensure_setting(pool, "fusion_engine_url", "").await?;

    Ok(())
}

/// Ensure a setting exists with a default value (does not overwrite)
pub async fn ensure_setting(pool: &SqlitePool, key: &str, default_value: &str) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)")
        .bind(key)
        .bind(default_value)
        .execute(pool)
        .await?;

    // Reset NULL values to the default
    sqlx::query("UPDATE settings SET value = ? WHERE key = ? AND value IS NULL")
        .bind(default_value)
        .bind(key)
        .execute(pool)
        .await?;

    Ok(())
}

/// Read a setting value, falling back to a default when missing
pub async fn get_setting(pool: &SqlitePool, key: &str, default_value: &str) -> Result<String> {
    let row: Option<(String,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|(v,)| v).unwrap_or_else(|| default_value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        pool
    }

    #[tokio::test]
    async fn test_schema_creation_is_idempotent() {
        let pool = memory_pool().await;

        create_settings_table(&pool).await.unwrap();
        create_settings_table(&pool).await.unwrap();

        create_tenants_table(&pool).await.unwrap();
        create_integrations_table(&pool).await.unwrap();
        create_integrations_table(&pool).await.unwrap();
    }

    #[tokio::test]
    async fn test_ensure_setting_does_not_overwrite() {
        let pool = memory_pool().await;
        create_settings_table(&pool).await.unwrap();

        ensure_setting(&pool, "poll_interval_minutes", "15").await.unwrap();
        sqlx::query("UPDATE settings SET value = '30' WHERE key = 'poll_interval_minutes'")
            .execute(&pool)
            .await
            .unwrap();
        ensure_setting(&pool, "poll_interval_minutes", "15").await.unwrap();

        let value = get_setting(&pool, "poll_interval_minutes", "15").await.unwrap();
        assert_eq!(value, "30");
    }

    #[tokio::test]
    async fn test_reliability_table_rejects_out_of_range_retry() {
        let pool = memory_pool().await;
        create_fusion_adaptive_reliability_table(&pool).await.unwrap();

        let result = sqlx::query(
            "INSERT INTO fusion_adaptive_reliability
             (channel, avg_latency_ms, failure_rate, recommended_retry_ms, confidence_score)
             VALUES ('slack', 120.0, 0.1, 100, 0.9)",
        )
        .execute(&pool)
        .await;

        assert!(result.is_err());
    }
}
