//! Fusion metric persistence
//!
//! Batch processing has at-least-one-of-many semantics: a failure while
//! persisting one sample is logged and recorded, and the remaining samples
//! in the batch still run.

use chrono::Utc;
use core314_common::db::models::{FusionMetricRecord, MetricSample};
use core314_common::Result;
use sqlx::SqlitePool;
use tracing::{debug, error};
use uuid::Uuid;

use super::{compute, ComputedMetrics};

/// Outcome of one batch of samples
#[derive(Debug, Default)]
pub struct BatchReport {
    pub processed: usize,
    pub total: usize,
    pub errors: Vec<String>,
}

/// Compute and persist derived metrics for a batch of samples
///
/// Each sample is computed against the integration's historical score log,
/// upserted into `fusion_metrics` keyed by (tenant, integration), and
/// appended to `fusion_metric_history`.
pub async fn process_batch(
    pool: &SqlitePool,
    tenant_guid: &str,
    samples: &[MetricSample],
) -> BatchReport {
    let mut report = BatchReport {
        total: samples.len(),
        ..Default::default()
    };

    for sample in samples {
        match process_sample(pool, tenant_guid, sample).await {
            Ok(metrics) => {
                debug!(
                    integration = %sample.integration_name,
                    fusion_score = metrics.fusion_score,
                    anomaly = metrics.anomaly,
                    "Persisted fusion metrics"
                );
                report.processed += 1;
            }
            Err(e) => {
                error!(
                    integration = %sample.integration_name,
                    error = %e,
                    "Failed to persist fusion metrics; continuing batch"
                );
                report.errors.push(format!("{}: {}", sample.integration_name, e));
            }
        }
    }

    report
}

async fn process_sample(
    pool: &SqlitePool,
    tenant_guid: &str,
    sample: &MetricSample,
) -> Result<ComputedMetrics> {
    let history = load_score_history(pool, tenant_guid, &sample.integration_name).await?;
    let metrics = compute(sample, &history);

    let now = Utc::now().to_rfc3339();
    let last_anomaly_at = if metrics.anomaly { Some(now.clone()) } else { None };

    // Record the raw sample; samples are immutable and superseded, never mutated
    sqlx::query(
        "INSERT INTO metric_samples
         (guid, tenant_guid, integration_name, success_count, failure_count,
          avg_response_time_ms, data_quality_score, uptime_percentage, recorded_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(tenant_guid)
    .bind(&sample.integration_name)
    .bind(sample.success_count as i64)
    .bind(sample.failure_count as i64)
    .bind(sample.avg_response_time_ms)
    .bind(sample.data_quality_score)
    .bind(sample.uptime_percentage)
    .bind(&now)
    .execute(pool)
    .await?;

    // One logical row per (tenant, integration); anomaly is point-in-time,
    // so a non-anomalous recomputation clears last_anomaly_at
    sqlx::query(
        "INSERT INTO fusion_metrics
         (tenant_guid, integration_name, fusion_score, efficiency_index,
          trend_7d, stability_confidence, last_anomaly_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT (tenant_guid, integration_name) DO UPDATE SET
             fusion_score = excluded.fusion_score,
             efficiency_index = excluded.efficiency_index,
             trend_7d = excluded.trend_7d,
             stability_confidence = excluded.stability_confidence,
             last_anomaly_at = excluded.last_anomaly_at,
             updated_at = excluded.updated_at",
    )
    .bind(tenant_guid)
    .bind(&sample.integration_name)
    .bind(metrics.fusion_score)
    .bind(metrics.efficiency_index)
    .bind(metrics.trend_7d)
    .bind(metrics.stability_confidence)
    .bind(&last_anomaly_at)
    .bind(&now)
    .execute(pool)
    .await?;

    sqlx::query(
        "INSERT INTO fusion_metric_history
         (guid, tenant_guid, integration_name, fusion_score, recorded_at)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(tenant_guid)
    .bind(&sample.integration_name)
    .bind(metrics.fusion_score)
    .bind(&now)
    .execute(pool)
    .await?;

    Ok(metrics)
}

/// Load the current derived record for one (tenant, integration)
pub async fn load_record(
    pool: &SqlitePool,
    tenant_guid: &str,
    integration_name: &str,
) -> Result<Option<FusionMetricRecord>> {
    let record = sqlx::query_as::<_, FusionMetricRecord>(
        "SELECT tenant_guid, integration_name, fusion_score, efficiency_index,
                trend_7d, stability_confidence, last_anomaly_at
         FROM fusion_metrics
         WHERE tenant_guid = ? AND integration_name = ?",
    )
    .bind(tenant_guid)
    .bind(integration_name)
    .fetch_optional(pool)
    .await?;

    Ok(record)
}

/// Load the full historical fusion score log, oldest first
pub async fn load_score_history(
    pool: &SqlitePool,
    tenant_guid: &str,
    integration_name: &str,
) -> Result<Vec<f64>> {
    let rows: Vec<(f64,)> = sqlx::query_as(
        "SELECT fusion_score FROM fusion_metric_history
         WHERE tenant_guid = ? AND integration_name = ?
         ORDER BY recorded_at ASC, guid ASC",
    )
    .bind(tenant_guid)
    .bind(integration_name)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|(score,)| score).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        // Match production connections, which enforce foreign keys
        sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await.unwrap();
        core314_common::db::create_schema(&pool).await.unwrap();
        sqlx::query("INSERT INTO tenants (guid, name) VALUES ('t-1', 'Acme')")
            .execute(&pool)
            .await
            .unwrap();
        pool
    }

    fn sample(name: &str, success: u64, failure: u64) -> MetricSample {
        MetricSample {
            integration_name: name.to_string(),
            success_count: success,
            failure_count: failure,
            avg_response_time_ms: 500.0,
            data_quality_score: 90.0,
            uptime_percentage: 99.0,
        }
    }

    #[tokio::test]
    async fn test_batch_upserts_single_row_per_integration() {
        let pool = test_pool().await;

        process_batch(&pool, "t-1", &[sample("slack", 80, 20)]).await;
        process_batch(&pool, "t-1", &[sample("slack", 90, 10)]).await;

        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM fusion_metrics WHERE tenant_guid = 't-1'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(count, 1);

        // History is append-only: both computations are logged
        let history = load_score_history(&pool, "t-1", "slack").await.unwrap();
        assert_eq!(history.len(), 2);
    }

    #[tokio::test]
    async fn test_anomaly_cleared_on_healthy_recomputation() {
        let pool = test_pool().await;

        // All failures: anomalous
        process_batch(&pool, "t-1", &[sample("slack", 0, 10)]).await;
        let record = load_record(&pool, "t-1", "slack").await.unwrap().unwrap();
        assert!(record.last_anomaly_at.is_some());

        // Healthy again: the flag is point-in-time, not sticky
        process_batch(&pool, "t-1", &[sample("slack", 100, 0)]).await;
        let record = load_record(&pool, "t-1", "slack").await.unwrap().unwrap();
        assert!(record.last_anomaly_at.is_none());
    }

    #[tokio::test]
    async fn test_batch_continues_past_failing_sample() {
        let pool = test_pool().await;

        // Unknown tenant violates the foreign key for the first sample; the
        // second sample for a valid tenant must still be processed
        let report = process_batch(&pool, "no-such-tenant", &[sample("slack", 1, 0)]).await;
        assert_eq!(report.processed, 0);
        assert_eq!(report.errors.len(), 1);

        let report = process_batch(&pool, "t-1", &[sample("slack", 1, 0), sample("monday", 2, 0)]).await;
        assert_eq!(report.processed, 2);
        assert!(report.errors.is_empty());
    }
}
