//! Assembly of learning inputs from the append-only history
//!
//! Reads the score log and sample rows for one integration and reshapes
//! them into the pure deriver's inputs. All windows are computed here so
//! `derive` and `events::generate` stay free of database access.

use chrono::{DateTime, Duration, Utc};
use core314_common::Result;
use sqlx::SqlitePool;

use super::events::{generate, HistoryPoint, LearningEventKind};
use super::{confidence, LearningInputs};

/// Rolling window width for variance computation
const VARIANCE_WINDOW: usize = 7;

/// Age threshold for the 30-day confidence delta
const DELTA_DAYS: i64 = 30;

/// Load the chronologically ordered history for one integration
pub async fn load_history(
    pool: &SqlitePool,
    tenant_guid: &str,
    integration_name: &str,
) -> Result<Vec<HistoryPoint>> {
    let score_rows: Vec<(f64, String)> = sqlx::query_as(
        "SELECT fusion_score, recorded_at FROM fusion_metric_history
         WHERE tenant_guid = ? AND integration_name = ?
         ORDER BY recorded_at ASC, guid ASC",
    )
    .bind(tenant_guid)
    .bind(integration_name)
    .fetch_all(pool)
    .await?;

    let sample_times: Vec<(String,)> = sqlx::query_as(
        "SELECT recorded_at FROM metric_samples
         WHERE tenant_guid = ? AND integration_name = ?
         ORDER BY recorded_at ASC",
    )
    .bind(tenant_guid)
    .bind(integration_name)
    .fetch_all(pool)
    .await?;

    let sample_times: Vec<DateTime<Utc>> = sample_times
        .into_iter()
        .filter_map(|(t,)| parse_timestamp(&t))
        .collect();

    let mut points = Vec::with_capacity(score_rows.len());
    let mut scores: Vec<f64> = Vec::with_capacity(score_rows.len());

    for (score, recorded_at) in score_rows {
        let recorded_at = match parse_timestamp(&recorded_at) {
            Some(t) => t,
            None => continue,
        };
        scores.push(score);

        let window_start = scores.len().saturating_sub(VARIANCE_WINDOW);
        let variance = window_variance(&scores[window_start..]);

        let metrics_count = sample_times.iter().filter(|t| **t <= recorded_at).count() as u64;

        points.push(HistoryPoint {
            recorded_at,
            fusion_score: score,
            variance,
            metrics_count,
        });
    }

    Ok(points)
}

/// Build deriver inputs from an assembled history
pub fn inputs_from(integration_name: &str, points: &[HistoryPoint], now: DateTime<Utc>) -> LearningInputs {
    let snapshot_count = points.len() as u64;
    let metrics_count = points.last().map(|p| p.metrics_count).unwrap_or(0);
    let score_exists = !points.is_empty();

    let scores: Vec<f64> = points.iter().map(|p| p.fusion_score).collect();
    let recent_start = scores.len().saturating_sub(VARIANCE_WINDOW);
    let variance_recent = window_variance(&scores[recent_start..]);
    let older_start = scores.len().saturating_sub(2 * VARIANCE_WINDOW);
    let variance_older = if recent_start > 0 {
        window_variance(&scores[older_start..recent_start])
    } else {
        None
    };

    let mean_interval_days = mean_interval_days(points);

    let cutoff = now - Duration::days(DELTA_DAYS);
    let aged: Vec<&HistoryPoint> = points.iter().filter(|p| p.recorded_at <= cutoff).collect();
    let confidence_30_days_ago = if aged.is_empty() {
        None
    } else {
        let aged_scores: Vec<f64> = aged.iter().map(|p| p.fusion_score).collect();
        let aged_start = aged_scores.len().saturating_sub(VARIANCE_WINDOW);
        let aged_variance = window_variance(&aged_scores[aged_start..]);
        let aged_metrics = aged.last().map(|p| p.metrics_count).unwrap_or(0);
        Some(confidence(aged.len() as u64, aged_metrics, true, aged_variance))
    };

    let events = generate(integration_name, points);
    let last_promotion_event = events
        .iter()
        .rev()
        .find(|e| e.kind == LearningEventKind::MaturityPromoted)
        .map(|e| e.explanation.clone());
    let suppression_events_count = events
        .iter()
        .filter(|e| e.kind == LearningEventKind::ConfidenceDecreased)
        .count() as u64;

    LearningInputs {
        snapshot_count,
        metrics_count,
        score_exists,
        variance_recent,
        variance_older,
        mean_interval_days,
        baseline_established_at: points.first().map(|p| p.recorded_at),
        confidence_30_days_ago,
        last_promotion_event,
        suppression_events_count,
    }
}

/// Population variance over a window; None for fewer than 2 points
fn window_variance(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    Some(values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64)
}

fn mean_interval_days(points: &[HistoryPoint]) -> Option<f64> {
    if points.len() < 2 {
        return None;
    }
    let span = points[points.len() - 1].recorded_at - points[0].recorded_at;
    let intervals = (points.len() - 1) as f64;
    Some(span.num_seconds() as f64 / 86_400.0 / intervals)
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, 9, 0, 0).unwrap()
    }

    fn points(days: &[u32], score: f64) -> Vec<HistoryPoint> {
        days.iter()
            .enumerate()
            .map(|(i, d)| HistoryPoint {
                recorded_at: at(*d),
                fusion_score: score,
                variance: None,
                metrics_count: i as u64 + 1,
            })
            .collect()
    }

    #[test]
    fn test_mean_interval_daily_snapshots() {
        let pts = points(&[1, 2, 3, 4, 5], 80.0);
        let interval = mean_interval_days(&pts).unwrap();
        assert!((interval - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_inputs_empty_history() {
        let inputs = inputs_from("slack", &[], Utc::now());
        assert_eq!(inputs.snapshot_count, 0);
        assert!(!inputs.score_exists);
        assert!(inputs.baseline_established_at.is_none());
        assert!(inputs.variance_recent.is_none());
    }

    #[test]
    fn test_variance_windows_split_recent_and_older() {
        // 14 points: first 7 noisy, last 7 flat
        let mut pts = Vec::new();
        for d in 1..=7u32 {
            pts.push(HistoryPoint {
                recorded_at: at(d),
                fusion_score: if d % 2 == 0 { 90.0 } else { 40.0 },
                variance: None,
                metrics_count: d as u64,
            });
        }
        for d in 8..=14u32 {
            pts.push(HistoryPoint {
                recorded_at: at(d),
                fusion_score: 80.0,
                variance: None,
                metrics_count: d as u64,
            });
        }

        let inputs = inputs_from("slack", &pts, Utc::now());
        let recent = inputs.variance_recent.unwrap();
        let older = inputs.variance_older.unwrap();
        assert_eq!(recent, 0.0);
        assert!(older > 0.0);
    }

    #[test]
    fn test_suppression_and_promotion_extraction() {
        // Variance spikes produce confidence-decreased events; metrics grow
        // so a promotion lands as well
        let mut pts = Vec::new();
        for d in 1..=8u32 {
            pts.push(HistoryPoint {
                recorded_at: at(d),
                fusion_score: 80.0,
                variance: Some(if d % 2 == 0 { 20.0 } else { 5.0 }),
                metrics_count: d as u64,
            });
        }

        let inputs = inputs_from("slack", &pts, Utc::now());
        assert!(inputs.suppression_events_count > 0);
        assert!(inputs.last_promotion_event.is_some());
    }
}
