//! Dashboard system status endpoint

use axum::{
    extract::{Query, State},
    Json,
};
use core314_common::db::init::get_setting;
use core314_common::db::models::FusionMetricRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::learning::{maturity_stage, MaturityStage};
use crate::{ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    /// Restrict aggregation to one tenant; absent means all tenants
    pub tenant: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub global_fusion_score: f64,
    pub score_origin: String,
    pub system_health: String,
    pub has_efficiency_metrics: bool,
    pub connected_integrations: i64,
    pub ai_insight_phase: String,
    pub phase_metadata: BTreeMap<String, u64>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub success: bool,
    pub system_status: SystemStatus,
}

/// GET /api/status
///
/// Aggregate dashboard view over all fusion metric records. Before any
/// metric exists the score falls back to the configured baseline with
/// origin "baseline" and health "observing".
pub async fn system_status(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> ApiResult<Json<StatusResponse>> {
    let tenant_filter = query.tenant.as_deref();

    let rows: Vec<FusionMetricRecord> = match tenant_filter {
        Some(tenant) => {
            sqlx::query_as(
                "SELECT tenant_guid, integration_name, fusion_score, efficiency_index,
                        trend_7d, stability_confidence, last_anomaly_at
                 FROM fusion_metrics WHERE tenant_guid = ?",
            )
            .bind(tenant)
            .fetch_all(&state.db)
            .await
        }
        None => {
            sqlx::query_as(
                "SELECT tenant_guid, integration_name, fusion_score, efficiency_index,
                        trend_7d, stability_confidence, last_anomaly_at
                 FROM fusion_metrics",
            )
            .fetch_all(&state.db)
            .await
        }
    }
    .map_err(core314_common::Error::from)?;

    let connected_integrations = rows.len() as i64;

    let (global_fusion_score, score_origin, system_health) = if rows.is_empty() {
        let baseline: f64 = get_setting(&state.db, "baseline_fusion_score", "75.0")
            .await?
            .parse()
            .unwrap_or(75.0);
        (baseline, "baseline", "observing")
    } else {
        let mean = rows.iter().map(|r| r.fusion_score).sum::<f64>() / rows.len() as f64;
        ((mean * 100.0).round() / 100.0, "computed", "active")
    };

    let has_efficiency_metrics = rows.iter().any(|r| r.efficiency_index > 0.0);

    // Insight phase: the least mature integration gates the whole system
    let mut phase_counts: BTreeMap<String, u64> = BTreeMap::new();
    let mut min_stage: Option<MaturityStage> = None;
    for record in &rows {
        let stage = integration_stage(&state.db, &record.tenant_guid, &record.integration_name).await?;
        *phase_counts.entry(stage.as_str().to_string()).or_insert(0) += 1;
        min_stage = Some(match min_stage {
            Some(current) => current.min(stage),
            None => stage,
        });
    }

    let ai_insight_phase = min_stage.unwrap_or(MaturityStage::Observe).as_str().to_string();

    Ok(Json(StatusResponse {
        success: true,
        system_status: SystemStatus {
            global_fusion_score,
            score_origin: score_origin.to_string(),
            system_health: system_health.to_string(),
            has_efficiency_metrics,
            connected_integrations,
            ai_insight_phase,
            phase_metadata: phase_counts,
        },
    }))
}

async fn integration_stage(
    db: &sqlx::SqlitePool,
    tenant_guid: &str,
    integration_name: &str,
) -> ApiResult<MaturityStage> {
    let (snapshots,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM fusion_metric_history
         WHERE tenant_guid = ? AND integration_name = ?",
    )
    .bind(tenant_guid)
    .bind(integration_name)
    .fetch_one(db)
    .await
    .map_err(core314_common::Error::from)?;

    let (metrics,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM metric_samples
         WHERE tenant_guid = ? AND integration_name = ?",
    )
    .bind(tenant_guid)
    .bind(integration_name)
    .fetch_one(db)
    .await
    .map_err(core314_common::Error::from)?;

    Ok(maturity_stage(snapshots.max(0) as u64, metrics.max(0) as u64))
}
