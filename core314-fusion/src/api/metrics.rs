//! Batch metric ingestion endpoint

use axum::{extract::State, Json};
use core314_common::db::models::MetricSample;
use serde::{Deserialize, Serialize};

use crate::metrics::store::process_batch;
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct IngestRequest {
    pub tenant_guid: String,
    pub samples: Vec<SampleInput>,
}

/// Wire shape of one sample
///
/// Counts arrive as signed integers so a negative count lands in the
/// itemized validation list instead of a deserialization rejection.
#[derive(Debug, Deserialize)]
pub struct SampleInput {
    pub integration_name: String,
    pub success_count: i64,
    pub failure_count: i64,
    pub avg_response_time_ms: f64,
    pub data_quality_score: f64,
    pub uptime_percentage: f64,
}

impl SampleInput {
    /// Convert to the storage model; valid only after `validate`
    fn to_sample(&self) -> MetricSample {
        MetricSample {
            integration_name: self.integration_name.clone(),
            success_count: self.success_count.max(0) as u64,
            failure_count: self.failure_count.max(0) as u64,
            avg_response_time_ms: self.avg_response_time_ms,
            data_quality_score: self.data_quality_score,
            uptime_percentage: self.uptime_percentage,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub success: bool,
    pub processed: usize,
    pub total: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

/// POST /api/metrics/ingest
///
/// Computes and persists fusion metrics for a batch of samples. A
/// persistence failure for one sample does not abort the rest; per-sample
/// errors come back in the response.
pub async fn ingest_metrics(
    State(state): State<AppState>,
    Json(request): Json<IngestRequest>,
) -> ApiResult<Json<IngestResponse>> {
    validate(&request)?;

    let samples: Vec<MetricSample> = request.samples.iter().map(SampleInput::to_sample).collect();
    let report = process_batch(&state.db, &request.tenant_guid, &samples).await;

    Ok(Json(IngestResponse {
        success: report.errors.is_empty(),
        processed: report.processed,
        total: report.total,
        errors: report.errors,
    }))
}

/// Reject malformed input with an itemized error list
fn validate(request: &IngestRequest) -> Result<(), ApiError> {
    let mut errors = Vec::new();

    if request.tenant_guid.is_empty() {
        errors.push("tenant_guid must not be empty".to_string());
    }
    if request.samples.is_empty() {
        errors.push("samples must not be empty".to_string());
    }

    for (index, sample) in request.samples.iter().enumerate() {
        if sample.integration_name.is_empty() {
            errors.push(format!("samples[{}]: integration_name must not be empty", index));
        }
        if sample.success_count < 0 {
            errors.push(format!(
                "samples[{}]: success_count {} must not be negative",
                index, sample.success_count
            ));
        }
        if sample.failure_count < 0 {
            errors.push(format!(
                "samples[{}]: failure_count {} must not be negative",
                index, sample.failure_count
            ));
        }
        if !(0.0..=100.0).contains(&sample.data_quality_score) {
            errors.push(format!(
                "samples[{}]: data_quality_score {} outside 0-100",
                index, sample.data_quality_score
            ));
        }
        if !(0.0..=100.0).contains(&sample.uptime_percentage) {
            errors.push(format!(
                "samples[{}]: uptime_percentage {} outside 0-100",
                index, sample.uptime_percentage
            ));
        }
        if sample.avg_response_time_ms < 0.0 || !sample.avg_response_time_ms.is_finite() {
            errors.push(format!(
                "samples[{}]: avg_response_time_ms {} invalid",
                index, sample.avg_response_time_ms
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ApiError::Validation(errors))
    }
}
