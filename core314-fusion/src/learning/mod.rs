//! Learning-state deriver
//!
//! Maps an integration's accumulated history into an enumerated maturity
//! stage, confidence score, and trend labels for display. Pure and
//! stateless: the output is never persisted and is recomputed identically
//! on every request.

pub mod events;
pub mod history;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Snapshot count below which an integration is still observing
const OBSERVE_MAX_SNAPSHOTS: u64 = 5;
const OBSERVE_MAX_METRICS: u64 = 3;

/// Inclusive thresholds for the predict stage
const PREDICT_MIN_SNAPSHOTS: u64 = 15;
const PREDICT_MIN_METRICS: u64 = 5;

/// Variance movement factors shared with event generation
pub const VARIANCE_DECREASE_FACTOR: f64 = 0.7;
pub const VARIANCE_INCREASE_FACTOR: f64 = 1.3;

/// Mean inter-snapshot interval boundaries, in days
const VELOCITY_HIGH_DAYS: f64 = 2.0;
const VELOCITY_LOW_DAYS: f64 = 7.0;

/// Data-sufficiency progression for an integration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MaturityStage {
    Observe,
    Analyze,
    Predict,
}

impl MaturityStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            MaturityStage::Observe => "observe",
            MaturityStage::Analyze => "analyze",
            MaturityStage::Predict => "predict",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VarianceTrend {
    Increasing,
    Decreasing,
    Stable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LearningVelocity {
    Low,
    Medium,
    High,
}

/// Inputs summarizing an integration's append-only history
#[derive(Debug, Clone, Default)]
pub struct LearningInputs {
    pub snapshot_count: u64,
    pub metrics_count: u64,
    pub score_exists: bool,
    pub variance_recent: Option<f64>,
    pub variance_older: Option<f64>,
    /// Mean days between consecutive snapshots; None with fewer than 2
    pub mean_interval_days: Option<f64>,
    pub baseline_established_at: Option<DateTime<Utc>>,
    /// Confidence recomputed over only the history at least 30 days old
    pub confidence_30_days_ago: Option<f64>,
    pub last_promotion_event: Option<String>,
    pub suppression_events_count: u64,
}

/// Derived display state; computed, never persisted
#[derive(Debug, Clone, Serialize)]
pub struct LearningState {
    pub baseline_established_at: Option<DateTime<Utc>>,
    pub snapshot_count: u64,
    pub confidence_current: f64,
    pub confidence_delta_30: f64,
    pub variance_current: Option<f64>,
    pub variance_trend: VarianceTrend,
    pub maturity_stage: MaturityStage,
    pub learning_velocity: LearningVelocity,
    pub last_promotion_event: Option<String>,
    pub suppression_events_count: u64,
}

/// Derive the full learning state from history inputs
pub fn derive(inputs: &LearningInputs) -> LearningState {
    let confidence_current = confidence(
        inputs.snapshot_count,
        inputs.metrics_count,
        inputs.score_exists,
        inputs.variance_recent,
    );

    let confidence_delta_30 = inputs
        .confidence_30_days_ago
        .map(|prior| confidence_current - prior)
        .unwrap_or(0.0);

    LearningState {
        baseline_established_at: inputs.baseline_established_at,
        snapshot_count: inputs.snapshot_count,
        confidence_current,
        confidence_delta_30,
        variance_current: inputs.variance_recent,
        variance_trend: variance_trend(inputs.variance_recent, inputs.variance_older),
        maturity_stage: maturity_stage(inputs.snapshot_count, inputs.metrics_count),
        learning_velocity: learning_velocity(inputs.mean_interval_days),
        last_promotion_event: inputs.last_promotion_event.clone(),
        suppression_events_count: inputs.suppression_events_count,
    }
}

/// Confidence in the derived metrics, 0.0-1.0
///
/// Monotone non-decreasing in snapshot and metric counts, non-increasing in
/// variance. The weights are a product decision, not a statistical claim.
pub fn confidence(
    snapshot_count: u64,
    metrics_count: u64,
    score_exists: bool,
    variance: Option<f64>,
) -> f64 {
    let mut base = 0.05 * snapshot_count as f64 + 0.07 * metrics_count as f64;
    if score_exists {
        base += 0.1;
    }
    base = base.min(0.95);

    let damped = match variance {
        Some(v) if v > 0.0 => base / (1.0 + v),
        _ => base,
    };

    damped.clamp(0.0, 1.0)
}

/// Compare recent variance against older variance
///
/// Stable when the older window is zero or unavailable.
pub fn variance_trend(recent: Option<f64>, older: Option<f64>) -> VarianceTrend {
    let (recent, older) = match (recent, older) {
        (Some(r), Some(o)) if o > 0.0 => (r, o),
        _ => return VarianceTrend::Stable,
    };

    if recent < VARIANCE_DECREASE_FACTOR * older {
        VarianceTrend::Decreasing
    } else if recent > VARIANCE_INCREASE_FACTOR * older {
        VarianceTrend::Increasing
    } else {
        VarianceTrend::Stable
    }
}

/// Fixed-priority stage bucketing: the observe check runs first
pub fn maturity_stage(snapshot_count: u64, metrics_count: u64) -> MaturityStage {
    if snapshot_count < OBSERVE_MAX_SNAPSHOTS || metrics_count < OBSERVE_MAX_METRICS {
        MaturityStage::Observe
    } else if snapshot_count >= PREDICT_MIN_SNAPSHOTS && metrics_count >= PREDICT_MIN_METRICS {
        MaturityStage::Predict
    } else {
        MaturityStage::Analyze
    }
}

/// Bucket the mean inter-snapshot interval
///
/// The 2-7 day band is inclusive on both ends; with fewer than two
/// snapshots there is no interval, which reads as low velocity.
pub fn learning_velocity(mean_interval_days: Option<f64>) -> LearningVelocity {
    match mean_interval_days {
        Some(days) if days < VELOCITY_HIGH_DAYS => LearningVelocity::High,
        Some(days) if days > VELOCITY_LOW_DAYS => LearningVelocity::Low,
        Some(_) => LearningVelocity::Medium,
        None => LearningVelocity::Low,
    }
}
