//! Learning event generation
//!
//! Scans an integration's ordered snapshot history once and emits one event
//! per qualifying transition, in chronological order. Events are a view
//! over history: derived, read-only, and fully deterministic, down to the
//! sequence-based ids and template explanations.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{maturity_stage, MaturityStage, VARIANCE_DECREASE_FACTOR, VARIANCE_INCREASE_FACTOR};

/// Variance below this reads as stabilized
pub const STABILITY_THRESHOLD: f64 = 10.0;

/// Events shown per page before truncation
pub const DISPLAY_LIMIT: usize = 10;

/// One point in the snapshot history, oldest first
#[derive(Debug, Clone)]
pub struct HistoryPoint {
    pub recorded_at: DateTime<Utc>,
    pub fusion_score: f64,
    /// Rolling variance at this point, when enough data existed
    pub variance: Option<f64>,
    /// Metric rows that existed at this point
    pub metrics_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LearningEventKind {
    BaselineEstablished,
    VarianceStabilized,
    MaturityPromoted,
    ConfidenceIncreased,
    ConfidenceDecreased,
}

/// Derived, read-only transition record
#[derive(Debug, Clone, Serialize)]
pub struct LearningEvent {
    /// Deterministic id: integration name plus emission sequence
    pub id: String,
    pub kind: LearningEventKind,
    pub occurred_at: DateTime<Utc>,
    pub explanation: String,
}

/// Scan the history once and emit transition events in order
pub fn generate(integration_name: &str, history: &[HistoryPoint]) -> Vec<LearningEvent> {
    let mut events = Vec::new();
    let mut seq = 0usize;

    let mut emit = |events: &mut Vec<LearningEvent>,
                    kind: LearningEventKind,
                    occurred_at: DateTime<Utc>,
                    explanation: String| {
        events.push(LearningEvent {
            id: format!("{}-{:04}", integration_name, seq),
            kind,
            occurred_at,
            explanation,
        });
        seq += 1;
    };

    let mut prior_stage: Option<MaturityStage> = None;
    let mut prior_variance: Option<f64> = None;

    for (index, point) in history.iter().enumerate() {
        if index == 0 {
            emit(
                &mut events,
                LearningEventKind::BaselineEstablished,
                point.recorded_at,
                format!(
                    "First fusion score recorded for {} ({:.2}); baseline established",
                    integration_name, point.fusion_score
                ),
            );
        }

        if let (Some(prev), Some(curr)) = (prior_variance, point.variance) {
            if prev >= STABILITY_THRESHOLD && curr < STABILITY_THRESHOLD {
                emit(
                    &mut events,
                    LearningEventKind::VarianceStabilized,
                    point.recorded_at,
                    format!(
                        "Score variance for {} dropped below {:.1} ({:.2}); readings are stabilizing",
                        integration_name, STABILITY_THRESHOLD, curr
                    ),
                );
            }

            if curr < VARIANCE_DECREASE_FACTOR * prev {
                emit(
                    &mut events,
                    LearningEventKind::ConfidenceIncreased,
                    point.recorded_at,
                    format!(
                        "Variance for {} fell from {:.2} to {:.2}; confidence increased",
                        integration_name, prev, curr
                    ),
                );
            } else if curr > VARIANCE_INCREASE_FACTOR * prev {
                emit(
                    &mut events,
                    LearningEventKind::ConfidenceDecreased,
                    point.recorded_at,
                    format!(
                        "Variance for {} rose from {:.2} to {:.2}; confidence decreased",
                        integration_name, prev, curr
                    ),
                );
            }
        }

        // Stage evaluated as of this point: index+1 snapshots seen so far.
        // Only upward transitions are events; demotion is undefined.
        let stage = maturity_stage(index as u64 + 1, point.metrics_count);
        if let Some(prev_stage) = prior_stage {
            if stage > prev_stage {
                emit(
                    &mut events,
                    LearningEventKind::MaturityPromoted,
                    point.recorded_at,
                    format!(
                        "{} promoted from {} to {} with {} snapshots",
                        integration_name,
                        prev_stage.as_str(),
                        stage.as_str(),
                        index + 1
                    ),
                );
            }
        }

        prior_stage = Some(stage);
        if point.variance.is_some() {
            prior_variance = point.variance;
        }
    }

    events
}

/// Truncate to the most recent events for presentation
///
/// Returns the kept tail (still chronological) and whether more exist.
pub fn truncate_for_display(events: Vec<LearningEvent>, limit: usize) -> (Vec<LearningEvent>, bool) {
    let has_more = events.len() > limit;
    let start = events.len().saturating_sub(limit);
    (events[start..].to_vec(), has_more)
}
