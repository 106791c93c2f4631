//! Fusion metric calculator
//!
//! Pure computation over one raw counter sample plus a window of historical
//! fusion scores. Everything here is deterministic: re-running with the
//! same sample and history yields bit-identical results. Persistence lives
//! in `store`.

pub mod store;

use core314_common::db::models::MetricSample;
use serde::Serialize;

/// Fusion score weights: success rate 40%, data quality 30%, uptime 30%
const WEIGHT_SUCCESS: f64 = 0.4;
const WEIGHT_QUALITY: f64 = 0.3;
const WEIGHT_UPTIME: f64 = 0.3;

/// Stability penalties
const SLOW_RESPONSE_MS: f64 = 2000.0;
const SLOW_RESPONSE_PENALTY: f64 = 0.9;
const LOW_UPTIME_PCT: f64 = 95.0;
const LOW_UPTIME_PENALTY: f64 = 0.85;
const HIGH_VARIANCE_STDDEV: f64 = 15.0;
const HIGH_VARIANCE_PENALTY: f64 = 0.8;

/// Anomaly thresholds
const ANOMALY_SUCCESS_RATE: f64 = 0.5;
const ANOMALY_RESPONSE_MS: f64 = 5000.0;
const ANOMALY_UPTIME_PCT: f64 = 90.0;
const ANOMALY_SCORE_DROP: f64 = 0.7;

/// Window sizes over the historical score log
const TREND_WINDOW: usize = 7;
const ANOMALY_BASELINE_WINDOW: usize = 3;

/// Derived numbers for one sample
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComputedMetrics {
    pub fusion_score: f64,
    pub efficiency_index: f64,
    pub stability_confidence: f64,
    pub trend_7d: f64,
    /// Point-in-time flag; not sticky across computations
    pub anomaly: bool,
}

/// Compute all derived metrics for one sample
///
/// `history` is the append-only fusion score log for this integration in
/// chronological order (oldest first), excluding the score being computed.
pub fn compute(sample: &MetricSample, history: &[f64]) -> ComputedMetrics {
    let success_rate = success_rate(sample);

    let fusion_score = round2(
        (WEIGHT_SUCCESS * success_rate * 100.0
            + WEIGHT_QUALITY * sample.data_quality_score
            + WEIGHT_UPTIME * sample.uptime_percentage)
            .clamp(0.0, 100.0),
    );

    let efficiency_index = round2(
        (100.0 * success_rate * 1000.0 / sample.avg_response_time_ms.max(1.0)).min(100.0),
    );

    let trend_window = tail(history, TREND_WINDOW);

    let mut stability = success_rate * 100.0;
    if sample.avg_response_time_ms > SLOW_RESPONSE_MS {
        stability *= SLOW_RESPONSE_PENALTY;
    }
    if sample.uptime_percentage < LOW_UPTIME_PCT {
        stability *= LOW_UPTIME_PENALTY;
    }
    if std_deviation(trend_window) > HIGH_VARIANCE_STDDEV {
        stability *= HIGH_VARIANCE_PENALTY;
    }
    let stability_confidence = round2(stability.clamp(0.0, 100.0));

    let trend_7d = trend(trend_window);

    let anomaly = is_anomalous(sample, success_rate, fusion_score, history);

    ComputedMetrics {
        fusion_score,
        efficiency_index,
        stability_confidence,
        trend_7d,
        anomaly,
    }
}

/// Success rate as a fraction (0.0-1.0); 0 when no observations
fn success_rate(sample: &MetricSample) -> f64 {
    let total = sample.success_count + sample.failure_count;
    if total == 0 {
        0.0
    } else {
        sample.success_count as f64 / total as f64
    }
}

/// Percentage change oldest → newest over the trend window
///
/// Returns 0 for fewer than 2 points and for a zero oldest score, so the
/// division-by-zero case never surfaces as NaN or infinity.
fn trend(window: &[f64]) -> f64 {
    if window.len() < 2 {
        return 0.0;
    }
    let oldest = window[0];
    if oldest == 0.0 {
        return 0.0;
    }
    let newest = window[window.len() - 1];
    round2((newest - oldest) / oldest * 100.0)
}

fn is_anomalous(sample: &MetricSample, success_rate: f64, fusion_score: f64, history: &[f64]) -> bool {
    if success_rate < ANOMALY_SUCCESS_RATE {
        return true;
    }
    if sample.avg_response_time_ms > ANOMALY_RESPONSE_MS {
        return true;
    }
    if sample.uptime_percentage < ANOMALY_UPTIME_PCT {
        return true;
    }

    let baseline = tail(history, ANOMALY_BASELINE_WINDOW);
    if !baseline.is_empty() {
        let avg = baseline.iter().sum::<f64>() / baseline.len() as f64;
        if fusion_score < ANOMALY_SCORE_DROP * avg {
            return true;
        }
    }

    false
}

/// Population standard deviation; 0 for fewer than 2 points
fn std_deviation(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

fn tail(values: &[f64], n: usize) -> &[f64] {
    let start = values.len().saturating_sub(n);
    &values[start..]
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(
        success: u64,
        failure: u64,
        avg_rt: f64,
        quality: f64,
        uptime: f64,
    ) -> MetricSample {
        MetricSample {
            integration_name: "slack".to_string(),
            success_count: success,
            failure_count: failure,
            avg_response_time_ms: avg_rt,
            data_quality_score: quality,
            uptime_percentage: uptime,
        }
    }

    #[test]
    fn test_healthy_sample_scores() {
        let m = compute(&sample(80, 20, 500.0, 90.0, 99.0), &[]);

        // 0.4*80 + 0.3*90 + 0.3*99 = 88.7
        assert_eq!(m.fusion_score, 88.7);
        // 100 * 0.8 * 1000 / 500 = 160, clamped
        assert_eq!(m.efficiency_index, 100.0);
        assert_eq!(m.stability_confidence, 80.0);
        assert_eq!(m.trend_7d, 0.0);
        assert!(!m.anomaly);
    }

    #[test]
    fn test_zero_counts_no_division_error() {
        let m = compute(&sample(0, 0, 1.0, 0.0, 0.0), &[]);

        assert_eq!(m.fusion_score, 0.0);
        assert_eq!(m.efficiency_index, 0.0);
        assert!(m.fusion_score.is_finite());
        assert!(m.efficiency_index.is_finite());
        assert!(m.trend_7d.is_finite());
    }

    #[test]
    fn test_scores_bounded_0_100() {
        let perfect = compute(&sample(1000, 0, 1.0, 100.0, 100.0), &[]);
        assert_eq!(perfect.fusion_score, 100.0);
        assert_eq!(perfect.efficiency_index, 100.0);
        assert_eq!(perfect.stability_confidence, 100.0);

        let broken = compute(&sample(0, 1000, 10_000.0, 0.0, 0.0), &[]);
        assert_eq!(broken.fusion_score, 0.0);
        assert_eq!(broken.efficiency_index, 0.0);
        assert_eq!(broken.stability_confidence, 0.0);
    }

    #[test]
    fn test_stability_penalties_stack() {
        // Slow responses and low uptime both apply: 100 * 0.9 * 0.85 = 76.5
        let m = compute(&sample(10, 0, 2500.0, 90.0, 94.0), &[]);
        assert_eq!(m.stability_confidence, 76.5);
    }

    #[test]
    fn test_high_variance_penalty() {
        // Wild score swings in the last 7 records push stddev over 15
        let history = vec![10.0, 90.0, 15.0, 85.0, 20.0, 95.0, 30.0];
        let m = compute(&sample(10, 0, 100.0, 90.0, 99.0), &history);
        assert_eq!(m.stability_confidence, 80.0); // 100 * 0.8
    }

    #[test]
    fn test_trend_requires_two_points() {
        let m = compute(&sample(10, 0, 100.0, 90.0, 99.0), &[50.0]);
        assert_eq!(m.trend_7d, 0.0);
    }

    #[test]
    fn test_trend_zero_oldest_is_zero_not_infinity() {
        let m = compute(&sample(10, 0, 100.0, 90.0, 99.0), &[0.0, 50.0, 80.0]);
        assert_eq!(m.trend_7d, 0.0);
    }

    #[test]
    fn test_trend_uses_last_seven_records() {
        // 9 records; window is the last 7: oldest 40, newest 80 => +100%
        let history = vec![10.0, 20.0, 40.0, 42.0, 44.0, 46.0, 48.0, 60.0, 80.0];
        let m = compute(&sample(10, 0, 100.0, 90.0, 99.0), &history);
        assert_eq!(m.trend_7d, 100.0);
    }

    #[test]
    fn test_anomaly_on_low_success_rate() {
        let m = compute(&sample(4, 6, 100.0, 90.0, 99.0), &[]);
        assert!(m.anomaly);
    }

    #[test]
    fn test_anomaly_on_slow_responses() {
        let m = compute(&sample(10, 0, 5001.0, 90.0, 99.0), &[]);
        assert!(m.anomaly);
    }

    #[test]
    fn test_anomaly_on_low_uptime() {
        let m = compute(&sample(10, 0, 100.0, 90.0, 89.9), &[]);
        assert!(m.anomaly);
    }

    #[test]
    fn test_anomaly_on_score_collapse() {
        // Recent history averages ~90; current fusion score 55.7 < 0.7*90
        let history = vec![90.0, 91.0, 89.0];
        let m = compute(&sample(60, 40, 100.0, 50.0, 55.0), &history);
        assert!(m.anomaly);
    }

    #[test]
    fn test_empty_sample_counts_as_anomalous() {
        // Zero observations yield a 0 success rate, which is below the
        // anomaly threshold
        let m = compute(&sample(0, 0, 100.0, 90.0, 99.0), &[]);
        assert!(m.anomaly);
    }

    #[test]
    fn test_determinism() {
        let s = sample(7, 3, 1234.5, 67.8, 91.2);
        let history = vec![55.0, 60.0, 58.0, 61.0];
        assert_eq!(compute(&s, &history), compute(&s, &history));
    }
}
