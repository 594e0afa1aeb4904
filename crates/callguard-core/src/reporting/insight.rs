// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! Period-over-period trend and anomaly detection.
//!
//! Thresholds and confidence scores are fixed heuristic constants — not
//! statistically derived — and are relied on by tests and downstream
//! consumers. Tune with care.

use chrono::{DateTime, Utc};

use crate::types::{
    AggregatedMetrics, BenchmarkData, InsightKind, PredictiveInsight, TrendDirection,
};

/// A volume trend fires when weekly calls move more than this fraction of
/// the previous week.
pub const VOLUME_TREND_RATIO: f64 = 0.2;
/// A conversion trend fires when the rate moves more than this many
/// percentage points.
pub const CONVERSION_TREND_POINTS: f64 = 5.0;
/// A duration anomaly fires when average duration deviates more than this
/// fraction week-over-week.
pub const DURATION_ANOMALY_RATIO: f64 = 0.5;

/// Fixed per-category confidence scores.
pub const VOLUME_CONFIDENCE: f64 = 0.8;
pub const CONVERSION_CONFIDENCE: f64 = 0.75;
pub const DURATION_CONFIDENCE: f64 = 0.9;

/// Generates [`PredictiveInsight`]s from two consecutive metric windows.
pub struct InsightGenerator;

impl InsightGenerator {
    /// Compare `previous` and `current` windows and emit every insight whose
    /// threshold is met.
    pub fn generate(
        previous: &AggregatedMetrics,
        current: &AggregatedMetrics,
        generated_at: DateTime<Utc>,
    ) -> Vec<PredictiveInsight> {
        let mut insights = Vec::new();
        let account_id = &current.account_id;

        // Volume trend.
        let previous_calls = previous.overall.total_calls as f64;
        let current_calls = current.overall.total_calls as f64;
        let delta = current_calls - previous_calls;
        if delta.abs() > VOLUME_TREND_RATIO * previous_calls {
            let magnitude = if previous_calls > 0.0 {
                delta.abs() / previous_calls * 100.0
            } else {
                100.0
            };
            insights.push(PredictiveInsight {
                account_id: account_id.clone(),
                kind: InsightKind::VolumeTrend,
                direction: direction_of(delta),
                magnitude,
                confidence: VOLUME_CONFIDENCE,
                message: format!(
                    "weekly call volume moved {:.0}% ({} -> {})",
                    magnitude, previous.overall.total_calls, current.overall.total_calls
                ),
                generated_at,
            });
        }

        // Conversion-rate trend, in percentage points.
        let delta_points = current.overall.conversion_rate - previous.overall.conversion_rate;
        if delta_points.abs() > CONVERSION_TREND_POINTS {
            insights.push(PredictiveInsight {
                account_id: account_id.clone(),
                kind: InsightKind::ConversionTrend,
                direction: direction_of(delta_points),
                magnitude: delta_points.abs(),
                confidence: CONVERSION_CONFIDENCE,
                message: format!(
                    "conversion rate moved {:.1} points ({:.1}% -> {:.1}%)",
                    delta_points.abs(),
                    previous.overall.conversion_rate,
                    current.overall.conversion_rate
                ),
                generated_at,
            });
        }

        // Duration anomaly.
        let previous_avg = previous.overall.average_duration_minutes;
        let current_avg = current.overall.average_duration_minutes;
        let delta_avg = current_avg - previous_avg;
        if previous_avg > 0.0 && delta_avg.abs() > DURATION_ANOMALY_RATIO * previous_avg {
            insights.push(PredictiveInsight {
                account_id: account_id.clone(),
                kind: InsightKind::DurationAnomaly,
                direction: direction_of(delta_avg),
                magnitude: delta_avg.abs() / previous_avg * 100.0,
                confidence: DURATION_CONFIDENCE,
                message: format!(
                    "average call duration moved from {:.1} to {:.1} minutes",
                    previous_avg, current_avg
                ),
                generated_at,
            });
        }

        insights
    }
}

fn direction_of(delta: f64) -> TrendDirection {
    if delta >= 0.0 {
        TrendDirection::Up
    } else {
        TrendDirection::Down
    }
}

/// Percentile position of `user_value` against peer benchmarks.
///
/// `user_value >= top_quartile` pins to 90; between average and top quartile
/// the position interpolates from 50 to 90; below average it scales from 0
/// to 50. A non-positive average returns 0.
///
/// # Examples
///
/// ```rust
/// use callguard_core::reporting::insight::benchmark_percentile;
///
/// assert_eq!(benchmark_percentile(25.0, 15.0, 25.0), 90.0);
/// assert_eq!(benchmark_percentile(20.0, 15.0, 25.0), 70.0);
/// assert_eq!(benchmark_percentile(0.0, 15.0, 25.0), 0.0);
/// ```
pub fn benchmark_percentile(user_value: f64, average: f64, top_quartile: f64) -> f64 {
    if user_value >= top_quartile {
        return 90.0;
    }
    if average <= 0.0 {
        return 0.0;
    }
    if user_value >= average {
        50.0 + (user_value - average) / (top_quartile - average) * 40.0
    } else {
        user_value / average * 50.0
    }
}

impl BenchmarkData {
    /// Build a benchmark datum, computing the percentile position.
    pub fn compute(metric: &str, user_value: f64, industry_average: f64, top_quartile: f64) -> Self {
        Self {
            metric: metric.into(),
            user_value,
            industry_average,
            top_quartile,
            percentile: benchmark_percentile(user_value, industry_average, top_quartile),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CallMetrics;
    use std::collections::HashMap;

    fn window(total_calls: u64, conversion_rate: f64, average_duration: f64) -> AggregatedMetrics {
        let now = Utc::now();
        AggregatedMetrics {
            account_id: "acct-001".into(),
            window_start: now,
            window_end: now,
            overall: CallMetrics {
                total_calls,
                connected_calls: total_calls,
                converted_calls: 0,
                total_minutes: average_duration * total_calls as f64,
                average_duration_minutes: average_duration,
                connection_rate: 100.0,
                conversion_rate,
            },
            by_campaign: HashMap::new(),
            by_agent: HashMap::new(),
        }
    }

    #[test]
    fn test_volume_trend_threshold() {
        let now = Utc::now();
        // 100 -> 119 is below the 20% threshold; 100 -> 121 is above.
        let quiet = InsightGenerator::generate(&window(100, 10.0, 3.0), &window(119, 10.0, 3.0), now);
        assert!(quiet.iter().all(|insight| insight.kind != InsightKind::VolumeTrend));

        let trending =
            InsightGenerator::generate(&window(100, 10.0, 3.0), &window(121, 10.0, 3.0), now);
        let insight = trending
            .iter()
            .find(|insight| insight.kind == InsightKind::VolumeTrend)
            .expect("volume trend expected");
        assert_eq!(insight.direction, TrendDirection::Up);
        assert_eq!(insight.confidence, VOLUME_CONFIDENCE);
    }

    #[test]
    fn test_conversion_trend_threshold() {
        let now = Utc::now();
        let quiet = InsightGenerator::generate(&window(50, 10.0, 3.0), &window(50, 15.0, 3.0), now);
        assert!(quiet.iter().all(|insight| insight.kind != InsightKind::ConversionTrend));

        let trending =
            InsightGenerator::generate(&window(50, 10.0, 3.0), &window(50, 4.0, 3.0), now);
        let insight = trending
            .iter()
            .find(|insight| insight.kind == InsightKind::ConversionTrend)
            .expect("conversion trend expected");
        assert_eq!(insight.direction, TrendDirection::Down);
        assert_eq!(insight.confidence, CONVERSION_CONFIDENCE);
        assert_eq!(insight.magnitude, 6.0);
    }

    #[test]
    fn test_duration_anomaly_threshold() {
        let now = Utc::now();
        let quiet = InsightGenerator::generate(&window(50, 10.0, 4.0), &window(50, 10.0, 5.0), now);
        assert!(quiet.iter().all(|insight| insight.kind != InsightKind::DurationAnomaly));

        let anomalous =
            InsightGenerator::generate(&window(50, 10.0, 4.0), &window(50, 10.0, 6.5), now);
        let insight = anomalous
            .iter()
            .find(|insight| insight.kind == InsightKind::DurationAnomaly)
            .expect("duration anomaly expected");
        assert_eq!(insight.confidence, DURATION_CONFIDENCE);
    }

    #[test]
    fn test_benchmark_percentile_known_points() {
        assert_eq!(benchmark_percentile(25.0, 15.0, 25.0), 90.0);
        assert_eq!(benchmark_percentile(20.0, 15.0, 25.0), 70.0);
        assert_eq!(benchmark_percentile(0.0, 15.0, 25.0), 0.0);
        assert_eq!(benchmark_percentile(30.0, 15.0, 25.0), 90.0);
        assert_eq!(benchmark_percentile(5.0, 0.0, 25.0), 0.0);
    }
}
