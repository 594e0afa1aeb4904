// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! KPI tracking.
//!
//! Compares aggregated metrics to operator-defined targets and classifies
//! each KPI's status.  Targets are derived rows: the pipeline recomputes
//! `current_value` and `status` on every run, and the admission path never
//! touches them.

use crate::types::{AggregatedMetrics, KpiStatus, KpiTarget};

impl KpiStatus {
    /// Classify progress toward a target.
    ///
    /// `progress = current / target`: `>= 1` is exceeded, `>= 0.8` on
    /// track, `>= 0.6` at risk, else behind.  A non-positive target is
    /// treated as progress 1 — any achieved value meets a zero target.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use callguard_core::types::KpiStatus;
    ///
    /// assert_eq!(KpiStatus::classify(100.0, 100.0), KpiStatus::Exceeded);
    /// assert_eq!(KpiStatus::classify(80.0, 100.0), KpiStatus::OnTrack);
    /// assert_eq!(KpiStatus::classify(79.0, 100.0), KpiStatus::AtRisk);
    /// assert_eq!(KpiStatus::classify(59.0, 100.0), KpiStatus::Behind);
    /// ```
    pub fn classify(current: f64, target: f64) -> Self {
        if target <= 0.0 {
            return KpiStatus::Exceeded;
        }
        let progress = current / target;
        if progress >= 1.0 {
            KpiStatus::Exceeded
        } else if progress >= 0.8 {
            KpiStatus::OnTrack
        } else if progress >= 0.6 {
            KpiStatus::AtRisk
        } else {
            KpiStatus::Behind
        }
    }
}

/// Recomputes KPI target rows from a fresh metrics snapshot.
pub struct KpiTracker;

impl KpiTracker {
    /// Update each target's `current_value` from `metrics` (when the KPI
    /// name is recognised) and reclassify its status.
    pub fn refresh(targets: &mut [KpiTarget], metrics: &AggregatedMetrics) {
        for target in targets.iter_mut() {
            if let Some(value) = Self::metric_value(metrics, &target.name) {
                target.current_value = value;
            }
            target.status = KpiStatus::classify(target.current_value, target.target_value);
        }
    }

    /// Resolve a KPI name against the overall metrics slice. Unknown names
    /// return `None` and keep their externally supplied current value.
    fn metric_value(metrics: &AggregatedMetrics, name: &str) -> Option<f64> {
        match name {
            "total_calls" | "weekly_calls" => Some(metrics.overall.total_calls as f64),
            "connected_calls" => Some(metrics.overall.connected_calls as f64),
            "total_minutes" => Some(metrics.overall.total_minutes),
            "average_duration" => Some(metrics.overall.average_duration_minutes),
            "connection_rate" => Some(metrics.overall.connection_rate),
            "conversion_rate" => Some(metrics.overall.conversion_rate),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::HashMap;

    #[test]
    fn test_status_boundaries() {
        assert_eq!(KpiStatus::classify(100.0, 100.0), KpiStatus::Exceeded);
        assert_eq!(KpiStatus::classify(101.0, 100.0), KpiStatus::Exceeded);
        assert_eq!(KpiStatus::classify(80.0, 100.0), KpiStatus::OnTrack);
        assert_eq!(KpiStatus::classify(79.0, 100.0), KpiStatus::AtRisk);
        assert_eq!(KpiStatus::classify(60.0, 100.0), KpiStatus::AtRisk);
        assert_eq!(KpiStatus::classify(59.9, 100.0), KpiStatus::Behind);
        assert_eq!(KpiStatus::classify(0.0, 0.0), KpiStatus::Exceeded);
    }

    #[test]
    fn test_refresh_pulls_current_values() {
        let now = Utc::now();
        let metrics = AggregatedMetrics {
            account_id: "acct-001".into(),
            window_start: now,
            window_end: now,
            overall: crate::types::CallMetrics {
                total_calls: 85,
                connected_calls: 40,
                converted_calls: 10,
                total_minutes: 240.0,
                average_duration_minutes: 2.8,
                connection_rate: 47.0,
                conversion_rate: 11.8,
            },
            by_campaign: HashMap::new(),
            by_agent: HashMap::new(),
        };

        let mut targets = vec![
            KpiTarget {
                account_id: "acct-001".into(),
                name: "weekly_calls".into(),
                target_value: 100.0,
                period: "weekly".into(),
                current_value: 0.0,
                status: KpiStatus::Behind,
            },
            KpiTarget {
                account_id: "acct-001".into(),
                name: "custom_metric".into(),
                target_value: 10.0,
                period: "weekly".into(),
                current_value: 11.0,
                status: KpiStatus::Behind,
            },
        ];

        KpiTracker::refresh(&mut targets, &metrics);

        assert_eq!(targets[0].current_value, 85.0);
        assert_eq!(targets[0].status, KpiStatus::OnTrack);
        // Unknown KPI name: value untouched, status still reclassified.
        assert_eq!(targets[1].current_value, 11.0);
        assert_eq!(targets[1].status, KpiStatus::Exceeded);
    }
}
