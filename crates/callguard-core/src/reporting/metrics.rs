// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! Windowed call-record aggregation.
//!
//! Pure functions over historical [`CallRecord`] slices.  No shared state,
//! no concurrency hazards — the aggregator never touches admission state.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::types::{AggregatedMetrics, CallMetrics, CallRecord};

/// Aggregates completed-call records into overall, per-campaign, and
/// per-agent statistics.
pub struct MetricsAggregator;

impl MetricsAggregator {
    /// Aggregate `records` (already filtered to the window by the caller)
    /// into an [`AggregatedMetrics`] snapshot.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use callguard_core::reporting::metrics::MetricsAggregator;
    /// use chrono::Utc;
    ///
    /// let now = Utc::now();
    /// let metrics = MetricsAggregator::aggregate("acct-001", &[], now, now);
    /// assert_eq!(metrics.overall.total_calls, 0);
    /// assert_eq!(metrics.overall.conversion_rate, 0.0);
    /// ```
    pub fn aggregate(
        account_id: &str,
        records: &[CallRecord],
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> AggregatedMetrics {
        let mut by_campaign: HashMap<String, Vec<&CallRecord>> = HashMap::new();
        let mut by_agent: HashMap<String, Vec<&CallRecord>> = HashMap::new();
        for record in records {
            if let Some(campaign_id) = &record.campaign_id {
                by_campaign.entry(campaign_id.clone()).or_default().push(record);
            }
            if let Some(agent_id) = &record.agent_id {
                by_agent.entry(agent_id.clone()).or_default().push(record);
            }
        }

        AggregatedMetrics {
            account_id: account_id.into(),
            window_start,
            window_end,
            overall: slice_metrics(records.iter()),
            by_campaign: by_campaign
                .into_iter()
                .map(|(key, slice)| (key, slice_metrics(slice.into_iter())))
                .collect(),
            by_agent: by_agent
                .into_iter()
                .map(|(key, slice)| (key, slice_metrics(slice.into_iter())))
                .collect(),
        }
    }
}

fn slice_metrics<'a>(records: impl Iterator<Item = &'a CallRecord>) -> CallMetrics {
    let mut metrics = CallMetrics::default();
    for record in records {
        metrics.total_calls += 1;
        if record.outcome.connected() {
            metrics.connected_calls += 1;
        }
        if record.outcome == crate::types::CallOutcome::Converted {
            metrics.converted_calls += 1;
        }
        metrics.total_minutes += record.duration_minutes;
    }
    if metrics.total_calls > 0 {
        let total = metrics.total_calls as f64;
        metrics.average_duration_minutes = metrics.total_minutes / total;
        metrics.connection_rate = metrics.connected_calls as f64 / total * 100.0;
        metrics.conversion_rate = metrics.converted_calls as f64 / total * 100.0;
    }
    metrics
}
