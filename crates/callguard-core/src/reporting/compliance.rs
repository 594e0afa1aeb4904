// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! Periodic compliance-score synthesis.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::types::{CallRecord, ComplianceReport, Violation, ViolationKind};

/// Substitute call count for periods with no call activity, so that a quiet
/// period with zero violations scores 100 rather than dividing by zero.
const EMPTY_PERIOD_CALLS: u64 = 100;

/// Builds [`ComplianceReport`]s from a period's call and violation history.
pub struct ComplianceReporter;

impl ComplianceReporter {
    /// Synthesise the period report.
    ///
    /// `score = round(100 x (calls - violations) / calls)`, with calls
    /// substituted by 100 for an empty period.  Violations are not
    /// one-per-call, so they can outnumber calls; the compliant-call count
    /// is clamped at zero and `violation_overflow` is set instead of
    /// letting the count go negative.
    pub fn report(
        account_id: &str,
        calls: &[CallRecord],
        violations: &[Violation],
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
        generated_at: DateTime<Utc>,
    ) -> ComplianceReport {
        let total_calls = if calls.is_empty() {
            EMPTY_PERIOD_CALLS
        } else {
            calls.len() as u64
        };
        let total_violations = violations.len() as u64;
        let violation_overflow = total_violations > total_calls;
        let compliant_calls = total_calls.saturating_sub(total_violations);
        let compliance_score =
            (compliant_calls as f64 / total_calls as f64 * 100.0).round() as u8;

        let mut violations_by_kind: HashMap<String, u64> = HashMap::new();
        for violation in violations {
            *violations_by_kind
                .entry(violation.kind.display_name().into())
                .or_insert(0) += 1;
        }

        let recommendations =
            Self::recommendations(&violations_by_kind, violation_overflow, compliance_score);

        ComplianceReport {
            account_id: account_id.into(),
            period_start,
            period_end,
            total_calls,
            total_violations,
            compliant_calls,
            compliance_score,
            violation_overflow,
            violations_by_kind,
            recommendations,
            generated_at,
        }
    }

    fn recommendations(
        by_kind: &HashMap<String, u64>,
        overflow: bool,
        score: u8,
    ) -> Vec<String> {
        let mut recommendations = Vec::new();
        let count =
            |kind: ViolationKind| by_kind.get(kind.display_name()).copied().unwrap_or(0);

        if count(ViolationKind::DncViolation) > 0 {
            recommendations
                .push("Scrub lead lists against the do-not-call registry before dialling.".into());
        }
        if count(ViolationKind::ConsentViolation) > 0 {
            recommendations
                .push("Re-verify consent records and capture refreshed opt-ins.".into());
        }
        if count(ViolationKind::CallingHoursViolation) > 0 {
            recommendations
                .push("Align dialer schedules with destination-local calling windows.".into());
        }
        if count(ViolationKind::FrequencyViolation) > 0 {
            recommendations
                .push("Lower per-destination attempt caps or widen retry spacing.".into());
        }
        if overflow {
            recommendations.push(
                "Violations outnumbered calls this period; investigate rule configuration."
                    .into(),
            );
        }
        if recommendations.is_empty() && score == 100 {
            recommendations.push("No compliance issues detected in this period.".into());
        }
        recommendations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CallDirection, CallOutcome, Severity};
    use uuid::Uuid;

    fn call() -> CallRecord {
        let now = Utc::now();
        CallRecord {
            id: Uuid::new_v4(),
            account_id: "acct-001".into(),
            campaign_id: None,
            agent_id: None,
            destination: "+15551230000".into(),
            direction: CallDirection::Outbound,
            started_at: now,
            ended_at: now,
            duration_minutes: 1.0,
            outcome: CallOutcome::Connected,
            reservation_id: Uuid::new_v4(),
        }
    }

    fn violation(kind: ViolationKind) -> Violation {
        Violation {
            id: Uuid::new_v4(),
            account_id: "acct-001".into(),
            kind,
            severity: Severity::High,
            destination: "+15551230000".into(),
            call_id: None,
            occurred_at: Utc::now(),
            detail: String::new(),
            resolved: false,
            resolved_at: None,
            resolution_note: None,
        }
    }

    #[test]
    fn test_score_with_activity() {
        let now = Utc::now();
        let calls: Vec<CallRecord> = (0..10).map(|_| call()).collect();
        let violations = vec![violation(ViolationKind::DncViolation)];

        let report =
            ComplianceReporter::report("acct-001", &calls, &violations, now, now, now);
        assert_eq!(report.total_calls, 10);
        assert_eq!(report.compliant_calls, 9);
        assert_eq!(report.compliance_score, 90);
        assert!(!report.violation_overflow);
        assert_eq!(report.violations_by_kind["dnc_violation"], 1);
    }

    #[test]
    fn test_empty_period_scores_clean() {
        let now = Utc::now();
        let report = ComplianceReporter::report("acct-001", &[], &[], now, now, now);
        assert_eq!(report.total_calls, 100);
        assert_eq!(report.compliance_score, 100);
        assert_eq!(
            report.recommendations,
            vec!["No compliance issues detected in this period.".to_string()]
        );
    }

    #[test]
    fn test_violations_exceeding_calls_clamp_to_zero() {
        let now = Utc::now();
        let calls = vec![call(), call()];
        let violations: Vec<Violation> = (0..5)
            .map(|_| violation(ViolationKind::FrequencyViolation))
            .collect();

        let report =
            ComplianceReporter::report("acct-001", &calls, &violations, now, now, now);
        assert_eq!(report.compliant_calls, 0);
        assert_eq!(report.compliance_score, 0);
        assert!(report.violation_overflow);
        assert!(report
            .recommendations
            .iter()
            .any(|recommendation| recommendation.contains("outnumbered")));
    }
}
