// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! Compliance rule evaluation.
//!
//! [`PolicyEvaluator`] runs **every enabled rule, unconditionally** — there
//! is no early return on the first violation.  The violation list is audit
//! evidence and downstream reporting assumes completeness, so a denied call
//! carries every rule it broke, not just the first one found.
//!
//! Rule semantics:
//!
//! | Rule                   | Violation condition                                   |
//! |------------------------|-------------------------------------------------------|
//! | `dnc_check`            | a DNC entry exists for `(account, destination)`       |
//! | `consent_verification` | no active consent record, or the record has expired   |
//! | `calling_hours`        | local hour `< start` or `>= end`                      |
//! | `frequency_limit`      | attempts in the trailing window `>= max_calls`        |
//! | `recording_disclosure` | advisory only — warns when the feature flag is absent |
//!
//! `consent_verification` additionally emits a warning (not a violation)
//! when the active consent expires within the configured warning window.

use chrono::{DateTime, Duration, Timelike, Utc};
use chrono_tz::Tz;
use uuid::Uuid;

use crate::activity::DestinationActivityLog;
use crate::config::Config;
use crate::error::GateError;
use crate::storage::Storage;
use crate::types::{
    Account, ComplianceRule, PolicyOutcome, RuleEntry, Severity, Violation, ViolationKind,
    Warning, WarningKind,
};

/// The standard rule set applied to accounts with no stored configuration.
pub fn default_rule_set(config: &Config) -> Vec<RuleEntry> {
    vec![
        RuleEntry { rule: ComplianceRule::DncCheck, enabled: true, priority: 10 },
        RuleEntry { rule: ComplianceRule::ConsentVerification, enabled: true, priority: 20 },
        RuleEntry {
            rule: ComplianceRule::CallingHours {
                start_hour: config.default_calling_hours_start,
                end_hour: config.default_calling_hours_end,
            },
            enabled: true,
            priority: 30,
        },
        RuleEntry {
            rule: ComplianceRule::FrequencyLimit {
                max_calls: config.default_frequency_max_calls,
                period_hours: config.default_frequency_period_hours,
            },
            enabled: true,
            priority: 40,
        },
    ]
}

/// Evaluates the account's rule set against a proposed call.
///
/// Stateless apart from its repository handle; the caller supplies the
/// activity log and the evaluation instant, which keeps the evaluator
/// deterministic and testable.
pub struct PolicyEvaluator<S: Storage> {
    config: Config,
    storage: S,
}

impl<S: Storage> PolicyEvaluator<S> {
    /// Create a new [`PolicyEvaluator`].
    pub fn new(config: Config, storage: S) -> Self {
        Self { config, storage }
    }

    /// Evaluate every enabled rule for `account` against `destination` at
    /// the instant `now`, reading recent-attempt counts from `activity`.
    ///
    /// Storage failures propagate — the gate fails closed on them.
    pub fn evaluate_at(
        &self,
        account: &Account,
        destination: &str,
        timezone: Tz,
        activity: &DestinationActivityLog,
        now: DateTime<Utc>,
    ) -> Result<PolicyOutcome, GateError> {
        let mut rules = self.storage.rules(&account.id)?;
        if rules.is_empty() && self.config.default_rules_when_unconfigured {
            rules = default_rule_set(&self.config);
        }
        // Priority orders the violation list for presentation; every enabled
        // rule still runs.
        rules.sort_by_key(|entry| entry.priority);

        let mut violations = Vec::new();
        let mut warnings = Vec::new();

        for entry in rules.iter().filter(|entry| entry.enabled) {
            match &entry.rule {
                ComplianceRule::DncCheck => {
                    if let Some(dnc) =
                        self.storage.get_dnc_entry(&account.id, destination)?
                    {
                        violations.push(self.violation(
                            account,
                            destination,
                            ViolationKind::DncViolation,
                            Severity::Critical,
                            format!("destination is on the do-not-call list ({})", dnc.reason),
                            now,
                        ));
                    }
                }

                ComplianceRule::ConsentVerification => {
                    match self.storage.current_consent(&account.id, destination)? {
                        None => violations.push(self.violation(
                            account,
                            destination,
                            ViolationKind::ConsentViolation,
                            Severity::High,
                            "no consent on record for destination".into(),
                            now,
                        )),
                        Some(record) if !record.active_at(now) => {
                            violations.push(self.violation(
                                account,
                                destination,
                                ViolationKind::ConsentViolation,
                                Severity::High,
                                match record.expires_at {
                                    Some(expiry) => format!("consent expired at {expiry}"),
                                    None => "consent has been revoked".into(),
                                },
                                now,
                            ));
                        }
                        Some(record) => {
                            let window = self.config.consent_expiry_warning_days;
                            if let Some(expiry) = record.expires_at {
                                if record.expiring_within(now, window) {
                                    warnings.push(Warning {
                                        kind: WarningKind::ConsentExpiring,
                                        message: format!(
                                            "consent for {destination} expires at {expiry} (within {window} days)",
                                        ),
                                    });
                                }
                            }
                        }
                    }
                }

                ComplianceRule::CallingHours { start_hour, end_hour } => {
                    let local_hour = now.with_timezone(&timezone).hour();
                    if local_hour < *start_hour || local_hour >= *end_hour {
                        violations.push(self.violation(
                            account,
                            destination,
                            ViolationKind::CallingHoursViolation,
                            Severity::Medium,
                            format!(
                                "local hour {local_hour:02} is outside the {start_hour:02}:00-{end_hour:02}:00 calling window ({timezone})",
                            ),
                            now,
                        ));
                    }
                }

                ComplianceRule::FrequencyLimit { max_calls, period_hours } => {
                    let cutoff = now - Duration::hours(i64::from(*period_hours));
                    let count = activity.count_since(&account.id, destination, cutoff);
                    if count >= *max_calls as usize {
                        violations.push(self.violation(
                            account,
                            destination,
                            ViolationKind::FrequencyViolation,
                            Severity::Medium,
                            format!(
                                "{count} attempts within the trailing {period_hours}h window (max {max_calls})",
                            ),
                            now,
                        ));
                    }
                }

                ComplianceRule::RecordingDisclosure => {
                    // Admission-time code cannot observe in-call disclosure;
                    // the account feature flag is the only available signal,
                    // so this rule never hard-denies.
                    if !account.has_feature("recording_disclosure") {
                        warnings.push(Warning {
                            kind: WarningKind::RecordingDisclosure,
                            message:
                                "account does not carry the recording_disclosure feature".into(),
                        });
                    }
                }
            }
        }

        Ok(PolicyOutcome { compliant: violations.is_empty(), violations, warnings })
    }

    fn violation(
        &self,
        account: &Account,
        destination: &str,
        kind: ViolationKind,
        severity: Severity,
        detail: String,
        now: DateTime<Utc>,
    ) -> Violation {
        Violation {
            id: Uuid::new_v4(),
            account_id: account.id.clone(),
            kind,
            severity,
            destination: destination.into(),
            call_id: None,
            occurred_at: now,
            detail,
            resolved: false,
            resolved_at: None,
            resolution_note: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStorage;
    use crate::types::{ConsentRecord, ConsentType, DncEntry, DncSource};
    use chrono::TimeZone;

    fn account() -> Account {
        Account {
            id: "acct-001".into(),
            monthly_quota_minutes: 0.0,
            minutes_used: 0.0,
            features: vec![],
            max_concurrent_calls: 0,
        }
    }

    fn consent(expires_at: Option<DateTime<Utc>>) -> ConsentRecord {
        ConsentRecord {
            account_id: "acct-001".into(),
            phone: "+15551230000".into(),
            consent_type: ConsentType::ExpressWritten,
            method: "web_form".into(),
            granted_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            revoked_at: None,
            expires_at,
        }
    }

    /// Noon UTC is mid-window in UTC itself.
    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap()
    }

    fn evaluator() -> (PolicyEvaluator<InMemoryStorage>, InMemoryStorage, DestinationActivityLog)
    {
        let storage = InMemoryStorage::new();
        let evaluator = PolicyEvaluator::new(Config::default(), storage.clone());
        (evaluator, storage, DestinationActivityLog::new())
    }

    #[test]
    fn test_all_rules_evaluated_no_short_circuit() {
        let (evaluator, storage, activity) = evaluator();
        // DNC entry AND exhausted frequency AND no consent: all three
        // violations must appear, in priority order.
        storage
            .put_dnc_entry(DncEntry {
                account_id: "acct-001".into(),
                phone: "+15551230000".into(),
                reason: "consumer request".into(),
                source: DncSource::ConsumerRequest,
                added_at: noon(),
            })
            .unwrap();
        for _ in 0..3 {
            activity.record("acct-001", "+15551230000", noon() - Duration::hours(1));
        }

        let outcome = evaluator
            .evaluate_at(&account(), "+15551230000", chrono_tz::UTC, &activity, noon())
            .unwrap();

        assert!(!outcome.compliant);
        let kinds: Vec<ViolationKind> =
            outcome.violations.iter().map(|violation| violation.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ViolationKind::DncViolation,
                ViolationKind::ConsentViolation,
                ViolationKind::FrequencyViolation,
            ]
        );
    }

    #[test]
    fn test_compliant_when_consented_and_in_window() {
        let (evaluator, storage, activity) = evaluator();
        storage.put_consent(consent(None)).unwrap();

        let outcome = evaluator
            .evaluate_at(&account(), "+15551230000", chrono_tz::UTC, &activity, noon())
            .unwrap();
        assert!(outcome.compliant);
        assert!(outcome.violations.is_empty());
        assert!(outcome.warnings.is_empty());
    }

    #[test]
    fn test_expired_consent_is_violation() {
        let (evaluator, storage, activity) = evaluator();
        storage
            .put_consent(consent(Some(noon() - Duration::days(1))))
            .unwrap();

        let outcome = evaluator
            .evaluate_at(&account(), "+15551230000", chrono_tz::UTC, &activity, noon())
            .unwrap();
        assert_eq!(outcome.violations.len(), 1);
        assert_eq!(outcome.violations[0].kind, ViolationKind::ConsentViolation);
    }

    #[test]
    fn test_expiring_consent_warns_but_passes() {
        let (evaluator, storage, activity) = evaluator();
        storage
            .put_consent(consent(Some(noon() + Duration::days(10))))
            .unwrap();

        let outcome = evaluator
            .evaluate_at(&account(), "+15551230000", chrono_tz::UTC, &activity, noon())
            .unwrap();
        assert!(outcome.compliant);
        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(outcome.warnings[0].kind, WarningKind::ConsentExpiring);
    }

    #[test]
    fn test_calling_hours_respect_timezone() {
        let (evaluator, storage, activity) = evaluator();
        storage.put_consent(consent(None)).unwrap();

        // Noon UTC is 06:00 in Chicago (CST, UTC-6) — before the window.
        let outcome = evaluator
            .evaluate_at(
                &account(),
                "+15551230000",
                chrono_tz::America::Chicago,
                &activity,
                Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).unwrap(),
            )
            .unwrap();
        assert_eq!(outcome.violations.len(), 1);
        assert_eq!(outcome.violations[0].kind, ViolationKind::CallingHoursViolation);

        // 15:00 UTC is 09:00 in Chicago — inside the window.
        let outcome = evaluator
            .evaluate_at(
                &account(),
                "+15551230000",
                chrono_tz::America::Chicago,
                &activity,
                Utc.with_ymd_and_hms(2026, 1, 15, 15, 0, 0).unwrap(),
            )
            .unwrap();
        assert!(outcome.compliant);
    }

    #[test]
    fn test_calling_hours_window_boundaries() {
        let (evaluator, storage, activity) = evaluator();
        storage.put_consent(consent(None)).unwrap();
        let account = account();

        // 08:00 local is the first permitted hour.
        let at_start = Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap();
        let outcome = evaluator
            .evaluate_at(&account, "+15551230000", chrono_tz::UTC, &activity, at_start)
            .unwrap();
        assert!(outcome.compliant);

        // 21:00 local is the first denied hour (end is exclusive).
        let at_end = Utc.with_ymd_and_hms(2026, 3, 2, 21, 0, 0).unwrap();
        let outcome = evaluator
            .evaluate_at(&account, "+15551230000", chrono_tz::UTC, &activity, at_end)
            .unwrap();
        assert!(!outcome.compliant);
    }

    #[test]
    fn test_disabled_rules_are_skipped() {
        let (evaluator, storage, activity) = evaluator();
        // Consent rule disabled; only calling hours and frequency remain
        // enabled, both of which pass here.
        storage
            .put_rules(
                "acct-001",
                vec![
                    RuleEntry {
                        rule: ComplianceRule::ConsentVerification,
                        enabled: false,
                        priority: 10,
                    },
                    RuleEntry::enabled(ComplianceRule::CallingHours {
                        start_hour: 8,
                        end_hour: 21,
                    }),
                ],
            )
            .unwrap();

        let outcome = evaluator
            .evaluate_at(&account(), "+15551230000", chrono_tz::UTC, &activity, noon())
            .unwrap();
        assert!(outcome.compliant);
    }

    #[test]
    fn test_recording_disclosure_warns_without_feature() {
        let (evaluator, storage, activity) = evaluator();
        storage
            .put_rules(
                "acct-001",
                vec![RuleEntry::enabled(ComplianceRule::RecordingDisclosure)],
            )
            .unwrap();

        let outcome = evaluator
            .evaluate_at(&account(), "+15551230000", chrono_tz::UTC, &activity, noon())
            .unwrap();
        assert!(outcome.compliant);
        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(outcome.warnings[0].kind, WarningKind::RecordingDisclosure);

        let mut flagged = account();
        flagged.features.push("recording_disclosure".into());
        let outcome = evaluator
            .evaluate_at(&flagged, "+15551230000", chrono_tz::UTC, &activity, noon())
            .unwrap();
        assert!(outcome.warnings.is_empty());
    }
}
