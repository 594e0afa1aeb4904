// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! Shared data types used across all engine sub-systems.
//!
//! All types implement [`Clone`], [`Debug`], [`serde::Serialize`], and
//! [`serde::Deserialize`] so they can be serialised to JSON, stored, and
//! transmitted to downstream consumers without additional conversion steps.
//!
//! Destination phone numbers are E.164-formatted strings throughout.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

/// A tenant account on the platform.
///
/// `minutes_used` is monotonic and mutated only by the
/// [`UsageLedger`](crate::ledger::UsageLedger) — no other component may write
/// to it. A `monthly_quota_minutes` of `0` means unlimited; the ledger never
/// denies such accounts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Stable tenant identifier.
    pub id: String,
    /// Monthly minute quota. `0.0` means unlimited.
    pub monthly_quota_minutes: f64,
    /// Cumulative committed minutes in the current period.
    pub minutes_used: f64,
    /// Enabled feature flags (e.g. `"recording_disclosure"`).
    pub features: Vec<String>,
    /// Maximum simultaneously open reservations. `0` means unlimited.
    pub max_concurrent_calls: u32,
}

impl Account {
    /// Whether this account has no minute quota.
    pub fn unlimited(&self) -> bool {
        self.monthly_quota_minutes <= 0.0
    }

    /// Whether the named feature flag is enabled for this account.
    pub fn has_feature(&self, name: &str) -> bool {
        self.features.iter().any(|f| f == name)
    }
}

// ---------------------------------------------------------------------------
// Suppression and consent
// ---------------------------------------------------------------------------

/// Origin of a do-not-call entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DncSource {
    /// The consumer asked not to be called.
    ConsumerRequest,
    /// Added by an operator or automated internal policy.
    Internal,
    /// Imported from a regulatory registry.
    Regulatory,
    /// Added following a legal dispute.
    Litigation,
}

/// A do-not-call suppression entry.
///
/// At most one active entry exists per `(account, phone)` pair; presence is a
/// hard deny independent of every other rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DncEntry {
    pub account_id: String,
    /// E.164 destination the suppression applies to.
    pub phone: String,
    pub reason: String,
    pub source: DncSource,
    pub added_at: DateTime<Utc>,
}

/// Class of telemarketing consent held for a destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsentType {
    Express,
    ExpressWritten,
    Implied,
}

/// A recorded, time-bounded authorisation to call a destination.
///
/// At most one non-revoked record is active per `(account, phone)` at a
/// time. A revoked or expired record is equivalent to absence of consent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsentRecord {
    pub account_id: String,
    /// E.164 destination the consent covers.
    pub phone: String,
    pub consent_type: ConsentType,
    /// How the consent was captured (e.g. `"web_form"`, `"ivr"`).
    pub method: String,
    pub granted_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl ConsentRecord {
    /// Whether this record constitutes valid consent at `now`.
    pub fn active_at(&self, now: DateTime<Utc>) -> bool {
        if self.revoked_at.is_some() {
            return false;
        }
        match self.expires_at {
            Some(expiry) => expiry > now,
            None => true,
        }
    }

    /// Whether the record is active but will expire within `days` of `now`.
    pub fn expiring_within(&self, now: DateTime<Utc>, days: i64) -> bool {
        match self.expires_at {
            Some(expiry) => self.active_at(now) && expiry <= now + Duration::days(days),
            None => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Compliance rules
// ---------------------------------------------------------------------------

/// Rule type discriminant, used for presentation and violation attribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    DncCheck,
    CallingHours,
    FrequencyLimit,
    ConsentVerification,
    RecordingDisclosure,
}

impl RuleKind {
    /// Human-readable display name for logging and UI surfaces.
    pub fn display_name(self) -> &'static str {
        match self {
            RuleKind::DncCheck            => "dnc_check",
            RuleKind::CallingHours        => "calling_hours",
            RuleKind::FrequencyLimit      => "frequency_limit",
            RuleKind::ConsentVerification => "consent_verification",
            RuleKind::RecordingDisclosure => "recording_disclosure",
        }
    }
}

/// A compliance rule with its typed parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ComplianceRule {
    /// Hard deny when the destination appears on the account's DNC list.
    DncCheck,
    /// Deny outside the permitted local-time window.
    CallingHours { start_hour: u32, end_hour: u32 },
    /// Deny once the destination has been dialled `max_calls` times within
    /// the trailing window.
    FrequencyLimit { max_calls: u32, period_hours: u32 },
    /// Deny when no active, unexpired consent record exists.
    ConsentVerification,
    /// Advisory: the account should carry the recording-disclosure feature.
    RecordingDisclosure,
}

impl ComplianceRule {
    /// The discriminant of this rule.
    pub fn kind(&self) -> RuleKind {
        match self {
            ComplianceRule::DncCheck                => RuleKind::DncCheck,
            ComplianceRule::CallingHours { .. }     => RuleKind::CallingHours,
            ComplianceRule::FrequencyLimit { .. }   => RuleKind::FrequencyLimit,
            ComplianceRule::ConsentVerification     => RuleKind::ConsentVerification,
            ComplianceRule::RecordingDisclosure     => RuleKind::RecordingDisclosure,
        }
    }
}

/// A configured rule: the rule itself plus its enablement and presentation
/// order. `priority` orders rules in reports and UIs only — evaluation is
/// always exhaustive, never priority-gated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleEntry {
    pub rule: ComplianceRule,
    pub enabled: bool,
    pub priority: u32,
}

impl RuleEntry {
    /// An enabled entry with default (lowest) presentation priority.
    pub fn enabled(rule: ComplianceRule) -> Self {
        Self { rule, enabled: true, priority: 100 }
    }
}

// ---------------------------------------------------------------------------
// Violations and warnings
// ---------------------------------------------------------------------------

/// Severity ladder for compliance violations.
///
/// Ordered: `Critical > High > Medium > Low`. High and Critical violations
/// trigger external alerting through the event sink.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// Violation type discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    DncViolation,
    ConsentViolation,
    CallingHoursViolation,
    FrequencyViolation,
}

impl ViolationKind {
    /// Stable string form, matching the serialised representation.
    pub fn display_name(self) -> &'static str {
        match self {
            ViolationKind::DncViolation          => "dnc_violation",
            ViolationKind::ConsentViolation      => "consent_violation",
            ViolationKind::CallingHoursViolation => "calling_hours_violation",
            ViolationKind::FrequencyViolation    => "frequency_violation",
        }
    }
}

/// An immutable record of a single compliance violation.
///
/// Created by the policy evaluator and persisted by the
/// [`ViolationRecorder`](crate::violations::ViolationRecorder); immutable
/// once created except for the resolution fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Violation {
    pub id: Uuid,
    pub account_id: String,
    pub kind: ViolationKind,
    pub severity: Severity,
    /// E.164 destination the violating attempt targeted.
    pub destination: String,
    /// Associated call, when the violation was detected post-admission.
    pub call_id: Option<Uuid>,
    pub occurred_at: DateTime<Utc>,
    /// Human-readable description of what was violated.
    pub detail: String,
    pub resolved: bool,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolution_note: Option<String>,
}

/// Advisory finding that does not block admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// Active consent expires within the configured warning window.
    ConsentExpiring,
    /// The account lacks the recording-disclosure feature flag.
    RecordingDisclosure,
}

/// A non-blocking advisory produced during evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

/// Filter used to narrow the results of
/// [`ViolationRecorder::query`](crate::violations::ViolationRecorder::query).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ViolationFilter {
    /// If set, only return violations for this account.
    pub account_id: Option<String>,
    /// If set, only return violations of this kind.
    pub kind: Option<ViolationKind>,
    /// If set, only return violations at or after this instant.
    pub since: Option<DateTime<Utc>>,
    /// If set, only return violations at or before this instant.
    pub until: Option<DateTime<Utc>>,
    /// If `true`, exclude resolved violations.
    pub unresolved_only: bool,
    /// If set, limit the number of returned violations.
    pub limit: Option<usize>,
}

// ---------------------------------------------------------------------------
// Calls and reservations
// ---------------------------------------------------------------------------

/// Direction of a call leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallDirection {
    Outbound,
    Inbound,
}

/// Terminal outcome of a completed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallOutcome {
    Connected,
    /// Connected and produced the campaign's desired result.
    Converted,
    NoAnswer,
    Busy,
    Voicemail,
    Failed,
}

impl CallOutcome {
    /// Whether the destination answered.
    pub fn connected(self) -> bool {
        matches!(self, CallOutcome::Connected | CallOutcome::Converted)
    }
}

/// A finalized record of a placed call.
///
/// Created by [`CallGate::commit`](crate::gate::CallGate::commit) and
/// immutable from then on. The reporting pipeline consumes these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallRecord {
    pub id: Uuid,
    pub account_id: String,
    /// Campaign attribution, when the dialer supplied one.
    pub campaign_id: Option<String>,
    /// Agent attribution, when the dialer supplied one.
    pub agent_id: Option<String>,
    pub destination: String,
    pub direction: CallDirection,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_minutes: f64,
    pub outcome: CallOutcome,
    /// The admission reservation this call consumed.
    pub reservation_id: Uuid,
}

/// Ephemeral handle linking an admitted call attempt to a pending ledger
/// debit. Destroyed on commit (debit finalized with the actual duration) or
/// release (debit reverted); swept when older than the grace period.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Uuid,
    pub account_id: String,
    pub destination: String,
    pub campaign_id: Option<String>,
    pub agent_id: Option<String>,
    pub estimated_minutes: f64,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Admission decisions
// ---------------------------------------------------------------------------

/// A proposed call submitted to [`CallGate::evaluate`](crate::gate::CallGate::evaluate).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallRequest {
    pub account_id: String,
    /// E.164 destination to dial.
    pub destination: String,
    pub estimated_minutes: f64,
    /// IANA timezone of the destination, e.g. `"America/Chicago"`.
    pub timezone: String,
    pub campaign_id: Option<String>,
    pub agent_id: Option<String>,
}

impl CallRequest {
    /// A minimal request with no campaign or agent attribution.
    pub fn new(account_id: &str, destination: &str, estimated_minutes: f64, timezone: &str) -> Self {
        Self {
            account_id: account_id.into(),
            destination: destination.into(),
            estimated_minutes,
            timezone: timezone.into(),
            campaign_id: None,
            agent_id: None,
        }
    }
}

/// Why an evaluation denied the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    /// One or more compliance rules were violated.
    Compliance,
    /// Admitting the call would exceed the account's minute quota.
    /// A billing condition — never recorded as a compliance violation.
    QuotaExceeded,
    /// The account has reached its maximum simultaneously open calls.
    ConcurrencyLimit,
}

/// Unified result of a [`CallGate::evaluate`](crate::gate::CallGate::evaluate)
/// call. Exactly one `Decision` is produced per evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    /// `true` when the call may be placed.
    pub allow: bool,
    /// The reservation handle the caller must later commit or release.
    /// Present only when `allow` is `true`.
    pub reservation_id: Option<Uuid>,
    /// Complete violation list — every enabled rule is evaluated, so denied
    /// decisions carry all violations, not just the first.
    pub violations: Vec<Violation>,
    /// Non-blocking advisories.
    pub warnings: Vec<Warning>,
    /// Minutes remaining before quota exhaustion. `None` for unlimited
    /// accounts.
    pub remaining_minutes: Option<f64>,
    /// Why the call was denied, when it was.
    pub deny_reason: Option<DenyReason>,
    /// Human-readable explanation of the outcome.
    pub reason: String,
}

/// Aggregated result of evaluating every enabled rule against a proposal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyOutcome {
    /// `true` when no rule produced a violation.
    pub compliant: bool,
    pub violations: Vec<Violation>,
    pub warnings: Vec<Warning>,
}

// ---------------------------------------------------------------------------
// Reporting artifacts (derived, read-only)
// ---------------------------------------------------------------------------

/// Status classification of a KPI against its operator-defined target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KpiStatus {
    OnTrack,
    AtRisk,
    Behind,
    Exceeded,
}

/// An operator-defined KPI target with its derived current value and status.
///
/// Recomputed on each reporting run; never mutated by the admission path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KpiTarget {
    pub account_id: String,
    /// KPI name, e.g. `"weekly_calls"` or `"conversion_rate"`.
    pub name: String,
    pub target_value: f64,
    /// Target period label, e.g. `"weekly"`.
    pub period: String,
    pub current_value: f64,
    pub status: KpiStatus,
}

/// Per-slice call statistics produced by the metrics aggregator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallMetrics {
    pub total_calls: u64,
    pub connected_calls: u64,
    pub converted_calls: u64,
    pub total_minutes: f64,
    pub average_duration_minutes: f64,
    /// Connected / total, as a percentage.
    pub connection_rate: f64,
    /// Converted / total, as a percentage.
    pub conversion_rate: f64,
}

/// Windowed aggregation of completed-call records for one account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedMetrics {
    pub account_id: String,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub overall: CallMetrics,
    pub by_campaign: HashMap<String, CallMetrics>,
    pub by_agent: HashMap<String, CallMetrics>,
}

/// Category of a generated insight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightKind {
    VolumeTrend,
    ConversionTrend,
    DurationAnomaly,
}

/// Direction of a detected trend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Up,
    Down,
}

/// A period-over-period trend or anomaly finding.
///
/// Confidence scores are fixed heuristic constants per category, not
/// statistically derived.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictiveInsight {
    pub account_id: String,
    pub kind: InsightKind,
    pub direction: TrendDirection,
    /// Magnitude of the change: percent for volume/duration, percentage
    /// points for conversion rate.
    pub magnitude: f64,
    pub confidence: f64,
    pub message: String,
    pub generated_at: DateTime<Utc>,
}

/// Peer-comparison datum for a single metric.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkData {
    pub metric: String,
    pub user_value: f64,
    pub industry_average: f64,
    pub top_quartile: f64,
    /// Computed percentile position, `0.0..=90.0`.
    pub percentile: f64,
}

/// Periodic compliance-score synthesis for one account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceReport {
    pub account_id: String,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub total_calls: u64,
    pub total_violations: u64,
    /// Clamped at zero when violations outnumber calls.
    pub compliant_calls: u64,
    /// `round(100 x compliant / total)`, floored at 0.
    pub compliance_score: u8,
    /// Set when violations outnumbered calls in the period — the clamp was
    /// applied and the counts deserve investigation.
    pub violation_overflow: bool,
    /// Violation counts keyed by kind display name.
    pub violations_by_kind: HashMap<String, u64>,
    pub recommendations: Vec<String>,
    pub generated_at: DateTime<Utc>,
}
