// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! Call gate — the single admission point in front of the dialer.
//!
//! [`CallGate`] owns the compliance evaluator, the usage ledger, and the
//! destination activity log, and composes them into one atomic admission
//! step.  Dialer workers call [`evaluate`](CallGate::evaluate) synchronously
//! before placing each call; on success they proceed and later call
//! [`commit`](CallGate::commit) with the actual duration, or
//! [`release`](CallGate::release) on abandonment.
//!
//! ## Admission algorithm
//!
//! 1. Resolve the destination timezone and load the account.
//! 2. Acquire the per-`(account, destination)` admission lock with a bounded
//!    timeout.  The lock makes the frequency read-and-admit sequence
//!    serializable per destination: two concurrent evaluations of the same
//!    destination cannot both observe "below limit" when one slot remains.
//! 3. Evaluate every enabled compliance rule.  Any violation denies the
//!    call; each violation is durably recorded; ledger and activity log are
//!    untouched.
//! 4. Otherwise reserve quota.  A quota or concurrency denial is a billing
//!    condition — no violation record is created.
//! 5. On success, record the dial attempt in the activity log (still under
//!    the admission lock) and return the reservation handle.
//!
//! Denial paths are side-effect-free apart from the violation records, so
//! retries by the same worker are safe.  Storage failures anywhere on this
//! path propagate as errors and the caller must fail closed.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use dashmap::DashMap;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::activity::DestinationActivityLog;
use crate::config::Config;
use crate::error::GateError;
use crate::events::EventSink;
use crate::ledger::{ReserveOutcome, UsageLedger};
use crate::rules::PolicyEvaluator;
use crate::storage::Storage;
use crate::types::{
    CallDirection, CallOutcome, CallRecord, CallRequest, Decision, DenyReason,
};
use crate::violations::ViolationRecorder;

/// How long recorded dial attempts are retained before pruning. Must cover
/// the longest configurable frequency window.
const ACTIVITY_RETENTION_DAYS: i64 = 7;

/// Composes policy evaluation and quota reservation into one atomic
/// admission decision.
///
/// The gate is `Send + Sync`; one shared instance serves every dialer
/// worker in the process.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use callguard_core::config::Config;
/// use callguard_core::events::MemorySink;
/// use callguard_core::gate::CallGate;
/// use callguard_core::storage::{InMemoryStorage, Storage};
/// use callguard_core::types::{Account, CallOutcome, CallRequest, ConsentRecord, ConsentType};
/// use chrono::Utc;
///
/// let storage = InMemoryStorage::new();
/// storage.put_account(Account {
///     id: "acct-001".into(),
///     monthly_quota_minutes: 500.0,
///     minutes_used: 0.0,
///     features: vec![],
///     max_concurrent_calls: 0,
/// }).unwrap();
/// storage.put_consent(ConsentRecord {
///     account_id: "acct-001".into(),
///     phone: "+15551230000".into(),
///     consent_type: ConsentType::ExpressWritten,
///     method: "web_form".into(),
///     granted_at: Utc::now(),
///     revoked_at: None,
///     expires_at: None,
/// }).unwrap();
///
/// let gate = CallGate::new(Config::default(), storage, Arc::new(MemorySink::default()));
/// # use chrono::TimeZone;
/// # let now = Utc.with_ymd_and_hms(2026, 3, 2, 15, 0, 0).unwrap();
/// let request = CallRequest::new("acct-001", "+15551230000", 3.0, "UTC");
/// let decision = gate.evaluate_at(&request, now).unwrap();
/// assert!(decision.allow);
///
/// // The worker dials, the call completes after 2.4 minutes:
/// gate.commit(decision.reservation_id.unwrap(), 2.4, CallOutcome::Connected).unwrap();
/// ```
pub struct CallGate<S: Storage> {
    config: Config,
    storage: S,
    /// Quota reservation and committed-minute accounting.
    pub ledger: UsageLedger<S>,
    /// Compliance rule evaluation.
    pub policy: PolicyEvaluator<S>,
    /// Durable violation log and alerting.
    pub recorder: ViolationRecorder<S>,
    /// Recent-attempt history. Mutated only inside the admission step.
    activity: DestinationActivityLog,
    /// Per-`(account, destination)` admission locks.
    admission: DashMap<String, Arc<Mutex<()>>>,
}

impl<S: Storage + Clone> CallGate<S> {
    /// Construct a new [`CallGate`].
    ///
    /// `storage` is cloned once per component; implementations share state
    /// through their interior handle (both [`InMemoryStorage`] and the file
    /// backend clone into the same underlying store).
    ///
    /// [`InMemoryStorage`]: crate::storage::InMemoryStorage
    pub fn new(config: Config, storage: S, events: Arc<dyn EventSink>) -> Self {
        Self {
            ledger: UsageLedger::new(config.clone(), storage.clone(), events.clone()),
            policy: PolicyEvaluator::new(config.clone(), storage.clone()),
            recorder: ViolationRecorder::new(storage.clone(), events),
            activity: DestinationActivityLog::new(),
            admission: DashMap::new(),
            config,
            storage,
        }
    }
}

impl<S: Storage> CallGate<S> {
    /// Evaluate a proposed call now.
    ///
    /// See [`evaluate_at`](Self::evaluate_at) for the full contract.
    pub fn evaluate(&self, request: &CallRequest) -> Result<Decision, GateError> {
        self.evaluate_at(request, Utc::now())
    }

    /// Evaluate a proposed call at the instant `now`.
    ///
    /// Returns the atomic [`Decision`]: either an admission with a
    /// reservation handle the caller must commit or release, or a denial
    /// carrying the complete violation list (compliance) or the billing
    /// reason (quota / concurrency).
    ///
    /// # Errors
    ///
    /// * [`GateError::InvalidTimezone`] — the request's timezone is not an
    ///   IANA zone.
    /// * [`GateError::LockTimeout`] — the admission lock was contended past
    ///   the configured timeout. Transient; retry with backoff.
    /// * [`GateError::Store`] — the repository failed. Fail closed.
    pub fn evaluate_at(
        &self,
        request: &CallRequest,
        now: DateTime<Utc>,
    ) -> Result<Decision, GateError> {
        let timezone: Tz = request
            .timezone
            .parse()
            .map_err(|_| GateError::InvalidTimezone(request.timezone.clone()))?;
        let account = self
            .storage
            .get_account(&request.account_id)?
            .ok_or_else(|| GateError::UnknownAccount(request.account_id.clone()))?;

        let key = admission_key(&request.account_id, &request.destination);
        let lock = self
            .admission
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let timeout = StdDuration::from_millis(self.config.admission_lock_timeout_ms);
        let Some(_guard) = lock.try_lock_for(timeout) else {
            return Err(GateError::LockTimeout {
                key,
                waited_ms: self.config.admission_lock_timeout_ms,
            });
        };

        let outcome =
            self.policy
                .evaluate_at(&account, &request.destination, timezone, &self.activity, now)?;

        if !outcome.compliant {
            for violation in &outcome.violations {
                self.recorder.record(violation)?;
            }
            tracing::info!(
                account_id = request.account_id.as_str(),
                destination = request.destination.as_str(),
                violations = outcome.violations.len(),
                "call denied by compliance rules"
            );
            return Ok(Decision {
                allow: false,
                reservation_id: None,
                remaining_minutes: self.ledger.remaining_minutes(&request.account_id)?,
                deny_reason: Some(DenyReason::Compliance),
                reason: format!("{} compliance rule(s) violated", outcome.violations.len()),
                violations: outcome.violations,
                warnings: outcome.warnings,
            });
        }

        match self.ledger.reserve(request, now)? {
            ReserveOutcome::Denied { reason, remaining_minutes, detail } => {
                tracing::info!(
                    account_id = request.account_id.as_str(),
                    reason = ?reason,
                    "call denied by usage ledger"
                );
                Ok(Decision {
                    allow: false,
                    reservation_id: None,
                    violations: Vec::new(),
                    warnings: outcome.warnings,
                    remaining_minutes,
                    deny_reason: Some(reason),
                    reason: detail,
                })
            }
            ReserveOutcome::Reserved { reservation_id, remaining_minutes } => {
                self.activity.record(&request.account_id, &request.destination, now);
                tracing::debug!(
                    account_id = request.account_id.as_str(),
                    destination = request.destination.as_str(),
                    reservation_id = %reservation_id,
                    "call admitted"
                );
                Ok(Decision {
                    allow: true,
                    reservation_id: Some(reservation_id),
                    violations: Vec::new(),
                    warnings: outcome.warnings,
                    remaining_minutes,
                    deny_reason: None,
                    reason: "admitted".into(),
                })
            }
        }
    }

    /// Finalize an admitted call: fold the actual duration into the ledger
    /// and persist the finalized [`CallRecord`].
    pub fn commit(
        &self,
        reservation_id: Uuid,
        actual_minutes: f64,
        outcome: CallOutcome,
    ) -> Result<CallRecord, GateError> {
        self.commit_at(reservation_id, actual_minutes, outcome, Utc::now())
    }

    /// [`commit`](Self::commit) with an explicit completion instant.
    pub fn commit_at(
        &self,
        reservation_id: Uuid,
        actual_minutes: f64,
        outcome: CallOutcome,
        now: DateTime<Utc>,
    ) -> Result<CallRecord, GateError> {
        let committed = self.ledger.commit(reservation_id, actual_minutes)?;
        let reservation = committed.reservation;
        let record = CallRecord {
            id: Uuid::new_v4(),
            account_id: reservation.account_id.clone(),
            campaign_id: reservation.campaign_id.clone(),
            agent_id: reservation.agent_id.clone(),
            destination: reservation.destination.clone(),
            direction: CallDirection::Outbound,
            started_at: reservation.created_at,
            ended_at: now,
            duration_minutes: actual_minutes,
            outcome,
            reservation_id: reservation.id,
        };
        self.storage.append_call(record.clone())?;
        Ok(record)
    }

    /// Discard a reservation for a call that never connected. Idempotent.
    pub fn release(&self, reservation_id: Uuid) -> bool {
        self.ledger.release(reservation_id)
    }

    /// Reclaim reservations abandoned past the grace period and prune stale
    /// activity history. Returns the number of reservations reclaimed.
    ///
    /// Intended to run on a background interval; see the `async` feature's
    /// sweeper task.
    pub fn sweep_abandoned(&self, now: DateTime<Utc>) -> usize {
        let reclaimed = self.ledger.sweep_expired(now);
        self.activity.prune(now, Duration::days(ACTIVITY_RETENTION_DAYS));
        reclaimed
    }
}

fn admission_key(account_id: &str, destination: &str) -> String {
    let mut key = String::with_capacity(account_id.len() + 1 + destination.len());
    key.push_str(account_id);
    key.push(':');
    key.push_str(destination);
    key
}
