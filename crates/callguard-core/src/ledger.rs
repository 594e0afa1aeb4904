// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! Usage-quota ledger.
//!
//! [`UsageLedger`] is the authoritative counter of minutes consumed per
//! account and exposes exactly three mutating operations:
//!
//! * [`reserve`](UsageLedger::reserve) — atomic admission check-and-reserve
//! * [`commit`](UsageLedger::commit)   — fold the actual duration into `used`
//! * [`release`](UsageLedger::release) — discard a reservation untouched
//!
//! plus [`sweep_expired`](UsageLedger::sweep_expired), which reclaims
//! reservations abandoned by crashed dialer workers.
//!
//! ## Atomicity
//!
//! All per-account state (quota, used minutes, open reservations) lives in
//! one map entry; every operation acquires that entry's lock before reading,
//! so the admission check `used + open + estimate > quota` and the insert of
//! the new reservation are a single linearizable step per account.  Two
//! concurrent workers can never both be admitted when only one of them fits.
//!
//! In-flight calls are never aborted: `commit` accepts an actual duration
//! above the estimate and lets the account go over quota for that call only.
//! The overage is visible to the very next `reserve`.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::one::RefMut;
use dashmap::DashMap;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{GateError, StoreError};
use crate::events::{EngineEvent, EventSink};
use crate::storage::Storage;
use crate::types::{Account, CallRequest, DenyReason, Reservation};

/// Usage notification thresholds, in percent of quota.
const USAGE_THRESHOLDS: [u8; 2] = [80, 100];

/// Result of a [`UsageLedger::reserve`] call.
#[derive(Debug, Clone)]
pub enum ReserveOutcome {
    /// The estimate fits; a reservation is now held against the quota.
    Reserved {
        reservation_id: Uuid,
        /// Minutes left after this reservation. `None` for unlimited accounts.
        remaining_minutes: Option<f64>,
    },
    /// The estimate does not fit. Nothing was reserved.
    Denied {
        reason: DenyReason,
        remaining_minutes: Option<f64>,
        detail: String,
    },
}

/// A reservation finalized by [`UsageLedger::commit`].
#[derive(Debug, Clone)]
pub struct CommittedReservation {
    /// The reservation that was closed.
    pub reservation: Reservation,
    /// The account's committed minutes after the fold.
    pub minutes_used: f64,
}

/// Per-account mutable state. The whole struct sits behind one map-entry
/// lock — that lock is the account's linearization point.
#[derive(Debug)]
struct AccountUsage {
    quota: f64,
    used: f64,
    max_concurrent: u32,
    open: HashMap<Uuid, Reservation>,
}

impl AccountUsage {
    fn from_account(account: &Account) -> Self {
        Self {
            quota: account.monthly_quota_minutes,
            used: account.minutes_used,
            max_concurrent: account.max_concurrent_calls,
            open: HashMap::new(),
        }
    }

    fn open_minutes(&self) -> f64 {
        self.open.values().map(|r| r.estimated_minutes).sum()
    }

    fn remaining(&self) -> Option<f64> {
        if self.quota <= 0.0 {
            None
        } else {
            Some((self.quota - self.used - self.open_minutes()).max(0.0))
        }
    }
}

/// Authoritative per-account minute counter with atomic check-and-reserve.
///
/// Generic over `S: Storage`: account quotas are loaded from the repository
/// on first touch and committed usage is written back through it.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use callguard_core::config::Config;
/// use callguard_core::events::MemorySink;
/// use callguard_core::ledger::{ReserveOutcome, UsageLedger};
/// use callguard_core::storage::{InMemoryStorage, Storage};
/// use callguard_core::types::{Account, CallRequest};
/// use chrono::Utc;
///
/// let storage = InMemoryStorage::new();
/// storage.put_account(Account {
///     id: "acct-001".into(),
///     monthly_quota_minutes: 10.0,
///     minutes_used: 0.0,
///     features: vec![],
///     max_concurrent_calls: 0,
/// }).unwrap();
///
/// let ledger = UsageLedger::new(Config::default(), storage, Arc::new(MemorySink::default()));
/// let request = CallRequest::new("acct-001", "+15551230000", 4.0, "UTC");
///
/// match ledger.reserve(&request, Utc::now()).unwrap() {
///     ReserveOutcome::Reserved { remaining_minutes, .. } => {
///         assert_eq!(remaining_minutes, Some(6.0));
///     }
///     ReserveOutcome::Denied { .. } => unreachable!(),
/// }
/// ```
pub struct UsageLedger<S: Storage> {
    config: Config,
    storage: S,
    events: Arc<dyn EventSink>,
    /// Key: account id. The entry lock serializes all admission arithmetic
    /// for that account.
    accounts: DashMap<String, AccountUsage>,
    /// Reservation id -> owning account id.
    index: DashMap<Uuid, String>,
}

impl<S: Storage> UsageLedger<S> {
    /// Create a new [`UsageLedger`].
    pub fn new(config: Config, storage: S, events: Arc<dyn EventSink>) -> Self {
        Self {
            config,
            storage,
            events,
            accounts: DashMap::new(),
            index: DashMap::new(),
        }
    }

    /// Locked per-account state, loading quota and used minutes from the
    /// repository on first touch.
    fn usage_entry(&self, account_id: &str) -> Result<RefMut<'_, String, AccountUsage>, GateError> {
        if let Some(usage) = self.accounts.get_mut(account_id) {
            return Ok(usage);
        }
        let account = self
            .storage
            .get_account(account_id)?
            .ok_or_else(|| GateError::UnknownAccount(account_id.into()))?;
        Ok(self
            .accounts
            .entry(account_id.to_string())
            .or_insert_with(|| AccountUsage::from_account(&account)))
    }

    /// Atomically check quota headroom and, if the estimate fits, hold a
    /// reservation against it.
    ///
    /// Denies when `used + open_reservations + estimate > quota` (a quota of
    /// `0` means unlimited and never denies) or when the account's
    /// `max_concurrent_calls` open-reservation cap is reached.  Denial
    /// leaves the ledger untouched.
    pub fn reserve(
        &self,
        request: &CallRequest,
        now: DateTime<Utc>,
    ) -> Result<ReserveOutcome, GateError> {
        let mut usage = self.usage_entry(&request.account_id)?;

        if usage.max_concurrent > 0 && usage.open.len() as u32 >= usage.max_concurrent {
            return Ok(ReserveOutcome::Denied {
                reason: DenyReason::ConcurrencyLimit,
                remaining_minutes: usage.remaining(),
                detail: format!(
                    "account '{}' already has {} open calls (max {})",
                    request.account_id,
                    usage.open.len(),
                    usage.max_concurrent
                ),
            });
        }

        if usage.quota > 0.0
            && usage.used + usage.open_minutes() + request.estimated_minutes > usage.quota
        {
            return Ok(ReserveOutcome::Denied {
                reason: DenyReason::QuotaExceeded,
                remaining_minutes: usage.remaining(),
                detail: format!(
                    "estimate of {:.1} min exceeds remaining quota ({:.1} of {:.1} min free)",
                    request.estimated_minutes,
                    usage.remaining().unwrap_or(0.0),
                    usage.quota
                ),
            });
        }

        let reservation = Reservation {
            id: Uuid::new_v4(),
            account_id: request.account_id.clone(),
            destination: request.destination.clone(),
            campaign_id: request.campaign_id.clone(),
            agent_id: request.agent_id.clone(),
            estimated_minutes: request.estimated_minutes,
            created_at: now,
        };
        let reservation_id = reservation.id;
        usage.open.insert(reservation_id, reservation);
        let remaining_minutes = usage.remaining();
        // Index under the entry lock so the sweep never sees a reservation
        // in one map but not the other.
        self.index.insert(reservation_id, request.account_id.clone());
        drop(usage);

        Ok(ReserveOutcome::Reserved { reservation_id, remaining_minutes })
    }

    /// Replace the reservation's estimate with the real duration and fold it
    /// into the account's committed minutes.
    ///
    /// When the actual duration exceeds the estimate the account may go over
    /// quota for this call only — in-flight calls are never aborted — and
    /// the overage is visible to the next [`reserve`](Self::reserve)
    /// immediately.  Emits `usage.threshold_crossed` when the fold moves
    /// usage across 80% or 100% of quota.
    pub fn commit(
        &self,
        reservation_id: Uuid,
        actual_minutes: f64,
    ) -> Result<CommittedReservation, GateError> {
        let account_id = self
            .index
            .remove(&reservation_id)
            .map(|(_, account_id)| account_id)
            .ok_or(GateError::UnknownReservation(reservation_id))?;

        let mut usage = self.usage_entry(&account_id)?;
        let reservation = usage
            .open
            .remove(&reservation_id)
            .ok_or(GateError::UnknownReservation(reservation_id))?;

        let quota = usage.quota;
        let used_before = usage.used;
        usage.used += actual_minutes;
        let used_after = usage.used;

        // Persist while still holding the account's entry lock so a racing
        // commit cannot write an older counter value after a newer one.
        self.persist_used(&account_id, used_after)?;
        drop(usage);

        self.emit_threshold_crossings(&account_id, quota, used_before, used_after);

        Ok(CommittedReservation { reservation, minutes_used: used_after })
    }

    /// Discard a reservation without touching committed minutes.
    ///
    /// Used for calls that never connected.  Idempotent: releasing an
    /// already-finalized reservation returns `false` and does nothing.
    pub fn release(&self, reservation_id: Uuid) -> bool {
        let Some((_, account_id)) = self.index.remove(&reservation_id) else {
            return false;
        };
        if let Some(mut usage) = self.accounts.get_mut(&account_id) {
            usage.open.remove(&reservation_id);
        }
        true
    }

    /// Release every reservation older than the configured grace period
    /// (call timeout x 2). Returns the number reclaimed.
    ///
    /// Reclaims quota from dialer workers that crashed without calling
    /// [`release`](Self::release).
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let grace = Duration::minutes(self.config.reservation_grace_minutes() as i64);
        let mut reclaimed = 0;
        for mut shard in self.accounts.iter_mut() {
            let expired: Vec<Uuid> = shard
                .open
                .values()
                .filter(|reservation| reservation.created_at + grace < now)
                .map(|reservation| reservation.id)
                .collect();
            for id in expired {
                shard.open.remove(&id);
                self.index.remove(&id);
                reclaimed += 1;
                tracing::warn!(
                    account_id = shard.key().as_str(),
                    reservation_id = %id,
                    "auto-released abandoned reservation"
                );
            }
        }
        reclaimed
    }

    /// Minutes remaining before quota exhaustion, counting open
    /// reservations. `None` for unlimited accounts. Read-only.
    pub fn remaining_minutes(&self, account_id: &str) -> Result<Option<f64>, GateError> {
        Ok(self.usage_entry(account_id)?.remaining())
    }

    /// Number of currently open reservations for the account.
    pub fn open_reservations(&self, account_id: &str) -> usize {
        self.accounts
            .get(account_id)
            .map(|usage| usage.open.len())
            .unwrap_or(0)
    }

    /// Drop the cached quota state for an account so the next touch reloads
    /// it from the repository. Call after an out-of-band quota change.
    /// Open reservations for the account are discarded with the cache.
    pub fn refresh_account(&self, account_id: &str) {
        self.accounts.remove(account_id);
        self.index.retain(|_, owner| owner != account_id);
    }

    fn persist_used(&self, account_id: &str, minutes_used: f64) -> Result<(), StoreError> {
        if let Some(mut account) = self.storage.get_account(account_id)? {
            account.minutes_used = minutes_used;
            self.storage.put_account(account)?;
        }
        Ok(())
    }

    fn emit_threshold_crossings(&self, account_id: &str, quota: f64, before: f64, after: f64) {
        if quota <= 0.0 {
            return;
        }
        let before_pct = before / quota * 100.0;
        let after_pct = after / quota * 100.0;
        for &threshold in USAGE_THRESHOLDS.iter() {
            if before_pct < f64::from(threshold) && after_pct >= f64::from(threshold) {
                self.events.emit(EngineEvent::UsageThresholdCrossed {
                    account_id: account_id.into(),
                    used_minutes: after,
                    limit_minutes: quota,
                    percentage: threshold,
                });
            }
        }
    }
}
