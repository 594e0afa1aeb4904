// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! Storage abstraction for the admission engine.
//!
//! The [`Storage`] trait is the single interface between the engine and any
//! persistence layer.  This crate ships [`InMemoryStorage`] for development
//! and testing.  Production implementations (file-based, database, etc.)
//! live in downstream crates such as `callguard-store`.
//!
//! Two contract points matter for implementors:
//!
//! * Every read and write is keyed by `account_id` — tenant isolation is the
//!   repository's job, not the caller's.
//! * Every method returns `Result<_, StoreError>`.  The admission path fails
//!   closed on any storage error: a call is never placed when the backing
//!   store cannot be consulted.
//!
//! Methods take `&self`; implementations provide their own interior locking
//! and MUST be `Send + Sync` so the engine can be shared across dialer
//! worker threads.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use crate::error::StoreError;
use crate::types::{
    Account, CallRecord, ConsentRecord, DncEntry, KpiTarget, PredictiveInsight, RuleEntry,
    Violation, ViolationFilter,
};

// ---------------------------------------------------------------------------
// Storage trait
// ---------------------------------------------------------------------------

/// Pluggable persistence interface for the admission engine.
pub trait Storage: Send + Sync {
    // ------------------------------------------------------------------
    // Accounts
    // ------------------------------------------------------------------

    /// Retrieve the account with the given id, if any.
    fn get_account(&self, account_id: &str) -> Result<Option<Account>, StoreError>;

    /// Persist or overwrite an account.
    fn put_account(&self, account: Account) -> Result<(), StoreError>;

    // ------------------------------------------------------------------
    // Do-not-call entries
    // ------------------------------------------------------------------

    /// Retrieve the active DNC entry for `(account_id, phone)`, if any.
    fn get_dnc_entry(&self, account_id: &str, phone: &str)
        -> Result<Option<DncEntry>, StoreError>;

    /// Persist or overwrite the DNC entry for its `(account, phone)` pair.
    /// At most one active entry exists per pair.
    fn put_dnc_entry(&self, entry: DncEntry) -> Result<(), StoreError>;

    /// Remove the DNC entry for `(account_id, phone)`. No-op when absent.
    fn remove_dnc_entry(&self, account_id: &str, phone: &str) -> Result<(), StoreError>;

    // ------------------------------------------------------------------
    // Consent
    // ------------------------------------------------------------------

    /// Retrieve the current non-revoked consent record for
    /// `(account_id, phone)`, if any.  Expiry is NOT evaluated here — the
    /// caller checks `expires_at` against its own clock so that expiring
    /// records can still produce warnings.
    fn current_consent(&self, account_id: &str, phone: &str)
        -> Result<Option<ConsentRecord>, StoreError>;

    /// Persist a consent record, superseding any previous record for the
    /// same `(account, phone)` pair.
    fn put_consent(&self, record: ConsentRecord) -> Result<(), StoreError>;

    /// Mark the current consent record for `(account_id, phone)` revoked at
    /// `at`. No-op when no record exists.
    fn revoke_consent(&self, account_id: &str, phone: &str, at: DateTime<Utc>)
        -> Result<(), StoreError>;

    // ------------------------------------------------------------------
    // Compliance rules
    // ------------------------------------------------------------------

    /// Return the configured rules for the account (may be empty).
    fn rules(&self, account_id: &str) -> Result<Vec<RuleEntry>, StoreError>;

    /// Replace the account's configured rules.
    fn put_rules(&self, account_id: &str, rules: Vec<RuleEntry>) -> Result<(), StoreError>;

    // ------------------------------------------------------------------
    // Violations
    // ------------------------------------------------------------------

    /// Append a violation. Violations are immutable once written except for
    /// their resolution fields.
    fn append_violation(&self, violation: Violation) -> Result<(), StoreError>;

    /// Return all violations that satisfy `filter`, in append order.
    fn query_violations(&self, filter: &ViolationFilter)
        -> Result<Vec<Violation>, StoreError>;

    /// Set the resolution fields on a violation. Returns `false` when the id
    /// is unknown.
    fn resolve_violation(&self, id: Uuid, note: &str, at: DateTime<Utc>)
        -> Result<bool, StoreError>;

    // ------------------------------------------------------------------
    // Call records
    // ------------------------------------------------------------------

    /// Append a finalized call record.
    fn append_call(&self, record: CallRecord) -> Result<(), StoreError>;

    /// Return the account's call records with `started_at` in `[from, to)`.
    fn calls_between(&self, account_id: &str, from: DateTime<Utc>, to: DateTime<Utc>)
        -> Result<Vec<CallRecord>, StoreError>;

    // ------------------------------------------------------------------
    // Reporting artifacts
    // ------------------------------------------------------------------

    /// Return the account's KPI targets.
    fn kpi_targets(&self, account_id: &str) -> Result<Vec<KpiTarget>, StoreError>;

    /// Replace the account's KPI targets (recomputed each reporting run).
    fn put_kpi_targets(&self, account_id: &str, targets: Vec<KpiTarget>)
        -> Result<(), StoreError>;

    /// Return the account's current insights.
    fn insights(&self, account_id: &str) -> Result<Vec<PredictiveInsight>, StoreError>;

    /// Replace the account's insights (regenerated each reporting run).
    fn put_insights(&self, account_id: &str, insights: Vec<PredictiveInsight>)
        -> Result<(), StoreError>;
}

// ---------------------------------------------------------------------------
// InMemoryStorage
// ---------------------------------------------------------------------------

/// All repository state held by [`InMemoryStorage`].
#[derive(Debug, Default)]
struct Snapshot {
    /// Key: account id.
    accounts: HashMap<String, Account>,
    /// Key: `"{account_id}:{phone}"`.
    dnc: HashMap<String, DncEntry>,
    /// Key: `"{account_id}:{phone}"` — the current (most recent) record.
    consent: HashMap<String, ConsentRecord>,
    /// Key: account id.
    rules: HashMap<String, Vec<RuleEntry>>,
    /// Append-only violation log.
    violations: Vec<Violation>,
    /// Append-only call log.
    calls: Vec<CallRecord>,
    /// Key: account id.
    kpi_targets: HashMap<String, Vec<KpiTarget>>,
    /// Key: account id.
    insights: HashMap<String, Vec<PredictiveInsight>>,
}

/// A volatile, process-local [`Storage`] implementation.
///
/// Cloning is cheap and shares the underlying state — all clones observe
/// each other's writes, which is what the engine's components need when each
/// holds its own handle.
///
/// # Examples
///
/// ```rust
/// use callguard_core::storage::{InMemoryStorage, Storage};
/// use callguard_core::types::Account;
///
/// let store = InMemoryStorage::new();
/// store.put_account(Account {
///     id: "acct-001".into(),
///     monthly_quota_minutes: 500.0,
///     minutes_used: 0.0,
///     features: vec![],
///     max_concurrent_calls: 0,
/// }).unwrap();
///
/// let shared = store.clone();
/// assert!(shared.get_account("acct-001").unwrap().is_some());
/// ```
#[derive(Debug, Default, Clone)]
pub struct InMemoryStorage {
    inner: Arc<RwLock<Snapshot>>,
}

impl InMemoryStorage {
    /// Create a new, empty [`InMemoryStorage`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Composite key used for the DNC and consent maps.
    fn composite_key(left: &str, right: &str) -> String {
        let mut key = String::with_capacity(left.len() + 1 + right.len());
        key.push_str(left);
        key.push(':');
        key.push_str(right);
        key
    }
}

impl Storage for InMemoryStorage {
    fn get_account(&self, account_id: &str) -> Result<Option<Account>, StoreError> {
        Ok(self.inner.read().accounts.get(account_id).cloned())
    }

    fn put_account(&self, account: Account) -> Result<(), StoreError> {
        self.inner.write().accounts.insert(account.id.clone(), account);
        Ok(())
    }

    fn get_dnc_entry(
        &self,
        account_id: &str,
        phone: &str,
    ) -> Result<Option<DncEntry>, StoreError> {
        let key = Self::composite_key(account_id, phone);
        Ok(self.inner.read().dnc.get(&key).cloned())
    }

    fn put_dnc_entry(&self, entry: DncEntry) -> Result<(), StoreError> {
        let key = Self::composite_key(&entry.account_id, &entry.phone);
        self.inner.write().dnc.insert(key, entry);
        Ok(())
    }

    fn remove_dnc_entry(&self, account_id: &str, phone: &str) -> Result<(), StoreError> {
        let key = Self::composite_key(account_id, phone);
        self.inner.write().dnc.remove(&key);
        Ok(())
    }

    fn current_consent(
        &self,
        account_id: &str,
        phone: &str,
    ) -> Result<Option<ConsentRecord>, StoreError> {
        let key = Self::composite_key(account_id, phone);
        Ok(self
            .inner
            .read()
            .consent
            .get(&key)
            .filter(|record| record.revoked_at.is_none())
            .cloned())
    }

    fn put_consent(&self, record: ConsentRecord) -> Result<(), StoreError> {
        let key = Self::composite_key(&record.account_id, &record.phone);
        self.inner.write().consent.insert(key, record);
        Ok(())
    }

    fn revoke_consent(
        &self,
        account_id: &str,
        phone: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let key = Self::composite_key(account_id, phone);
        if let Some(record) = self.inner.write().consent.get_mut(&key) {
            record.revoked_at = Some(at);
        }
        Ok(())
    }

    fn rules(&self, account_id: &str) -> Result<Vec<RuleEntry>, StoreError> {
        Ok(self.inner.read().rules.get(account_id).cloned().unwrap_or_default())
    }

    fn put_rules(&self, account_id: &str, rules: Vec<RuleEntry>) -> Result<(), StoreError> {
        self.inner.write().rules.insert(account_id.into(), rules);
        Ok(())
    }

    fn append_violation(&self, violation: Violation) -> Result<(), StoreError> {
        self.inner.write().violations.push(violation);
        Ok(())
    }

    fn query_violations(
        &self,
        filter: &ViolationFilter,
    ) -> Result<Vec<Violation>, StoreError> {
        Ok(self
            .inner
            .read()
            .violations
            .iter()
            .filter(|violation| {
                if let Some(ref account_id) = filter.account_id {
                    if &violation.account_id != account_id {
                        return false;
                    }
                }
                if let Some(kind) = filter.kind {
                    if violation.kind != kind {
                        return false;
                    }
                }
                if let Some(since) = filter.since {
                    if violation.occurred_at < since {
                        return false;
                    }
                }
                if let Some(until) = filter.until {
                    if violation.occurred_at > until {
                        return false;
                    }
                }
                if filter.unresolved_only && violation.resolved {
                    return false;
                }
                true
            })
            .take(filter.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    fn resolve_violation(
        &self,
        id: Uuid,
        note: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.write();
        match inner.violations.iter_mut().find(|violation| violation.id == id) {
            Some(violation) => {
                violation.resolved = true;
                violation.resolved_at = Some(at);
                violation.resolution_note = Some(note.into());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn append_call(&self, record: CallRecord) -> Result<(), StoreError> {
        self.inner.write().calls.push(record);
        Ok(())
    }

    fn calls_between(
        &self,
        account_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<CallRecord>, StoreError> {
        Ok(self
            .inner
            .read()
            .calls
            .iter()
            .filter(|call| {
                call.account_id == account_id && call.started_at >= from && call.started_at < to
            })
            .cloned()
            .collect())
    }

    fn kpi_targets(&self, account_id: &str) -> Result<Vec<KpiTarget>, StoreError> {
        Ok(self.inner.read().kpi_targets.get(account_id).cloned().unwrap_or_default())
    }

    fn put_kpi_targets(
        &self,
        account_id: &str,
        targets: Vec<KpiTarget>,
    ) -> Result<(), StoreError> {
        self.inner.write().kpi_targets.insert(account_id.into(), targets);
        Ok(())
    }

    fn insights(&self, account_id: &str) -> Result<Vec<PredictiveInsight>, StoreError> {
        Ok(self.inner.read().insights.get(account_id).cloned().unwrap_or_default())
    }

    fn put_insights(
        &self,
        account_id: &str,
        insights: Vec<PredictiveInsight>,
    ) -> Result<(), StoreError> {
        self.inner.write().insights.insert(account_id.into(), insights);
        Ok(())
    }
}
