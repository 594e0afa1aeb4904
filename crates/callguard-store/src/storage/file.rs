// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! File-based JSON storage backend.
//!
//! [`FileStorage`] persists all repository state to a single JSON file on
//! disk.  Every mutation flushes the file atomically (write-rename) so that
//! a crash mid-write does not corrupt existing data.
//!
//! ## Layout
//!
//! The JSON file has the shape:
//!
//! ```json
//! {
//!   "accounts":    { "<account_id>":          Account,       ... },
//!   "dnc":         { "<account_id>:<phone>":  DncEntry,      ... },
//!   "consent":     { "<account_id>:<phone>":  ConsentRecord, ... },
//!   "rules":       { "<account_id>":          [RuleEntry],   ... },
//!   "violations":  [ Violation, ... ],
//!   "calls":       [ CallRecord, ... ],
//!   "kpi_targets": { "<account_id>":          [KpiTarget],   ... },
//!   "insights":    { "<account_id>":          [PredictiveInsight], ... }
//! }
//! ```
//!
//! ## Caveats
//!
//! * [`FileStorage`] holds the full state in memory and flushes on every
//!   mutation.  It is not intended for high-frequency write workloads.
//! * Concurrent access from multiple *processes* is not supported (threads
//!   within one process are fine — the handle is internally locked).  Use a
//!   database-backed storage implementation for multi-process deployments.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use callguard_core::error::StoreError;
use callguard_core::storage::Storage;
use callguard_core::types::{
    Account, CallRecord, ConsentRecord, DncEntry, KpiTarget, PredictiveInsight, RuleEntry,
    Violation, ViolationFilter,
};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Snapshot of all repository state, serialised to / deserialised from disk.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StorageSnapshot {
    accounts: HashMap<String, Account>,
    dnc: HashMap<String, DncEntry>,
    consent: HashMap<String, ConsentRecord>,
    rules: HashMap<String, Vec<RuleEntry>>,
    violations: Vec<Violation>,
    calls: Vec<CallRecord>,
    kpi_targets: HashMap<String, Vec<KpiTarget>>,
    insights: HashMap<String, Vec<PredictiveInsight>>,
}

#[derive(Debug)]
struct Inner {
    path: PathBuf,
    data: StorageSnapshot,
}

/// A file-backed [`Storage`] implementation that persists state as JSON.
///
/// Cloning is cheap and shares the underlying handle, mirroring
/// [`InMemoryStorage`](callguard_core::storage::InMemoryStorage) — every
/// engine component sees the same file.
///
/// # Examples
///
/// ```rust,no_run
/// use callguard_store::FileStorage;
/// use callguard_core::storage::Storage;
///
/// let storage = FileStorage::open("/tmp/callguard.json")
///     .expect("could not open storage");
/// assert!(storage.get_account("acct-001").unwrap().is_none());
/// ```
#[derive(Debug, Clone)]
pub struct FileStorage {
    inner: Arc<RwLock<Inner>>,
}

impl FileStorage {
    /// Open an existing JSON storage file, or create a new empty one if the
    /// path does not exist.
    ///
    /// # Errors
    ///
    /// [`StoreError::Io`] when the file exists but cannot be read;
    /// [`StoreError::Corrupt`] when the JSON is malformed.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let data = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            serde_json::from_str(&raw).map_err(|error| {
                StoreError::Corrupt(format!("storage JSON parse error: {error}"))
            })?
        } else {
            StorageSnapshot::default()
        };

        Ok(Self { inner: Arc::new(RwLock::new(Inner { path, data })) })
    }

    /// Flush the current state to disk using an atomic write-rename.
    ///
    /// The file is written to `<path>.tmp` first, then renamed over the
    /// target, so a crash during the write never leaves a partial file.
    pub fn flush(&self) -> Result<(), StoreError> {
        flush_inner(&self.inner.read())
    }

    /// Composite key used for the DNC and consent maps.
    fn composite_key(left: &str, right: &str) -> String {
        format!("{left}:{right}")
    }

    /// Run `mutate` under the write lock, then flush while still holding it
    /// so no other writer can interleave between the change and the write.
    fn write<T>(&self, mutate: impl FnOnce(&mut StorageSnapshot) -> T) -> Result<T, StoreError> {
        let mut inner = self.inner.write();
        let result = mutate(&mut inner.data);
        flush_inner(&inner)?;
        Ok(result)
    }
}

fn flush_inner(inner: &Inner) -> Result<(), StoreError> {
    let json = serde_json::to_string_pretty(&inner.data)
        .map_err(|error| StoreError::Corrupt(format!("storage serialisation error: {error}")))?;
    let tmp_path = inner.path.with_extension("tmp");
    std::fs::write(&tmp_path, json)?;
    std::fs::rename(&tmp_path, &inner.path)?;
    Ok(())
}

impl Storage for FileStorage {
    fn get_account(&self, account_id: &str) -> Result<Option<Account>, StoreError> {
        Ok(self.inner.read().data.accounts.get(account_id).cloned())
    }

    fn put_account(&self, account: Account) -> Result<(), StoreError> {
        self.write(|data| {
            data.accounts.insert(account.id.clone(), account);
        })
    }

    fn get_dnc_entry(
        &self,
        account_id: &str,
        phone: &str,
    ) -> Result<Option<DncEntry>, StoreError> {
        let key = Self::composite_key(account_id, phone);
        Ok(self.inner.read().data.dnc.get(&key).cloned())
    }

    fn put_dnc_entry(&self, entry: DncEntry) -> Result<(), StoreError> {
        let key = Self::composite_key(&entry.account_id, &entry.phone);
        self.write(|data| {
            data.dnc.insert(key, entry);
        })
    }

    fn remove_dnc_entry(&self, account_id: &str, phone: &str) -> Result<(), StoreError> {
        let key = Self::composite_key(account_id, phone);
        self.write(|data| {
            data.dnc.remove(&key);
        })
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
            .data
            .consent
            .get(&key)
            .filter(|record| record.revoked_at.is_none())
            .cloned())
    }

    fn put_consent(&self, record: ConsentRecord) -> Result<(), StoreError> {
        let key = Self::composite_key(&record.account_id, &record.phone);
        self.write(|data| {
            data.consent.insert(key, record);
        })
    }

    fn revoke_consent(
        &self,
        account_id: &str,
        phone: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let key = Self::composite_key(account_id, phone);
        self.write(|data| {
            if let Some(record) = data.consent.get_mut(&key) {
                record.revoked_at = Some(at);
            }
        })
    }

    fn rules(&self, account_id: &str) -> Result<Vec<RuleEntry>, StoreError> {
        Ok(self.inner.read().data.rules.get(account_id).cloned().unwrap_or_default())
    }

    fn put_rules(&self, account_id: &str, rules: Vec<RuleEntry>) -> Result<(), StoreError> {
        self.write(|data| {
            data.rules.insert(account_id.into(), rules);
        })
    }

    fn append_violation(&self, violation: Violation) -> Result<(), StoreError> {
        self.write(|data| {
            data.violations.push(violation);
        })
    }

    fn query_violations(
        &self,
        filter: &ViolationFilter,
    ) -> Result<Vec<Violation>, StoreError> {
        Ok(self
            .inner
            .read()
            .data
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
        self.write(|data| {
            match data.violations.iter_mut().find(|violation| violation.id == id) {
                Some(violation) => {
                    violation.resolved = true;
                    violation.resolved_at = Some(at);
                    violation.resolution_note = Some(note.into());
                    true
                }
                None => false,
            }
        })
    }

    fn append_call(&self, record: CallRecord) -> Result<(), StoreError> {
        self.write(|data| {
            data.calls.push(record);
        })
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
            .data
            .calls
            .iter()
            .filter(|call| {
                call.account_id == account_id && call.started_at >= from && call.started_at < to
            })
            .cloned()
            .collect())
    }

    fn kpi_targets(&self, account_id: &str) -> Result<Vec<KpiTarget>, StoreError> {
        Ok(self.inner.read().data.kpi_targets.get(account_id).cloned().unwrap_or_default())
    }

    fn put_kpi_targets(
        &self,
        account_id: &str,
        targets: Vec<KpiTarget>,
    ) -> Result<(), StoreError> {
        self.write(|data| {
            data.kpi_targets.insert(account_id.into(), targets);
        })
    }

    fn insights(&self, account_id: &str) -> Result<Vec<PredictiveInsight>, StoreError> {
        Ok(self.inner.read().data.insights.get(account_id).cloned().unwrap_or_default())
    }

    fn put_insights(
        &self,
        account_id: &str,
        insights: Vec<PredictiveInsight>,
    ) -> Result<(), StoreError> {
        self.write(|data| {
            data.insights.insert(account_id.into(), insights);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use callguard_core::types::{DncSource, Severity, ViolationKind};

    fn account(id: &str) -> Account {
        Account {
            id: id.into(),
            monthly_quota_minutes: 250.0,
            minutes_used: 40.0,
            features: vec![],
            max_concurrent_calls: 5,
        }
    }

    #[test]
    fn test_state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");

        {
            let storage = FileStorage::open(&path).unwrap();
            storage.put_account(account("acct-001")).unwrap();
            storage
                .put_dnc_entry(DncEntry {
                    account_id: "acct-001".into(),
                    phone: "+15551230000".into(),
                    reason: "consumer request".into(),
                    source: DncSource::ConsumerRequest,
                    added_at: Utc::now(),
                })
                .unwrap();
        }

        let reopened = FileStorage::open(&path).unwrap();
        let loaded = reopened.get_account("acct-001").unwrap().unwrap();
        assert_eq!(loaded.minutes_used, 40.0);
        assert!(reopened.get_dnc_entry("acct-001", "+15551230000").unwrap().is_some());
    }

    #[test]
    fn test_resolution_is_durable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        let id = Uuid::new_v4();

        {
            let storage = FileStorage::open(&path).unwrap();
            storage
                .append_violation(Violation {
                    id,
                    account_id: "acct-001".into(),
                    kind: ViolationKind::FrequencyViolation,
                    severity: Severity::Medium,
                    destination: "+15551230000".into(),
                    call_id: None,
                    occurred_at: Utc::now(),
                    detail: "4 attempts within the trailing 24h window".into(),
                    resolved: false,
                    resolved_at: None,
                    resolution_note: None,
                })
                .unwrap();
            assert!(storage.resolve_violation(id, "retrained dialer", Utc::now()).unwrap());
        }

        let reopened = FileStorage::open(&path).unwrap();
        let violations = reopened.query_violations(&ViolationFilter::default()).unwrap();
        assert_eq!(violations.len(), 1);
        assert!(violations[0].resolved);
        assert_eq!(violations[0].resolution_note.as_deref(), Some("retrained dialer"));
    }

    #[test]
    fn test_malformed_file_is_corrupt_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        std::fs::write(&path, "not json at all").unwrap();

        assert!(matches!(FileStorage::open(&path), Err(StoreError::Corrupt(_))));
    }

    #[test]
    fn test_clones_share_the_file_handle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");

        let storage = FileStorage::open(&path).unwrap();
        let clone = storage.clone();
        storage.put_account(account("acct-001")).unwrap();
        assert!(clone.get_account("acct-001").unwrap().is_some());
    }
}
