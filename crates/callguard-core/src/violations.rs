// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! Violation recording and alerting.
//!
//! [`ViolationRecorder`] exposes three operations:
//!
//! * [`record`](ViolationRecorder::record)   — durably persist a violation
//! * [`query`](ViolationRecorder::query)    — search / filter the violation log
//! * [`resolve`](ViolationRecorder::resolve) — set the resolution fields
//!
//! Violations are recorded even when — especially when — the call is denied:
//! the log is the audit trail.  High and critical severities additionally
//! emit a `compliance.violation` event for the external alerting
//! collaborator.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::GateError;
use crate::events::{EngineEvent, EventSink};
use crate::storage::Storage;
use crate::types::{Severity, Violation, ViolationFilter};

/// Persists compliance violations and triggers severity-based alerting.
pub struct ViolationRecorder<S: Storage> {
    storage: S,
    events: Arc<dyn EventSink>,
}

impl<S: Storage> ViolationRecorder<S> {
    /// Create a new [`ViolationRecorder`].
    pub fn new(storage: S, events: Arc<dyn EventSink>) -> Self {
        Self { storage, events }
    }

    /// Durably record a violation.
    ///
    /// Emits a `compliance.violation` event when severity is High or
    /// Critical. The write happens first — alerting must never outrun the
    /// audit trail.
    pub fn record(&self, violation: &Violation) -> Result<(), GateError> {
        self.storage.append_violation(violation.clone())?;
        tracing::warn!(
            account_id = violation.account_id.as_str(),
            kind = violation.kind.display_name(),
            destination = violation.destination.as_str(),
            "compliance violation recorded"
        );
        if violation.severity >= Severity::High {
            self.events.emit(EngineEvent::ComplianceViolation {
                account_id: violation.account_id.clone(),
                kind: violation.kind,
                severity: violation.severity,
                destination: violation.destination.clone(),
            });
        }
        Ok(())
    }

    /// Return all violations that satisfy `filter`, in append order.
    pub fn query(&self, filter: &ViolationFilter) -> Result<Vec<Violation>, GateError> {
        Ok(self.storage.query_violations(filter)?)
    }

    /// Mark a violation resolved with an operator note. Returns `false`
    /// when the id is unknown.
    pub fn resolve(&self, id: Uuid, note: &str, at: DateTime<Utc>) -> Result<bool, GateError> {
        Ok(self.storage.resolve_violation(id, note, at)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::MemorySink;
    use crate::storage::InMemoryStorage;
    use crate::types::ViolationKind;

    fn violation(severity: Severity) -> Violation {
        Violation {
            id: Uuid::new_v4(),
            account_id: "acct-001".into(),
            kind: ViolationKind::DncViolation,
            severity,
            destination: "+15551230000".into(),
            call_id: None,
            occurred_at: Utc::now(),
            detail: "destination is on the do-not-call list".into(),
            resolved: false,
            resolved_at: None,
            resolution_note: None,
        }
    }

    #[test]
    fn test_high_severity_emits_alert_event() {
        let sink = Arc::new(MemorySink::default());
        let recorder = ViolationRecorder::new(InMemoryStorage::new(), sink.clone());

        recorder.record(&violation(Severity::Medium)).unwrap();
        assert!(sink.drain().is_empty());

        recorder.record(&violation(Severity::Critical)).unwrap();
        let events = sink.drain();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], EngineEvent::ComplianceViolation { .. }));
    }

    #[test]
    fn test_record_then_query_then_resolve() {
        let recorder =
            ViolationRecorder::new(InMemoryStorage::new(), Arc::new(MemorySink::default()));
        let violation = violation(Severity::High);
        recorder.record(&violation).unwrap();

        let found = recorder
            .query(&ViolationFilter {
                account_id: Some("acct-001".into()),
                ..ViolationFilter::default()
            })
            .unwrap();
        assert_eq!(found.len(), 1);

        assert!(recorder.resolve(violation.id, "number scrubbed", Utc::now()).unwrap());
        let unresolved = recorder
            .query(&ViolationFilter { unresolved_only: true, ..ViolationFilter::default() })
            .unwrap();
        assert!(unresolved.is_empty());
    }
}
