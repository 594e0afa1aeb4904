// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! Outbound engine events.
//!
//! The engine never delivers notifications itself — email, webhook, and
//! Zapier delivery belong to the notification collaborator.  It emits typed
//! events through the [`EventSink`] seam and moves on.  Sinks must be cheap
//! and non-blocking; the admission hot path calls them inline.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::types::{Severity, ViolationKind};

/// An event emitted by the engine for external consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    /// Usage crossed a notification threshold (80% or 100% of quota).
    #[serde(rename = "usage.threshold_crossed")]
    UsageThresholdCrossed {
        account_id: String,
        used_minutes: f64,
        limit_minutes: f64,
        percentage: u8,
    },
    /// A high- or critical-severity compliance violation was recorded.
    #[serde(rename = "compliance.violation")]
    ComplianceViolation {
        account_id: String,
        kind: ViolationKind,
        severity: Severity,
        destination: String,
    },
}

/// Receiver for [`EngineEvent`]s.
///
/// Implementations MUST be `Send + Sync`; the engine emits from arbitrary
/// dialer-worker threads.
pub trait EventSink: Send + Sync {
    /// Deliver one event. Must not block the admission path.
    fn emit(&self, event: EngineEvent);
}

/// Default sink: logs every event through `tracing`.
#[derive(Debug, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: EngineEvent) {
        match &event {
            EngineEvent::UsageThresholdCrossed { account_id, percentage, .. } => {
                tracing::info!(
                    account_id = account_id.as_str(),
                    percentage = *percentage,
                    "usage threshold crossed"
                );
            }
            EngineEvent::ComplianceViolation { account_id, kind, destination, .. } => {
                tracing::warn!(
                    account_id = account_id.as_str(),
                    kind = kind.display_name(),
                    destination = destination.as_str(),
                    "compliance violation"
                );
            }
        }
    }
}

/// Collecting sink for tests.
///
/// # Examples
///
/// ```rust
/// use callguard_core::events::{EventSink, MemorySink};
///
/// let sink = MemorySink::default();
/// assert!(sink.drain().is_empty());
/// ```
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<EngineEvent>>,
}

impl MemorySink {
    /// Take all events received so far.
    pub fn drain(&self) -> Vec<EngineEvent> {
        std::mem::take(&mut *self.events.lock())
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: EngineEvent) {
        self.events.lock().push(event);
    }
}
