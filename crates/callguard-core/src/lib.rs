// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! # callguard-core
//!
//! Call gating and compliance admission-control engine for the CallGuard
//! telephony platform.
//!
//! Dialer workers call the gate synchronously before placing each call; the
//! gate combines per-account usage-quota admission control with regulatory
//! compliance evaluation (do-not-call lists, consent validity, calling-hour
//! windows, per-destination frequency limits) in one atomic decision, and
//! stays correct under concurrent attempts from workers sharing an account
//! or a destination.
//!
//! ## Architecture
//!
//! ```text
//! CallGate<S: Storage>
//!   ├── PolicyEvaluator<S>       — evaluate every enabled compliance rule
//!   ├── UsageLedger<S>           — atomic quota reserve / commit / release
//!   ├── DestinationActivityLog   — per-(account, phone) attempt history
//!   └── ViolationRecorder<S>     — durable violation log + alert events
//!
//! ReportingPipeline<S: Storage>  — independent schedule, read-only
//!   ├── MetricsAggregator        — windowed call statistics
//!   ├── KpiTracker               — target progress classification
//!   ├── InsightGenerator         — trends, anomalies, benchmarks
//!   └── ComplianceReporter       — period compliance score
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use callguard_core::{
//!     config::Config,
//!     events::TracingSink,
//!     gate::CallGate,
//!     storage::{InMemoryStorage, Storage},
//!     types::{Account, CallOutcome, CallRequest},
//! };
//!
//! let storage = InMemoryStorage::new();
//! storage.put_account(Account {
//!     id: "acct-001".into(),
//!     monthly_quota_minutes: 500.0,
//!     minutes_used: 0.0,
//!     features: vec![],
//!     max_concurrent_calls: 0,
//! }).unwrap();
//!
//! let gate = CallGate::new(Config::default(), storage, Arc::new(TracingSink));
//!
//! // Evaluate a proposed call.
//! let request = CallRequest::new("acct-001", "+15551230000", 3.0, "America/Chicago");
//! let decision = gate.evaluate(&request).unwrap();
//!
//! if decision.allow {
//!     // ... place the call, then:
//!     gate.commit(decision.reservation_id.unwrap(), 2.4, CallOutcome::Connected).unwrap();
//! }
//! ```

pub mod activity;
pub mod async_engine;
pub mod config;
pub mod config_loader;
pub mod error;
pub mod events;
pub mod gate;
pub mod ledger;
pub mod reporting;
pub mod rules;
pub mod storage;
pub mod types;
pub mod violations;

// Re-export the most commonly used items at the crate root so consumers can
// write `use callguard_core::CallGate;` instead of the fully qualified path.
pub use config::Config;
pub use error::{GateError, Result, StoreError};
pub use events::{EngineEvent, EventSink, MemorySink, TracingSink};
pub use gate::CallGate;
pub use ledger::{ReserveOutcome, UsageLedger};
pub use reporting::ReportingPipeline;
pub use rules::PolicyEvaluator;
pub use storage::{InMemoryStorage, Storage};
pub use types::{
    Account, CallOutcome, CallRecord, CallRequest, Decision, DenyReason, DncEntry,
    ComplianceRule, ConsentRecord, KpiStatus, KpiTarget, PolicyOutcome, Reservation,
    RuleEntry, Severity, Violation, ViolationFilter, ViolationKind, Warning,
};
pub use violations::ViolationRecorder;

#[cfg(feature = "async")]
pub use async_engine::AsyncCallGate;
