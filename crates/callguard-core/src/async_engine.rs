// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! Async facade backed by Tokio.
//!
//! This module is only compiled when the `async` feature flag is enabled:
//!
//! ```toml
//! [dependencies]
//! callguard-core = { version = "0.1", features = ["async"] }
//! ```
//!
//! # Design
//!
//! [`AsyncCallGate`] wraps the sync [`CallGate`] in an [`Arc`] and delegates
//! directly: the admission path only ever blocks on the bounded
//! per-destination lock (250 ms by default), which is short enough to run
//! inline on the executor.  What the async layer adds are the two background
//! tasks the engine needs in a long-running service:
//!
//! * [`spawn_sweeper`](AsyncCallGate::spawn_sweeper) — periodically reclaims
//!   reservations abandoned by crashed dialer workers.
//! * [`spawn_reporting`](AsyncCallGate::spawn_reporting) — drives the
//!   reporting pipeline on its own schedule, one account at a time.

#![cfg(feature = "async")]

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

use crate::config::Config;
use crate::error::GateError;
use crate::events::EventSink;
use crate::gate::CallGate;
use crate::reporting::ReportingPipeline;
use crate::storage::Storage;
use crate::types::{CallOutcome, CallRecord, CallRequest, Decision};

/// Tokio-friendly handle over the admission engine and reporting pipeline.
///
/// Cheap to clone; all clones share the same gate and pipeline.
pub struct AsyncCallGate<S: Storage> {
    gate: Arc<CallGate<S>>,
    reporting: Arc<ReportingPipeline<S>>,
}

impl<S: Storage> Clone for AsyncCallGate<S> {
    fn clone(&self) -> Self {
        Self { gate: self.gate.clone(), reporting: self.reporting.clone() }
    }
}

impl<S: Storage + Clone> AsyncCallGate<S> {
    /// Construct a new [`AsyncCallGate`].
    pub fn new(config: Config, storage: S, events: Arc<dyn EventSink>) -> Self {
        Self {
            gate: Arc::new(CallGate::new(config, storage.clone(), events)),
            reporting: Arc::new(ReportingPipeline::new(storage)),
        }
    }
}

impl<S: Storage> AsyncCallGate<S> {
    /// Evaluate a proposed call. See [`CallGate::evaluate`].
    pub async fn evaluate(&self, request: &CallRequest) -> Result<Decision, GateError> {
        self.gate.evaluate(request)
    }

    /// Finalize an admitted call. See [`CallGate::commit`].
    pub async fn commit(
        &self,
        reservation_id: Uuid,
        actual_minutes: f64,
        outcome: CallOutcome,
    ) -> Result<CallRecord, GateError> {
        self.gate.commit(reservation_id, actual_minutes, outcome)
    }

    /// Discard a reservation. See [`CallGate::release`].
    pub async fn release(&self, reservation_id: Uuid) -> bool {
        self.gate.release(reservation_id)
    }

    /// Borrow the underlying sync gate.
    pub fn gate(&self) -> &CallGate<S> {
        &self.gate
    }

    /// Borrow the reporting pipeline.
    pub fn reporting(&self) -> &ReportingPipeline<S> {
        &self.reporting
    }
}

impl<S: Storage + 'static> AsyncCallGate<S> {
    /// Spawn the abandoned-reservation sweeper on `interval`.
    ///
    /// Each tick runs [`CallGate::sweep_abandoned`], reclaiming quota from
    /// workers that crashed without releasing. Abort the returned handle to
    /// stop the task.
    pub fn spawn_sweeper(&self, interval: Duration) -> JoinHandle<()> {
        let gate = self.gate.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let reclaimed = gate.sweep_abandoned(Utc::now());
                if reclaimed > 0 {
                    tracing::info!(reclaimed, "sweeper reclaimed abandoned reservations");
                }
            }
        })
    }

    /// Spawn the reporting scheduler: every `interval`, run the pipeline for
    /// each listed account in turn.
    ///
    /// Failed runs are logged inside the pipeline and retried on the next
    /// tick; the task itself never exits on failure.
    pub fn spawn_reporting(
        &self,
        account_ids: Vec<String>,
        interval: Duration,
    ) -> JoinHandle<()> {
        let reporting = self.reporting.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                for account_id in &account_ids {
                    reporting.run_for_account(account_id, Utc::now());
                }
            }
        })
    }
}
