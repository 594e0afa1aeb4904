// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! Reporting pipeline.
//!
//! Consumes committed call records and the violation log on an independent
//! schedule; it never touches the admission path's state.  Each run
//! aggregates the trailing week, refreshes KPI targets, regenerates
//! insights, and synthesises the compliance report.
//!
//! Runs are single-flight per account: a run requested while another run
//! for the same account is still executing is skipped, preventing duplicate
//! KPI and insight rows.  A failed run is logged and simply retried on the
//! next schedule tick — reporting never surfaces errors to callers.

pub mod compliance;
pub mod insight;
pub mod kpi;
pub mod metrics;

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

use crate::error::GateError;
use crate::storage::Storage;
use crate::types::{
    AggregatedMetrics, ComplianceReport, KpiTarget, PredictiveInsight, ViolationFilter,
};

use self::compliance::ComplianceReporter;
use self::insight::InsightGenerator;
use self::kpi::KpiTracker;
use self::metrics::MetricsAggregator;

/// Everything one reporting run produced for an account.
#[derive(Debug, Clone)]
pub struct ReportingRun {
    pub metrics: AggregatedMetrics,
    pub insights: Vec<PredictiveInsight>,
    pub kpi_targets: Vec<KpiTarget>,
    pub compliance: ComplianceReport,
}

/// Outcome of a [`ReportingPipeline::run_for_account`] invocation.
#[derive(Debug)]
pub enum RunOutcome {
    /// The run completed; artifacts were persisted.
    Completed(Box<ReportingRun>),
    /// Another run for this account is still in flight; nothing was done.
    Skipped,
    /// The run failed (logged); it will be retried on the next tick.
    Failed,
}

/// Orchestrates the derived-artifact computations for one account at a time.
pub struct ReportingPipeline<S: Storage> {
    storage: S,
    /// Accounts with a run currently executing.
    in_flight: Mutex<HashSet<String>>,
}

impl<S: Storage> ReportingPipeline<S> {
    /// Create a new [`ReportingPipeline`].
    pub fn new(storage: S) -> Self {
        Self { storage, in_flight: Mutex::new(HashSet::new()) }
    }

    /// Run the full pipeline for one account with `now` as the window end.
    ///
    /// Single-flight: overlapping runs for the same account return
    /// [`RunOutcome::Skipped`]. Storage failures return
    /// [`RunOutcome::Failed`] after logging — never an error.
    pub fn run_for_account(&self, account_id: &str, now: DateTime<Utc>) -> RunOutcome {
        if !self.in_flight.lock().insert(account_id.to_string()) {
            tracing::debug!(account_id, "reporting run already in flight; skipping");
            return RunOutcome::Skipped;
        }

        let result = self.run_inner(account_id, now);
        self.in_flight.lock().remove(account_id);

        match result {
            Ok(run) => RunOutcome::Completed(run),
            Err(error) => {
                tracing::error!(account_id, %error, "reporting run failed; will retry next tick");
                RunOutcome::Failed
            }
        }
    }

    fn run_inner(
        &self,
        account_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Box<ReportingRun>, GateError> {
        let week = Duration::days(7);
        let current_calls = self.storage.calls_between(account_id, now - week, now)?;
        let previous_calls =
            self.storage.calls_between(account_id, now - week - week, now - week)?;

        let current =
            MetricsAggregator::aggregate(account_id, &current_calls, now - week, now);
        let previous = MetricsAggregator::aggregate(
            account_id,
            &previous_calls,
            now - week - week,
            now - week,
        );

        let insights = InsightGenerator::generate(&previous, &current, now);
        self.storage.put_insights(account_id, insights.clone())?;

        let mut targets = self.storage.kpi_targets(account_id)?;
        KpiTracker::refresh(&mut targets, &current);
        self.storage.put_kpi_targets(account_id, targets.clone())?;

        let violations = self.storage.query_violations(&ViolationFilter {
            account_id: Some(account_id.into()),
            since: Some(now - week),
            until: Some(now),
            ..ViolationFilter::default()
        })?;
        let compliance = ComplianceReporter::report(
            account_id,
            &current_calls,
            &violations,
            now - week,
            now,
            now,
        );

        tracing::info!(
            account_id,
            calls = current.overall.total_calls,
            insights = insights.len(),
            score = compliance.compliance_score,
            "reporting run completed"
        );
        Ok(Box::new(ReportingRun { metrics: current, insights, kpi_targets: targets, compliance }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::storage::InMemoryStorage;
    use crate::types::{
        Account, CallDirection, CallOutcome, CallRecord, ConsentRecord, DncEntry, KpiStatus,
        RuleEntry, Violation,
    };
    use std::sync::mpsc;
    use uuid::Uuid;

    fn seed_calls(storage: &InMemoryStorage, now: DateTime<Utc>, offset_days: i64, count: usize) {
        for index in 0..count {
            let started = now - Duration::days(offset_days) + Duration::minutes(index as i64);
            storage
                .append_call(CallRecord {
                    id: Uuid::new_v4(),
                    account_id: "acct-001".into(),
                    campaign_id: Some("camp-a".into()),
                    agent_id: None,
                    destination: "+15551230000".into(),
                    direction: CallDirection::Outbound,
                    started_at: started,
                    ended_at: started + Duration::minutes(2),
                    duration_minutes: 2.0,
                    outcome: CallOutcome::Connected,
                    reservation_id: Uuid::new_v4(),
                })
                .unwrap();
        }
    }

    #[test]
    fn test_full_run_persists_artifacts() {
        let storage = InMemoryStorage::new();
        let now = Utc::now();
        seed_calls(&storage, now, 2, 30); // current window
        seed_calls(&storage, now, 9, 10); // previous window: 10 -> 30 calls
        storage
            .put_kpi_targets(
                "acct-001",
                vec![KpiTarget {
                    account_id: "acct-001".into(),
                    name: "weekly_calls".into(),
                    target_value: 40.0,
                    period: "weekly".into(),
                    current_value: 0.0,
                    status: KpiStatus::Behind,
                }],
            )
            .unwrap();

        let pipeline = ReportingPipeline::new(storage.clone());
        let outcome = pipeline.run_for_account("acct-001", now);
        let run = match outcome {
            RunOutcome::Completed(run) => run,
            other => panic!("expected completion, got {other:?}"),
        };

        assert_eq!(run.metrics.overall.total_calls, 30);
        // 10 -> 30 calls is a 200% volume move.
        assert!(!run.insights.is_empty());
        assert_eq!(run.kpi_targets[0].current_value, 30.0);
        assert_eq!(run.kpi_targets[0].status, KpiStatus::AtRisk);
        assert_eq!(run.compliance.compliance_score, 100);

        // Artifacts were written back through the repository.
        assert_eq!(storage.kpi_targets("acct-001").unwrap()[0].current_value, 30.0);
        assert_eq!(storage.insights("acct-001").unwrap().len(), run.insights.len());
    }

    // -------------------------------------------------------------------
    // Instrumented storage for single-flight / failure tests
    // -------------------------------------------------------------------

    enum Mode {
        /// Signal on entry to `calls_between`, then wait to be released.
        Gate { entered: Mutex<mpsc::Sender<()>>, release: Mutex<mpsc::Receiver<()>> },
        /// Fail every `calls_between`.
        FailCalls,
    }

    struct InstrumentedStorage {
        inner: InMemoryStorage,
        mode: Mode,
    }

    impl Storage for InstrumentedStorage {
        fn get_account(&self, account_id: &str) -> Result<Option<Account>, StoreError> {
            self.inner.get_account(account_id)
        }
        fn put_account(&self, account: Account) -> Result<(), StoreError> {
            self.inner.put_account(account)
        }
        fn get_dnc_entry(
            &self,
            account_id: &str,
            phone: &str,
        ) -> Result<Option<DncEntry>, StoreError> {
            self.inner.get_dnc_entry(account_id, phone)
        }
        fn put_dnc_entry(&self, entry: DncEntry) -> Result<(), StoreError> {
            self.inner.put_dnc_entry(entry)
        }
        fn remove_dnc_entry(&self, account_id: &str, phone: &str) -> Result<(), StoreError> {
            self.inner.remove_dnc_entry(account_id, phone)
        }
        fn current_consent(
            &self,
            account_id: &str,
            phone: &str,
        ) -> Result<Option<ConsentRecord>, StoreError> {
            self.inner.current_consent(account_id, phone)
        }
        fn put_consent(&self, record: ConsentRecord) -> Result<(), StoreError> {
            self.inner.put_consent(record)
        }
        fn revoke_consent(
            &self,
            account_id: &str,
            phone: &str,
            at: DateTime<Utc>,
        ) -> Result<(), StoreError> {
            self.inner.revoke_consent(account_id, phone, at)
        }
        fn rules(&self, account_id: &str) -> Result<Vec<RuleEntry>, StoreError> {
            self.inner.rules(account_id)
        }
        fn put_rules(&self, account_id: &str, rules: Vec<RuleEntry>) -> Result<(), StoreError> {
            self.inner.put_rules(account_id, rules)
        }
        fn append_violation(&self, violation: Violation) -> Result<(), StoreError> {
            self.inner.append_violation(violation)
        }
        fn query_violations(
            &self,
            filter: &ViolationFilter,
        ) -> Result<Vec<Violation>, StoreError> {
            self.inner.query_violations(filter)
        }
        fn resolve_violation(
            &self,
            id: Uuid,
            note: &str,
            at: DateTime<Utc>,
        ) -> Result<bool, StoreError> {
            self.inner.resolve_violation(id, note, at)
        }
        fn append_call(&self, record: CallRecord) -> Result<(), StoreError> {
            self.inner.append_call(record)
        }
        fn calls_between(
            &self,
            account_id: &str,
            from: DateTime<Utc>,
            to: DateTime<Utc>,
        ) -> Result<Vec<CallRecord>, StoreError> {
            match &self.mode {
                Mode::Gate { entered, release } => {
                    entered.lock().send(()).ok();
                    release.lock().recv().ok();
                }
                Mode::FailCalls => {
                    return Err(StoreError::Unavailable("calls table offline".into()));
                }
            }
            self.inner.calls_between(account_id, from, to)
        }
        fn kpi_targets(&self, account_id: &str) -> Result<Vec<KpiTarget>, StoreError> {
            self.inner.kpi_targets(account_id)
        }
        fn put_kpi_targets(
            &self,
            account_id: &str,
            targets: Vec<KpiTarget>,
        ) -> Result<(), StoreError> {
            self.inner.put_kpi_targets(account_id, targets)
        }
        fn insights(&self, account_id: &str) -> Result<Vec<PredictiveInsight>, StoreError> {
            self.inner.insights(account_id)
        }
        fn put_insights(
            &self,
            account_id: &str,
            insights: Vec<PredictiveInsight>,
        ) -> Result<(), StoreError> {
            self.inner.put_insights(account_id, insights)
        }
    }

    #[test]
    fn test_overlapping_runs_are_single_flight() {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let storage = InstrumentedStorage {
            inner: InMemoryStorage::new(),
            mode: Mode::Gate {
                entered: Mutex::new(entered_tx),
                release: Mutex::new(release_rx),
            },
        };
        let pipeline = ReportingPipeline::new(storage);
        let now = Utc::now();

        std::thread::scope(|scope| {
            let first = scope.spawn(|| pipeline.run_for_account("acct-001", now));

            // Wait until the first run is provably mid-flight, then request
            // an overlapping run for the same account.
            entered_rx.recv().unwrap();
            assert!(matches!(pipeline.run_for_account("acct-001", now), RunOutcome::Skipped));

            // Let the first run finish (it reads two call windows).
            release_tx.send(()).unwrap();
            release_tx.send(()).unwrap();
            assert!(matches!(first.join().unwrap(), RunOutcome::Completed(_)));
        });

        // With the first run finished, the account is runnable again.
        release_tx.send(()).unwrap();
        release_tx.send(()).unwrap();
        assert!(matches!(pipeline.run_for_account("acct-001", now), RunOutcome::Completed(_)));
    }

    #[test]
    fn test_failed_run_is_swallowed_and_retryable() {
        let storage = InstrumentedStorage {
            inner: InMemoryStorage::new(),
            mode: Mode::FailCalls,
        };
        let pipeline = ReportingPipeline::new(storage);
        let now = Utc::now();

        assert!(matches!(pipeline.run_for_account("acct-001", now), RunOutcome::Failed));
        // The in-flight marker was cleared; the next tick can retry.
        assert!(matches!(pipeline.run_for_account("acct-001", now), RunOutcome::Failed));
    }
}
