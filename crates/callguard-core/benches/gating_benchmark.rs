// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! Criterion benchmark suite for the CallGuard admission engine.
//!
//! Benchmarks cover the three hot-path operations:
//!
//! - Compliance rule evaluation (compliant and DNC-denied destinations)
//! - Quota reservation (reserve + release cycle)
//! - Full admission pipeline (evaluate + commit)
//!
//! Run with: `cargo bench --bench gating_benchmark`

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use callguard_core::{
    activity::DestinationActivityLog,
    config::Config,
    events::MemorySink,
    gate::CallGate,
    ledger::{ReserveOutcome, UsageLedger},
    rules::PolicyEvaluator,
    storage::{InMemoryStorage, Storage},
    types::{
        Account, CallOutcome, CallRequest, ComplianceRule, ConsentRecord, ConsentType,
        DncEntry, DncSource, RuleEntry,
    },
};
use chrono::{TimeZone, Utc};

/// Mid-window evaluation instant so calling-hours never flips mid-run.
fn noon() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 15, 0, 0).unwrap()
}

fn seeded_storage() -> InMemoryStorage {
    let storage = InMemoryStorage::new();
    for index in 0..100 {
        let account_id = format!("acct-{:04}", index);
        storage
            .put_account(Account {
                id: account_id.clone(),
                monthly_quota_minutes: 0.0,
                minutes_used: 0.0,
                features: vec![],
                max_concurrent_calls: 0,
            })
            .unwrap();
        storage
            .put_consent(ConsentRecord {
                account_id,
                phone: "+15551230000".into(),
                consent_type: ConsentType::ExpressWritten,
                method: "web_form".into(),
                granted_at: noon(),
                revoked_at: None,
                expires_at: None,
            })
            .unwrap();
    }
    storage
}

// ---------------------------------------------------------------------------
// Policy evaluation benchmark
// ---------------------------------------------------------------------------

/// Measures the cost of running the full rule set against a destination,
/// for both the compliant path and a hard DNC deny.
fn policy_evaluation_benchmark(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("policy_evaluation");

    let storage = seeded_storage();
    storage
        .put_dnc_entry(DncEntry {
            account_id: "acct-0000".into(),
            phone: "+15559990000".into(),
            reason: "consumer request".into(),
            source: DncSource::ConsumerRequest,
            added_at: noon(),
        })
        .unwrap();
    let evaluator = PolicyEvaluator::new(Config::default(), storage.clone());
    let activity = DestinationActivityLog::new();
    let account = storage.get_account("acct-0000").unwrap().unwrap();

    group.bench_function("compliant_destination", |bencher| {
        bencher.iter(|| {
            let outcome = evaluator
                .evaluate_at(
                    black_box(&account),
                    black_box("+15551230000"),
                    chrono_tz::UTC,
                    &activity,
                    noon(),
                )
                .unwrap();
            black_box(outcome);
        });
    });

    group.bench_function("dnc_denied_destination", |bencher| {
        bencher.iter(|| {
            let outcome = evaluator
                .evaluate_at(
                    black_box(&account),
                    black_box("+15559990000"),
                    chrono_tz::UTC,
                    &activity,
                    noon(),
                )
                .unwrap();
            black_box(outcome);
        });
    });

    group.finish();
}

// ---------------------------------------------------------------------------
// Quota reservation benchmark
// ---------------------------------------------------------------------------

/// Measures one atomic reserve + release cycle against a warm account shard.
fn quota_reservation_benchmark(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("quota_reservation");

    let storage = seeded_storage();
    let ledger =
        UsageLedger::new(Config::default(), storage, Arc::new(MemorySink::default()));
    let request = CallRequest::new("acct-0042", "+15551230000", 3.0, "UTC");

    group.bench_function("reserve_release_cycle", |bencher| {
        bencher.iter(|| {
            match ledger.reserve(black_box(&request), noon()).unwrap() {
                ReserveOutcome::Reserved { reservation_id, .. } => {
                    ledger.release(reservation_id);
                }
                ReserveOutcome::Denied { .. } => unreachable!("unlimited account"),
            }
        });
    });

    group.finish();
}

// ---------------------------------------------------------------------------
// Full admission benchmark
// ---------------------------------------------------------------------------

/// Measures the complete evaluate + commit pipeline, including the
/// per-destination admission lock and the call-record write.
fn full_admission_benchmark(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("full_admission");
    group.sample_size(50);

    let storage = seeded_storage();
    // Frequency limiting off for the benchmark account: the loop dials one
    // destination far past any realistic cap.
    storage
        .put_rules(
            "acct-0001",
            vec![
                RuleEntry::enabled(ComplianceRule::DncCheck),
                RuleEntry::enabled(ComplianceRule::ConsentVerification),
                RuleEntry::enabled(ComplianceRule::CallingHours { start_hour: 8, end_hour: 21 }),
            ],
        )
        .unwrap();
    let gate = CallGate::new(Config::default(), storage, Arc::new(MemorySink::default()));
    let request = CallRequest::new("acct-0001", "+15551230000", 3.0, "UTC");

    group.bench_function("evaluate_commit", |bencher| {
        bencher.iter(|| {
            let decision = gate.evaluate_at(black_box(&request), noon()).unwrap();
            let reservation_id = decision.reservation_id.expect("benchmark account admits");
            gate.commit_at(reservation_id, 2.0, CallOutcome::Connected, noon()).unwrap();
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    policy_evaluation_benchmark,
    quota_reservation_benchmark,
    full_admission_benchmark
);
criterion_main!(benches);
