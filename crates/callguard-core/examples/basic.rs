// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! # Basic Admission Engine Example
//!
//! Demonstrates the full admission pipeline using the in-memory storage
//! backend.  Run with:
//!
//! ```bash
//! cargo run --example basic
//! ```

use std::sync::Arc;

use callguard_core::{
    config::Config,
    events::MemorySink,
    gate::CallGate,
    storage::{InMemoryStorage, Storage},
    types::{Account, CallOutcome, CallRequest, ConsentRecord, ConsentType, DncEntry, DncSource},
};
use chrono::Utc;

fn main() {
    println!("CallGuard Admission Engine — Basic Example\n");

    // -----------------------------------------------------------------------
    // 1. Seed the repository: one account, consent for one destination, and
    //    a DNC entry for another.
    // -----------------------------------------------------------------------
    let storage = InMemoryStorage::new();
    storage
        .put_account(Account {
            id: "acct-demo".into(),
            monthly_quota_minutes: 500.0,
            minutes_used: 0.0,
            features: vec!["recording_disclosure".into()],
            max_concurrent_calls: 10,
        })
        .expect("in-memory storage never fails");
    storage
        .put_consent(ConsentRecord {
            account_id: "acct-demo".into(),
            phone: "+15551230000".into(),
            consent_type: ConsentType::ExpressWritten,
            method: "web_form".into(),
            granted_at: Utc::now(),
            revoked_at: None,
            expires_at: None,
        })
        .expect("in-memory storage never fails");
    storage
        .put_dnc_entry(DncEntry {
            account_id: "acct-demo".into(),
            phone: "+15559990000".into(),
            reason: "consumer request".into(),
            source: DncSource::ConsumerRequest,
            added_at: Utc::now(),
        })
        .expect("in-memory storage never fails");

    // -----------------------------------------------------------------------
    // 2. Construct the gate.
    // -----------------------------------------------------------------------
    let events = Arc::new(MemorySink::default());
    let gate = CallGate::new(Config::default(), storage, events.clone());

    // -----------------------------------------------------------------------
    // 3. Evaluate a consented destination.
    // -----------------------------------------------------------------------
    let request = CallRequest::new("acct-demo", "+15551230000", 3.0, "America/Chicago");
    let decision = gate.evaluate(&request).expect("storage is reachable");
    println!(
        "evaluate {} -> allow={} remaining={:?} ({})",
        request.destination, decision.allow, decision.remaining_minutes, decision.reason
    );

    if let Some(reservation_id) = decision.reservation_id {
        // The dialer places the call; it completes after 2.4 minutes.
        let record = gate
            .commit(reservation_id, 2.4, CallOutcome::Connected)
            .expect("reservation is open");
        println!(
            "committed call {} -> {:.1} min, outcome {:?}",
            record.id, record.duration_minutes, record.outcome
        );
    }

    // -----------------------------------------------------------------------
    // 4. Evaluate the suppressed destination — denied, violations recorded.
    // -----------------------------------------------------------------------
    let request = CallRequest::new("acct-demo", "+15559990000", 3.0, "America/Chicago");
    let decision = gate.evaluate(&request).expect("storage is reachable");
    println!(
        "\nevaluate {} -> allow={} ({})",
        request.destination, decision.allow, decision.reason
    );
    for violation in &decision.violations {
        println!("  violation: {} — {}", violation.kind.display_name(), violation.detail);
    }

    // -----------------------------------------------------------------------
    // 5. Show the events the engine emitted along the way.
    // -----------------------------------------------------------------------
    println!("\nengine events:");
    for event in events.drain() {
        println!("  {event:?}");
    }
}
