//! Architectural Contract Test: Apply Idempotency
//!
//! This test verifies that the engine only touches the firewall when the
//! target set actually changed.
//!
//! Constraints verified:
//! - An unchanged target does not call the firewall again
//! - A changed DNS answer is applied on the next cycle
//! - A failed apply is retried on the next cycle even with the same target
//!
//! If this test fails, cycles are either churning the ruleset or
//! silently keeping a stale one.

mod common;

use common::*;
use std::sync::Arc;
use wgdomain_core::{ApplyOutcome, ReconcileEvent, Reconciler};

#[tokio::test]
async fn unchanged_target_skips_apply() {
    let resolver = ScriptedResolver::new();
    resolver.answer("example.com", &["192.0.2.1"], &[]);
    let firewall = RecordingFirewall::new();

    let (engine, event_rx) = Reconciler::new(
        Arc::new(store_with(&["example.com"])),
        Box::new(ScriptedResolver::sharing_counters_with(&resolver)),
        Box::new(RecordingFirewall::sharing_counters_with(&firewall)),
        test_engine_config(),
    )
    .expect("engine construction succeeds");

    let first = engine.reconcile().await.expect("first cycle runs");
    let second = engine.reconcile().await.expect("second cycle runs");

    assert_eq!(first.apply, ApplyOutcome::Applied);
    assert_eq!(second.apply, ApplyOutcome::Unchanged);
    assert!(second.is_success());
    assert_eq!(
        firewall.apply_count(),
        1,
        "Expected 1 apply for 2 identical cycles, got {}",
        firewall.apply_count()
    );
    assert_eq!(resolver.call_count(), 2, "every cycle still resolves");

    drop(engine);
    let events = collect_events(event_rx).await;
    assert!(events.contains(&ReconcileEvent::ApplySkipped { addresses: 1 }));
}

#[tokio::test]
async fn changed_answer_is_applied() {
    let resolver = ScriptedResolver::new();
    resolver.answer("example.com", &["192.0.2.1"], &[]);
    let firewall = RecordingFirewall::new();

    let (engine, _event_rx) = Reconciler::new(
        Arc::new(store_with(&["example.com"])),
        Box::new(ScriptedResolver::sharing_counters_with(&resolver)),
        Box::new(RecordingFirewall::sharing_counters_with(&firewall)),
        test_engine_config(),
    )
    .expect("engine construction succeeds");

    engine.reconcile().await.expect("first cycle runs");

    // Record rotated
    resolver.answer("example.com", &["192.0.2.2"], &[]);
    let report = engine.reconcile().await.expect("second cycle runs");

    assert_eq!(report.apply, ApplyOutcome::Applied);
    assert_eq!(firewall.apply_count(), 2);
    assert_eq!(firewall.last_applied(), Some(set_of(&["192.0.2.2"])));
}

#[tokio::test]
async fn failed_apply_is_retried_next_cycle() {
    let resolver = ScriptedResolver::new();
    resolver.answer("example.com", &["192.0.2.1"], &[]);
    let firewall = RecordingFirewall::new();
    firewall.set_failing(true);

    let (engine, _event_rx) = Reconciler::new(
        Arc::new(store_with(&["example.com"])),
        Box::new(resolver),
        Box::new(RecordingFirewall::sharing_counters_with(&firewall)),
        test_engine_config(),
    )
    .expect("engine construction succeeds");

    let first = engine.reconcile().await.expect("first cycle runs");
    assert!(!first.is_success());

    firewall.set_failing(false);
    let second = engine.reconcile().await.expect("second cycle runs");

    assert_eq!(
        second.apply,
        ApplyOutcome::Applied,
        "same target must be applied again after a failure"
    );
    assert_eq!(firewall.apply_count(), 2);
}

#[tokio::test]
async fn fresh_engine_always_applies() {
    // A restarted daemon has no memory of what the firewall holds
    let resolver = ScriptedResolver::new();
    resolver.answer("example.com", &["192.0.2.1"], &[]);
    let firewall = RecordingFirewall::new();

    for _ in 0..2 {
        let (engine, _event_rx) = Reconciler::new(
            Arc::new(store_with(&["example.com"])),
            Box::new(ScriptedResolver::sharing_counters_with(&resolver)),
            Box::new(RecordingFirewall::sharing_counters_with(&firewall)),
            test_engine_config(),
        )
        .expect("engine construction succeeds");

        let report = engine.reconcile().await.expect("cycle runs");
        assert_eq!(report.apply, ApplyOutcome::Applied);
    }

    assert_eq!(firewall.apply_count(), 2);
}
