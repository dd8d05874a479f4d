//! Architectural Contract Test: Cycle Concurrency & Timeouts
//!
//! This test verifies the engine's concurrency limits.
//!
//! Constraints verified:
//! - At most one cycle runs at a time; extra triggers are rejected
//! - Resolution fan-out never exceeds the configured concurrency
//! - A hung lookup is cut off by the per-domain timeout
//! - A spawned cycle completes even if nobody awaits it
//!
//! If this test fails, someone has added:
//! - Queuing or parallel cycles
//! - Unbounded resolver fan-out
//! - A lookup path without a timeout

mod common;

use common::*;
use std::sync::Arc;
use std::time::{Duration, Instant};
use wgdomain_core::{EngineConfig, Error, ReconcileEvent, Reconciler, ResolveError};

#[tokio::test]
async fn concurrent_trigger_is_rejected() {
    let resolver = ScriptedResolver::new();
    resolver.answer("example.com", &["192.0.2.1"], &[]);
    let firewall = RecordingFirewall::new();
    firewall.set_delay(Duration::from_millis(200));

    let (engine, event_rx) = Reconciler::new(
        Arc::new(store_with(&["example.com"])),
        Box::new(resolver),
        Box::new(RecordingFirewall::sharing_counters_with(&firewall)),
        test_engine_config(),
    )
    .expect("engine construction succeeds");
    let engine = Arc::new(engine);

    let first = engine.spawn_reconcile();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(engine.is_busy());
    let second = engine.reconcile().await;
    assert!(
        matches!(second, Err(Error::CycleInProgress)),
        "second trigger must be rejected"
    );

    let report = first.await.unwrap().expect("first cycle runs");
    assert!(report.is_success());
    assert_eq!(firewall.apply_count(), 1, "rejected trigger never reached the firewall");
    assert!(!engine.is_busy());

    drop(engine);
    let events = collect_events(event_rx).await;
    assert!(events.contains(&ReconcileEvent::CycleRejected));
}

#[tokio::test]
async fn resolution_fan_out_is_bounded() {
    let names: Vec<String> = (0..12).map(|i| format!("host{}.example", i)).collect();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();

    let resolver = ScriptedResolver::new();
    for name in &refs {
        resolver.answer(name, &["192.0.2.1"], &[]);
        resolver.delay(name, Duration::from_millis(30));
    }

    let config = EngineConfig {
        resolve_concurrency: 3,
        ..test_engine_config()
    };
    let (engine, _event_rx) = Reconciler::new(
        Arc::new(store_with(&refs)),
        Box::new(ScriptedResolver::sharing_counters_with(&resolver)),
        Box::new(RecordingFirewall::new()),
        config,
    )
    .expect("engine construction succeeds");

    let report = engine.reconcile().await.expect("cycle runs");

    assert_eq!(report.stats.domains_resolved, 12);
    assert_eq!(resolver.call_count(), 12);
    assert!(
        resolver.max_in_flight() <= 3,
        "Expected at most 3 concurrent lookups, saw {}",
        resolver.max_in_flight()
    );
    assert!(resolver.max_in_flight() > 1, "lookups should overlap");
}

#[tokio::test]
async fn hung_lookup_times_out() {
    let resolver = ScriptedResolver::new();
    resolver.answer("hung.example", &["192.0.2.66"], &[]);
    resolver.delay("hung.example", Duration::from_secs(30));
    resolver.answer("ok.example", &["192.0.2.1"], &[]);
    let firewall = RecordingFirewall::new();

    let (engine, _event_rx) = Reconciler::new(
        Arc::new(store_with(&["hung.example", "ok.example"])),
        Box::new(resolver),
        Box::new(RecordingFirewall::sharing_counters_with(&firewall)),
        test_engine_config(),
    )
    .expect("engine construction succeeds");

    let started = Instant::now();
    let report = engine.reconcile().await.expect("cycle runs");

    assert!(
        started.elapsed() < Duration::from_secs(5),
        "cycle should be bounded by the resolve timeout"
    );
    assert_eq!(report.results[0].failure, Some(ResolveError::Timeout));
    assert_eq!(report.stats.failed_domains, vec!["hung.example"]);
    assert_eq!(firewall.last_applied(), Some(set_of(&["192.0.2.1"])));
}

#[tokio::test]
async fn spawned_cycle_finishes_without_awaiting() {
    let resolver = ScriptedResolver::new();
    resolver.answer("example.com", &["192.0.2.1"], &[]);
    let firewall = RecordingFirewall::new();
    firewall.set_delay(Duration::from_millis(50));

    let (engine, _event_rx) = Reconciler::new(
        Arc::new(store_with(&["example.com"])),
        Box::new(resolver),
        Box::new(RecordingFirewall::sharing_counters_with(&firewall)),
        test_engine_config(),
    )
    .expect("engine construction succeeds");
    let engine = Arc::new(engine);

    // Caller goes away immediately
    drop(engine.spawn_reconcile());

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(firewall.apply_count(), 1);
    assert!(!engine.is_busy());
}
