//! Test doubles and common utilities for reconciliation contract tests
//!
//! This module provides minimal test doubles that record how the engine
//! drives them without touching DNS or the kernel.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use wgdomain_core::error::Result;
use wgdomain_core::{
    AddressSet, ApplyError, Domain, EngineConfig, Firewall, MemoryDomainStore, ReconcileEvent,
    ResolveError, ResolvedAddresses, Resolver, RouteSync,
};

/// One scripted answer
#[derive(Clone)]
struct Answer {
    result: std::result::Result<ResolvedAddresses, ResolveError>,
    delay: Duration,
}

/// A Resolver whose answers are set by the test
///
/// Domains without a scripted answer resolve to `NotFound`.
pub struct ScriptedResolver {
    answers: Arc<Mutex<HashMap<String, Answer>>>,
    /// Call counter for resolve()
    call_count: Arc<AtomicUsize>,
    /// Lookups currently running
    in_flight: Arc<AtomicUsize>,
    /// Highest value `in_flight` reached
    max_in_flight: Arc<AtomicUsize>,
}

impl ScriptedResolver {
    pub fn new() -> Self {
        Self {
            answers: Arc::new(Mutex::new(HashMap::new())),
            call_count: Arc::new(AtomicUsize::new(0)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Script a successful answer
    pub fn answer(&self, domain: &str, ipv4: &[&str], ipv6: &[&str]) {
        let addresses = ResolvedAddresses::new(
            ipv4.iter().map(|s| s.parse::<Ipv4Addr>().unwrap()).collect(),
            ipv6.iter().map(|s| s.parse::<Ipv6Addr>().unwrap()).collect(),
        );
        self.script(domain, Ok(addresses), Duration::ZERO);
    }

    /// Script a failure
    pub fn fail(&self, domain: &str, error: ResolveError) {
        self.script(domain, Err(error), Duration::ZERO);
    }

    /// Delay the scripted answer for a domain
    pub fn delay(&self, domain: &str, delay: Duration) {
        let mut answers = self.answers.lock().unwrap();
        let answer = answers.entry(domain.to_string()).or_insert(Answer {
            result: Err(ResolveError::NotFound),
            delay: Duration::ZERO,
        });
        answer.delay = delay;
    }

    fn script(
        &self,
        domain: &str,
        result: std::result::Result<ResolvedAddresses, ResolveError>,
        delay: Duration,
    ) {
        self.answers
            .lock()
            .unwrap()
            .insert(domain.to_string(), Answer { result, delay });
    }

    /// Get the number of times resolve() was called
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Get the highest number of concurrent lookups observed
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Create a new ScriptedResolver that shares answers and counters with an existing one
    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            answers: Arc::clone(&other.answers),
            call_count: Arc::clone(&other.call_count),
            in_flight: Arc::clone(&other.in_flight),
            max_in_flight: Arc::clone(&other.max_in_flight),
        }
    }
}

#[async_trait]
impl Resolver for ScriptedResolver {
    async fn resolve(
        &self,
        domain: &Domain,
        _timeout: Duration,
    ) -> std::result::Result<ResolvedAddresses, ResolveError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let answer = self
            .answers
            .lock()
            .unwrap()
            .get(domain.as_str())
            .cloned()
            .unwrap_or(Answer {
                result: Err(ResolveError::NotFound),
                delay: Duration::ZERO,
            });

        if !answer.delay.is_zero() {
            tokio::time::sleep(answer.delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        answer.result
    }

    fn resolver_name(&self) -> &'static str {
        "scripted"
    }
}

/// A Firewall that records every applied set
pub struct RecordingFirewall {
    /// Every set passed to apply(), accepted or not
    applied: Arc<Mutex<Vec<AddressSet>>>,
    /// Reject every apply while set
    failing: Arc<AtomicBool>,
    /// Milliseconds each apply takes
    delay_ms: Arc<AtomicU64>,
}

impl RecordingFirewall {
    pub fn new() -> Self {
        Self {
            applied: Arc::new(Mutex::new(Vec::new())),
            failing: Arc::new(AtomicBool::new(false)),
            delay_ms: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Get the number of times apply() was called
    pub fn apply_count(&self) -> usize {
        self.applied.lock().unwrap().len()
    }

    /// Get the set passed to the most recent apply()
    pub fn last_applied(&self) -> Option<AddressSet> {
        self.applied.lock().unwrap().last().cloned()
    }

    /// Make subsequent applies fail (or succeed again)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Make every apply take this long
    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Create a new RecordingFirewall that shares counters with an existing one
    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            applied: Arc::clone(&other.applied),
            failing: Arc::clone(&other.failing),
            delay_ms: Arc::clone(&other.delay_ms),
        }
    }
}

#[async_trait]
impl Firewall for RecordingFirewall {
    async fn apply(&self, addresses: &AddressSet) -> std::result::Result<(), ApplyError> {
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        self.applied.lock().unwrap().push(addresses.clone());

        if self.failing.load(Ordering::SeqCst) {
            return Err(ApplyError::rejected("Error: Could not process rule"));
        }
        Ok(())
    }

    fn firewall_name(&self) -> &'static str {
        "recording"
    }
}

/// A RouteSync that records every synced set
pub struct RecordingRouteSync {
    synced: Arc<Mutex<Vec<AddressSet>>>,
    failing: Arc<AtomicBool>,
}

impl RecordingRouteSync {
    pub fn new() -> Self {
        Self {
            synced: Arc::new(Mutex::new(Vec::new())),
            failing: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Get the number of times sync() was called
    pub fn sync_count(&self) -> usize {
        self.synced.lock().unwrap().len()
    }

    /// Make subsequent syncs fail (or succeed again)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Create a new RecordingRouteSync that shares counters with an existing one
    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            synced: Arc::clone(&other.synced),
            failing: Arc::clone(&other.failing),
        }
    }
}

#[async_trait]
impl RouteSync for RecordingRouteSync {
    async fn sync(&self, addresses: &AddressSet) -> Result<()> {
        self.synced.lock().unwrap().push(addresses.clone());
        if self.failing.load(Ordering::SeqCst) {
            return Err(wgdomain_core::Error::Other("wg: Unable to modify interface".to_string()));
        }
        Ok(())
    }

    fn sync_name(&self) -> &'static str {
        "recording"
    }
}

/// Engine settings tuned for fast tests
pub fn test_engine_config() -> EngineConfig {
    EngineConfig {
        resolve_timeout_ms: 200,
        resolve_concurrency: 4,
        event_channel_capacity: 100,
        update_interval_secs: None,
    }
}

/// Memory store seeded with the given domains
pub fn store_with(domains: &[&str]) -> MemoryDomainStore {
    MemoryDomainStore::with_domains(domains.iter().map(|d| Domain::parse(d).unwrap()))
}

/// Build an AddressSet from address literals
pub fn set_of(addresses: &[&str]) -> AddressSet {
    addresses.iter().map(|a| a.parse().unwrap()).collect()
}

/// Collect every event once the engine has been dropped
pub async fn collect_events(rx: mpsc::Receiver<ReconcileEvent>) -> Vec<ReconcileEvent> {
    ReceiverStream::new(rx).collect().await
}
