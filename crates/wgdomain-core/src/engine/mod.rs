//! Core reconciliation engine
//!
//! The Reconciler is responsible for:
//! - Taking a snapshot of the DomainStore
//! - Resolving every domain via the Resolver (bounded fan-out)
//! - Aggregating a target AddressSet and UpdateStats
//! - Swapping the target into the Firewall atomically
//! - Optionally pushing the applied set to a RouteSync
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐
//! │ DomainStore │─── snapshot ───┐
//! └─────────────┘                │
//!                                ▼
//!                       ┌──────────────┐
//!                       │  Reconciler  │
//!                       └──────────────┘
//!                                │
//!         ┌──────────────────────┼──────────────────────┐
//!         │                      │                      │
//!         ▼                      ▼                      ▼
//! ┌─────────────┐       ┌──────────────┐       ┌─────────────┐
//! │  Resolver   │       │   Firewall   │       │   Events    │
//! │ (fan-out)   │       │ (atomic swap)│       │  (notify)   │
//! └─────────────┘       └──────────────┘       └─────────────┘
//! ```
//!
//! ## Cycle Stages
//!
//! 1. Snapshot the store (an empty store yields an empty target)
//! 2. Resolve every domain concurrently, each bounded by the timeout
//! 3. Aggregate the union of resolved addresses, failures in snapshot order
//! 4. Apply the target unless it equals the last applied set
//! 5. Route sync, if configured and the apply stage did not fail

pub mod report;

pub use report::{ApplyOutcome, CycleReport, RouteSyncOutcome, UpdateStats, aggregate};

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::domain::Domain;
use crate::error::{Error, ResolveError, Result};
use crate::traits::{AddressSet, DomainStore, Firewall, ResolutionResult, Resolver, RouteSync};

/// Events emitted by the Reconciler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileEvent {
    /// A cycle took the engine and snapshotted the store
    CycleStarted {
        domains: usize,
    },

    /// A domain resolved to at least one address
    DomainResolved {
        domain: String,
        ipv4: usize,
        ipv6: usize,
    },

    /// A domain failed to resolve
    DomainFailed {
        domain: String,
        reason: String,
    },

    /// The firewall accepted the new set
    ApplySucceeded {
        ipv4: usize,
        ipv6: usize,
    },

    /// The target equals the last applied set
    ApplySkipped {
        addresses: usize,
    },

    /// The firewall rejected the new set
    ApplyFailed {
        error: String,
    },

    /// Route sync failed after a successful apply
    RouteSyncFailed {
        error: String,
    },

    /// A trigger arrived while another cycle was running
    CycleRejected,

    /// A cycle finished
    CycleFinished {
        success: bool,
    },

    /// The periodic loop stopped
    Stopped {
        reason: String,
    },
}

/// State carried from one cycle to the next
///
/// Guarded by the cycle lock, so only the running cycle can see it.
#[derive(Debug, Default)]
struct CycleState {
    /// Last set the firewall accepted
    applied: Option<AddressSet>,
    /// Last set the route sync accepted
    synced: Option<AddressSet>,
}

/// Core reconciliation engine
///
/// Keeps the firewall's managed address sets in step with the current DNS
/// answers for every domain in the store.
///
/// ## Lifecycle
///
/// 1. Create with [`Reconciler::new()`]
/// 2. Trigger cycles with [`Reconciler::reconcile()`] or
///    [`Reconciler::spawn_reconcile()`], or start
///    [`Reconciler::run_periodic()`]
///
/// ## Concurrency
///
/// Only one cycle runs at a time. A trigger that arrives while a cycle is
/// in flight is rejected with [`Error::CycleInProgress`]; it is never
/// queued and never runs alongside the current one.
pub struct Reconciler {
    /// Domain allowlist (shared with the administrative surface)
    store: Arc<dyn DomainStore>,

    /// Resolver client
    resolver: Box<dyn Resolver>,

    /// Firewall adapter
    firewall: Box<dyn Firewall>,

    /// Optional post-apply route sync
    route_sync: Option<Box<dyn RouteSync>>,

    /// Upper bound for resolving one domain
    resolve_timeout: Duration,

    /// Maximum concurrent resolutions
    resolve_concurrency: usize,

    /// Held for the whole of a cycle
    state: Mutex<CycleState>,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<ReconcileEvent>,
}

impl Reconciler {
    /// Create a new reconciler
    ///
    /// # Parameters
    ///
    /// - `store`: Domain store implementation
    /// - `resolver`: Resolver implementation
    /// - `firewall`: Firewall implementation
    /// - `config`: Engine configuration
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine events
    pub fn new(
        store: Arc<dyn DomainStore>,
        resolver: Box<dyn Resolver>,
        firewall: Box<dyn Firewall>,
        config: EngineConfig,
    ) -> Result<(Self, mpsc::Receiver<ReconcileEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);

        let engine = Self {
            store,
            resolver,
            firewall,
            route_sync: None,
            resolve_timeout: config.resolve_timeout(),
            resolve_concurrency: config.resolve_concurrency,
            state: Mutex::new(CycleState::default()),
            event_tx: tx,
        };

        Ok((engine, rx))
    }

    /// Attach a route sync that runs after every successful apply
    pub fn with_route_sync(mut self, route_sync: Box<dyn RouteSync>) -> Self {
        self.route_sync = Some(route_sync);
        self
    }

    /// The domain store this engine reads
    pub fn store(&self) -> &Arc<dyn DomainStore> {
        &self.store
    }

    /// True while a cycle holds the engine
    pub fn is_busy(&self) -> bool {
        self.state.try_lock().is_err()
    }

    /// Run one reconciliation cycle
    ///
    /// # Returns
    ///
    /// - `Ok(CycleReport)`: The cycle ran; check [`CycleReport::is_success`]
    ///   for the apply outcome
    /// - `Err(Error::CycleInProgress)`: Another cycle holds the engine
    /// - `Err(Error)`: The store could not be read
    pub async fn reconcile(&self) -> Result<CycleReport> {
        let Ok(mut state) = self.state.try_lock() else {
            warn!("Reconciliation already in progress, rejecting trigger");
            self.emit_event(ReconcileEvent::CycleRejected);
            return Err(Error::CycleInProgress);
        };

        let started_at = chrono::Utc::now();

        // Stage 1: snapshot
        let snapshot = self.store.list().await?;
        info!("Reconciliation started: {} domain(s)", snapshot.len());
        self.emit_event(ReconcileEvent::CycleStarted {
            domains: snapshot.len(),
        });

        // Stage 2: resolve
        let results = self.resolve_all(snapshot).await;

        // Stage 3: aggregate
        let (target, stats) = aggregate(&results);

        // Stage 4: apply
        let apply = self.apply_target(&mut state, &target).await;

        // Stage 5: route sync
        let route_sync = match apply {
            ApplyOutcome::Failed(_) => None,
            _ => self.sync_routes(&mut state, &target).await,
        };

        let report = CycleReport {
            stats,
            results,
            target,
            apply,
            route_sync,
            started_at,
            finished_at: chrono::Utc::now(),
        };

        if report.is_success() {
            info!(
                "Reconciliation finished: {}/{} resolved, {} IPv4, {} IPv6, {} failed",
                report.stats.domains_resolved,
                report.stats.domains_processed,
                report.stats.ipv4_count,
                report.stats.ipv6_count,
                report.stats.failed_domains.len()
            );
        } else {
            error!(
                "Reconciliation failed at apply stage: {}/{} resolved",
                report.stats.domains_resolved, report.stats.domains_processed
            );
        }
        self.emit_event(ReconcileEvent::CycleFinished {
            success: report.is_success(),
        });

        Ok(report)
    }

    /// Run one cycle on its own task
    ///
    /// The cycle runs to completion even if the returned handle is dropped,
    /// e.g. when the HTTP client that triggered it disconnects.
    pub fn spawn_reconcile(self: &Arc<Self>) -> JoinHandle<Result<CycleReport>> {
        let engine = Arc::clone(self);
        tokio::spawn(async move { engine.reconcile().await })
    }

    /// Run cycles on a fixed interval until `shutdown` resolves
    ///
    /// The first cycle runs immediately. Ticks that land while a manually
    /// triggered cycle is running are skipped. A cycle in progress when
    /// `shutdown` resolves is allowed to finish.
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Clean shutdown, store flushed
    /// - `Err(Error)`: The store could not be flushed
    pub async fn run_periodic<F>(&self, interval: Duration, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!("Periodic reconciliation every {:?}", interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.reconcile().await {
                        Ok(_) => {}
                        Err(Error::CycleInProgress) => {
                            debug!("Skipping scheduled cycle, one is already running");
                        }
                        Err(e) => {
                            error!("Scheduled reconciliation failed: {}", e);
                            // Keep running; the next tick may succeed
                        }
                    }
                }

                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    self.emit_event(ReconcileEvent::Stopped {
                        reason: "Shutdown signal".to_string(),
                    });
                    break;
                }
            }
        }

        self.store.flush().await?;
        info!("Domain store flushed, periodic reconciliation stopped");

        Ok(())
    }

    /// Resolve every domain, preserving snapshot order
    async fn resolve_all(&self, snapshot: Vec<Domain>) -> Vec<ResolutionResult> {
        let results: Vec<ResolutionResult> = stream::iter(snapshot)
            .map(|domain| self.resolve_one(domain))
            .buffered(self.resolve_concurrency)
            .collect()
            .await;

        for result in &results {
            match &result.failure {
                None => {
                    debug!(
                        "Resolved {}: {} IPv4, {} IPv6",
                        result.domain,
                        result.ipv4.len(),
                        result.ipv6.len()
                    );
                    self.emit_event(ReconcileEvent::DomainResolved {
                        domain: result.domain.to_string(),
                        ipv4: result.ipv4.len(),
                        ipv6: result.ipv6.len(),
                    });
                }
                Some(reason) => {
                    warn!("Failed to resolve {}: {}", result.domain, reason);
                    self.emit_event(ReconcileEvent::DomainFailed {
                        domain: result.domain.to_string(),
                        reason: reason.to_string(),
                    });
                }
            }
        }

        results
    }

    /// Resolve a single domain under the engine's own timeout
    ///
    /// The resolver is handed the same timeout, but the engine does not
    /// rely on it honoring it.
    async fn resolve_one(&self, domain: Domain) -> ResolutionResult {
        let lookup = match tokio::time::timeout(
            self.resolve_timeout,
            self.resolver.resolve(&domain, self.resolve_timeout),
        )
        .await
        {
            Ok(lookup) => lookup,
            Err(_) => Err(ResolveError::Timeout),
        };

        ResolutionResult::from_lookup(domain, lookup)
    }

    /// Swap the target into the firewall unless it is already there
    async fn apply_target(&self, state: &mut CycleState, target: &AddressSet) -> ApplyOutcome {
        if state.applied.as_ref() == Some(target) {
            debug!(
                "Target set unchanged ({} addresses), skipping apply",
                target.len()
            );
            self.emit_event(ReconcileEvent::ApplySkipped {
                addresses: target.len(),
            });
            return ApplyOutcome::Unchanged;
        }

        match self.firewall.apply(target).await {
            Ok(()) => {
                info!(
                    "Applied {} IPv4 and {} IPv6 addresses via {}",
                    target.ipv4().len(),
                    target.ipv6().len(),
                    self.firewall.firewall_name()
                );
                state.applied = Some(target.clone());
                self.emit_event(ReconcileEvent::ApplySucceeded {
                    ipv4: target.ipv4().len(),
                    ipv6: target.ipv6().len(),
                });
                ApplyOutcome::Applied
            }
            Err(e) => {
                error!(
                    "Firewall {} rejected new address set: {}",
                    self.firewall.firewall_name(),
                    e
                );
                self.emit_event(ReconcileEvent::ApplyFailed {
                    error: e.to_string(),
                });
                ApplyOutcome::Failed(e)
            }
        }
    }

    /// Push the applied set to the route sync, if one is configured
    async fn sync_routes(
        &self,
        state: &mut CycleState,
        target: &AddressSet,
    ) -> Option<RouteSyncOutcome> {
        let route_sync = self.route_sync.as_ref()?;

        if state.synced.as_ref() == Some(target) {
            return Some(RouteSyncOutcome::Unchanged);
        }

        match route_sync.sync(target).await {
            Ok(()) => {
                debug!("Route sync {} updated", route_sync.sync_name());
                state.synced = Some(target.clone());
                Some(RouteSyncOutcome::Synced)
            }
            Err(e) => {
                warn!("Route sync {} failed: {}", route_sync.sync_name(), e);
                self.emit_event(ReconcileEvent::RouteSyncFailed {
                    error: e.to_string(),
                });
                Some(RouteSyncOutcome::Failed(e.to_string()))
            }
        }
    }

    /// Emit an engine event
    ///
    /// # Parameters
    ///
    /// - `event`: The event to emit
    fn emit_event(&self, event: ReconcileEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                // Nobody is listening
            }
        }
    }
}
