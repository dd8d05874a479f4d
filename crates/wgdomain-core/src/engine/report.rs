//! Cycle summaries returned by the engine

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::ApplyError;
use crate::traits::{AddressSet, ResolutionResult};

/// Summary of one reconciliation cycle
///
/// Serializes to the `stats` object of the update endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpdateStats {
    /// Domains in the snapshot
    pub domains_processed: usize,
    /// Domains with at least one address
    pub domains_resolved: usize,
    /// Distinct IPv4 addresses in the target set
    pub ipv4_count: usize,
    /// Distinct IPv6 addresses in the target set
    pub ipv6_count: usize,
    /// Domains that failed resolution, in snapshot order
    pub failed_domains: Vec<String>,
}

/// What happened at the apply stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The firewall now holds the new target set
    Applied,
    /// The target equals the last applied set; the firewall was not touched
    Unchanged,
    /// The firewall rejected the swap; the previous set is still active
    Failed(ApplyError),
}

/// What happened at the route sync stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteSyncOutcome {
    /// Routes now match the applied set
    Synced,
    /// Routes already matched the applied set
    Unchanged,
    /// Route sync failed; the firewall swap still stands
    Failed(String),
}

/// Everything a caller may want to know about a finished cycle
#[derive(Debug, Clone)]
pub struct CycleReport {
    /// Counts and failed domains
    pub stats: UpdateStats,
    /// Per-domain outcomes in snapshot order
    pub results: Vec<ResolutionResult>,
    /// The address set the cycle tried to apply
    pub target: AddressSet,
    /// Apply stage outcome
    pub apply: ApplyOutcome,
    /// Route sync outcome, when a route sync is configured and apply succeeded
    pub route_sync: Option<RouteSyncOutcome>,
    /// When the cycle acquired the engine
    pub started_at: DateTime<Utc>,
    /// When the cycle finished
    pub finished_at: DateTime<Utc>,
}

impl CycleReport {
    /// True unless the firewall rejected the new set
    pub fn is_success(&self) -> bool {
        !matches!(self.apply, ApplyOutcome::Failed(_))
    }

    /// The apply error, if the cycle failed
    pub fn apply_error(&self) -> Option<&ApplyError> {
        match &self.apply {
            ApplyOutcome::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// Build the target set and stats from per-domain results
///
/// The target is the union of every resolved domain's addresses; failed
/// domains contribute nothing, so whatever they resolved to before drops
/// out of the firewall.
pub fn aggregate(results: &[ResolutionResult]) -> (AddressSet, UpdateStats) {
    let mut target = AddressSet::new();
    let mut stats = UpdateStats {
        domains_processed: results.len(),
        ..UpdateStats::default()
    };

    for result in results {
        if result.is_resolved() {
            target.extend(result.ipv4.iter().copied(), result.ipv6.iter().copied());
            stats.domains_resolved += 1;
        } else {
            stats.failed_domains.push(result.domain.to_string());
        }
    }

    stats.ipv4_count = target.ipv4().len();
    stats.ipv6_count = target.ipv6().len();

    (target, stats)
}
