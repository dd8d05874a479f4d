// # Route Sync Trait
//
// Optional sink that receives the applied address set after the firewall
// swap, e.g. to keep a tunnel peer's allowed addresses in step with the
// allowlist.
//
// ## Implementations
//
// - WireGuard AllowedIPs: `wgdomain-linux` crate
//
// Route sync is best-effort. The firewall set is authoritative and has
// already been swapped when `sync` runs, so a failure here is reported
// but does not fail the cycle.

use async_trait::async_trait;

use crate::traits::firewall::AddressSet;

/// Trait for post-apply route synchronization
#[async_trait]
pub trait RouteSync: Send + Sync {
    /// Push the applied address set to the routing layer
    ///
    /// # Parameters
    ///
    /// - `addresses`: The set that is now active in the firewall
    async fn sync(&self, addresses: &AddressSet) -> Result<(), crate::Error>;

    /// Get the route sync name (for logging/debugging)
    fn sync_name(&self) -> &'static str;
}

/// Helper trait for constructing route syncs from configuration
pub trait RouteSyncFactory: Send + Sync {
    /// Create a RouteSync instance from configuration
    fn create(
        &self,
        config: &crate::config::RouteSyncConfig,
    ) -> Result<Box<dyn RouteSync>, crate::Error>;
}
