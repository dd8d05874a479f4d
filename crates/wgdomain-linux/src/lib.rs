// # Linux Adapters
//
// This crate provides the OS-facing components of the wgdomain system:
//
// - [`NftablesFirewall`]: atomically replaces named nftables address sets
// - [`WireGuardRouteSync`]: mirrors the applied set into a peer's AllowedIPs
//
// Both shell out to the standard userspace tools (`nft`, `wg`) rather than
// speaking netlink directly; the tools already implement the kernel
// transaction semantics the engine relies on.
//
// ## Architectural Constraints
//
// Adapters are single-shot:
// - No retry logic (the next cycle is the retry)
// - No scheduling decisions (owned by the Reconciler)
// - No state beyond a single call
// - No background tasks

pub mod nftables;
pub mod wireguard;

pub use nftables::{NftablesFactory, NftablesFirewall};
pub use wireguard::{WireGuardFactory, WireGuardRouteSync};

use wgdomain_core::registry::ComponentRegistry;

/// Register the Linux adapters with a registry
///
/// # Example
///
/// ```rust
/// use wgdomain_core::ComponentRegistry;
///
/// let mut registry = ComponentRegistry::new();
/// wgdomain_linux::register(&mut registry);
/// assert!(registry.has_firewall("nftables"));
/// ```
pub fn register(registry: &mut ComponentRegistry) {
    registry.register_firewall("nftables", Box::new(NftablesFactory));
    registry.register_route_sync("wireguard", Box::new(WireGuardFactory));
}
