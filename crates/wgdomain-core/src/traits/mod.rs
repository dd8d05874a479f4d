//! Core traits for the wgdomain system
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`DomainStore`]: The operator-curated domain allowlist
//! - [`Resolver`]: Resolve one domain to IPv4/IPv6 addresses
//! - [`Firewall`]: Atomically replace the managed firewall address sets
//! - [`RouteSync`]: Best-effort propagation of the applied set

pub mod domain_store;
pub mod firewall;
pub mod resolver;
pub mod route_sync;

pub use domain_store::{DomainStore, DomainStoreFactory};
pub use firewall::{AddressSet, Firewall, FirewallFactory};
pub use resolver::{ResolutionResult, ResolvedAddresses, Resolver, ResolverFactory};
pub use route_sync::{RouteSync, RouteSyncFactory};
