// # wgdomain-core
//
// Core library for the domain allowlist reconciler.
//
// ## Architecture Overview
//
// This library keeps a firewall's managed address sets equal to the
// current DNS answers for an operator-curated list of domains:
// - **DomainStore**: Trait for the persisted domain allowlist
// - **Resolver**: Trait for resolving one domain to IPv4/IPv6 addresses
// - **Firewall**: Trait for atomically replacing the managed address sets
// - **RouteSync**: Trait for best-effort post-apply route updates
// - **Reconciler**: Core engine running snapshot → resolve → aggregate → apply
// - **ComponentRegistry**: Plugin-based registry for all of the above
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from OS adapters
// 2. **Plugin-Based**: Components are registered dynamically, no hard-coded if-else
// 3. **Library-First**: All core functionality can be used as a library
// 4. **Atomic Apply**: The firewall never observes a half-updated set

pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod registry;
pub mod store;
pub mod traits;

// Re-export core types for convenience
pub use config::{
    EngineConfig, FirewallConfig, ResolverConfig, RouteSyncConfig, StoreConfig, WgDomainConfig,
};
pub use domain::{AddOutcome, Domain, RemoveOutcome};
pub use engine::{
    ApplyOutcome, CycleReport, ReconcileEvent, Reconciler, RouteSyncOutcome, UpdateStats,
};
pub use error::{ApplyError, Error, ResolveError, Result};
pub use registry::ComponentRegistry;
pub use store::{FileDomainStore, MemoryDomainStore};
pub use traits::{
    AddressSet, DomainStore, Firewall, ResolutionResult, ResolvedAddresses, Resolver, RouteSync,
};
