//! Plugin-based component registry
//!
//! The registry allows domain stores, resolvers, firewalls and route syncs
//! to be registered at startup, avoiding hardcoded if-else chains.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use wgdomain_core::registry::ComponentRegistry;
//! use wgdomain_core::config::FirewallConfig;
//!
//! // Memory and file stores are registered by default
//! let mut registry = ComponentRegistry::new();
//!
//! // Adapter crates add their own factories
//! wgdomain_linux::register(&mut registry);
//!
//! let firewall = registry.create_firewall(&FirewallConfig::default())?;
//! ```
//!
//! ## Registration
//!
//! Implementations should register themselves during initialization:
//!
//! ```rust,ignore
//! # use wgdomain_core::registry::ComponentRegistry;
//!
//! // In wgdomain-resolver-hickory crate
//! pub fn register(registry: &mut ComponentRegistry) {
//!     registry.register_resolver("hickory", Box::new(HickoryResolverFactory));
//! }
//! ```

use std::collections::HashMap;

use crate::config::{FirewallConfig, ResolverConfig, RouteSyncConfig, StoreConfig};
use crate::error::{Error, Result};
use crate::store::{FileDomainStoreFactory, MemoryDomainStoreFactory};
use crate::traits::{DomainStore, Firewall, Resolver, RouteSync};
use crate::traits::{DomainStoreFactory, FirewallFactory, ResolverFactory, RouteSyncFactory};

/// Registry for plugin-based component creation
///
/// The registry maintains maps of type names to factory objects, allowing
/// dynamic instantiation of components based on configuration. It is filled
/// once at startup, before anything is shared between tasks.
pub struct ComponentRegistry {
    /// Registered domain store factories
    stores: HashMap<String, Box<dyn DomainStoreFactory>>,

    /// Registered resolver factories
    resolvers: HashMap<String, Box<dyn ResolverFactory>>,

    /// Registered firewall factories
    firewalls: HashMap<String, Box<dyn FirewallFactory>>,

    /// Registered route sync factories
    route_syncs: HashMap<String, Box<dyn RouteSyncFactory>>,
}

impl ComponentRegistry {
    /// Create a registry with the built-in `memory` and `file` stores
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register_store("memory", Box::new(MemoryDomainStoreFactory));
        registry.register_store("file", Box::new(FileDomainStoreFactory));
        registry
    }

    /// Create a registry with nothing registered
    pub fn empty() -> Self {
        Self {
            stores: HashMap::new(),
            resolvers: HashMap::new(),
            firewalls: HashMap::new(),
            route_syncs: HashMap::new(),
        }
    }

    /// Register a domain store factory
    ///
    /// # Parameters
    ///
    /// - `name`: Store type name (e.g., "file", "memory")
    /// - `factory`: Factory object for creating store instances
    pub fn register_store(&mut self, name: impl Into<String>, factory: Box<dyn DomainStoreFactory>) {
        self.stores.insert(name.into(), factory);
    }

    /// Register a resolver factory
    ///
    /// # Parameters
    ///
    /// - `name`: Resolver type name (e.g., "hickory")
    /// - `factory`: Factory object for creating resolver instances
    pub fn register_resolver(&mut self, name: impl Into<String>, factory: Box<dyn ResolverFactory>) {
        self.resolvers.insert(name.into(), factory);
    }

    /// Register a firewall factory
    ///
    /// # Parameters
    ///
    /// - `name`: Firewall type name (e.g., "nftables")
    /// - `factory`: Factory object for creating firewall instances
    pub fn register_firewall(&mut self, name: impl Into<String>, factory: Box<dyn FirewallFactory>) {
        self.firewalls.insert(name.into(), factory);
    }

    /// Register a route sync factory
    pub fn register_route_sync(
        &mut self,
        name: impl Into<String>,
        factory: Box<dyn RouteSyncFactory>,
    ) {
        self.route_syncs.insert(name.into(), factory);
    }

    /// Create a domain store from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn DomainStore>)`: Created store instance
    /// - `Err(Error)`: If store type is not registered or creation fails
    pub async fn create_store(&self, config: &StoreConfig) -> Result<Box<dyn DomainStore>> {
        let store_type = config.type_name();
        let factory = self
            .stores
            .get(store_type)
            .ok_or_else(|| Error::config(format!("Unknown store type: {}", store_type)))?;

        factory.create(config).await
    }

    /// Create a resolver from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn Resolver>)`: Created resolver instance
    /// - `Err(Error)`: If resolver type is not registered or creation fails
    pub fn create_resolver(&self, config: &ResolverConfig) -> Result<Box<dyn Resolver>> {
        let resolver_type = config.type_name();
        let factory = self
            .resolvers
            .get(resolver_type)
            .ok_or_else(|| Error::config(format!("Unknown resolver type: {}", resolver_type)))?;

        factory.create(config)
    }

    /// Create a firewall from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn Firewall>)`: Created firewall instance
    /// - `Err(Error)`: If firewall type is not registered or creation fails
    pub fn create_firewall(&self, config: &FirewallConfig) -> Result<Box<dyn Firewall>> {
        let firewall_type = config.type_name();
        let factory = self
            .firewalls
            .get(firewall_type)
            .ok_or_else(|| Error::config(format!("Unknown firewall type: {}", firewall_type)))?;

        factory.create(config)
    }

    /// Create a route sync from configuration
    pub fn create_route_sync(&self, config: &RouteSyncConfig) -> Result<Box<dyn RouteSync>> {
        let sync_type = config.type_name();
        let factory = self
            .route_syncs
            .get(sync_type)
            .ok_or_else(|| Error::config(format!("Unknown route sync type: {}", sync_type)))?;

        factory.create(config)
    }

    /// Check if a store type is registered
    pub fn has_store(&self, name: &str) -> bool {
        self.stores.contains_key(name)
    }

    /// Check if a resolver type is registered
    pub fn has_resolver(&self, name: &str) -> bool {
        self.resolvers.contains_key(name)
    }

    /// Check if a firewall type is registered
    pub fn has_firewall(&self, name: &str) -> bool {
        self.firewalls.contains_key(name)
    }

    /// Check if a route sync type is registered
    pub fn has_route_sync(&self, name: &str) -> bool {
        self.route_syncs.contains_key(name)
    }
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new()
    }
}
