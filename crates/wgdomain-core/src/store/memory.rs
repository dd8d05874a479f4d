// # Memory Domain Store
//
// In-memory implementation of DomainStore.
//
// ## Purpose
//
// Provides a simple, fast store that doesn't persist across restarts.
// Useful for testing and for deployments where the allowlist is seeded
// through the administrative surface on every start.
//
// ## Crash Behavior
//
// - All domains are lost on restart/crash
// - The next reconciliation after a restart applies an empty set
//   (clearing the managed firewall entries) until domains are re-added

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::{AddOutcome, Domain, RemoveOutcome};
use crate::traits::domain_store::{DomainStore, DomainStoreFactory};
use crate::Error;

/// In-memory domain store implementation
///
/// Domains are kept in a `Vec` (insertion order) behind a RwLock.
///
/// # Example
///
/// ```rust,no_run
/// use wgdomain_core::store::MemoryDomainStore;
/// use wgdomain_core::{AddOutcome, DomainStore};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryDomainStore::new();
///
///     assert_eq!(store.add("example.com").await?, AddOutcome::Added);
///     assert_eq!(store.list().await?.len(), 1);
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryDomainStore {
    inner: Arc<RwLock<Vec<Domain>>>,
}

impl MemoryDomainStore {
    /// Create a new empty memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with domains (duplicates collapsed)
    pub fn with_domains(domains: impl IntoIterator<Item = Domain>) -> Self {
        let mut list: Vec<Domain> = Vec::new();
        for domain in domains {
            if !list.contains(&domain) {
                list.push(domain);
            }
        }
        Self {
            inner: Arc::new(RwLock::new(list)),
        }
    }

    /// Get the number of domains in the store
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Check if the store is empty
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    /// Remove every domain
    pub async fn clear(&self) {
        self.inner.write().await.clear();
    }
}

#[async_trait]
impl DomainStore for MemoryDomainStore {
    async fn insert(&self, domain: Domain) -> Result<AddOutcome, Error> {
        let mut guard = self.inner.write().await;
        if guard.contains(&domain) {
            return Ok(AddOutcome::AlreadyExists);
        }
        guard.push(domain);
        Ok(AddOutcome::Added)
    }

    async fn remove(&self, name: &str) -> Result<RemoveOutcome, Error> {
        let mut guard = self.inner.write().await;
        match guard.iter().position(|d| d.as_str() == name) {
            Some(index) => {
                guard.remove(index);
                Ok(RemoveOutcome::Removed)
            }
            None => Ok(RemoveOutcome::NotFound),
        }
    }

    async fn list(&self) -> Result<Vec<Domain>, Error> {
        Ok(self.inner.read().await.clone())
    }
}

/// Factory for the `memory` store type
pub struct MemoryDomainStoreFactory;

#[async_trait]
impl DomainStoreFactory for MemoryDomainStoreFactory {
    async fn create(
        &self,
        _config: &crate::config::StoreConfig,
    ) -> Result<Box<dyn DomainStore>, Error> {
        Ok(Box::new(MemoryDomainStore::new()))
    }
}
