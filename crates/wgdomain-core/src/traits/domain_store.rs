// # Domain Store Trait
//
// Defines the interface for the operator-curated domain allowlist.
//
// ## Purpose
//
// The store is the only input to a reconciliation cycle. It holds an
// insertion-ordered set of validated domains and is mutated only through
// `add` / `remove`. The engine reads it once per cycle via `list`, which
// returns a point-in-time copy.
//
// ## Implementations
//
// - In-memory: `MemoryDomainStore`
// - Line-per-domain file: `FileDomainStore`
//
// ## Usage
//
// ```rust,ignore
// use wgdomain_core::{AddOutcome, DomainStore};
//
// let store = /* DomainStore implementation */;
//
// assert_eq!(store.add("example.com").await?, AddOutcome::Added);
// assert_eq!(store.add("example.com").await?, AddOutcome::AlreadyExists);
//
// let snapshot = store.list().await?;
// ```

use async_trait::async_trait;

use crate::domain::{AddOutcome, Domain, RemoveOutcome};

/// Trait for domain store implementations
///
/// # Thread Safety
///
/// All methods must be safe to call concurrently. Writers (`insert`,
/// `remove`) are mutually exclusive with each other and with `list`, so
/// a snapshot never observes a half-applied mutation.
///
/// # Outcomes vs errors
///
/// Adding a domain that is already present, or removing one that is not,
/// is a no-op reported through [`AddOutcome`] / [`RemoveOutcome`]. Errors
/// are reserved for invalid input and storage failures.
#[async_trait]
pub trait DomainStore: Send + Sync {
    /// Validate and add a domain
    ///
    /// # Parameters
    ///
    /// - `name`: Candidate domain name
    ///
    /// # Returns
    ///
    /// - `Ok(AddOutcome::Added)`: Inserted at the end of the list
    /// - `Ok(AddOutcome::AlreadyExists)`: Already present, nothing changed
    /// - `Err(Error::InvalidFormat)`: `name` is not a valid domain
    /// - `Err(Error)`: Storage error
    async fn add(&self, name: &str) -> Result<AddOutcome, crate::Error> {
        let domain = Domain::parse(name)?;
        self.insert(domain).await
    }

    /// Insert an already validated domain
    ///
    /// Stores must preserve insertion order and reject duplicates with
    /// [`AddOutcome::AlreadyExists`].
    async fn insert(&self, domain: Domain) -> Result<AddOutcome, crate::Error>;

    /// Remove a domain
    ///
    /// # Parameters
    ///
    /// - `name`: Domain name to remove
    ///
    /// # Returns
    ///
    /// - `Ok(RemoveOutcome::Removed)`: Deleted
    /// - `Ok(RemoveOutcome::NotFound)`: Not present, nothing changed
    /// - `Err(Error)`: Storage error
    async fn remove(&self, name: &str) -> Result<RemoveOutcome, crate::Error>;

    /// Snapshot of all domains in insertion order
    async fn list(&self) -> Result<Vec<Domain>, crate::Error>;

    /// Persist any pending changes
    ///
    /// Stores that write through on every mutation can rely on the default.
    async fn flush(&self) -> Result<(), crate::Error> {
        Ok(())
    }
}

/// Helper trait for constructing domain stores from configuration
#[async_trait]
pub trait DomainStoreFactory: Send + Sync {
    /// Create a DomainStore instance from configuration
    ///
    /// # Parameters
    ///
    /// - `config`: Store configuration
    ///
    /// # Returns
    ///
    /// A boxed DomainStore trait object
    async fn create(
        &self,
        config: &crate::config::StoreConfig,
    ) -> Result<Box<dyn DomainStore>, crate::Error>;
}
