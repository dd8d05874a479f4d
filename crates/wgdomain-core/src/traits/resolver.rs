// # Resolver Trait
//
// Defines the interface for turning one domain name into its current
// IPv4 and IPv6 addresses.
//
// ## Implementations
//
// - hickory-resolver: `wgdomain-resolver-hickory` crate
//
// ## Usage
//
// ```rust,ignore
// use wgdomain_core::{Domain, Resolver};
// use std::time::Duration;
//
// let resolver = /* Resolver implementation */;
// let domain = Domain::parse("example.com")?;
// let addrs = resolver.resolve(&domain, Duration::from_secs(5)).await?;
// println!("{} v4, {} v6", addrs.ipv4.len(), addrs.ipv6.len());
// ```

use async_trait::async_trait;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::time::Duration;

use crate::domain::Domain;
use crate::error::ResolveError;

/// Addresses returned for a single domain
///
/// Either family may be empty; a lookup is only a failure when both are.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedAddresses {
    /// A records, in resolver order
    pub ipv4: Vec<Ipv4Addr>,
    /// AAAA records, in resolver order
    pub ipv6: Vec<Ipv6Addr>,
}

impl ResolvedAddresses {
    /// Create a result from both address families
    pub fn new(ipv4: Vec<Ipv4Addr>, ipv6: Vec<Ipv6Addr>) -> Self {
        Self { ipv4, ipv6 }
    }

    /// True if neither family produced an address
    pub fn is_empty(&self) -> bool {
        self.ipv4.is_empty() && self.ipv6.is_empty()
    }
}

/// Per-domain outcome of one reconciliation cycle
///
/// Produced once per domain per cycle and consumed immediately when the
/// target address set is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionResult {
    /// The domain that was looked up
    pub domain: Domain,
    /// IPv4 addresses (empty on failure)
    pub ipv4: Vec<Ipv4Addr>,
    /// IPv6 addresses (empty on failure)
    pub ipv6: Vec<Ipv6Addr>,
    /// Why resolution failed, if it did
    pub failure: Option<ResolveError>,
}

impl ResolutionResult {
    /// Build a result from a resolver answer
    ///
    /// An `Ok` answer with no addresses at all is recorded as
    /// [`ResolveError::NotFound`].
    pub fn from_lookup(
        domain: Domain,
        lookup: Result<ResolvedAddresses, ResolveError>,
    ) -> Self {
        match lookup {
            Ok(addrs) if !addrs.is_empty() => Self {
                domain,
                ipv4: addrs.ipv4,
                ipv6: addrs.ipv6,
                failure: None,
            },
            Ok(_) => Self::failed(domain, ResolveError::NotFound),
            Err(e) => Self::failed(domain, e),
        }
    }

    /// Build a failed result
    pub fn failed(domain: Domain, failure: ResolveError) -> Self {
        Self {
            domain,
            ipv4: Vec::new(),
            ipv6: Vec::new(),
            failure: Some(failure),
        }
    }

    /// True if at least one address was found
    pub fn is_resolved(&self) -> bool {
        self.failure.is_none() && !(self.ipv4.is_empty() && self.ipv6.is_empty())
    }
}

/// Trait for resolver client implementations
///
/// # Thread Safety
///
/// Implementations must be thread-safe; the engine calls `resolve`
/// concurrently for different domains on the same instance.
///
/// # Contract
///
/// - Issue both an A and an AAAA lookup for the domain.
/// - One empty family plus one non-empty family is a success.
/// - Return [`ResolveError::NotFound`] when the name has no addresses,
///   [`ResolveError::Timeout`] when `timeout` elapses, and
///   [`ResolveError::ResolverUnavailable`] on transport failures.
/// - No retries and no caching decisions beyond what the underlying
///   resolver does; the engine owns scheduling.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Resolve a domain to its current addresses
    ///
    /// # Parameters
    ///
    /// - `domain`: The validated domain name
    /// - `timeout`: Upper bound for the whole lookup (both families)
    ///
    /// # Returns
    ///
    /// - `Ok(ResolvedAddresses)`: At least one address in either family
    /// - `Err(ResolveError)`: No addresses, timeout, or transport failure
    async fn resolve(
        &self,
        domain: &Domain,
        timeout: Duration,
    ) -> Result<ResolvedAddresses, ResolveError>;

    /// Get the resolver name (for logging/debugging)
    fn resolver_name(&self) -> &'static str;
}

/// Helper trait for constructing resolvers from configuration
pub trait ResolverFactory: Send + Sync {
    /// Create a Resolver instance from configuration
    ///
    /// # Parameters
    ///
    /// - `config`: Resolver configuration
    ///
    /// # Returns
    ///
    /// A boxed Resolver trait object
    fn create(
        &self,
        config: &crate::config::ResolverConfig,
    ) -> Result<Box<dyn Resolver>, crate::Error>;
}
