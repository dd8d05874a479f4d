// # Firewall Trait
//
// Defines the interface for swapping the managed address sets in the
// host packet filter.
//
// ## Implementations
//
// - nftables: `wgdomain-linux` crate
//
// ## Usage
//
// ```rust,ignore
// use wgdomain_core::{AddressSet, Firewall};
//
// let firewall = /* Firewall implementation */;
//
// let mut target = AddressSet::new();
// target.insert("203.0.113.5".parse()?);
//
// // Either the whole set is swapped in or nothing changes
// firewall.apply(&target).await?;
// ```

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::error::ApplyError;

/// Target state of the managed firewall sets
///
/// Both families are kept sorted and de-duplicated, so the same addresses
/// always render to the same ruleset regardless of resolution order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct AddressSet {
    ipv4: BTreeSet<Ipv4Addr>,
    ipv6: BTreeSet<Ipv6Addr>,
}

impl AddressSet {
    /// Create an empty address set
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a single address
    pub fn insert(&mut self, addr: IpAddr) {
        match addr {
            IpAddr::V4(v4) => {
                self.ipv4.insert(v4);
            }
            IpAddr::V6(v6) => {
                self.ipv6.insert(v6);
            }
        }
    }

    /// Add every address from one domain's answer
    pub fn extend(
        &mut self,
        ipv4: impl IntoIterator<Item = Ipv4Addr>,
        ipv6: impl IntoIterator<Item = Ipv6Addr>,
    ) {
        self.ipv4.extend(ipv4);
        self.ipv6.extend(ipv6);
    }

    /// IPv4 members in ascending order
    pub fn ipv4(&self) -> &BTreeSet<Ipv4Addr> {
        &self.ipv4
    }

    /// IPv6 members in ascending order
    pub fn ipv6(&self) -> &BTreeSet<Ipv6Addr> {
        &self.ipv6
    }

    /// Total number of addresses across both families
    pub fn len(&self) -> usize {
        self.ipv4.len() + self.ipv6.len()
    }

    /// True if the set holds no addresses
    pub fn is_empty(&self) -> bool {
        self.ipv4.is_empty() && self.ipv6.is_empty()
    }

    /// True if `addr` is a member
    pub fn contains(&self, addr: &IpAddr) -> bool {
        match addr {
            IpAddr::V4(v4) => self.ipv4.contains(v4),
            IpAddr::V6(v6) => self.ipv6.contains(v6),
        }
    }

    /// Iterate all members, IPv4 first
    pub fn iter(&self) -> impl Iterator<Item = IpAddr> + '_ {
        self.ipv4
            .iter()
            .copied()
            .map(IpAddr::V4)
            .chain(self.ipv6.iter().copied().map(IpAddr::V6))
    }
}

impl FromIterator<IpAddr> for AddressSet {
    fn from_iter<T: IntoIterator<Item = IpAddr>>(iter: T) -> Self {
        let mut set = Self::new();
        for addr in iter {
            set.insert(addr);
        }
        set
    }
}

/// Trait for firewall adapter implementations
///
/// # Thread Safety
///
/// Implementations must be thread-safe, but the engine never calls
/// `apply` from two cycles at once.
///
/// # Contract
///
/// - Replace the managed sets wholesale; never merge with what is there.
/// - The swap is atomic: the packet filter observes either the old or the
///   new contents, never a mix.
/// - On error the previously active ruleset stays in force.
/// - The empty set is valid and clears every managed entry.
/// - No retries; the next cycle is the retry.
#[async_trait]
pub trait Firewall: Send + Sync {
    /// Atomically replace the managed address sets
    ///
    /// # Parameters
    ///
    /// - `addresses`: The complete target state
    ///
    /// # Returns
    ///
    /// - `Ok(())`: The new sets are active
    /// - `Err(ApplyError)`: Nothing changed
    async fn apply(&self, addresses: &AddressSet) -> Result<(), ApplyError>;

    /// Get the firewall backend name (for logging/debugging)
    fn firewall_name(&self) -> &'static str;
}

/// Helper trait for constructing firewalls from configuration
pub trait FirewallFactory: Send + Sync {
    /// Create a Firewall instance from configuration
    ///
    /// # Parameters
    ///
    /// - `config`: Firewall configuration
    ///
    /// # Returns
    ///
    /// A boxed Firewall trait object
    fn create(
        &self,
        config: &crate::config::FirewallConfig,
    ) -> Result<Box<dyn Firewall>, crate::Error>;
}
