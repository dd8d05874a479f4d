// # hickory Resolver
//
// This crate provides the DNS resolver client for the wgdomain system,
// built on hickory-resolver.
//
// ## Behavior
//
// - A and AAAA lookups are issued concurrently for every domain
// - One family answering is enough; the other may be empty or fail
// - The whole lookup is bounded by the timeout the engine passes in
// - hickory's own per-request timeout is sized so its retries fit that budget
// - A nameserver that never answers is a `Timeout`, not a transport failure
// - Nameservers come from the system configuration unless given explicitly
//
// ## Caching
//
// hickory keeps its own TTL-respecting cache. The engine never caches
// answers itself, so a record change is picked up once its TTL expires.

use hickory_resolver::config::{
    NameServerConfig, ResolveHosts, ResolverConfig as HickoryConfig, ResolverOpts,
};
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::proto::ProtoErrorKind;
use hickory_resolver::proto::xfer::Protocol;
use hickory_resolver::{ResolveError as HickoryError, Resolver as HickoryResolver, TokioResolver};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use wgdomain_core::config::ResolverConfig;
use wgdomain_core::registry::ComponentRegistry;
use wgdomain_core::traits::{ResolvedAddresses, Resolver, ResolverFactory};
use wgdomain_core::{Domain, Error, ResolveError, Result};

/// Attempts hickory makes per query before giving up
const REQUEST_ATTEMPTS: u32 = 2;

/// DNS resolver client backed by hickory-resolver
pub struct HickoryDnsResolver {
    /// The underlying hickory resolver (handles caching internally)
    resolver: TokioResolver,
}

impl HickoryDnsResolver {
    /// Create a resolver
    ///
    /// # Parameters
    ///
    /// - `nameservers`: Servers to query over UDP and TCP; the system
    ///   configuration (`/etc/resolv.conf`) when empty
    /// - `use_hosts_file`: Whether `/etc/hosts` entries are honored
    /// - `lookup_timeout`: Budget for one query across all of hickory's
    ///   attempts; normally the same timeout the engine passes to `resolve`
    pub fn new(
        nameservers: &[SocketAddr],
        use_hosts_file: bool,
        lookup_timeout: Duration,
    ) -> Result<Self> {
        let (config, mut opts) = if nameservers.is_empty() {
            hickory_resolver::system_conf::read_system_conf().map_err(|e| {
                Error::resolver(format!("Failed to read system resolver configuration: {}", e))
            })?
        } else {
            let mut config = HickoryConfig::new();
            for addr in nameservers {
                config.add_name_server(NameServerConfig::new(*addr, Protocol::Udp));
                config.add_name_server(NameServerConfig::new(*addr, Protocol::Tcp));
            }
            (config, ResolverOpts::default())
        };

        opts.use_hosts_file = if use_hosts_file {
            ResolveHosts::Auto
        } else {
            ResolveHosts::Never
        };
        opts.attempts = REQUEST_ATTEMPTS as usize;
        opts.timeout = request_timeout(lookup_timeout);

        tracing::debug!(
            "hickory resolver ready ({} explicit nameservers, hosts file: {}, {:?} x {} attempts)",
            nameservers.len(),
            use_hosts_file,
            opts.timeout,
            opts.attempts
        );

        let resolver = HickoryResolver::builder_with_config(config, TokioConnectionProvider::default())
            .with_options(opts)
            .build();

        Ok(Self { resolver })
    }

    /// Create a resolver using the system DNS settings
    pub fn system(lookup_timeout: Duration) -> Result<Self> {
        Self::new(&[], true, lookup_timeout)
    }

    async fn lookup_v4(&self, name: &str) -> std::result::Result<Vec<Ipv4Addr>, ResolveError> {
        match self.resolver.ipv4_lookup(name).await {
            Ok(lookup) => Ok(lookup.iter().map(|r| r.0).collect()),
            Err(e) => Err(classify(&e)),
        }
    }

    async fn lookup_v6(&self, name: &str) -> std::result::Result<Vec<Ipv6Addr>, ResolveError> {
        match self.resolver.ipv6_lookup(name).await {
            Ok(lookup) => Ok(lookup.iter().map(|r| r.0).collect()),
            Err(e) => Err(classify(&e)),
        }
    }
}

#[async_trait::async_trait]
impl Resolver for HickoryDnsResolver {
    async fn resolve(
        &self,
        domain: &Domain,
        timeout: Duration,
    ) -> std::result::Result<ResolvedAddresses, ResolveError> {
        let name = domain.as_str();
        let lookups = async { tokio::join!(self.lookup_v4(name), self.lookup_v6(name)) };

        let (v4, v6) = tokio::time::timeout(timeout, lookups)
            .await
            .map_err(|_| ResolveError::Timeout)?;

        if let Err(e) = &v4 {
            tracing::trace!("A lookup for {} failed: {}", name, e);
        }
        if let Err(e) = &v6 {
            tracing::trace!("AAAA lookup for {} failed: {}", name, e);
        }

        merge_families(v4, v6)
    }

    fn resolver_name(&self) -> &'static str {
        "hickory"
    }
}

/// Per-attempt timeout so that every attempt fits in `lookup_timeout`
fn request_timeout(lookup_timeout: Duration) -> Duration {
    (lookup_timeout / REQUEST_ATTEMPTS).max(Duration::from_millis(1))
}

/// Map a hickory error onto the per-domain failure kinds
fn classify(error: &HickoryError) -> ResolveError {
    if error.is_nx_domain() || error.is_no_records_found() {
        return ResolveError::NotFound;
    }

    match error.proto().map(|proto| proto.kind()) {
        Some(ProtoErrorKind::Timeout) => ResolveError::Timeout,
        _ => ResolveError::unavailable(error.to_string()),
    }
}

/// Combine the A and AAAA outcomes
///
/// Any address in either family is a success. With no addresses at all,
/// a transport failure outranks a timeout, which outranks "no records".
fn merge_families(
    v4: std::result::Result<Vec<Ipv4Addr>, ResolveError>,
    v6: std::result::Result<Vec<Ipv6Addr>, ResolveError>,
) -> std::result::Result<ResolvedAddresses, ResolveError> {
    let (ipv4, v4_err) = match v4 {
        Ok(addrs) => (addrs, None),
        Err(e) => (Vec::new(), Some(e)),
    };
    let (ipv6, v6_err) = match v6 {
        Ok(addrs) => (addrs, None),
        Err(e) => (Vec::new(), Some(e)),
    };

    if !ipv4.is_empty() || !ipv6.is_empty() {
        return Ok(ResolvedAddresses::new(ipv4, ipv6));
    }

    let worst = [v4_err, v6_err]
        .into_iter()
        .flatten()
        .max_by_key(severity)
        .unwrap_or(ResolveError::NotFound);
    Err(worst)
}

fn severity(error: &ResolveError) -> u8 {
    match error {
        ResolveError::NotFound => 0,
        ResolveError::Timeout => 1,
        ResolveError::ResolverUnavailable(_) => 2,
    }
}

/// Factory for creating hickory resolvers
pub struct HickoryResolverFactory;

impl ResolverFactory for HickoryResolverFactory {
    fn create(&self, config: &ResolverConfig) -> Result<Box<dyn Resolver>> {
        match config {
            ResolverConfig::Hickory {
                nameservers,
                use_hosts_file,
                timeout_ms,
            } => {
                config.validate()?;
                Ok(Box::new(HickoryDnsResolver::new(
                    nameservers,
                    *use_hosts_file,
                    Duration::from_millis(*timeout_ms),
                )?))
            }
            other => Err(Error::config(format!(
                "hickory factory cannot build a '{}' resolver",
                other.type_name()
            ))),
        }
    }
}

/// Register the hickory resolver with a registry
pub fn register(registry: &mut ComponentRegistry) {
    registry.register_resolver("hickory", Box::new(HickoryResolverFactory));
}
