//! Configuration types for the wgdomain system
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Default location of the domain list file
pub const DEFAULT_DOMAINS_FILE: &str = "/etc/wg-domain/domains.txt";

/// Main wgdomain configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WgDomainConfig {
    /// Domain store configuration
    pub store: StoreConfig,

    /// Resolver configuration
    pub resolver: ResolverConfig,

    /// Firewall adapter configuration
    pub firewall: FirewallConfig,

    /// Optional post-apply route sync
    #[serde(default)]
    pub route_sync: Option<RouteSyncConfig>,

    /// Optional engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl WgDomainConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self {
            store: StoreConfig::default(),
            resolver: ResolverConfig::default(),
            firewall: FirewallConfig::default(),
            route_sync: None,
            engine: EngineConfig::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.store.validate()?;
        self.resolver.validate()?;
        self.firewall.validate()?;
        if let Some(route_sync) = &self.route_sync {
            route_sync.validate()?;
        }
        self.engine.validate()?;

        Ok(())
    }
}

impl Default for WgDomainConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Domain store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreConfig {
    /// One domain per line in a text file
    File {
        /// Path to the domain list
        path: String,
    },

    /// In-memory store (not persistent)
    Memory,

    /// Custom store
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl StoreConfig {
    /// Validate the store configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            StoreConfig::File { path } => {
                if path.is_empty() {
                    return Err(crate::Error::config("Domain file path cannot be empty"));
                }
                Ok(())
            }
            StoreConfig::Custom { factory, .. } => {
                if factory.is_empty() {
                    return Err(crate::Error::config("Custom store factory cannot be empty"));
                }
                Ok(())
            }
            StoreConfig::Memory => Ok(()),
        }
    }

    /// Get the store type name
    pub fn type_name(&self) -> &str {
        match self {
            StoreConfig::File { .. } => "file",
            StoreConfig::Memory => "memory",
            StoreConfig::Custom { factory, .. } => factory,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::File {
            path: DEFAULT_DOMAINS_FILE.to_string(),
        }
    }
}

/// Resolver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResolverConfig {
    /// hickory-resolver
    Hickory {
        /// Explicit nameservers; empty means use the system configuration
        #[serde(default)]
        nameservers: Vec<SocketAddr>,
        /// Whether to consult the hosts file
        #[serde(default = "default_use_hosts_file")]
        use_hosts_file: bool,
        /// Budget for one query across all retry attempts (in milliseconds)
        #[serde(default = "default_resolve_timeout_ms")]
        timeout_ms: u64,
    },

    /// Custom resolver
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl ResolverConfig {
    /// Validate the resolver configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            ResolverConfig::Hickory { timeout_ms, .. } => {
                if *timeout_ms == 0 {
                    return Err(crate::Error::config("Resolver timeout must be > 0"));
                }
                Ok(())
            }
            ResolverConfig::Custom { factory, .. } => {
                if factory.is_empty() {
                    return Err(crate::Error::config(
                        "Custom resolver factory cannot be empty",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Get the resolver type name
    pub fn type_name(&self) -> &str {
        match self {
            ResolverConfig::Hickory { .. } => "hickory",
            ResolverConfig::Custom { factory, .. } => factory,
        }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        ResolverConfig::Hickory {
            nameservers: Vec::new(),
            use_hosts_file: default_use_hosts_file(),
            timeout_ms: default_resolve_timeout_ms(),
        }
    }
}

fn default_use_hosts_file() -> bool {
    true
}

/// Firewall adapter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FirewallConfig {
    /// nftables named sets
    Nftables {
        /// Table family (e.g., "inet")
        #[serde(default = "default_nft_family")]
        family: String,
        /// Tables holding the managed sets
        #[serde(default = "default_nft_tables")]
        tables: Vec<String>,
        /// Name of the IPv4 address set
        #[serde(default = "default_set_v4")]
        set_v4: String,
        /// Name of the IPv6 address set
        #[serde(default = "default_set_v6")]
        set_v6: String,
        /// Program and leading arguments used to run nft
        #[serde(default = "default_nft_command")]
        command: Vec<String>,
        /// Check the ruleset without committing it
        #[serde(default)]
        dry_run: bool,
    },

    /// Custom firewall
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl FirewallConfig {
    /// Validate the firewall configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            FirewallConfig::Nftables {
                family,
                tables,
                set_v4,
                set_v6,
                command,
                ..
            } => {
                if !matches!(family.as_str(), "ip" | "ip6" | "inet" | "arp" | "bridge" | "netdev") {
                    return Err(crate::Error::config(format!(
                        "Unknown nftables family: {}",
                        family
                    )));
                }
                if tables.is_empty() {
                    return Err(crate::Error::config("At least one nftables table is required"));
                }
                for name in tables.iter().chain([set_v4, set_v6]) {
                    if !is_nft_identifier(name) {
                        return Err(crate::Error::config(format!(
                            "Invalid nftables identifier: '{}'",
                            name
                        )));
                    }
                }
                if command.first().is_none_or(|program| program.is_empty()) {
                    return Err(crate::Error::config("nft command cannot be empty"));
                }
                Ok(())
            }
            FirewallConfig::Custom { factory, .. } => {
                if factory.is_empty() {
                    return Err(crate::Error::config(
                        "Custom firewall factory cannot be empty",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Get the firewall type name
    pub fn type_name(&self) -> &str {
        match self {
            FirewallConfig::Nftables { .. } => "nftables",
            FirewallConfig::Custom { factory, .. } => factory,
        }
    }
}

impl Default for FirewallConfig {
    fn default() -> Self {
        FirewallConfig::Nftables {
            family: default_nft_family(),
            tables: default_nft_tables(),
            set_v4: default_set_v4(),
            set_v6: default_set_v6(),
            command: default_nft_command(),
            dry_run: false,
        }
    }
}

/// nft identifiers: a letter followed by letters, digits, `_` or `-`
fn is_nft_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn default_nft_family() -> String {
    "inet".to_string()
}

fn default_nft_tables() -> Vec<String> {
    vec!["filter".to_string(), "mangle".to_string()]
}

fn default_set_v4() -> String {
    "domlist4".to_string()
}

fn default_set_v6() -> String {
    "domlist6".to_string()
}

fn default_nft_command() -> Vec<String> {
    vec!["nft".to_string()]
}

/// Post-apply route sync configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RouteSyncConfig {
    /// WireGuard peer AllowedIPs
    Wireguard {
        /// WireGuard interface (e.g., "wg0")
        interface: String,
        /// Peer public key; the interface's first peer when absent
        #[serde(default)]
        peer: Option<String>,
        /// Networks always kept in AllowedIPs
        #[serde(default = "default_base_allowed_ips")]
        base_allowed_ips: Vec<String>,
        /// Program and leading arguments used to run wg
        #[serde(default = "default_wg_command")]
        command: Vec<String>,
    },

    /// Custom route sync
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl RouteSyncConfig {
    /// Validate the route sync configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            RouteSyncConfig::Wireguard {
                interface,
                command,
                ..
            } => {
                if interface.is_empty() {
                    return Err(crate::Error::config("WireGuard interface cannot be empty"));
                }
                if command.first().is_none_or(|program| program.is_empty()) {
                    return Err(crate::Error::config("wg command cannot be empty"));
                }
                Ok(())
            }
            RouteSyncConfig::Custom { factory, .. } => {
                if factory.is_empty() {
                    return Err(crate::Error::config(
                        "Custom route sync factory cannot be empty",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Get the route sync type name
    pub fn type_name(&self) -> &str {
        match self {
            RouteSyncConfig::Wireguard { .. } => "wireguard",
            RouteSyncConfig::Custom { factory, .. } => factory,
        }
    }
}

fn default_base_allowed_ips() -> Vec<String> {
    vec!["10.8.0.0/24".to_string()]
}

fn default_wg_command() -> Vec<String> {
    vec!["wg".to_string()]
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Upper bound for resolving a single domain (in milliseconds)
    #[serde(default = "default_resolve_timeout_ms")]
    pub resolve_timeout_ms: u64,

    /// Maximum number of domains resolved at the same time
    #[serde(default = "default_resolve_concurrency")]
    pub resolve_concurrency: usize,

    /// Capacity of the internal event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// Run a cycle on this interval (in seconds); manual trigger only when unset
    #[serde(default)]
    pub update_interval_secs: Option<u64>,
}

impl EngineConfig {
    /// Validate the engine configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.resolve_timeout_ms == 0 {
            return Err(crate::Error::config("Resolve timeout must be > 0"));
        }
        if self.resolve_concurrency == 0 {
            return Err(crate::Error::config("Resolve concurrency must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        if self.update_interval_secs == Some(0) {
            return Err(crate::Error::config("Update interval must be > 0"));
        }
        Ok(())
    }

    /// Resolve timeout as a duration
    pub fn resolve_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.resolve_timeout_ms)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            resolve_timeout_ms: default_resolve_timeout_ms(),
            resolve_concurrency: default_resolve_concurrency(),
            event_channel_capacity: default_event_channel_capacity(),
            update_interval_secs: None,
        }
    }
}

fn default_resolve_timeout_ms() -> u64 {
    5_000
}

fn default_resolve_concurrency() -> usize {
    16
}

fn default_event_channel_capacity() -> usize {
    1000
}
