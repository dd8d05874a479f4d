// # wgdomaind - Domain Allowlist Daemon
//
// This daemon is a THIN integration layer:
// - No resolution, firewall, or scheduling logic lives here
// - All reconciliation logic is in wgdomain-core
// - Configuration is via environment variables ONLY
//
// The wgdomaind daemon is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing the runtime
// 3. Registering the resolver, firewall and route sync components
// 4. Starting the admin API and (optionally) the periodic reconciler
//
// ## Configuration
//
// ### Admin API
// - `WGDOMAIN_HOST`: Listen address (default: 127.0.0.1)
// - `WGDOMAIN_PORT`: Listen port (default: 8877)
//
// ### Domain Store
// - `WGDOMAIN_STORE_TYPE`: Type of store (file, memory)
// - `WGDOMAIN_DOMAINS_FILE`: Path to the domain list (for file)
//
// ### Resolver
// - `WGDOMAIN_RESOLVE_TIMEOUT_SECS`: Per-domain lookup bound
// - `WGDOMAIN_RESOLVE_CONCURRENCY`: Lookups in flight at once
// - `WGDOMAIN_NAMESERVERS`: Comma-separated `ip[:port]` list (system config when unset)
//
// ### Firewall
// - `WGDOMAIN_NFT_FAMILY`, `WGDOMAIN_NFT_TABLES`
// - `WGDOMAIN_NFT_SET_V4`, `WGDOMAIN_NFT_SET_V6`
// - `WGDOMAIN_DRY_RUN`: Validate with `nft -c` instead of committing
//
// ### WireGuard
// - `WGDOMAIN_WG_INTERFACE`: Enables route sync when set
// - `WGDOMAIN_WG_PEER`: Peer public key (first peer when unset)
// - `WGDOMAIN_WG_BASE_ALLOWED_IPS`: Networks always kept in AllowedIPs
//
// ### Engine
// - `WGDOMAIN_UPDATE_INTERVAL_SECS`: Periodic cycle interval (manual only when unset)
// - `WGDOMAIN_LOG_LEVEL`: trace, debug, info, warn, error
//
// ## Example
//
// ```bash
// export WGDOMAIN_DOMAINS_FILE=/etc/wg-domain/domains.txt
// export WGDOMAIN_WG_INTERFACE=wg0
// export WGDOMAIN_UPDATE_INTERVAL_SECS=300
//
// wgdomaind
// ```

use anyhow::{Context, Result};
use std::env;
use std::net::{IpAddr, SocketAddr};
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

use wgdomain_core::config::DEFAULT_DOMAINS_FILE;
use wgdomain_core::{
    ComponentRegistry, DomainStore, EngineConfig, FirewallConfig, ReconcileEvent, Reconciler,
    ResolverConfig, RouteSyncConfig, StoreConfig, WgDomainConfig,
};

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// How long in-flight work may take to drain after a shutdown signal
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum WgDomainExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<WgDomainExitCode> for ExitCode {
    fn from(code: WgDomainExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
#[derive(Debug)]
struct Config {
    host: IpAddr,
    port: u16,
    store_type: String,
    domains_file: String,
    resolve_timeout_secs: u64,
    resolve_concurrency: usize,
    nameservers: Vec<SocketAddr>,
    nft_family: String,
    nft_tables: Vec<String>,
    nft_set_v4: String,
    nft_set_v6: String,
    dry_run: bool,
    wg_interface: Option<String>,
    wg_peer: Option<String>,
    wg_base_allowed_ips: Vec<String>,
    update_interval_secs: Option<u64>,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through `get`, treating blank values as unset
    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| {
            get(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Ok(Self {
            host: parse_or(var("WGDOMAIN_HOST"), "WGDOMAIN_HOST", IpAddr::from([127, 0, 0, 1]))?,
            port: parse_or(var("WGDOMAIN_PORT"), "WGDOMAIN_PORT", 8877)?,
            store_type: var("WGDOMAIN_STORE_TYPE").unwrap_or_else(|| "file".to_string()),
            domains_file: var("WGDOMAIN_DOMAINS_FILE")
                .unwrap_or_else(|| DEFAULT_DOMAINS_FILE.to_string()),
            resolve_timeout_secs: parse_or(
                var("WGDOMAIN_RESOLVE_TIMEOUT_SECS"),
                "WGDOMAIN_RESOLVE_TIMEOUT_SECS",
                5,
            )?,
            resolve_concurrency: parse_or(
                var("WGDOMAIN_RESOLVE_CONCURRENCY"),
                "WGDOMAIN_RESOLVE_CONCURRENCY",
                16,
            )?,
            nameservers: split_list(var("WGDOMAIN_NAMESERVERS").as_deref())
                .iter()
                .map(|s| parse_nameserver(s))
                .collect::<Result<_>>()?,
            nft_family: var("WGDOMAIN_NFT_FAMILY").unwrap_or_else(|| "inet".to_string()),
            nft_tables: split_list(Some(
                var("WGDOMAIN_NFT_TABLES")
                    .as_deref()
                    .unwrap_or("filter,mangle"),
            )),
            nft_set_v4: var("WGDOMAIN_NFT_SET_V4").unwrap_or_else(|| "domlist4".to_string()),
            nft_set_v6: var("WGDOMAIN_NFT_SET_V6").unwrap_or_else(|| "domlist6".to_string()),
            dry_run: var("WGDOMAIN_DRY_RUN")
                .map(|v| parse_bool(&v, "WGDOMAIN_DRY_RUN"))
                .transpose()?
                .unwrap_or(false),
            wg_interface: var("WGDOMAIN_WG_INTERFACE"),
            wg_peer: var("WGDOMAIN_WG_PEER"),
            wg_base_allowed_ips: split_list(Some(
                var("WGDOMAIN_WG_BASE_ALLOWED_IPS")
                    .as_deref()
                    .unwrap_or("10.8.0.0/24"),
            )),
            update_interval_secs: var("WGDOMAIN_UPDATE_INTERVAL_SECS")
                .map(|v| {
                    v.parse::<u64>()
                        .with_context(|| format!("WGDOMAIN_UPDATE_INTERVAL_SECS is not a number: {}", v))
                })
                .transpose()?,
            log_level: var("WGDOMAIN_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the configuration
    ///
    /// Checks enumerations and numeric ranges. Component-level checks
    /// (nft identifiers, empty commands) run again in `WgDomainConfig::validate`.
    fn validate(&self) -> Result<()> {
        match self.store_type.as_str() {
            "file" | "memory" => {}
            _ => anyhow::bail!(
                "WGDOMAIN_STORE_TYPE '{}' is not supported. \
                Supported types: file, memory",
                self.store_type
            ),
        }

        if self.port == 0 {
            anyhow::bail!("WGDOMAIN_PORT must be between 1 and 65535");
        }

        if !(1..=60).contains(&self.resolve_timeout_secs) {
            anyhow::bail!(
                "WGDOMAIN_RESOLVE_TIMEOUT_SECS must be between 1 and 60 seconds. Got: {}",
                self.resolve_timeout_secs
            );
        }

        if !(1..=256).contains(&self.resolve_concurrency) {
            anyhow::bail!(
                "WGDOMAIN_RESOLVE_CONCURRENCY must be between 1 and 256. Got: {}",
                self.resolve_concurrency
            );
        }

        if let Some(interval) = self.update_interval_secs
            && !(10..=86400).contains(&interval)
        {
            anyhow::bail!(
                "WGDOMAIN_UPDATE_INTERVAL_SECS must be between 10 and 86400 seconds. Got: {}",
                interval
            );
        }

        if self.wg_peer.is_some() && self.wg_interface.is_none() {
            anyhow::bail!("WGDOMAIN_WG_PEER is set but WGDOMAIN_WG_INTERFACE is not");
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "WGDOMAIN_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        self.to_wgdomain_config().validate()?;

        Ok(())
    }

    /// Build the component configuration
    fn to_wgdomain_config(&self) -> WgDomainConfig {
        let store = match self.store_type.as_str() {
            "memory" => StoreConfig::Memory,
            _ => StoreConfig::File {
                path: self.domains_file.clone(),
            },
        };

        let route_sync = self
            .wg_interface
            .as_ref()
            .map(|interface| RouteSyncConfig::Wireguard {
                interface: interface.clone(),
                peer: self.wg_peer.clone(),
                base_allowed_ips: self.wg_base_allowed_ips.clone(),
                command: vec!["wg".to_string()],
            });

        WgDomainConfig {
            store,
            resolver: ResolverConfig::Hickory {
                nameservers: self.nameservers.clone(),
                use_hosts_file: true,
                timeout_ms: self.resolve_timeout_secs * 1000,
            },
            firewall: FirewallConfig::Nftables {
                family: self.nft_family.clone(),
                tables: self.nft_tables.clone(),
                set_v4: self.nft_set_v4.clone(),
                set_v6: self.nft_set_v6.clone(),
                command: vec!["nft".to_string()],
                dry_run: self.dry_run,
            },
            route_sync,
            engine: EngineConfig {
                resolve_timeout_ms: self.resolve_timeout_secs * 1000,
                resolve_concurrency: self.resolve_concurrency,
                update_interval_secs: self.update_interval_secs,
                ..EngineConfig::default()
            },
        }
    }

    fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn parse_or<T>(value: Option<String>, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match value {
        Some(v) => v
            .parse()
            .with_context(|| format!("{} has an invalid value: {}", name, v)),
        None => Ok(default),
    }
}

fn parse_bool(value: &str, name: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => anyhow::bail!("{} must be true or false. Got: {}", name, value),
    }
}

/// Nameservers default to port 53
fn parse_nameserver(value: &str) -> Result<SocketAddr> {
    if let Ok(addr) = value.parse::<SocketAddr>() {
        return Ok(addr);
    }
    value
        .parse::<IpAddr>()
        .map(|ip| SocketAddr::new(ip, 53))
        .with_context(|| format!("WGDOMAIN_NAMESERVERS has an invalid entry: {}", value))
}

fn split_list(value: Option<&str>) -> Vec<String> {
    value
        .unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return WgDomainExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return WgDomainExitCode::ConfigError.into();
    }

    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return WgDomainExitCode::ConfigError.into();
    }

    info!("Starting wgdomaind daemon");

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return WgDomainExitCode::RuntimeError.into();
        }
    };

    rt.block_on(async {
        match run_daemon(config).await {
            Ok(()) => WgDomainExitCode::CleanShutdown,
            Err(DaemonError::Startup(e)) => {
                error!("Startup failed: {:#}", e);
                WgDomainExitCode::ConfigError
            }
            Err(DaemonError::Runtime(e)) => {
                error!("Daemon error: {:#}", e);
                WgDomainExitCode::RuntimeError
            }
        }
    })
    .into()
}

/// Where the daemon failed, which decides the exit code
enum DaemonError {
    Startup(anyhow::Error),
    Runtime(anyhow::Error),
}

/// Build every component and the engine
async fn build_engine(config: &Config) -> Result<(Reconciler, mpsc::Receiver<ReconcileEvent>)> {
    #[allow(unused_mut)]
    let mut registry = ComponentRegistry::new();

    #[cfg(feature = "hickory")]
    {
        debug!("Registering hickory resolver");
        wgdomain_resolver_hickory::register(&mut registry);
    }

    #[cfg(feature = "linux")]
    {
        debug!("Registering nftables firewall and WireGuard route sync");
        wgdomain_linux::register(&mut registry);
    }

    let components = config.to_wgdomain_config();

    let store: Arc<dyn DomainStore> = Arc::from(registry.create_store(&components.store).await?);
    let resolver = registry.create_resolver(&components.resolver)?;
    let firewall = registry.create_firewall(&components.firewall)?;

    info!("Domain store: {}", components.store.type_name());
    info!("Resolver: {}", components.resolver.type_name());
    info!("Firewall: {}", components.firewall.type_name());

    let (mut engine, events) = Reconciler::new(store, resolver, firewall, components.engine)?;

    if let Some(route_sync) = &components.route_sync {
        info!("Route sync: {}", route_sync.type_name());
        engine = engine.with_route_sync(registry.create_route_sync(route_sync)?);
    }

    Ok((engine, events))
}

/// Run the daemon
async fn run_daemon(config: Config) -> std::result::Result<(), DaemonError> {
    let (engine, events) = build_engine(&config).await.map_err(DaemonError::Startup)?;
    let engine = Arc::new(engine);

    tokio::spawn(log_events(events));

    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind admin API on {}", addr))
        .map_err(DaemonError::Startup)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut server = tokio::spawn(wgdomain_http::serve(
        listener,
        engine.clone(),
        stopped(shutdown_rx.clone()),
    ));

    let periodic = config.update_interval_secs.map(|secs| {
        let engine = engine.clone();
        let shutdown = stopped(shutdown_rx.clone());
        tokio::spawn(async move {
            engine
                .run_periodic(Duration::from_secs(secs), shutdown)
                .await
        })
    });

    if periodic.is_none() {
        info!("No update interval set; cycles run on POST /api/update only");
    }

    let reason = tokio::select! {
        signal = wait_for_shutdown() => signal.map_err(DaemonError::Runtime)?,
        result = &mut server => {
            let error = match result {
                Ok(Ok(())) => anyhow::anyhow!("Admin API stopped unexpectedly"),
                Ok(Err(e)) => anyhow::Error::new(e).context("Admin API failed"),
                Err(e) => anyhow::Error::new(e).context("Admin API task panicked"),
            };
            return Err(DaemonError::Runtime(error));
        }
    };

    info!("Received shutdown signal: {}", reason);
    // Receivers may already be gone; nothing left to notify then
    let _ = shutdown_tx.send(true);

    let drain = async {
        match periodic {
            Some(handle) => handle.await??,
            None => engine.store().flush().await?,
        }
        server.await??;
        Ok::<(), anyhow::Error>(())
    };

    match tokio::time::timeout(SHUTDOWN_GRACE, drain).await {
        Ok(result) => result.map_err(DaemonError::Runtime)?,
        Err(_) => {
            return Err(DaemonError::Runtime(anyhow::anyhow!(
                "Shutdown timeout after {:?}",
                SHUTDOWN_GRACE
            )));
        }
    }

    info!("wgdomaind stopped");
    Ok(())
}

/// Resolves once the shutdown flag is raised (or its sender is gone)
async fn stopped(mut rx: watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            break;
        }
        if rx.changed().await.is_err() {
            break;
        }
    }
}

/// Turn engine events into log lines
async fn log_events(mut events: mpsc::Receiver<ReconcileEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            ReconcileEvent::CycleStarted { domains } => {
                debug!("Cycle started for {} domain(s)", domains);
            }
            ReconcileEvent::DomainResolved { domain, ipv4, ipv6 } => {
                debug!("{} resolved to {} IPv4 / {} IPv6", domain, ipv4, ipv6);
            }
            ReconcileEvent::DomainFailed { domain, reason } => {
                debug!("{} failed to resolve: {}", domain, reason);
            }
            ReconcileEvent::ApplySucceeded { ipv4, ipv6 } => {
                debug!("Applied {} IPv4 / {} IPv6 addresses", ipv4, ipv6);
            }
            ReconcileEvent::ApplySkipped { addresses } => {
                debug!("Address set unchanged ({} addresses)", addresses);
            }
            ReconcileEvent::ApplyFailed { error } => {
                debug!("Apply failed: {}", error);
            }
            ReconcileEvent::RouteSyncFailed { error } => {
                warn!("Route sync failed: {}", error);
            }
            ReconcileEvent::CycleRejected => {
                debug!("Trigger rejected, a cycle is already running");
            }
            ReconcileEvent::CycleFinished { success } => {
                debug!("Cycle finished (success: {})", success);
            }
            ReconcileEvent::Stopped { reason } => {
                info!("Reconciler stopped: {}", reason);
            }
        }
    }
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm =
        signal(SignalKind::terminate()).context("Failed to setup SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to setup SIGINT handler")?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .context("Failed to wait for CTRL-C")?;
    Ok("SIGINT")
}
