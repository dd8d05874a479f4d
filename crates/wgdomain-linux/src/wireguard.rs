// # WireGuard Route Sync
//
// Keeps a WireGuard peer's AllowedIPs in step with the applied address set,
// so traffic the firewall marks for the tunnel is also routed into it.
//
// AllowedIPs is rewritten as the configured base networks followed by every
// applied address as a host route (`/32` or `/128`).

use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;

use wgdomain_core::config::RouteSyncConfig;
use wgdomain_core::traits::{AddressSet, RouteSync, RouteSyncFactory};
use wgdomain_core::{Error, Result};

/// Route sync that drives the `wg` tool
#[derive(Debug, Clone)]
pub struct WireGuardRouteSync {
    /// WireGuard interface (e.g., "wg0")
    interface: String,

    /// Peer public key; the interface's first peer when absent
    peer: Option<String>,

    /// Networks always kept in AllowedIPs
    base_allowed_ips: Vec<String>,

    /// Program and leading arguments
    command: Vec<String>,
}

impl WireGuardRouteSync {
    /// Create a route sync that runs the `wg` found on `PATH`
    pub fn new(interface: impl Into<String>, base_allowed_ips: Vec<String>) -> Self {
        Self {
            interface: interface.into(),
            peer: None,
            base_allowed_ips,
            command: vec!["wg".to_string()],
        }
    }

    /// Update a specific peer instead of the first one
    pub fn with_peer(mut self, peer: Option<String>) -> Self {
        self.peer = peer;
        self
    }

    /// Run a different program (e.g., `["sudo", "wg"]`)
    pub fn with_command(mut self, command: Vec<String>) -> Self {
        self.command = command;
        self
    }

    /// Render the AllowedIPs list for `addresses`
    pub fn allowed_ips(&self, addresses: &AddressSet) -> String {
        let hosts = addresses
            .ipv4()
            .iter()
            .map(|a| format!("{}/32", a))
            .chain(addresses.ipv6().iter().map(|a| format!("{}/128", a)));

        self.base_allowed_ips
            .iter()
            .cloned()
            .chain(hosts)
            .collect::<Vec<_>>()
            .join(",")
    }

    /// The peer to update
    async fn peer_key(&self) -> Result<String> {
        if let Some(peer) = &self.peer {
            return Ok(peer.clone());
        }

        let stdout = self.run(&["show", &self.interface, "peers"]).await?;
        stdout
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_string)
            .ok_or_else(|| Error::Other(format!("No WireGuard peer on {}", self.interface)))
    }

    /// Run wg and return its stdout
    async fn run(&self, args: &[&str]) -> Result<String> {
        let Some((program, leading)) = self.command.split_first() else {
            return Err(Error::config("wg command is empty"));
        };

        let output = Command::new(program)
            .args(leading)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| Error::Other(format!("Failed to run {}: {}", program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Other(format!(
                "{} {} failed: {}",
                program,
                args.first().copied().unwrap_or_default(),
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl RouteSync for WireGuardRouteSync {
    async fn sync(&self, addresses: &AddressSet) -> Result<()> {
        let peer = self.peer_key().await?;
        let allowed_ips = self.allowed_ips(addresses);

        self.run(&[
            "set",
            &self.interface,
            "peer",
            &peer,
            "allowed-ips",
            &allowed_ips,
        ])
        .await?;

        tracing::info!(
            "Updated WireGuard AllowedIPs on {}: {} routes",
            self.interface,
            self.base_allowed_ips.len() + addresses.len()
        );
        Ok(())
    }

    fn sync_name(&self) -> &'static str {
        "wireguard"
    }
}

/// Factory for creating WireGuard route syncs
pub struct WireGuardFactory;

impl RouteSyncFactory for WireGuardFactory {
    fn create(&self, config: &RouteSyncConfig) -> Result<Box<dyn RouteSync>> {
        match config {
            RouteSyncConfig::Wireguard {
                interface,
                peer,
                base_allowed_ips,
                command,
            } => {
                config.validate()?;
                Ok(Box::new(
                    WireGuardRouteSync::new(interface, base_allowed_ips.clone())
                        .with_peer(peer.clone())
                        .with_command(command.clone()),
                ))
            }
            other => Err(Error::config(format!(
                "WireGuard factory cannot build a '{}' route sync",
                other.type_name()
            ))),
        }
    }
}
