// # nftables Firewall
//
// Replaces the contents of named nftables sets with the target addresses.
//
// ## Atomicity
//
// The whole update is rendered into one script and fed to `nft -f -`.
// nft commits a script as a single netlink transaction, so the kernel
// either accepts every flush and add in it or none of them. On rejection
// the previously loaded set contents stay in force.
//
// ## Script Shape
//
// ```text
// flush set inet filter domlist4
// flush set inet filter domlist6
// add element inet filter domlist4 { 192.0.2.1, 198.51.100.7 }
// add element inet filter domlist6 { 2001:db8::1 }
// flush set inet mangle domlist4
// ...
// ```
//
// Both families are flushed in every table even when one of them has no
// addresses, so stale entries never survive an update.

use async_trait::async_trait;
use std::fmt::Write as _;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use wgdomain_core::config::FirewallConfig;
use wgdomain_core::traits::{AddressSet, Firewall, FirewallFactory};
use wgdomain_core::{ApplyError, Error, Result};

/// nftables firewall adapter
///
/// # Dry-Run Mode
///
/// When `dry_run` is true, the script is passed to `nft -c`, which parses
/// and validates it against the live ruleset without committing anything.
#[derive(Debug, Clone)]
pub struct NftablesFirewall {
    /// Table family (e.g., "inet")
    family: String,

    /// Tables holding the managed sets
    tables: Vec<String>,

    /// IPv4 set name
    set_v4: String,

    /// IPv6 set name
    set_v6: String,

    /// Program and leading arguments
    command: Vec<String>,

    /// Check only, never commit
    dry_run: bool,
}

impl NftablesFirewall {
    /// Create an adapter that runs the `nft` found on `PATH`
    pub fn new(
        family: impl Into<String>,
        tables: Vec<String>,
        set_v4: impl Into<String>,
        set_v6: impl Into<String>,
    ) -> Self {
        Self {
            family: family.into(),
            tables,
            set_v4: set_v4.into(),
            set_v6: set_v6.into(),
            command: vec!["nft".to_string()],
            dry_run: false,
        }
    }

    /// Run a different program (e.g., `["sudo", "nft"]`)
    pub fn with_command(mut self, command: Vec<String>) -> Self {
        self.command = command;
        self
    }

    /// Validate scripts with `nft -c` instead of committing them
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Render the transaction that makes the managed sets equal `addresses`
    pub fn render_script(&self, addresses: &AddressSet) -> String {
        let ipv4: Vec<String> = addresses.ipv4().iter().map(|a| a.to_string()).collect();
        let ipv6: Vec<String> = addresses.ipv6().iter().map(|a| a.to_string()).collect();

        let mut script = String::new();
        for table in &self.tables {
            for set in [&self.set_v4, &self.set_v6] {
                let _ = writeln!(script, "flush set {} {} {}", self.family, table, set);
            }
            for (set, elements) in [(&self.set_v4, &ipv4), (&self.set_v6, &ipv6)] {
                if elements.is_empty() {
                    continue;
                }
                let _ = writeln!(
                    script,
                    "add element {} {} {} {{ {} }}",
                    self.family,
                    table,
                    set,
                    elements.join(", ")
                );
            }
        }
        script
    }

    /// Feed a script to nft on stdin
    async fn run_script(&self, script: &str) -> std::result::Result<(), ApplyError> {
        let Some((program, leading)) = self.command.split_first() else {
            return Err(ApplyError::unavailable("nft command is empty"));
        };

        let mut cmd = Command::new(program);
        cmd.args(leading);
        if self.dry_run {
            cmd.arg("-c");
        }
        cmd.args(["-f", "-"])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| ApplyError::unavailable(format!("Failed to run {}: {}", program, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            // nft may exit before reading everything; its stderr says why
            if let Err(e) = stdin.write_all(script.as_bytes()).await {
                tracing::debug!("Failed to write nft script: {}", e);
            }
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| ApplyError::unavailable(format!("Failed to wait for {}: {}", program, e)))?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        Err(ApplyError::rejected(if stderr.is_empty() {
            format!("{} exited with {}", program, output.status)
        } else {
            stderr
        }))
    }
}

#[async_trait]
impl Firewall for NftablesFirewall {
    async fn apply(&self, addresses: &AddressSet) -> std::result::Result<(), ApplyError> {
        let script = self.render_script(addresses);

        tracing::info!(
            "Replacing nftables sets {}/{} in {} table(s): {} IPv4, {} IPv6 [mode: {}]",
            self.set_v4,
            self.set_v6,
            self.tables.len(),
            addresses.ipv4().len(),
            addresses.ipv6().len(),
            if self.dry_run { "DRY-RUN" } else { "LIVE" }
        );
        tracing::trace!("nft script:\n{}", script);

        self.run_script(&script).await
    }

    fn firewall_name(&self) -> &'static str {
        "nftables"
    }
}

/// Factory for creating nftables firewalls
pub struct NftablesFactory;

impl FirewallFactory for NftablesFactory {
    fn create(&self, config: &FirewallConfig) -> Result<Box<dyn Firewall>> {
        match config {
            FirewallConfig::Nftables {
                family,
                tables,
                set_v4,
                set_v6,
                command,
                dry_run,
            } => {
                config.validate()?;

                if *dry_run {
                    tracing::warn!("nftables firewall running in DRY-RUN mode - no changes will be made");
                }

                Ok(Box::new(
                    NftablesFirewall::new(family, tables.clone(), set_v4, set_v6)
                        .with_command(command.clone())
                        .with_dry_run(*dry_run),
                ))
            }
            other => Err(Error::config(format!(
                "nftables factory cannot build a '{}' firewall",
                other.type_name()
            ))),
        }
    }
}
