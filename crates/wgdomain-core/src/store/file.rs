// # File Domain Store
//
// File-based implementation of DomainStore with crash recovery.
//
// ## Purpose
//
// Persists the allowlist across daemon restarts in the plain format other
// tooling on the host already reads: one domain per line.
//
// ## Crash Recovery
//
// - Atomic writes: Uses write-then-rename for atomicity
// - Automatic backup: Keeps .backup of last known good list
// - Recovery: Falls back to backup if the main file is unreadable
// - Invalid lines are skipped with a warning rather than failing the load
//
// ## File Format
//
// ```text
// example.com
// api.example.org
// ```

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::config::StoreConfig;
use crate::domain::{AddOutcome, Domain, RemoveOutcome};
use crate::traits::domain_store::{DomainStore, DomainStoreFactory};
use crate::Error;

/// File-based domain store with crash recovery
///
/// Every mutation is written through to disk before it is acknowledged.
/// If the write fails the in-memory list is rolled back, so memory and
/// disk never disagree.
///
/// # Example
///
/// ```rust,no_run
/// use wgdomain_core::store::FileDomainStore;
/// use wgdomain_core::DomainStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileDomainStore::new("/etc/wg-domain/domains.txt").await?;
///
///     // Atomically written to disk
///     store.add("example.com").await?;
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct FileDomainStore {
    path: PathBuf,
    domains: Arc<RwLock<Vec<Domain>>>,
}

impl FileDomainStore {
    /// Create or load a file domain store
    ///
    /// This will:
    /// 1. Create parent directories if needed
    /// 2. Try to load the existing domain file
    /// 3. If it cannot be read, try the backup
    /// 4. If neither exists, start empty
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::store(format!(
                    "Failed to create domain directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let domains = Self::load_with_recovery(&path).await?;

        Ok(Self {
            path,
            domains: Arc::new(RwLock::new(domains)),
        })
    }

    /// Path of the domain file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the domain list with automatic recovery
    ///
    /// Recovery strategy:
    /// 1. Try to load main file
    /// 2. If it is not valid text, try loading backup
    /// 3. If backup also fails, start with an empty list
    async fn load_with_recovery(path: &Path) -> Result<Vec<Domain>, Error> {
        match Self::load(path).await {
            Ok(domains) => {
                tracing::debug!("Loaded domain file: {} domains", domains.len());
                Ok(domains)
            }
            Err(e) if e.kind() == ErrorKind::InvalidData => {
                tracing::warn!(
                    "Domain file {} appears corrupted: {}. Attempting recovery from backup.",
                    path.display(),
                    e
                );

                let backup_path = Self::backup_path(path);
                if !backup_path.exists() {
                    tracing::warn!("No backup file found. Starting with an empty list.");
                    return Ok(Vec::new());
                }

                match Self::load(&backup_path).await {
                    Ok(domains) => {
                        tracing::info!("Recovered domain list from backup: {} domains", domains.len());
                        if let Err(restore_err) = fs::copy(&backup_path, path).await {
                            tracing::error!(
                                "Failed to restore domain file from backup: {}",
                                restore_err
                            );
                        }
                        Ok(domains)
                    }
                    Err(backup_err) => {
                        tracing::error!(
                            "Backup also unreadable: {}. Starting with an empty list.",
                            backup_err
                        );
                        Ok(Vec::new())
                    }
                }
            }
            Err(e) => Err(Error::store(format!(
                "Failed to read domain file {}: {}",
                path.display(),
                e
            ))),
        }
    }

    /// Read and parse a domain file
    async fn load(path: &Path) -> std::io::Result<Vec<Domain>> {
        let content = match fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!("Domain file does not exist: {}", path.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        Ok(parse_domain_list(&content))
    }

    /// Write the list to disk atomically
    ///
    /// Callers hold the write lock, which keeps writers serialized.
    async fn persist(&self, domains: &[Domain]) -> Result<(), Error> {
        let mut content = String::new();
        for domain in domains {
            content.push_str(domain.as_str());
            content.push('\n');
        }

        let temp_path = self.temp_path();
        {
            let mut file = fs::File::create(&temp_path).await.map_err(|e| {
                Error::store(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.write_all(content.as_bytes()).await.map_err(|e| {
                Error::store(format!(
                    "Failed to write to temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.flush().await.map_err(|e| {
                Error::store(format!(
                    "Failed to flush temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        if self.path.exists() {
            let backup_path = Self::backup_path(&self.path);
            if let Err(e) = fs::copy(&self.path, &backup_path).await {
                tracing::warn!("Failed to create backup: {}", e);
            }
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::store(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        tracing::trace!("Domain list written to {}", self.path.display());
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }

    fn backup_path(path: &Path) -> PathBuf {
        let mut backup = path.to_path_buf();
        backup.set_extension("backup");
        backup
    }
}

/// Parse a line-per-domain list
///
/// Blank lines are ignored, duplicates keep their first position and
/// invalid entries are skipped with a warning.
pub fn parse_domain_list(content: &str) -> Vec<Domain> {
    let mut domains: Vec<Domain> = Vec::new();
    for (lineno, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match Domain::parse(line) {
            Ok(domain) if !domains.contains(&domain) => domains.push(domain),
            Ok(_) => {}
            Err(_) => {
                tracing::warn!("Skipping invalid domain on line {}: '{}'", lineno + 1, line);
            }
        }
    }
    domains
}

#[async_trait]
impl DomainStore for FileDomainStore {
    async fn insert(&self, domain: Domain) -> Result<AddOutcome, Error> {
        let mut guard = self.domains.write().await;
        if guard.contains(&domain) {
            return Ok(AddOutcome::AlreadyExists);
        }

        guard.push(domain);
        if let Err(e) = self.persist(&guard).await {
            guard.pop();
            return Err(e);
        }
        Ok(AddOutcome::Added)
    }

    async fn remove(&self, name: &str) -> Result<RemoveOutcome, Error> {
        let mut guard = self.domains.write().await;
        let Some(index) = guard.iter().position(|d| d.as_str() == name) else {
            return Ok(RemoveOutcome::NotFound);
        };

        let removed = guard.remove(index);
        if let Err(e) = self.persist(&guard).await {
            guard.insert(index, removed);
            return Err(e);
        }
        Ok(RemoveOutcome::Removed)
    }

    async fn list(&self) -> Result<Vec<Domain>, Error> {
        Ok(self.domains.read().await.clone())
    }

    async fn flush(&self) -> Result<(), Error> {
        let guard = self.domains.write().await;
        self.persist(&guard).await
    }
}

/// Factory for the `file` store type
pub struct FileDomainStoreFactory;

#[async_trait]
impl DomainStoreFactory for FileDomainStoreFactory {
    async fn create(&self, config: &StoreConfig) -> Result<Box<dyn DomainStore>, Error> {
        match config {
            StoreConfig::File { path } => Ok(Box::new(FileDomainStore::new(path).await?)),
            other => Err(Error::config(format!(
                "File store factory cannot build a '{}' store",
                other.type_name()
            ))),
        }
    }
}
