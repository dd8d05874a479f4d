//! Error types for the wgdomain system
//!
//! This module defines all error types used throughout the crate.
//!
//! Per-domain resolution failures ([`ResolveError`]) and firewall rejections
//! ([`ApplyError`]) have their own types because the engine reports them
//! rather than propagating them.

use thiserror::Error;

/// Result type alias for wgdomain operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the wgdomain system
#[derive(Error, Debug)]
pub enum Error {
    /// Domain name failed syntactic validation
    #[error("Invalid domain format: {0}")]
    InvalidFormat(String),

    /// Domain store-related errors
    #[error("Domain store error: {0}")]
    Store(String),

    /// Resolver construction or configuration errors
    #[error("Resolver error: {0}")]
    Resolver(String),

    /// Firewall adapter errors outside of a reconciliation cycle
    #[error("Firewall error: {0}")]
    Firewall(String),

    /// A reconciliation cycle is already running
    #[error("Reconciliation already in progress")]
    CycleInProgress,

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an invalid format error
    pub fn invalid_format(msg: impl Into<String>) -> Self {
        Self::InvalidFormat(msg.into())
    }

    /// Create a domain store error
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Create a resolver error
    pub fn resolver(msg: impl Into<String>) -> Self {
        Self::Resolver(msg.into())
    }

    /// Create a firewall error
    pub fn firewall(msg: impl Into<String>) -> Self {
        Self::Firewall(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

/// Why a single domain failed to resolve
///
/// These never abort a reconciliation cycle; the engine records them
/// against the domain and carries on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// No answer within the configured timeout
    #[error("resolution timed out")]
    Timeout,

    /// The name does not exist or has no A/AAAA records
    #[error("no addresses found")]
    NotFound,

    /// Transport-level failure talking to the resolver
    #[error("resolver unavailable: {0}")]
    ResolverUnavailable(String),
}

impl ResolveError {
    /// Create a resolver-unavailable error
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::ResolverUnavailable(msg.into())
    }
}

/// Firewall adapter refused or failed to swap in a new address set
///
/// On any of these the previously active ruleset is still in force.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApplyError {
    /// The packet filter rejected the new ruleset (malformed entry,
    /// missing privileges, resource exhaustion)
    #[error("firewall rejected ruleset: {0}")]
    Rejected(String),

    /// The packet filter could not be reached at all
    #[error("firewall backend unavailable: {0}")]
    Unavailable(String),
}

impl ApplyError {
    /// Create a rejection error
    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::Rejected(msg.into())
    }

    /// Create an unavailable error
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }
}
