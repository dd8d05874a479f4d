//! Validated domain names
//!
//! A [`Domain`] can only be constructed through [`Domain::parse`], so every
//! value that reaches a store or the engine has already passed validation.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Maximum length of a domain name (RFC 1035)
pub const MAX_DOMAIN_LEN: usize = 253;

/// A hostname accepted into the allowlist
///
/// Non-empty, at most [`MAX_DOMAIN_LEN`] characters, and made only of ASCII
/// letters, digits, `.` and `-`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Domain(String);

impl Domain {
    /// Validate and wrap a domain name
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFormat`] if `name` is empty, too long, or
    /// contains anything outside `[a-zA-Z0-9.-]`.
    pub fn parse(name: &str) -> Result<Self> {
        if is_valid_domain(name) {
            Ok(Self(name.to_string()))
        } else {
            Err(Error::invalid_format(name))
        }
    }

    /// Borrow the domain as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the domain, returning the inner string
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Domain {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for Domain {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Domain::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Check a candidate name against the allowlist character class
pub fn is_valid_domain(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_DOMAIN_LEN
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
}

/// Result of adding a domain to a store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// The domain was inserted
    Added,
    /// The domain was already present (no-op)
    AlreadyExists,
}

/// Result of removing a domain from a store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    /// The domain was deleted
    Removed,
    /// The domain was not present (no-op)
    NotFound,
}
