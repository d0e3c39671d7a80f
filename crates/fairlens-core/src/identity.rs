//! # Domain Identity Newtypes
//!
//! Newtype wrappers for the identifiers an escrow deals in. You cannot pass
//! an `AppId` where an `Address` is expected, and an `Address` can only be
//! built through a validating constructor.
//!
//! ## Security Invariant
//!
//! Role checks in the state machine compare `Address` values. Because an
//! address is never empty and never carries surrounding whitespace, a
//! padded or blank caller string cannot accidentally match a stored role.

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ValidationError;

/// Identifier of a deployed escrow instance.
///
/// Rendered as a plain decimal integer, which is the form that appears in
/// the `app:` field of the canonical attestation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppId(pub u64);

impl AppId {
    /// Wrap a raw application number.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Access the raw application number.
    pub fn value(&self) -> u64 {
        self.0
    }

    /// Parse an application id from its decimal representation.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        s.trim()
            .parse::<u64>()
            .map(Self)
            .map_err(|_| ValidationError::InvalidAppId(s.to_string()))
    }
}

impl std::fmt::Display for AppId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An account identity: the owner, the contractor, or a caller.
///
/// The format is opaque to the escrow (ledger addresses, DIDs, and test
/// names all work). It must be non-empty and free of whitespace.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    /// Validate and wrap an address string.
    pub fn new(s: impl Into<String>) -> Result<Self, ValidationError> {
        let s = s.into();
        if s.is_empty() || s.chars().any(char::is_whitespace) {
            return Err(ValidationError::InvalidAddress(s));
        }
        Ok(Self(s))
    }

    /// Borrow the address string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::new(s).map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Address {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}
