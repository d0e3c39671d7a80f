//! # Escrow Configuration
//!
//! Per-deployment parameters of the escrow state machine. Loaded from YAML
//! (the CLI `--config` flag, the API's `FAIRLENS_ESCROW_CONFIG`) or built in
//! code. Every field has a default, so an empty document is a valid config.

use std::path::Path;

use fairlens_core::{FIELD_DELIMITER, STATUS_PASS};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How `VerifyAndRelease` relates the supplied message to the ledger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttestationPolicy {
    /// The message must be the canonical encoding of exactly the milestone
    /// being released: app id, index, release status, reference hash and
    /// submitted proof all taken from the ledger.
    #[default]
    Strict,
    /// Only the signature over the caller's bytes is checked.
    AsSupplied,
}

impl std::fmt::Display for AttestationPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Strict => "strict",
            Self::AsSupplied => "as_supplied",
        })
    }
}

/// Escrow parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EscrowConfig {
    /// Milestone indices must be strictly below this limit.
    pub max_milestones: u64,
    pub attestation_policy: AttestationPolicy,
    /// Status a strict attestation must carry to release funds.
    pub release_status: String,
}

impl Default for EscrowConfig {
    fn default() -> Self {
        Self {
            max_milestones: 64,
            attestation_policy: AttestationPolicy::Strict,
            release_status: STATUS_PASS.to_string(),
        }
    }
}

/// Error loading an [`EscrowConfig`].
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

impl EscrowConfig {
    /// Parse and validate a YAML (or JSON) document.
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        // An empty YAML document deserializes as unit, not as an empty map.
        let config: Self = if text.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(text)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Read, parse, and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_milestones == 0 {
            return Err(ConfigError::Invalid(
                "max_milestones must be at least 1".to_string(),
            ));
        }
        if self.release_status.is_empty() || self.release_status.contains(FIELD_DELIMITER) {
            return Err(ConfigError::Invalid(format!(
                "release_status must be non-empty and free of '{FIELD_DELIMITER}'"
            )));
        }
        Ok(())
    }
}
