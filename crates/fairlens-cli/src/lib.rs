//! # fairlens-cli: FairLens Command-Line Interface
//!
//! Offline tooling for verifiers and escrow operators.
//!
//! ## Subcommands
//!
//! - `keygen`: generate a verifier keypair
//! - `encode`: print the canonical attestation message for given fields
//! - `sign`: sign an attestation with a verifier key file
//! - `verify`: check a signature over a message
//! - `simulate`: replay a YAML scenario against an in-memory escrow
//!
//! ## Crate Policy
//!
//! Argument parsing lives in `main.rs`; handlers return an exit code and
//! delegate to the domain crates.

pub mod signing;
pub mod simulate;

use std::path::Path;

use anyhow::{Context, Result};
use fairlens_state::EscrowConfig;

/// Load the escrow config named by `--config`, or the defaults.
pub fn load_config(path: Option<&Path>) -> Result<EscrowConfig> {
    match path {
        Some(path) => EscrowConfig::load(path)
            .with_context(|| format!("invalid escrow config: {}", path.display())),
        None => Ok(EscrowConfig::default()),
    }
}
