//! # Crypto Errors
//!
//! `CryptoError` covers key and signature parsing plus attestation encoding.
//! `VerificationError` explains why a signature check answered `false`.

use fairlens_core::CodecError;
use thiserror::Error;

/// Error in key handling, signature parsing, or attestation signing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Key material has the wrong length or is not valid hex.
    #[error("key error: {0}")]
    KeyError(String),

    /// Signature material has the wrong length or is not valid hex.
    #[error("signature error: {0}")]
    SignatureFormat(String),

    /// The attestation could not be encoded into canonical form.
    #[error("attestation encoding failed: {0}")]
    Encoding(#[from] CodecError),
}

/// Reason a signature check failed.
///
/// Observability only. The state machine receives a plain boolean from
/// [`crate::verify()`]; this kind goes to the logs so a malformed
/// submission can be told apart from a forged one.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerificationError {
    /// The stored public key is not a valid Ed25519 point or not 32 bytes.
    #[error("malformed public key: {0}")]
    MalformedKey(String),

    /// The supplied signature is not 64 bytes.
    #[error("malformed signature: expected 64 bytes, got {0}")]
    MalformedSignature(usize),

    /// The signature is well-formed but does not match the message and key.
    #[error("signature does not match message")]
    Mismatch,
}

impl VerificationError {
    /// Short label for structured logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::MalformedKey(_) => "malformed_key",
            Self::MalformedSignature(_) => "malformed_signature",
            Self::Mismatch => "mismatch",
        }
    }
}
