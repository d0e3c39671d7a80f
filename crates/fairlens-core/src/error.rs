//! # Error Types: Structured Error Hierarchy
//!
//! Defines the error taxonomy shared by every FairLens crate. All errors use
//! `thiserror` for derive-based `Display` and `Error` implementations.
//!
//! ## Design
//!
//! - [`ErrorKind`] is the closed classification of escrow failures. Each
//!   crate keeps its own error enum with full context and maps into a kind
//!   through a `kind()` accessor.
//! - Codec errors carry the offending field name.
//! - Validation errors carry the rejected value, never key material.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification of every way an escrow operation can be rejected.
///
/// The first eight variants are the canonical taxonomy of the escrow
/// contract. The remaining ones cover the explicit transaction boundary and
/// lifecycle handling that the runtime adds around it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Caller identity does not hold the role the operation requires.
    Unauthorized,
    /// Argument count, shape, or encoding is wrong.
    InvalidArgs,
    /// Milestone definition is malformed or not representable.
    InvalidMilestone,
    /// The referenced milestone is not the one at the cursor.
    MilestoneNotCurrent,
    /// An empty proof was submitted.
    ProofEmpty,
    /// Release was requested before any proof was recorded.
    ProofMissing,
    /// Ed25519 verification returned false.
    SignatureInvalid,
    /// Public key material is malformed.
    InvalidKey,
    /// The supplied attestation does not describe the milestone being released.
    AttestationMismatch,
    /// The escrow instance has been deleted or superseded.
    EscrowClosed,
    /// The payout could not be issued; the whole operation was rolled back.
    PayoutFailed,
    /// A message field could not be encoded.
    Encoding,
}

impl ErrorKind {
    /// Stable machine-readable code (e.g. `"MILESTONE_NOT_CURRENT"`).
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized => "UNAUTHORIZED",
            Self::InvalidArgs => "INVALID_ARGS",
            Self::InvalidMilestone => "INVALID_MILESTONE",
            Self::MilestoneNotCurrent => "MILESTONE_NOT_CURRENT",
            Self::ProofEmpty => "PROOF_EMPTY",
            Self::ProofMissing => "PROOF_MISSING",
            Self::SignatureInvalid => "SIGNATURE_INVALID",
            Self::InvalidKey => "INVALID_KEY",
            Self::AttestationMismatch => "ATTESTATION_MISMATCH",
            Self::EscrowClosed => "ESCROW_CLOSED",
            Self::PayoutFailed => "PAYOUT_FAILED",
            Self::Encoding => "ENCODING_ERROR",
        }
    }

    /// Whether the failure is an authorization failure (403-class).
    pub fn is_authorization(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }

    /// Whether the failure is internal to the runtime rather than caused by
    /// the caller's input (500-class).
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::PayoutFailed)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Error while building or parsing a canonical attestation message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// A string field contains the field delimiter and would make the
    /// encoding ambiguous.
    #[error("field `{field}` contains the delimiter '|'")]
    DelimiterInField {
        /// Name of the offending field.
        field: &'static str,
    },

    /// The message does not have exactly six `|`-separated segments.
    #[error("attestation message must have 6 segments, got {0}")]
    SegmentCount(usize),

    /// A segment does not start with its expected prefix.
    #[error("segment {position} must start with `{expected}`")]
    MissingPrefix {
        /// Zero-based segment position.
        position: usize,
        /// Expected prefix including the colon.
        expected: &'static str,
    },

    /// A numeric segment is not a decimal integer.
    #[error("field `{field}` is not a decimal integer: {value:?}")]
    NotAnInteger {
        /// Name of the numeric field.
        field: &'static str,
        /// The rejected text.
        value: String,
    },

    /// The message bytes are not valid UTF-8.
    #[error("attestation message is not valid UTF-8")]
    NotUtf8,
}

/// Error when validating a domain identifier or timestamp.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Account address is empty or contains whitespace.
    #[error("invalid address: {0:?}")]
    InvalidAddress(String),

    /// Application identifier is not a decimal integer.
    #[error("invalid application id: {0:?}")]
    InvalidAppId(String),

    /// Timestamp could not be parsed or is out of range.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_distinct() {
        let kinds = [
            ErrorKind::Unauthorized,
            ErrorKind::InvalidArgs,
            ErrorKind::InvalidMilestone,
            ErrorKind::MilestoneNotCurrent,
            ErrorKind::ProofEmpty,
            ErrorKind::ProofMissing,
            ErrorKind::SignatureInvalid,
            ErrorKind::InvalidKey,
            ErrorKind::AttestationMismatch,
            ErrorKind::EscrowClosed,
            ErrorKind::PayoutFailed,
            ErrorKind::Encoding,
        ];
        let codes: std::collections::HashSet<_> = kinds.iter().map(|k| k.code()).collect();
        assert_eq!(codes.len(), kinds.len());
    }

    #[test]
    fn serde_uses_screaming_snake_case() {
        let json = serde_json::to_string(&ErrorKind::MilestoneNotCurrent).unwrap();
        assert_eq!(json, "\"MILESTONE_NOT_CURRENT\"");
    }

    #[test]
    fn only_unauthorized_is_authorization() {
        assert!(ErrorKind::Unauthorized.is_authorization());
        assert!(!ErrorKind::SignatureInvalid.is_authorization());
        assert!(ErrorKind::PayoutFailed.is_internal());
        assert!(!ErrorKind::InvalidArgs.is_internal());
    }

    #[test]
    fn codec_error_names_field() {
        let err = CodecError::DelimiterInField { field: "milestone_hash" };
        assert!(err.to_string().contains("milestone_hash"));
    }
}
