//! # Attestation Codec: Canonical Message Construction
//!
//! This module defines `CanonicalMessage`, the sole construction path for the
//! bytes a verifier signs and the escrow verifies.
//!
//! ## Wire Grammar
//!
//! ```text
//! app:{app_id}|ms:{milestone_index}|status:{status}|ts:{timestamp}|hash:{milestone_hash}|proof:{proof_hash}
//! ```
//!
//! Field order and delimiter are fixed. Numeric fields are decimal integers
//! without sign or padding. String fields are inserted verbatim and
//! `proof_hash` may be empty. Existing signatures were produced over exactly
//! these bytes, so any deviation makes them unverifiable.
//!
//! ## Security Invariant
//!
//! `CanonicalMessage` has a private inner field. The only constructor is
//! [`AttestationMessage::encode()`], which rejects any string field that
//! contains the `|` delimiter. A field can therefore never smuggle in an
//! extra segment, and parsing a canonical message is unambiguous.

use serde::{Deserialize, Serialize};

use crate::error::CodecError;
use crate::identity::AppId;

/// Separator between the six message segments.
pub const FIELD_DELIMITER: char = '|';

/// Status a verifier asserts when a milestone passed inspection.
pub const STATUS_PASS: &str = "PASS";

/// Status a verifier asserts when a milestone failed inspection.
pub const STATUS_FAIL: &str = "FAIL";

const PREFIXES: [&str; 6] = ["app:", "ms:", "status:", "ts:", "hash:", "proof:"];

/// The structured content of an attestation.
///
/// Not persisted anywhere; it is built on demand by the signer and, in
/// strict mode, re-derived by the escrow from the caller's message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttestationMessage {
    /// Escrow instance the attestation is bound to.
    pub app_id: AppId,
    /// Milestone the attestation speaks about.
    pub milestone_index: u64,
    /// Verdict, e.g. [`STATUS_PASS`].
    pub status: String,
    /// Unix seconds at which the verdict was issued.
    pub timestamp: u64,
    /// Reference hash of the milestone specification.
    pub milestone_hash: String,
    /// Hash of the proof the contractor submitted. May be empty.
    pub proof_hash: String,
}

/// The exact bytes that are signed and verified.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalMessage(String);

impl CanonicalMessage {
    /// The message bytes (UTF-8).
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// The message text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the owned message text.
    pub fn into_string(self) -> String {
        self.0
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false for a well-formed message; present for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for CanonicalMessage {
    fn as_ref(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl std::fmt::Display for CanonicalMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AttestationMessage {
    /// Assemble an attestation from its fields.
    pub fn new(
        app_id: AppId,
        milestone_index: u64,
        status: impl Into<String>,
        timestamp: u64,
        milestone_hash: impl Into<String>,
        proof_hash: impl Into<String>,
    ) -> Self {
        Self {
            app_id,
            milestone_index,
            status: status.into(),
            timestamp,
            milestone_hash: milestone_hash.into(),
            proof_hash: proof_hash.into(),
        }
    }

    /// Encode into canonical form.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::DelimiterInField`] if `status`, `milestone_hash`,
    /// or `proof_hash` contains `|`.
    pub fn encode(&self) -> Result<CanonicalMessage, CodecError> {
        check_field("status", &self.status)?;
        check_field("milestone_hash", &self.milestone_hash)?;
        check_field("proof_hash", &self.proof_hash)?;
        Ok(CanonicalMessage(format!(
            "app:{}|ms:{}|status:{}|ts:{}|hash:{}|proof:{}",
            self.app_id,
            self.milestone_index,
            self.status,
            self.timestamp,
            self.milestone_hash,
            self.proof_hash
        )))
    }

    /// Parse a message produced under the wire grammar.
    ///
    /// Parsing is lenient about numeric spelling (`007` parses as 7); callers
    /// that need byte-exactness re-encode the result and compare.
    pub fn parse(message: &str) -> Result<Self, CodecError> {
        let segments: Vec<&str> = message.split(FIELD_DELIMITER).collect();
        if segments.len() != PREFIXES.len() {
            return Err(CodecError::SegmentCount(segments.len()));
        }

        let mut values = [""; 6];
        for (position, (segment, prefix)) in segments.iter().zip(PREFIXES).enumerate() {
            values[position] = segment
                .strip_prefix(prefix)
                .ok_or(CodecError::MissingPrefix { position, expected: prefix })?;
        }

        Ok(Self {
            app_id: AppId(parse_decimal("app_id", values[0])?),
            milestone_index: parse_decimal("milestone_index", values[1])?,
            status: values[2].to_string(),
            timestamp: parse_decimal("timestamp", values[3])?,
            milestone_hash: values[4].to_string(),
            proof_hash: values[5].to_string(),
        })
    }

    /// Parse raw message bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        let text = std::str::from_utf8(bytes).map_err(|_| CodecError::NotUtf8)?;
        Self::parse(text)
    }
}

/// Encode an attestation directly from its fields.
pub fn encode(
    app_id: AppId,
    milestone_index: u64,
    status: &str,
    timestamp: u64,
    milestone_hash: &str,
    proof_hash: &str,
) -> Result<CanonicalMessage, CodecError> {
    AttestationMessage::new(app_id, milestone_index, status, timestamp, milestone_hash, proof_hash)
        .encode()
}

fn check_field(field: &'static str, value: &str) -> Result<(), CodecError> {
    if value.contains(FIELD_DELIMITER) {
        return Err(CodecError::DelimiterInField { field });
    }
    Ok(())
}

fn parse_decimal(field: &'static str, value: &str) -> Result<u64, CodecError> {
    let not_integer = || CodecError::NotAnInteger {
        field,
        value: value.to_string(),
    };
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(not_integer());
    }
    value.parse::<u64>().map_err(|_| not_integer())
}
