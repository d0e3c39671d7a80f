//! # SHA-256 Content Identifiers
//!
//! Metadata attached to an attestation is stored off-ledger and referenced
//! by a content identifier of the form `sha256:<hex>`.
//!
//! JSON values are hashed over their compact serialization. `serde_json`
//! keeps object keys in sorted order (no `preserve_order` feature), so two
//! documents with the same members produce the same identifier regardless
//! of the key order they arrived in.

use sha2::{Digest, Sha256};

/// Prefix of every content identifier.
pub const CONTENT_ID_PREFIX: &str = "sha256:";

/// Compute the lowercase hex SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    crate::hex::encode(&Sha256::digest(data))
}

/// Compute the content identifier of a JSON document.
pub fn content_id(value: &serde_json::Value) -> String {
    // Serializing a `Value` cannot fail: all map keys are strings.
    let bytes = serde_json::to_vec(value).unwrap_or_default();
    format!("{CONTENT_ID_PREFIX}{}", sha256_hex(&bytes))
}
