//! # Ed25519 Signing and Verification
//!
//! Provides Ed25519 key generation, signing, and verification for verifier
//! attestations.
//!
//! ## Security Invariant
//!
//! - Private keys are never serialized or logged. `Ed25519KeyPair` does not
//!   implement `Serialize` and its `Debug` output is redacted. The seed can
//!   only be exported as a [`Zeroizing`] string.
//! - [`verify()`] takes raw byte slices and never panics. Any length or
//!   decoding problem is a `false`, not an error, so a malformed submission
//!   cannot abort the caller in a different way than a forged one.
//!
//! ## Serde
//!
//! - Public keys serialize/deserialize as hex-encoded strings.
//! - Signatures serialize/deserialize as hex-encoded strings.

use ed25519_dalek::{Signer, Verifier};
use fairlens_core::CanonicalMessage;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::{Zeroize, Zeroizing};

use crate::error::{CryptoError, VerificationError};
use crate::hex;

/// An Ed25519 public key (32 bytes).
///
/// Construction only checks the length. Whether the bytes decode to a curve
/// point is discovered at verification time, where it yields `false`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ed25519PublicKey(pub [u8; 32]);

/// An Ed25519 signature (64 bytes).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ed25519Signature(pub [u8; 64]);

/// An Ed25519 key pair held by the off-chain verifier.
pub struct Ed25519KeyPair {
    signing_key: ed25519_dalek::SigningKey,
}

// ---------------------------------------------------------------------------
// Ed25519PublicKey impls
// ---------------------------------------------------------------------------

impl Ed25519PublicKey {
    /// Create a public key from raw 32 bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Create a public key from a slice, which must be exactly 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let arr: [u8; 32] = bytes.try_into().map_err(|_| {
            CryptoError::KeyError(format!("public key must be 32 bytes, got {}", bytes.len()))
        })?;
        Ok(Self(arr))
    }

    /// Parse a public key from a 64-character hex string.
    pub fn from_hex(hex: &str) -> Result<Self, CryptoError> {
        Self::from_slice(&hex::decode(hex)?)
    }

    /// Return the raw 32-byte public key.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Render the public key as a lowercase hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// Convert to an `ed25519_dalek::VerifyingKey`.
    pub fn to_verifying_key(&self) -> Result<ed25519_dalek::VerifyingKey, CryptoError> {
        ed25519_dalek::VerifyingKey::from_bytes(&self.0)
            .map_err(|e| CryptoError::KeyError(format!("invalid public key: {e}")))
    }
}

impl Serialize for Ed25519PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Ed25519PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        Self::from_hex(&hex).map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Debug for Ed25519PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Ed25519PublicKey({}...)", hex::prefix(&self.0))
    }
}

impl std::fmt::Display for Ed25519PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

// ---------------------------------------------------------------------------
// Ed25519Signature impls
// ---------------------------------------------------------------------------

impl Ed25519Signature {
    /// Create a signature from raw 64 bytes.
    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    /// Create a signature from a slice, which must be exactly 64 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let arr: [u8; 64] = bytes.try_into().map_err(|_| {
            CryptoError::SignatureFormat(format!("signature must be 64 bytes, got {}", bytes.len()))
        })?;
        Ok(Self(arr))
    }

    /// Parse a signature from a 128-character hex string.
    pub fn from_hex(hex: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(hex).map_err(|e| CryptoError::SignatureFormat(e.to_string()))?;
        Self::from_slice(&bytes)
    }

    /// Return the raw 64-byte signature.
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    /// Render the signature as a lowercase hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl Serialize for Ed25519Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Ed25519Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        Self::from_hex(&hex).map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Debug for Ed25519Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Ed25519Signature({}...)", hex::prefix(&self.0))
    }
}

impl std::fmt::Display for Ed25519Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

// ---------------------------------------------------------------------------
// Ed25519KeyPair impls
// ---------------------------------------------------------------------------

impl Ed25519KeyPair {
    /// Generate a new random key pair from the operating system RNG.
    pub fn generate() -> Self {
        let mut csprng = rand::rngs::OsRng;
        Self {
            signing_key: ed25519_dalek::SigningKey::generate(&mut csprng),
        }
    }

    /// Create a key pair from a raw 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: ed25519_dalek::SigningKey::from_bytes(seed),
        }
    }

    /// Create a key pair from a hex-encoded 32-byte seed.
    pub fn from_seed_hex(hex: &str) -> Result<Self, CryptoError> {
        let mut bytes = hex::decode(hex)?;
        let result = <[u8; 32]>::try_from(bytes.as_slice())
            .map(|seed| Self::from_seed(&seed))
            .map_err(|_| {
                CryptoError::KeyError(format!("private key must be 32 bytes, got {}", bytes.len()))
            });
        bytes.zeroize();
        result
    }

    /// Export the seed as hex. The returned string is wiped on drop.
    pub fn seed_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(hex::encode(self.signing_key.as_bytes()))
    }

    /// The public half of this key pair.
    pub fn public_key(&self) -> Ed25519PublicKey {
        Ed25519PublicKey(self.signing_key.verifying_key().to_bytes())
    }

    /// Sign arbitrary message bytes. Deterministic per RFC 8032.
    pub fn sign(&self, message: &[u8]) -> Ed25519Signature {
        Ed25519Signature(self.signing_key.sign(message).to_bytes())
    }

    /// Sign a canonical attestation message.
    pub fn sign_canonical(&self, message: &CanonicalMessage) -> Ed25519Signature {
        self.sign(message.as_bytes())
    }
}

impl std::fmt::Debug for Ed25519KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Ed25519KeyPair(<private>)")
    }
}

// ---------------------------------------------------------------------------
// Verification
// ---------------------------------------------------------------------------

/// Verify a signature, reporting why it failed.
///
/// Accepts arbitrary slices: a key that is not 32 bytes or not a curve
/// point, or a signature that is not 64 bytes, is reported as malformed
/// rather than panicking.
pub fn verify_detailed(
    public_key: &[u8],
    message: &[u8],
    signature: &[u8],
) -> Result<(), VerificationError> {
    let key_bytes: [u8; 32] = public_key.try_into().map_err(|_| {
        VerificationError::MalformedKey(format!("expected 32 bytes, got {}", public_key.len()))
    })?;
    let verifying_key = ed25519_dalek::VerifyingKey::from_bytes(&key_bytes)
        .map_err(|e| VerificationError::MalformedKey(e.to_string()))?;

    let sig_bytes: [u8; 64] = signature
        .try_into()
        .map_err(|_| VerificationError::MalformedSignature(signature.len()))?;
    let sig = ed25519_dalek::Signature::from_bytes(&sig_bytes);

    verifying_key
        .verify(message, &sig)
        .map_err(|_| VerificationError::Mismatch)
}

/// Verify a signature. True iff `signature` is a valid Ed25519 signature of
/// `message` under `public_key`.
pub fn verify(public_key: &[u8], message: &[u8], signature: &[u8]) -> bool {
    verify_detailed(public_key, message, signature).is_ok()
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// Signatures produced by a key always verify under its public key.
        #[test]
        fn sign_then_verify(seed in any::<[u8; 32]>(), message in prop::collection::vec(any::<u8>(), 0..256)) {
            let kp = Ed25519KeyPair::from_seed(&seed);
            let sig = kp.sign(&message);
            prop_assert!(verify(kp.public_key().as_bytes(), &message, sig.as_bytes()));
        }

        /// Flipping any single bit of the signature breaks verification.
        #[test]
        fn signature_bit_flip_rejected(seed in any::<[u8; 32]>(),
                                       message in prop::collection::vec(any::<u8>(), 0..128),
                                       bit in 0usize..512) {
            let kp = Ed25519KeyPair::from_seed(&seed);
            let mut sig = *kp.sign(&message).as_bytes();
            sig[bit / 8] ^= 1 << (bit % 8);
            prop_assert!(!verify(kp.public_key().as_bytes(), &message, &sig));
        }

        /// Flipping any single bit of the message breaks verification.
        #[test]
        fn message_bit_flip_rejected(seed in any::<[u8; 32]>(),
                                     message in prop::collection::vec(any::<u8>(), 1..128),
                                     bit in any::<prop::sample::Index>()) {
            let kp = Ed25519KeyPair::from_seed(&seed);
            let sig = kp.sign(&message);
            let mut tampered = message.clone();
            let bit = bit.index(tampered.len() * 8);
            tampered[bit / 8] ^= 1 << (bit % 8);
            prop_assert!(!verify(kp.public_key().as_bytes(), &tampered, sig.as_bytes()));
        }
    }
}
