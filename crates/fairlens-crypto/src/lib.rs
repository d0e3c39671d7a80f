//! # fairlens-crypto: Cryptographic Primitives
//!
//! Provides the cryptographic building blocks for FairLens escrow:
//!
//! - **Ed25519** key generation, signing, and verification. Verification
//!   never panics and never returns an error to the state machine: it
//!   answers `true` or `false`, with the failure kind available separately
//!   for logging.
//! - **Attestation signer**: the off-chain verifier's signing service,
//!   composing the canonical message codec with Ed25519.
//! - **SHA-256** content identifiers for metadata stored off-ledger.
//!
//! ## Crate Policy
//!
//! - Depends only on `fairlens-core` internally.
//! - No mocking of cryptographic operations in tests. All tests use real
//!   Ed25519 and real SHA-256.
//! - Private keys are never serialized, logged, or shown by `Debug`.

pub mod ed25519;
pub mod error;
pub mod hex;
pub mod sha256;
pub mod signer;

pub use ed25519::{verify, verify_detailed, Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature};
pub use error::{CryptoError, VerificationError};
pub use sha256::{content_id, sha256_hex};
pub use signer::{AttestationRequest, AttestationSigner, SignedAttestation};
