//! # Attestation Signer
//!
//! The off-chain verifier's signing service. It builds the canonical
//! attestation message for a milestone verdict and signs it with the
//! verifier's private key.
//!
//! The signer is stateless apart from its key. Concurrent callers share it
//! behind an `Arc`; signing needs only `&self`.

use fairlens_core::attestation::AttestationMessage;
use fairlens_core::{AppId, Timestamp, STATUS_PASS};
use serde::{Deserialize, Serialize};

use crate::ed25519::{Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature};
use crate::error::CryptoError;

/// The fields a verifier attests to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestationRequest {
    pub app_id: AppId,
    pub milestone_index: u64,
    #[serde(default = "default_status")]
    pub status: String,
    pub milestone_hash: String,
    #[serde(default)]
    pub proof_hash: String,
    /// Unix seconds. Defaults to the signing time when absent.
    #[serde(default)]
    pub timestamp: Option<u64>,
}

fn default_status() -> String {
    STATUS_PASS.to_string()
}

/// A signed attestation as returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedAttestation {
    pub app_id: AppId,
    pub milestone_index: u64,
    pub status: String,
    pub timestamp: u64,
    pub milestone_hash: String,
    pub proof_hash: String,
    /// The exact canonical text that was signed.
    pub message: String,
    pub signature: Ed25519Signature,
    pub verifier_public_key: Ed25519PublicKey,
}

/// Signs attestations with the verifier key.
pub struct AttestationSigner {
    keypair: Ed25519KeyPair,
}

impl AttestationSigner {
    pub fn new(keypair: Ed25519KeyPair) -> Self {
        Self { keypair }
    }

    /// Signer with a freshly generated key.
    pub fn generate() -> Self {
        Self::new(Ed25519KeyPair::generate())
    }

    /// Signer from a hex-encoded 32-byte seed.
    pub fn from_seed_hex(hex: &str) -> Result<Self, CryptoError> {
        Ed25519KeyPair::from_seed_hex(hex).map(Self::new)
    }

    pub fn public_key(&self) -> Ed25519PublicKey {
        self.keypair.public_key()
    }

    /// Build the canonical message for `request` and sign it.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::Encoding`] if a string field contains the
    /// message delimiter.
    pub fn sign_attestation(
        &self,
        request: &AttestationRequest,
    ) -> Result<SignedAttestation, CryptoError> {
        let timestamp = request
            .timestamp
            .unwrap_or_else(|| Timestamp::now().epoch_secs());
        let attestation = AttestationMessage::new(
            request.app_id,
            request.milestone_index,
            request.status.clone(),
            timestamp,
            request.milestone_hash.clone(),
            request.proof_hash.clone(),
        );
        let message = attestation.encode()?;
        let signature = self.keypair.sign_canonical(&message);

        tracing::info!(
            app_id = %request.app_id,
            milestone_index = request.milestone_index,
            status = %request.status,
            timestamp,
            "signed attestation"
        );

        Ok(SignedAttestation {
            app_id: attestation.app_id,
            milestone_index: attestation.milestone_index,
            status: attestation.status,
            timestamp,
            milestone_hash: attestation.milestone_hash,
            proof_hash: attestation.proof_hash,
            message: message.into_string(),
            signature,
            verifier_public_key: self.public_key(),
        })
    }
}

impl std::fmt::Debug for AttestationSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttestationSigner")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}
