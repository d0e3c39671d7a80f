//! # Attestation Subcommands
//!
//! Verifier key generation, attestation encoding and signing, and
//! signature verification. Key files hold lowercase hex: the 32-byte seed
//! in `<prefix>.key`, the public key in `<prefix>.pub`.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;
use zeroize::Zeroizing;

use fairlens_core::{AppId, AttestationMessage, STATUS_PASS};
use fairlens_crypto::{verify_detailed, AttestationRequest, AttestationSigner, Ed25519KeyPair};

/// Arguments for `fairlens keygen`.
#[derive(Args, Debug)]
pub struct KeygenArgs {
    /// Output directory for the key files.
    #[arg(long, short, default_value = ".")]
    pub output: PathBuf,
    /// Prefix for the key filenames.
    #[arg(long, default_value = "verifier")]
    pub prefix: String,
}

/// Attestation fields shared by `encode` and `sign`.
#[derive(Args, Debug, Clone)]
pub struct AttestationFields {
    #[arg(long)]
    pub app_id: u64,
    #[arg(long = "milestone")]
    pub milestone_index: u64,
    #[arg(long, default_value = STATUS_PASS)]
    pub status: String,
    /// Unix seconds. Defaults to now when signing.
    #[arg(long)]
    pub timestamp: Option<u64>,
    /// Reference hash of the milestone specification.
    #[arg(long = "hash")]
    pub milestone_hash: String,
    /// Hash of the submitted proof.
    #[arg(long = "proof", default_value = "")]
    pub proof_hash: String,
}

impl AttestationFields {
    fn to_request(&self) -> AttestationRequest {
        AttestationRequest {
            app_id: AppId::new(self.app_id),
            milestone_index: self.milestone_index,
            status: self.status.clone(),
            milestone_hash: self.milestone_hash.clone(),
            proof_hash: self.proof_hash.clone(),
            timestamp: self.timestamp,
        }
    }
}

/// Arguments for `fairlens encode`.
#[derive(Args, Debug)]
pub struct EncodeArgs {
    #[command(flatten)]
    pub fields: AttestationFields,
}

/// Arguments for `fairlens sign`.
#[derive(Args, Debug)]
pub struct SignArgs {
    /// Path to the verifier key file (hex seed).
    #[arg(long)]
    pub key: PathBuf,
    #[command(flatten)]
    pub fields: AttestationFields,
}

/// Arguments for `fairlens verify`.
#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Path to the public key file (hex).
    #[arg(long)]
    pub pubkey: PathBuf,
    /// The exact message text that was signed.
    #[arg(long)]
    pub message: String,
    /// Hex-encoded 64-byte signature.
    #[arg(long)]
    pub signature: String,
}

/// Generate a verifier keypair and write it to `<output>/<prefix>.{key,pub}`.
pub fn run_keygen(args: &KeygenArgs) -> Result<u8> {
    let output_dir = &args.output;
    std::fs::create_dir_all(output_dir).with_context(|| {
        format!("failed to create output directory: {}", output_dir.display())
    })?;

    let keypair = Ed25519KeyPair::generate();
    let pk_hex = keypair.public_key().to_hex();

    let sk_path = output_dir.join(format!("{}.key", args.prefix));
    let pk_path = output_dir.join(format!("{}.pub", args.prefix));

    std::fs::write(&sk_path, keypair.seed_hex().as_bytes())
        .with_context(|| format!("failed to write private key: {}", sk_path.display()))?;
    std::fs::write(&pk_path, &pk_hex)
        .with_context(|| format!("failed to write public key: {}", pk_path.display()))?;

    println!("OK: generated verifier keypair");
    println!("  Private key: {}", sk_path.display());
    println!("  Public key:  {}", pk_path.display());
    println!("  Public key (hex): {pk_hex}");
    Ok(0)
}

/// Print the canonical message for the given fields.
pub fn run_encode(args: &EncodeArgs) -> Result<u8> {
    let f = &args.fields;
    let Some(timestamp) = f.timestamp else {
        bail!("--timestamp is required for encode");
    };
    let message = AttestationMessage::new(
        AppId::new(f.app_id),
        f.milestone_index,
        f.status.as_str(),
        timestamp,
        f.milestone_hash.as_str(),
        f.proof_hash.as_str(),
    )
    .encode()
    .context("attestation fields cannot be encoded")?;
    println!("{message}");
    Ok(0)
}

/// Sign an attestation and print it as JSON.
pub fn run_sign(args: &SignArgs) -> Result<u8> {
    let signer = load_signer(&args.key)?;
    let signed = signer
        .sign_attestation(&args.fields.to_request())
        .context("attestation fields cannot be encoded")?;
    println!("{}", serde_json::to_string_pretty(&signed)?);
    Ok(0)
}

/// Verify a signature. Exit code 0 when valid, 1 otherwise.
pub fn run_verify(args: &VerifyArgs) -> Result<u8> {
    let pk_hex = read_trimmed(&args.pubkey, "public key")?;
    let public_key = fairlens_crypto::hex::decode(&pk_hex).context("invalid public key hex")?;
    let signature = fairlens_crypto::hex::decode(&args.signature).context("invalid signature hex")?;

    if let Err(e) = AttestationMessage::parse(&args.message) {
        tracing::warn!(error = %e, "message is not a canonical attestation");
    }

    match verify_detailed(&public_key, args.message.as_bytes(), &signature) {
        Ok(()) => {
            println!("OK: signature is valid");
            Ok(0)
        }
        Err(e) => {
            println!("FAIL: signature verification failed: {e}");
            Ok(1)
        }
    }
}

/// Load a signer from a hex seed file.
pub fn load_signer(path: &Path) -> Result<AttestationSigner> {
    let seed = Zeroizing::new(read_trimmed(path, "private key")?);
    AttestationSigner::from_seed_hex(&seed)
        .map_err(|e| anyhow::anyhow!("invalid private key in {}: {e}", path.display()))
}

fn read_trimmed(path: &Path, what: &str) -> Result<String> {
    if !path.exists() {
        bail!("{what} file not found: {}", path.display());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {what}: {}", path.display()))?;
    Ok(content.trim().to_string())
}
