//! # API Route Modules
//!
//! - `escrows`: escrow deployment, operation calls, lifecycle actions and
//!   the snapshot/history reads.
//! - `attest`: the verifier signing service, stand-alone attestation
//!   verification and the verifier public key.

pub mod attest;
pub mod escrows;
