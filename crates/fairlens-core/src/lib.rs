//! # fairlens-core: Foundational Types for FairLens Escrow
//!
//! This crate is the leaf of the FairLens dependency graph. It defines the
//! primitives every other crate agrees on: who is calling, when something
//! happened, what exactly a verifier signs, and how failures are classified.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype wrappers for identifiers.** `AppId` and `Address` are
//!    distinct types with validated constructors. No bare strings for
//!    identities.
//!
//! 2. **`CanonicalMessage` newtype.** The bytes a verifier signs can only be
//!    produced by [`AttestationMessage::encode()`]. Nothing hand-assembles
//!    an attestation string with `format!`.
//!
//! 3. **Single `ErrorKind` taxonomy.** One closed enum classifies every
//!    rejection of an escrow operation. The HTTP façade and the CLI both
//!    switch on it exhaustively.
//!
//! 4. **UTC-only timestamps.** `Timestamp` is UTC, second precision, and
//!    converts losslessly to the decimal epoch seconds used on the wire.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `fairlens-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod attestation;
pub mod error;
pub mod identity;
pub mod temporal;

pub use attestation::{AttestationMessage, CanonicalMessage, FIELD_DELIMITER, STATUS_FAIL, STATUS_PASS};
pub use error::{CodecError, ErrorKind, ValidationError};
pub use identity::{Address, AppId};
pub use temporal::Timestamp;
