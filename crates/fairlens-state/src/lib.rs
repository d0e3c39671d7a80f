//! # fairlens-state: Escrow State Machine
//!
//! The authoritative escrow logic: a typed milestone ledger and the
//! role-gated transition function that releases funds only against a valid
//! verifier attestation.
//!
//! ## Modules
//!
//! - **Ledger** (`ledger.rs`): `EscrowLedger` and `Milestone`, with the three
//!   primitive mutations `define_milestone`, `record_proof` and
//!   `release_milestone`.
//!
//! - **Operation** (`operation.rs`): decodes `[name, args…]` call arrays into
//!   the closed `Operation` enum, accepting the historical name aliases.
//!
//! - **Escrow** (`escrow.rs`): the state machine. Checks argument shape,
//!   lifecycle, caller role and ledger preconditions in that order, verifies
//!   attestations, stages every mutation on a ledger clone and commits only
//!   after the payout sink accepted.
//!
//! - **Payout** (`payout.rs`): payout instructions, receipts, the
//!   `PayoutSink` seam and the custodial account.
//!
//! - **Config** (`config.rs`): `EscrowConfig` loaded from YAML.
//!
//! ## Concurrency
//!
//! `Escrow` is a plain value. Operations on one instance are serialized by
//! whoever owns it (`&mut self`); distinct instances share nothing.

pub mod config;
pub mod escrow;
pub mod ledger;
pub mod operation;
pub mod payout;

pub use config::{AttestationPolicy, ConfigError, EscrowConfig};

pub use escrow::{
    CallOutcome, Escrow, EscrowError, EscrowSnapshot, EscrowStatus, LifecycleAction, Role,
    TransitionRecord,
};

pub use ledger::{EscrowLedger, LedgerError, Milestone};

pub use operation::{DecodeError, Operation, OperationKind};

pub use payout::{CustodialAccount, PayoutError, PayoutInstruction, PayoutLog, PayoutReceipt, PayoutSink};
