//! # Escrow State Machine
//!
//! The role-gated transition function over an [`EscrowLedger`].
//!
//! ## States
//!
//! ```text
//! Created ──▶ Active(0) ──▶ Active(1) ──▶ … ──▶ Completed
//!    │            │                                 │
//!    └────────────┴──────── Delete / Update ────────┴──▶ Deleted | Updated (terminal)
//! ```
//!
//! `Created`, `Active` and `Completed` are derived from the ledger counters.
//! Adding a milestone to a completed escrow makes it active again.
//! `Deleted` and `Updated` are explicit and final: every later mutating call
//! fails with `EscrowClosed`, while `get_state` keeps working.
//!
//! ## Check Order
//!
//! 1. Operation name and argument count.
//! 2. Lifecycle: closed escrows accept only reads.
//! 3. Caller role. A caller without the role learns nothing about the
//!    field values it sent.
//! 4. Field values (integer and hex decoding).
//! 5. Ledger preconditions, then for releases the attestation content and
//!    the Ed25519 signature.
//!
//! ## Commit Boundary
//!
//! Every mutating operation works on a clone of the ledger. The clone
//! replaces the live ledger only after all checks passed and, for a
//! release, after the payout sink accepted the instruction. A failed
//! operation leaves ledger, history and payouts untouched.

use fairlens_core::{Address, AppId, AttestationMessage, ErrorKind, Timestamp};
use fairlens_crypto::{hex, verify_detailed, Ed25519PublicKey};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{AttestationPolicy, EscrowConfig};
use crate::ledger::{EscrowLedger, LedgerError, Milestone};
use crate::operation::{DecodeError, Operation, OperationKind};
use crate::payout::{PayoutError, PayoutInstruction, PayoutReceipt, PayoutSink};

// ─── States and Roles ────────────────────────────────────────────────

/// Observable state of an escrow instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum EscrowStatus {
    /// No milestone defined yet.
    Created,
    /// `milestone` is the next index eligible for release.
    Active { milestone: u64 },
    /// Every defined milestone has been released.
    Completed,
    /// Terminated by the owner (terminal).
    Deleted,
    /// Superseded by an upgrade (terminal).
    Updated,
}

impl EscrowStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Deleted | Self::Updated)
    }
}

impl std::fmt::Display for EscrowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => f.write_str("CREATED"),
            Self::Active { milestone } => write!(f, "ACTIVE({milestone})"),
            Self::Completed => f.write_str("COMPLETED"),
            Self::Deleted => f.write_str("DELETED"),
            Self::Updated => f.write_str("UPDATED"),
        }
    }
}

/// Role an operation requires of its caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Owner,
    Contractor,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Owner => "owner",
            Self::Contractor => "contractor",
        })
    }
}

/// Application-level completion actions, as opposed to operation calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleAction {
    Delete,
    Update,
    CloseOut,
    OptIn,
}

impl std::fmt::Display for LifecycleAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Delete => "delete",
            Self::Update => "update",
            Self::CloseOut => "close_out",
            Self::OptIn => "opt_in",
        })
    }
}

// ─── Audit Records ───────────────────────────────────────────────────

/// Record of a committed escrow operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
    /// Zero-based position in the history; `create` is 0.
    pub sequence: u64,
    pub operation: String,
    pub caller: Address,
    pub timestamp: Timestamp,
    pub detail: String,
}

/// Read-only view of an escrow for queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EscrowSnapshot {
    pub status: EscrowStatus,
    pub attestation_policy: AttestationPolicy,
    #[serde(flatten)]
    pub ledger: EscrowLedger,
}

/// Result of a successful call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CallOutcome {
    /// State changed; nothing was paid.
    Applied { status: EscrowStatus },
    /// A milestone was released and paid.
    Released { status: EscrowStatus, receipt: PayoutReceipt },
    /// Answer to `get_state`.
    State { snapshot: Box<EscrowSnapshot> },
}

// ─── Errors ──────────────────────────────────────────────────────────

/// Rejection of an escrow operation. Nothing changed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EscrowError {
    #[error("{operation} requires the {required}; {caller} is not")]
    Unauthorized {
        operation: &'static str,
        caller: Address,
        required: Role,
    },

    #[error("lifecycle action {0} is not supported")]
    LifecycleRejected(LifecycleAction),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("invalid create arguments: {0}")]
    InvalidArgs(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("verifier public key must be 32 bytes, got {length}")]
    InvalidKey { length: usize },

    #[error("attestation for milestone {index} does not match the escrow: {reason}")]
    AttestationMismatch { index: u64, reason: String },

    #[error("signature for milestone {index} rejected ({reason})")]
    SignatureInvalid { index: u64, reason: &'static str },

    #[error("escrow is {status}")]
    Closed { status: EscrowStatus },

    #[error("payout failed: {0}")]
    PayoutFailed(#[from] PayoutError),
}

impl EscrowError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unauthorized { .. } | Self::LifecycleRejected(_) => ErrorKind::Unauthorized,
            Self::Decode(e) => e.kind(),
            Self::InvalidArgs(_) => ErrorKind::InvalidArgs,
            Self::Ledger(e) => e.kind(),
            Self::InvalidKey { .. } => ErrorKind::InvalidKey,
            Self::AttestationMismatch { .. } => ErrorKind::AttestationMismatch,
            Self::SignatureInvalid { .. } => ErrorKind::SignatureInvalid,
            Self::Closed { .. } => ErrorKind::EscrowClosed,
            Self::PayoutFailed(_) => ErrorKind::PayoutFailed,
        }
    }
}

// ─── Escrow ──────────────────────────────────────────────────────────

/// One escrow instance with its audit trail.
#[derive(Debug, Clone)]
pub struct Escrow {
    ledger: EscrowLedger,
    config: EscrowConfig,
    closed: Option<EscrowStatus>,
    history: Vec<TransitionRecord>,
    payouts: Vec<PayoutReceipt>,
}

impl Escrow {
    /// Deploy an escrow from `[owner, contractor, verifier_public_key_hex]`.
    pub fn create<S: AsRef<str>>(
        app_id: AppId,
        args: &[S],
        config: EscrowConfig,
    ) -> Result<Self, EscrowError> {
        let [owner, contractor, key] = args else {
            return Err(EscrowError::InvalidArgs(format!(
                "create takes exactly 3 arguments, got {}",
                args.len()
            )));
        };
        let owner = Address::new(owner.as_ref())
            .map_err(|e| EscrowError::InvalidArgs(format!("owner: {e}")))?;
        let contractor = Address::new(contractor.as_ref())
            .map_err(|e| EscrowError::InvalidArgs(format!("contractor: {e}")))?;
        let key_bytes = hex::decode(key.as_ref())
            .map_err(|_| EscrowError::InvalidArgs("verifier key is not valid hex".to_string()))?;
        let verifier_public_key = Ed25519PublicKey::from_slice(&key_bytes).map_err(|_| {
            EscrowError::InvalidKey {
                length: key_bytes.len(),
            }
        })?;

        tracing::info!(
            %app_id,
            %owner,
            %contractor,
            verifier = %verifier_public_key,
            policy = %config.attestation_policy,
            "escrow created"
        );

        let mut escrow = Self {
            ledger: EscrowLedger::new(app_id, owner.clone(), contractor, verifier_public_key),
            config,
            closed: None,
            history: Vec::new(),
            payouts: Vec::new(),
        };
        escrow.record("create", &owner, "escrow created".to_string());
        Ok(escrow)
    }

    pub fn app_id(&self) -> AppId {
        self.ledger.app_id
    }

    pub fn ledger(&self) -> &EscrowLedger {
        &self.ledger
    }

    pub fn config(&self) -> &EscrowConfig {
        &self.config
    }

    pub fn history(&self) -> &[TransitionRecord] {
        &self.history
    }

    pub fn payouts(&self) -> &[PayoutReceipt] {
        &self.payouts
    }

    pub fn status(&self) -> EscrowStatus {
        if let Some(closed) = self.closed {
            return closed;
        }
        if self.ledger.total_milestones == 0 {
            EscrowStatus::Created
        } else if self.ledger.is_complete() {
            EscrowStatus::Completed
        } else {
            EscrowStatus::Active {
                milestone: self.ledger.current_milestone_index,
            }
        }
    }

    pub fn snapshot(&self) -> EscrowSnapshot {
        EscrowSnapshot {
            status: self.status(),
            attestation_policy: self.config.attestation_policy,
            ledger: self.ledger.clone(),
        }
    }

    /// Decode `args` and execute the operation.
    pub fn call<S: AsRef<str>>(
        &mut self,
        caller: &Address,
        args: &[S],
        sink: &mut dyn PayoutSink,
    ) -> Result<CallOutcome, EscrowError> {
        let operation = self.admit(caller, args).inspect_err(|e| {
            tracing::warn!(
                app_id = %self.ledger.app_id,
                %caller,
                code = e.kind().code(),
                error = %e,
                "escrow call rejected"
            );
        })?;
        self.execute(caller, operation, sink)
    }

    /// Decode `args` for `caller`. Field values are only looked at once the
    /// escrow is open and the caller holds the required role.
    pub fn admit<S: AsRef<str>>(
        &self,
        caller: &Address,
        args: &[S],
    ) -> Result<Operation, EscrowError> {
        let kind = OperationKind::from_args(args)?;
        self.gate(caller, kind)?;
        Ok(Operation::decode(kind, args)?)
    }

    /// Execute a decoded operation.
    pub fn execute(
        &mut self,
        caller: &Address,
        operation: Operation,
        sink: &mut dyn PayoutSink,
    ) -> Result<CallOutcome, EscrowError> {
        let name = operation.name();
        let result = self.apply(caller, operation, sink);
        match &result {
            Ok(_) => tracing::debug!(app_id = %self.ledger.app_id, operation = name, %caller, "escrow call applied"),
            Err(e) => tracing::warn!(
                app_id = %self.ledger.app_id,
                operation = name,
                %caller,
                code = e.kind().code(),
                error = %e,
                "escrow call rejected"
            ),
        }
        result
    }

    /// Apply an application lifecycle action.
    pub fn lifecycle(
        &mut self,
        caller: &Address,
        action: LifecycleAction,
    ) -> Result<EscrowStatus, EscrowError> {
        let target = match action {
            LifecycleAction::Delete => EscrowStatus::Deleted,
            LifecycleAction::Update => EscrowStatus::Updated,
            LifecycleAction::CloseOut | LifecycleAction::OptIn => {
                tracing::warn!(app_id = %self.ledger.app_id, %caller, %action, "lifecycle action rejected");
                return Err(EscrowError::LifecycleRejected(action));
            }
        };
        self.require_open()?;
        self.require_role(caller, Role::Owner, "lifecycle")?;

        self.closed = Some(target);
        self.record(&action.to_string(), caller, format!("escrow {target}"));
        tracing::info!(app_id = %self.ledger.app_id, %caller, status = %target, "escrow closed");
        Ok(target)
    }

    fn apply(
        &mut self,
        caller: &Address,
        operation: Operation,
        sink: &mut dyn PayoutSink,
    ) -> Result<CallOutcome, EscrowError> {
        self.gate(caller, operation.kind())?;
        let name = operation.name();

        match operation {
            Operation::GetState => Ok(CallOutcome::State {
                snapshot: Box::new(self.snapshot()),
            }),

            Operation::AddMilestone {
                index,
                amount,
                due_timestamp,
                reference_hash,
            } => {
                if index >= self.config.max_milestones {
                    return Err(LedgerError::InvalidMilestone {
                        index,
                        reason: format!(
                            "index exceeds the limit of {} milestones",
                            self.config.max_milestones
                        ),
                    }
                    .into());
                }
                let mut staged = self.ledger.clone();
                staged.define_milestone(index, amount, due_timestamp, reference_hash)?;
                self.commit(
                    staged,
                    name,
                    caller,
                    format!("milestone {index} defined, amount {amount}"),
                );
                Ok(self.applied())
            }

            Operation::SubmitProof { index, proof } => {
                let mut staged = self.ledger.clone();
                staged.record_proof(index, proof)?;
                self.commit(staged, name, caller, format!("proof recorded for milestone {index}"));
                Ok(self.applied())
            }

            Operation::VerifyAndRelease {
                index,
                message,
                signature,
            } => self.verify_and_release(caller, index, &message, &signature, sink),

            Operation::ChangeVerifier { public_key } => {
                let key = Ed25519PublicKey::from_slice(&public_key).map_err(|_| {
                    EscrowError::InvalidKey {
                        length: public_key.len(),
                    }
                })?;
                let mut staged = self.ledger.clone();
                staged.verifier_public_key = key;
                self.commit(staged, name, caller, format!("verifier key set to {key}"));
                Ok(self.applied())
            }

            Operation::ChangeContractor { contractor } => {
                let mut staged = self.ledger.clone();
                let detail = format!("contractor {} replaced by {contractor}", staged.contractor);
                staged.contractor = contractor;
                self.commit(staged, name, caller, detail);
                Ok(self.applied())
            }

            Operation::FundEscrow => {
                let staged = self.ledger.clone();
                self.commit(staged, name, caller, "funding authorized".to_string());
                Ok(self.applied())
            }
        }
    }

    fn verify_and_release(
        &mut self,
        caller: &Address,
        index: u64,
        message: &str,
        signature: &[u8],
        sink: &mut dyn PayoutSink,
    ) -> Result<CallOutcome, EscrowError> {
        let milestone = self.ledger.releasable(index)?;
        self.check_attestation(index, milestone, message)?;

        if let Err(e) = verify_detailed(
            self.ledger.verifier_public_key.as_bytes(),
            message.as_bytes(),
            signature,
        ) {
            tracing::warn!(
                app_id = %self.ledger.app_id,
                milestone = index,
                failure = e.label(),
                "attestation signature rejected"
            );
            return Err(EscrowError::SignatureInvalid {
                index,
                reason: e.label(),
            });
        }

        let mut staged = self.ledger.clone();
        let amount = staged.release_milestone(index)?;
        let instruction = PayoutInstruction {
            app_id: staged.app_id,
            milestone_index: index,
            recipient: staged.contractor.clone(),
            amount,
        };
        let receipt = sink.pay(&instruction)?;

        tracing::info!(
            app_id = %staged.app_id,
            milestone = index,
            amount,
            recipient = %instruction.recipient,
            receipt = %receipt.id,
            "milestone released"
        );
        self.commit(
            staged,
            "verify_release",
            caller,
            format!(
                "milestone {index} released, {amount} paid to {}",
                instruction.recipient
            ),
        );
        self.payouts.push(receipt.clone());
        Ok(CallOutcome::Released {
            status: self.status(),
            receipt,
        })
    }

    /// Under the strict policy, `message` must be the canonical attestation
    /// of exactly this milestone.
    fn check_attestation(
        &self,
        index: u64,
        milestone: &Milestone,
        message: &str,
    ) -> Result<(), EscrowError> {
        if self.config.attestation_policy == AttestationPolicy::AsSupplied {
            return Ok(());
        }
        let mismatch = |reason: String| EscrowError::AttestationMismatch { index, reason };

        let parsed = AttestationMessage::parse(message).map_err(|e| mismatch(e.to_string()))?;
        let canonical = parsed.encode().map_err(|e| mismatch(e.to_string()))?;
        if canonical.as_str() != message {
            return Err(mismatch("message is not in canonical form".to_string()));
        }

        let proof = milestone.submitted_proof.as_deref().unwrap_or_default();
        let checks: [(&str, bool); 5] = [
            ("app", parsed.app_id == self.ledger.app_id),
            ("ms", parsed.milestone_index == index),
            ("status", parsed.status == self.config.release_status),
            ("hash", parsed.milestone_hash == milestone.reference_hash),
            ("proof", parsed.proof_hash == proof),
        ];
        match checks.iter().find(|(_, ok)| !ok) {
            Some((field, _)) => Err(mismatch(format!("field `{field}` does not match"))),
            None => Ok(()),
        }
    }

    /// Lifecycle and role checks shared by decoded and raw calls.
    fn gate(&self, caller: &Address, kind: OperationKind) -> Result<(), EscrowError> {
        if kind.is_mutating() {
            self.require_open()?;
        }
        match kind.required_role() {
            Some(role) => self.require_role(caller, role, kind.name()),
            None => Ok(()),
        }
    }

    fn require_open(&self) -> Result<(), EscrowError> {
        match self.closed {
            Some(status) => Err(EscrowError::Closed { status }),
            None => Ok(()),
        }
    }

    fn require_role(
        &self,
        caller: &Address,
        required: Role,
        operation: &'static str,
    ) -> Result<(), EscrowError> {
        let holder = match required {
            Role::Owner => &self.ledger.owner,
            Role::Contractor => &self.ledger.contractor,
        };
        if caller != holder {
            return Err(EscrowError::Unauthorized {
                operation,
                caller: caller.clone(),
                required,
            });
        }
        Ok(())
    }

    fn applied(&self) -> CallOutcome {
        CallOutcome::Applied {
            status: self.status(),
        }
    }

    fn commit(&mut self, staged: EscrowLedger, operation: &str, caller: &Address, detail: String) {
        self.ledger = staged;
        self.record(operation, caller, detail);
    }

    fn record(&mut self, operation: &str, caller: &Address, detail: String) {
        tracing::info!(
            app_id = %self.ledger.app_id,
            operation,
            %caller,
            %detail,
            "escrow transition"
        );
        self.history.push(TransitionRecord {
            sequence: self.history.len() as u64,
            operation: operation.to_string(),
            caller: caller.clone(),
            timestamp: Timestamp::now(),
            detail,
        });
    }
}
