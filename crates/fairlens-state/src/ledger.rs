//! # Escrow Ledger
//!
//! The data model of one escrow instance and the three primitive mutations
//! the state machine builds on. The ledger knows nothing about callers or
//! signatures; role checks and attestation verification happen in
//! [`crate::escrow`].
//!
//! ## Invariants
//!
//! - `current_milestone_index` only ever grows, by exactly one per release.
//! - `total_milestones` is non-decreasing and always above every defined index.
//! - `escrow_balance` is the sum of amounts added minus amounts released.
//!   All arithmetic is checked, so it can neither wrap nor go negative.
//! - Every index below the cursor has been released and its reference hash
//!   is frozen.

use std::collections::BTreeMap;

use fairlens_core::{Address, AppId, ErrorKind};
use fairlens_crypto::Ed25519PublicKey;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ─── Milestone ───────────────────────────────────────────────────────

/// A unit of contracted work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestone {
    /// Payout in the smallest currency unit.
    pub amount: u64,
    /// Informational only; never enforced.
    pub due_timestamp: u64,
    /// Content hash of the milestone specification.
    pub reference_hash: String,
    /// Proof hash recorded by the contractor. Kept after release.
    pub submitted_proof: Option<String>,
}

// ─── Errors ──────────────────────────────────────────────────────────

/// Precondition failure of a ledger mutation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("invalid milestone {index}: {reason}")]
    InvalidMilestone { index: u64, reason: String },

    #[error("milestone {index} is not current (current is {current})")]
    MilestoneNotCurrent { index: u64, current: u64 },

    #[error("proof for milestone {index} is empty")]
    ProofEmpty { index: u64 },

    #[error("no proof submitted for milestone {index}")]
    ProofMissing { index: u64 },
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidMilestone { .. } => ErrorKind::InvalidMilestone,
            Self::MilestoneNotCurrent { .. } => ErrorKind::MilestoneNotCurrent,
            Self::ProofEmpty { .. } => ErrorKind::ProofEmpty,
            Self::ProofMissing { .. } => ErrorKind::ProofMissing,
        }
    }

    fn invalid(index: u64, reason: impl Into<String>) -> Self {
        Self::InvalidMilestone {
            index,
            reason: reason.into(),
        }
    }
}

// ─── Ledger ──────────────────────────────────────────────────────────

/// Persistent state of one escrow instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowLedger {
    pub app_id: AppId,
    /// Set at creation, never reassigned.
    pub owner: Address,
    pub contractor: Address,
    pub verifier_public_key: Ed25519PublicKey,
    pub total_milestones: u64,
    pub current_milestone_index: u64,
    pub escrow_balance: u64,
    pub milestones: BTreeMap<u64, Milestone>,
}

impl EscrowLedger {
    /// A fresh ledger with zeroed counters and no milestones.
    pub fn new(
        app_id: AppId,
        owner: Address,
        contractor: Address,
        verifier_public_key: Ed25519PublicKey,
    ) -> Self {
        Self {
            app_id,
            owner,
            contractor,
            verifier_public_key,
            total_milestones: 0,
            current_milestone_index: 0,
            escrow_balance: 0,
            milestones: BTreeMap::new(),
        }
    }

    pub fn milestone(&self, index: u64) -> Option<&Milestone> {
        self.milestones.get(&index)
    }

    /// True when at least one milestone exists and all of them are released.
    pub fn is_complete(&self) -> bool {
        self.total_milestones > 0 && self.current_milestone_index >= self.total_milestones
    }

    /// Insert or overwrite milestone `index` and add `amount` to the balance.
    ///
    /// Overwriting keeps a proof that was already submitted. Released
    /// milestones cannot be overwritten.
    pub fn define_milestone(
        &mut self,
        index: u64,
        amount: u64,
        due_timestamp: u64,
        reference_hash: String,
    ) -> Result<(), LedgerError> {
        if index < self.current_milestone_index {
            return Err(LedgerError::invalid(index, "milestone already released"));
        }
        let total = index
            .checked_add(1)
            .ok_or_else(|| LedgerError::invalid(index, "index not representable"))?;
        let balance = self
            .escrow_balance
            .checked_add(amount)
            .ok_or_else(|| LedgerError::invalid(index, "escrow balance overflow"))?;

        let submitted_proof = self
            .milestones
            .get(&index)
            .and_then(|m| m.submitted_proof.clone());
        self.milestones.insert(
            index,
            Milestone {
                amount,
                due_timestamp,
                reference_hash,
                submitted_proof,
            },
        );
        self.total_milestones = self.total_milestones.max(total);
        self.escrow_balance = balance;
        Ok(())
    }

    /// Record the contractor's proof for the current milestone.
    pub fn record_proof(&mut self, index: u64, proof: String) -> Result<(), LedgerError> {
        self.require_current(index)?;
        if proof.is_empty() {
            return Err(LedgerError::ProofEmpty { index });
        }
        let milestone = self
            .milestones
            .get_mut(&index)
            .ok_or_else(|| LedgerError::invalid(index, "milestone not defined"))?;
        milestone.submitted_proof = Some(proof);
        Ok(())
    }

    /// The current milestone, if it can be released.
    pub fn releasable(&self, index: u64) -> Result<&Milestone, LedgerError> {
        self.require_current(index)?;
        self.milestones
            .get(&index)
            .filter(|m| m.submitted_proof.is_some())
            .ok_or(LedgerError::ProofMissing { index })
    }

    /// Release the current milestone: advance the cursor and debit the
    /// balance. Returns the amount to pay out.
    pub fn release_milestone(&mut self, index: u64) -> Result<u64, LedgerError> {
        let amount = self.releasable(index)?.amount;
        let balance = self
            .escrow_balance
            .checked_sub(amount)
            .ok_or_else(|| LedgerError::invalid(index, "amount exceeds escrow balance"))?;
        let next = index
            .checked_add(1)
            .ok_or_else(|| LedgerError::invalid(index, "index not representable"))?;
        self.escrow_balance = balance;
        self.current_milestone_index = next;
        Ok(amount)
    }

    fn require_current(&self, index: u64) -> Result<(), LedgerError> {
        if index != self.current_milestone_index {
            return Err(LedgerError::MilestoneNotCurrent {
                index,
                current: self.current_milestone_index,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger() -> EscrowLedger {
        EscrowLedger::new(
            AppId::new(42),
            Address::new("owner").unwrap(),
            Address::new("contractor").unwrap(),
            Ed25519PublicKey::from_bytes([1u8; 32]),
        )
    }

    #[test]
    fn new_ledger_is_zeroed() {
        let l = ledger();
        assert_eq!(l.total_milestones, 0);
        assert_eq!(l.current_milestone_index, 0);
        assert_eq!(l.escrow_balance, 0);
        assert!(!l.is_complete());
    }

    #[test]
    fn define_grows_total_and_balance() {
        let mut l = ledger();
        l.define_milestone(0, 100, 0, "h0".into()).unwrap();
        assert_eq!(l.total_milestones, 1);
        assert_eq!(l.escrow_balance, 100);

        l.define_milestone(4, 50, 0, "h4".into()).unwrap();
        assert_eq!(l.total_milestones, 5);
        assert_eq!(l.escrow_balance, 150);

        // Overwrite below total: only the balance grows.
        l.define_milestone(2, 25, 0, "h2".into()).unwrap();
        assert_eq!(l.total_milestones, 5);
        assert_eq!(l.escrow_balance, 175);
    }

    #[test]
    fn overwrite_keeps_submitted_proof() {
        let mut l = ledger();
        l.define_milestone(0, 100, 0, "h0".into()).unwrap();
        l.record_proof(0, "p".into()).unwrap();
        l.define_milestone(0, 200, 9, "h0b".into()).unwrap();
        let m = l.milestone(0).unwrap();
        assert_eq!(m.amount, 200);
        assert_eq!(m.reference_hash, "h0b");
        assert_eq!(m.submitted_proof.as_deref(), Some("p"));
    }

    #[test]
    fn released_milestone_is_frozen() {
        let mut l = ledger();
        l.define_milestone(0, 100, 0, "h0".into()).unwrap();
        l.record_proof(0, "p".into()).unwrap();
        l.release_milestone(0).unwrap();
        let err = l.define_milestone(0, 1, 0, "other".into()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidMilestone);
        assert_eq!(l.milestone(0).unwrap().reference_hash, "h0");
    }

    #[test]
    fn overflow_rejected() {
        let mut l = ledger();
        l.define_milestone(0, u64::MAX, 0, "h".into()).unwrap();
        assert_eq!(
            l.define_milestone(1, 1, 0, "h".into()).unwrap_err().kind(),
            ErrorKind::InvalidMilestone
        );
        assert_eq!(
            l.define_milestone(u64::MAX, 0, 0, "h".into()).unwrap_err().kind(),
            ErrorKind::InvalidMilestone
        );
        assert_eq!(l.total_milestones, 1);
    }

    #[test]
    fn proof_requires_current_and_non_empty() {
        let mut l = ledger();
        l.define_milestone(0, 1, 0, "h".into()).unwrap();
        l.define_milestone(1, 1, 0, "h".into()).unwrap();
        assert_eq!(
            l.record_proof(1, "p".into()).unwrap_err(),
            LedgerError::MilestoneNotCurrent { index: 1, current: 0 }
        );
        assert_eq!(
            l.record_proof(0, String::new()).unwrap_err(),
            LedgerError::ProofEmpty { index: 0 }
        );
    }

    #[test]
    fn proof_for_undefined_milestone_rejected() {
        let mut l = ledger();
        assert_eq!(
            l.record_proof(0, "p".into()).unwrap_err().kind(),
            ErrorKind::InvalidMilestone
        );
    }

    #[test]
    fn release_requires_proof() {
        let mut l = ledger();
        l.define_milestone(0, 10, 0, "h".into()).unwrap();
        assert_eq!(
            l.release_milestone(0).unwrap_err(),
            LedgerError::ProofMissing { index: 0 }
        );
        assert_eq!(l.current_milestone_index, 0);
    }

    #[test]
    fn release_advances_cursor_and_debits() {
        let mut l = ledger();
        l.define_milestone(0, 10, 0, "h".into()).unwrap();
        l.record_proof(0, "p".into()).unwrap();
        assert_eq!(l.release_milestone(0).unwrap(), 10);
        assert_eq!(l.current_milestone_index, 1);
        assert_eq!(l.escrow_balance, 0);
        assert!(l.is_complete());
        assert_eq!(l.milestone(0).unwrap().submitted_proof.as_deref(), Some("p"));
        assert_eq!(
            l.release_milestone(0).unwrap_err().kind(),
            ErrorKind::MilestoneNotCurrent
        );
    }

    #[test]
    fn ledger_serializes_with_hex_key() {
        let json = serde_json::to_value(ledger()).unwrap();
        assert_eq!(json["verifier_public_key"], "01".repeat(32));
        assert_eq!(json["app_id"], 42);
    }
}
