//! # Payouts
//!
//! A release produces a [`PayoutInstruction`]. The escrow hands it to a
//! [`PayoutSink`] before committing its staged ledger: if the sink refuses,
//! the release never happened.
//!
//! Two sinks ship with the crate:
//!
//! - [`PayoutLog`] accepts everything and records receipts. Used where
//!   funds are settled elsewhere (simulation, tests).
//! - [`CustodialAccount`] holds a balance funded by the owner and refuses
//!   payouts it cannot cover.

use fairlens_core::{Address, AppId, Timestamp};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Instruction to pay a contractor for a released milestone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutInstruction {
    pub app_id: AppId,
    pub milestone_index: u64,
    pub recipient: Address,
    pub amount: u64,
}

/// Evidence that a payout was issued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutReceipt {
    pub id: Uuid,
    pub app_id: AppId,
    pub milestone_index: u64,
    pub recipient: Address,
    pub amount: u64,
    pub issued_at: Timestamp,
}

impl PayoutReceipt {
    fn issue(instruction: &PayoutInstruction) -> Self {
        Self {
            id: Uuid::new_v4(),
            app_id: instruction.app_id,
            milestone_index: instruction.milestone_index,
            recipient: instruction.recipient.clone(),
            amount: instruction.amount,
            issued_at: Timestamp::now(),
        }
    }
}

/// Reason a sink refused a payout.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PayoutError {
    #[error("insufficient custodial funds: requested {requested}, available {available}")]
    InsufficientFunds { requested: u64, available: u64 },

    #[error("custodial balance overflow")]
    Overflow,
}

/// Destination of payout instructions.
pub trait PayoutSink {
    /// Issue the payout or refuse it. A refusal must leave the sink unchanged.
    fn pay(&mut self, instruction: &PayoutInstruction) -> Result<PayoutReceipt, PayoutError>;
}

// ─── PayoutLog ───────────────────────────────────────────────────────

/// Sink that accepts every payout and keeps the receipts.
#[derive(Debug, Default, Clone)]
pub struct PayoutLog {
    receipts: Vec<PayoutReceipt>,
}

impl PayoutLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn receipts(&self) -> &[PayoutReceipt] {
        &self.receipts
    }

    /// Sum paid to `recipient`.
    pub fn total_paid_to(&self, recipient: &Address) -> u64 {
        self.receipts
            .iter()
            .filter(|r| &r.recipient == recipient)
            .map(|r| r.amount)
            .sum()
    }
}

impl PayoutSink for PayoutLog {
    fn pay(&mut self, instruction: &PayoutInstruction) -> Result<PayoutReceipt, PayoutError> {
        let receipt = PayoutReceipt::issue(instruction);
        self.receipts.push(receipt.clone());
        Ok(receipt)
    }
}

// ─── CustodialAccount ────────────────────────────────────────────────

/// Funds held on behalf of one escrow.
#[derive(Debug, Default, Clone, Serialize)]
pub struct CustodialAccount {
    balance: u64,
    total_credited: u64,
    total_paid: u64,
}

impl CustodialAccount {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance(&self) -> u64 {
        self.balance
    }

    pub fn total_credited(&self) -> u64 {
        self.total_credited
    }

    pub fn total_paid(&self) -> u64 {
        self.total_paid
    }

    /// Credit a companion payment. Returns the new balance.
    pub fn credit(&mut self, amount: u64) -> Result<u64, PayoutError> {
        let balance = self.balance.checked_add(amount).ok_or(PayoutError::Overflow)?;
        let credited = self
            .total_credited
            .checked_add(amount)
            .ok_or(PayoutError::Overflow)?;
        self.balance = balance;
        self.total_credited = credited;
        Ok(balance)
    }
}

impl PayoutSink for CustodialAccount {
    fn pay(&mut self, instruction: &PayoutInstruction) -> Result<PayoutReceipt, PayoutError> {
        let balance = self.balance.checked_sub(instruction.amount).ok_or(
            PayoutError::InsufficientFunds {
                requested: instruction.amount,
                available: self.balance,
            },
        )?;
        let paid = self
            .total_paid
            .checked_add(instruction.amount)
            .ok_or(PayoutError::Overflow)?;
        self.balance = balance;
        self.total_paid = paid;
        Ok(PayoutReceipt::issue(instruction))
    }
}
