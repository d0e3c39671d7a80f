//! # Operation Decoding
//!
//! An escrow call arrives as an operation name followed by positional
//! string arguments. Decoding happens in two stages so the escrow can put
//! its lifecycle and role checks between them:
//!
//! 1. [`OperationKind::from_args()`]: the name (or alias) and the argument
//!    count. Nothing else is looked at.
//! 2. [`Operation::decode()`]: the field values of an already admitted kind.
//!
//! [`Operation::from_args()`] runs both stages back to back for tooling
//! that has no caller to check.
//!
//! ## Argument Encoding
//!
//! | Field | Text form |
//! |---|---|
//! | index, amount, due timestamp | unsigned decimal |
//! | reference hash, proof | verbatim |
//! | attestation message | verbatim UTF-8 |
//! | signature, verifier key | hex |
//! | contractor | address |

use fairlens_core::{Address, ErrorKind};
use serde::Serialize;
use thiserror::Error;

use crate::escrow::Role;

/// A decoded escrow operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum Operation {
    AddMilestone {
        index: u64,
        amount: u64,
        due_timestamp: u64,
        reference_hash: String,
    },
    SubmitProof {
        index: u64,
        proof: String,
    },
    VerifyAndRelease {
        index: u64,
        message: String,
        #[serde(skip)]
        signature: Vec<u8>,
    },
    ChangeVerifier {
        #[serde(skip)]
        public_key: Vec<u8>,
    },
    ChangeContractor {
        contractor: Address,
    },
    FundEscrow,
    GetState,
}

/// Which operation a call names, before its fields are decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    AddMilestone,
    SubmitProof,
    VerifyAndRelease,
    ChangeVerifier,
    ChangeContractor,
    FundEscrow,
    GetState,
}

/// Error decoding an argument array.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("no operation name supplied")]
    Empty,

    #[error("unknown operation {0:?}")]
    UnknownOperation(String),

    #[error("{operation} takes exactly {expected} arguments, got {actual}")]
    ArgumentCount {
        operation: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{field} must be non-negative, got {value:?}")]
    Negative { field: &'static str, value: String },

    #[error("{field} does not fit in 64 bits: {value:?}")]
    Overflow { field: &'static str, value: String },

    #[error("{operation} index {value:?} can never be the current milestone")]
    IndexNeverCurrent {
        operation: &'static str,
        value: String,
    },

    #[error("{field} is not an unsigned decimal integer: {value:?}")]
    NotAnInteger { field: &'static str, value: String },

    #[error("{field} is not valid hex")]
    InvalidHex { field: &'static str },

    #[error("invalid address: {0}")]
    InvalidAddress(String),
}

impl DecodeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Negative { .. } | Self::Overflow { .. } => ErrorKind::InvalidMilestone,
            Self::IndexNeverCurrent { .. } => ErrorKind::MilestoneNotCurrent,
            Self::Empty
            | Self::UnknownOperation(_)
            | Self::ArgumentCount { .. }
            | Self::NotAnInteger { .. }
            | Self::InvalidHex { .. }
            | Self::InvalidAddress(_) => ErrorKind::InvalidArgs,
        }
    }
}

impl OperationKind {
    /// Resolve an accepted name or alias.
    pub fn from_name(name: &str) -> Option<Self> {
        let kind = match name {
            "add_milestone" | "add_ms" => Self::AddMilestone,
            "submit_proof" => Self::SubmitProof,
            "verify_release" | "verify_and_release" => Self::VerifyAndRelease,
            "change_verifier" | "set_verifier" => Self::ChangeVerifier,
            "change_contractor" | "set_contractor" => Self::ChangeContractor,
            "fund_escrow" => Self::FundEscrow,
            "get_state" => Self::GetState,
            _ => return None,
        };
        Some(kind)
    }

    /// Check the name and argument count of `[name, arg1, ...]`.
    pub fn from_args<S: AsRef<str>>(args: &[S]) -> Result<Self, DecodeError> {
        let first = args.first().ok_or(DecodeError::Empty)?.as_ref();
        let kind = Self::from_name(first)
            .ok_or_else(|| DecodeError::UnknownOperation(first.to_string()))?;
        if args.len() != kind.arity() {
            return Err(DecodeError::ArgumentCount {
                operation: kind.name(),
                expected: kind.arity(),
                actual: args.len(),
            });
        }
        Ok(kind)
    }

    /// Canonical operation name.
    pub fn name(self) -> &'static str {
        match self {
            Self::AddMilestone => "add_milestone",
            Self::SubmitProof => "submit_proof",
            Self::VerifyAndRelease => "verify_release",
            Self::ChangeVerifier => "change_verifier",
            Self::ChangeContractor => "change_contractor",
            Self::FundEscrow => "fund_escrow",
            Self::GetState => "get_state",
        }
    }

    /// Argument count, operation name included.
    pub fn arity(self) -> usize {
        match self {
            Self::AddMilestone => 5,
            Self::VerifyAndRelease => 4,
            Self::SubmitProof => 3,
            Self::ChangeVerifier | Self::ChangeContractor => 2,
            Self::FundEscrow | Self::GetState => 1,
        }
    }

    /// Role the caller must hold. `None` means anyone may call.
    pub fn required_role(self) -> Option<Role> {
        match self {
            Self::AddMilestone
            | Self::ChangeVerifier
            | Self::ChangeContractor
            | Self::FundEscrow => Some(Role::Owner),
            Self::SubmitProof => Some(Role::Contractor),
            Self::VerifyAndRelease | Self::GetState => None,
        }
    }

    /// Whether the operation can change escrow state.
    pub fn is_mutating(self) -> bool {
        !matches!(self, Self::GetState)
    }
}

impl Operation {
    /// Decode `[name, arg1, ...]` in one go.
    pub fn from_args<S: AsRef<str>>(args: &[S]) -> Result<Self, DecodeError> {
        let kind = OperationKind::from_args(args)?;
        Self::decode(kind, args)
    }

    /// Decode the field values of `args`, whose shape `kind` was checked by
    /// [`OperationKind::from_args()`].
    pub fn decode<S: AsRef<str>>(kind: OperationKind, args: &[S]) -> Result<Self, DecodeError> {
        if args.len() != kind.arity() {
            return Err(DecodeError::ArgumentCount {
                operation: kind.name(),
                expected: kind.arity(),
                actual: args.len(),
            });
        }
        let arg = |i: usize| args[i + 1].as_ref();

        let op = match kind {
            OperationKind::AddMilestone => Self::AddMilestone {
                index: parse_u64("index", arg(0))?,
                amount: parse_u64("amount", arg(1))?,
                due_timestamp: parse_u64("due_timestamp", arg(2))?,
                reference_hash: arg(3).to_string(),
            },
            OperationKind::SubmitProof => Self::SubmitProof {
                index: parse_cursor_index(kind, arg(0))?,
                proof: arg(1).to_string(),
            },
            OperationKind::VerifyAndRelease => Self::VerifyAndRelease {
                index: parse_cursor_index(kind, arg(0))?,
                message: arg(1).to_string(),
                signature: parse_hex("signature", arg(2))?,
            },
            OperationKind::ChangeVerifier => Self::ChangeVerifier {
                public_key: parse_hex("public_key", arg(0))?,
            },
            OperationKind::ChangeContractor => Self::ChangeContractor {
                contractor: Address::new(arg(0))
                    .map_err(|e| DecodeError::InvalidAddress(e.to_string()))?,
            },
            OperationKind::FundEscrow => Self::FundEscrow,
            OperationKind::GetState => Self::GetState,
        };
        Ok(op)
    }

    pub fn kind(&self) -> OperationKind {
        match self {
            Self::AddMilestone { .. } => OperationKind::AddMilestone,
            Self::SubmitProof { .. } => OperationKind::SubmitProof,
            Self::VerifyAndRelease { .. } => OperationKind::VerifyAndRelease,
            Self::ChangeVerifier { .. } => OperationKind::ChangeVerifier,
            Self::ChangeContractor { .. } => OperationKind::ChangeContractor,
            Self::FundEscrow => OperationKind::FundEscrow,
            Self::GetState => OperationKind::GetState,
        }
    }

    /// Canonical operation name.
    pub fn name(&self) -> &'static str {
        self.kind().name()
    }

    /// Whether the operation can change escrow state.
    pub fn is_mutating(&self) -> bool {
        self.kind().is_mutating()
    }
}

fn parse_u64(field: &'static str, value: &str) -> Result<u64, DecodeError> {
    if value.starts_with('-') {
        return Err(DecodeError::Negative {
            field,
            value: value.to_string(),
        });
    }
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(DecodeError::NotAnInteger {
            field,
            value: value.to_string(),
        });
    }
    value.parse().map_err(|_| DecodeError::Overflow {
        field,
        value: value.to_string(),
    })
}

/// Index of an operation that only accepts the cursor. A negative or
/// oversized index can never equal it.
fn parse_cursor_index(kind: OperationKind, value: &str) -> Result<u64, DecodeError> {
    parse_u64("index", value).map_err(|e| match e {
        DecodeError::Negative { value, .. } | DecodeError::Overflow { value, .. } => {
            DecodeError::IndexNeverCurrent {
                operation: kind.name(),
                value,
            }
        }
        other => other,
    })
}

fn parse_hex(field: &'static str, value: &str) -> Result<Vec<u8>, DecodeError> {
    fairlens_crypto::hex::decode(value).map_err(|_| DecodeError::InvalidHex { field })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(args: &[&str]) -> Result<Operation, DecodeError> {
        Operation::from_args(args)
    }

    #[test]
    fn add_milestone_and_alias() {
        let expected = Operation::AddMilestone {
            index: 0,
            amount: 1_000_000,
            due_timestamp: 1_700_000_000,
            reference_hash: "Qm1".into(),
        };
        assert_eq!(
            decode(&["add_milestone", "0", "1000000", "1700000000", "Qm1"]).unwrap(),
            expected
        );
        assert_eq!(
            decode(&["add_ms", "0", "1000000", "1700000000", "Qm1"]).unwrap(),
            expected
        );
    }

    #[test]
    fn argument_count_checked_first() {
        // Bad integer and wrong count: the count wins.
        assert_eq!(
            decode(&["add_milestone", "x", "1"]).unwrap_err(),
            DecodeError::ArgumentCount {
                operation: "add_milestone",
                expected: 5,
                actual: 3
            }
        );
        assert_eq!(
            decode(&["fund_escrow", "extra"]).unwrap_err().kind(),
            ErrorKind::InvalidArgs
        );
    }

    #[test]
    fn unknown_and_empty() {
        assert_eq!(
            decode(&["steal_funds"]).unwrap_err(),
            DecodeError::UnknownOperation("steal_funds".into())
        );
        assert_eq!(decode(&[]).unwrap_err(), DecodeError::Empty);
    }

    #[test]
    fn negative_amount_is_invalid_milestone() {
        let err = decode(&["add_milestone", "0", "-5", "0", "h"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidMilestone);
    }

    #[test]
    fn non_numeric_is_invalid_args() {
        for bad in ["", "1.5", "+1", " 1", "abc"] {
            let err = decode(&["submit_proof", bad, "p"]).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidArgs, "input {bad:?}");
        }
    }

    #[test]
    fn oversized_integer_is_invalid_milestone() {
        let err = decode(&["add_milestone", "0", "18446744073709551616", "0", "h"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidMilestone);
    }

    #[test]
    fn verify_release_decodes_hex_signature() {
        let op = decode(&["verify_release", "0", "app:1|ms:0", "abcd"]).unwrap();
        assert_eq!(
            op,
            Operation::VerifyAndRelease {
                index: 0,
                message: "app:1|ms:0".into(),
                signature: vec![0xab, 0xcd]
            }
        );
        assert_eq!(
            decode(&["verify_release", "0", "m", "zz"]).unwrap_err(),
            DecodeError::InvalidHex { field: "signature" }
        );
    }

    #[test]
    fn verifier_and_contractor_aliases() {
        assert_eq!(
            decode(&["set_verifier", "00ff"]).unwrap(),
            Operation::ChangeVerifier { public_key: vec![0x00, 0xff] }
        );
        assert_eq!(
            decode(&["set_contractor", "bob"]).unwrap().name(),
            "change_contractor"
        );
        assert_eq!(
            decode(&["change_contractor", "  "]).unwrap_err().kind(),
            ErrorKind::InvalidArgs
        );
    }

    #[test]
    fn cursor_index_out_of_range_is_not_current() {
        for bad in ["-1", "18446744073709551616"] {
            let err = decode(&["submit_proof", bad, "p"]).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::MilestoneNotCurrent, "input {bad:?}");
            let err = decode(&["verify_release", bad, "m", "00"]).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::MilestoneNotCurrent, "input {bad:?}");
        }
    }

    #[test]
    fn kind_checks_shape_only() {
        assert_eq!(
            OperationKind::from_args(&["add_ms", "-1", "x", "", "h"]).unwrap(),
            OperationKind::AddMilestone
        );
        assert_eq!(
            OperationKind::from_args(&["submit_proof", "0"]).unwrap_err().kind(),
            ErrorKind::InvalidArgs
        );
    }

    #[test]
    fn aliases_resolve_to_canonical_names() {
        let names = [
            ("add_ms", "add_milestone", 5),
            ("submit_proof", "submit_proof", 3),
            ("verify_and_release", "verify_release", 4),
            ("set_verifier", "change_verifier", 2),
            ("set_contractor", "change_contractor", 2),
            ("fund_escrow", "fund_escrow", 1),
            ("get_state", "get_state", 1),
        ];
        for (alias, canonical, arity) in names {
            let kind = OperationKind::from_name(alias).unwrap();
            assert_eq!(kind.name(), canonical);
            assert_eq!(kind.arity(), arity);
            assert_eq!(OperationKind::from_name(canonical), Some(kind));
        }
    }

    #[test]
    fn roles_per_kind() {
        assert_eq!(OperationKind::AddMilestone.required_role(), Some(Role::Owner));
        assert_eq!(OperationKind::SubmitProof.required_role(), Some(Role::Contractor));
        assert_eq!(OperationKind::VerifyAndRelease.required_role(), None);
        assert_eq!(OperationKind::GetState.required_role(), None);
    }

    #[test]
    fn get_state_is_read_only() {
        let op = decode(&["get_state"]).unwrap();
        assert!(!op.is_mutating());
        assert!(decode(&["fund_escrow"]).unwrap().is_mutating());
    }
}
