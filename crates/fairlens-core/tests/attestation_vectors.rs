//! # Attestation Wire Vectors
//!
//! Verifiers already in the field sign these exact byte strings. Each vector
//! pins the encoding of one field combination; a change here breaks every
//! outstanding signature.

use fairlens_core::attestation::encode;
use fairlens_core::{AppId, AttestationMessage, CodecError};

struct Vector {
    app_id: u64,
    milestone_index: u64,
    status: &'static str,
    timestamp: u64,
    milestone_hash: &'static str,
    proof_hash: &'static str,
    expected: &'static str,
}

const VECTORS: &[Vector] = &[
    Vector {
        app_id: 42,
        milestone_index: 0,
        status: "PASS",
        timestamp: 1000,
        milestone_hash: "Qm1",
        proof_hash: "QmProof1",
        expected: "app:42|ms:0|status:PASS|ts:1000|hash:Qm1|proof:QmProof1",
    },
    Vector {
        app_id: 0,
        milestone_index: 3,
        status: "FAIL",
        timestamp: 0,
        milestone_hash: "",
        proof_hash: "",
        expected: "app:0|ms:3|status:FAIL|ts:0|hash:|proof:",
    },
    Vector {
        app_id: u64::MAX,
        milestone_index: u64::MAX,
        status: "PASS",
        timestamp: 1_700_000_000,
        milestone_hash: "bafybeigdyrzt5sfp7udm7hu76uh7y26nf3efuylqabf3oclgtqy55fbzdi",
        proof_hash: "sha256:9f86d081884c7d659a2feaa0c55ad015",
        expected: "app:18446744073709551615|ms:18446744073709551615|status:PASS|ts:1700000000|hash:bafybeigdyrzt5sfp7udm7hu76uh7y26nf3efuylqabf3oclgtqy55fbzdi|proof:sha256:9f86d081884c7d659a2feaa0c55ad015",
    },
];

#[test]
fn encoding_matches_vectors() {
    for v in VECTORS {
        let message = encode(
            AppId::new(v.app_id),
            v.milestone_index,
            v.status,
            v.timestamp,
            v.milestone_hash,
            v.proof_hash,
        )
        .unwrap();
        assert_eq!(message.as_str(), v.expected);
        assert_eq!(message.as_bytes(), v.expected.as_bytes());
    }
}

#[test]
fn vectors_parse_back_to_their_fields() {
    for v in VECTORS {
        let parsed = AttestationMessage::parse(v.expected).unwrap();
        assert_eq!(parsed.app_id, AppId::new(v.app_id));
        assert_eq!(parsed.milestone_index, v.milestone_index);
        assert_eq!(parsed.status, v.status);
        assert_eq!(parsed.timestamp, v.timestamp);
        assert_eq!(parsed.milestone_hash, v.milestone_hash);
        assert_eq!(parsed.proof_hash, v.proof_hash);
    }
}

#[test]
fn colon_inside_a_field_is_preserved() {
    // Only the leading prefix is stripped; later colons belong to the value.
    let parsed = AttestationMessage::parse(VECTORS[2].expected).unwrap();
    assert_eq!(parsed.proof_hash, "sha256:9f86d081884c7d659a2feaa0c55ad015");
}

#[test]
fn swapped_segments_rejected() {
    let err = AttestationMessage::parse("ms:0|app:42|status:PASS|ts:1000|hash:Qm1|proof:QmProof1")
        .unwrap_err();
    assert_eq!(
        err,
        CodecError::MissingPrefix {
            position: 0,
            expected: "app:"
        }
    );
}
