//! # Escrow Scenarios
//!
//! End-to-end runs of the state machine with real Ed25519 keys, plus
//! property tests over the ledger counters.

use fairlens_core::{Address, AppId, ErrorKind};
use fairlens_crypto::{AttestationRequest, AttestationSigner, Ed25519KeyPair};
use fairlens_state::{
    CallOutcome, CustodialAccount, Escrow, EscrowConfig, EscrowStatus, PayoutLog,
};
use proptest::prelude::*;

const APP: u64 = 42;

fn addr(s: &str) -> Address {
    Address::new(s).unwrap()
}

fn owner() -> Address {
    addr("gov-owner")
}

fn contractor() -> Address {
    addr("builder-co")
}

fn deploy(signer: &AttestationSigner) -> Escrow {
    let key = signer.public_key().to_hex();
    Escrow::create(
        AppId::new(APP),
        &[owner().as_str(), contractor().as_str(), key.as_str()],
        EscrowConfig::default(),
    )
    .unwrap()
}

fn attest(signer: &AttestationSigner, index: u64, hash: &str, proof: &str) -> Vec<String> {
    let signed = signer
        .sign_attestation(&AttestationRequest {
            app_id: AppId::new(APP),
            milestone_index: index,
            status: "PASS".to_string(),
            milestone_hash: hash.to_string(),
            proof_hash: proof.to_string(),
            timestamp: Some(1000),
        })
        .unwrap();
    vec![
        "verify_release".to_string(),
        index.to_string(),
        signed.message,
        signed.signature.to_hex(),
    ]
}

#[test]
fn reference_scenario_pays_contractor() {
    let signer = AttestationSigner::from_seed_hex(&"5a".repeat(32)).unwrap();
    let mut escrow = deploy(&signer);
    let mut sink = PayoutLog::new();

    escrow
        .call(&owner(), &["add_milestone", "0", "1000000", "1700000000", "Qm1"], &mut sink)
        .unwrap();
    escrow
        .call(&contractor(), &["submit_proof", "0", "QmProof1"], &mut sink)
        .unwrap();

    let args = attest(&signer, 0, "Qm1", "QmProof1");
    assert_eq!(args[2], "app:42|ms:0|status:PASS|ts:1000|hash:Qm1|proof:QmProof1");

    let outcome = escrow.call(&addr("relayer"), &args, &mut sink).unwrap();
    assert!(matches!(outcome, CallOutcome::Released { .. }));
    assert_eq!(sink.total_paid_to(&contractor()), 1_000_000);
    assert_eq!(escrow.ledger().current_milestone_index, 1);
    assert_eq!(escrow.ledger().escrow_balance, 0);
    assert_eq!(escrow.status(), EscrowStatus::Completed);

    // The same attestation cannot be replayed.
    let err = escrow.call(&addr("relayer"), &args, &mut sink).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MilestoneNotCurrent);
    assert_eq!(sink.receipts().len(), 1);
}

#[test]
fn three_milestones_released_in_order() {
    let signer = AttestationSigner::generate();
    let mut escrow = deploy(&signer);
    let mut sink = PayoutLog::new();

    for (i, amount) in [(0u64, 100u64), (1, 200), (2, 300)] {
        let (i, amount) = (i.to_string(), amount.to_string());
        let hash = format!("QmSpec{i}");
        escrow
            .call(&owner(), &["add_ms", i.as_str(), amount.as_str(), "0", hash.as_str()], &mut sink)
            .unwrap();
    }
    assert_eq!(escrow.ledger().escrow_balance, 600);
    assert_eq!(escrow.status(), EscrowStatus::Active { milestone: 0 });

    // Out of order release is refused without any change.
    escrow
        .call(&contractor(), &["submit_proof", "0", "QmP0"], &mut sink)
        .unwrap();
    let early = attest(&signer, 1, "QmSpec1", "QmP1");
    assert_eq!(
        escrow.call(&owner(), &early, &mut sink).unwrap_err().kind(),
        ErrorKind::MilestoneNotCurrent
    );
    assert_eq!(escrow.ledger().escrow_balance, 600);

    for i in 0..3u64 {
        let proof = format!("QmP{i}");
        if i > 0 {
            let index = i.to_string();
            escrow
                .call(&contractor(), &["submit_proof", index.as_str(), proof.as_str()], &mut sink)
                .unwrap();
        }
        let args = attest(&signer, i, &format!("QmSpec{i}"), &proof);
        escrow.call(&addr("anyone"), &args, &mut sink).unwrap();
    }

    assert_eq!(sink.total_paid_to(&contractor()), 600);
    assert_eq!(escrow.ledger().escrow_balance, 0);
    assert_eq!(escrow.status(), EscrowStatus::Completed);
    assert_eq!(escrow.payouts().len(), 3);
    // create + 3 adds + 3 proofs + 3 releases
    assert_eq!(escrow.history().len(), 10);
}

#[test]
fn custody_shortfall_rolls_back_release() {
    let signer = AttestationSigner::generate();
    let mut escrow = deploy(&signer);
    let mut custody = CustodialAccount::new();
    custody.credit(500).unwrap();

    escrow
        .call(&owner(), &["add_milestone", "0", "1000", "0", "Qm1"], &mut custody)
        .unwrap();
    escrow
        .call(&contractor(), &["submit_proof", "0", "QmProof1"], &mut custody)
        .unwrap();
    let before = escrow.ledger().clone();
    let history_len = escrow.history().len();

    let args = attest(&signer, 0, "Qm1", "QmProof1");
    let err = escrow.call(&addr("anyone"), &args, &mut custody).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PayoutFailed);
    assert_eq!(escrow.ledger(), &before);
    assert_eq!(escrow.history().len(), history_len);
    assert_eq!(custody.balance(), 500);

    // Topping up lets the identical attestation through.
    custody.credit(500).unwrap();
    escrow.call(&addr("anyone"), &args, &mut custody).unwrap();
    assert_eq!(custody.balance(), 0);
    assert_eq!(escrow.ledger().current_milestone_index, 1);
}

#[test]
fn non_owner_add_milestone_changes_nothing() {
    let signer = AttestationSigner::generate();
    let mut escrow = deploy(&signer);
    let before = escrow.ledger().clone();
    let err = escrow
        .call(&contractor(), &["add_milestone", "0", "5", "0", "h"], &mut PayoutLog::new())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
    assert_eq!(escrow.ledger(), &before);
}

#[test]
fn released_proof_is_kept_as_history() {
    let signer = AttestationSigner::generate();
    let mut escrow = deploy(&signer);
    let mut sink = PayoutLog::new();
    escrow
        .call(&owner(), &["add_milestone", "0", "1", "0", "Qm1"], &mut sink)
        .unwrap();
    escrow
        .call(&contractor(), &["submit_proof", "0", "QmProof1"], &mut sink)
        .unwrap();
    escrow
        .call(&addr("x"), &attest(&signer, 0, "Qm1", "QmProof1"), &mut sink)
        .unwrap();
    assert_eq!(
        escrow.ledger().milestone(0).unwrap().submitted_proof.as_deref(),
        Some("QmProof1")
    );
}

/// Numeric field text: valid, negative, oversized, over the schema limit,
/// or not a number at all.
fn field_text() -> impl Strategy<Value = String> {
    prop_oneof![
        (0u64..64).prop_map(|n| n.to_string()),
        (64u64..u64::MAX).prop_map(|n| n.to_string()),
        (1i64..i64::MAX).prop_map(|n| format!("-{n}")),
        Just("18446744073709551616".to_string()),
        "[0-9]{21,30}",
        "[a-z .+]{0,8}",
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Adding at `total` grows it by one; adding below it only grows the balance.
    #[test]
    fn add_milestone_counters(amounts in prop::collection::vec(0u64..1_000_000, 1..8),
                              overwrite in 0usize..8,
                              extra in 0u64..1_000_000) {
        let signer = AttestationSigner::generate();
        let mut escrow = deploy(&signer);
        let mut sink = PayoutLog::new();

        for (i, amount) in amounts.iter().enumerate() {
            let before_total = escrow.ledger().total_milestones;
            let before_balance = escrow.ledger().escrow_balance;
            let (i, amount_s) = (i.to_string(), amount.to_string());
            escrow.call(&owner(), &["add_milestone", i.as_str(), amount_s.as_str(), "0", "h"], &mut sink).unwrap();
            prop_assert_eq!(escrow.ledger().total_milestones, before_total + 1);
            prop_assert_eq!(escrow.ledger().escrow_balance, before_balance + amount);
        }

        let index = (overwrite % amounts.len()).to_string();
        let extra_s = extra.to_string();
        let before_total = escrow.ledger().total_milestones;
        let before_balance = escrow.ledger().escrow_balance;
        escrow.call(&owner(), &["add_milestone", index.as_str(), extra_s.as_str(), "0", "h2"], &mut sink).unwrap();
        prop_assert_eq!(escrow.ledger().total_milestones, before_total);
        prop_assert_eq!(escrow.ledger().escrow_balance, before_balance + extra);
    }

    /// Proof submission off the cursor is always MilestoneNotCurrent.
    #[test]
    fn submit_proof_off_cursor(index in 1u64..1000) {
        let signer = AttestationSigner::generate();
        let mut escrow = deploy(&signer);
        let mut sink = PayoutLog::new();
        escrow.call(&owner(), &["add_milestone", "0", "1", "0", "h"], &mut sink).unwrap();
        let index = index.to_string();
        let err = escrow
            .call(&contractor(), &["submit_proof", index.as_str(), "p"], &mut sink)
            .unwrap_err();
        prop_assert_eq!(err.kind(), ErrorKind::MilestoneNotCurrent);
    }

    /// A non-owner is refused whatever the milestone fields hold.
    #[test]
    fn non_owner_add_milestone_refused_for_any_fields(
        index in field_text(),
        amount in field_text(),
        due in field_text(),
        hash in ".{0,16}",
        caller in prop_oneof![Just("builder-co"), Just("mallory"), Just("relayer")],
    ) {
        let signer = AttestationSigner::generate();
        let mut escrow = deploy(&signer);
        let mut sink = PayoutLog::new();
        let before = escrow.ledger().clone();
        let args = ["add_milestone", index.as_str(), amount.as_str(), due.as_str(), hash.as_str()];
        let err = escrow.call(&addr(caller), &args, &mut sink).unwrap_err();
        prop_assert_eq!(err.kind(), ErrorKind::Unauthorized);
        prop_assert_eq!(escrow.ledger(), &before);
        prop_assert_eq!(escrow.history().len(), 1);
    }

    /// A non-contractor is refused whatever the proof fields hold.
    #[test]
    fn non_contractor_submit_proof_refused_for_any_fields(
        index in field_text(),
        proof in ".{0,16}",
        caller in prop_oneof![Just("gov-owner"), Just("mallory")],
    ) {
        let signer = AttestationSigner::generate();
        let mut escrow = deploy(&signer);
        let mut sink = PayoutLog::new();
        escrow.call(&owner(), &["add_milestone", "0", "1", "0", "h"], &mut sink).unwrap();
        let before = escrow.ledger().clone();
        let err = escrow
            .call(&addr(caller), &["submit_proof", index.as_str(), proof.as_str()], &mut sink)
            .unwrap_err();
        prop_assert_eq!(err.kind(), ErrorKind::Unauthorized);
        prop_assert_eq!(escrow.ledger(), &before);
    }

    /// A signature from any other key leaves the ledger unchanged.
    #[test]
    fn foreign_signature_leaves_ledger_unchanged(seed in any::<[u8; 32]>()) {
        let signer = AttestationSigner::from_seed_hex(&"77".repeat(32)).unwrap();
        let forger = Ed25519KeyPair::from_seed(&seed);
        prop_assume!(forger.public_key() != signer.public_key());

        let mut escrow = deploy(&signer);
        let mut sink = PayoutLog::new();
        escrow.call(&owner(), &["add_milestone", "0", "10", "0", "Qm1"], &mut sink).unwrap();
        escrow.call(&contractor(), &["submit_proof", "0", "QmProof1"], &mut sink).unwrap();
        let before = escrow.ledger().clone();

        let message = "app:42|ms:0|status:PASS|ts:1000|hash:Qm1|proof:QmProof1";
        let sig = forger.sign(message.as_bytes()).to_hex();
        let err = escrow
            .call(&addr("x"), &["verify_release", "0", message, sig.as_str()], &mut sink)
            .unwrap_err();
        prop_assert_eq!(err.kind(), ErrorKind::SignatureInvalid);
        prop_assert_eq!(escrow.ledger(), &before);
        prop_assert!(sink.receipts().is_empty());
    }
}
