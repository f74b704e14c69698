// sbcredit-ledger/tests/ledger.rs

use std::sync::Arc;

use sbcredit_common::{
    codec::{self, CodecError, EncryptedField, HolderKeypair},
    prepare::{decrypt_profile, prepare_issuance, verify_opening, IssuancePayload},
    Address, Profile,
};
use sbcredit_ledger::{
    AttestationLedger, LedgerConfig, LedgerError, LedgerEvent, LedgerStore, MemorySink,
};
use sbcredit_test_fixtures::{sample_profile, test_rng, HOLDER, ISSUER, STRANGER};

struct Harness {
    ledger: AttestationLedger,
    events: Arc<MemorySink>,
    keys: HolderKeypair,
}

fn harness() -> Harness {
    harness_with(LedgerStore::in_memory())
}

fn harness_with(store: LedgerStore) -> Harness {
    let events = Arc::new(MemorySink::new());
    let ledger = AttestationLedger::new(store, ISSUER)
        .unwrap()
        .with_sink(events.clone());
    let keys = HolderKeypair::generate(&mut test_rng(1));
    Harness {
        ledger,
        events,
        keys,
    }
}

fn payload_for(keys: &HolderKeypair, profile: &Profile, seed: u64) -> IssuancePayload {
    prepare_issuance(profile, &keys.public, &mut test_rng(seed)).unwrap()
}

#[test]
fn issuer_issues_retrievable_record() {
    let h = harness();
    let payload = payload_for(&h.keys, &sample_profile(), 2);

    let token_id = h
        .ledger
        .issue(
            ISSUER,
            payload.owner,
            payload.commitment,
            payload.enc_credit_score.clone(),
            payload.enc_income.clone(),
            payload.enc_report_date.clone(),
        )
        .unwrap();
    assert_eq!(token_id, 1);

    let record = h.ledger.get_record(token_id).unwrap();
    assert_eq!(record.token_id, token_id);
    assert_eq!(record.owner, HOLDER);
    assert_eq!(record.commitment, payload.commitment);
    assert_eq!(record.enc_credit_score, payload.enc_credit_score);
    assert_eq!(record.enc_income, payload.enc_income);
    assert_eq!(record.enc_report_date, payload.enc_report_date);

    assert_eq!(h.ledger.owner_of(token_id).unwrap(), HOLDER);
    assert_eq!(h.ledger.tokens_of(&HOLDER).unwrap(), vec![token_id]);
    assert_eq!(
        h.events.drain(),
        vec![LedgerEvent::Issued {
            token_id,
            owner: HOLDER
        }]
    );
}

#[test]
fn holder_recovers_profile_from_record() {
    let h = harness();
    let token_id = h
        .ledger
        .issue_payload(ISSUER, payload_for(&h.keys, &sample_profile(), 3))
        .unwrap();

    let record = h.ledger.get_record(token_id).unwrap();
    let profile = decrypt_profile(&h.keys.secret, &record).unwrap();
    assert_eq!(profile, sample_profile());
    assert!(verify_opening(&profile, &record.commitment));

    let other = HolderKeypair::generate(&mut test_rng(99));
    assert_eq!(
        decrypt_profile(&other.secret, &record),
        Err(CodecError::Integrity)
    );
}

#[test]
fn non_issuer_cannot_issue() {
    let h = harness();
    let err = h
        .ledger
        .issue_payload(HOLDER, payload_for(&h.keys, &sample_profile(), 4))
        .unwrap_err();
    assert_eq!(err, LedgerError::Unauthorized { caller: HOLDER });
    assert!(h.ledger.tokens_of(&HOLDER).unwrap().is_empty());
    assert_eq!(h.ledger.get_record(1), Err(LedgerError::NotFound(1)));
    assert!(h.events.drain().is_empty());
}

#[test]
fn token_ids_are_sequential_and_never_reused() {
    let h = harness();
    let first = h
        .ledger
        .issue_payload(ISSUER, payload_for(&h.keys, &sample_profile(), 5))
        .unwrap();
    let second = h
        .ledger
        .issue_payload(ISSUER, payload_for(&h.keys, &sample_profile(), 6))
        .unwrap();
    assert_eq!((first, second), (1, 2));

    h.ledger.revoke(ISSUER, second).unwrap();
    let third = h
        .ledger
        .issue_payload(ISSUER, payload_for(&h.keys, &sample_profile(), 7))
        .unwrap();
    assert_eq!(third, 3);
    assert_eq!(h.ledger.tokens_of(&HOLDER).unwrap(), vec![1, 3]);
}

#[test]
fn holder_revocation_removes_record() {
    let h = harness();
    let token_id = h
        .ledger
        .issue_payload(ISSUER, payload_for(&h.keys, &sample_profile(), 8))
        .unwrap();
    h.events.drain();

    h.ledger.revoke(HOLDER, token_id).unwrap();
    assert_eq!(
        h.ledger.get_record(token_id),
        Err(LedgerError::NotFound(token_id))
    );
    assert!(h.ledger.tokens_of(&HOLDER).unwrap().is_empty());
    assert_eq!(
        h.events.drain(),
        vec![LedgerEvent::Revoked {
            token_id,
            owner: HOLDER,
            by: HOLDER
        }]
    );
}

#[test]
fn issuer_may_revoke_but_strangers_may_not() {
    let h = harness();
    let token_id = h
        .ledger
        .issue_payload(ISSUER, payload_for(&h.keys, &sample_profile(), 9))
        .unwrap();

    assert_eq!(
        h.ledger.revoke(STRANGER, token_id),
        Err(LedgerError::Unauthorized { caller: STRANGER })
    );
    assert!(h.ledger.get_record(token_id).is_ok());

    h.ledger.revoke(ISSUER, token_id).unwrap();
    assert_eq!(
        h.ledger.revoke(ISSUER, token_id),
        Err(LedgerError::NotFound(token_id))
    );
}

#[test]
fn transfers_are_never_allowed() {
    let h = harness();
    let token_id = h
        .ledger
        .issue_payload(ISSUER, payload_for(&h.keys, &sample_profile(), 10))
        .unwrap();

    for caller in [HOLDER, ISSUER, STRANGER] {
        assert_eq!(
            h.ledger.transfer(caller, HOLDER, STRANGER, token_id),
            Err(LedgerError::TransferNotAllowed(token_id))
        );
    }
    assert_eq!(h.ledger.owner_of(token_id).unwrap(), HOLDER);
    assert!(h.ledger.tokens_of(&STRANGER).unwrap().is_empty());

    assert_eq!(
        h.ledger.transfer(HOLDER, HOLDER, STRANGER, 42),
        Err(LedgerError::NotFound(42))
    );
}

#[test]
fn issuer_handover() {
    let h = harness();
    assert_eq!(
        h.ledger.set_issuer(STRANGER, STRANGER),
        Err(LedgerError::Unauthorized { caller: STRANGER })
    );

    h.ledger.set_issuer(ISSUER, STRANGER).unwrap();
    assert_eq!(h.ledger.issuer().unwrap(), STRANGER);
    assert!(h
        .ledger
        .issue_payload(ISSUER, payload_for(&h.keys, &sample_profile(), 11))
        .is_err());
    assert!(h
        .ledger
        .issue_payload(STRANGER, payload_for(&h.keys, &sample_profile(), 12))
        .is_ok());
}

#[test]
fn tampered_ciphertext_fails_integrity() {
    let h = harness();
    let mut payload = payload_for(&h.keys, &sample_profile(), 13);
    let mut bytes = payload.enc_income.clone().into_bytes();
    bytes[50] ^= 0x80;
    payload.enc_income = EncryptedField::from_bytes(bytes);

    let token_id = h.ledger.issue_payload(ISSUER, payload).unwrap();
    let record = h.ledger.get_record(token_id).unwrap();
    assert_eq!(
        codec::decrypt(&h.keys.secret, &record.enc_income),
        Err(CodecError::Integrity)
    );
    assert_eq!(
        codec::decrypt(&h.keys.secret, &record.enc_credit_score),
        Ok(sample_profile().credit_score)
    );
}

#[test]
fn persistent_ledger_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.db");

    let keys = HolderKeypair::generate(&mut test_rng(14));
    let record = {
        let ledger = AttestationLedger::new(LedgerStore::persistent(&path).unwrap(), ISSUER)
            .unwrap();
        let token_id = ledger
            .issue_payload(ISSUER, payload_for(&keys, &sample_profile(), 15))
            .unwrap();
        ledger.store().flush().unwrap();
        ledger.get_record(token_id).unwrap()
    };

    let config = LedgerConfig {
        db_path: path,
        ..LedgerConfig::default()
    };
    let reopened = AttestationLedger::from_config(&config).unwrap();
    assert_eq!(reopened.issuer().unwrap(), ISSUER);
    assert_eq!(reopened.get_record(record.token_id).unwrap(), record);
    let next = reopened
        .issue_payload(ISSUER, payload_for(&keys, &sample_profile(), 16))
        .unwrap();
    assert_eq!(next, record.token_id + 1);
}

#[test]
fn stored_issuer_wins_over_requested() {
    let store = LedgerStore::in_memory();
    AttestationLedger::new(store.clone(), ISSUER).unwrap();
    let again = AttestationLedger::new(store, STRANGER).unwrap();
    assert_eq!(again.issuer().unwrap(), ISSUER);
}

#[test]
fn fresh_owner_has_no_eligibility() {
    let h = harness();
    h.ledger
        .issue_payload(ISSUER, payload_for(&h.keys, &sample_profile(), 17))
        .unwrap();
    assert_eq!(h.ledger.query_eligibility(&HOLDER).unwrap(), 0);
    assert_eq!(h.ledger.eligibility_record(&HOLDER).unwrap(), None);
    assert!(h.ledger.proved_thresholds(&HOLDER).unwrap().is_empty());
}

#[test]
fn open_requires_an_issuer() {
    assert!(matches!(
        AttestationLedger::open(LedgerStore::in_memory()),
        Err(LedgerError::Storage(_))
    ));
}

#[test]
fn concurrent_issuance_allocates_distinct_ids() {
    let h = harness();
    let ledger = Arc::new(h.ledger);
    let owners: Vec<Address> = (1..=8u8).map(|i| Address::new([i; 20])).collect();

    let handles: Vec<_> = owners
        .iter()
        .enumerate()
        .map(|(i, owner)| {
            let ledger = Arc::clone(&ledger);
            let profile = Profile {
                owner: *owner,
                ..sample_profile()
            };
            let payload = payload_for(&h.keys, &profile, 100 + i as u64);
            std::thread::spawn(move || ledger.issue_payload(ISSUER, payload).unwrap())
        })
        .collect();

    let mut ids: Vec<u64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    ids.sort_unstable();
    assert_eq!(ids, (1..=8).collect::<Vec<_>>());
    for owner in &owners {
        assert_eq!(ledger.tokens_of(owner).unwrap().len(), 1);
    }
}
