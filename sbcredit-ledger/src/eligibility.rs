// sbcredit-ledger/src/eligibility.rs

//! Proof submission and per-address eligibility.
//!
//! Each live token keeps the highest threshold proved with it. An address's
//! eligibility is the maximum over its live tokens, so lower proofs leave it
//! unchanged and revoking one token only drops that token's proof.

use std::sync::Arc;

use sbcredit_common::{
    artifacts::VerifierArtifacts, Address, ProofBundle, PublicSignals, CIRCUIT_VERSION,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    error::{LedgerError, Result},
    events::LedgerEvent,
    ledger::AttestationLedger,
    store::{keys, WriteBatch},
};

/// Highest threshold proved with one token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityRecord {
    pub threshold: u64,
    pub token_id: u64,
}

pub struct EligibilityVerifier {
    ledger: Arc<AttestationLedger>,
    artifacts: Arc<VerifierArtifacts>,
}

impl EligibilityVerifier {
    pub fn new(ledger: Arc<AttestationLedger>, artifacts: Arc<VerifierArtifacts>) -> Self {
        Self { ledger, artifacts }
    }

    pub fn ledger(&self) -> &AttestationLedger {
        &self.ledger
    }

    /// Verify a proof for `token_id` and record the proved threshold for the token's
    /// owner. Returns the owner's effective threshold afterwards.
    pub fn verify_and_record(&self, bundle: &ProofBundle, token_id: u64) -> Result<u64> {
        if bundle.circuit_version != CIRCUIT_VERSION {
            warn!(
                token_id,
                circuit_version = bundle.circuit_version,
                "proof for unsupported circuit version"
            );
            return Err(LedgerError::InvalidProof(format!(
                "circuit version {} is not {}",
                bundle.circuit_version, CIRCUIT_VERSION
            )));
        }

        let _guard = self.ledger.write_guard()?;
        let record = self.ledger.get_record(token_id)?;
        let signals = &bundle.public_signals;

        if signals.commitment != record.commitment || signals.owner != record.owner {
            warn!(token_id, owner = %signals.owner, "proof bound to a different record");
            return Err(LedgerError::CommitmentMismatch { token_id });
        }

        if !sbcredit_verifier::verify_signals(&self.artifacts, &bundle.proof, signals) {
            warn!(token_id, "proof failed verification");
            return Err(LedgerError::InvalidProof(
                "proof rejected by verifying key".into(),
            ));
        }

        self.record_threshold(record.owner, token_id, signals.threshold)
    }

    /// Same as `verify_and_record` for callers holding raw 32-byte signal words.
    pub fn verify_signals_and_record(
        &self,
        proof: &[u8],
        raw_signals: &[[u8; 32]],
        token_id: u64,
    ) -> Result<u64> {
        let public_signals = PublicSignals::from_raw(raw_signals).map_err(|err| {
            debug!(token_id, %err, "malformed public signals");
            LedgerError::from(err)
        })?;
        let bundle = ProofBundle::new(proof.to_vec(), public_signals);
        self.verify_and_record(&bundle, token_id)
    }

    /// Highest threshold proved by `owner` with a live token, or 0.
    pub fn query_eligibility(&self, owner: &Address) -> Result<u64> {
        self.ledger.query_eligibility(owner)
    }

    pub fn eligibility_record(&self, owner: &Address) -> Result<Option<EligibilityRecord>> {
        self.ledger.eligibility_record(owner)
    }

    // Caller holds the ledger write guard.
    fn record_threshold(&self, owner: Address, token_id: u64, threshold: u64) -> Result<u64> {
        let previous = self.ledger.query_eligibility(&owner)?;
        let key = keys::eligibility(&owner, token_id);
        let stored = self
            .ledger
            .store()
            .get_json::<EligibilityRecord>(&key)?
            .map(|record| record.threshold);

        if stored.map_or(true, |current| threshold > current) {
            let mut batch = WriteBatch::new();
            batch.put_json(
                key,
                &EligibilityRecord {
                    threshold,
                    token_id,
                },
            )?;
            self.ledger.store().apply(batch)?;
        }

        let effective = previous.max(threshold);
        self.ledger.emit(LedgerEvent::EligibilityUpdated {
            owner,
            token_id,
            threshold: effective,
            previous,
        });
        Ok(effective)
    }
}
