// sbcredit-ledger/src/ledger.rs

use std::{
    cmp::Reverse,
    sync::{Arc, Mutex, MutexGuard},
};

use sbcredit_common::{
    codec::EncryptedField,
    prepare::{AttestationRecord, IssuancePayload},
    Address, Commitment,
};
use tracing::{debug, warn};

use crate::{
    config::LedgerConfig,
    eligibility::EligibilityRecord,
    error::{LedgerError, Result},
    events::{EventSink, LedgerEvent, TracingSink},
    store::{keys, LedgerStore, WriteBatch},
};

const FIRST_TOKEN_ID: u64 = 1;

/// Soulbound attestation registry.
///
/// Mutations take the write lock, validate, and commit a single batch; events are
/// emitted only after the batch lands. Reads go straight to the store.
pub struct AttestationLedger {
    store: LedgerStore,
    write_lock: Mutex<()>,
    sink: Arc<dyn EventSink>,
}

impl AttestationLedger {
    /// Open a ledger, recording `issuer` if the store has none yet. A store that
    /// already names an issuer keeps it.
    pub fn new(store: LedgerStore, issuer: Address) -> Result<Self> {
        let ledger = Self::with_store(store);
        match ledger.store.get_json::<Address>(keys::ISSUER)? {
            Some(stored) if stored != issuer => {
                warn!(%stored, requested = %issuer, "ledger already has an issuer, keeping it");
            }
            Some(_) => {}
            None => {
                let mut batch = WriteBatch::new();
                batch.put_json(keys::ISSUER.to_vec(), &issuer)?;
                ledger.store.apply(batch)?;
                debug!(%issuer, "initialized ledger issuer");
            }
        }
        Ok(ledger)
    }

    /// Open an existing ledger. Fails if no issuer was ever recorded.
    pub fn open(store: LedgerStore) -> Result<Self> {
        let ledger = Self::with_store(store);
        ledger.issuer()?;
        Ok(ledger)
    }

    pub fn from_config(config: &LedgerConfig) -> Result<Self> {
        let store = LedgerStore::from_config(config)?;
        match config.issuer {
            Some(issuer) => Self::new(store, issuer),
            None => Self::open(store),
        }
    }

    fn with_store(store: LedgerStore) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
            sink: Arc::new(TracingSink),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn store(&self) -> &LedgerStore {
        &self.store
    }

    pub fn issuer(&self) -> Result<Address> {
        self.store
            .get_json(keys::ISSUER)?
            .ok_or_else(|| LedgerError::Storage("ledger has no issuer".into()))
    }

    /// Hand issuing authority to `new_issuer`. Only the current issuer may do this.
    pub fn set_issuer(&self, caller: Address, new_issuer: Address) -> Result<()> {
        let _guard = self.write_guard()?;
        let previous = self.ensure_issuer(caller)?;

        let mut batch = WriteBatch::new();
        batch.put_json(keys::ISSUER.to_vec(), &new_issuer)?;
        self.store.apply(batch)?;

        self.emit(LedgerEvent::IssuerChanged {
            previous,
            current: new_issuer,
        });
        Ok(())
    }

    pub fn issue(
        &self,
        caller: Address,
        owner: Address,
        commitment: Commitment,
        enc_credit_score: EncryptedField,
        enc_income: EncryptedField,
        enc_report_date: EncryptedField,
    ) -> Result<u64> {
        self.issue_payload(
            caller,
            IssuancePayload {
                owner,
                commitment,
                enc_credit_score,
                enc_income,
                enc_report_date,
            },
        )
    }

    pub fn issue_payload(&self, caller: Address, payload: IssuancePayload) -> Result<u64> {
        let _guard = self.write_guard()?;
        self.ensure_issuer(caller)?;

        let token_id = self
            .store
            .get_json::<u64>(keys::NEXT_TOKEN_ID)?
            .unwrap_or(FIRST_TOKEN_ID);
        let next = token_id
            .checked_add(1)
            .ok_or_else(|| LedgerError::Storage("token id space exhausted".into()))?;

        let owner = payload.owner;
        let record = AttestationRecord::from_payload(token_id, payload);

        let mut batch = WriteBatch::new();
        batch.put_json(keys::record(token_id), &record)?;
        batch.put(keys::owner_token(&owner, token_id), Vec::new());
        batch.put_json(keys::NEXT_TOKEN_ID.to_vec(), &next)?;
        self.store.apply(batch)?;

        self.emit(LedgerEvent::Issued { token_id, owner });
        Ok(token_id)
    }

    /// Burn a token. The holder and the issuer may revoke; nobody else.
    ///
    /// A threshold proved with the token is dropped in the same batch; the owner's
    /// eligibility falls back to the best proof among their remaining tokens.
    pub fn revoke(&self, caller: Address, token_id: u64) -> Result<()> {
        let _guard = self.write_guard()?;
        let record = self.get_record(token_id)?;

        if caller != record.owner && caller != self.issuer()? {
            warn!(token_id, %caller, "revocation rejected");
            return Err(LedgerError::Unauthorized { caller });
        }

        let owner = record.owner;
        let mut batch = WriteBatch::new();
        batch.delete(keys::record(token_id));
        batch.delete(keys::owner_token(&owner, token_id));

        let proved = self.proved_thresholds(&owner)?;
        let had_proof = proved.iter().any(|entry| entry.token_id == token_id);
        if had_proof {
            batch.delete(keys::eligibility(&owner, token_id));
        }

        self.store.apply(batch)?;

        self.emit(LedgerEvent::Revoked {
            token_id,
            owner,
            by: caller,
        });
        if had_proof {
            let remaining = best_of(proved.into_iter().filter(|entry| entry.token_id != token_id))
                .map(|entry| entry.threshold)
                .unwrap_or(0);
            self.emit(LedgerEvent::EligibilityCleared {
                owner,
                token_id,
                remaining,
            });
        }
        Ok(())
    }

    pub fn get_record(&self, token_id: u64) -> Result<AttestationRecord> {
        self.store
            .get_json(&keys::record(token_id))?
            .ok_or(LedgerError::NotFound(token_id))
    }

    pub fn owner_of(&self, token_id: u64) -> Result<Address> {
        self.get_record(token_id).map(|record| record.owner)
    }

    pub fn tokens_of(&self, owner: &Address) -> Result<Vec<u64>> {
        self.store.token_ids_of(owner)
    }

    /// Threshold proved with each of `owner`'s live tokens, in token id order.
    pub fn proved_thresholds(&self, owner: &Address) -> Result<Vec<EligibilityRecord>> {
        self.store
            .scan_prefix(&keys::eligibility_prefix(owner))?
            .into_iter()
            .map(|(_, value)| serde_json::from_slice(&value).map_err(LedgerError::from))
            .collect()
    }

    /// The proof that currently defines `owner`'s eligibility: highest threshold,
    /// earliest token on ties.
    pub fn eligibility_record(&self, owner: &Address) -> Result<Option<EligibilityRecord>> {
        Ok(best_of(self.proved_thresholds(owner)?))
    }

    /// Highest threshold proved by `owner` with a live token, or 0.
    pub fn query_eligibility(&self, owner: &Address) -> Result<u64> {
        Ok(self
            .eligibility_record(owner)?
            .map(|record| record.threshold)
            .unwrap_or(0))
    }

    /// Always fails: an existing token yields `TransferNotAllowed`, a missing one
    /// `NotFound`. No state changes either way.
    pub fn transfer(
        &self,
        caller: Address,
        from: Address,
        to: Address,
        token_id: u64,
    ) -> Result<()> {
        self.get_record(token_id)?;
        warn!(token_id, %caller, %from, %to, "transfer of soulbound token rejected");
        Err(LedgerError::TransferNotAllowed(token_id))
    }

    pub(crate) fn write_guard(&self) -> Result<MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|_| LedgerError::Storage("ledger write lock poisoned".into()))
    }

    pub(crate) fn emit(&self, event: LedgerEvent) {
        self.sink.emit(&event);
    }

    fn ensure_issuer(&self, caller: Address) -> Result<Address> {
        let issuer = self.issuer()?;
        if caller != issuer {
            warn!(%caller, "caller lacks issuing authority");
            return Err(LedgerError::Unauthorized { caller });
        }
        Ok(issuer)
    }
}

fn best_of(entries: impl IntoIterator<Item = EligibilityRecord>) -> Option<EligibilityRecord> {
    entries
        .into_iter()
        .max_by_key(|entry| (entry.threshold, Reverse(entry.token_id)))
}
