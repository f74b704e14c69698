// sbcredit-ledger/src/store.rs

//! Injected key-value storage for the ledger.
//!
//! Keys are binary: a short ASCII namespace followed by fixed-width big-endian
//! identifiers, so prefix scans return entries in token id order. Values are JSON.

use std::{
    collections::BTreeMap,
    fs,
    path::Path,
    sync::{Arc, Mutex},
};

use sbcredit_common::Address;
use serde::{de::DeserializeOwned, Serialize};
use sled::Db;

use crate::{
    config::LedgerConfig,
    error::{LedgerError, Result},
};

pub(crate) mod keys {
    use sbcredit_common::{Address, ADDRESS_LEN};

    const RECORD: &[u8] = b"record/";
    const OWNER: &[u8] = b"owner/";
    const ELIGIBILITY: &[u8] = b"eligibility/";
    pub const NEXT_TOKEN_ID: &[u8] = b"meta/next_token_id";
    pub const ISSUER: &[u8] = b"meta/issuer";

    pub fn record(token_id: u64) -> Vec<u8> {
        [RECORD, &token_id.to_be_bytes()[..]].concat()
    }

    pub fn owner_prefix(owner: &Address) -> Vec<u8> {
        [OWNER, &owner.as_bytes()[..], &b"/"[..]].concat()
    }

    pub fn owner_token(owner: &Address, token_id: u64) -> Vec<u8> {
        [&owner_prefix(owner)[..], &token_id.to_be_bytes()[..]].concat()
    }

    /// Token id encoded in an `owner_token` key.
    pub fn token_id_from_owner_key(key: &[u8]) -> Option<u64> {
        trailing_token_id(key, OWNER.len() + ADDRESS_LEN + 1)
    }

    pub fn eligibility_prefix(owner: &Address) -> Vec<u8> {
        [ELIGIBILITY, &owner.as_bytes()[..], &b"/"[..]].concat()
    }

    /// Threshold proved with one token of `owner`.
    pub fn eligibility(owner: &Address, token_id: u64) -> Vec<u8> {
        [&eligibility_prefix(owner)[..], &token_id.to_be_bytes()[..]].concat()
    }

    fn trailing_token_id(key: &[u8], prefix_len: usize) -> Option<u64> {
        if key.len() != prefix_len + 8 {
            return None;
        }
        let id: [u8; 8] = key[prefix_len..].try_into().ok()?;
        Some(u64::from_be_bytes(id))
    }
}

/// Pending writes, applied all-or-nothing by `LedgerStore::apply`.
#[derive(Debug, Default)]
pub struct WriteBatch {
    ops: Vec<(Vec<u8>, Option<Vec<u8>>)>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.ops.push((key, Some(value)));
    }

    pub fn put_json<T: Serialize>(&mut self, key: Vec<u8>, value: &T) -> Result<()> {
        self.put(key, serde_json::to_vec(value)?);
        Ok(())
    }

    pub fn delete(&mut self, key: Vec<u8>) {
        self.ops.push((key, None));
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

#[derive(Clone)]
pub struct LedgerStore {
    backend: Arc<StoreBackend>,
}

enum StoreBackend {
    InMemory(Mutex<BTreeMap<Vec<u8>, Vec<u8>>>),
    Persistent(Db),
}

impl LedgerStore {
    pub fn in_memory() -> Self {
        Self {
            backend: Arc::new(StoreBackend::InMemory(Mutex::new(BTreeMap::new()))),
        }
    }

    pub fn persistent(path: impl AsRef<Path>) -> Result<Self> {
        let path_ref = path.as_ref();
        if let Some(parent) = path_ref.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|err| {
                    LedgerError::Storage(format!(
                        "failed to create directory for ledger db at {}: {err}",
                        path_ref.display()
                    ))
                })?;
            }
        }
        let db = sled::open(path_ref)?;
        tracing::debug!(path = %path_ref.display(), "opened persistent ledger store");
        Ok(Self {
            backend: Arc::new(StoreBackend::Persistent(db)),
        })
    }

    pub fn from_config(config: &LedgerConfig) -> Result<Self> {
        if config.in_memory {
            Ok(Self::in_memory())
        } else {
            Self::persistent(&config.db_path)
        }
    }

    pub fn is_persistent(&self) -> bool {
        matches!(&*self.backend, StoreBackend::Persistent(_))
    }

    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        match &*self.backend {
            StoreBackend::InMemory(map) => Ok(lock(map)?.get(key).cloned()),
            StoreBackend::Persistent(db) => Ok(db.get(key)?.map(|value| value.to_vec())),
        }
    }

    pub fn get_json<T: DeserializeOwned>(&self, key: &[u8]) -> Result<Option<T>> {
        match self.get(key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn contains(&self, key: &[u8]) -> Result<bool> {
        match &*self.backend {
            StoreBackend::InMemory(map) => Ok(lock(map)?.contains_key(key)),
            StoreBackend::Persistent(db) => Ok(db.contains_key(key)?),
        }
    }

    /// Entries whose key starts with `prefix`, in key order.
    pub fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        match &*self.backend {
            StoreBackend::InMemory(map) => Ok(lock(map)?
                .range(prefix.to_vec()..)
                .take_while(|(key, _)| key.starts_with(prefix))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect()),
            StoreBackend::Persistent(db) => db
                .scan_prefix(prefix)
                .map(|entry| {
                    entry
                        .map(|(key, value)| (key.to_vec(), value.to_vec()))
                        .map_err(LedgerError::from)
                })
                .collect(),
        }
    }

    pub fn apply(&self, batch: WriteBatch) -> Result<()> {
        match &*self.backend {
            StoreBackend::InMemory(map) => {
                let mut guard = lock(map)?;
                for (key, value) in batch.ops {
                    match value {
                        Some(value) => {
                            guard.insert(key, value);
                        }
                        None => {
                            guard.remove(&key);
                        }
                    }
                }
                Ok(())
            }
            StoreBackend::Persistent(db) => {
                let mut sled_batch = sled::Batch::default();
                for (key, value) in batch.ops {
                    match value {
                        Some(value) => sled_batch.insert(key, value),
                        None => sled_batch.remove(key),
                    }
                }
                db.apply_batch(sled_batch)?;
                Ok(())
            }
        }
    }

    pub fn flush(&self) -> Result<()> {
        if let StoreBackend::Persistent(db) = &*self.backend {
            db.flush()?;
        }
        Ok(())
    }

    pub(crate) fn token_ids_of(&self, owner: &Address) -> Result<Vec<u64>> {
        Ok(self
            .scan_prefix(&keys::owner_prefix(owner))?
            .into_iter()
            .filter_map(|(key, _)| keys::token_id_from_owner_key(&key))
            .collect())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<std::sync::MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| LedgerError::Storage("ledger store lock poisoned".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise(store: &LedgerStore) {
        let owner = Address::new([7; 20]);
        let mut batch = WriteBatch::new();
        batch.put(keys::owner_token(&owner, 2), vec![]);
        batch.put(keys::owner_token(&owner, 1), vec![]);
        batch.put(keys::owner_token(&Address::new([8; 20]), 3), vec![]);
        batch.put_json(keys::NEXT_TOKEN_ID.to_vec(), &4u64).unwrap();
        store.apply(batch).unwrap();

        assert_eq!(store.token_ids_of(&owner).unwrap(), vec![1, 2]);
        assert_eq!(
            store.get_json::<u64>(keys::NEXT_TOKEN_ID).unwrap(),
            Some(4)
        );

        let mut batch = WriteBatch::new();
        batch.delete(keys::owner_token(&owner, 1));
        store.apply(batch).unwrap();
        assert_eq!(store.token_ids_of(&owner).unwrap(), vec![2]);
        assert!(!store.contains(&keys::owner_token(&owner, 1)).unwrap());
    }

    #[test]
    fn in_memory_store_batches() {
        exercise(&LedgerStore::in_memory());
    }

    #[test]
    fn sled_store_batches() {
        let dir = tempfile::tempdir().unwrap();
        exercise(&LedgerStore::persistent(dir.path().join("ledger.db")).unwrap());
    }

    #[test]
    fn sled_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");
        {
            let store = LedgerStore::persistent(&path).unwrap();
            let mut batch = WriteBatch::new();
            batch.put(keys::record(9), b"{}".to_vec());
            store.apply(batch).unwrap();
            store.flush().unwrap();
        }
        let reopened = LedgerStore::persistent(&path).unwrap();
        assert_eq!(reopened.get(&keys::record(9)).unwrap(), Some(b"{}".to_vec()));
    }

    #[test]
    fn owner_key_round_trips_token_id() {
        let key = keys::owner_token(&Address::new([1; 20]), 0x0102_0304_0506_0708);
        assert_eq!(
            keys::token_id_from_owner_key(&key),
            Some(0x0102_0304_0506_0708)
        );
        assert_eq!(keys::token_id_from_owner_key(b"owner/short"), None);
    }
}
