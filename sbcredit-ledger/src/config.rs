// sbcredit-ledger/src/config.rs

use std::{env, path::PathBuf};

use anyhow::{Context, Result};
use sbcredit_common::Address;

pub const MANIFEST_ENV: &str = "SBCREDIT_MANIFEST_PATH";
pub const LEDGER_DB_ENV: &str = "SBCREDIT_LEDGER_DB";
pub const LEDGER_IN_MEMORY_ENV: &str = "SBCREDIT_LEDGER_IN_MEMORY";
pub const ISSUER_ENV: &str = "SBCREDIT_ISSUER";

pub const DEFAULT_MANIFEST_PATH: &str = "artifacts/manifest.json";
pub const DEFAULT_LEDGER_DB_PATH: &str = "data/ledger.db";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LedgerConfig {
    pub manifest_path: PathBuf,
    pub db_path: PathBuf,
    pub in_memory: bool,
    /// Issuing authority for a fresh ledger. An existing ledger keeps its stored issuer.
    pub issuer: Option<Address>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            manifest_path: PathBuf::from(DEFAULT_MANIFEST_PATH),
            db_path: PathBuf::from(DEFAULT_LEDGER_DB_PATH),
            in_memory: false,
            issuer: None,
        }
    }
}

impl LedgerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let issuer = match lookup(ISSUER_ENV) {
            Some(raw) => Some(
                raw.trim()
                    .parse::<Address>()
                    .with_context(|| format!("{ISSUER_ENV} is not a valid address"))?,
            ),
            None => None,
        };

        Ok(Self {
            manifest_path: lookup(MANIFEST_ENV)
                .map(PathBuf::from)
                .unwrap_or(defaults.manifest_path),
            db_path: lookup(LEDGER_DB_ENV)
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            in_memory: lookup(LEDGER_IN_MEMORY_ENV)
                .map(|value| parse_bool(&value))
                .unwrap_or(defaults.in_memory),
            issuer,
        })
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = LedgerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, LedgerConfig::default());
    }

    #[test]
    fn overrides_are_read() {
        let config = LedgerConfig::from_lookup(lookup(&[
            (MANIFEST_ENV, "/tmp/m.json"),
            (LEDGER_DB_ENV, "/tmp/ledger"),
            (LEDGER_IN_MEMORY_ENV, "TRUE"),
            (ISSUER_ENV, "0x1515151515151515151515151515151515151515"),
        ]))
        .unwrap();
        assert_eq!(config.manifest_path, PathBuf::from("/tmp/m.json"));
        assert_eq!(config.db_path, PathBuf::from("/tmp/ledger"));
        assert!(config.in_memory);
        assert_eq!(config.issuer, Some(Address::new([0x15; 20])));
    }

    #[test]
    fn bad_issuer_is_rejected() {
        assert!(LedgerConfig::from_lookup(lookup(&[(ISSUER_ENV, "0x15")])).is_err());
    }

    #[test]
    fn unknown_bool_is_false() {
        let config =
            LedgerConfig::from_lookup(lookup(&[(LEDGER_IN_MEMORY_ENV, "sometimes")])).unwrap();
        assert!(!config.in_memory);
    }
}
