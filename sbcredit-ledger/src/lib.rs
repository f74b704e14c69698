// sbcredit-ledger/src/lib.rs

//! Soulbound credit attestation ledger and the proof-backed eligibility registry
//! that sits on top of it.

pub mod config;
pub mod eligibility;
pub mod error;
pub mod events;
pub mod ledger;
pub mod store;

pub use config::LedgerConfig;
pub use eligibility::{EligibilityRecord, EligibilityVerifier};
pub use error::{LedgerError, Result};
pub use events::{EventSink, LedgerEvent, MemorySink, TracingSink};
pub use ledger::AttestationLedger;
pub use store::{LedgerStore, WriteBatch};
