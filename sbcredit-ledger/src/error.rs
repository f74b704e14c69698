// sbcredit-ledger/src/error.rs

//! Error types for ledger and eligibility operations.
//!
//! Every variant is returned before any write is committed, so a failed call never
//! leaves partial state behind.

use sbcredit_common::{Address, EncodingError};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    /// Caller lacks issuing authority or holder rights.
    #[error("unauthorized caller {caller}")]
    Unauthorized { caller: Address },

    #[error("token {0} not found")]
    NotFound(u64),

    /// Soulbound tokens never change hands.
    #[error("token {0} is soulbound and cannot be transferred")]
    TransferNotAllowed(u64),

    #[error("invalid proof: {0}")]
    InvalidProof(String),

    /// The proof's public commitment or owner disagrees with the token's record.
    #[error("proof does not match the record of token {token_id}")]
    CommitmentMismatch { token_id: u64 },

    #[error("malformed public signals: {0}")]
    MalformedSignals(#[from] EncodingError),

    #[error("storage error: {0}")]
    Storage(String),
}

impl LedgerError {
    /// Machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::Unauthorized { .. } => "UNAUTHORIZED",
            LedgerError::NotFound(_) => "NOT_FOUND",
            LedgerError::TransferNotAllowed(_) => "TRANSFER_NOT_ALLOWED",
            LedgerError::InvalidProof(_) => "INVALID_PROOF",
            LedgerError::CommitmentMismatch { .. } => "COMMITMENT_MISMATCH",
            LedgerError::MalformedSignals(_) => "MALFORMED_SIGNALS",
            LedgerError::Storage(_) => "STORAGE_ERROR",
        }
    }
}

impl From<sled::Error> for LedgerError {
    fn from(err: sled::Error) -> Self {
        LedgerError::Storage(format!("sled: {err}"))
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        LedgerError::Storage(format!("codec: {err}"))
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
