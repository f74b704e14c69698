// sbcredit-ledger/src/events.rs

use std::sync::Mutex;

use sbcredit_common::Address;
use serde::Serialize;
use tracing::info;

/// State changes announced after a successful commit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LedgerEvent {
    Issued {
        token_id: u64,
        owner: Address,
    },
    Revoked {
        token_id: u64,
        owner: Address,
        by: Address,
    },
    IssuerChanged {
        previous: Address,
        current: Address,
    },
    EligibilityUpdated {
        owner: Address,
        token_id: u64,
        threshold: u64,
        previous: u64,
    },
    /// A token with a recorded proof was revoked; `remaining` is the owner's
    /// eligibility over the tokens still live.
    EligibilityCleared {
        owner: Address,
        token_id: u64,
        remaining: u64,
    },
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: &LedgerEvent);
}

/// Default sink: every event becomes a structured log line.
#[derive(Debug, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &LedgerEvent) {
        match event {
            LedgerEvent::Issued { token_id, owner } => {
                info!(token_id, %owner, "attestation issued")
            }
            LedgerEvent::Revoked {
                token_id,
                owner,
                by,
            } => info!(token_id, %owner, %by, "attestation revoked"),
            LedgerEvent::IssuerChanged { previous, current } => {
                info!(%previous, %current, "issuer changed")
            }
            LedgerEvent::EligibilityUpdated {
                owner,
                token_id,
                threshold,
                previous,
            } => info!(%owner, token_id, threshold, previous, "eligibility updated"),
            LedgerEvent::EligibilityCleared {
                owner,
                token_id,
                remaining,
            } => info!(%owner, token_id, remaining, "token proof dropped on revocation"),
        }
    }
}

/// Keeps events in memory; used by tests and embedders that poll.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<LedgerEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&self) -> Vec<LedgerEvent> {
        match self.events.lock() {
            Ok(mut events) => std::mem::take(&mut *events),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: &LedgerEvent) {
        TracingSink.emit(event);
        match self.events.lock() {
            Ok(mut events) => events.push(event.clone()),
            Err(poisoned) => poisoned.into_inner().push(event.clone()),
        }
    }
}
