//! Balance ledger engine.
//!
//! [`Ledger`] owns the storage handle and exposes the state transitions
//! (`credit_deposit`, `reserve`, `release`, `spend`, `refund`) together with
//! the read API. Every transition runs as one storage transaction:
//! validate, mutate the balance row, append the ledger entry, commit. Any
//! failure drops the transaction, so no partial effect is ever persisted.

mod error;
mod read;
mod transitions;

pub use error::LedgerError;
pub use read::{Reconciliation, TransactionPage, MAX_PAGE_SIZE};
pub use transitions::CreditOutcome;

use crate::db::Repository;
use crate::domain::Micros;
use std::sync::Arc;

/// Longest accepted reference id, in bytes.
pub const MAX_REFERENCE_LEN: usize = 256;

/// Transition engine and read API over one storage handle.
#[derive(Clone)]
pub struct Ledger {
    repo: Arc<Repository>,
}

impl Ledger {
    pub fn new(repo: Arc<Repository>) -> Self {
        Self { repo }
    }

    pub fn repo(&self) -> &Arc<Repository> {
        &self.repo
    }
}

fn validate_amount(amount: Micros) -> Result<Micros, LedgerError> {
    if !amount.is_positive() {
        return Err(LedgerError::Validation(format!(
            "amount must be positive, got {}",
            amount
        )));
    }
    Ok(amount)
}

/// Trimmed reference id; must be non-empty and at most `MAX_REFERENCE_LEN` bytes.
fn validate_reference(reference_id: &str) -> Result<String, LedgerError> {
    let trimmed = reference_id.trim();
    if trimmed.is_empty() {
        return Err(LedgerError::Validation("referenceId must not be empty".into()));
    }
    if trimmed.len() > MAX_REFERENCE_LEN {
        return Err(LedgerError::Validation(format!(
            "referenceId longer than {} bytes",
            MAX_REFERENCE_LEN
        )));
    }
    Ok(trimmed.to_string())
}

/// External event ids (transaction hashes) compare case-insensitively.
fn normalize_event_reference(reference_id: &str) -> Result<String, LedgerError> {
    validate_reference(reference_id).map(|r| r.to_lowercase())
}
