use crate::domain::{EntryType, Micros};
use thiserror::Error;

/// Failures of ledger operations.
///
/// Business-rule rejections leave every balance and the ledger untouched.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error("Insufficient funds: available {available}, required {required}")]
    InsufficientFunds { available: Micros, required: Micros },
    #[error("Insufficient reserved funds: reserved {reserved}, required {required}")]
    InsufficientReserved { reserved: Micros, required: Micros },
    #[error("Duplicate reference {reference_id} for {entry_type}")]
    DuplicateReference {
        reference_id: String,
        entry_type: EntryType,
    },
    #[error("Unknown reservation: {0}")]
    UnknownReservation(String),
    #[error(transparent)]
    Storage(#[from] sqlx::Error),
}

impl LedgerError {
    /// Whether retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            LedgerError::Storage(sqlx::Error::Database(db)) => {
                db.message().contains("database is locked")
            }
            LedgerError::Storage(sqlx::Error::PoolTimedOut) => true,
            _ => false,
        }
    }
}
