pub mod api;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod ingest;
pub mod ledger;

pub use config::Config;
pub use db::{init_db, Repository};
pub use domain::{
    format_micros, Address, Balance, Cursor, EntryType, LedgerEntry, Micros, Reservation,
    ReservationState, TimeMs, Uid,
};
pub use error::AppError;
pub use ingest::{DepositIngestor, IngestSettings, IngestionReport, UserDirectory};
pub use ledger::{CreditOutcome, Ledger, LedgerError};
