//! Domain types for the balance ledger.
//!
//! This module provides:
//! - Integer micro-unit amounts and display formatting
//! - Domain primitives: Uid, TimeMs, Address, EntryId
//! - Balance aggregate with the transition rules used for reconciliation
//! - Ledger entries and reservations with explicit enumerated states

pub mod amount;
pub mod balance;
pub mod entry;
pub mod primitives;
pub mod reservation;

pub use amount::{format_micros, Micros, MICROS_PER_UNIT};
pub use balance::{Balance, BalanceViolation};
pub use entry::{Cursor, EntryType, LedgerEntry, NewEntry, UnknownEntryType};
pub use primitives::{Address, AddressParseError, EntryId, TimeMs, Uid};
pub use reservation::{Reservation, ReservationState, UnknownReservationState};
