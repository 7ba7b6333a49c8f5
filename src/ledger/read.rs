//! Read API: snapshots, history pages and reconciliation.

use super::{Ledger, LedgerError};
use crate::db::Repository;
use crate::domain::{Balance, Cursor, EntryType, LedgerEntry, Micros, Reservation, ReservationState, TimeMs, Uid};
use serde::Serialize;
use tracing::{debug, warn};

/// Largest page `get_recent_transactions` / `get_transactions_page` return.
pub const MAX_PAGE_SIZE: u32 = 100;

/// One page of history, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionPage {
    pub entries: Vec<LedgerEntry>,
    /// Present when the page was full; pass it back as `before`.
    pub next_cursor: Option<Cursor>,
}

/// Stored balance compared against the folded ledger history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reconciliation {
    pub uid: Uid,
    pub stored: Balance,
    /// `None` when the history itself cannot be folded.
    pub folded: Option<Balance>,
    pub violation: Option<String>,
    /// Sum of the remaining amounts of the user's active reservations.
    pub active_reserved: Micros,
    pub entry_count: usize,
}

impl Reconciliation {
    pub fn is_consistent(&self) -> bool {
        let Some(folded) = &self.folded else {
            return false;
        };
        folded.same_pools(&self.stored)
            && self.stored.is_conserved()
            && self.stored.reserved == self.active_reserved
    }
}

fn clamp_limit(limit: u32) -> u32 {
    limit.clamp(1, MAX_PAGE_SIZE)
}

impl Ledger {
    /// Current balance of `uid`, created at zero on first reference.
    pub async fn get_balance_snapshot(&self, uid: Uid) -> Result<Balance, LedgerError> {
        Ok(self.repo.get_or_create_balance(uid).await?)
    }

    /// Most recent entries of `uid`, newest first. `limit` is clamped to
    /// `1..=MAX_PAGE_SIZE`.
    pub async fn get_recent_transactions(
        &self,
        uid: Uid,
        limit: u32,
    ) -> Result<Vec<LedgerEntry>, LedgerError> {
        Ok(self.repo.query_entries(uid, clamp_limit(limit), None).await?)
    }

    /// Page through the history of `uid`, newest first.
    pub async fn get_transactions_page(
        &self,
        uid: Uid,
        limit: u32,
        before: Option<Cursor>,
    ) -> Result<TransactionPage, LedgerError> {
        let limit = clamp_limit(limit);
        let entries = self.repo.query_entries(uid, limit, before).await?;
        let next_cursor = if entries.len() == limit as usize {
            entries.last().map(LedgerEntry::cursor)
        } else {
            None
        };
        Ok(TransactionPage {
            entries,
            next_cursor,
        })
    }

    pub async fn has_sufficient_funds(&self, uid: Uid, amount: Micros) -> Result<bool, LedgerError> {
        let balance = self.get_balance_snapshot(uid).await?;
        Ok(balance.available >= amount)
    }

    pub async fn exists_reference(
        &self,
        reference_id: &str,
        entry_type: EntryType,
    ) -> Result<bool, LedgerError> {
        let reference_id = match entry_type {
            EntryType::Deposit | EntryType::Refund => reference_id.trim().to_lowercase(),
            _ => reference_id.trim().to_string(),
        };
        Ok(self.repo.exists_reference(&reference_id, entry_type).await?)
    }

    pub async fn get_reservation(&self, reference_id: &str) -> Result<Option<Reservation>, LedgerError> {
        Ok(self.repo.get_reservation(reference_id.trim()).await?)
    }

    pub async fn list_reservations(
        &self,
        uid: Uid,
        state: Option<ReservationState>,
    ) -> Result<Vec<Reservation>, LedgerError> {
        Ok(self.repo.list_reservations(uid, state).await?)
    }

    /// Fold the full history of `uid` and compare it with the stored
    /// balance and the active reservations.
    ///
    /// All three reads come from one transaction, so they see the same
    /// committed state.
    pub async fn reconcile(&self, uid: Uid) -> Result<Reconciliation, LedgerError> {
        let mut tx = self.repo.begin().await?;
        let stored = Repository::find_balance(&mut tx, uid)
            .await?
            .unwrap_or_else(|| Balance::zero(uid, TimeMs::now()));
        let entries = Repository::entries_ascending(&mut tx, uid).await?;
        let active_reserved = Repository::active_reserved_total(&mut tx, uid).await?;
        tx.commit().await?;

        let (folded, violation) = match Balance::fold(uid, &entries) {
            Ok(folded) => (Some(folded), None),
            Err(v) => (None, Some(v.to_string())),
        };

        let report = Reconciliation {
            uid,
            stored,
            folded,
            violation,
            active_reserved,
            entry_count: entries.len(),
        };

        if report.is_consistent() {
            debug!(uid = %uid, entries = report.entry_count, "reconciliation consistent");
        } else {
            warn!(
                uid = %uid,
                entries = report.entry_count,
                violation = ?report.violation,
                "reconciliation mismatch"
            );
        }
        Ok(report)
    }
}
