//! The state transitions. Each one is a single storage transaction.

use super::{normalize_event_reference, validate_amount, validate_reference, Ledger, LedgerError};
use crate::db::Repository;
use crate::domain::{Balance, EntryType, Micros, NewEntry, ReservationState, TimeMs, Uid};
use sqlx::{Sqlite, Transaction};
use tracing::{info, warn};

const DEFAULT_DEPOSIT_DESCRIPTION: &str = "USDC deposit";
const DEFAULT_RESERVE_DESCRIPTION: &str = "Reserved for bounty";
const DEFAULT_RELEASE_DESCRIPTION: &str = "Released from bounty";
const DEFAULT_SPEND_DESCRIPTION: &str = "Bounty reward paid";
const DEFAULT_REFUND_DESCRIPTION: &str = "Refund";

/// Result of crediting an external event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreditOutcome {
    /// First delivery; the balance was credited.
    Credited(Balance),
    /// The reference id was already credited; nothing changed.
    Replayed(Balance),
}

impl CreditOutcome {
    pub fn balance(&self) -> &Balance {
        match self {
            CreditOutcome::Credited(b) | CreditOutcome::Replayed(b) => b,
        }
    }

    pub fn into_balance(self) -> Balance {
        match self {
            CreditOutcome::Credited(b) | CreditOutcome::Replayed(b) => b,
        }
    }

    pub fn is_replay(&self) -> bool {
        matches!(self, CreditOutcome::Replayed(_))
    }
}

impl Ledger {
    /// Credit an external deposit identified by its transaction hash.
    ///
    /// Idempotent on `(reference_id, deposit)`: a redelivered event returns
    /// the current balance without crediting again.
    pub async fn credit_deposit(
        &self,
        uid: Uid,
        amount: Micros,
        reference_id: &str,
        description: Option<&str>,
    ) -> Result<Balance, LedgerError> {
        self.try_credit_deposit(uid, amount, reference_id, description)
            .await
            .map(CreditOutcome::into_balance)
    }

    /// Same as [`Ledger::credit_deposit`], reporting whether it was a replay.
    pub async fn try_credit_deposit(
        &self,
        uid: Uid,
        amount: Micros,
        reference_id: &str,
        description: Option<&str>,
    ) -> Result<CreditOutcome, LedgerError> {
        self.credit_external(
            uid,
            EntryType::Deposit,
            amount,
            reference_id,
            description.unwrap_or(DEFAULT_DEPOSIT_DESCRIPTION),
        )
        .await
    }

    /// Credit funds returned to the user from outside, e.g. an unclaimed
    /// payout. Idempotent on `(reference_id, refund)` like deposits.
    pub async fn refund(
        &self,
        uid: Uid,
        amount: Micros,
        reference_id: &str,
        description: Option<&str>,
    ) -> Result<Balance, LedgerError> {
        self.credit_external(
            uid,
            EntryType::Refund,
            amount,
            reference_id,
            description.unwrap_or(DEFAULT_REFUND_DESCRIPTION),
        )
        .await
        .map(CreditOutcome::into_balance)
    }

    /// Move `amount` from available to reserved under the commitment
    /// `reference_id`.
    pub async fn reserve(
        &self,
        uid: Uid,
        amount: Micros,
        reference_id: &str,
        description: Option<&str>,
    ) -> Result<Balance, LedgerError> {
        let amount = validate_amount(amount)?;
        let reference_id = validate_reference(reference_id)?;

        let mut tx = self.repo.begin().await?;
        Repository::ensure_balance(&mut tx, uid, TimeMs::now()).await?;
        // Write lock held from here on, so timestamps follow commit order.
        let now = TimeMs::now();

        if !Repository::insert_reservation(&mut tx, uid, &reference_id, amount, now).await? {
            warn!(uid = %uid, reference_id = %reference_id, "reserve rejected: reference already reserved");
            return Err(LedgerError::DuplicateReference {
                reference_id,
                entry_type: EntryType::Reserve,
            });
        }

        if !Repository::apply_movement(&mut tx, uid, EntryType::Reserve, amount, now).await? {
            let current = Repository::fetch_balance(&mut tx, uid).await?;
            warn!(
                uid = %uid,
                amount = %amount,
                available = %current.available,
                reference_id = %reference_id,
                "reserve rejected: insufficient funds"
            );
            return Err(LedgerError::InsufficientFunds {
                available: current.available,
                required: amount,
            });
        }

        let balance = append_and_commit(
            tx,
            NewEntry {
                uid,
                entry_type: EntryType::Reserve,
                amount,
                reference_id: Some(reference_id.clone()),
                description: Some(description.unwrap_or(DEFAULT_RESERVE_DESCRIPTION).to_string()),
                created_at: now,
            },
        )
        .await?;

        info!(
            uid = %uid,
            amount = %amount,
            reference_id = %reference_id,
            available = %balance.available,
            reserved = %balance.reserved,
            "funds reserved"
        );
        Ok(balance)
    }

    /// Return `amount` of the reservation `reference_id` to available.
    pub async fn release(
        &self,
        uid: Uid,
        amount: Micros,
        reference_id: &str,
        description: Option<&str>,
    ) -> Result<Balance, LedgerError> {
        self.settle(
            uid,
            EntryType::Release,
            amount,
            reference_id,
            description.unwrap_or(DEFAULT_RELEASE_DESCRIPTION),
        )
        .await
    }

    /// Pay `amount` of the reservation `reference_id` out of the system.
    pub async fn spend(
        &self,
        uid: Uid,
        amount: Micros,
        reference_id: &str,
        description: Option<&str>,
    ) -> Result<Balance, LedgerError> {
        self.settle(
            uid,
            EntryType::Spend,
            amount,
            reference_id,
            description.unwrap_or(DEFAULT_SPEND_DESCRIPTION),
        )
        .await
    }

    async fn credit_external(
        &self,
        uid: Uid,
        entry_type: EntryType,
        amount: Micros,
        reference_id: &str,
        description: &str,
    ) -> Result<CreditOutcome, LedgerError> {
        let amount = validate_amount(amount)?;
        let reference_id = normalize_event_reference(reference_id)?;

        let mut tx = self.repo.begin().await?;
        Repository::ensure_balance(&mut tx, uid, TimeMs::now()).await?;
        // Write lock held from here on, so timestamps follow commit order.
        let now = TimeMs::now();

        let entry = NewEntry {
            uid,
            entry_type,
            amount,
            reference_id: Some(reference_id.clone()),
            description: Some(description.to_string()),
            created_at: now,
        };
        if Repository::append_entry(&mut tx, &entry).await?.is_none() {
            let balance = Repository::fetch_balance(&mut tx, uid).await?;
            tx.commit().await?;
            info!(
                uid = %uid,
                reference_id = %reference_id,
                entry_type = %entry_type,
                "replayed credit ignored"
            );
            return Ok(CreditOutcome::Replayed(balance));
        }

        if !Repository::apply_movement(&mut tx, uid, entry_type, amount, now).await? {
            return Err(LedgerError::Validation(format!(
                "{} of {} would overflow the balance of uid {}",
                entry_type, amount, uid
            )));
        }

        let balance = Repository::fetch_balance(&mut tx, uid).await?;
        tx.commit().await?;

        info!(
            uid = %uid,
            amount = %amount,
            reference_id = %reference_id,
            entry_type = %entry_type,
            available = %balance.available,
            total_deposited = %balance.total_deposited,
            "balance credited"
        );
        Ok(CreditOutcome::Credited(balance))
    }

    /// Spend or release against one active reservation owned by `uid`.
    async fn settle(
        &self,
        uid: Uid,
        entry_type: EntryType,
        amount: Micros,
        reference_id: &str,
        description: &str,
    ) -> Result<Balance, LedgerError> {
        let amount = validate_amount(amount)?;
        let reference_id = validate_reference(reference_id)?;

        let mut tx = self.repo.begin().await?;
        Repository::ensure_balance(&mut tx, uid, TimeMs::now()).await?;
        // Write lock held from here on, so timestamps follow commit order.
        let now = TimeMs::now();

        let reservation = Repository::fetch_reservation(&mut tx, &reference_id)
            .await?
            .filter(|r| r.uid == uid && r.state == ReservationState::Active)
            .ok_or_else(|| LedgerError::UnknownReservation(reference_id.clone()))?;

        let remaining = reservation.remaining();
        if remaining < amount {
            warn!(
                uid = %uid,
                amount = %amount,
                remaining = %remaining,
                reference_id = %reference_id,
                entry_type = %entry_type,
                "rejected: reservation does not cover amount"
            );
            return Err(LedgerError::InsufficientReserved {
                reserved: remaining,
                required: amount,
            });
        }

        if !Repository::apply_movement(&mut tx, uid, entry_type, amount, now).await? {
            let current = Repository::fetch_balance(&mut tx, uid).await?;
            warn!(
                uid = %uid,
                amount = %amount,
                reserved = %current.reserved,
                reference_id = %reference_id,
                entry_type = %entry_type,
                "rejected: insufficient reserved funds"
            );
            return Err(LedgerError::InsufficientReserved {
                reserved: current.reserved,
                required: amount,
            });
        }

        let (spent, released) = match entry_type {
            EntryType::Spend => (amount, Micros::zero()),
            _ => (Micros::zero(), amount),
        };
        if !Repository::settle_reservation(&mut tx, &reservation, spent, released, now).await? {
            return Err(LedgerError::InsufficientReserved {
                reserved: remaining,
                required: amount,
            });
        }

        let balance = append_and_commit(
            tx,
            NewEntry {
                uid,
                entry_type,
                amount,
                reference_id: Some(reference_id.clone()),
                description: Some(description.to_string()),
                created_at: now,
            },
        )
        .await?;

        info!(
            uid = %uid,
            amount = %amount,
            reference_id = %reference_id,
            entry_type = %entry_type,
            available = %balance.available,
            reserved = %balance.reserved,
            total_spent = %balance.total_spent,
            "reservation settled"
        );
        Ok(balance)
    }
}

/// Append `entry`, read back the balance and commit.
///
/// A taken `(reference_id, entry_type)` aborts the whole transaction.
async fn append_and_commit(
    mut tx: Transaction<'static, Sqlite>,
    entry: NewEntry,
) -> Result<Balance, LedgerError> {
    if Repository::append_entry(&mut tx, &entry).await?.is_none() {
        let reference_id = entry.reference_id.unwrap_or_default();
        warn!(
            uid = %entry.uid,
            reference_id = %reference_id,
            entry_type = %entry.entry_type,
            "rejected: duplicate reference"
        );
        return Err(LedgerError::DuplicateReference {
            reference_id,
            entry_type: entry.entry_type,
        });
    }

    let balance = Repository::fetch_balance(&mut tx, entry.uid).await?;
    tx.commit().await?;
    Ok(balance)
}
