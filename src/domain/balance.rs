//! Per-user balance aggregate and the transition rules that fold ledger
//! history into it.

use crate::domain::{EntryType, LedgerEntry, Micros, TimeMs, Uid};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Summary of a user's funds across the four pools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Balance {
    pub uid: Uid,
    pub available: Micros,
    pub reserved: Micros,
    pub total_deposited: Micros,
    pub total_spent: Micros,
    pub updated_at: TimeMs,
}

/// A fold step that would break a balance invariant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BalanceViolation {
    #[error("{entry_type} of {amount} would drive available negative (available {available})")]
    NegativeAvailable {
        entry_type: EntryType,
        amount: Micros,
        available: Micros,
    },
    #[error("{entry_type} of {amount} would drive reserved negative (reserved {reserved})")]
    NegativeReserved {
        entry_type: EntryType,
        amount: Micros,
        reserved: Micros,
    },
    #[error("{entry_type} of {amount} overflows the balance")]
    Overflow { entry_type: EntryType, amount: Micros },
    #[error("{entry_type} entry has non-positive amount {amount}")]
    NonPositiveAmount { entry_type: EntryType, amount: Micros },
}

impl Balance {
    /// Zero-valued balance, as created on first reference to `uid`.
    pub fn zero(uid: Uid, at: TimeMs) -> Self {
        Self {
            uid,
            available: Micros::zero(),
            reserved: Micros::zero(),
            total_deposited: Micros::zero(),
            total_spent: Micros::zero(),
            updated_at: at,
        }
    }

    /// `available + reserved == total_deposited - total_spent`.
    pub fn is_conserved(&self) -> bool {
        let held = self.available.as_i64() as i128 + self.reserved.as_i64() as i128;
        let net = self.total_deposited.as_i64() as i128 - self.total_spent.as_i64() as i128;
        held == net
    }

    /// Apply one movement under the transition rules.
    ///
    /// On error `self` is left unchanged.
    pub fn apply(&mut self, entry_type: EntryType, amount: Micros) -> Result<(), BalanceViolation> {
        if !amount.is_positive() {
            return Err(BalanceViolation::NonPositiveAmount { entry_type, amount });
        }
        let overflow = BalanceViolation::Overflow { entry_type, amount };

        let mut next = self.clone();
        match entry_type {
            EntryType::Deposit | EntryType::Refund => {
                next.available = next.available.checked_add(amount).ok_or(overflow.clone())?;
                next.total_deposited = next
                    .total_deposited
                    .checked_add(amount)
                    .ok_or(overflow)?;
            }
            EntryType::Reserve => {
                if self.available < amount {
                    return Err(BalanceViolation::NegativeAvailable {
                        entry_type,
                        amount,
                        available: self.available,
                    });
                }
                next.available = Micros::new(self.available.as_i64() - amount.as_i64());
                next.reserved = next.reserved.checked_add(amount).ok_or(overflow)?;
            }
            EntryType::Release => {
                if self.reserved < amount {
                    return Err(BalanceViolation::NegativeReserved {
                        entry_type,
                        amount,
                        reserved: self.reserved,
                    });
                }
                next.reserved = Micros::new(self.reserved.as_i64() - amount.as_i64());
                next.available = next.available.checked_add(amount).ok_or(overflow)?;
            }
            EntryType::Spend => {
                if self.reserved < amount {
                    return Err(BalanceViolation::NegativeReserved {
                        entry_type,
                        amount,
                        reserved: self.reserved,
                    });
                }
                next.reserved = Micros::new(self.reserved.as_i64() - amount.as_i64());
                next.total_spent = next.total_spent.checked_add(amount).ok_or(overflow)?;
            }
        }

        *self = next;
        Ok(())
    }

    /// Fold a user's ledger history, oldest first, starting from zero.
    pub fn fold<'a, I>(uid: Uid, entries: I) -> Result<Balance, BalanceViolation>
    where
        I: IntoIterator<Item = &'a LedgerEntry>,
    {
        let mut balance = Balance::zero(uid, TimeMs::new(0));
        for entry in entries {
            balance.apply(entry.entry_type, entry.amount)?;
            balance.updated_at = entry.created_at;
        }
        Ok(balance)
    }

    /// Compare the four pools, ignoring `updated_at`.
    pub fn same_pools(&self, other: &Balance) -> bool {
        self.available == other.available
            && self.reserved == other.reserved
            && self.total_deposited == other.total_deposited
            && self.total_spent == other.total_spent
    }
}
