//! Ledger entries: the immutable record of every balance movement.

use crate::domain::{EntryId, Micros, TimeMs, Uid};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Kind of movement recorded by a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    /// External funds credited to available.
    Deposit,
    /// Available moved to reserved for a commitment.
    Reserve,
    /// Reserved paid out to a counterparty.
    Spend,
    /// Reserved returned to available.
    Release,
    /// External funds returned to the user, credited like a deposit.
    Refund,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown ledger entry type: {0}")]
pub struct UnknownEntryType(pub String);

impl EntryType {
    pub const ALL: [EntryType; 5] = [
        EntryType::Deposit,
        EntryType::Reserve,
        EntryType::Spend,
        EntryType::Release,
        EntryType::Refund,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Deposit => "deposit",
            EntryType::Reserve => "reserve",
            EntryType::Spend => "spend",
            EntryType::Release => "release",
            EntryType::Refund => "refund",
        }
    }
}

impl FromStr for EntryType {
    type Err = UnknownEntryType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntryType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownEntryType(s.to_string()))
    }
}

impl std::fmt::Display for EntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub id: EntryId,
    pub uid: Uid,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    pub amount: Micros,
    pub reference_id: Option<String>,
    pub description: Option<String>,
    pub created_at: TimeMs,
}

/// An entry about to be appended; the store assigns `id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEntry {
    pub uid: Uid,
    pub entry_type: EntryType,
    pub amount: Micros,
    pub reference_id: Option<String>,
    pub description: Option<String>,
    pub created_at: TimeMs,
}

/// Position in the newest-first entry order: `(created_at, id)` of the last
/// entry already returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cursor {
    pub created_at: TimeMs,
    pub id: EntryId,
}

impl LedgerEntry {
    pub fn cursor(&self) -> Cursor {
        Cursor {
            created_at: self.created_at,
            id: self.id,
        }
    }
}
