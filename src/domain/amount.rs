//! Integer micro-unit amounts.
//!
//! All stored amounts are whole micro-units of the settlement currency
//! (1 display unit = 1,000,000 micro-units). Display formatting is lossy and
//! never feeds back into storage.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Micro-units per whole display unit.
pub const MICROS_PER_UNIT: i64 = 1_000_000;

/// A non-negative amount in micro-units.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Micros(pub i64);

impl Micros {
    pub fn new(value: i64) -> Self {
        Micros(value)
    }

    pub fn zero() -> Self {
        Micros(0)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }

    /// Returns true if the value is > 0.
    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub fn checked_add(self, other: Micros) -> Option<Micros> {
        self.0.checked_add(other.0).map(Micros)
    }
}

impl fmt::Display for Micros {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Format micro-units as `whole.ff`, truncating digits past the second.
pub fn format_micros(amount: Micros) -> String {
    let value = amount.0;
    let sign = if value < 0 { "-" } else { "" };
    let abs = value.unsigned_abs();
    let per_unit = MICROS_PER_UNIT as u64;
    let whole = abs / per_unit;
    let cents = (abs % per_unit) / 10_000;
    format!("{}{}.{:02}", sign, whole, cents)
}
