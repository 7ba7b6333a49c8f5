//! Reservations: funds earmarked for one outstanding commitment.

use crate::domain::{Micros, TimeMs, Uid};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationState {
    /// Some of the reserved amount is still outstanding.
    Active,
    /// Fully resolved, with at least part paid out.
    Spent,
    /// Fully resolved, nothing paid out.
    Released,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown reservation state: {0}")]
pub struct UnknownReservationState(pub String);

impl ReservationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationState::Active => "active",
            ReservationState::Spent => "spent",
            ReservationState::Released => "released",
        }
    }
}

impl FromStr for ReservationState {
    type Err = UnknownReservationState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(ReservationState::Active),
            "spent" => Ok(ReservationState::Spent),
            "released" => Ok(ReservationState::Released),
            other => Err(UnknownReservationState(other.to_string())),
        }
    }
}

impl std::fmt::Display for ReservationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Funds reserved by `uid` under the commitment id `reference_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    pub reference_id: String,
    pub uid: Uid,
    pub amount: Micros,
    pub spent: Micros,
    pub released: Micros,
    pub state: ReservationState,
    pub created_at: TimeMs,
    pub updated_at: TimeMs,
}

impl Reservation {
    /// Amount still reserved under this commitment.
    pub fn remaining(&self) -> Micros {
        Micros::new(self.amount.as_i64() - self.spent.as_i64() - self.released.as_i64())
    }

    pub fn is_active(&self) -> bool {
        self.state == ReservationState::Active
    }

    /// State after `spent`/`released` reach the given totals.
    pub fn state_for(amount: Micros, spent: Micros, released: Micros) -> ReservationState {
        if spent.as_i64() + released.as_i64() < amount.as_i64() {
            ReservationState::Active
        } else if spent.is_positive() {
            ReservationState::Spent
        } else {
            ReservationState::Released
        }
    }
}
