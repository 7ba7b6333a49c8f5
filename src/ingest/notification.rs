//! Address-activity notification payload and per-record filtering.

use super::IngestSettings;
use crate::domain::{Address, Micros};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Only notifications of this type carry deposit activity.
pub const ADDRESS_ACTIVITY: &str = "ADDRESS_ACTIVITY";

const TOKEN_CATEGORIES: [&str; 2] = ["token", "erc20"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityNotification {
    pub webhook_id: Option<String>,
    pub id: Option<String>,
    pub created_at: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: String,
    pub event: Option<ActivityEvent>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEvent {
    pub network: Option<String>,
    #[serde(default)]
    pub activity: Vec<Activity>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub from_address: Option<String>,
    pub to_address: Option<String>,
    pub block_num: Option<String>,
    pub hash: Option<String>,
    pub category: Option<String>,
    pub asset: Option<String>,
    pub value: Option<f64>,
    pub raw_contract: Option<RawContract>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawContract {
    pub raw_value: Option<String>,
    pub address: Option<String>,
    pub decimals: Option<u32>,
}

impl ActivityNotification {
    pub fn is_address_activity(&self) -> bool {
        self.kind == ADDRESS_ACTIVITY
    }

    pub fn activities(&self) -> &[Activity] {
        self.event
            .as_ref()
            .map(|e| e.activity.as_slice())
            .unwrap_or(&[])
    }
}

/// A record that passed every filter and is ready to credit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositCandidate {
    pub from: Address,
    pub amount: Micros,
    pub tx_hash: String,
}

/// Why a record was not turned into a candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Skip {
    /// Not a deposit into the vault, or malformed.
    Filtered(&'static str),
    BelowMinimum(Micros),
}

/// Parse a hex integer, optionally `0x`-prefixed, that fits in `i64`.
pub fn parse_raw_value(raw: &str) -> Option<Micros> {
    let trimmed = raw.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    if digits.is_empty() {
        return None;
    }
    let value = u128::from_str_radix(digits, 16).ok()?;
    i64::try_from(value).ok().map(Micros::new)
}

fn same_address(a: Option<&str>, b: &Address) -> bool {
    a.and_then(|a| Address::from_str(a).ok())
        .is_some_and(|a| &a == b)
}

impl Activity {
    /// Apply the deposit filters in order: destination, category, token
    /// contract, amount, minimum.
    pub fn classify(&self, settings: &IngestSettings) -> Result<DepositCandidate, Skip> {
        if !same_address(self.to_address.as_deref(), &settings.vault_address) {
            return Err(Skip::Filtered("destination is not the vault"));
        }

        let category = self.category.as_deref().unwrap_or_default();
        if !TOKEN_CATEGORIES.contains(&category) {
            return Err(Skip::Filtered("not a token transfer"));
        }

        let raw_contract = self.raw_contract.as_ref();
        if let Some(token) = &settings.accepted_token {
            if !same_address(raw_contract.and_then(|c| c.address.as_deref()), token) {
                return Err(Skip::Filtered("token contract not accepted"));
            }
        }

        let amount = raw_contract
            .and_then(|c| c.raw_value.as_deref())
            .and_then(parse_raw_value)
            .ok_or(Skip::Filtered("missing or invalid rawValue"))?;

        if !amount.is_positive() || amount < settings.min_deposit {
            return Err(Skip::BelowMinimum(amount));
        }

        let from = self
            .from_address
            .as_deref()
            .and_then(|a| Address::from_str(a).ok())
            .ok_or(Skip::Filtered("missing or invalid fromAddress"))?;

        let tx_hash = self
            .hash
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .ok_or(Skip::Filtered("missing transaction hash"))?;

        Ok(DepositCandidate {
            from,
            amount,
            tx_hash: tx_hash.to_string(),
        })
    }
}
