//! Domain primitives: Uid, TimeMs, Address, EntryId.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Stable external user identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Uid(pub i64);

impl Uid {
    /// Create a Uid from its integer value.
    pub fn new(uid: i64) -> Self {
        Uid(uid)
    }

    /// Get the underlying integer value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Uid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Time in milliseconds since Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimeMs(pub i64);

impl TimeMs {
    /// Create a TimeMs from milliseconds.
    pub fn new(ms: i64) -> Self {
        TimeMs(ms)
    }

    /// Current wall-clock time.
    pub fn now() -> Self {
        TimeMs(chrono::Utc::now().timestamp_millis())
    }

    /// Get the underlying milliseconds value.
    pub fn as_ms(&self) -> i64 {
        self.0
    }
}

/// Storage-assigned ledger entry identifier, strictly increasing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(pub i64);

impl EntryId {
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

/// Wallet address (hex string), always stored lower-cased.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address(String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressParseError {
    #[error("address is empty")]
    Empty,
    #[error("address must start with 0x: {0}")]
    MissingPrefix(String),
    #[error("address contains non-hex characters: {0}")]
    NotHex(String),
}

impl Address {
    /// Get the address as a string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form used in ledger descriptions, e.g. `0x12345678...`.
    pub fn short(&self) -> String {
        let prefix: String = self.0.chars().take(10).collect();
        format!("{}...", prefix)
    }
}

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(AddressParseError::Empty);
        }
        let lower = trimmed.to_lowercase();
        let Some(hex) = lower.strip_prefix("0x") else {
            return Err(AddressParseError::MissingPrefix(trimmed.to_string()));
        };
        if hex.is_empty() || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(AddressParseError::NotHex(trimmed.to_string()));
        }
        Ok(Address(lower))
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_is_lowercased() {
        let addr = Address::from_str("  0xAbCdEF12  ").unwrap();
        assert_eq!(addr.as_str(), "0xabcdef12");
    }

    #[test]
    fn test_address_rejects_malformed() {
        assert_eq!(Address::from_str(""), Err(AddressParseError::Empty));
        assert!(matches!(
            Address::from_str("abcdef"),
            Err(AddressParseError::MissingPrefix(_))
        ));
        assert!(matches!(
            Address::from_str("0xzz"),
            Err(AddressParseError::NotHex(_))
        ));
        assert!(matches!(
            Address::from_str("0x"),
            Err(AddressParseError::NotHex(_))
        ));
    }

    #[test]
    fn test_address_short() {
        let addr = Address::from_str("0x1111222233334444").unwrap();
        assert_eq!(addr.short(), "0x11112222...");
    }

    #[test]
    fn test_uid_serializes_as_integer() {
        let json = serde_json::to_string(&Uid::new(42)).unwrap();
        assert_eq!(json, "42");
    }

    #[test]
    fn test_timems_ordering() {
        let t1 = TimeMs::new(1000);
        let t2 = TimeMs::new(2000);
        assert!(t1 < t2);
    }
}
