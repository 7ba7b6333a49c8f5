//! User directory: resolves a depositing wallet address to a uid.
//!
//! The account service owns the `user_addresses` rows. The binary only
//! registers the `ADDRESS_SEEDS` pairs at startup.

use crate::db::Repository;
use crate::domain::{Address, Uid};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error(transparent)]
    Storage(#[from] sqlx::Error),
    #[error("Directory unavailable: {0}")]
    Unavailable(String),
}

/// Address to uid lookup, owned outside the ledger.
///
/// Addresses compare case-insensitively. A malformed address resolves to
/// `None`, not an error.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn resolve_uid_by_address(&self, address: &str) -> Result<Option<Uid>, DirectoryError>;
}

/// Directory backed by the `user_addresses` table.
#[derive(Clone)]
pub struct SqliteUserDirectory {
    repo: Arc<Repository>,
}

impl SqliteUserDirectory {
    pub fn new(repo: Arc<Repository>) -> Self {
        Self { repo }
    }

    pub async fn register_address(&self, address: &Address, uid: Uid) -> Result<(), DirectoryError> {
        self.repo.register_address(address, uid).await?;
        tracing::info!(address = %address, uid = %uid, "address registered");
        Ok(())
    }

    /// Register every `(address, uid)` pair, returning how many were written.
    pub async fn seed(&self, seeds: &[(Address, Uid)]) -> Result<usize, DirectoryError> {
        for (address, uid) in seeds {
            self.register_address(address, *uid).await?;
        }
        Ok(seeds.len())
    }
}

#[async_trait]
impl UserDirectory for SqliteUserDirectory {
    async fn resolve_uid_by_address(&self, address: &str) -> Result<Option<Uid>, DirectoryError> {
        let Ok(address) = Address::from_str(address) else {
            return Ok(None);
        };
        Ok(self.repo.find_uid_by_address(&address).await?)
    }
}

/// In-memory directory for tests and fixtures.
#[derive(Debug, Clone, Default)]
pub struct StaticUserDirectory {
    entries: HashMap<Address, Uid>,
    failing: HashSet<Address>,
}

impl StaticUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `address` to `uid`. Malformed addresses are ignored.
    pub fn with_address(mut self, address: &str, uid: Uid) -> Self {
        if let Ok(address) = Address::from_str(address) {
            self.entries.insert(address, uid);
        }
        self
    }

    /// Make lookups of `address` fail with `Unavailable`.
    pub fn with_failure(mut self, address: &str) -> Self {
        if let Ok(address) = Address::from_str(address) {
            self.failing.insert(address);
        }
        self
    }
}

#[async_trait]
impl UserDirectory for StaticUserDirectory {
    async fn resolve_uid_by_address(&self, address: &str) -> Result<Option<Uid>, DirectoryError> {
        let Ok(address) = Address::from_str(address) else {
            return Ok(None);
        };
        if self.failing.contains(&address) {
            return Err(DirectoryError::Unavailable(format!(
                "lookup failed for {}",
                address
            )));
        }
        Ok(self.entries.get(&address).copied())
    }
}
