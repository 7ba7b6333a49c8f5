use crate::domain::{Address, Micros, Uid};
use std::collections::HashMap;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    pub vault_address: Address,
    pub accepted_token_address: Option<Address>,
    pub min_deposit_micros: Micros,
    pub default_tx_limit: u32,
    /// `address=uid` pairs registered in the user directory at startup.
    pub address_seeds: Vec<(Address, Uid)>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = env_map
            .get("PORT")
            .map(|s| s.as_str())
            .unwrap_or("8080")
            .parse::<u16>()
            .map_err(|_| {
                ConfigError::InvalidValue("PORT".to_string(), "must be a valid u16".to_string())
            })?;

        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let vault_address = env_map
            .get("VAULT_ADDRESS")
            .ok_or_else(|| ConfigError::MissingEnv("VAULT_ADDRESS".to_string()))
            .and_then(|s| parse_address("VAULT_ADDRESS", s))?;

        let accepted_token_address = env_map
            .get("ACCEPTED_TOKEN_ADDRESS")
            .filter(|s| !s.trim().is_empty())
            .map(|s| parse_address("ACCEPTED_TOKEN_ADDRESS", s))
            .transpose()?;

        let min_deposit_micros = env_map
            .get("MIN_DEPOSIT_MICROS")
            .map(|s| s.as_str())
            .unwrap_or("1000000")
            .parse::<i64>()
            .ok()
            .filter(|v| *v >= 0)
            .map(Micros::new)
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "MIN_DEPOSIT_MICROS".to_string(),
                    "must be a non-negative i64".to_string(),
                )
            })?;

        let default_tx_limit = env_map
            .get("DEFAULT_TX_LIMIT")
            .map(|s| s.as_str())
            .unwrap_or("20")
            .parse::<u32>()
            .ok()
            .filter(|v| (1..=crate::ledger::MAX_PAGE_SIZE).contains(v))
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "DEFAULT_TX_LIMIT".to_string(),
                    format!("must be between 1 and {}", crate::ledger::MAX_PAGE_SIZE),
                )
            })?;

        let address_seeds = env_map
            .get("ADDRESS_SEEDS")
            .map(|s| parse_address_seeds(s))
            .transpose()?
            .unwrap_or_default();

        Ok(Config {
            port,
            database_path,
            vault_address,
            accepted_token_address,
            min_deposit_micros,
            default_tx_limit,
            address_seeds,
        })
    }
}

fn parse_address(key: &str, value: &str) -> Result<Address, ConfigError> {
    Address::from_str(value).map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string()))
}

/// Parse `0xaddr=uid,0xaddr=uid`. Blank items are skipped.
fn parse_address_seeds(value: &str) -> Result<Vec<(Address, Uid)>, ConfigError> {
    let invalid = |msg: String| ConfigError::InvalidValue("ADDRESS_SEEDS".to_string(), msg);
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            let (address, uid) = item
                .split_once('=')
                .ok_or_else(|| invalid(format!("expected address=uid, got {}", item)))?;
            let address = Address::from_str(address.trim()).map_err(|e| invalid(e.to_string()))?;
            let uid = uid
                .trim()
                .parse::<i64>()
                .map_err(|_| invalid(format!("invalid uid in {}", item)))?;
            Ok((address, Uid::new(uid)))
        })
        .collect()
}
