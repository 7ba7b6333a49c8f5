//! Database module for SQLite operations.
//!
//! This module provides:
//! - Database initialization and migrations
//! - SQLite connection configuration (WAL, busy timeout, foreign keys)
//! - Repository layer: balances, ledger entries, reservations, addresses

pub mod migrations;
pub mod repo;

pub use migrations::init_db;
pub use repo::Repository;
