//! Repository layer for ledger storage.
//!
//! This module provides the `Repository` struct. Methods taking `&self` run
//! directly against the pool and serve reads. Associated functions taking a
//! `&mut SqliteConnection` are the building blocks of a transition and are
//! meant to run inside one transaction opened with [`Repository::begin`].
//! Methods are organized across submodules by table:
//! - `entries.rs` - ledger entry append and queries
//! - `reservations.rs` - per-commitment reservation rows
//! - `users.rs` - address to uid lookup

mod entries;
mod reservations;
mod users;

use crate::domain::{Balance, EntryType, Micros, TimeMs, Uid};
use sqlx::sqlite::{SqliteConnection, SqlitePool, SqliteRow};
use sqlx::{Row, Sqlite, Transaction};

/// Repository for database operations.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Open a transaction. Dropping it without `commit` rolls back.
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>, sqlx::Error> {
        self.pool.begin().await
    }

    // =========================================================================
    // Balance operations
    // =========================================================================

    /// Get the balance for `uid`, creating a zero row on first reference.
    ///
    /// Concurrent first reads race on `INSERT ... ON CONFLICT DO NOTHING`,
    /// so exactly one row is created and every caller reads it back.
    pub async fn get_or_create_balance(&self, uid: Uid) -> Result<Balance, sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        Self::ensure_balance(&mut conn, uid, TimeMs::now()).await?;
        Self::fetch_balance(&mut conn, uid).await
    }

    /// Create a zero balance row for `uid` if none exists.
    ///
    /// As the first statement of a transaction this also takes the write
    /// lock, so the rest of the transition never upgrades a stale snapshot.
    pub async fn ensure_balance(
        conn: &mut SqliteConnection,
        uid: Uid,
        now: TimeMs,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO balances (uid, available, reserved, total_deposited, total_spent, updated_at)
            VALUES (?, 0, 0, 0, 0, ?)
            ON CONFLICT(uid) DO NOTHING
            "#,
        )
        .bind(uid.as_i64())
        .bind(now.as_ms())
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Read the balance row for `uid`. Fails with `RowNotFound` if absent.
    pub async fn fetch_balance(
        conn: &mut SqliteConnection,
        uid: Uid,
    ) -> Result<Balance, sqlx::Error> {
        Self::find_balance(conn, uid)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    pub async fn find_balance(
        conn: &mut SqliteConnection,
        uid: Uid,
    ) -> Result<Option<Balance>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT uid, available, reserved, total_deposited, total_spent, updated_at
            FROM balances
            WHERE uid = ?
            "#,
        )
        .bind(uid.as_i64())
        .fetch_optional(&mut *conn)
        .await?;

        Ok(row.as_ref().map(balance_from_row))
    }

    /// Apply one movement to the balance row as a compare-and-set.
    ///
    /// The `WHERE` clause carries the precondition, so the update either
    /// applies in full or touches no row. Returns false when the
    /// precondition failed (insufficient pool or counter overflow).
    pub async fn apply_movement(
        conn: &mut SqliteConnection,
        uid: Uid,
        entry_type: EntryType,
        amount: Micros,
        now: TimeMs,
    ) -> Result<bool, sqlx::Error> {
        let amount = amount.as_i64();
        let headroom = i64::MAX - amount;

        // ?1 amount, ?2 now, ?3 uid, ?4 precondition bound
        let (sql, guard) = match entry_type {
            EntryType::Deposit | EntryType::Refund => (
                r#"
                UPDATE balances
                SET available = available + ?1,
                    total_deposited = total_deposited + ?1,
                    updated_at = ?2
                WHERE uid = ?3 AND total_deposited <= ?4
                "#,
                headroom,
            ),
            EntryType::Reserve => (
                r#"
                UPDATE balances
                SET available = available - ?1,
                    reserved = reserved + ?1,
                    updated_at = ?2
                WHERE uid = ?3 AND available >= ?4
                "#,
                amount,
            ),
            EntryType::Release => (
                r#"
                UPDATE balances
                SET reserved = reserved - ?1,
                    available = available + ?1,
                    updated_at = ?2
                WHERE uid = ?3 AND reserved >= ?4
                "#,
                amount,
            ),
            EntryType::Spend => (
                r#"
                UPDATE balances
                SET reserved = reserved - ?1,
                    total_spent = total_spent + ?1,
                    updated_at = ?2
                WHERE uid = ?3 AND reserved >= ?1 AND total_spent <= ?4
                "#,
                headroom,
            ),
        };

        let result = sqlx::query(sql)
            .bind(amount)
            .bind(now.as_ms())
            .bind(uid.as_i64())
            .bind(guard)
            .execute(&mut *conn)
            .await?;

        Ok(result.rows_affected() == 1)
    }
}

fn balance_from_row(row: &SqliteRow) -> Balance {
    Balance {
        uid: Uid::new(row.get("uid")),
        available: Micros::new(row.get("available")),
        reserved: Micros::new(row.get("reserved")),
        total_deposited: Micros::new(row.get("total_deposited")),
        total_spent: Micros::new(row.get("total_spent")),
        updated_at: TimeMs::new(row.get("updated_at")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::init_db;
    use tempfile::TempDir;

    async fn setup_repo() -> (Repository, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir
            .path()
            .join("test.db")
            .to_string_lossy()
            .to_string();
        let pool = init_db(&db_path).await.expect("init_db failed");
        (Repository::new(pool), temp_dir)
    }

    #[tokio::test]
    async fn test_get_or_create_balance_starts_at_zero() {
        let (repo, _temp) = setup_repo().await;
        let balance = repo.get_or_create_balance(Uid::new(42)).await.unwrap();
        assert_eq!(balance.uid, Uid::new(42));
        assert_eq!(balance.available, Micros::zero());
        assert_eq!(balance.reserved, Micros::zero());

        let again = repo.get_or_create_balance(Uid::new(42)).await.unwrap();
        assert_eq!(balance, again);

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM balances")
            .fetch_one(repo.pool())
            .await
            .unwrap();
        assert_eq!(count.0, 1);
    }

    #[tokio::test]
    async fn test_apply_movement_compare_and_set() {
        let (repo, _temp) = setup_repo().await;
        let uid = Uid::new(1);
        let now = TimeMs::new(1000);

        let mut tx = repo.begin().await.unwrap();
        Repository::ensure_balance(&mut tx, uid, now).await.unwrap();
        assert!(
            Repository::apply_movement(&mut tx, uid, EntryType::Deposit, Micros::new(500), now)
                .await
                .unwrap()
        );
        assert!(
            !Repository::apply_movement(&mut tx, uid, EntryType::Reserve, Micros::new(501), now)
                .await
                .unwrap(),
            "reserve above available must not apply"
        );
        assert!(
            Repository::apply_movement(&mut tx, uid, EntryType::Reserve, Micros::new(200), now)
                .await
                .unwrap()
        );
        assert!(
            !Repository::apply_movement(&mut tx, uid, EntryType::Spend, Micros::new(201), now)
                .await
                .unwrap()
        );
        assert!(
            Repository::apply_movement(&mut tx, uid, EntryType::Spend, Micros::new(150), now)
                .await
                .unwrap()
        );
        let balance = Repository::fetch_balance(&mut tx, uid).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(balance.available, Micros::new(300));
        assert_eq!(balance.reserved, Micros::new(50));
        assert_eq!(balance.total_deposited, Micros::new(500));
        assert_eq!(balance.total_spent, Micros::new(150));
        assert!(balance.is_conserved());
    }

    #[tokio::test]
    async fn test_deposit_overflow_does_not_apply() {
        let (repo, _temp) = setup_repo().await;
        let uid = Uid::new(1);
        let now = TimeMs::new(1000);

        let mut tx = repo.begin().await.unwrap();
        Repository::ensure_balance(&mut tx, uid, now).await.unwrap();
        assert!(
            Repository::apply_movement(&mut tx, uid, EntryType::Deposit, Micros::new(i64::MAX), now)
                .await
                .unwrap()
        );
        assert!(
            !Repository::apply_movement(&mut tx, uid, EntryType::Deposit, Micros::new(1), now)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_rolled_back_transaction_leaves_no_row() {
        let (repo, _temp) = setup_repo().await;
        let uid = Uid::new(5);
        {
            let mut tx = repo.begin().await.unwrap();
            Repository::ensure_balance(&mut tx, uid, TimeMs::new(1)).await.unwrap();
            Repository::apply_movement(&mut tx, uid, EntryType::Deposit, Micros::new(10), TimeMs::new(1))
                .await
                .unwrap();
            // dropped without commit
        }
        let balance = repo.get_or_create_balance(uid).await.unwrap();
        assert_eq!(balance.available, Micros::zero());
    }
}
