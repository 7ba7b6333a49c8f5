//! Ledger entry operations for the repository.

use crate::domain::{Cursor, EntryId, EntryType, LedgerEntry, Micros, NewEntry, TimeMs, Uid};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;
use std::str::FromStr;

use super::Repository;

const ENTRY_COLUMNS: &str =
    "id, uid, entry_type, amount, reference_id, description, created_at";

impl Repository {
    /// Append a ledger entry.
    ///
    /// Returns `None` when a non-null `(reference_id, entry_type)` already
    /// exists; the uniqueness check is the insert itself, so it commits or
    /// rolls back together with the surrounding transaction.
    pub async fn append_entry(
        conn: &mut SqliteConnection,
        entry: &NewEntry,
    ) -> Result<Option<EntryId>, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO ledger_entries (uid, entry_type, amount, reference_id, description, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(reference_id, entry_type) DO NOTHING
            "#,
        )
        .bind(entry.uid.as_i64())
        .bind(entry.entry_type.as_str())
        .bind(entry.amount.as_i64())
        .bind(entry.reference_id.as_deref())
        .bind(entry.description.as_deref())
        .bind(entry.created_at.as_ms())
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        Ok(Some(EntryId(result.last_insert_rowid())))
    }

    /// Whether an entry with this `(reference_id, entry_type)` exists.
    pub async fn exists_reference(
        &self,
        reference_id: &str,
        entry_type: EntryType,
    ) -> Result<bool, sqlx::Error> {
        let row: (i64,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM ledger_entries WHERE reference_id = ? AND entry_type = ?)",
        )
        .bind(reference_id)
        .bind(entry_type.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(row.0 != 0)
    }

    /// Entries for `uid`, newest first, strictly after `before` in that
    /// order. An unknown `uid` yields an empty page.
    pub async fn query_entries(
        &self,
        uid: Uid,
        limit: u32,
        before: Option<Cursor>,
    ) -> Result<Vec<LedgerEntry>, sqlx::Error> {
        let cursor_clause = if before.is_some() {
            "AND (created_at < ? OR (created_at = ? AND id < ?))"
        } else {
            ""
        };
        let sql = format!(
            r#"
            SELECT {}
            FROM ledger_entries
            WHERE uid = ? {}
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            "#,
            ENTRY_COLUMNS, cursor_clause
        );

        let mut query = sqlx::query(&sql).bind(uid.as_i64());
        if let Some(cursor) = before {
            query = query
                .bind(cursor.created_at.as_ms())
                .bind(cursor.created_at.as_ms())
                .bind(cursor.id.as_i64());
        }
        let rows = query.bind(i64::from(limit)).fetch_all(&self.pool).await?;

        rows.iter().map(entry_from_row).collect()
    }

    /// Full history for `uid` in commit order.
    pub async fn entries_ascending(
        conn: &mut SqliteConnection,
        uid: Uid,
    ) -> Result<Vec<LedgerEntry>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM ledger_entries WHERE uid = ? ORDER BY id ASC",
            ENTRY_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(uid.as_i64())
            .fetch_all(&mut *conn)
            .await?;

        rows.iter().map(entry_from_row).collect()
    }
}

/// Map a row to a `LedgerEntry`, rejecting unknown entry types.
fn entry_from_row(row: &SqliteRow) -> Result<LedgerEntry, sqlx::Error> {
    let entry_type: String = row.get("entry_type");
    let entry_type =
        EntryType::from_str(&entry_type).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

    Ok(LedgerEntry {
        id: EntryId(row.get("id")),
        uid: Uid::new(row.get("uid")),
        entry_type,
        amount: Micros::new(row.get("amount")),
        reference_id: row.get("reference_id"),
        description: row.get("description"),
        created_at: TimeMs::new(row.get("created_at")),
    })
}
