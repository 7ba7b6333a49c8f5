//! Reservation operations for the repository.

use crate::domain::{Micros, Reservation, ReservationState, TimeMs, Uid};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;
use std::str::FromStr;

use super::Repository;

const RESERVATION_COLUMNS: &str =
    "reference_id, uid, amount, spent, released, state, created_at, updated_at";

impl Repository {
    /// Open a reservation under `reference_id`.
    ///
    /// Returns false if the reference id is already taken.
    pub async fn insert_reservation(
        conn: &mut SqliteConnection,
        uid: Uid,
        reference_id: &str,
        amount: Micros,
        now: TimeMs,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO reservations (reference_id, uid, amount, spent, released, state, created_at, updated_at)
            VALUES (?, ?, ?, 0, 0, ?, ?, ?)
            ON CONFLICT(reference_id) DO NOTHING
            "#,
        )
        .bind(reference_id)
        .bind(uid.as_i64())
        .bind(amount.as_i64())
        .bind(ReservationState::Active.as_str())
        .bind(now.as_ms())
        .bind(now.as_ms())
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn fetch_reservation(
        conn: &mut SqliteConnection,
        reference_id: &str,
    ) -> Result<Option<Reservation>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM reservations WHERE reference_id = ?",
            RESERVATION_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(reference_id)
            .fetch_optional(&mut *conn)
            .await?;

        row.as_ref().map(reservation_from_row).transpose()
    }

    /// Record a spend or release against an active reservation.
    ///
    /// Compare-and-set on the remaining amount; returns false if the
    /// reservation is no longer active or does not cover the amounts.
    pub async fn settle_reservation(
        conn: &mut SqliteConnection,
        reservation: &Reservation,
        spent: Micros,
        released: Micros,
        now: TimeMs,
    ) -> Result<bool, sqlx::Error> {
        let new_spent = reservation.spent.as_i64() + spent.as_i64();
        let new_released = reservation.released.as_i64() + released.as_i64();
        let state = Reservation::state_for(
            reservation.amount,
            Micros::new(new_spent),
            Micros::new(new_released),
        );

        let result = sqlx::query(
            r#"
            UPDATE reservations
            SET spent = ?, released = ?, state = ?, updated_at = ?
            WHERE reference_id = ? AND state = 'active' AND spent = ? AND released = ?
            "#,
        )
        .bind(new_spent)
        .bind(new_released)
        .bind(state.as_str())
        .bind(now.as_ms())
        .bind(reservation.reference_id.as_str())
        .bind(reservation.spent.as_i64())
        .bind(reservation.released.as_i64())
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Sum of outstanding amounts over the active reservations of `uid`.
    pub async fn active_reserved_total(
        conn: &mut SqliteConnection,
        uid: Uid,
    ) -> Result<Micros, sqlx::Error> {
        let row: (i64,) = sqlx::query_as(
            r#"
            SELECT COALESCE(SUM(amount - spent - released), 0)
            FROM reservations
            WHERE uid = ? AND state = 'active'
            "#,
        )
        .bind(uid.as_i64())
        .fetch_one(&mut *conn)
        .await?;

        Ok(Micros::new(row.0))
    }

    pub async fn get_reservation(
        &self,
        reference_id: &str,
    ) -> Result<Option<Reservation>, sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_reservation(&mut conn, reference_id).await
    }

    /// Reservations of `uid`, newest first, optionally filtered by state.
    pub async fn list_reservations(
        &self,
        uid: Uid,
        state: Option<ReservationState>,
    ) -> Result<Vec<Reservation>, sqlx::Error> {
        let state_clause = if state.is_some() { "AND state = ?" } else { "" };
        let sql = format!(
            "SELECT {} FROM reservations WHERE uid = ? {} ORDER BY created_at DESC, reference_id ASC",
            RESERVATION_COLUMNS, state_clause
        );

        let mut query = sqlx::query(&sql).bind(uid.as_i64());
        if let Some(state) = state {
            query = query.bind(state.as_str());
        }
        let rows = query.fetch_all(&self.pool).await?;

        rows.iter().map(reservation_from_row).collect()
    }
}

fn reservation_from_row(row: &SqliteRow) -> Result<Reservation, sqlx::Error> {
    let state: String = row.get("state");
    let state = ReservationState::from_str(&state).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

    Ok(Reservation {
        reference_id: row.get("reference_id"),
        uid: Uid::new(row.get("uid")),
        amount: Micros::new(row.get("amount")),
        spent: Micros::new(row.get("spent")),
        released: Micros::new(row.get("released")),
        state,
        created_at: TimeMs::new(row.get("created_at")),
        updated_at: TimeMs::new(row.get("updated_at")),
    })
}
