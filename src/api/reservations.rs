use axum::extract::{Path, State};
use axum::Json;

use crate::api::AppState;
use crate::domain::Reservation;
use crate::error::AppError;

pub async fn get_reservation(
    Path(reference_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Reservation>, AppError> {
    state
        .ledger
        .get_reservation(&reference_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("reservation {}", reference_id)))
}
