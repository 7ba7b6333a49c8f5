use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::api::AppState;
use crate::domain::{Address, Micros};
use crate::error::AppError;
use crate::ingest::{ActivityNotification, IngestionReport};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookResponse {
    pub success: bool,
    pub processed: usize,
    pub report: IngestionReport,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookStatus {
    pub status: &'static str,
    pub vault: Address,
    pub min_deposit: Micros,
}

/// Deposit notifications arrive already authenticated upstream.
pub async fn post_deposits(
    State(state): State<AppState>,
    notification: Result<Json<ActivityNotification>, JsonRejection>,
) -> Result<Json<WebhookResponse>, AppError> {
    let Json(notification) = notification?;
    let report = state.ingestor.ingest(&notification).await;
    Ok(Json(WebhookResponse {
        success: true,
        processed: report.processed(),
        report,
    }))
}

pub async fn get_deposits_status(State(state): State<AppState>) -> Json<WebhookStatus> {
    let settings = state.ingestor.settings();
    Json(WebhookStatus {
        status: "ok",
        vault: settings.vault_address.clone(),
        min_deposit: settings.min_deposit,
    })
}
