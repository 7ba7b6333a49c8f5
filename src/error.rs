use crate::ledger::LedgerError;
use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Internal server error: {0}")]
    Internal(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": msg }))
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            AppError::Ledger(err) => ledger_error_body(err),
        };

        (status, Json(body)).into_response()
    }
}

fn ledger_error_body(err: LedgerError) -> (StatusCode, serde_json::Value) {
    match err {
        LedgerError::Validation(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
        LedgerError::InsufficientFunds {
            available,
            required,
        } => (
            StatusCode::BAD_REQUEST,
            json!({
                "error": "Insufficient funds",
                "available": available,
                "required": required,
            }),
        ),
        LedgerError::InsufficientReserved { reserved, required } => (
            StatusCode::BAD_REQUEST,
            json!({
                "error": "Insufficient reserved funds",
                "reserved": reserved,
                "required": required,
            }),
        ),
        LedgerError::DuplicateReference {
            ref reference_id,
            entry_type,
        } => (
            StatusCode::CONFLICT,
            json!({
                "error": err.to_string(),
                "referenceId": reference_id,
                "type": entry_type,
            }),
        ),
        LedgerError::UnknownReservation(_) => {
            (StatusCode::NOT_FOUND, json!({ "error": err.to_string() }))
        }
        LedgerError::Storage(_) if err.is_retryable() => {
            tracing::warn!(error = %err, "storage busy");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                json!({ "error": err.to_string(), "retryable": true }),
            )
        }
        LedgerError::Storage(_) => {
            tracing::error!(error = %err, "storage error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": err.to_string() }),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EntryType, Micros};

    async fn render(err: AppError) -> (StatusCode, serde_json::Value) {
        let resp = err.into_response();
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_insufficient_funds_carries_amounts() {
        let (status, body) = render(AppError::Ledger(LedgerError::InsufficientFunds {
            available: Micros::new(5),
            required: Micros::new(10),
        }))
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Insufficient funds");
        assert_eq!(body["available"], 5);
        assert_eq!(body["required"], 10);
    }

    #[tokio::test]
    async fn test_ledger_error_statuses() {
        let (status, _) = render(AppError::Ledger(LedgerError::DuplicateReference {
            reference_id: "b1".to_string(),
            entry_type: EntryType::Spend,
        }))
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) =
            render(AppError::Ledger(LedgerError::UnknownReservation("b1".to_string()))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) =
            render(AppError::Ledger(LedgerError::Validation("bad".to_string()))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = render(AppError::Ledger(LedgerError::Storage(sqlx::Error::RowNotFound))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
