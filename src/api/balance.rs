use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::AppState;
use crate::domain::{format_micros, Balance, Cursor, EntryId, LedgerEntry, Micros, TimeMs, Uid};
use crate::error::AppError;
use crate::ledger::Reconciliation;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceQuery {
    pub uid: i64,
    pub limit: Option<u32>,
    pub before_ms: Option<i64>,
    pub before_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UidQuery {
    pub uid: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementRequest {
    pub uid: i64,
    pub amount: i64,
    pub reference_id: String,
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceDto {
    pub uid: Uid,
    pub available: Micros,
    pub reserved: Micros,
    pub total_deposited: Micros,
    pub total_spent: Micros,
    pub available_formatted: String,
    pub reserved_formatted: String,
    pub total_deposited_formatted: String,
    pub total_spent_formatted: String,
    pub updated_at: TimeMs,
}

impl From<Balance> for BalanceDto {
    fn from(b: Balance) -> Self {
        Self {
            uid: b.uid,
            available: b.available,
            reserved: b.reserved,
            total_deposited: b.total_deposited,
            total_spent: b.total_spent,
            available_formatted: format_micros(b.available),
            reserved_formatted: format_micros(b.reserved),
            total_deposited_formatted: format_micros(b.total_deposited),
            total_spent_formatted: format_micros(b.total_spent),
            updated_at: b.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionDto {
    pub id: EntryId,
    #[serde(rename = "type")]
    pub entry_type: String,
    pub amount: Micros,
    pub amount_formatted: String,
    pub reference_id: Option<String>,
    pub description: Option<String>,
    pub created_at: TimeMs,
}

impl From<LedgerEntry> for TransactionDto {
    fn from(e: LedgerEntry) -> Self {
        Self {
            id: e.id,
            entry_type: e.entry_type.to_string(),
            amount: e.amount,
            amount_formatted: format_micros(e.amount),
            reference_id: e.reference_id,
            description: e.description,
            created_at: e.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceResponse {
    pub balance: BalanceDto,
    pub recent_transactions: Vec<TransactionDto>,
    pub next_cursor: Option<Cursor>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementResponse {
    pub success: bool,
    pub new_available: Micros,
    pub new_reserved: Micros,
    pub balance: BalanceDto,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileResponse {
    pub consistent: bool,
    #[serde(flatten)]
    pub report: Reconciliation,
}

fn parse_uid(uid: i64) -> Result<Uid, AppError> {
    if uid <= 0 {
        return Err(AppError::BadRequest("Missing or invalid uid".into()));
    }
    Ok(Uid::new(uid))
}

/// Both cursor halves or neither.
fn parse_cursor(before_ms: Option<i64>, before_id: Option<i64>) -> Result<Option<Cursor>, AppError> {
    match (before_ms, before_id) {
        (None, None) => Ok(None),
        (Some(ms), Some(id)) => Ok(Some(Cursor {
            created_at: TimeMs::new(ms),
            id: EntryId(id),
        })),
        _ => Err(AppError::BadRequest(
            "beforeMs and beforeId must be given together".into(),
        )),
    }
}

pub async fn get_balance(
    State(state): State<AppState>,
    params: Result<Query<BalanceQuery>, QueryRejection>,
) -> Result<Json<BalanceResponse>, AppError> {
    let Query(params) = params?;
    let uid = parse_uid(params.uid)?;
    let before = parse_cursor(params.before_ms, params.before_id)?;
    let limit = params.limit.unwrap_or(state.config.default_tx_limit);

    let balance = state.ledger.get_balance_snapshot(uid).await?;
    let page = state.ledger.get_transactions_page(uid, limit, before).await?;

    Ok(Json(BalanceResponse {
        balance: balance.into(),
        recent_transactions: page.entries.into_iter().map(Into::into).collect(),
        next_cursor: page.next_cursor,
    }))
}

fn movement_response(balance: Balance) -> Json<MovementResponse> {
    Json(MovementResponse {
        success: true,
        new_available: balance.available,
        new_reserved: balance.reserved,
        balance: balance.into(),
    })
}

pub async fn reserve(
    State(state): State<AppState>,
    req: Result<Json<MovementRequest>, JsonRejection>,
) -> Result<Json<MovementResponse>, AppError> {
    let Json(req) = req?;
    let uid = parse_uid(req.uid)?;
    let balance = state
        .ledger
        .reserve(uid, Micros::new(req.amount), &req.reference_id, req.description.as_deref())
        .await?;
    Ok(movement_response(balance))
}

pub async fn release(
    State(state): State<AppState>,
    req: Result<Json<MovementRequest>, JsonRejection>,
) -> Result<Json<MovementResponse>, AppError> {
    let Json(req) = req?;
    let uid = parse_uid(req.uid)?;
    let balance = state
        .ledger
        .release(uid, Micros::new(req.amount), &req.reference_id, req.description.as_deref())
        .await?;
    Ok(movement_response(balance))
}

pub async fn spend(
    State(state): State<AppState>,
    req: Result<Json<MovementRequest>, JsonRejection>,
) -> Result<Json<MovementResponse>, AppError> {
    let Json(req) = req?;
    let uid = parse_uid(req.uid)?;
    let balance = state
        .ledger
        .spend(uid, Micros::new(req.amount), &req.reference_id, req.description.as_deref())
        .await?;
    Ok(movement_response(balance))
}

pub async fn reconcile(
    State(state): State<AppState>,
    params: Result<Query<UidQuery>, QueryRejection>,
) -> Result<Json<ReconcileResponse>, AppError> {
    let Query(params) = params?;
    let uid = parse_uid(params.uid)?;
    let report = state.ledger.reconcile(uid).await?;
    Ok(Json(ReconcileResponse {
        consistent: report.is_consistent(),
        report,
    }))
}
