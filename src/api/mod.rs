pub mod balance;
pub mod health;
pub mod reservations;
pub mod webhooks;

use crate::config::Config;
use crate::ingest::DepositIngestor;
use crate::ledger::Ledger;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub ledger: Ledger,
    pub ingestor: Arc<DepositIngestor>,
    pub config: Config,
}

impl AppState {
    pub fn new(ledger: Ledger, ingestor: Arc<DepositIngestor>, config: Config) -> Self {
        Self {
            ledger,
            ingestor,
            config,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/v1/balance", get(balance::get_balance))
        .route("/v1/balance/reserve", post(balance::reserve))
        .route("/v1/balance/release", post(balance::release))
        .route("/v1/balance/spend", post(balance::spend))
        .route("/v1/balance/reconcile", get(balance::reconcile))
        .route(
            "/v1/reservations/:reference_id",
            get(reservations::get_reservation),
        )
        .route(
            "/v1/webhooks/deposits",
            post(webhooks::post_deposits).get(webhooks::get_deposits_status),
        )
        .layer(cors)
        .with_state(state)
}
