//! HTTP surface over the payment engine.

pub mod payments;
pub mod prices;

use crate::database;
use crate::error::PaymentError;
use crate::services::{PaymentEngine, PriceOracle};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<PaymentEngine>,
    pub oracle: Arc<PriceOracle>,
    pub pool: PgPool,
}

/// Response shim that maps the error taxonomy onto HTTP statuses.
pub struct ApiError(pub PaymentError);

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            error!(error = %self.0, "request failed");
        }

        let body = json!({
            "error": self.0.to_string(),
            "retryable": self.0.is_retryable(),
        });

        (status, Json(body)).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/payments/create", post(payments::create_payment))
        .route("/api/payments/verify", post(payments::verify_payment))
        .route("/api/crypto/prices", get(prices::get_prices))
        .route("/health", get(health))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Response {
    match database::health_check(&state.pool).await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "ok" }))).into_response(),
        Err(err) => {
            error!(error = %err, "health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "degraded" })),
            )
                .into_response()
        }
    }
}
