//! Payment creation and verification endpoints.

use crate::api::{ApiError, AppState};
use crate::currency::{Currency, Network};
use crate::error::PaymentError;
use crate::models::Payment;
use crate::services::VerificationOutcome;
use axum::extract::State;
use axum::Json;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CreatePaymentRequest {
    pub order_id: Uuid,
    pub currency: String,
    pub network: String,
    /// Optional fiat override; defaults to the order total.
    pub amount_usd: Option<BigDecimal>,
}

#[derive(Debug, Serialize)]
pub struct PaymentView {
    pub id: Uuid,
    pub order_id: Uuid,
    pub currency: String,
    pub network: String,
    pub amount: String,
    pub payment_address: String,
    pub status: String,
    pub expires_at: DateTime<Utc>,
}

impl From<Payment> for PaymentView {
    fn from(payment: Payment) -> Self {
        PaymentView {
            id: payment.id,
            order_id: payment.order_id,
            currency: payment.currency,
            network: payment.network,
            amount: payment.amount.to_string(),
            payment_address: payment.payment_address,
            status: payment.status,
            expires_at: payment.expires_at,
        }
    }
}

pub async fn create_payment(
    State(state): State<AppState>,
    Json(request): Json<CreatePaymentRequest>,
) -> Result<Json<PaymentView>, ApiError> {
    let currency = Currency::from_str(&request.currency)
        .map_err(|e| PaymentError::validation("currency", e))?;
    let network =
        Network::from_str(&request.network).map_err(|e| PaymentError::validation("network", e))?;

    let payment = state
        .engine
        .create_payment(request.order_id, currency, network, request.amount_usd)
        .await?;

    Ok(Json(payment.into()))
}

#[derive(Debug, Deserialize)]
pub struct VerifyPaymentRequest {
    pub payment_id: Uuid,
    pub tx_hash: String,
}

pub async fn verify_payment(
    State(state): State<AppState>,
    Json(request): Json<VerifyPaymentRequest>,
) -> Result<Json<VerificationOutcome>, ApiError> {
    let outcome = state
        .engine
        .verify_payment(request.payment_id, &request.tx_hash)
        .await?;

    Ok(Json(outcome))
}
