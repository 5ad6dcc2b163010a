//! Persisted entities for the payment engine.
//!
//! Currency, network and status columns are stored as text and parsed into
//! their typed counterparts at the service boundary.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

/// A vendor's receiving wallet for one currency on one network.
///
/// `last_index` is the sole source of derivation uniqueness: it only ever
/// moves forward, through the store's atomic increment.
#[derive(Debug, Clone, FromRow)]
pub struct Wallet {
    pub id: Uuid,
    pub vendor_id: Uuid,
    pub currency: String,
    pub network: String,
    /// Static receive address; fallback when no xpub is configured or the
    /// chain has no safe watch-only derivation scheme.
    pub address: Option<String>,
    /// Extended public key for watch-only child derivation.
    pub xpub: Option<String>,
    pub last_index: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Latest known fiat price for one currency. No history is kept.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PriceQuote {
    pub currency: String,
    pub price_usd: BigDecimal,
    pub observed_at: DateTime<Utc>,
}

/// A payment attempt for an order. Amount and address are immutable after
/// creation; a retry with a different currency needs a fresh record.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Payment {
    pub id: Uuid,
    pub order_id: Uuid,
    pub currency: String,
    pub network: String,
    pub amount: BigDecimal,
    pub payment_address: String,
    pub status: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// The storefront order, seen by the engine only as the payment target.
/// Fulfillment states (SHIPPED and later) belong to an external collaborator.
#[derive(Debug, Clone, FromRow)]
pub struct Order {
    pub id: Uuid,
    pub vendor_id: Uuid,
    pub status: String,
    pub total_usd: BigDecimal,
    pub currency: Option<String>,
    pub network: Option<String>,
    pub crypto_amount: Option<BigDecimal>,
    pub created_at: DateTime<Utc>,
}

/// Audit record for every submitted transaction hash, upserted idempotently
/// on each verification attempt.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct BlockchainTransactionRecord {
    pub tx_hash: String,
    pub payment_id: Uuid,
    pub network: String,
    pub amount: BigDecimal,
    pub confirmations: i64,
    pub status: String,
    pub updated_at: DateTime<Utc>,
}

/// Payment lifecycle. EXPIRED is set by an external expiry sweeper, never by
/// the verification path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Confirming,
    Confirmed,
    Expired,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Confirming => "CONFIRMING",
            PaymentStatus::Confirmed => "CONFIRMED",
            PaymentStatus::Expired => "EXPIRED",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(PaymentStatus::Pending),
            "CONFIRMING" => Ok(PaymentStatus::Confirming),
            "CONFIRMED" => Ok(PaymentStatus::Confirmed),
            "EXPIRED" => Ok(PaymentStatus::Expired),
            other => Err(format!("unknown payment status: {}", other)),
        }
    }
}

/// Order states the payment engine writes. The fulfillment collaborator owns
/// everything after PAID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    PaymentConfirming,
    Paid,
    Shipped,
    Delivered,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::PaymentConfirming => "PAYMENT_CONFIRMING",
            OrderStatus::Paid => "PAID",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Refunded => "REFUNDED",
        }
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(OrderStatus::Pending),
            "PAYMENT_CONFIRMING" => Ok(OrderStatus::PaymentConfirming),
            "PAID" => Ok(OrderStatus::Paid),
            "SHIPPED" => Ok(OrderStatus::Shipped),
            "DELIVERED" => Ok(OrderStatus::Delivered),
            "CANCELLED" => Ok(OrderStatus::Cancelled),
            "REFUNDED" => Ok(OrderStatus::Refunded),
            other => Err(format!("unknown order status: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_status_roundtrip() {
        for status in [
            PaymentStatus::Pending,
            PaymentStatus::Confirming,
            PaymentStatus::Confirmed,
            PaymentStatus::Expired,
        ] {
            assert_eq!(PaymentStatus::from_str(status.as_str()).unwrap(), status);
        }
        assert!(PaymentStatus::from_str("PAID").is_err());
    }

    #[test]
    fn order_status_roundtrip() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::PaymentConfirming,
            OrderStatus::Paid,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
            OrderStatus::Refunded,
        ] {
            assert_eq!(OrderStatus::from_str(status.as_str()).unwrap(), status);
        }
    }
}
