//! Persistence seams for the service layer.
//!
//! Services hold `Arc<dyn ...Store>` instead of a pool so tests can swap in
//! in-memory implementations. The Postgres repositories in this module are
//! the production implementations.

use crate::currency::{Currency, Network};
use crate::database::error::DatabaseError;
use crate::models::{
    BlockchainTransactionRecord, Order, OrderStatus, Payment, PaymentStatus, PriceQuote, Wallet,
};
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Cache of last-known prices, one row per currency.
#[async_trait]
pub trait PriceStore: Send + Sync {
    /// Insert or refresh the cached quote for one currency.
    async fn upsert_quote(
        &self,
        currency: Currency,
        price_usd: &BigDecimal,
    ) -> Result<(), DatabaseError>;

    /// Every cached quote, regardless of age.
    async fn load_quotes(&self) -> Result<Vec<PriceQuote>, DatabaseError>;
}

/// Wallet lookup and the derivation index counter.
#[async_trait]
pub trait WalletStore: Send + Sync {
    /// Find the vendor's wallet for a currency. With `network` set, only an
    /// exact match qualifies; with `None`, any network for the currency does.
    async fn find_wallet(
        &self,
        vendor_id: Uuid,
        currency: Currency,
        network: Option<Network>,
    ) -> Result<Option<Wallet>, DatabaseError>;

    /// Atomically advance the wallet's derivation counter and return the new
    /// value. Two concurrent callers always observe distinct values.
    async fn next_index(&self, wallet_id: Uuid) -> Result<i64, DatabaseError>;
}

/// Fields for a new payment row; id, status and created_at are assigned by
/// the store.
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub order_id: Uuid,
    pub currency: Currency,
    pub network: Network,
    pub amount: BigDecimal,
    pub payment_address: String,
    pub expires_at: DateTime<Utc>,
}

/// Fields upserted onto the transaction audit row, keyed by tx_hash.
#[derive(Debug, Clone)]
pub struct NewTransactionRecord {
    pub tx_hash: String,
    pub payment_id: Uuid,
    pub chain: String,
    pub amount: BigDecimal,
    pub confirmations: i64,
    pub status: PaymentStatus,
}

/// Orders, payments and the transaction audit trail.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn load_order(&self, order_id: Uuid) -> Result<Option<Order>, DatabaseError>;

    async fn load_payment(&self, payment_id: Uuid) -> Result<Option<Payment>, DatabaseError>;

    /// Insert a PENDING payment and return the stored row.
    async fn insert_payment(&self, payment: NewPayment) -> Result<Payment, DatabaseError>;

    async fn set_payment_status(
        &self,
        payment_id: Uuid,
        status: PaymentStatus,
    ) -> Result<(), DatabaseError>;

    async fn set_order_status(
        &self,
        order_id: Uuid,
        status: OrderStatus,
    ) -> Result<(), DatabaseError>;

    /// Mirror the quoted currency, network and crypto amount onto the order
    /// so storefront queries need no join.
    async fn mirror_quote_on_order(
        &self,
        order_id: Uuid,
        currency: Currency,
        network: Network,
        amount: &BigDecimal,
    ) -> Result<(), DatabaseError>;

    /// Insert or refresh the audit row for a submitted transaction hash.
    /// Re-verifying the same hash updates confirmations in place.
    async fn upsert_transaction(
        &self,
        record: NewTransactionRecord,
    ) -> Result<BlockchainTransactionRecord, DatabaseError>;
}
