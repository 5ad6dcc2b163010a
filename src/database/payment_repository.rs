//! Postgres-backed payment, order and audit-trail store.

use crate::currency::{Currency, Network};
use crate::database::error::DatabaseError;
use crate::database::stores::{NewPayment, NewTransactionRecord, PaymentStore};
use crate::models::{BlockchainTransactionRecord, Order, OrderStatus, Payment, PaymentStatus};
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Clone)]
pub struct PaymentRepository {
    pool: PgPool,
}

impl PaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PaymentStore for PaymentRepository {
    async fn load_order(&self, order_id: Uuid) -> Result<Option<Order>, DatabaseError> {
        sqlx::query_as::<_, Order>(
            r#"
            SELECT id, vendor_id, status, total_usd, currency, network,
                   crypto_amount, created_at
            FROM orders
            WHERE id = $1
            "#,
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    async fn load_payment(&self, payment_id: Uuid) -> Result<Option<Payment>, DatabaseError> {
        sqlx::query_as::<_, Payment>(
            r#"
            SELECT id, order_id, currency, network, amount, payment_address,
                   status, expires_at, created_at
            FROM payments
            WHERE id = $1
            "#,
        )
        .bind(payment_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    async fn insert_payment(&self, payment: NewPayment) -> Result<Payment, DatabaseError> {
        sqlx::query_as::<_, Payment>(
            r#"
            INSERT INTO payments
                (order_id, currency, network, amount, payment_address, status, expires_at)
            VALUES ($1, $2, $3, $4, $5, 'PENDING', $6)
            RETURNING id, order_id, currency, network, amount, payment_address,
                      status, expires_at, created_at
            "#,
        )
        .bind(payment.order_id)
        .bind(payment.currency.as_str())
        .bind(payment.network.as_str())
        .bind(&payment.amount)
        .bind(&payment.payment_address)
        .bind(payment.expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    async fn set_payment_status(
        &self,
        payment_id: Uuid,
        status: PaymentStatus,
    ) -> Result<(), DatabaseError> {
        let result = sqlx::query("UPDATE payments SET status = $1 WHERE id = $2")
            .bind(status.as_str())
            .bind(payment_id)
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("payment", payment_id));
        }

        Ok(())
    }

    async fn set_order_status(
        &self,
        order_id: Uuid,
        status: OrderStatus,
    ) -> Result<(), DatabaseError> {
        let result = sqlx::query("UPDATE orders SET status = $1 WHERE id = $2")
            .bind(status.as_str())
            .bind(order_id)
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("order", order_id));
        }

        Ok(())
    }

    async fn mirror_quote_on_order(
        &self,
        order_id: Uuid,
        currency: Currency,
        network: Network,
        amount: &BigDecimal,
    ) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET currency = $1, network = $2, crypto_amount = $3
            WHERE id = $4
            "#,
        )
        .bind(currency.as_str())
        .bind(network.as_str())
        .bind(amount)
        .bind(order_id)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("order", order_id));
        }

        Ok(())
    }

    async fn upsert_transaction(
        &self,
        record: NewTransactionRecord,
    ) -> Result<BlockchainTransactionRecord, DatabaseError> {
        sqlx::query_as::<_, BlockchainTransactionRecord>(
            r#"
            INSERT INTO blockchain_transactions
                (tx_hash, payment_id, network, amount, confirmations, status, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW())
            ON CONFLICT (tx_hash)
            DO UPDATE SET
                confirmations = EXCLUDED.confirmations,
                status = EXCLUDED.status,
                amount = EXCLUDED.amount,
                updated_at = NOW()
            RETURNING tx_hash, payment_id, network, amount, confirmations,
                      status, updated_at
            "#,
        )
        .bind(&record.tx_hash)
        .bind(record.payment_id)
        .bind(&record.chain)
        .bind(&record.amount)
        .bind(record.confirmations)
        .bind(record.status.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}
