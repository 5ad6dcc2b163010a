//! Postgres-backed wallet store.

use crate::currency::{Currency, Network};
use crate::database::error::DatabaseError;
use crate::database::stores::WalletStore;
use crate::models::Wallet;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Clone)]
pub struct WalletRepository {
    pool: PgPool,
}

impl WalletRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WalletStore for WalletRepository {
    async fn find_wallet(
        &self,
        vendor_id: Uuid,
        currency: Currency,
        network: Option<Network>,
    ) -> Result<Option<Wallet>, DatabaseError> {
        let wallet = match network {
            Some(network) => {
                sqlx::query_as::<_, Wallet>(
                    r#"
                    SELECT id, vendor_id, currency, network, address, xpub,
                           last_index, created_at, updated_at
                    FROM wallets
                    WHERE vendor_id = $1 AND currency = $2 AND network = $3
                    "#,
                )
                .bind(vendor_id)
                .bind(currency.as_str())
                .bind(network.as_str())
                .fetch_optional(&self.pool)
                .await
            }
            None => {
                // Any network for the currency; oldest wallet wins so the
                // fallback is deterministic.
                sqlx::query_as::<_, Wallet>(
                    r#"
                    SELECT id, vendor_id, currency, network, address, xpub,
                           last_index, created_at, updated_at
                    FROM wallets
                    WHERE vendor_id = $1 AND currency = $2
                    ORDER BY created_at ASC
                    LIMIT 1
                    "#,
                )
                .bind(vendor_id)
                .bind(currency.as_str())
                .fetch_optional(&self.pool)
                .await
            }
        };

        wallet.map_err(DatabaseError::from_sqlx)
    }

    async fn next_index(&self, wallet_id: Uuid) -> Result<i64, DatabaseError> {
        // Single-statement increment so concurrent callers serialize on the
        // row lock and never see the same index.
        let index: (i64,) = sqlx::query_as(
            r#"
            UPDATE wallets
            SET last_index = last_index + 1, updated_at = NOW()
            WHERE id = $1
            RETURNING last_index
            "#,
        )
        .bind(wallet_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?
        .ok_or_else(|| DatabaseError::not_found("wallet", wallet_id))?;

        Ok(index.0)
    }
}
