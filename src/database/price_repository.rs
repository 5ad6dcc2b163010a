//! Postgres-backed price cache.

use crate::currency::Currency;
use crate::database::error::DatabaseError;
use crate::database::stores::PriceStore;
use crate::models::PriceQuote;
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use sqlx::PgPool;

#[derive(Clone)]
pub struct PriceRepository {
    pool: PgPool,
}

impl PriceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PriceStore for PriceRepository {
    async fn upsert_quote(
        &self,
        currency: Currency,
        price_usd: &BigDecimal,
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO price_quotes (currency, price_usd, observed_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (currency)
            DO UPDATE SET price_usd = EXCLUDED.price_usd, observed_at = NOW()
            "#,
        )
        .bind(currency.as_str())
        .bind(price_usd)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(())
    }

    async fn load_quotes(&self) -> Result<Vec<PriceQuote>, DatabaseError> {
        sqlx::query_as::<_, PriceQuote>(
            r#"
            SELECT currency, price_usd, observed_at
            FROM price_quotes
            ORDER BY currency
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}
