//! Database layer: connection pool bootstrap, schema setup and the Postgres
//! repositories behind the store traits.

pub mod error;
pub mod payment_repository;
pub mod price_repository;
pub mod stores;
pub mod wallet_repository;

pub use error::DatabaseError;
pub use payment_repository::PaymentRepository;
pub use price_repository::PriceRepository;
pub use stores::{NewPayment, NewTransactionRecord, PaymentStore, PriceStore, WalletStore};
pub use wallet_repository::WalletRepository;

use crate::config::DatabaseConfig;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tracing::info;

/// Build the connection pool from configuration.
pub async fn init_pool(config: &DatabaseConfig) -> Result<PgPool, DatabaseError> {
    let mut options = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connection_timeout));

    if let Some(idle) = config.idle_timeout {
        options = options.idle_timeout(Duration::from_secs(idle));
    }

    let pool = options
        .connect(&config.url)
        .await
        .map_err(DatabaseError::from_sqlx)?;

    info!(
        max_connections = config.max_connections,
        "database pool initialized"
    );

    Ok(pool)
}

/// Create the tables the engine needs if they do not exist yet.
pub async fn init_schema(pool: &PgPool) -> Result<(), DatabaseError> {
    let statements = [
        r#"
        CREATE TABLE IF NOT EXISTS wallets (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            vendor_id UUID NOT NULL,
            currency TEXT NOT NULL,
            network TEXT NOT NULL,
            address TEXT,
            xpub TEXT,
            last_index BIGINT NOT NULL DEFAULT 0,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            UNIQUE (vendor_id, currency, network)
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS price_quotes (
            currency TEXT PRIMARY KEY,
            price_usd NUMERIC NOT NULL,
            observed_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS orders (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            vendor_id UUID NOT NULL,
            status TEXT NOT NULL DEFAULT 'PENDING',
            total_usd NUMERIC NOT NULL,
            currency TEXT,
            network TEXT,
            crypto_amount NUMERIC,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS payments (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            order_id UUID NOT NULL REFERENCES orders(id),
            currency TEXT NOT NULL,
            network TEXT NOT NULL,
            amount NUMERIC NOT NULL,
            payment_address TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'PENDING',
            expires_at TIMESTAMPTZ NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS blockchain_transactions (
            tx_hash TEXT PRIMARY KEY,
            payment_id UUID NOT NULL REFERENCES payments(id),
            network TEXT NOT NULL,
            amount NUMERIC NOT NULL,
            confirmations BIGINT NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT 'CONFIRMING',
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ];

    for statement in statements {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(DatabaseError::from_sqlx)?;
    }

    info!("database schema ready");
    Ok(())
}

/// Cheap liveness probe for the health endpoint.
pub async fn health_check(pool: &PgPool) -> Result<(), DatabaseError> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;
    Ok(())
}
