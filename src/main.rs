use anyhow::Context;
use coinmart_backend::api::{self, AppState};
use coinmart_backend::chains::VerifierRegistry;
use coinmart_backend::config::{AppConfig, LogFormat, LoggingConfig};
use coinmart_backend::database::{self, PaymentRepository, PriceRepository, WalletRepository};
use coinmart_backend::services::{BinancePriceFeed, DerivationService, PaymentEngine, PriceOracle};
use std::sync::Arc;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("failed to load configuration")?;
    config.validate().context("invalid configuration")?;

    init_tracing(&config.logging);

    info!(
        host = %config.server.host,
        port = config.server.port,
        "starting payment engine"
    );

    let pool = database::init_pool(&config.database)
        .await
        .context("failed to connect to database")?;
    database::init_schema(&pool)
        .await
        .context("failed to initialize schema")?;

    let price_store = Arc::new(PriceRepository::new(pool.clone()));
    let wallet_store = Arc::new(WalletRepository::new(pool.clone()));
    let payment_store = Arc::new(PaymentRepository::new(pool.clone()));

    let feed = Arc::new(BinancePriceFeed::new(
        config.price_feed.base_url.clone(),
        config.price_feed.request_timeout,
    ));
    let oracle = Arc::new(PriceOracle::new(feed, price_store));
    let derivation = Arc::new(DerivationService::new(wallet_store));
    let registry = Arc::new(VerifierRegistry::from_config(&config.chains));

    let engine = Arc::new(PaymentEngine::new(
        payment_store,
        oracle.clone(),
        derivation,
        registry,
        config.payment.timeout_minutes,
    ));

    let state = AppState {
        engine,
        oracle,
        pool,
    };

    // Request id is set outermost so the trace layer sees it on every span.
    let app = api::router(state)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid));

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("shutdown complete");
    Ok(())
}

fn init_tracing(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.to_lowercase()));

    match config.format {
        LogFormat::Json => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .json()
                .init();
        }
        LogFormat::Plain => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received ctrl-c"),
        _ = terminate => info!("received SIGTERM"),
    }
}
