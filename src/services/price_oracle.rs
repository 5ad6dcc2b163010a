//! Fiat pricing with a live feed and a cache fallback.
//!
//! Every successful live fetch refreshes the cache best-effort; when the feed
//! is down the last cached quotes are served regardless of age. Only when
//! both sources come up empty does pricing fail.

use crate::currency::Currency;
use crate::database::stores::PriceStore;
use crate::error::{PaymentError, PaymentResult};
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum PriceFeedError {
    #[error("price feed request failed: {0}")]
    Http(String),

    #[error("price feed omitted symbol for {0}")]
    MissingSymbol(Currency),

    #[error("malformed price feed response: {0}")]
    Malformed(String),
}

/// Source of live spot prices, quoted in USD.
#[async_trait]
pub trait PriceFeed: Send + Sync {
    async fn fetch_prices(
        &self,
        currencies: &[Currency],
    ) -> Result<HashMap<Currency, BigDecimal>, PriceFeedError>;

    fn name(&self) -> &str;
}

#[derive(Debug, Deserialize)]
struct TickerPrice {
    symbol: String,
    price: String,
}

/// Binance public ticker API. One batched request covers every tracked
/// symbol; the pegged stablecoin is filled in locally at 1.0.
pub struct BinancePriceFeed {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl BinancePriceFeed {
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            timeout: Duration::from_secs(timeout_secs),
        }
    }
}

#[async_trait]
impl PriceFeed for BinancePriceFeed {
    async fn fetch_prices(
        &self,
        currencies: &[Currency],
    ) -> Result<HashMap<Currency, BigDecimal>, PriceFeedError> {
        let symbols: Vec<&str> = currencies
            .iter()
            .filter_map(|c| c.binance_symbol())
            .collect();

        let symbols_param = serde_json::to_string(&symbols)
            .map_err(|e| PriceFeedError::Malformed(e.to_string()))?;
        let url = format!("{}/ticker/price", self.base_url);

        let request = self
            .http
            .get(&url)
            .query(&[("symbols", symbols_param)])
            .send();

        let response = tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| PriceFeedError::Http("request timed out".to_string()))?
            .map_err(|e| PriceFeedError::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(PriceFeedError::Http(format!(
                "HTTP {} from price feed",
                response.status()
            )));
        }

        let tickers: Vec<TickerPrice> = response
            .json()
            .await
            .map_err(|e| PriceFeedError::Malformed(e.to_string()))?;

        let mut by_symbol = HashMap::new();
        for ticker in tickers {
            let price = BigDecimal::from_str(&ticker.price).map_err(|_| {
                PriceFeedError::Malformed(format!("bad price for {}: {}", ticker.symbol, ticker.price))
            })?;
            by_symbol.insert(ticker.symbol, price);
        }

        let mut prices = HashMap::new();
        for &currency in currencies {
            if currency.is_pegged() {
                prices.insert(currency, BigDecimal::from(1));
                continue;
            }
            let symbol = currency
                .binance_symbol()
                .ok_or(PriceFeedError::MissingSymbol(currency))?;
            let price = by_symbol
                .remove(symbol)
                .ok_or(PriceFeedError::MissingSymbol(currency))?;
            prices.insert(currency, price);
        }

        Ok(prices)
    }

    fn name(&self) -> &str {
        "binance"
    }
}

/// Live-feed-first price source with the persisted cache as fallback.
pub struct PriceOracle {
    feed: Arc<dyn PriceFeed>,
    store: Arc<dyn PriceStore>,
    tracked: Vec<Currency>,
}

impl PriceOracle {
    pub fn new(feed: Arc<dyn PriceFeed>, store: Arc<dyn PriceStore>) -> Self {
        Self {
            feed,
            store,
            tracked: Currency::ALL.to_vec(),
        }
    }

    /// Current USD prices for every tracked currency.
    pub async fn get_prices(&self) -> PaymentResult<HashMap<Currency, BigDecimal>> {
        match self.feed.fetch_prices(&self.tracked).await {
            Ok(prices) => {
                self.refresh_cache(&prices).await;
                Ok(prices)
            }
            Err(feed_err) => {
                warn!(
                    feed = self.feed.name(),
                    error = %feed_err,
                    "live price fetch failed, falling back to cache"
                );
                self.cached_prices(&feed_err).await
            }
        }
    }

    /// USD price for one currency, or `PriceUnavailable` when neither source
    /// has it.
    pub async fn price_for(&self, currency: Currency) -> PaymentResult<BigDecimal> {
        let mut prices = self.get_prices().await?;
        prices
            .remove(&currency)
            .ok_or_else(|| PaymentError::PriceUnavailable {
                detail: format!("no quote for {}", currency),
            })
    }

    /// Cache writes never fail a pricing request.
    async fn refresh_cache(&self, prices: &HashMap<Currency, BigDecimal>) {
        for (&currency, price) in prices {
            if let Err(err) = self.store.upsert_quote(currency, price).await {
                warn!(%currency, error = %err, "failed to cache price quote");
            }
        }
    }

    async fn cached_prices(
        &self,
        feed_err: &PriceFeedError,
    ) -> PaymentResult<HashMap<Currency, BigDecimal>> {
        let quotes = self.store.load_quotes().await?;

        let mut prices = HashMap::new();
        for quote in quotes {
            match Currency::from_str(&quote.currency) {
                Ok(currency) => {
                    prices.insert(currency, quote.price_usd);
                }
                Err(_) => warn!(currency = %quote.currency, "skipping unknown cached currency"),
            }
        }

        if prices.is_empty() {
            return Err(PaymentError::PriceUnavailable {
                detail: format!("feed failed ({}) and price cache is empty", feed_err),
            });
        }

        info!(quotes = prices.len(), "serving prices from cache");
        Ok(prices)
    }
}
