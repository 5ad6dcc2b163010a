//! Bitcoin verifier backed by an Esplora-style block explorer API.

use crate::chains::verifier::{ChainError, ChainVerifier, TransferCheck};
use crate::config::BitcoinChainConfig;
use bigdecimal::num_bigint::BigInt;
use bigdecimal::BigDecimal;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

const SATS_DECIMALS: i64 = 8;

#[derive(Debug, Deserialize)]
struct EsploraTransaction {
    status: EsploraStatus,
    vout: Vec<EsploraOutput>,
}

#[derive(Debug, Deserialize)]
struct EsploraStatus {
    confirmed: bool,
    block_height: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct EsploraOutput {
    scriptpubkey_address: Option<String>,
    /// Output value in satoshis.
    value: u64,
}

pub struct BitcoinVerifier {
    http: reqwest::Client,
    api_url: String,
    required_confirmations: u64,
    timeout: Duration,
}

impl BitcoinVerifier {
    pub fn new(config: &BitcoinChainConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: config.api_url.trim_end_matches('/').to_string(),
            required_confirmations: config.required_confirmations,
            timeout: Duration::from_secs(config.request_timeout),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, ChainError> {
        let url = format!("{}{}", self.api_url, path);
        let request = self.http.get(&url).send();

        let response = tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| ChainError::Timeout {
                service: "esplora".to_string(),
                seconds: self.timeout.as_secs(),
            })?
            .map_err(|e| ChainError::Rpc(format!("esplora request failed: {}", e)))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ChainError::NotFound);
        }
        if !response.status().is_success() {
            return Err(ChainError::Rpc(format!(
                "esplora returned HTTP {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| ChainError::MalformedResponse(format!("{}: {}", path, e)))
    }

    async fn tip_height(&self) -> Result<u64, ChainError> {
        self.get_json("/blocks/tip/height").await
    }
}

#[async_trait]
impl ChainVerifier for BitcoinVerifier {
    fn chain_id(&self) -> &str {
        "bitcoin"
    }

    async fn check_transaction(&self, tx_hash: &str) -> Result<TransferCheck, ChainError> {
        let tx: EsploraTransaction = self.get_json(&format!("/tx/{}", tx_hash)).await?;

        // Payment addresses are single-use, so the first spendable output is
        // the payment output by construction.
        let output = tx
            .vout
            .first()
            .ok_or_else(|| ChainError::MalformedResponse("transaction has no outputs".into()))?;

        let recipient = output.scriptpubkey_address.clone().unwrap_or_default();
        let amount = sats_to_btc(output.value);

        let confirmations = match (tx.status.confirmed, tx.status.block_height) {
            (true, Some(height)) => {
                let tip = self.tip_height().await?;
                tip.saturating_sub(height) + 1
            }
            _ => 0,
        };

        Ok(TransferCheck {
            confirmed: confirmations >= self.required_confirmations,
            confirmations,
            amount,
            recipient,
        })
    }
}

fn sats_to_btc(sats: u64) -> BigDecimal {
    BigDecimal::new(BigInt::from(sats), SATS_DECIMALS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn converts_sats() {
        assert_eq!(sats_to_btc(100_000_000), BigDecimal::from(1));
        assert_eq!(sats_to_btc(12_500), BigDecimal::from_str("0.000125").unwrap());
        assert_eq!(sats_to_btc(0), BigDecimal::from(0));
    }

    #[test]
    fn parses_confirmed_transaction() {
        let body = r#"{
            "txid": "f4184fc596403b9d638783cf57adfe4c75c605f6356fbc91338530e9831e9e16",
            "status": { "confirmed": true, "block_height": 170 },
            "vout": [
                { "scriptpubkey_address": "bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq", "value": 1000000 },
                { "scriptpubkey_address": "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4", "value": 400000 }
            ]
        }"#;

        let tx: EsploraTransaction = serde_json::from_str(body).unwrap();
        assert!(tx.status.confirmed);
        assert_eq!(tx.status.block_height, Some(170));
        let first = tx.vout.first().unwrap();
        assert_eq!(
            first.scriptpubkey_address.as_deref(),
            Some("bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq")
        );
        assert_eq!(sats_to_btc(first.value), BigDecimal::from_str("0.01").unwrap());
    }

    #[test]
    fn parses_mempool_transaction() {
        let body = r#"{
            "status": { "confirmed": false },
            "vout": [
                { "scriptpubkey_address": "bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq", "value": 50000 }
            ]
        }"#;

        let tx: EsploraTransaction = serde_json::from_str(body).unwrap();
        assert!(!tx.status.confirmed);
        assert_eq!(tx.status.block_height, None);
    }

    #[test]
    fn nonstandard_output_has_no_address() {
        let body = r#"{
            "status": { "confirmed": true, "block_height": 1 },
            "vout": [ { "value": 0 } ]
        }"#;

        let tx: EsploraTransaction = serde_json::from_str(body).unwrap();
        assert!(tx.vout.first().unwrap().scriptpubkey_address.is_none());
    }
}
