//! EVM verifiers for native transfers (ETH, BNB) and ERC-20/BEP-20 token
//! transfers, backed by a plain JSON-RPC client.

use crate::chains::verifier::{ChainError, ChainVerifier, TransferCheck};
use crate::config::EvmChainConfig;
use crate::currency::TokenInfo;
use alloy_primitives::U256;
use async_trait::async_trait;
use bigdecimal::num_bigint::BigInt;
use bigdecimal::BigDecimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// keccak256("Transfer(address,address,uint256)")
const TRANSFER_EVENT_TOPIC: &str =
    "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef";

#[derive(Debug, Deserialize)]
struct RpcEnvelope<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RpcTransaction {
    to: Option<String>,
    value: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    block_number: Option<String>,
    logs: Vec<RpcLog>,
}

#[derive(Debug, Deserialize)]
struct RpcLog {
    address: String,
    topics: Vec<String>,
    data: String,
}

/// Thin JSON-RPC transport shared by the native and token verifiers.
#[derive(Clone)]
pub struct EvmRpcClient {
    http: reqwest::Client,
    rpc_url: String,
    chain: String,
    timeout: Duration,
}

impl EvmRpcClient {
    pub fn new(chain: impl Into<String>, config: &EvmChainConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            rpc_url: config.rpc_url.clone(),
            chain: chain.into(),
            timeout: Duration::from_secs(config.request_timeout),
        }
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<Option<T>, ChainError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let request = self.http.post(&self.rpc_url).json(&body).send();

        let response = tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| ChainError::Timeout {
                service: self.chain.clone(),
                seconds: self.timeout.as_secs(),
            })?
            .map_err(|e| ChainError::Rpc(format!("{} rpc request failed: {}", self.chain, e)))?;

        if !response.status().is_success() {
            return Err(ChainError::Rpc(format!(
                "{} rpc returned HTTP {}",
                self.chain,
                response.status()
            )));
        }

        let envelope: RpcEnvelope<T> = response
            .json()
            .await
            .map_err(|e| ChainError::MalformedResponse(format!("{}: {}", method, e)))?;

        if let Some(err) = envelope.error {
            return Err(ChainError::Rpc(format!(
                "{} rpc error {}: {}",
                self.chain, err.code, err.message
            )));
        }

        Ok(envelope.result)
    }

    async fn transaction(&self, tx_hash: &str) -> Result<Option<RpcTransaction>, ChainError> {
        self.call("eth_getTransactionByHash", json!([tx_hash])).await
    }

    async fn receipt(&self, tx_hash: &str) -> Result<Option<RpcReceipt>, ChainError> {
        self.call("eth_getTransactionReceipt", json!([tx_hash])).await
    }

    async fn current_block(&self) -> Result<u64, ChainError> {
        let block: Option<String> = self.call("eth_blockNumber", json!([])).await?;
        let block = block
            .ok_or_else(|| ChainError::MalformedResponse("eth_blockNumber: null".to_string()))?;
        parse_hex_u64(&block)
    }
}

fn parse_hex_u64(hex: &str) -> Result<u64, ChainError> {
    let trimmed = hex.trim_start_matches("0x");
    u64::from_str_radix(trimmed, 16)
        .map_err(|_| ChainError::MalformedResponse(format!("bad hex quantity: {}", hex)))
}

/// Convert a 0x-prefixed hex quantity into whole currency units.
fn hex_to_amount(hex: &str, decimals: u32) -> Result<BigDecimal, ChainError> {
    let trimmed = hex.trim_start_matches("0x");
    let raw = if trimmed.is_empty() { "0" } else { trimmed };
    let value = U256::from_str_radix(raw, 16)
        .map_err(|_| ChainError::MalformedResponse(format!("bad hex amount: {}", hex)))?;
    let base_units = BigInt::from_str(&value.to_string())
        .map_err(|_| ChainError::MalformedResponse(format!("bad hex amount: {}", hex)))?;
    Ok(BigDecimal::new(base_units, decimals as i64))
}

fn confirmations_from(current_block: u64, tx_block: u64) -> u64 {
    current_block.saturating_sub(tx_block) + 1
}

/// Verifier for native-coin transfers on an EVM chain.
pub struct EvmVerifier {
    client: EvmRpcClient,
    chain: String,
    required_confirmations: u64,
}

impl EvmVerifier {
    pub fn new(chain: impl Into<String>, config: &EvmChainConfig) -> Self {
        let chain = chain.into();
        Self {
            client: EvmRpcClient::new(chain.clone(), config),
            chain,
            required_confirmations: config.required_confirmations,
        }
    }
}

#[async_trait]
impl ChainVerifier for EvmVerifier {
    fn chain_id(&self) -> &str {
        &self.chain
    }

    async fn check_transaction(&self, tx_hash: &str) -> Result<TransferCheck, ChainError> {
        let tx = self
            .client
            .transaction(tx_hash)
            .await?
            .ok_or(ChainError::NotFound)?;

        let amount = hex_to_amount(&tx.value, 18)?;
        let recipient = tx.to.unwrap_or_default().to_lowercase();

        // Mined but not yet in a block: report zero confirmations so the
        // caller records a pending check instead of failing.
        let Some(receipt) = self.client.receipt(tx_hash).await? else {
            debug!(chain = %self.chain, tx_hash, "transaction has no receipt yet");
            return Ok(TransferCheck {
                confirmed: false,
                confirmations: 0,
                amount,
                recipient,
            });
        };

        let receipt_block = match receipt.block_number.as_deref() {
            Some(block) => parse_hex_u64(block)?,
            None => {
                return Ok(TransferCheck {
                    confirmed: false,
                    confirmations: 0,
                    amount,
                    recipient,
                })
            }
        };

        let current_block = self.client.current_block().await?;
        let confirmations = confirmations_from(current_block, receipt_block);

        Ok(TransferCheck {
            confirmed: confirmations >= self.required_confirmations,
            confirmations,
            amount,
            recipient,
        })
    }
}

/// Verifier for ERC-20 / BEP-20 stablecoin transfers. Reads the Transfer
/// event log emitted by the token contract instead of the outer call data.
pub struct Erc20Verifier {
    client: EvmRpcClient,
    chain: String,
    token: TokenInfo,
    required_confirmations: u64,
}

impl Erc20Verifier {
    pub fn new(chain: impl Into<String>, token: TokenInfo, config: &EvmChainConfig) -> Self {
        let chain = chain.into();
        Self {
            client: EvmRpcClient::new(chain.clone(), config),
            chain,
            token,
            required_confirmations: config.required_confirmations,
        }
    }

    /// First Transfer event emitted by the expected token contract.
    fn find_transfer<'a>(&self, logs: &'a [RpcLog]) -> Option<&'a RpcLog> {
        logs.iter().find(|log| {
            log.address.to_lowercase() == self.token.contract
                && log.topics.len() >= 3
                && log.topics[0].eq_ignore_ascii_case(TRANSFER_EVENT_TOPIC)
        })
    }
}

#[async_trait]
impl ChainVerifier for Erc20Verifier {
    fn chain_id(&self) -> &str {
        &self.chain
    }

    async fn check_transaction(&self, tx_hash: &str) -> Result<TransferCheck, ChainError> {
        // Token transfers are only inspectable through the receipt logs, so
        // a missing receipt reads as an absent transaction.
        let receipt = self
            .client
            .receipt(tx_hash)
            .await?
            .ok_or(ChainError::NotFound)?;

        let log = self.find_transfer(&receipt.logs).ok_or_else(|| {
            ChainError::MalformedResponse(format!(
                "no {} transfer log in transaction {}",
                self.token.contract, tx_hash
            ))
        })?;

        let recipient = topic_to_address(&log.topics[2])?;
        let amount = hex_to_amount(&log.data, self.token.decimals)?;

        let receipt_block = receipt
            .block_number
            .as_deref()
            .map(parse_hex_u64)
            .transpose()?;

        let confirmations = match receipt_block {
            Some(block) => confirmations_from(self.client.current_block().await?, block),
            None => 0,
        };

        Ok(TransferCheck {
            confirmed: confirmations >= self.required_confirmations,
            confirmations,
            amount,
            recipient,
        })
    }
}

/// Extract the address from a 32-byte indexed event topic.
fn topic_to_address(topic: &str) -> Result<String, ChainError> {
    let trimmed = topic.trim_start_matches("0x");
    if trimmed.len() < 40 {
        return Err(ChainError::MalformedResponse(format!(
            "bad address topic: {}",
            topic
        )));
    }
    Ok(format!("0x{}", &trimmed[trimmed.len() - 40..].to_lowercase()))
}
