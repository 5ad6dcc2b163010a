//! Solana verifier using the JSON-RPC `getTransaction` endpoint with parsed
//! instruction encoding.

use crate::chains::verifier::{ChainError, ChainVerifier, TransferCheck};
use crate::config::SolanaChainConfig;
use async_trait::async_trait;
use bigdecimal::num_bigint::BigInt;
use bigdecimal::BigDecimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::str::FromStr;
use std::time::Duration;

const LAMPORTS_DECIMALS: i64 = 9;
/// Token programs report decimals only in `transferChecked`; plain `transfer`
/// instructions fall back to the stablecoin standard of 6.
const SPL_DEFAULT_DECIMALS: i64 = 6;

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
struct ParsedTransaction {
    slot: u64,
    transaction: TransactionBody,
}

#[derive(Debug, Deserialize)]
struct TransactionBody {
    message: TransactionMessage,
}

#[derive(Debug, Deserialize)]
struct TransactionMessage {
    instructions: Vec<ParsedInstruction>,
}

#[derive(Debug, Deserialize)]
struct ParsedInstruction {
    program: Option<String>,
    parsed: Option<InstructionDetail>,
}

#[derive(Debug, Deserialize)]
struct InstructionDetail {
    #[serde(rename = "type")]
    kind: String,
    info: Value,
}

/// Recipient and amount pulled out of the first recognized transfer
/// instruction.
#[derive(Debug, PartialEq)]
struct ParsedTransfer {
    recipient: String,
    amount: BigDecimal,
}

pub struct SolanaVerifier {
    http: reqwest::Client,
    rpc_url: String,
    required_confirmations: u64,
    timeout: Duration,
}

impl SolanaVerifier {
    pub fn new(config: &SolanaChainConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            rpc_url: config.rpc_url.clone(),
            required_confirmations: config.required_confirmations,
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
                service: "solana".to_string(),
                seconds: self.timeout.as_secs(),
            })?
            .map_err(|e| ChainError::Rpc(format!("solana rpc request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(ChainError::Rpc(format!(
                "solana rpc returned HTTP {}",
                response.status()
            )));
        }

        let envelope: RpcEnvelope<T> = response
            .json()
            .await
            .map_err(|e| ChainError::MalformedResponse(format!("{}: {}", method, e)))?;

        if let Some(err) = envelope.error {
            return Err(ChainError::Rpc(format!(
                "solana rpc error {}: {}",
                err.code, err.message
            )));
        }

        Ok(envelope.result)
    }

    async fn current_slot(&self) -> Result<u64, ChainError> {
        let slot: Option<u64> = self
            .call("getSlot", json!([{ "commitment": "confirmed" }]))
            .await?;
        slot.ok_or_else(|| ChainError::MalformedResponse("getSlot: null".to_string()))
    }
}

#[async_trait]
impl ChainVerifier for SolanaVerifier {
    fn chain_id(&self) -> &str {
        "solana"
    }

    async fn check_transaction(&self, tx_hash: &str) -> Result<TransferCheck, ChainError> {
        let params = json!([
            tx_hash,
            {
                "encoding": "jsonParsed",
                "commitment": "confirmed",
                "maxSupportedTransactionVersion": 0,
            }
        ]);

        let tx: ParsedTransaction = self
            .call("getTransaction", params)
            .await?
            .ok_or(ChainError::NotFound)?;

        let transfer = extract_transfer(&tx.transaction.message.instructions)?;

        let current_slot = self.current_slot().await?;
        let confirmations = current_slot.saturating_sub(tx.slot);

        Ok(TransferCheck {
            confirmed: confirmations >= self.required_confirmations,
            confirmations,
            amount: transfer.amount,
            recipient: transfer.recipient,
        })
    }
}

/// First recognized transfer instruction wins: a native SOL system transfer,
/// or a `transfer`/`transferChecked` from either token program (legacy
/// spl-token or token-2022).
fn extract_transfer(instructions: &[ParsedInstruction]) -> Result<ParsedTransfer, ChainError> {
    for instruction in instructions {
        let Some(detail) = &instruction.parsed else {
            continue;
        };
        let program = instruction.program.as_deref().unwrap_or("");

        match (program, detail.kind.as_str()) {
            ("system", "transfer") => {
                let info = &detail.info;
                let destination = str_field(info, "destination")?;
                let lamports = info
                    .get("lamports")
                    .and_then(Value::as_u64)
                    .ok_or_else(|| malformed("lamports"))?;
                return Ok(ParsedTransfer {
                    recipient: destination,
                    amount: BigDecimal::new(BigInt::from(lamports), LAMPORTS_DECIMALS),
                });
            }
            ("spl-token" | "spl-token-2022", "transfer") => {
                let info = &detail.info;
                let destination = str_field(info, "destination")?;
                let amount = str_field(info, "amount")?;
                return Ok(ParsedTransfer {
                    recipient: destination,
                    amount: base_units_to_amount(&amount, SPL_DEFAULT_DECIMALS)?,
                });
            }
            ("spl-token" | "spl-token-2022", "transferChecked") => {
                let info = &detail.info;
                let destination = str_field(info, "destination")?;
                let token_amount = info
                    .get("tokenAmount")
                    .ok_or_else(|| malformed("tokenAmount"))?;
                let amount = str_field(token_amount, "amount")?;
                let decimals = token_amount
                    .get("decimals")
                    .and_then(Value::as_u64)
                    .ok_or_else(|| malformed("tokenAmount.decimals"))?;
                return Ok(ParsedTransfer {
                    recipient: destination,
                    amount: base_units_to_amount(&amount, decimals as i64)?,
                });
            }
            _ => continue,
        }
    }

    Err(ChainError::MalformedResponse(
        "no transfer instruction in transaction".to_string(),
    ))
}

fn str_field(value: &Value, field: &str) -> Result<String, ChainError> {
    value
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| malformed(field))
}

fn malformed(field: &str) -> ChainError {
    ChainError::MalformedResponse(format!("instruction missing field: {}", field))
}

fn base_units_to_amount(raw: &str, decimals: i64) -> Result<BigDecimal, ChainError> {
    let units = BigInt::from_str(raw)
        .map_err(|_| ChainError::MalformedResponse(format!("bad token amount: {}", raw)))?;
    Ok(BigDecimal::new(units, decimals))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_instructions(body: &str) -> Vec<ParsedInstruction> {
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn extracts_system_transfer() {
        let instructions = parse_instructions(
            r#"[
                { "programId": "ComputeBudget111111111111111111111111111111" },
                {
                    "program": "system",
                    "parsed": {
                        "type": "transfer",
                        "info": {
                            "source": "9aE476sH92Vz7DMPyq5WLPkrKWivxeuTKEFKd2sZZcde",
                            "destination": "3emsAVdmGKERbHjmGfQ6oZ1e35dkf5iYcS6U4CPKFVaa",
                            "lamports": 1500000000
                        }
                    }
                }
            ]"#,
        );

        let transfer = extract_transfer(&instructions).unwrap();
        assert_eq!(
            transfer.recipient,
            "3emsAVdmGKERbHjmGfQ6oZ1e35dkf5iYcS6U4CPKFVaa"
        );
        assert_eq!(transfer.amount, BigDecimal::from_str("1.5").unwrap());
    }

    #[test]
    fn extracts_spl_transfer_with_default_decimals() {
        let instructions = parse_instructions(
            r#"[
                {
                    "program": "spl-token",
                    "parsed": {
                        "type": "transfer",
                        "info": {
                            "destination": "BrG44HdsEhzapvs8bEqzvkq4egwevS3fRE6ze2ENo6S8",
                            "amount": "25000000"
                        }
                    }
                }
            ]"#,
        );

        let transfer = extract_transfer(&instructions).unwrap();
        assert_eq!(transfer.amount, BigDecimal::from(25));
    }

    #[test]
    fn extracts_transfer_checked_with_reported_decimals() {
        let instructions = parse_instructions(
            r#"[
                {
                    "program": "spl-token",
                    "parsed": {
                        "type": "transferChecked",
                        "info": {
                            "destination": "BrG44HdsEhzapvs8bEqzvkq4egwevS3fRE6ze2ENo6S8",
                            "tokenAmount": {
                                "amount": "1999900000",
                                "decimals": 9
                            }
                        }
                    }
                }
            ]"#,
        );

        let transfer = extract_transfer(&instructions).unwrap();
        assert_eq!(transfer.amount, BigDecimal::from_str("1.9999").unwrap());
    }

    #[test]
    fn token_2022_transfers_are_recognized() {
        let instructions = parse_instructions(
            r#"[
                {
                    "program": "spl-token-2022",
                    "parsed": {
                        "type": "transferChecked",
                        "info": {
                            "destination": "BrG44HdsEhzapvs8bEqzvkq4egwevS3fRE6ze2ENo6S8",
                            "tokenAmount": {
                                "amount": "25000000",
                                "decimals": 6
                            }
                        }
                    }
                }
            ]"#,
        );

        let transfer = extract_transfer(&instructions).unwrap();
        assert_eq!(transfer.amount, BigDecimal::from(25));

        let instructions = parse_instructions(
            r#"[
                {
                    "program": "spl-token-2022",
                    "parsed": {
                        "type": "transfer",
                        "info": {
                            "destination": "BrG44HdsEhzapvs8bEqzvkq4egwevS3fRE6ze2ENo6S8",
                            "amount": "1000000"
                        }
                    }
                }
            ]"#,
        );

        let transfer = extract_transfer(&instructions).unwrap();
        assert_eq!(transfer.amount, BigDecimal::from(1));
    }

    #[test]
    fn no_transfer_instruction_is_malformed() {
        let instructions = parse_instructions(
            r#"[
                { "programId": "Vote111111111111111111111111111111111111111" },
                {
                    "program": "spl-token",
                    "parsed": { "type": "approve", "info": {} }
                }
            ]"#,
        );

        let err = extract_transfer(&instructions).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn missing_fields_are_malformed() {
        let instructions = parse_instructions(
            r#"[
                {
                    "program": "system",
                    "parsed": {
                        "type": "transfer",
                        "info": { "destination": "abc" }
                    }
                }
            ]"#,
        );

        assert!(extract_transfer(&instructions).is_err());
    }
}
