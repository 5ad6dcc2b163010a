//! Common contract implemented by every chain verifier.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use thiserror::Error;

/// What a chain verifier could establish about a submitted transaction.
#[derive(Debug, Clone)]
pub struct TransferCheck {
    /// True once confirmations have reached the chain's threshold.
    pub confirmed: bool,
    pub confirmations: u64,
    /// Transferred amount in whole currency units (not base units).
    pub amount: BigDecimal,
    /// Recipient as reported by the chain; compared case-insensitively
    /// against the stored receive address.
    pub recipient: String,
}

/// Errors from chain data sources, normalized at the verifier boundary so
/// provider-specific failures never leak upward.
#[derive(Debug, Error)]
pub enum ChainError {
    /// The chain's data source has no record of the transaction yet.
    #[error("transaction not found")]
    NotFound,

    /// The provider answered but with a response missing required fields.
    /// Treated like an absent transaction rather than trusted partially.
    #[error("malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("rpc error: {0}")]
    Rpc(String),

    #[error("request to {service} timed out after {seconds}s")]
    Timeout { service: String, seconds: u64 },
}

impl ChainError {
    /// Whether the orchestrator should report this as a missing transaction
    /// (caller retries later) instead of a hard provider failure.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ChainError::NotFound | ChainError::MalformedResponse(_)
        )
    }
}

/// One verifier per chain family. Implementations query their data source,
/// validate the response defensively and never guess missing values.
#[async_trait]
pub trait ChainVerifier: Send + Sync {
    /// Chain identifier recorded on the transaction audit trail
    /// (e.g. "bitcoin", "ethereum", "bsc", "solana").
    fn chain_id(&self) -> &str;

    /// Look up a transaction and report confirmations, amount and recipient.
    async fn check_transaction(&self, tx_hash: &str) -> Result<TransferCheck, ChainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_classification() {
        assert!(ChainError::NotFound.is_not_found());
        assert!(ChainError::MalformedResponse("missing vout".into()).is_not_found());
        assert!(!ChainError::Rpc("500".into()).is_not_found());
        assert!(!ChainError::Timeout {
            service: "esplora".into(),
            seconds: 15
        }
        .is_not_found());
    }
}
