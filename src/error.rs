//! Unified error taxonomy for the payment engine.
//!
//! Every chain or feed failure is caught at its boundary and re-raised as one
//! of these variants; nothing here is fatal at process level — each error is
//! scoped to a single payment or order and returned to the caller.

use crate::chains::verifier::ChainError;
use crate::database::error::DatabaseError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum PaymentError {
    /// Neither the live feed nor the cache could produce a price.
    #[error("price unavailable: {detail}")]
    PriceUnavailable { detail: String },

    /// Computed crypto amount fell below the per-currency dust floor.
    #[error("amount too small: {amount} {currency} is below the minimum of {minimum}")]
    AmountTooSmall {
        currency: String,
        amount: String,
        minimum: String,
    },

    /// The vendor has no matching wallet and no same-currency fallback.
    #[error("no wallet configured for {currency} on {network}")]
    WalletNotConfigured { currency: String, network: String },

    #[error("order '{0}' not found")]
    OrderNotFound(Uuid),

    #[error("payment '{0}' not found")]
    PaymentNotFound(Uuid),

    /// The chain has no record of the hash yet; worth retrying after a delay.
    #[error("transaction '{tx_hash}' not found on {chain}")]
    TransactionNotFound { tx_hash: String, chain: String },

    /// The transaction pays a different address; stored state is untouched.
    #[error("payment address mismatch: expected {expected}, transaction pays {actual}")]
    AddressMismatch { expected: String, actual: String },

    /// The transferred amount is outside tolerance; stored state is untouched.
    #[error("amount mismatch: expected {expected}, transaction moves {actual}")]
    AmountMismatch { expected: String, actual: String },

    /// No verifier registered for the combination; a configuration error.
    #[error("unsupported currency/network combination: {currency} on {network}")]
    UnsupportedCurrencyOrNetwork { currency: String, network: String },

    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error(transparent)]
    Database(#[from] DatabaseError),

    /// Chain I/O failure that is neither a missing transaction nor a
    /// malformed response — surfaced for the caller to retry.
    #[error("chain query failed: {0}")]
    Chain(#[from] ChainError),
}

impl PaymentError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        PaymentError::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// HTTP status the API layer maps this error to.
    pub fn status_code(&self) -> u16 {
        match self {
            PaymentError::PriceUnavailable { .. } => 503,
            PaymentError::AmountTooSmall { .. } => 422,
            PaymentError::WalletNotConfigured { .. } => 422,
            PaymentError::OrderNotFound(_) | PaymentError::PaymentNotFound(_) => 404,
            PaymentError::TransactionNotFound { .. } => 404,
            PaymentError::AddressMismatch { .. } | PaymentError::AmountMismatch { .. } => 422,
            PaymentError::UnsupportedCurrencyOrNetwork { .. } => 400,
            PaymentError::Validation { .. } => 400,
            PaymentError::Database(_) => 500,
            PaymentError::Chain(_) => 502,
        }
    }

    /// Whether the caller should retry the same request later.
    pub fn is_retryable(&self) -> bool {
        match self {
            PaymentError::PriceUnavailable { .. } => true,
            PaymentError::TransactionNotFound { .. } => true,
            PaymentError::Chain(_) => true,
            PaymentError::Database(db) => db.is_retryable(),
            _ => false,
        }
    }
}

pub type PaymentResult<T> = Result<T, PaymentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        let err = PaymentError::OrderNotFound(Uuid::nil());
        assert_eq!(err.status_code(), 404);

        let err = PaymentError::AmountTooSmall {
            currency: "BTC".into(),
            amount: "0.0000125".into(),
            minimum: "0.0001".into(),
        };
        assert_eq!(err.status_code(), 422);
        assert!(!err.is_retryable());

        let err = PaymentError::UnsupportedCurrencyOrNetwork {
            currency: "USDT".into(),
            network: "TRC20".into(),
        };
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn retryable_errors() {
        let err = PaymentError::TransactionNotFound {
            tx_hash: "0xabc".into(),
            chain: "ethereum".into(),
        };
        assert!(err.is_retryable());
        assert_eq!(err.status_code(), 404);

        let err = PaymentError::Chain(ChainError::Rpc("503 from provider".into()));
        assert!(err.is_retryable());
        assert_eq!(err.status_code(), 502);

        let err = PaymentError::AddressMismatch {
            expected: "0xaa".into(),
            actual: "0xbb".into(),
        };
        assert!(!err.is_retryable());
    }
}
