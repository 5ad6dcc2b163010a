//! Payment orchestration: quoting new payments and verifying submitted
//! transactions against the chain.

use crate::chains::registry::VerifierRegistry;
use crate::currency::{Currency, Network};
use crate::database::stores::{NewPayment, NewTransactionRecord, PaymentStore};
use crate::error::{PaymentError, PaymentResult};
use crate::models::{OrderStatus, Payment, PaymentStatus};
use crate::services::derivation::DerivationService;
use crate::services::price_oracle::PriceOracle;
use bigdecimal::{BigDecimal, Zero};
use chrono::{Duration, Utc};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Accepted shortfall between quoted and received amount, as a fraction.
const AMOUNT_TOLERANCE: &str = "0.01";
/// Quoted crypto amounts are rounded to this many decimal places.
const AMOUNT_SCALE: i64 = 8;

/// What one verification attempt established.
#[derive(Debug, Clone, serde::Serialize)]
pub struct VerificationOutcome {
    pub confirmed: bool,
    pub confirmations: u64,
    pub payment_status: PaymentStatus,
}

pub struct PaymentEngine {
    store: Arc<dyn PaymentStore>,
    oracle: Arc<PriceOracle>,
    derivation: Arc<DerivationService>,
    registry: Arc<VerifierRegistry>,
    timeout_minutes: i64,
}

impl PaymentEngine {
    pub fn new(
        store: Arc<dyn PaymentStore>,
        oracle: Arc<PriceOracle>,
        derivation: Arc<DerivationService>,
        registry: Arc<VerifierRegistry>,
        timeout_minutes: i64,
    ) -> Self {
        Self {
            store,
            oracle,
            derivation,
            registry,
            timeout_minutes,
        }
    }

    /// Quote an order in crypto and open a PENDING payment for it.
    ///
    /// `fiat_override` substitutes the order total for partial or adjusted
    /// charges; `None` uses the stored total.
    pub async fn create_payment(
        &self,
        order_id: Uuid,
        currency: Currency,
        network: Network,
        fiat_override: Option<BigDecimal>,
    ) -> PaymentResult<Payment> {
        if !currency.supports_network(network) {
            return Err(PaymentError::UnsupportedCurrencyOrNetwork {
                currency: currency.to_string(),
                network: network.to_string(),
            });
        }

        // A pair without a registered verifier could be quoted and paid but
        // never confirmed; reject it before any money moves.
        if self.registry.get(currency, network).is_none() {
            return Err(PaymentError::UnsupportedCurrencyOrNetwork {
                currency: currency.to_string(),
                network: network.to_string(),
            });
        }

        let order = self
            .store
            .load_order(order_id)
            .await?
            .ok_or(PaymentError::OrderNotFound(order_id))?;

        let fiat = fiat_override.unwrap_or_else(|| order.total_usd.clone());
        if fiat <= BigDecimal::zero() {
            return Err(PaymentError::validation(
                "amount_usd",
                "must be greater than zero",
            ));
        }

        let price = self.oracle.price_for(currency).await?;
        let amount = crypto_amount(&fiat, &price);

        let floor = currency.dust_floor();
        if amount < floor {
            return Err(PaymentError::AmountTooSmall {
                currency: currency.to_string(),
                amount: amount.to_string(),
                minimum: floor.to_string(),
            });
        }

        let address = self
            .derivation
            .receive_address(order.vendor_id, currency, network)
            .await?;

        let expires_at = Utc::now() + Duration::minutes(self.timeout_minutes);
        let payment = self
            .store
            .insert_payment(NewPayment {
                order_id,
                currency,
                network,
                amount: amount.clone(),
                payment_address: address,
                expires_at,
            })
            .await?;

        self.store
            .mirror_quote_on_order(order_id, currency, network, &amount)
            .await?;

        info!(
            payment_id = %payment.id, %order_id, %currency, %network,
            amount = %amount, "payment created"
        );

        Ok(payment)
    }

    /// Check a submitted transaction hash against the payment's expectations
    /// and advance payment and order state accordingly.
    ///
    /// Safe to call repeatedly with the same hash; the audit row is upserted
    /// and statuses only move forward along the confirmation path.
    pub async fn verify_payment(
        &self,
        payment_id: Uuid,
        tx_hash: &str,
    ) -> PaymentResult<VerificationOutcome> {
        let tx_hash = tx_hash.trim();
        if tx_hash.is_empty() {
            return Err(PaymentError::validation("tx_hash", "must not be empty"));
        }

        let payment = self
            .store
            .load_payment(payment_id)
            .await?
            .ok_or(PaymentError::PaymentNotFound(payment_id))?;

        let currency = Currency::from_str(&payment.currency)
            .map_err(|e| PaymentError::validation("currency", e))?;
        let network = Network::from_str(&payment.network)
            .map_err(|e| PaymentError::validation("network", e))?;

        let verifier = self.registry.get(currency, network).ok_or_else(|| {
            PaymentError::UnsupportedCurrencyOrNetwork {
                currency: currency.to_string(),
                network: network.to_string(),
            }
        })?;

        let check = match verifier.check_transaction(tx_hash).await {
            Ok(check) => check,
            Err(err) if err.is_not_found() => {
                return Err(PaymentError::TransactionNotFound {
                    tx_hash: tx_hash.to_string(),
                    chain: verifier.chain_id().to_string(),
                })
            }
            Err(err) => return Err(err.into()),
        };

        if !addresses_match(&payment.payment_address, &check.recipient) {
            warn!(
                %payment_id, tx_hash, expected = %payment.payment_address,
                actual = %check.recipient, "transaction pays the wrong address"
            );
            return Err(PaymentError::AddressMismatch {
                expected: payment.payment_address.clone(),
                actual: check.recipient,
            });
        }

        if !within_tolerance(&payment.amount, &check.amount) {
            return Err(PaymentError::AmountMismatch {
                expected: payment.amount.to_string(),
                actual: check.amount.to_string(),
            });
        }

        let payment_status = if check.confirmed {
            PaymentStatus::Confirmed
        } else {
            PaymentStatus::Confirming
        };
        let order_status = if check.confirmed {
            OrderStatus::Paid
        } else {
            OrderStatus::PaymentConfirming
        };

        self.store
            .upsert_transaction(NewTransactionRecord {
                tx_hash: tx_hash.to_string(),
                payment_id,
                chain: verifier.chain_id().to_string(),
                amount: check.amount.clone(),
                confirmations: check.confirmations as i64,
                status: payment_status,
            })
            .await?;

        self.store
            .set_payment_status(payment_id, payment_status)
            .await?;
        self.store
            .set_order_status(payment.order_id, order_status)
            .await?;

        info!(
            %payment_id, tx_hash, confirmations = check.confirmations,
            confirmed = check.confirmed, "payment verification recorded"
        );

        Ok(VerificationOutcome {
            confirmed: check.confirmed,
            confirmations: check.confirmations,
            payment_status,
        })
    }
}

/// Fiat total divided by the spot price, rounded to the quoting scale.
fn crypto_amount(fiat: &BigDecimal, price: &BigDecimal) -> BigDecimal {
    (fiat / price).with_scale_round(AMOUNT_SCALE, bigdecimal::RoundingMode::HalfUp)
}

/// Case-insensitive address comparison. An empty reported recipient never
/// matches; pending token transfers report no recipient at all.
fn addresses_match(expected: &str, actual: &str) -> bool {
    !actual.is_empty() && expected.eq_ignore_ascii_case(actual)
}

/// Received amount must be within 1% of the quoted amount, in either
/// direction.
fn within_tolerance(expected: &BigDecimal, actual: &BigDecimal) -> bool {
    // Tolerance literal is a valid decimal.
    let tolerance = BigDecimal::from_str(AMOUNT_TOLERANCE).expect("tolerance literal");
    let diff = (expected - actual).abs();
    diff <= expected.abs() * tolerance
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    #[test]
    fn quotes_round_to_eight_places() {
        assert_eq!(crypto_amount(&dec("199.99"), &dec("2000")), dec("0.099995"));
        assert_eq!(crypto_amount(&dec("100"), &dec("3")), dec("33.33333333"));
        assert_eq!(crypto_amount(&dec("1"), &dec("60000")), dec("0.00001667"));
    }

    #[test]
    fn address_comparison_is_case_insensitive() {
        assert!(addresses_match(
            "0xAb5801a7D398351b8bE11C439e05C5B3259aeC9B",
            "0xab5801a7d398351b8be11c439e05c5b3259aec9b"
        ));
        assert!(!addresses_match("bc1qabc", "bc1qdef"));
        assert!(!addresses_match("bc1qabc", ""));
    }

    #[test]
    fn tolerance_boundaries() {
        let expected = dec("1.0");
        assert!(within_tolerance(&expected, &dec("1.0")));
        assert!(within_tolerance(&expected, &dec("0.99")));
        assert!(within_tolerance(&expected, &dec("1.009")));
        assert!(within_tolerance(&expected, &dec("1.01")));
        assert!(!within_tolerance(&expected, &dec("1.011")));
        assert!(!within_tolerance(&expected, &dec("0.98")));
    }

    #[test]
    fn tolerance_scales_with_amount() {
        assert!(within_tolerance(&dec("0.099995"), &dec("0.0999")));
        assert!(!within_tolerance(&dec("0.099995"), &dec("0.0989")));
    }
}
