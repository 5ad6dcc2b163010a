//! Per-payment receive address derivation.
//!
//! Wallets configured with an extended public key get a fresh child address
//! per payment (watch-only, no private material ever touches the service).
//! Everything else, including chains without a safe derivation scheme here,
//! uses the wallet's static address.

use crate::currency::{ChainFamily, Currency, Network};
use crate::database::stores::WalletStore;
use crate::error::{PaymentError, PaymentResult};
use crate::models::Wallet;
use alloy_primitives::{keccak256, Address as EvmAddress};
use bitcoin::bip32::{ChildNumber, Xpub};
use bitcoin::key::CompressedPublicKey;
use bitcoin::secp256k1::Secp256k1;
use bitcoin::{Address as BtcAddress, Network as BtcNetwork};
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
enum DerivationError {
    #[error("invalid extended public key: {0}")]
    Bip32(#[from] bitcoin::bip32::Error),

    #[error("derivation index {0} out of range")]
    IndexRange(i64),
}

pub struct DerivationService {
    wallets: Arc<dyn WalletStore>,
}

impl DerivationService {
    pub fn new(wallets: Arc<dyn WalletStore>) -> Self {
        Self { wallets }
    }

    /// Resolve the address a buyer should pay for one payment attempt.
    ///
    /// Wallet lookup prefers an exact currency/network match and falls back
    /// to any wallet holding the currency. Derivation failures degrade to the
    /// wallet's static address rather than failing the payment.
    pub async fn receive_address(
        &self,
        vendor_id: Uuid,
        currency: Currency,
        network: Network,
    ) -> PaymentResult<String> {
        let wallet = match self
            .wallets
            .find_wallet(vendor_id, currency, Some(network))
            .await?
        {
            Some(wallet) => wallet,
            None => {
                let fallback = self.wallets.find_wallet(vendor_id, currency, None).await?;
                match fallback {
                    Some(wallet) => {
                        warn!(
                            %vendor_id, %currency, requested_network = %network,
                            wallet_network = %wallet.network,
                            "no wallet on requested network, using same-currency fallback"
                        );
                        wallet
                    }
                    None => {
                        return Err(PaymentError::WalletNotConfigured {
                            currency: currency.to_string(),
                            network: network.to_string(),
                        })
                    }
                }
            }
        };

        if let Some(xpub) = wallet.xpub.clone() {
            if derivable(network.family()) {
                return self.derive_fresh(&wallet, &xpub, currency, network).await;
            }
        }

        self.static_address(&wallet, currency, network)
    }

    async fn derive_fresh(
        &self,
        wallet: &Wallet,
        xpub: &str,
        currency: Currency,
        network: Network,
    ) -> PaymentResult<String> {
        let index = self.wallets.next_index(wallet.id).await?;

        let derived = match network.family() {
            ChainFamily::Bitcoin => derive_bitcoin_address(xpub, index),
            ChainFamily::Evm => derive_evm_address(xpub, index),
            _ => unreachable!("derivable() gates the family"),
        };

        match derived {
            Ok(address) => {
                info!(wallet_id = %wallet.id, index, "derived fresh receive address");
                Ok(address)
            }
            Err(err) => {
                warn!(
                    wallet_id = %wallet.id, index, error = %err,
                    "address derivation failed, using static address"
                );
                self.static_address(wallet, currency, network)
            }
        }
    }

    fn static_address(
        &self,
        wallet: &Wallet,
        currency: Currency,
        network: Network,
    ) -> PaymentResult<String> {
        wallet
            .address
            .clone()
            .ok_or_else(|| PaymentError::WalletNotConfigured {
                currency: currency.to_string(),
                network: network.to_string(),
            })
    }
}

fn derivable(family: ChainFamily) -> bool {
    matches!(family, ChainFamily::Bitcoin | ChainFamily::Evm)
}

/// BIP84-style receive chain: m/.../0/index under the account xpub, encoded
/// as a P2WPKH address.
fn derive_bitcoin_address(xpub: &str, index: i64) -> Result<String, DerivationError> {
    let index = u32::try_from(index).map_err(|_| DerivationError::IndexRange(index))?;
    let secp = Secp256k1::verification_only();

    let account = Xpub::from_str(xpub)?;
    let child = account.derive_pub(
        &secp,
        &[
            ChildNumber::from_normal_idx(0)?,
            ChildNumber::from_normal_idx(index)?,
        ],
    )?;

    let pk = CompressedPublicKey(child.public_key);
    Ok(BtcAddress::p2wpkh(&pk, BtcNetwork::Bitcoin).to_string())
}

/// Same 0/index receive chain, hashed into a checksummed EVM address.
fn derive_evm_address(xpub: &str, index: i64) -> Result<String, DerivationError> {
    let index = u32::try_from(index).map_err(|_| DerivationError::IndexRange(index))?;
    let secp = Secp256k1::verification_only();

    let account = Xpub::from_str(xpub)?;
    let child = account.derive_pub(
        &secp,
        &[
            ChildNumber::from_normal_idx(0)?,
            ChildNumber::from_normal_idx(index)?,
        ],
    )?;

    let uncompressed = child.public_key.serialize_uncompressed();
    // Drop the 0x04 prefix; the address is the keccak hash's last 20 bytes.
    let hash = keccak256(&uncompressed[1..]);
    Ok(EvmAddress::from_slice(&hash[12..]).to_checksum(None))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::error::DatabaseError;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::sync::Mutex;

    // Standard BIP32 test vector 1 master public key.
    const TEST_XPUB: &str = "xpub661MyMwAqRbcFtXgS5sYJABqqG9YLmC4Q1Rdap9gSE8NqtwybGhePY2gZ29ESFjqJoCu1Rupje8YtGqsefD265TMg7usUDFdp6W1EGMcet8";

    struct MemoryWalletStore {
        wallets: Mutex<Vec<Wallet>>,
        counter: AtomicI64,
    }

    impl MemoryWalletStore {
        fn with(wallets: Vec<Wallet>) -> Self {
            Self {
                wallets: Mutex::new(wallets),
                counter: AtomicI64::new(0),
            }
        }
    }

    #[async_trait]
    impl WalletStore for MemoryWalletStore {
        async fn find_wallet(
            &self,
            vendor_id: Uuid,
            currency: Currency,
            network: Option<Network>,
        ) -> Result<Option<Wallet>, DatabaseError> {
            let wallets = self.wallets.lock().unwrap();
            Ok(wallets
                .iter()
                .find(|w| {
                    w.vendor_id == vendor_id
                        && w.currency == currency.as_str()
                        && network.map(|n| w.network == n.as_str()).unwrap_or(true)
                })
                .cloned())
        }

        async fn next_index(&self, _wallet_id: Uuid) -> Result<i64, DatabaseError> {
            Ok(self.counter.fetch_add(1, Ordering::SeqCst) + 1)
        }
    }

    fn wallet(currency: Currency, network: Network, xpub: Option<&str>) -> Wallet {
        Wallet {
            id: Uuid::new_v4(),
            vendor_id: Uuid::nil(),
            currency: currency.as_str().to_string(),
            network: network.as_str().to_string(),
            address: Some("static-address".to_string()),
            xpub: xpub.map(str::to_string),
            last_index: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn bitcoin_derivation_is_deterministic_and_index_sensitive() {
        let first = derive_bitcoin_address(TEST_XPUB, 1).unwrap();
        let again = derive_bitcoin_address(TEST_XPUB, 1).unwrap();
        let second = derive_bitcoin_address(TEST_XPUB, 2).unwrap();

        assert_eq!(first, again);
        assert_ne!(first, second);
        assert!(first.starts_with("bc1q"));
    }

    #[test]
    fn evm_derivation_produces_checksummed_addresses() {
        let first = derive_evm_address(TEST_XPUB, 1).unwrap();
        let second = derive_evm_address(TEST_XPUB, 2).unwrap();

        assert_ne!(first, second);
        assert!(first.starts_with("0x"));
        assert_eq!(first.len(), 42);
        // Checksummed form mixes case.
        assert_ne!(first, first.to_lowercase());
    }

    #[test]
    fn rejects_garbage_xpub() {
        assert!(derive_bitcoin_address("not-an-xpub", 1).is_err());
        assert!(derive_evm_address("xpub-typo", 1).is_err());
    }

    #[test]
    fn rejects_out_of_range_index() {
        assert!(derive_bitcoin_address(TEST_XPUB, -1).is_err());
        assert!(derive_bitcoin_address(TEST_XPUB, i64::from(u32::MAX) + 1).is_err());
    }

    #[tokio::test]
    async fn concurrent_payments_get_distinct_addresses() {
        let store = Arc::new(MemoryWalletStore::with(vec![wallet(
            Currency::Btc,
            Network::Bitcoin,
            Some(TEST_XPUB),
        )]));
        let service = Arc::new(DerivationService::new(store));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let service = service.clone();
            handles.push(tokio::spawn(async move {
                service
                    .receive_address(Uuid::nil(), Currency::Btc, Network::Bitcoin)
                    .await
                    .unwrap()
            }));
        }

        let mut seen = HashSet::new();
        for handle in handles {
            assert!(seen.insert(handle.await.unwrap()));
        }
        assert_eq!(seen.len(), 8);
    }

    #[tokio::test]
    async fn falls_back_to_same_currency_wallet_on_other_network() {
        let store = Arc::new(MemoryWalletStore::with(vec![wallet(
            Currency::Usdt,
            Network::Erc20,
            None,
        )]));
        let service = DerivationService::new(store);

        let address = service
            .receive_address(Uuid::nil(), Currency::Usdt, Network::Bep20)
            .await
            .unwrap();
        assert_eq!(address, "static-address");
    }

    #[tokio::test]
    async fn missing_wallet_is_an_error() {
        let service = DerivationService::new(Arc::new(MemoryWalletStore::with(vec![])));

        let err = service
            .receive_address(Uuid::nil(), Currency::Sol, Network::Solana)
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::WalletNotConfigured { .. }));
    }

    #[tokio::test]
    async fn solana_wallet_uses_static_address_even_with_xpub() {
        let store = Arc::new(MemoryWalletStore::with(vec![wallet(
            Currency::Sol,
            Network::Solana,
            Some(TEST_XPUB),
        )]));
        let service = DerivationService::new(store);

        let address = service
            .receive_address(Uuid::nil(), Currency::Sol, Network::Solana)
            .await
            .unwrap();
        assert_eq!(address, "static-address");
    }

    #[tokio::test]
    async fn bad_xpub_degrades_to_static_address() {
        let store = Arc::new(MemoryWalletStore::with(vec![wallet(
            Currency::Btc,
            Network::Bitcoin,
            Some("corrupted"),
        )]));
        let service = DerivationService::new(store);

        let address = service
            .receive_address(Uuid::nil(), Currency::Btc, Network::Bitcoin)
            .await
            .unwrap();
        assert_eq!(address, "static-address");
    }
}
