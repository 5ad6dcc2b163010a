//! Verifier registry keyed by `(Currency, Network)`.
//!
//! Dispatch happens through the registry, so adding a chain means registering
//! a verifier rather than editing the orchestrator. Pairs with no entry are
//! simply unsupported for verification.

use crate::chains::bitcoin::BitcoinVerifier;
use crate::chains::evm::{Erc20Verifier, EvmVerifier};
use crate::chains::solana::SolanaVerifier;
use crate::chains::verifier::ChainVerifier;
use crate::config::ChainsConfig;
use crate::currency::{evm_token_info, Currency, Network};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
pub struct VerifierRegistry {
    verifiers: HashMap<(Currency, Network), Arc<dyn ChainVerifier>>,
}

impl VerifierRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        currency: Currency,
        network: Network,
        verifier: Arc<dyn ChainVerifier>,
    ) {
        self.verifiers.insert((currency, network), verifier);
    }

    pub fn get(&self, currency: Currency, network: Network) -> Option<Arc<dyn ChainVerifier>> {
        self.verifiers.get(&(currency, network)).cloned()
    }

    /// Build the production registry from chain configuration.
    ///
    /// Lightning, the EVM rollups and TRC-20 have no verifier yet and are
    /// left unregistered.
    pub fn from_config(config: &ChainsConfig) -> Self {
        let mut registry = Self::new();

        registry.register(
            Currency::Btc,
            Network::Bitcoin,
            Arc::new(BitcoinVerifier::new(&config.bitcoin)),
        );

        registry.register(
            Currency::Eth,
            Network::Ethereum,
            Arc::new(EvmVerifier::new("ethereum", &config.ethereum)),
        );
        registry.register(
            Currency::Bnb,
            Network::Bsc,
            Arc::new(EvmVerifier::new("bsc", &config.bsc)),
        );

        for currency in [Currency::Usdt, Currency::Usdc] {
            if let Some(token) = evm_token_info(currency, Network::Erc20) {
                registry.register(
                    currency,
                    Network::Erc20,
                    Arc::new(Erc20Verifier::new("ethereum", token, &config.ethereum)),
                );
            }
            if let Some(token) = evm_token_info(currency, Network::Bep20) {
                registry.register(
                    currency,
                    Network::Bep20,
                    Arc::new(Erc20Verifier::new("bsc", token, &config.bsc)),
                );
            }
        }

        let solana: Arc<dyn ChainVerifier> = Arc::new(SolanaVerifier::new(&config.solana));
        registry.register(Currency::Sol, Network::Solana, solana.clone());
        registry.register(Currency::Usdt, Network::Solana, solana.clone());
        registry.register(Currency::Usdc, Network::Solana, solana);

        registry
    }
}
