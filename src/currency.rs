//! Supported currencies, networks and per-token constants.
//!
//! The verifier registry, the price oracle and the payment manager all key off
//! the `(Currency, Network)` pair defined here. Token contract addresses and
//! decimal precisions are hard-coded rather than queried on-chain.

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Cryptocurrencies the payment engine accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Btc,
    Eth,
    Usdt,
    Usdc,
    Bnb,
    Sol,
}

impl Currency {
    pub const ALL: [Currency; 6] = [
        Currency::Btc,
        Currency::Eth,
        Currency::Usdt,
        Currency::Usdc,
        Currency::Bnb,
        Currency::Sol,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Btc => "BTC",
            Currency::Eth => "ETH",
            Currency::Usdt => "USDT",
            Currency::Usdc => "USDC",
            Currency::Bnb => "BNB",
            Currency::Sol => "SOL",
        }
    }

    /// Binance ticker symbol against the USDT quote asset.
    ///
    /// `None` for the pegged stablecoin itself, which is never fetched.
    pub fn binance_symbol(&self) -> Option<&'static str> {
        match self {
            Currency::Btc => Some("BTCUSDT"),
            Currency::Eth => Some("ETHUSDT"),
            Currency::Bnb => Some("BNBUSDT"),
            Currency::Sol => Some("SOLUSDT"),
            Currency::Usdc => Some("USDCUSDT"),
            Currency::Usdt => None,
        }
    }

    /// Whether this currency is pegged 1:1 to the fiat quote asset.
    pub fn is_pegged(&self) -> bool {
        matches!(self, Currency::Usdt)
    }

    /// Minimum payment amount (dust floor) in currency units.
    pub fn dust_floor(&self) -> BigDecimal {
        let floor = match self {
            Currency::Btc => "0.0001",
            Currency::Eth => "0.001",
            Currency::Usdt => "1",
            Currency::Usdc => "1",
            Currency::Bnb => "0.01",
            Currency::Sol => "0.05",
        };
        // Literals above are all valid decimals.
        BigDecimal::from_str(floor).expect("dust floor literal")
    }

    /// Networks a buyer may pay this currency over.
    pub fn supported_networks(&self) -> &'static [Network] {
        match self {
            Currency::Btc => &[Network::Bitcoin, Network::Lightning],
            Currency::Eth => &[Network::Ethereum, Network::Arbitrum, Network::Optimism],
            Currency::Usdt => &[
                Network::Erc20,
                Network::Trc20,
                Network::Bep20,
                Network::Solana,
            ],
            Currency::Usdc => &[Network::Erc20, Network::Bep20, Network::Solana],
            Currency::Bnb => &[Network::Bsc],
            Currency::Sol => &[Network::Solana],
        }
    }

    pub fn supports_network(&self, network: Network) -> bool {
        self.supported_networks().contains(&network)
    }
}

impl FromStr for Currency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "BTC" => Ok(Currency::Btc),
            "ETH" => Ok(Currency::Eth),
            "USDT" => Ok(Currency::Usdt),
            "USDC" => Ok(Currency::Usdc),
            "BNB" => Ok(Currency::Bnb),
            "SOL" => Ok(Currency::Sol),
            other => Err(format!("unknown currency: {}", other)),
        }
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Networks a payment can settle on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Network {
    Bitcoin,
    Lightning,
    Ethereum,
    Arbitrum,
    Optimism,
    Bsc,
    Erc20,
    Bep20,
    Trc20,
    Solana,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Bitcoin => "Bitcoin",
            Network::Lightning => "Lightning",
            Network::Ethereum => "Ethereum",
            Network::Arbitrum => "Arbitrum",
            Network::Optimism => "Optimism",
            Network::Bsc => "BSC",
            Network::Erc20 => "ERC20",
            Network::Bep20 => "BEP20",
            Network::Trc20 => "TRC20",
            Network::Solana => "Solana",
        }
    }

    /// Chain family used for address derivation and record keeping.
    pub fn family(&self) -> ChainFamily {
        match self {
            Network::Bitcoin | Network::Lightning => ChainFamily::Bitcoin,
            Network::Ethereum
            | Network::Arbitrum
            | Network::Optimism
            | Network::Bsc
            | Network::Erc20
            | Network::Bep20 => ChainFamily::Evm,
            Network::Trc20 => ChainFamily::Tron,
            Network::Solana => ChainFamily::Solana,
        }
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bitcoin" | "btc" => Ok(Network::Bitcoin),
            "lightning" => Ok(Network::Lightning),
            "ethereum" | "eth" => Ok(Network::Ethereum),
            "arbitrum" => Ok(Network::Arbitrum),
            "optimism" => Ok(Network::Optimism),
            "bsc" => Ok(Network::Bsc),
            "erc20" => Ok(Network::Erc20),
            "bep20" => Ok(Network::Bep20),
            "trc20" => Ok(Network::Trc20),
            "solana" | "sol" => Ok(Network::Solana),
            other => Err(format!("unknown network: {}", other)),
        }
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Broad transaction-model families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainFamily {
    Bitcoin,
    Evm,
    Solana,
    Tron,
}

/// A token contract paired with its decimal precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenInfo {
    pub contract: &'static str,
    pub decimals: u32,
}

/// ERC-20 / BEP-20 contract table for stablecoin verification.
///
/// USDC on EVM networks reuses the USDT contract entries: the upstream system
/// never shipped dedicated USDC contracts and guessing addresses here would be
/// worse than the documented approximation.
pub fn evm_token_info(currency: Currency, network: Network) -> Option<TokenInfo> {
    const USDT_ETHEREUM: TokenInfo = TokenInfo {
        contract: "0xdac17f958d2ee523a2206206994597c13d831ec7",
        decimals: 6,
    };
    const USDT_BSC: TokenInfo = TokenInfo {
        contract: "0x55d398326f99059ff775485246999027b3197955",
        decimals: 18,
    };

    match (currency, network) {
        (Currency::Usdt | Currency::Usdc, Network::Erc20) => Some(USDT_ETHEREUM),
        (Currency::Usdt | Currency::Usdc, Network::Bep20) => Some(USDT_BSC),
        _ => None,
    }
}

/// SPL token mint table for Solana stablecoin verification.
pub fn spl_token_mint(currency: Currency) -> Option<TokenInfo> {
    match currency {
        Currency::Usdt => Some(TokenInfo {
            contract: "Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB",
            decimals: 6,
        }),
        Currency::Usdc => Some(TokenInfo {
            contract: "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v",
            decimals: 6,
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn currency_roundtrip() {
        for currency in Currency::ALL {
            assert_eq!(Currency::from_str(currency.as_str()).unwrap(), currency);
        }
        assert_eq!(Currency::from_str("btc").unwrap(), Currency::Btc);
        assert!(Currency::from_str("DOGE").is_err());
    }

    #[test]
    fn network_roundtrip() {
        assert_eq!(Network::from_str("BSC").unwrap(), Network::Bsc);
        assert_eq!(Network::from_str("erc20").unwrap(), Network::Erc20);
        assert_eq!(Network::from_str("Solana").unwrap(), Network::Solana);
        assert!(Network::from_str("tron-mainnet").is_err());
    }

    #[test]
    fn supported_networks() {
        assert!(Currency::Btc.supports_network(Network::Bitcoin));
        assert!(Currency::Usdt.supports_network(Network::Solana));
        assert!(!Currency::Btc.supports_network(Network::Solana));
        assert!(!Currency::Sol.supports_network(Network::Ethereum));
    }

    #[test]
    fn dust_floors() {
        assert_eq!(Currency::Btc.dust_floor(), BigDecimal::from_str("0.0001").unwrap());
        assert_eq!(Currency::Usdt.dust_floor(), BigDecimal::from(1));
    }

    #[test]
    fn pegged_currency_has_no_symbol() {
        assert!(Currency::Usdt.is_pegged());
        assert!(Currency::Usdt.binance_symbol().is_none());
        assert_eq!(Currency::Btc.binance_symbol(), Some("BTCUSDT"));
    }

    #[test]
    fn token_tables() {
        let usdt_eth = evm_token_info(Currency::Usdt, Network::Erc20).unwrap();
        assert_eq!(usdt_eth.decimals, 6);
        let usdt_bsc = evm_token_info(Currency::Usdt, Network::Bep20).unwrap();
        assert_eq!(usdt_bsc.decimals, 18);
        // USDC reuses the USDT contracts on EVM networks.
        assert_eq!(
            evm_token_info(Currency::Usdc, Network::Erc20).unwrap().contract,
            usdt_eth.contract
        );
        assert!(evm_token_info(Currency::Eth, Network::Ethereum).is_none());
        assert!(spl_token_mint(Currency::Usdc).is_some());
        assert!(spl_token_mint(Currency::Sol).is_none());
    }

    #[test]
    fn network_families() {
        assert_eq!(Network::Erc20.family(), ChainFamily::Evm);
        assert_eq!(Network::Bsc.family(), ChainFamily::Evm);
        assert_eq!(Network::Bitcoin.family(), ChainFamily::Bitcoin);
        assert_eq!(Network::Solana.family(), ChainFamily::Solana);
    }
}
