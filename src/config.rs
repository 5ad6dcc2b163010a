//! Application configuration module
//! Handles environment variable loading, configuration validation, and application settings

use std::env;

/// Main application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub price_feed: PriceFeedConfig,
    pub payment: PaymentConfig,
    pub chains: ChainsConfig,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connection_timeout: u64,   // seconds
    pub idle_timeout: Option<u64>, // seconds
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log format options
#[derive(Debug, Clone)]
pub enum LogFormat {
    Json,
    Plain,
}

/// Price feed configuration (Binance public ticker API)
#[derive(Debug, Clone)]
pub struct PriceFeedConfig {
    pub base_url: String,
    pub request_timeout: u64, // seconds
}

/// Payment policy configuration
#[derive(Debug, Clone)]
pub struct PaymentConfig {
    /// Minutes until a pending payment expires.
    pub timeout_minutes: i64,
}

/// Per-chain endpoints and confirmation thresholds
#[derive(Debug, Clone)]
pub struct ChainsConfig {
    pub ethereum: EvmChainConfig,
    pub bsc: EvmChainConfig,
    pub bitcoin: BitcoinChainConfig,
    pub solana: SolanaChainConfig,
}

#[derive(Debug, Clone)]
pub struct EvmChainConfig {
    pub rpc_url: String,
    pub required_confirmations: u64,
    pub request_timeout: u64, // seconds
}

#[derive(Debug, Clone)]
pub struct BitcoinChainConfig {
    /// Esplora-style block explorer API base URL.
    pub api_url: String,
    pub required_confirmations: u64,
    pub request_timeout: u64, // seconds
}

#[derive(Debug, Clone)]
pub struct SolanaChainConfig {
    pub rpc_url: String,
    pub required_confirmations: u64,
    pub request_timeout: u64, // seconds
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        let _ = dotenv::dotenv().ok();

        Ok(AppConfig {
            server: ServerConfig::from_env()?,
            database: DatabaseConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
            price_feed: PriceFeedConfig::from_env()?,
            payment: PaymentConfig::from_env()?,
            chains: ChainsConfig::from_env()?,
        })
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.database.validate()?;
        self.logging.validate()?;
        self.price_feed.validate()?;
        self.payment.validate()?;
        self.chains.validate()?;

        Ok(())
    }
}

fn env_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T: std::str::FromStr>(name: &str, default: &str) -> Result<T, ConfigError> {
    env_or(name, default)
        .parse()
        .map_err(|_| ConfigError::InvalidValue(name.to_string()))
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(ServerConfig {
            host: env_or("SERVER_HOST", "127.0.0.1"),
            port: parse_env("SERVER_PORT", "8000")?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidValue(
                "SERVER_PORT cannot be 0".to_string(),
            ));
        }

        if self.host.is_empty() {
            return Err(ConfigError::InvalidValue(
                "SERVER_HOST cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

impl DatabaseConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(DatabaseConfig {
            url: env::var("DATABASE_URL")
                .map_err(|_| ConfigError::MissingVariable("DATABASE_URL".to_string()))?,
            max_connections: parse_env("DB_MAX_CONNECTIONS", "20")?,
            min_connections: parse_env("DB_MIN_CONNECTIONS", "5")?,
            connection_timeout: parse_env("DB_CONNECTION_TIMEOUT", "30")?,
            idle_timeout: env::var("DB_IDLE_TIMEOUT")
                .ok()
                .and_then(|val| val.parse().ok()),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.is_empty() {
            return Err(ConfigError::InvalidValue("DATABASE_URL".to_string()));
        }

        if self.max_connections == 0 {
            return Err(ConfigError::InvalidValue("DB_MAX_CONNECTIONS".to_string()));
        }

        if self.min_connections > self.max_connections {
            return Err(ConfigError::InvalidValue(
                "DB_MIN_CONNECTIONS must be <= DB_MAX_CONNECTIONS".to_string(),
            ));
        }

        Ok(())
    }
}

impl LoggingConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(LoggingConfig {
            level: env_or("LOG_LEVEL", "INFO"),
            format: match env_or("LOG_FORMAT", "plain").as_str() {
                "json" => LogFormat::Json,
                _ => LogFormat::Plain,
            },
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_levels = ["TRACE", "DEBUG", "INFO", "WARN", "ERROR"];
        if !valid_levels.contains(&self.level.to_uppercase().as_str()) {
            return Err(ConfigError::InvalidValue("LOG_LEVEL".to_string()));
        }

        Ok(())
    }
}

impl PriceFeedConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(PriceFeedConfig {
            base_url: env_or("PRICE_FEED_URL", "https://api.binance.com/api/v3"),
            request_timeout: parse_env("PRICE_FEED_TIMEOUT", "10")?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_http_url("PRICE_FEED_URL", &self.base_url)?;
        if self.request_timeout == 0 {
            return Err(ConfigError::InvalidValue("PRICE_FEED_TIMEOUT".to_string()));
        }
        Ok(())
    }
}

impl PaymentConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(PaymentConfig {
            timeout_minutes: parse_env("PAYMENT_TIMEOUT_MINUTES", "30")?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_minutes <= 0 {
            return Err(ConfigError::InvalidValue(
                "PAYMENT_TIMEOUT_MINUTES must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl ChainsConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(ChainsConfig {
            ethereum: EvmChainConfig {
                rpc_url: env_or("ETH_RPC_URL", "https://eth.llamarpc.com"),
                required_confirmations: parse_env("REQUIRED_CONFIRMATIONS_ETH", "12")?,
                request_timeout: parse_env("CHAIN_REQUEST_TIMEOUT", "15")?,
            },
            bsc: EvmChainConfig {
                rpc_url: env_or("BSC_RPC_URL", "https://bsc-dataseed.binance.org"),
                required_confirmations: parse_env("REQUIRED_CONFIRMATIONS_BSC", "20")?,
                request_timeout: parse_env("CHAIN_REQUEST_TIMEOUT", "15")?,
            },
            bitcoin: BitcoinChainConfig {
                api_url: env_or("BTC_API_URL", "https://blockstream.info/api"),
                required_confirmations: parse_env("REQUIRED_CONFIRMATIONS_BTC", "3")?,
                request_timeout: parse_env("CHAIN_REQUEST_TIMEOUT", "15")?,
            },
            solana: SolanaChainConfig {
                rpc_url: env_or("SOL_RPC_URL", "https://api.mainnet-beta.solana.com"),
                required_confirmations: parse_env("REQUIRED_CONFIRMATIONS_SOL", "32")?,
                request_timeout: parse_env("CHAIN_REQUEST_TIMEOUT", "15")?,
            },
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_http_url("ETH_RPC_URL", &self.ethereum.rpc_url)?;
        validate_http_url("BSC_RPC_URL", &self.bsc.rpc_url)?;
        validate_http_url("BTC_API_URL", &self.bitcoin.api_url)?;
        validate_http_url("SOL_RPC_URL", &self.solana.rpc_url)?;

        for (name, confirmations) in [
            ("REQUIRED_CONFIRMATIONS_ETH", self.ethereum.required_confirmations),
            ("REQUIRED_CONFIRMATIONS_BSC", self.bsc.required_confirmations),
            ("REQUIRED_CONFIRMATIONS_BTC", self.bitcoin.required_confirmations),
            ("REQUIRED_CONFIRMATIONS_SOL", self.solana.required_confirmations),
        ] {
            if confirmations == 0 {
                return Err(ConfigError::InvalidValue(format!(
                    "{} must be at least 1",
                    name
                )));
            }
        }

        Ok(())
    }
}

fn validate_http_url(name: &str, url: &str) -> Result<(), ConfigError> {
    if url.is_empty() {
        return Err(ConfigError::InvalidValue(name.to_string()));
    }
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ConfigError::InvalidValue(format!(
            "{} must be a valid URL",
            name
        )));
    }
    Ok(())
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),

    #[error("Invalid value for configuration: {0}")]
    InvalidValue(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_validation() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8000,
        };

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_port_validation() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0, // Invalid port
        };

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_payment_timeout_must_be_positive() {
        let config = PaymentConfig { timeout_minutes: 0 };
        assert!(config.validate().is_err());

        let config = PaymentConfig { timeout_minutes: 30 };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_chain_url_validation() {
        let mut chains = ChainsConfig {
            ethereum: EvmChainConfig {
                rpc_url: "https://eth.llamarpc.com".to_string(),
                required_confirmations: 12,
                request_timeout: 15,
            },
            bsc: EvmChainConfig {
                rpc_url: "https://bsc-dataseed.binance.org".to_string(),
                required_confirmations: 20,
                request_timeout: 15,
            },
            bitcoin: BitcoinChainConfig {
                api_url: "https://blockstream.info/api".to_string(),
                required_confirmations: 3,
                request_timeout: 15,
            },
            solana: SolanaChainConfig {
                rpc_url: "https://api.mainnet-beta.solana.com".to_string(),
                required_confirmations: 32,
                request_timeout: 15,
            },
        };
        assert!(chains.validate().is_ok());

        chains.bitcoin.api_url = "blockstream.info".to_string();
        assert!(chains.validate().is_err());

        chains.bitcoin.api_url = "https://blockstream.info/api".to_string();
        chains.ethereum.required_confirmations = 0;
        assert!(chains.validate().is_err());
    }
}
