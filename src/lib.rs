//! Multi-chain crypto payment engine: fiat pricing with cache fallback,
//! per-payment address derivation from extended public keys, and on-chain
//! verification of submitted transactions.

pub mod api;
pub mod chains;
pub mod config;
pub mod currency;
pub mod database;
pub mod error;
pub mod models;
pub mod services;

pub use config::AppConfig;
pub use currency::{Currency, Network};
pub use error::{PaymentError, PaymentResult};
pub use services::{DerivationService, PaymentEngine, PriceOracle};
