//! Service layer: pricing, address derivation and payment orchestration.

pub mod derivation;
pub mod payment;
pub mod price_oracle;

pub use derivation::DerivationService;
pub use payment::{PaymentEngine, VerificationOutcome};
pub use price_oracle::{BinancePriceFeed, PriceFeed, PriceFeedError, PriceOracle};
