//! Chain verifiers and the registry that dispatches to them.

pub mod bitcoin;
pub mod evm;
pub mod registry;
pub mod solana;
pub mod verifier;

pub use bitcoin::BitcoinVerifier;
pub use evm::{Erc20Verifier, EvmVerifier};
pub use registry::VerifierRegistry;
pub use solana::SolanaVerifier;
pub use verifier::{ChainError, ChainVerifier, TransferCheck};
