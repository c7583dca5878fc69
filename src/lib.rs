//! Jito Seller - partial token sell through Jito bundles
//!
//! Builds one swap transaction, pairs it with a fresh tip transfer on every
//! attempt and broadcasts the bundle to several block engine regions until
//! one attempt confirms or the attempt budget runs out.

pub mod bundler;
pub mod config;
pub mod metrics;
pub mod observability;
pub mod rpc_manager;
pub mod sell_engine;
pub mod structured_logging;
pub mod tx_builder;
pub mod types;
pub mod wallet;

// Re-export commonly used types
pub use bundler::{BundleError, ConfirmedBundle, RetryDriver};
pub use config::Config;
pub use sell_engine::{SellEngine, SellOutcome};
pub use solana_sdk::{pubkey::Pubkey, signature::Signature};
