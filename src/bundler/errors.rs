//! Bundle submission error taxonomy
//!
//! Only [`BundleError::RetryExhausted`] ends a run unsuccessfully. Every other
//! variant describes why a single attempt did not land and is absorbed by the
//! driver.

use thiserror::Error;

use super::broadcaster::RelayFailure;
use crate::rpc_manager::RpcManagerError;
use crate::tx_builder::TransactionBuilderError;

#[derive(Error, Debug)]
pub enum BundleError {
    /// Tip or bundle construction failed
    #[error("Bundle build failed: {0}")]
    Build(#[from] TransactionBuilderError),

    /// One relay endpoint was unreachable or answered with a non-2xx status
    #[error("Relay transport error (endpoint: {endpoint}): {message}")]
    Transport { endpoint: String, message: String },

    /// No relay accepted the attempt
    #[error("No relay accepted attempt {attempt} ({} failures)", .failures.len())]
    NoAcceptance {
        attempt: u32,
        failures: Vec<RelayFailure>,
    },

    /// The ledger never reported the signature before the checkpoint expired
    #[error("Confirmation timed out for {signature}")]
    ConfirmationTimeout { signature: String },

    /// The tip transaction landed but failed on-chain
    #[error("Transaction {signature} failed on-chain: {reason}")]
    TransactionFailed { signature: String, reason: String },

    /// Ledger query failed
    #[error("Ledger error: {0}")]
    Ledger(#[from] RpcManagerError),

    /// Relay set unusable before any attempt
    #[error("Bundler configuration error: {0}")]
    Configuration(String),

    /// All attempts used without a confirmation
    #[error("Retry budget exhausted after {attempts} attempts")]
    RetryExhausted { attempts: u32 },
}

impl BundleError {
    /// Get the error category for metrics and observability
    pub fn category(&self) -> &'static str {
        match self {
            Self::Build(inner) => inner.category(),
            Self::Transport { .. } => "transport",
            Self::NoAcceptance { .. } => "no_acceptance",
            Self::ConfirmationTimeout { .. } => "confirmation_timeout",
            Self::TransactionFailed { .. } => "transaction_failed",
            Self::Ledger(_) => "ledger",
            Self::Configuration(_) => "config",
            Self::RetryExhausted { .. } => "exhausted",
        }
    }
}
