//! Error types for the transaction builder
//!
//! Covers everything that can go wrong while producing the two halves of a
//! bundle: the tip transfer and the swap transaction. Errors carry enough
//! context to be logged once and counted by category.

use thiserror::Error;

/// Error type for tip, bundle and swap construction
#[derive(Error, Debug)]
pub enum TransactionBuilderError {
    /// An amount string could not be turned into lamports
    ///
    /// Raised for malformed, negative or over-precise SOL strings
    #[error("Invalid amount '{input}': {reason}")]
    InvalidAmount {
        /// The rejected input
        input: String,
        /// Why it was rejected
        reason: String,
    },

    /// Failed to sign a transaction
    #[error("Signing failed: {0}")]
    Signing(String),

    /// Failed to compile instructions into a v0 message
    #[error("Message compile failed: {0}")]
    MessageCompile(String),

    /// The two bundle halves reference different blockhashes
    #[error("Blockhash mismatch: fee tx uses {fee}, primary tx uses {primary}")]
    BlockhashMismatch {
        /// Blockhash of the tip transaction
        fee: String,
        /// Blockhash of the primary transaction
        primary: String,
    },

    /// No swap route / pool exists for the pair
    #[error("No swap route for {input_mint} -> {output_mint}: {reason}")]
    RouteNotFound {
        input_mint: String,
        output_mint: String,
        reason: String,
    },

    /// The swap API answered with an error or an unexpected shape
    #[error("Swap API error: {0}")]
    SwapApi(String),

    /// Failed to decode or serialize transaction bytes
    #[error("Transaction encoding error: {0}")]
    Decode(String),

    /// Configuration or validation error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl TransactionBuilderError {
    /// True when building the same transaction again may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::SwapApi(_) => true,
            Self::Signing(_) => true,

            Self::InvalidAmount { .. } => false,
            Self::MessageCompile(_) => false,
            Self::BlockhashMismatch { .. } => false,
            Self::RouteNotFound { .. } => false,
            Self::Decode(_) => false,
            Self::Configuration(_) => false,
        }
    }

    /// Get the error category for metrics and observability
    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidAmount { .. } => "amount",
            Self::Signing(_) => "signing",
            Self::MessageCompile(_) => "compile",
            Self::BlockhashMismatch { .. } => "blockhash",
            Self::RouteNotFound { .. } => "route",
            Self::SwapApi(_) => "swap_api",
            Self::Decode(_) => "decode",
            Self::Configuration(_) => "config",
        }
    }
}

// Convenience constructors
impl TransactionBuilderError {
    /// Create an invalid amount error
    pub fn invalid_amount(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidAmount {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Create a swap API error
    pub fn swap_api(reason: impl Into<String>) -> Self {
        Self::SwapApi(reason.into())
    }

    /// Create a decode error
    pub fn decode(reason: impl Into<String>) -> Self {
        Self::Decode(reason.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TransactionBuilderError::invalid_amount("abc", "not a number");
        assert_eq!(err.to_string(), "Invalid amount 'abc': not a number");

        let err = TransactionBuilderError::RouteNotFound {
            input_mint: "MintA".to_string(),
            output_mint: "MintB".to_string(),
            reason: "ROUTE_NOT_FOUND".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "No swap route for MintA -> MintB: ROUTE_NOT_FOUND"
        );
    }

    #[test]
    fn test_only_transient_failures_are_retryable() {
        assert!(TransactionBuilderError::swap_api("503").is_retryable());
        assert!(!TransactionBuilderError::RouteNotFound {
            input_mint: "A".to_string(),
            output_mint: "B".to_string(),
            reason: "ROUTE_NOT_FOUND".to_string(),
        }
        .is_retryable());
        assert!(!TransactionBuilderError::decode("bad base64").is_retryable());
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(
            TransactionBuilderError::invalid_amount("x", "y").category(),
            "amount"
        );
        assert_eq!(
            TransactionBuilderError::MessageCompile("test".to_string()).category(),
            "compile"
        );
        assert_eq!(
            TransactionBuilderError::BlockhashMismatch {
                fee: "a".to_string(),
                primary: "b".to_string()
            }
            .category(),
            "blockhash"
        );
    }
}
