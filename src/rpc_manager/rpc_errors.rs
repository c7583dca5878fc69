use std::time::Duration;

use solana_client::client_error::{reqwest, ClientError, ClientErrorKind};
use solana_client::rpc_request::RpcError;
use thiserror::Error;
use tokio_retry::strategy::{jitter, ExponentialBackoff};

/// Ledger client error types
#[derive(Debug, Clone, Error)]
pub enum RpcManagerError {
    /// Transport-level errors (network, connection)
    #[error("Transport error: {message} (endpoint: {endpoint})")]
    Transport { endpoint: String, message: String },

    /// Timeout errors
    #[error("Timeout after {timeout_ms}ms (endpoint: {endpoint})")]
    Timeout { endpoint: String, timeout_ms: u64 },

    /// RPC response errors (from the RPC server)
    #[error("RPC response error: {message} (endpoint: {endpoint}, code: {code:?})")]
    RpcResponse {
        endpoint: String,
        message: String,
        code: Option<i64>,
    },

    /// The chain moved past the checkpoint's last valid height before the
    /// signature reached the requested commitment
    #[error("Signature {signature} not confirmed before block height {last_valid_block_height}")]
    BlockHeightExceeded {
        signature: String,
        last_valid_block_height: u64,
    },

    #[error("Rate limit exceeded (endpoint: {endpoint})")]
    RateLimitExceeded { endpoint: String },

    #[error("Account not found: {account} (endpoint: {endpoint})")]
    AccountNotFound { account: String, endpoint: String },

    /// Malformed data returned by the node
    #[error("Validation error: {0}")]
    Validation(String),
}

impl RpcManagerError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            RpcManagerError::Transport { .. } => true,
            RpcManagerError::Timeout { .. } => true,
            RpcManagerError::RateLimitExceeded { .. } => true,

            RpcManagerError::BlockHeightExceeded { .. } => false,
            RpcManagerError::AccountNotFound { .. } => false,
            RpcManagerError::Validation(_) => false,

            // Retry on server errors (5xx)
            RpcManagerError::RpcResponse { code, .. } => {
                matches!(code, Some(c) if (500..600).contains(c))
            }
        }
    }

    /// Create from ClientError with context.
    ///
    /// The error kind decides first; message matching only covers kinds
    /// that carry nothing structured.
    pub fn from_client_error(err: ClientError, endpoint: &str) -> Self {
        match err.kind() {
            ClientErrorKind::Io(e) => RpcManagerError::Transport {
                endpoint: endpoint.to_string(),
                message: e.to_string(),
            },
            ClientErrorKind::Reqwest(e) => Self::from_reqwest(e, endpoint),
            ClientErrorKind::RpcError(RpcError::RpcResponseError { code, message, .. }) => {
                RpcManagerError::RpcResponse {
                    endpoint: endpoint.to_string(),
                    message: message.clone(),
                    code: Some(*code),
                }
            }
            _ => Self::classify(&err.to_string(), endpoint),
        }
    }

    fn from_reqwest(err: &reqwest::Error, endpoint: &str) -> Self {
        if err.is_timeout() {
            return RpcManagerError::Timeout {
                endpoint: endpoint.to_string(),
                timeout_ms: 0,
            };
        }
        if let Some(status) = err.status() {
            return match status.as_u16() {
                429 => RpcManagerError::RateLimitExceeded {
                    endpoint: endpoint.to_string(),
                },
                code => RpcManagerError::RpcResponse {
                    endpoint: endpoint.to_string(),
                    message: err.to_string(),
                    code: Some(i64::from(code)),
                },
            };
        }
        if err.is_connect() || err.is_request() || err.is_body() {
            return RpcManagerError::Transport {
                endpoint: endpoint.to_string(),
                message: err.to_string(),
            };
        }
        Self::classify(&err.to_string(), endpoint)
    }

    /// Classify an error message
    fn classify(message: &str, endpoint: &str) -> Self {
        let err_str = message.to_lowercase();

        if err_str.contains("account not found") || err_str.contains("could not find account") {
            RpcManagerError::AccountNotFound {
                account: "unknown".to_string(),
                endpoint: endpoint.to_string(),
            }
        } else if err_str.contains("rate limit")
            || err_str.contains("too many requests")
            || err_str.contains("429")
        {
            RpcManagerError::RateLimitExceeded {
                endpoint: endpoint.to_string(),
            }
        } else if err_str.contains("timeout") || err_str.contains("timed out") {
            RpcManagerError::Timeout {
                endpoint: endpoint.to_string(),
                timeout_ms: 0,
            }
        } else if err_str.contains("connection") || err_str.contains("dns") {
            RpcManagerError::Transport {
                endpoint: endpoint.to_string(),
                message: message.to_string(),
            }
        } else {
            // Extract error code if available
            let code = err_str
                .split("code:")
                .nth(1)
                .and_then(|s| s.split_whitespace().next())
                .and_then(|s| s.trim_end_matches(',').parse::<i64>().ok());

            RpcManagerError::RpcResponse {
                endpoint: endpoint.to_string(),
                message: message.to_string(),
                code,
            }
        }
    }
}

/// Retry policy for setup-time RPC operations
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of tries, including the first
    pub max_attempts: u32,

    /// Base delay in milliseconds
    pub base_delay_ms: u64,

    /// Maximum delay in milliseconds
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 200,
            max_delay_ms: 2_000,
        }
    }
}

impl RetryPolicy {
    /// Jittered exponential delays between tries, for `tokio_retry::Retry`
    pub fn strategy(&self) -> impl Iterator<Item = Duration> {
        ExponentialBackoff::from_millis(2)
            .factor(self.base_delay_ms.max(2) / 2)
            .max_delay(Duration::from_millis(self.max_delay_ms))
            .map(jitter)
            .take(self.max_attempts.saturating_sub(1) as usize)
    }
}
