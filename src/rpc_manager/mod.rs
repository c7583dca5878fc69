//! RPC Manager Module
//!
//! Ledger access used by the seller: recency checkpoints, block height,
//! signature confirmation and token balances.

use async_trait::async_trait;
use solana_sdk::{pubkey::Pubkey, signature::Signature, transaction::TransactionError};

use crate::types::{RecencyCheckpoint, TokenBalance};

// Submodules
pub mod rpc_client;
pub mod rpc_errors;

// Re-exports for convenience
pub use rpc_client::SolanaLedgerClient;
pub use rpc_errors::{RetryPolicy, RpcManagerError};

/// Read-side access to the ledger
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Latest blockhash and the last block height it stays valid for
    async fn latest_checkpoint(&self) -> Result<RecencyCheckpoint, RpcManagerError>;

    /// Current block height
    async fn block_height(&self) -> Result<u64, RpcManagerError>;

    /// Wait until `signature` reaches the configured commitment.
    ///
    /// `Ok(None)` means it landed without error, `Ok(Some(err))` means it
    /// landed and failed, `Err(BlockHeightExceeded)` means the checkpoint
    /// expired first.
    async fn confirm_transaction(
        &self,
        signature: &Signature,
        checkpoint: &RecencyCheckpoint,
    ) -> Result<Option<TransactionError>, RpcManagerError>;

    /// Balance of `owner`'s token account for `mint`, `None` when no
    /// account exists
    async fn token_balance(
        &self,
        owner: &Pubkey,
        mint: &Pubkey,
    ) -> Result<Option<TokenBalance>, RpcManagerError>;
}
