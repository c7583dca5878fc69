//! Solana JSON-RPC implementation of [`LedgerClient`]

use std::{str::FromStr, sync::Arc, time::Duration};

use async_trait::async_trait;
use solana_client::{nonblocking::rpc_client::RpcClient, rpc_request::TokenAccountsFilter};
use solana_sdk::{
    commitment_config::CommitmentConfig, pubkey::Pubkey, signature::Signature,
    transaction::TransactionError,
};
use tokio::time::sleep;
use tracing::{debug, warn};

use super::{LedgerClient, RpcManagerError};
use crate::types::{RecencyCheckpoint, TokenBalance};

/// Default interval between `getSignatureStatuses` polls
pub const DEFAULT_CONFIRM_POLL_INTERVAL: Duration = Duration::from_millis(400);

pub struct SolanaLedgerClient {
    client: Arc<RpcClient>,
    endpoint: String,
    commitment: CommitmentConfig,
    poll_interval: Duration,
}

impl std::fmt::Debug for SolanaLedgerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SolanaLedgerClient")
            .field("endpoint", &self.endpoint)
            .field("commitment", &self.commitment.commitment)
            .finish()
    }
}

impl SolanaLedgerClient {
    pub fn new(
        endpoint: impl Into<String>,
        timeout: Duration,
        commitment: CommitmentConfig,
    ) -> Self {
        let endpoint = endpoint.into();
        let client =
            RpcClient::new_with_timeout_and_commitment(endpoint.clone(), timeout, commitment);
        Self {
            client: Arc::new(client),
            endpoint,
            commitment,
            poll_interval: DEFAULT_CONFIRM_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn map_err(&self, err: solana_client::client_error::ClientError) -> RpcManagerError {
        RpcManagerError::from_client_error(err, &self.endpoint)
    }
}

#[async_trait]
impl LedgerClient for SolanaLedgerClient {
    async fn latest_checkpoint(&self) -> Result<RecencyCheckpoint, RpcManagerError> {
        let (blockhash, last_valid_block_height) = self
            .client
            .get_latest_blockhash_with_commitment(self.commitment)
            .await
            .map_err(|e| self.map_err(e))?;
        Ok(RecencyCheckpoint::new(blockhash, last_valid_block_height))
    }

    async fn block_height(&self) -> Result<u64, RpcManagerError> {
        self.client
            .get_block_height_with_commitment(self.commitment)
            .await
            .map_err(|e| self.map_err(e))
    }

    async fn confirm_transaction(
        &self,
        signature: &Signature,
        checkpoint: &RecencyCheckpoint,
    ) -> Result<Option<TransactionError>, RpcManagerError> {
        loop {
            match self.client.get_signature_statuses(&[*signature]).await {
                Ok(response) => {
                    if let Some(Some(status)) = response.value.into_iter().next() {
                        if status.satisfies_commitment(self.commitment) {
                            debug!(%signature, slot = status.slot, "Signature reached commitment");
                            return Ok(status.err);
                        }
                    }
                }
                Err(e) => {
                    let err = self.map_err(e);
                    if !err.is_retryable() {
                        return Err(err);
                    }
                    warn!(%signature, error = %err, "Signature status poll failed, retrying");
                }
            }

            match self.block_height().await {
                Ok(height) if height > checkpoint.last_valid_block_height => {
                    return Err(RpcManagerError::BlockHeightExceeded {
                        signature: signature.to_string(),
                        last_valid_block_height: checkpoint.last_valid_block_height,
                    });
                }
                Ok(_) => {}
                Err(e) if e.is_retryable() => {
                    warn!(%signature, error = %e, "Block height poll failed, retrying");
                }
                Err(e) => return Err(e),
            }

            sleep(self.poll_interval).await;
        }
    }

    async fn token_balance(
        &self,
        owner: &Pubkey,
        mint: &Pubkey,
    ) -> Result<Option<TokenBalance>, RpcManagerError> {
        let accounts = self
            .client
            .get_token_accounts_by_owner(owner, TokenAccountsFilter::Mint(*mint))
            .await
            .map_err(|e| self.map_err(e))?;

        let Some(keyed) = accounts.first() else {
            debug!(%owner, %mint, "No token account for mint");
            return Ok(None);
        };

        let account = Pubkey::from_str(&keyed.pubkey).map_err(|e| {
            RpcManagerError::Validation(format!("bad token account '{}': {}", keyed.pubkey, e))
        })?;

        let amount = self
            .client
            .get_token_account_balance(&account)
            .await
            .map_err(|e| self.map_err(e))?;

        let raw = amount.amount.parse::<u64>().map_err(|e| {
            RpcManagerError::Validation(format!("bad token amount '{}': {}", amount.amount, e))
        })?;

        Ok(Some(TokenBalance {
            account,
            raw,
            decimals: amount.decimals,
        }))
    }
}
