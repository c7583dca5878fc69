//! Swap transaction producer and sell sizing
//!
//! The swap itself is opaque to the bundler: a producer hands back one
//! signed `VersionedTransaction` pinned to the run's checkpoint. The default
//! producer asks the Raydium trade API for a serialized swap and re-signs it
//! locally.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use solana_sdk::{
    message::VersionedMessage,
    pubkey::Pubkey,
    signature::{Keypair, Signer},
    transaction::VersionedTransaction,
};
use tracing::{debug, info, warn};

use super::errors::TransactionBuilderError;
use crate::types::RecencyCheckpoint;

/// Lowest share of the balance a run will ever sell, in percent
pub const SELL_PERCENT_FLOOR: u8 = 60;

/// Wrapped SOL mint
pub const WSOL_MINT: &str = "So11111111111111111111111111111111111111112";

/// Default Raydium trade API host
pub const RAYDIUM_TRADE_API: &str = "https://transaction-v1.raydium.io";

/// Percent actually sold for a configured percent.
///
/// Configured values below 60 are raised to 60.
pub fn effective_sell_percent(configured_percent: u8) -> u8 {
    configured_percent.max(SELL_PERCENT_FLOOR)
}

/// Amount to sell in base units: `balance * max(60, percent) / 100`, floored.
pub fn compute_sell_amount(balance: u64, configured_percent: u8) -> u64 {
    let pct = effective_sell_percent(configured_percent) as u128;
    ((balance as u128 * pct) / 100).min(u64::MAX as u128) as u64
}

/// Everything a producer needs to build one exact-in sell
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SellRequest {
    pub input_mint: Pubkey,
    pub output_mint: Pubkey,
    /// Exact input in base units
    pub amount: u64,
    pub slippage_bps: u16,
    pub compute_unit_price_micro_lamports: u64,
    /// Token account holding the input mint
    pub input_account: Option<Pubkey>,
}

/// Builds the primary (swap) transaction of a bundle
#[async_trait]
pub trait SwapProducer: Send + Sync {
    /// Return a swap transaction signed by `payer` using `checkpoint`'s blockhash
    async fn build_sell_transaction(
        &self,
        request: &SellRequest,
        payer: &Keypair,
        checkpoint: &RecencyCheckpoint,
    ) -> Result<VersionedTransaction, TransactionBuilderError>;
}

/// Re-sign `tx` with `payer` after pinning it to `checkpoint`.
///
/// Only single-signer transactions paid by `payer` can be re-signed.
pub fn resign_with_checkpoint(
    tx: &VersionedTransaction,
    payer: &Keypair,
    checkpoint: &RecencyCheckpoint,
) -> Result<VersionedTransaction, TransactionBuilderError> {
    let mut message: VersionedMessage = tx.message.clone();

    let fee_payer = message.static_account_keys().first().copied();
    if fee_payer != Some(payer.pubkey()) {
        return Err(TransactionBuilderError::Configuration(format!(
            "swap transaction fee payer {:?} is not the wallet {}",
            fee_payer,
            payer.pubkey()
        )));
    }
    if message.header().num_required_signatures != 1 {
        return Err(TransactionBuilderError::Configuration(format!(
            "swap transaction needs {} signers, only the wallet can sign",
            message.header().num_required_signatures
        )));
    }

    message.set_recent_blockhash(checkpoint.blockhash);
    VersionedTransaction::try_new(message, &[payer])
        .map_err(|e| TransactionBuilderError::Signing(e.to_string()))
}

#[derive(Debug, Deserialize)]
struct ComputeResponse {
    success: bool,
    #[serde(default)]
    msg: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SwapTransactionRequest<'a> {
    compute_unit_price_micro_lamports: String,
    swap_response: &'a serde_json::Value,
    tx_version: &'static str,
    wallet: String,
    wrap_sol: bool,
    unwrap_sol: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    input_account: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SwapTransactionResponse {
    success: bool,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    data: Vec<SerializedTransaction>,
}

#[derive(Debug, Deserialize)]
struct SerializedTransaction {
    transaction: String,
}

/// Producer backed by the Raydium trade API
#[derive(Debug, Clone)]
pub struct RaydiumSwapProducer {
    http: Client,
    base_url: String,
}

impl RaydiumSwapProducer {
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, TransactionBuilderError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransactionBuilderError::Configuration(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn compute_route(
        &self,
        request: &SellRequest,
    ) -> Result<serde_json::Value, TransactionBuilderError> {
        let url = format!("{}/compute/swap-base-in", self.base_url);
        let resp = self
            .http
            .get(&url)
            .query(&[
                ("inputMint", request.input_mint.to_string()),
                ("outputMint", request.output_mint.to_string()),
                ("amount", request.amount.to_string()),
                ("slippageBps", request.slippage_bps.to_string()),
                ("txVersion", "V0".to_string()),
            ])
            .send()
            .await
            .map_err(|e| TransactionBuilderError::swap_api(format!("compute request: {}", e)))?;

        if !resp.status().is_success() {
            return Err(TransactionBuilderError::swap_api(format!(
                "compute returned HTTP {}",
                resp.status()
            )));
        }

        let raw: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| TransactionBuilderError::swap_api(format!("compute JSON: {}", e)))?;
        let parsed: ComputeResponse = serde_json::from_value(raw.clone())
            .map_err(|e| TransactionBuilderError::swap_api(format!("compute shape: {}", e)))?;

        if !parsed.success {
            return Err(TransactionBuilderError::RouteNotFound {
                input_mint: request.input_mint.to_string(),
                output_mint: request.output_mint.to_string(),
                reason: parsed.msg.unwrap_or_else(|| "unknown".to_string()),
            });
        }
        Ok(raw)
    }
}

#[async_trait]
impl SwapProducer for RaydiumSwapProducer {
    async fn build_sell_transaction(
        &self,
        request: &SellRequest,
        payer: &Keypair,
        checkpoint: &RecencyCheckpoint,
    ) -> Result<VersionedTransaction, TransactionBuilderError> {
        let route = self.compute_route(request).await?;
        debug!(input_mint = %request.input_mint, amount = request.amount, "Swap route computed");

        let body = SwapTransactionRequest {
            compute_unit_price_micro_lamports: request
                .compute_unit_price_micro_lamports
                .to_string(),
            swap_response: &route,
            tx_version: "V0",
            wallet: payer.pubkey().to_string(),
            wrap_sol: request.input_mint.to_string() == WSOL_MINT,
            unwrap_sol: request.output_mint.to_string() == WSOL_MINT,
            input_account: request.input_account.map(|a| a.to_string()),
        };

        let url = format!("{}/transaction/swap-base-in", self.base_url);
        let resp = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| TransactionBuilderError::swap_api(format!("transaction request: {}", e)))?;

        if !resp.status().is_success() {
            return Err(TransactionBuilderError::swap_api(format!(
                "transaction returned HTTP {}",
                resp.status()
            )));
        }

        let parsed: SwapTransactionResponse = resp
            .json()
            .await
            .map_err(|e| TransactionBuilderError::swap_api(format!("transaction JSON: {}", e)))?;

        if !parsed.success {
            return Err(TransactionBuilderError::swap_api(
                parsed.msg.unwrap_or_else(|| "transaction build rejected".to_string()),
            ));
        }

        let serialized = match parsed.data.as_slice() {
            [single] => &single.transaction,
            [] => return Err(TransactionBuilderError::swap_api("no transaction returned")),
            many => {
                warn!(count = many.len(), "Swap API returned more than one transaction");
                return Err(TransactionBuilderError::swap_api(format!(
                    "expected 1 transaction, got {}",
                    many.len()
                )));
            }
        };

        let bytes = base64::engine::general_purpose::STANDARD
            .decode(serialized)
            .map_err(|e| TransactionBuilderError::decode(e.to_string()))?;
        let unsigned: VersionedTransaction = bincode::deserialize(&bytes)
            .map_err(|e| TransactionBuilderError::decode(e.to_string()))?;

        let tx = resign_with_checkpoint(&unsigned, payer, checkpoint)?;
        info!(
            signature = %tx.signatures[0],
            blockhash = %checkpoint.blockhash,
            "Sell transaction built"
        );
        Ok(tx)
    }
}
