//! Sell engine
//!
//! One run: read the balance, size the sell, fetch a checkpoint, build the
//! swap once, then hand it to the retry driver. Everything before the driver
//! is fatal on error; everything inside it is absorbed per attempt.

use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use solana_sdk::{pubkey::Pubkey, signature::Signature, transaction::VersionedTransaction};
use tokio_retry::RetryIf;
use tracing::{info, warn};

use crate::bundler::{BundleBroadcaster, ConfirmedBundle, DriverConfig, RetryDriver};
use crate::observability::TraceContext;
use crate::rpc_manager::{LedgerClient, RetryPolicy, RpcManagerError};
use crate::structured_logging::StructuredLogger;
use crate::tx_builder::{
    build_fee_transaction, compute_sell_amount, effective_sell_percent, Bundle, SellRequest,
    SwapProducer, TipAccountPool, TransactionBuilderError,
};
use crate::types::{Mode, RecencyCheckpoint, TokenBalance};
use crate::wallet::WalletManager;

/// What to sell, fixed for a run
#[derive(Debug, Clone)]
pub struct SellSettings {
    pub token_mint: Pubkey,
    pub output_mint: Pubkey,
    pub sell_percent: u8,
    pub slippage_bps: u16,
    pub priority_fee_micro_lamports: u64,
    pub explorer_tx_url: String,
}

/// Balance and sizing decided before the loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SellPlan {
    pub token_account: Pubkey,
    pub balance: u64,
    pub configured_percent: u8,
    pub effective_percent: u8,
    pub amount: u64,
}

impl SellPlan {
    pub fn new(balance: &TokenBalance, configured_percent: u8) -> Self {
        Self {
            token_account: balance.account,
            balance: balance.raw,
            configured_percent,
            effective_percent: effective_sell_percent(configured_percent),
            amount: compute_sell_amount(balance.raw, configured_percent),
        }
    }
}

/// How a run ended
#[derive(Debug, Clone)]
pub enum SellOutcome {
    /// Bundle built and encoded but never broadcast
    DryRun { plan: SellPlan, fee_signature: Signature },
    Confirmed {
        plan: SellPlan,
        bundle: ConfirmedBundle,
        explorer_url: String,
    },
}

/// Explorer link for a confirmed signature
pub fn explorer_link(prefix: &str, signature: &Signature) -> String {
    format!("{}/{}", prefix.trim_end_matches('/'), signature)
}

pub struct SellEngine {
    ledger: Arc<dyn LedgerClient>,
    producer: Arc<dyn SwapProducer>,
    broadcaster: Arc<dyn BundleBroadcaster>,
    wallet: WalletManager,
    tip_pool: TipAccountPool,
    settings: SellSettings,
    driver_config: DriverConfig,
    retry: RetryPolicy,
    mode: Mode,
}

impl SellEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        producer: Arc<dyn SwapProducer>,
        broadcaster: Arc<dyn BundleBroadcaster>,
        wallet: WalletManager,
        tip_pool: TipAccountPool,
        settings: SellSettings,
        driver_config: DriverConfig,
        mode: Mode,
    ) -> Self {
        Self {
            ledger,
            producer,
            broadcaster,
            wallet,
            tip_pool,
            settings,
            driver_config,
            retry: RetryPolicy::default(),
            mode,
        }
    }

    /// Replace the retry policy used for setup-time ledger reads
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Execute one sell run
    pub async fn run(&self) -> Result<SellOutcome> {
        let logger = StructuredLogger::from_trace(TraceContext::new("sell_run"));
        info!(
            trace_id = %logger.trace().trace_id,
            wallet = %self.wallet.pubkey(),
            mint = %self.settings.token_mint,
            mode = ?self.mode,
            "Starting sell run"
        );

        let plan = self.plan(&logger).await?;
        let checkpoint = self.fetch_checkpoint().await?;

        let request = SellRequest {
            input_mint: self.settings.token_mint,
            output_mint: self.settings.output_mint,
            amount: plan.amount,
            slippage_bps: self.settings.slippage_bps,
            compute_unit_price_micro_lamports: self.settings.priority_fee_micro_lamports,
            input_account: Some(plan.token_account),
        };
        let primary = self.build_primary(&request, &checkpoint).await?;

        if self.mode == Mode::DryRun {
            return self.dry_run(plan, primary, &checkpoint);
        }

        let driver = RetryDriver::new(
            self.broadcaster.clone(),
            self.ledger.clone(),
            self.tip_pool.clone(),
            self.wallet.keypair_arc(),
            self.driver_config.clone(),
            logger.clone(),
        );

        match driver.run(primary, checkpoint).await {
            Ok(bundle) => {
                let explorer_url = explorer_link(&self.settings.explorer_tx_url, &bundle.signature);
                info!(
                    attempts = bundle.attempts,
                    url = %explorer_url,
                    "Sell confirmed"
                );
                Ok(SellOutcome::Confirmed {
                    plan,
                    bundle,
                    explorer_url,
                })
            }
            Err(e) => {
                logger.error(&e.to_string());
                Err(anyhow::Error::new(e))
            }
        }
    }

    async fn plan(&self, logger: &StructuredLogger) -> Result<SellPlan> {
        let owner = self.wallet.pubkey();
        let mint = self.settings.token_mint;
        let ledger = self.ledger.clone();

        let balance = RetryIf::start(
            self.retry.strategy(),
            || {
                let ledger = ledger.clone();
                async move { ledger.token_balance(&owner, &mint).await }
            },
            RpcManagerError::is_retryable,
        )
        .await
        .context("Failed to fetch token balance")?
        .ok_or_else(|| anyhow!("wallet {} holds no token account for {}", owner, mint))?;

        if balance.raw == 0 {
            bail!("token balance for {} is zero, nothing to sell", mint);
        }

        let plan = SellPlan::new(&balance, self.settings.sell_percent);
        if plan.effective_percent != plan.configured_percent {
            logger.warn(&format!(
                "sell percent {} raised to {}",
                plan.configured_percent, plan.effective_percent
            ));
        }
        logger.log_sell_plan(
            &mint,
            plan.balance,
            plan.configured_percent,
            plan.effective_percent,
            plan.amount,
        );
        info!(ui_balance = balance.ui_amount(), "Current token balance");

        if plan.amount == 0 {
            bail!("sell amount rounds to zero for balance {}", plan.balance);
        }
        Ok(plan)
    }

    /// Build the swap once; only transient swap API failures are retried
    async fn build_primary(
        &self,
        request: &SellRequest,
        checkpoint: &RecencyCheckpoint,
    ) -> Result<VersionedTransaction> {
        let producer = self.producer.clone();
        let payer = self.wallet.keypair_arc();

        RetryIf::start(
            self.retry.strategy(),
            || {
                let producer = producer.clone();
                let payer = payer.clone();
                async move {
                    producer
                        .build_sell_transaction(request, &payer, checkpoint)
                        .await
                }
            },
            TransactionBuilderError::is_retryable,
        )
        .await
        .context("Failed to build sell transaction")
    }

    async fn fetch_checkpoint(&self) -> Result<RecencyCheckpoint> {
        let ledger = self.ledger.clone();
        RetryIf::start(
            self.retry.strategy(),
            || {
                let ledger = ledger.clone();
                async move { ledger.latest_checkpoint().await }
            },
            RpcManagerError::is_retryable,
        )
        .await
        .context("Failed to fetch latest blockhash")
    }

    fn dry_run(
        &self,
        plan: SellPlan,
        primary: VersionedTransaction,
        checkpoint: &RecencyCheckpoint,
    ) -> Result<SellOutcome> {
        let fee_collector = self.tip_pool.select_fee_collector();
        let fee = build_fee_transaction(
            self.wallet.keypair(),
            &fee_collector,
            self.driver_config.tip_lamports,
            checkpoint,
        )?;
        let bundle = Bundle::new(fee, primary)?;
        let fee_signature = bundle.fee_signature();
        let encoded = bundle.encode(Default::default())?;

        warn!(
            fee_collector = %fee_collector,
            fee_signature = %fee_signature,
            bundle_bytes = encoded.iter().map(String::len).sum::<usize>(),
            "Dry run: bundle built, nothing broadcast"
        );
        Ok(SellOutcome::DryRun { plan, fee_signature })
    }
}
