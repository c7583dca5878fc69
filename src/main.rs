//! Jito Seller
//!
//! Sells a share of one SPL token through a Jito bundle, retrying the bundle
//! across several block engine regions until it lands.
//!
//! Every option can come from `config.toml`, the command line, or the
//! environment (a `.env` file is loaded first).

#![deny(unused_imports)]
#![deny(unused_mut)]
#![deny(unused_variables)]
#![warn(unused_must_use)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use jito_seller::bundler::{BundleBroadcaster, JitoBroadcaster};
use jito_seller::config::Config;
use jito_seller::metrics::metrics;
use jito_seller::rpc_manager::{LedgerClient, SolanaLedgerClient};
use jito_seller::sell_engine::{SellEngine, SellOutcome, SellSettings};
use jito_seller::tx_builder::{RaydiumSwapProducer, SwapProducer};
use jito_seller::types::Mode;
use jito_seller::wallet::WalletManager;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml", env = "SELLER_CONFIG")]
    config: PathBuf,

    /// Solana RPC endpoint
    #[arg(long, env = "RPC_URL")]
    rpc_url: Option<String>,

    /// Base58 secret key of the selling wallet
    #[arg(long, env = "WALLET_PRIVATE_KEY", hide_env_values = true)]
    wallet_private_key: Option<String>,

    /// Keypair file of the selling wallet
    #[arg(long)]
    keypair: Option<String>,

    /// Mint of the token to sell
    #[arg(long, env = "QUOTE_MINT")]
    token_mint: Option<String>,

    /// Mint to receive
    #[arg(long, env = "BASE_MINT")]
    output_mint: Option<String>,

    /// Share of the balance to sell, in percent (raised to at least 60)
    #[arg(long, env = "PERCENT_TOKEN_TO_SELL")]
    sell_percent: Option<u8>,

    /// Tip per attempt in SOL
    #[arg(long, env = "JITO_FEE")]
    tip_sol: Option<String>,

    /// Maximum number of bundle attempts
    #[arg(long, env = "MAX_TX_COUNT")]
    max_attempts: Option<u32>,

    /// Delay between attempts in milliseconds
    #[arg(long, env = "TX_DELAY")]
    attempt_delay_ms: Option<u64>,

    /// Compute unit price of the swap in micro-lamports
    #[arg(long, env = "PRIORITIZATION_FEE")]
    priority_fee: Option<u64>,

    /// Build the bundle but do not broadcast it
    #[arg(long)]
    dry_run: bool,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Print Prometheus metrics before exiting
    #[arg(long)]
    print_metrics: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(url) = &self.rpc_url {
            config.rpc.endpoint = url.clone();
        }
        if let Some(key) = &self.wallet_private_key {
            config.wallet.private_key = Some(key.clone());
        }
        if let Some(path) = &self.keypair {
            config.wallet.keypair_path = Some(path.clone());
        }
        if let Some(mint) = &self.token_mint {
            config.trading.token_mint = mint.clone();
        }
        if let Some(mint) = &self.output_mint {
            config.trading.output_mint = mint.clone();
        }
        if let Some(pct) = self.sell_percent {
            config.trading.sell_percent = pct;
        }
        if let Some(tip) = &self.tip_sol {
            config.jito.tip_sol = tip.clone();
        }
        if let Some(max) = self.max_attempts {
            config.jito.max_attempts = max;
        }
        if let Some(delay) = self.attempt_delay_ms {
            config.jito.attempt_delay_ms = delay;
        }
        if let Some(fee) = self.priority_fee {
            config.trading.priority_fee_micro_lamports = fee;
        }
        config.monitoring.json_logs |= self.json_logs;
        config.monitoring.print_metrics |= self.print_metrics;
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let (mut config, config_found) = load_config(&args.config)?;
    args.apply_overrides(&mut config);

    init_logging(args.verbose, config.monitoring.json_logs)?;
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    if !config_found {
        warn!("Config file '{}' not found, using defaults", args.config.display());
    }

    let result = run(&config, args.dry_run).await;
    if let Err(e) = &result {
        error!(error = %format!("{e:#}"), "Sell run failed");
    }

    if config.monitoring.print_metrics {
        println!("{}", metrics().render()?);
    }
    result
}

async fn run(config: &Config, dry_run: bool) -> Result<()> {
    config.validate().context("Invalid configuration")?;

    let wallet = load_wallet(config)?;
    info!("Wallet address: {}", wallet.pubkey());

    let ledger: Arc<dyn LedgerClient> = Arc::new(
        SolanaLedgerClient::new(
            config.rpc.endpoint.clone(),
            config.rpc_timeout(),
            config.commitment()?,
        )
        .with_poll_interval(config.confirm_poll_interval()),
    );
    let producer: Arc<dyn SwapProducer> = Arc::new(
        RaydiumSwapProducer::new(config.trading.swap_api_url.clone(), config.swap_timeout())
            .context("Failed to create swap producer")?,
    );
    let broadcaster: Arc<dyn BundleBroadcaster> = Arc::new(
        JitoBroadcaster::new(
            config.jito.endpoints.clone(),
            config.relay_timeout(),
            config.jito.encoding,
            config.jito.acceptance,
        )
        .context("Failed to create bundle broadcaster")?,
    );

    let settings = SellSettings {
        token_mint: config.token_mint()?,
        output_mint: config.output_mint()?,
        sell_percent: config.trading.sell_percent,
        slippage_bps: config.trading.slippage_bps,
        priority_fee_micro_lamports: config.trading.priority_fee_micro_lamports,
        explorer_tx_url: config.monitoring.explorer_tx_url.clone(),
    };
    let mode = if dry_run { Mode::DryRun } else { Mode::Production };
    info!("Operating Mode: {:?}", mode);

    let engine = SellEngine::new(
        ledger,
        producer,
        broadcaster,
        wallet,
        config.tip_pool()?,
        settings,
        config.driver_config()?,
        mode,
    );

    match engine.run().await? {
        SellOutcome::Confirmed { explorer_url, .. } => println!("{}", explorer_url),
        SellOutcome::DryRun { plan, fee_signature } => {
            info!(
                amount = plan.amount,
                fee_signature = %fee_signature,
                "Dry run complete"
            );
        }
    }
    Ok(())
}

fn load_wallet(config: &Config) -> Result<WalletManager> {
    match (&config.wallet.private_key, &config.wallet.keypair_path) {
        (Some(key), _) => {
            WalletManager::from_base58(key).context("Failed to load wallet from private key")
        }
        (None, Some(path)) => WalletManager::from_file(path)
            .with_context(|| format!("Failed to load wallet from {}", path)),
        (None, None) => anyhow::bail!("no wallet configured"),
    }
}

/// Initialize logging with tracing
fn init_logging(verbose: bool, json: bool) -> Result<()> {
    let env_filter = if verbose {
        "jito_seller=debug,info"
    } else {
        "jito_seller=info,warn"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| env_filter.into());

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init()?;
    }

    Ok(())
}

/// Load configuration from file with fallback to defaults
fn load_config(path: &std::path::Path) -> Result<(Config, bool)> {
    if path.exists() {
        let config = Config::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?;
        Ok((config, true))
    } else {
        Ok((Config::default(), false))
    }
}
