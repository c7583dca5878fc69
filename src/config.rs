//! Configuration module for the Jito seller
//!
//! Configuration is loaded from a TOML file (every field has a default),
//! then overridden from the command line or the process environment.

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use solana_sdk::{commitment_config::CommitmentConfig, pubkey::Pubkey};

use crate::bundler::{AcceptancePolicy, DriverConfig, DEFAULT_JITO_ENDPOINTS};
use crate::tx_builder::{
    parse_sol_amount, BundleEncoding, TipAccountPool, JITO_TIP_ACCOUNTS, WSOL_MINT,
};
use crate::tx_builder::swap::RAYDIUM_TRADE_API;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Ledger RPC
    #[serde(default)]
    pub rpc: RpcConfig,

    #[serde(default)]
    pub wallet: WalletConfig,

    /// What to sell and how
    #[serde(default)]
    pub trading: TradingConfig,

    /// Bundle submission and the retry loop
    #[serde(default)]
    pub jito: JitoConfig,

    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    #[serde(default = "default_rpc_endpoint")]
    pub endpoint: String,

    /// Request timeout in seconds
    #[serde(default = "default_rpc_timeout")]
    pub timeout_secs: u64,

    /// processed, confirmed or finalized
    #[serde(default = "default_commitment")]
    pub commitment: String,

    /// Signature status polling interval in milliseconds
    #[serde(default = "default_confirm_poll_interval")]
    pub confirm_poll_interval_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WalletConfig {
    /// Path to a keypair file (JSON byte array or raw 64 bytes)
    #[serde(default)]
    pub keypair_path: Option<String>,

    /// Base58 secret key, normally supplied through the environment
    #[serde(default, skip_serializing)]
    pub private_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingConfig {
    /// Mint of the token being sold
    #[serde(default)]
    pub token_mint: String,

    /// Mint received for it
    #[serde(default = "default_output_mint")]
    pub output_mint: String,

    /// Share of the balance to sell; values below 60 are raised to 60
    #[serde(default = "default_sell_percent")]
    pub sell_percent: u8,

    #[serde(default = "default_slippage_bps")]
    pub slippage_bps: u16,

    /// Compute unit price for the swap transaction
    #[serde(default = "default_priority_fee")]
    pub priority_fee_micro_lamports: u64,

    #[serde(default = "default_swap_api_url")]
    pub swap_api_url: String,

    #[serde(default = "default_swap_timeout")]
    pub swap_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JitoConfig {
    /// Block engine `sendBundle` endpoints
    #[serde(default = "default_jito_endpoints")]
    pub endpoints: Vec<String>,

    /// Tip per attempt in SOL, e.g. "0.0001"
    #[serde(default = "default_tip_sol")]
    pub tip_sol: String,

    /// Tip accounts to pick the fee collector from
    #[serde(default = "default_tip_accounts")]
    pub tip_accounts: Vec<String>,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay between attempts in milliseconds
    #[serde(default = "default_attempt_delay")]
    pub attempt_delay_ms: u64,

    /// Per-relay request timeout in milliseconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    #[serde(default)]
    pub encoding: BundleEncoding,

    #[serde(default)]
    pub acceptance: AcceptancePolicy,

    /// How long in-flight confirmations may still land after the last attempt
    #[serde(default = "default_confirmation_grace")]
    pub confirmation_grace_secs: u64,

    /// Refresh the blockhash and re-sign when it nears expiry
    #[serde(default = "default_true")]
    pub checkpoint_refresh: bool,

    #[serde(default = "default_refresh_margin")]
    pub refresh_margin_blocks: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// Prefix for the confirmed transaction link
    #[serde(default = "default_explorer_tx_url")]
    pub explorer_tx_url: String,

    /// Emit logs as JSON lines
    #[serde(default)]
    pub json_logs: bool,

    /// Dump Prometheus metrics at exit
    #[serde(default)]
    pub print_metrics: bool,
}

// Default value functions
fn default_rpc_endpoint() -> String { "https://api.mainnet-beta.solana.com".to_string() }
fn default_rpc_timeout() -> u64 { 30 }
fn default_commitment() -> String { "confirmed".to_string() }
fn default_confirm_poll_interval() -> u64 { 400 }
fn default_output_mint() -> String { WSOL_MINT.to_string() }
fn default_sell_percent() -> u8 { 100 }
fn default_slippage_bps() -> u16 { 500 }
fn default_priority_fee() -> u64 { 100_000 }
fn default_swap_api_url() -> String { RAYDIUM_TRADE_API.to_string() }
fn default_swap_timeout() -> u64 { 10 }
fn default_jito_endpoints() -> Vec<String> {
    DEFAULT_JITO_ENDPOINTS.iter().map(|s| s.to_string()).collect()
}
fn default_tip_sol() -> String { "0.0001".to_string() }
fn default_tip_accounts() -> Vec<String> {
    JITO_TIP_ACCOUNTS.iter().map(|s| s.to_string()).collect()
}
fn default_max_attempts() -> u32 { 5 }
fn default_attempt_delay() -> u64 { 1_000 }
fn default_request_timeout() -> u64 { 5_000 }
fn default_confirmation_grace() -> u64 { 30 }
fn default_refresh_margin() -> u64 { 10 }
fn default_explorer_tx_url() -> String { "https://solscan.io/tx/".to_string() }
fn default_true() -> bool { true }

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            endpoint: default_rpc_endpoint(),
            timeout_secs: default_rpc_timeout(),
            commitment: default_commitment(),
            confirm_poll_interval_ms: default_confirm_poll_interval(),
        }
    }
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            token_mint: String::new(),
            output_mint: default_output_mint(),
            sell_percent: default_sell_percent(),
            slippage_bps: default_slippage_bps(),
            priority_fee_micro_lamports: default_priority_fee(),
            swap_api_url: default_swap_api_url(),
            swap_timeout_secs: default_swap_timeout(),
        }
    }
}

impl Default for JitoConfig {
    fn default() -> Self {
        Self {
            endpoints: default_jito_endpoints(),
            tip_sol: default_tip_sol(),
            tip_accounts: default_tip_accounts(),
            max_attempts: default_max_attempts(),
            attempt_delay_ms: default_attempt_delay(),
            request_timeout_ms: default_request_timeout(),
            encoding: BundleEncoding::default(),
            acceptance: AcceptancePolicy::default(),
            confirmation_grace_secs: default_confirmation_grace(),
            checkpoint_refresh: default_true(),
            refresh_margin_blocks: default_refresh_margin(),
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            explorer_tx_url: default_explorer_tx_url(),
            json_logs: false,
            print_metrics: false,
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Check everything that can be checked without the network
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.rpc.endpoint.trim().is_empty() {
            bail!("rpc.endpoint must not be empty");
        }
        self.commitment()?;
        self.token_mint()?;
        self.output_mint()?;
        if self.trading.sell_percent == 0 || self.trading.sell_percent > 100 {
            bail!(
                "trading.sell_percent must be within 1..=100, got {}",
                self.trading.sell_percent
            );
        }
        if self.jito.endpoints.is_empty() {
            bail!("jito.endpoints must list at least one relay");
        }
        if self.jito.max_attempts == 0 {
            bail!("jito.max_attempts must be at least 1");
        }
        self.tip_lamports()?;
        self.tip_pool()?;
        if self.wallet.keypair_path.is_none() && self.wallet.private_key.is_none() {
            bail!("no wallet configured: set wallet.keypair_path or WALLET_PRIVATE_KEY");
        }
        Ok(())
    }

    pub fn token_mint(&self) -> anyhow::Result<Pubkey> {
        parse_pubkey("trading.token_mint", &self.trading.token_mint)
    }

    pub fn output_mint(&self) -> anyhow::Result<Pubkey> {
        parse_pubkey("trading.output_mint", &self.trading.output_mint)
    }

    pub fn commitment(&self) -> anyhow::Result<CommitmentConfig> {
        match self.rpc.commitment.as_str() {
            "processed" => Ok(CommitmentConfig::processed()),
            "confirmed" => Ok(CommitmentConfig::confirmed()),
            "finalized" => Ok(CommitmentConfig::finalized()),
            other => bail!(
                "rpc.commitment must be processed, confirmed or finalized, got {other:?}"
            ),
        }
    }

    pub fn tip_lamports(&self) -> anyhow::Result<u64> {
        parse_sol_amount(&self.jito.tip_sol).context("jito.tip_sol is not a valid SOL amount")
    }

    pub fn tip_pool(&self) -> anyhow::Result<TipAccountPool> {
        TipAccountPool::from_strs(self.jito.tip_accounts.as_slice())
            .context("jito.tip_accounts is invalid")
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc.timeout_secs)
    }

    pub fn confirm_poll_interval(&self) -> Duration {
        Duration::from_millis(self.rpc.confirm_poll_interval_ms)
    }

    pub fn relay_timeout(&self) -> Duration {
        Duration::from_millis(self.jito.request_timeout_ms)
    }

    pub fn swap_timeout(&self) -> Duration {
        Duration::from_secs(self.trading.swap_timeout_secs)
    }

    /// Retry loop settings derived from `[jito]`
    pub fn driver_config(&self) -> anyhow::Result<DriverConfig> {
        Ok(DriverConfig {
            max_attempts: self.jito.max_attempts,
            attempt_delay: Duration::from_millis(self.jito.attempt_delay_ms),
            tip_lamports: self.tip_lamports()?,
            confirmation_grace: Duration::from_secs(self.jito.confirmation_grace_secs),
            checkpoint_refresh: self.jito.checkpoint_refresh,
            refresh_margin_blocks: self.jito.refresh_margin_blocks,
        })
    }
}

fn parse_pubkey(field: &str, value: &str) -> anyhow::Result<Pubkey> {
    if value.trim().is_empty() {
        bail!("{field} is not set");
    }
    value
        .trim()
        .parse::<Pubkey>()
        .with_context(|| format!("{field} is not a valid public key: {value}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINT: &str = "4k3Dyjzvzp8eMZWUXbBCjEvwSkkk59S5iCNLY3QrkX6R";

    fn valid() -> Config {
        let mut config = Config::default();
        config.trading.token_mint = MINT.to_string();
        config.wallet.keypair_path = Some("id.json".to_string());
        config
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.jito.endpoints.len(), 5);
        assert_eq!(config.jito.tip_accounts.len(), 8);
        assert_eq!(config.trading.output_mint, WSOL_MINT);
        assert_eq!(config.monitoring.explorer_tx_url, "https://solscan.io/tx/");
        assert_eq!(config.jito.acceptance, AcceptancePolicy::RequireResult);
        assert!(config.jito.checkpoint_refresh);
    }

    #[test]
    fn test_valid_config_passes() {
        let config = valid();
        config.validate().unwrap();
        assert_eq!(config.tip_lamports().unwrap(), 100_000);
        assert_eq!(config.driver_config().unwrap().max_attempts, 5);
    }

    #[test]
    fn test_missing_token_mint_rejected() {
        let mut config = valid();
        config.trading.token_mint.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_sell_percent_above_hundred_rejected() {
        let mut config = valid();
        config.trading.sell_percent = 101;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_tip_rejected() {
        let mut config = valid();
        config.jito.tip_sol = "0.0000000001".to_string();
        assert!(config.validate().is_err());
        config.jito.tip_sol = "-1".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_relay_list_rejected() {
        let mut config = valid();
        config.jito.endpoints.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_commitment_rejected() {
        let mut config = valid();
        config.rpc.commitment = "max".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file_partial_sections() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[trading]
token_mint = "{MINT}"
sell_percent = 40

[jito]
tip_sol = "0.002"
max_attempts = 12
encoding = "base64"
acceptance = "any_response"
"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.trading.sell_percent, 40);
        assert_eq!(config.tip_lamports().unwrap(), 2_000_000);
        assert_eq!(config.jito.max_attempts, 12);
        assert_eq!(config.jito.encoding, BundleEncoding::Base64);
        assert_eq!(config.jito.acceptance, AcceptancePolicy::AnyResponse);
        assert_eq!(config.jito.endpoints.len(), 5);
        assert_eq!(config.rpc.commitment, "confirmed");
    }

    #[test]
    fn test_from_file_reports_parse_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[jito]\nmax_attempts = \"many\"").unwrap();
        assert!(Config::from_file(file.path()).is_err());
    }
}
