//! Jito tip accounts and tip amount handling
//!
//! Every attempt pays its tip to one of the block engine's published tip
//! accounts, picked uniformly at random so repeated attempts spread across
//! collectors. Repeats between attempts are allowed.

use std::str::FromStr;

use solana_sdk::{native_token::LAMPORTS_PER_SOL, pubkey::Pubkey};

use super::errors::TransactionBuilderError;

/// Mainnet tip accounts as returned by `getTipAccounts`
pub const JITO_TIP_ACCOUNTS: [&str; 8] = [
    "Cw8CFyM9FkoMi7K7Crf6HNQqf4uEMzpKw6QNghXLvLkY",
    "DttWaMuVvTiduZRnguLF7jNxTgiMBZ1hyAumKUiL2KRL",
    "96gYZGLnJYVFmbjzopPSU6QiEV5fGqZNyN9nmNhvrZU5",
    "3AVi9Tg9Uo68tJfuvoKvqKNWKkC5wPdSSdeBnizKZ6jT",
    "HFqU5x63VTqvQss8hp11i4wVV8bD44PvwucfZ2bU7gRe",
    "ADaUMid9yfUytqMBgopwjb2DTLSokTSzL1zt6iGPaS49",
    "ADuUkR4vqLUMWXxW9gh6D6L8pMSawimctcNZ5pGwDcEt",
    "DfXygSm4jCyNCybVYYK6DwvWqjKee8pbDmJGcLWNDXjh",
];

/// Fixed, non-empty set of fee collectors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TipAccountPool {
    accounts: Vec<Pubkey>,
}

impl TipAccountPool {
    /// Build a pool from explicit accounts. Empty pools are rejected.
    pub fn new(accounts: Vec<Pubkey>) -> Result<Self, TransactionBuilderError> {
        if accounts.is_empty() {
            return Err(TransactionBuilderError::Configuration(
                "tip account pool must not be empty".to_string(),
            ));
        }
        Ok(Self { accounts })
    }

    /// Parse a pool from base58 strings
    pub fn from_strs<S: AsRef<str>>(accounts: &[S]) -> Result<Self, TransactionBuilderError> {
        let parsed = accounts
            .iter()
            .map(|s| {
                Pubkey::from_str(s.as_ref()).map_err(|e| {
                    TransactionBuilderError::Configuration(format!(
                        "invalid tip account '{}': {}",
                        s.as_ref(),
                        e
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(parsed)
    }

    /// Jito mainnet pool
    pub fn mainnet() -> Self {
        let accounts = JITO_TIP_ACCOUNTS
            .iter()
            .filter_map(|s| Pubkey::from_str(s).ok())
            .collect();
        Self { accounts }
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    pub fn accounts(&self) -> &[Pubkey] {
        &self.accounts
    }

    pub fn contains(&self, account: &Pubkey) -> bool {
        self.accounts.contains(account)
    }

    /// Pick one collector uniformly at random
    pub fn select_fee_collector(&self) -> Pubkey {
        self.accounts[fastrand::usize(..self.accounts.len())]
    }
}

impl Default for TipAccountPool {
    fn default() -> Self {
        Self::mainnet()
    }
}

/// Convert a SOL decimal string ("0.0001") into lamports.
///
/// At most 9 fractional digits are accepted; signs, exponents and empty
/// strings are rejected.
pub fn parse_sol_amount(input: &str) -> Result<u64, TransactionBuilderError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(TransactionBuilderError::invalid_amount(input, "empty"));
    }

    let (whole, frac) = match trimmed.split_once('.') {
        Some((w, f)) => (w, f),
        None => (trimmed, ""),
    };

    if whole.is_empty() && frac.is_empty() {
        return Err(TransactionBuilderError::invalid_amount(input, "no digits"));
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(TransactionBuilderError::invalid_amount(
            input,
            "expected a non-negative decimal number",
        ));
    }
    if frac.len() > 9 {
        return Err(TransactionBuilderError::invalid_amount(
            input,
            "more than 9 decimal places",
        ));
    }

    let whole_lamports = if whole.is_empty() {
        0u64
    } else {
        whole
            .parse::<u64>()
            .ok()
            .and_then(|w| w.checked_mul(LAMPORTS_PER_SOL))
            .ok_or_else(|| TransactionBuilderError::invalid_amount(input, "amount too large"))?
    };

    let frac_lamports = if frac.is_empty() {
        0u64
    } else {
        let padded = format!("{:0<9}", frac);
        padded
            .parse::<u64>()
            .map_err(|e| TransactionBuilderError::invalid_amount(input, e.to_string()))?
    };

    whole_lamports
        .checked_add(frac_lamports)
        .ok_or_else(|| TransactionBuilderError::invalid_amount(input, "amount too large"))
}
