//! Common types used throughout the application

use serde::{Deserialize, Serialize};
use solana_sdk::{hash::Hash, pubkey::Pubkey};

/// Operating mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    /// Build everything, broadcast nothing
    DryRun,
    /// Real bundle submission
    Production,
}

/// Recent blockhash plus the last block height at which transactions
/// referencing it are still valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecencyCheckpoint {
    pub blockhash: Hash,
    pub last_valid_block_height: u64,
}

impl RecencyCheckpoint {
    pub fn new(blockhash: Hash, last_valid_block_height: u64) -> Self {
        Self {
            blockhash,
            last_valid_block_height,
        }
    }

    /// True once `current_height` is within `margin` blocks of expiry
    pub fn is_near_expiry(&self, current_height: u64, margin: u64) -> bool {
        current_height.saturating_add(margin) >= self.last_valid_block_height
    }
}

/// Raw token balance as reported by the token account
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenBalance {
    /// Token account holding the balance
    pub account: Pubkey,
    /// Amount in base units
    pub raw: u64,
    pub decimals: u8,
}

impl TokenBalance {
    /// Human readable amount, for logging only
    pub fn ui_amount(&self) -> f64 {
        self.raw as f64 / 10f64.powi(self.decimals as i32)
    }
}
