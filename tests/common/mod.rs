//! Hand-written test doubles shared by the integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use jito_seller::bundler::{
    BroadcastOutcome, BundleBroadcaster, BundleError, RelayFailure, RelayFailureKind,
};
use jito_seller::rpc_manager::{LedgerClient, RpcManagerError};
use jito_seller::tx_builder::{Bundle, SellRequest, SwapProducer, TransactionBuilderError};
use jito_seller::types::{RecencyCheckpoint, TokenBalance};
use solana_sdk::{
    hash::Hash,
    message::{v0, VersionedMessage},
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
    system_instruction,
    transaction::{TransactionError, VersionedTransaction},
};
use tokio::time::Instant;

/// How the mock ledger answers confirmation requests
#[derive(Debug, Clone, Copy)]
pub enum ConfirmPlan {
    /// Every signature expires
    FailAll,
    /// The `call`-th confirmation (1-based) lands after `after`, the rest expire
    SucceedOnCall { call: usize, after: Duration },
    /// Never answers
    Hang,
}

pub struct MockLedger {
    checkpoint: Mutex<RecencyCheckpoint>,
    height: AtomicU64,
    plan: ConfirmPlan,
    balance: Option<TokenBalance>,
    confirm_calls: AtomicUsize,
    checkpoint_calls: AtomicUsize,
    confirmed: Mutex<Vec<Signature>>,
}

impl MockLedger {
    pub fn new(checkpoint: RecencyCheckpoint, plan: ConfirmPlan) -> Self {
        Self {
            checkpoint: Mutex::new(checkpoint),
            height: AtomicU64::new(0),
            plan,
            balance: None,
            confirm_calls: AtomicUsize::new(0),
            checkpoint_calls: AtomicUsize::new(0),
            confirmed: Mutex::new(Vec::new()),
        }
    }

    pub fn with_balance(mut self, balance: TokenBalance) -> Self {
        self.balance = Some(balance);
        self
    }

    pub fn with_height(self, height: u64) -> Self {
        self.height.store(height, Ordering::SeqCst);
        self
    }

    /// Checkpoint returned by every later `latest_checkpoint` call
    pub fn set_checkpoint(&self, checkpoint: RecencyCheckpoint) {
        *self.checkpoint.lock().unwrap() = checkpoint;
    }

    pub fn confirm_calls(&self) -> usize {
        self.confirm_calls.load(Ordering::SeqCst)
    }

    pub fn checkpoint_calls(&self) -> usize {
        self.checkpoint_calls.load(Ordering::SeqCst)
    }

    pub fn confirmed(&self) -> Vec<Signature> {
        self.confirmed.lock().unwrap().clone()
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    async fn latest_checkpoint(&self) -> Result<RecencyCheckpoint, RpcManagerError> {
        self.checkpoint_calls.fetch_add(1, Ordering::SeqCst);
        Ok(*self.checkpoint.lock().unwrap())
    }

    async fn block_height(&self) -> Result<u64, RpcManagerError> {
        Ok(self.height.load(Ordering::SeqCst))
    }

    async fn confirm_transaction(
        &self,
        signature: &Signature,
        checkpoint: &RecencyCheckpoint,
    ) -> Result<Option<TransactionError>, RpcManagerError> {
        let n = self.confirm_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let expired = || RpcManagerError::BlockHeightExceeded {
            signature: signature.to_string(),
            last_valid_block_height: checkpoint.last_valid_block_height,
        };
        match self.plan {
            ConfirmPlan::FailAll => Err(expired()),
            ConfirmPlan::SucceedOnCall { call, after } if call == n => {
                tokio::time::sleep(after).await;
                self.confirmed.lock().unwrap().push(*signature);
                Ok(None)
            }
            ConfirmPlan::SucceedOnCall { .. } => Err(expired()),
            ConfirmPlan::Hang => std::future::pending().await,
        }
    }

    async fn token_balance(
        &self,
        _owner: &Pubkey,
        _mint: &Pubkey,
    ) -> Result<Option<TokenBalance>, RpcManagerError> {
        Ok(self.balance)
    }
}

/// What the mock relay set says
#[derive(Debug, Clone, Copy)]
pub enum RelayBehavior {
    AcceptAll,
    RejectAll,
}

/// One bundle seen by the mock broadcaster
#[derive(Debug, Clone)]
pub struct SentBundle {
    pub at: Instant,
    pub fee_signature: Signature,
    pub fee_collector: Pubkey,
    pub fee_blockhash: Hash,
    pub primary_blockhash: Hash,
}

pub struct MockBroadcaster {
    behavior: RelayBehavior,
    sent: Mutex<Vec<SentBundle>>,
}

impl MockBroadcaster {
    pub fn new(behavior: RelayBehavior) -> Self {
        Self {
            behavior,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn sent(&self) -> Vec<SentBundle> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl BundleBroadcaster for MockBroadcaster {
    async fn broadcast(&self, bundle: &Bundle) -> Result<BroadcastOutcome, BundleError> {
        self.sent.lock().unwrap().push(SentBundle {
            at: Instant::now(),
            fee_signature: bundle.fee_signature(),
            fee_collector: bundle.fee().fee_collector,
            fee_blockhash: bundle.blockhash(),
            primary_blockhash: *bundle.primary().message.recent_blockhash(),
        });
        Ok(match self.behavior {
            RelayBehavior::AcceptAll => BroadcastOutcome::AtLeastOneAccepted {
                fee_signature: bundle.fee_signature(),
                accepted_by: vec!["mock".to_string()],
                bundle_id: Some("bundle".to_string()),
                failures: vec![],
            },
            RelayBehavior::RejectAll => BroadcastOutcome::NoneAccepted {
                failures: vec![RelayFailure {
                    endpoint: "mock".to_string(),
                    kind: RelayFailureKind::Transport("connection refused".to_string()),
                }],
            },
        })
    }

    fn endpoint_count(&self) -> usize {
        1
    }
}

/// Swap producer returning a plain transfer signed against the checkpoint
#[derive(Default)]
pub struct MockSwapProducer {
    requests: Mutex<Vec<SellRequest>>,
    failures_left: AtomicUsize,
}

impl MockSwapProducer {
    /// The first `n` calls fail with a swap API error
    pub fn failing(n: usize) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            failures_left: AtomicUsize::new(n),
        }
    }

    pub fn requests(&self) -> Vec<SellRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl SwapProducer for MockSwapProducer {
    async fn build_sell_transaction(
        &self,
        request: &SellRequest,
        payer: &Keypair,
        checkpoint: &RecencyCheckpoint,
    ) -> Result<VersionedTransaction, TransactionBuilderError> {
        self.requests.lock().unwrap().push(request.clone());
        let failed = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(TransactionBuilderError::swap_api("HTTP 503"));
        }
        Ok(primary_tx(payer, checkpoint.blockhash))
    }
}

/// Single-signer transaction paid by `payer`, standing in for a swap
pub fn primary_tx(payer: &Keypair, blockhash: Hash) -> VersionedTransaction {
    let ix = system_instruction::transfer(&payer.pubkey(), &Pubkey::new_unique(), 1);
    let message = v0::Message::try_compile(&payer.pubkey(), &[ix], &[], blockhash).unwrap();
    VersionedTransaction::try_new(VersionedMessage::V0(message), &[payer]).unwrap()
}

pub fn checkpoint(last_valid_block_height: u64) -> RecencyCheckpoint {
    RecencyCheckpoint::new(Hash::new_unique(), last_valid_block_height)
}
