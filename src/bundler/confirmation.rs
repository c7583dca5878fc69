//! Confirmation tracking and the run's outcome cell
//!
//! The outcome is a set-once cell: the first confirmed signature wins and is
//! never replaced or cleared. Only the tracker holds the writer half; the
//! driver holds a reader and decides termination from it, never from the
//! return value of an individual confirmation.

use std::sync::Arc;

use solana_sdk::signature::Signature;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::errors::BundleError;
use crate::metrics::{metrics, Timer};
use crate::rpc_manager::{LedgerClient, RpcManagerError};
use crate::types::RecencyCheckpoint;

/// Create a fresh, unconfirmed outcome cell
pub fn outcome_channel() -> (OutcomeWriter, OutcomeReader) {
    let (tx, rx) = watch::channel(None);
    (OutcomeWriter { tx: Arc::new(tx) }, OutcomeReader { rx })
}

/// Writer half of the outcome cell
#[derive(Debug, Clone)]
pub struct OutcomeWriter {
    tx: Arc<watch::Sender<Option<Signature>>>,
}

impl OutcomeWriter {
    /// Publish `signature` if nothing was published yet.
    ///
    /// Returns true when this call set the cell.
    pub fn publish(&self, signature: Signature) -> bool {
        self.tx.send_if_modified(|current| {
            if current.is_none() {
                *current = Some(signature);
                true
            } else {
                false
            }
        })
    }
}

/// Reader half of the outcome cell
#[derive(Debug, Clone)]
pub struct OutcomeReader {
    rx: watch::Receiver<Option<Signature>>,
}

impl OutcomeReader {
    pub fn is_confirmed(&self) -> bool {
        self.rx.borrow().is_some()
    }

    pub fn confirmed_signature(&self) -> Option<Signature> {
        *self.rx.borrow()
    }

    /// Resolve once a signature is published. Never resolves if every
    /// writer is dropped first.
    pub async fn wait_confirmed(&mut self) -> Signature {
        let published = match self.rx.wait_for(|v| v.is_some()).await {
            Ok(sig) => *sig,
            Err(_) => None,
        };
        match published {
            Some(sig) => sig,
            None => std::future::pending().await,
        }
    }
}

/// Result of one confirmation check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmationResult {
    pub confirmed: bool,
    pub signature: Signature,
}

/// Confirms tip signatures and publishes the first success
pub struct ConfirmationTracker {
    ledger: Arc<dyn LedgerClient>,
    outcome: OutcomeWriter,
}

impl ConfirmationTracker {
    pub fn new(ledger: Arc<dyn LedgerClient>, outcome: OutcomeWriter) -> Self {
        Self { ledger, outcome }
    }

    /// Wait for `signature` under `checkpoint` and record the outcome.
    pub async fn confirm(
        &self,
        signature: Signature,
        checkpoint: RecencyCheckpoint,
    ) -> ConfirmationResult {
        let timer = Timer::new();
        let result = self.check(&signature, &checkpoint).await;
        timer.observe_duration(&metrics().confirmation_latency);

        match result {
            Ok(()) => {
                metrics().confirmations_success.inc();
                if self.outcome.publish(signature) {
                    info!(
                        %signature,
                        latency_ms = timer.elapsed_ms(),
                        "Tip transaction confirmed"
                    );
                } else {
                    debug!(%signature, "Confirmed after another attempt already won");
                }
                ConfirmationResult {
                    confirmed: true,
                    signature,
                }
            }
            Err(e) => {
                metrics().confirmations_failed.inc();
                warn!(
                    %signature,
                    error = %e,
                    category = e.category(),
                    "Tip transaction not confirmed"
                );
                ConfirmationResult {
                    confirmed: false,
                    signature,
                }
            }
        }
    }

    async fn check(
        &self,
        signature: &Signature,
        checkpoint: &RecencyCheckpoint,
    ) -> Result<(), BundleError> {
        match self.ledger.confirm_transaction(signature, checkpoint).await {
            Ok(None) => Ok(()),
            Ok(Some(tx_err)) => Err(BundleError::TransactionFailed {
                signature: signature.to_string(),
                reason: tx_err.to_string(),
            }),
            Err(RpcManagerError::BlockHeightExceeded { .. }) => {
                Err(BundleError::ConfirmationTimeout {
                    signature: signature.to_string(),
                })
            }
            Err(e) => Err(BundleError::Ledger(e)),
        }
    }
}
