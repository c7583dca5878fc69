//! Retry loop driving bundle attempts until one confirms
//!
//! ```text
//! Idle -> AttemptInFlight -> AwaitingDelay -> Idle
//!                                        \-> Succeeded
//!                                        \-> Exhausted
//! ```
//!
//! Every attempt pairs a freshly signed tip with the same primary
//! transaction. Confirmations run in the background and only ever talk to
//! the driver through the outcome cell, so an attempt's own verdict never
//! decides termination.

use std::sync::Arc;
use std::time::Duration;

use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signature},
    transaction::VersionedTransaction,
};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::broadcaster::{BroadcastOutcome, BundleBroadcaster};
use super::confirmation::{
    outcome_channel, ConfirmationResult, ConfirmationTracker, OutcomeReader,
};
use super::errors::BundleError;
use crate::metrics::{metrics, Timer};
use crate::rpc_manager::LedgerClient;
use crate::structured_logging::StructuredLogger;
use crate::tx_builder::{build_fee_transaction, resign_with_checkpoint, Bundle, TipAccountPool};
use crate::types::RecencyCheckpoint;

/// Driver state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Idle,
    AttemptInFlight,
    AwaitingDelay,
    Succeeded,
    Exhausted,
}

impl DriverState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Exhausted)
    }
}

/// Retry loop settings, fixed for a run
#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub max_attempts: u32,
    pub attempt_delay: Duration,
    pub tip_lamports: u64,
    /// How long in-flight confirmations may still land after the last attempt
    pub confirmation_grace: Duration,
    pub checkpoint_refresh: bool,
    pub refresh_margin_blocks: u64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            attempt_delay: Duration::from_millis(1_000),
            tip_lamports: 100_000,
            confirmation_grace: Duration::from_secs(30),
            checkpoint_refresh: true,
            refresh_margin_blocks: 10,
        }
    }
}

/// What happened to one attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// At least one relay took it; confirmation is running
    Dispatched { accepted_by: usize },
    NotAccepted { failures: usize },
    BuildFailed { category: &'static str },
    BroadcastFailed { category: &'static str },
}

/// Log line for a finished attempt, dropped after logging
#[derive(Debug, Clone)]
pub struct AttemptRecord {
    pub attempt: u32,
    pub fee_collector: Pubkey,
    pub fee_signature: Option<Signature>,
    pub outcome: AttemptOutcome,
}

/// Successful end of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmedBundle {
    /// Tip signature of the attempt that landed
    pub signature: Signature,
    /// Attempts dispatched before the loop stopped
    pub attempts: u32,
}

/// Runs attempts until the outcome cell is set or the budget runs out
pub struct RetryDriver {
    broadcaster: Arc<dyn BundleBroadcaster>,
    ledger: Arc<dyn LedgerClient>,
    tip_pool: TipAccountPool,
    payer: Arc<Keypair>,
    config: DriverConfig,
    logger: StructuredLogger,
}

impl RetryDriver {
    pub fn new(
        broadcaster: Arc<dyn BundleBroadcaster>,
        ledger: Arc<dyn LedgerClient>,
        tip_pool: TipAccountPool,
        payer: Arc<Keypair>,
        config: DriverConfig,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            broadcaster,
            ledger,
            tip_pool,
            payer,
            config,
            logger,
        }
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Submit `primary` until one attempt confirms.
    ///
    /// `primary` must already be signed against `checkpoint`. Returns
    /// [`BundleError::RetryExhausted`] when `max_attempts` attempts pass
    /// without a confirmation; no other error escapes.
    pub async fn run(
        &self,
        primary: VersionedTransaction,
        checkpoint: RecencyCheckpoint,
    ) -> Result<ConfirmedBundle, BundleError> {
        let max_attempts = self.config.max_attempts.max(1);
        let (writer, mut outcome) = outcome_channel();
        let tracker = Arc::new(ConfirmationTracker::new(self.ledger.clone(), writer));
        let mut confirmations: JoinSet<ConfirmationResult> = JoinSet::new();

        let mut primary = primary;
        let mut checkpoint = checkpoint;
        let mut attempts: u32 = 0;
        let mut state = DriverState::Idle;

        loop {
            self.transition(&mut state, DriverState::AttemptInFlight);

            if self.config.checkpoint_refresh {
                self.refresh_if_stale(&mut checkpoint, &mut primary).await;
            }

            let record = self
                .attempt(attempts + 1, &primary, &checkpoint, &tracker, &mut confirmations)
                .await;
            debug!(?record, "Attempt finished");
            attempts += 1;

            self.transition(&mut state, DriverState::AwaitingDelay);
            reap(&mut confirmations);

            if outcome.is_confirmed() {
                self.transition(&mut state, DriverState::Succeeded);
                break;
            }
            if attempts >= max_attempts {
                self.transition(&mut state, DriverState::Exhausted);
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.attempt_delay) => {}
                _ = outcome.wait_confirmed() => {
                    debug!(attempt = attempts, "Confirmation landed during delay");
                }
            }

            if outcome.is_confirmed() {
                self.transition(&mut state, DriverState::Succeeded);
                break;
            }
            self.transition(&mut state, DriverState::Idle);
        }

        if state == DriverState::Exhausted && !confirmations.is_empty() {
            self.drain_with_grace(&mut outcome, &mut confirmations).await;
        }
        confirmations.abort_all();

        match outcome.confirmed_signature() {
            Some(signature) => {
                metrics().runs_confirmed.inc();
                debug!(%signature, attempts, "Driver stopped on confirmation");
                Ok(ConfirmedBundle { signature, attempts })
            }
            None => {
                metrics().runs_exhausted.inc();
                warn!(attempts, "No attempt confirmed");
                Err(BundleError::RetryExhausted { attempts })
            }
        }
    }

    fn transition(&self, state: &mut DriverState, next: DriverState) {
        debug!(
            from = ?*state,
            to = ?next,
            terminal = next.is_terminal(),
            "Driver state"
        );
        *state = next;
    }

    async fn attempt(
        &self,
        attempt: u32,
        primary: &VersionedTransaction,
        checkpoint: &RecencyCheckpoint,
        tracker: &Arc<ConfirmationTracker>,
        confirmations: &mut JoinSet<ConfirmationResult>,
    ) -> AttemptRecord {
        metrics().attempts_total.inc();
        let timer = Timer::new();
        let logger = self.logger.child_span("attempt");
        let fee_collector = self.tip_pool.select_fee_collector();
        logger.log_attempt(
            attempt,
            self.config.max_attempts,
            &fee_collector,
            self.config.tip_lamports,
        );

        let built = build_fee_transaction(
            &self.payer,
            &fee_collector,
            self.config.tip_lamports,
            checkpoint,
        )
        .and_then(|fee| Bundle::new(fee, primary.clone()));
        let bundle = match built {
            Ok(bundle) => bundle,
            Err(e) => {
                metrics()
                    .attempt_build_failures
                    .with_label_values(&[e.category()])
                    .inc();
                warn!(attempt, error = %e, "Failed to build bundle");
                timer.observe_duration(&metrics().attempt_latency);
                return AttemptRecord {
                    attempt,
                    fee_collector,
                    fee_signature: None,
                    outcome: AttemptOutcome::BuildFailed {
                        category: e.category(),
                    },
                };
            }
        };
        let fee_signature = bundle.fee_signature();

        let outcome = match self.broadcaster.broadcast(&bundle).await {
            Ok(BroadcastOutcome::AtLeastOneAccepted { accepted_by, .. }) => {
                logger.log_broadcast(
                    attempt,
                    &fee_signature,
                    accepted_by.len(),
                    self.broadcaster.endpoint_count(),
                );
                let task_logger = logger.child_span("confirmation");
                spawn_confirmation(tracker, task_logger, fee_signature, *checkpoint, confirmations);
                AttemptOutcome::Dispatched {
                    accepted_by: accepted_by.len(),
                }
            }
            Ok(BroadcastOutcome::NoneAccepted { failures }) => {
                let count = failures.len();
                logger.log_no_acceptance(attempt, count);
                let err = BundleError::NoAcceptance { attempt, failures };
                debug!(error = %err, category = err.category(), "Attempt absorbed");
                AttemptOutcome::NotAccepted { failures: count }
            }
            Err(e) => {
                warn!(attempt, error = %e, category = e.category(), "Broadcast failed");
                AttemptOutcome::BroadcastFailed {
                    category: e.category(),
                }
            }
        };
        timer.observe_duration(&metrics().attempt_latency);

        AttemptRecord {
            attempt,
            fee_collector,
            fee_signature: Some(fee_signature),
            outcome,
        }
    }

    /// Swap in a fresh checkpoint when the current one is about to expire.
    ///
    /// Ledger errors keep the current checkpoint.
    async fn refresh_if_stale(
        &self,
        checkpoint: &mut RecencyCheckpoint,
        primary: &mut VersionedTransaction,
    ) {
        let height = match self.ledger.block_height().await {
            Ok(height) => height,
            Err(e) => {
                warn!(error = %e, "Block height query failed, keeping checkpoint");
                return;
            }
        };
        if !checkpoint.is_near_expiry(height, self.config.refresh_margin_blocks) {
            return;
        }

        let fresh = match self.ledger.latest_checkpoint().await {
            Ok(fresh) => fresh,
            Err(e) => {
                warn!(error = %e, "Checkpoint refresh failed, keeping checkpoint");
                return;
            }
        };
        if fresh.blockhash == checkpoint.blockhash {
            return;
        }

        match resign_with_checkpoint(primary, &self.payer, &fresh) {
            Ok(resigned) => {
                metrics().checkpoint_refreshes.inc();
                info!(
                    block_height = height,
                    old_last_valid = checkpoint.last_valid_block_height,
                    new_last_valid = fresh.last_valid_block_height,
                    "Checkpoint refreshed, primary transaction re-signed"
                );
                *primary = resigned;
                *checkpoint = fresh;
            }
            Err(e) => warn!(
                error = %e,
                "Re-signing primary transaction failed, keeping checkpoint"
            ),
        }
    }

    async fn drain_with_grace(
        &self,
        outcome: &mut OutcomeReader,
        confirmations: &mut JoinSet<ConfirmationResult>,
    ) {
        debug!(
            pending = confirmations.len(),
            grace_ms = self.config.confirmation_grace.as_millis() as u64,
            "Waiting for in-flight confirmations"
        );
        let drain = async {
            loop {
                tokio::select! {
                    _ = outcome.wait_confirmed() => break,
                    next = confirmations.join_next() => {
                        if next.is_none() {
                            break;
                        }
                    }
                }
            }
        };
        if tokio::time::timeout(self.config.confirmation_grace, drain).await.is_err() {
            debug!("Confirmation grace period elapsed");
        }
    }
}

fn spawn_confirmation(
    tracker: &Arc<ConfirmationTracker>,
    logger: StructuredLogger,
    signature: Signature,
    checkpoint: RecencyCheckpoint,
    confirmations: &mut JoinSet<ConfirmationResult>,
) {
    let tracker = tracker.clone();
    confirmations.spawn(async move {
        let timer = Timer::new();
        let result = tracker.confirm(signature, checkpoint).await;
        logger.log_confirmation(&result.signature, result.confirmed, timer.elapsed_ms());
        result
    });
}

/// Drop finished confirmation tasks so the set only holds live ones
fn reap(confirmations: &mut JoinSet<ConfirmationResult>) {
    while let Some(finished) = confirmations.try_join_next() {
        if let Err(e) = finished {
            if e.is_panic() {
                warn!(error = %e, "Confirmation task panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(DriverState::Succeeded.is_terminal());
        assert!(DriverState::Exhausted.is_terminal());
        assert!(!DriverState::Idle.is_terminal());
        assert!(!DriverState::AttemptInFlight.is_terminal());
        assert!(!DriverState::AwaitingDelay.is_terminal());
    }

    #[test]
    fn test_default_config_refreshes_checkpoint() {
        let config = DriverConfig::default();
        assert!(config.checkpoint_refresh);
        assert!(config.max_attempts > 0);
    }
}
