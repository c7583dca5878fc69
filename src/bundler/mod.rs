//! Bundle submission
//!
//! - **broadcaster**: fan-out of `sendBundle` to every relay
//! - **confirmation**: tip signature confirmation and the set-once outcome cell
//! - **driver**: the attempt/delay retry loop
//! - **errors**: per-attempt and terminal errors

pub mod broadcaster;
pub mod confirmation;
pub mod driver;
pub mod errors;

pub use broadcaster::{
    AcceptancePolicy, BroadcastOutcome, BundleBroadcaster, JitoBroadcaster, RelayFailure,
    RelayFailureKind, DEFAULT_JITO_ENDPOINTS,
};
pub use confirmation::{
    outcome_channel, ConfirmationResult, ConfirmationTracker, OutcomeReader, OutcomeWriter,
};
pub use driver::{
    AttemptOutcome, AttemptRecord, ConfirmedBundle, DriverConfig, DriverState, RetryDriver,
};
pub use errors::BundleError;
