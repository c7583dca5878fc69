//! Structured logging for run and attempt events

use solana_sdk::{pubkey::Pubkey, signature::Signature};

use crate::observability::{CorrelationId, TraceContext};

/// Structured logger bound to one span of a run
#[derive(Debug, Clone)]
pub struct StructuredLogger {
    trace: TraceContext,
}

impl StructuredLogger {
    pub fn new(correlation_id: &CorrelationId) -> Self {
        Self::from_trace(TraceContext::with_correlation("run", correlation_id.clone()))
    }

    pub fn from_trace(trace: TraceContext) -> Self {
        Self { trace }
    }

    /// Logger for a child operation of this span
    pub fn child_span(&self, operation: &str) -> Self {
        Self {
            trace: self.trace.child_span(operation),
        }
    }

    pub fn trace(&self) -> &TraceContext {
        &self.trace
    }

    pub fn log_sell_plan(
        &self,
        mint: &Pubkey,
        balance: u64,
        configured_percent: u8,
        effective_percent: u8,
        amount: u64,
    ) {
        tracing::info!(
            context_id = %self.trace.correlation_id,
            trace_id = %self.trace.trace_id,
            mint = %mint,
            balance = balance,
            configured_percent = configured_percent,
            effective_percent = effective_percent,
            amount = amount,
            "Sell planned"
        );
    }

    pub fn log_attempt(
        &self,
        attempt: u32,
        max_attempts: u32,
        fee_collector: &Pubkey,
        tip_lamports: u64,
    ) {
        tracing::info!(
            context_id = %self.trace.correlation_id,
            span_id = %self.trace.span_id,
            parent_span_id = ?self.trace.parent_span_id,
            attempt = attempt,
            max_attempts = max_attempts,
            fee_collector = %fee_collector,
            tip_lamports = tip_lamports,
            "Dispatching bundle attempt"
        );
    }

    pub fn log_broadcast(
        &self,
        attempt: u32,
        signature: &Signature,
        accepted_by: usize,
        endpoints: usize,
    ) {
        tracing::info!(
            context_id = %self.trace.correlation_id,
            span_id = %self.trace.span_id,
            attempt = attempt,
            signature = %signature,
            accepted_by = accepted_by,
            endpoints = endpoints,
            "Bundle accepted by relays"
        );
    }

    pub fn log_no_acceptance(&self, attempt: u32, failures: usize) {
        tracing::warn!(
            context_id = %self.trace.correlation_id,
            span_id = %self.trace.span_id,
            attempt = attempt,
            failures = failures,
            "No relay accepted the bundle"
        );
    }

    /// Per-task confirmation verdict; the tracker reports the winner
    pub fn log_confirmation(&self, signature: &Signature, confirmed: bool, latency_ms: u64) {
        tracing::debug!(
            context_id = %self.trace.correlation_id,
            span_id = %self.trace.span_id,
            parent_span_id = ?self.trace.parent_span_id,
            operation = %self.trace.operation,
            signature = %signature,
            confirmed = confirmed,
            latency_ms = latency_ms,
            "Confirmation task finished"
        );
    }

    pub fn warn(&self, message: &str) {
        tracing::warn!(
            context_id = %self.trace.correlation_id,
            message = %message,
            "Warning"
        );
    }

    pub fn error(&self, message: &str) {
        tracing::error!(
            context_id = %self.trace.correlation_id,
            message = %message,
            "Error"
        );
    }
}
