//! Metrics collection and export module

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::time::Instant;

/// Global metrics registry
pub struct Metrics {
    registry: Registry,

    // Counters
    pub attempts_total: IntCounter,
    pub attempt_build_failures: IntCounterVec,
    pub bundles_accepted: IntCounter,
    pub bundles_not_accepted: IntCounter,
    pub relay_responses: IntCounterVec,
    pub confirmations_success: IntCounter,
    pub confirmations_failed: IntCounter,
    pub checkpoint_refreshes: IntCounter,
    pub runs_confirmed: IntCounter,
    pub runs_exhausted: IntCounter,

    // Histograms
    pub attempt_latency: Histogram,
    pub broadcast_latency: Histogram,
    pub confirmation_latency: Histogram,
}

impl Metrics {
    /// Create new metrics instance
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let attempts_total = IntCounter::with_opts(Opts::new(
            "bundle_attempts_total",
            "Total number of bundle attempts dispatched",
        ))?;

        let attempt_build_failures = IntCounterVec::new(
            Opts::new(
                "bundle_build_failures_total",
                "Attempts abandoned while building the bundle",
            ),
            &["category"],
        )?;

        let bundles_accepted = IntCounter::with_opts(Opts::new(
            "bundles_accepted_total",
            "Attempts accepted by at least one relay",
        ))?;

        let bundles_not_accepted = IntCounter::with_opts(Opts::new(
            "bundles_not_accepted_total",
            "Attempts no relay accepted",
        ))?;

        let relay_responses = IntCounterVec::new(
            Opts::new("relay_responses_total", "Per-relay sendBundle outcomes"),
            &["endpoint", "outcome"],
        )?;

        let confirmations_success = IntCounter::with_opts(Opts::new(
            "confirmations_success_total",
            "Tip signatures confirmed without error",
        ))?;

        let confirmations_failed = IntCounter::with_opts(Opts::new(
            "confirmations_failed_total",
            "Tip signatures that failed, expired or errored",
        ))?;

        let checkpoint_refreshes = IntCounter::with_opts(Opts::new(
            "checkpoint_refreshes_total",
            "Blockhash checkpoints refetched mid-run",
        ))?;

        let runs_confirmed =
            IntCounter::with_opts(Opts::new("runs_confirmed_total", "Runs ending confirmed"))?;

        let runs_exhausted = IntCounter::with_opts(Opts::new(
            "runs_exhausted_total",
            "Runs ending with the retry budget exhausted",
        ))?;

        let attempt_latency = Histogram::with_opts(
            HistogramOpts::new(
                "attempt_latency_seconds",
                "Time to build and broadcast one attempt",
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 5.0]),
        )?;

        let broadcast_latency = Histogram::with_opts(
            HistogramOpts::new("broadcast_latency_seconds", "Relay fan-out latency")
                .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 5.0]),
        )?;

        let confirmation_latency = Histogram::with_opts(
            HistogramOpts::new(
                "confirmation_latency_seconds",
                "Time from broadcast to confirmation outcome",
            )
            .buckets(vec![0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 90.0]),
        )?;

        // Register all metrics
        registry.register(Box::new(attempts_total.clone()))?;
        registry.register(Box::new(attempt_build_failures.clone()))?;
        registry.register(Box::new(bundles_accepted.clone()))?;
        registry.register(Box::new(bundles_not_accepted.clone()))?;
        registry.register(Box::new(relay_responses.clone()))?;
        registry.register(Box::new(confirmations_success.clone()))?;
        registry.register(Box::new(confirmations_failed.clone()))?;
        registry.register(Box::new(checkpoint_refreshes.clone()))?;
        registry.register(Box::new(runs_confirmed.clone()))?;
        registry.register(Box::new(runs_exhausted.clone()))?;
        registry.register(Box::new(attempt_latency.clone()))?;
        registry.register(Box::new(broadcast_latency.clone()))?;
        registry.register(Box::new(confirmation_latency.clone()))?;

        Ok(Self {
            registry,
            attempts_total,
            attempt_build_failures,
            bundles_accepted,
            bundles_not_accepted,
            relay_responses,
            confirmations_success,
            confirmations_failed,
            checkpoint_refreshes,
            runs_confirmed,
            runs_exhausted,
            attempt_latency,
            broadcast_latency,
            confirmation_latency,
        })
    }

    /// Record one relay outcome ("accepted", "rejected", "transport")
    pub fn record_relay(&self, endpoint: &str, outcome: &str) {
        self.relay_responses
            .with_label_values(&[endpoint, outcome])
            .inc();
    }

    /// Prometheus text exposition of everything registered
    pub fn render(&self) -> anyhow::Result<String> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        Ok(String::from_utf8(buf)?)
    }
}

/// Global metrics instance
pub fn metrics() -> &'static Metrics {
    static METRICS: once_cell::sync::Lazy<Metrics> =
        once_cell::sync::Lazy::new(|| Metrics::new().expect("Failed to initialize metrics"));
    &METRICS
}

/// Timer helper for measuring operation duration
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn observe_duration(&self, histogram: &Histogram) {
        histogram.observe(self.start.elapsed().as_secs_f64());
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
