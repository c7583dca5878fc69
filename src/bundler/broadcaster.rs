//! Multi-region bundle broadcast
//!
//! The bundle is serialized once and the identical `sendBundle` request is
//! posted to every relay at the same time. Each request settles on its own:
//! a dead region never cancels or delays the verdict of the others. There
//! is no retry here; the driver owns retries.

use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use solana_sdk::signature::Signature;
use tracing::{debug, warn};

use super::errors::BundleError;
use crate::metrics::{metrics, Timer};
use crate::tx_builder::{Bundle, BundleEncoding};

/// Jito block engine bundle endpoints
pub const DEFAULT_JITO_ENDPOINTS: [&str; 5] = [
    "https://mainnet.block-engine.jito.wtf/api/v1/bundles",
    "https://amsterdam.mainnet.block-engine.jito.wtf/api/v1/bundles",
    "https://frankfurt.mainnet.block-engine.jito.wtf/api/v1/bundles",
    "https://ny.mainnet.block-engine.jito.wtf/api/v1/bundles",
    "https://tokyo.mainnet.block-engine.jito.wtf/api/v1/bundles",
];

/// What counts as a relay accepting the bundle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcceptancePolicy {
    /// 2xx with a JSON-RPC `result` and no `error`
    #[default]
    RequireResult,
    /// Any 2xx response
    AnyResponse,
}

/// Why one relay did not accept the bundle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayFailureKind {
    /// Connect error, timeout, non-2xx status or unreadable body
    Transport(String),
    /// The relay answered with a JSON-RPC error
    Rejected { code: Option<i64>, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayFailure {
    pub endpoint: String,
    pub kind: RelayFailureKind,
}

impl RelayFailure {
    pub fn is_transport(&self) -> bool {
        matches!(self.kind, RelayFailureKind::Transport(_))
    }
}

/// Verdict of one fan-out
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BroadcastOutcome {
    AtLeastOneAccepted {
        fee_signature: Signature,
        accepted_by: Vec<String>,
        /// Bundle id from the first relay that returned one
        bundle_id: Option<String>,
        failures: Vec<RelayFailure>,
    },
    NoneAccepted {
        failures: Vec<RelayFailure>,
    },
}

impl BroadcastOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::AtLeastOneAccepted { .. })
    }

    pub fn failures(&self) -> &[RelayFailure] {
        match self {
            Self::AtLeastOneAccepted { failures, .. } | Self::NoneAccepted { failures } => failures,
        }
    }
}

/// Sends a bundle to the relay set
#[async_trait]
pub trait BundleBroadcaster: Send + Sync {
    async fn broadcast(&self, bundle: &Bundle) -> Result<BroadcastOutcome, BundleError>;

    fn endpoint_count(&self) -> usize;
}

#[derive(Debug, Deserialize)]
struct JsonRpcErrorBody {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct JsonRpcReply {
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<JsonRpcErrorBody>,
}

/// What one relay said, before the acceptance policy is applied
#[derive(Debug)]
struct RelayReply {
    reply: Option<JsonRpcReply>,
}

/// `sendBundle` over HTTP JSON-RPC to every configured block engine
#[derive(Debug, Clone)]
pub struct JitoBroadcaster {
    http: Client,
    endpoints: Vec<String>,
    encoding: BundleEncoding,
    policy: AcceptancePolicy,
}

impl JitoBroadcaster {
    pub fn new(
        endpoints: Vec<String>,
        request_timeout: Duration,
        encoding: BundleEncoding,
        policy: AcceptancePolicy,
    ) -> Result<Self, BundleError> {
        if endpoints.is_empty() {
            return Err(BundleError::Configuration(
                "at least one relay endpoint is required".to_string(),
            ));
        }
        let http = Client::builder()
            .timeout(request_timeout)
            .pool_max_idle_per_host(4)
            .build()
            .map_err(|e| BundleError::Configuration(format!("relay HTTP client: {e}")))?;
        Ok(Self {
            http,
            endpoints,
            encoding,
            policy,
        })
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    /// JSON-RPC request body for the encoded transactions
    pub fn request_body(encoded: &[String], encoding: BundleEncoding) -> serde_json::Value {
        let params = match encoding {
            BundleEncoding::Base58 => json!([encoded]),
            BundleEncoding::Base64 => json!([encoded, { "encoding": "base64" }]),
        };
        json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "sendBundle",
            "params": params,
        })
    }

    async fn send_to_endpoint(
        &self,
        endpoint: &str,
        body: &serde_json::Value,
    ) -> Result<RelayReply, BundleError> {
        let transport = |message: String| BundleError::Transport {
            endpoint: endpoint.to_string(),
            message,
        };

        let resp = self
            .http
            .post(endpoint)
            .json(body)
            .send()
            .await
            .map_err(|e| transport(e.to_string()))?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| transport(e.to_string()))?;
        if !status.is_success() {
            return Err(transport(format!("HTTP {}: {}", status, text)));
        }

        Ok(RelayReply {
            reply: serde_json::from_str::<JsonRpcReply>(&text).ok(),
        })
    }

    /// Apply the acceptance policy to one relay reply
    fn classify(&self, endpoint: &str, reply: RelayReply) -> Result<Option<String>, RelayFailure> {
        let bundle_id = reply
            .reply
            .as_ref()
            .and_then(|r| r.result.as_ref())
            .and_then(|v| v.as_str())
            .map(str::to_string);

        if self.policy == AcceptancePolicy::AnyResponse {
            return Ok(bundle_id);
        }

        match reply.reply {
            None => Err(RelayFailure {
                endpoint: endpoint.to_string(),
                kind: RelayFailureKind::Transport("malformed JSON-RPC response".to_string()),
            }),
            Some(JsonRpcReply {
                error: Some(err), ..
            }) => Err(RelayFailure {
                endpoint: endpoint.to_string(),
                kind: RelayFailureKind::Rejected {
                    code: err.code,
                    message: err.message,
                },
            }),
            Some(JsonRpcReply { result: None, .. }) => Err(RelayFailure {
                endpoint: endpoint.to_string(),
                kind: RelayFailureKind::Rejected {
                    code: None,
                    message: "missing result".to_string(),
                },
            }),
            Some(_) => Ok(bundle_id),
        }
    }
}

#[async_trait]
impl BundleBroadcaster for JitoBroadcaster {
    async fn broadcast(&self, bundle: &Bundle) -> Result<BroadcastOutcome, BundleError> {
        let encoded = bundle.encode(self.encoding)?;
        let body = Self::request_body(&encoded, self.encoding);
        let fee_signature = bundle.fee_signature();

        let body = &body;
        let timer = Timer::new();
        let results = join_all(
            self.endpoints
                .iter()
                .map(|endpoint| async move {
                    (endpoint, self.send_to_endpoint(endpoint, body).await)
                }),
        )
        .await;
        timer.observe_duration(&metrics().broadcast_latency);

        let mut accepted_by = Vec::new();
        let mut bundle_id = None;
        let mut failures = Vec::new();

        for (endpoint, result) in results {
            let verdict = match result {
                Ok(reply) => self.classify(endpoint, reply),
                Err(e) => {
                    let message = match e {
                        BundleError::Transport { message, .. } => message,
                        other => other.to_string(),
                    };
                    Err(RelayFailure {
                        endpoint: endpoint.clone(),
                        kind: RelayFailureKind::Transport(message),
                    })
                }
            };

            match verdict {
                Ok(id) => {
                    debug!(endpoint = %endpoint, bundle_id = ?id, "Relay accepted bundle");
                    metrics().record_relay(endpoint, "accepted");
                    if bundle_id.is_none() {
                        bundle_id = id;
                    }
                    accepted_by.push(endpoint.clone());
                }
                Err(failure) => {
                    warn!(
                        endpoint = %endpoint,
                        failure = ?failure.kind,
                        "Relay did not accept bundle"
                    );
                    let outcome = if failure.is_transport() { "transport" } else { "rejected" };
                    metrics().record_relay(endpoint, outcome);
                    failures.push(failure);
                }
            }
        }

        if accepted_by.is_empty() {
            metrics().bundles_not_accepted.inc();
            Ok(BroadcastOutcome::NoneAccepted { failures })
        } else {
            metrics().bundles_accepted.inc();
            Ok(BroadcastOutcome::AtLeastOneAccepted {
                fee_signature,
                accepted_by,
                bundle_id,
                failures,
            })
        }
    }

    fn endpoint_count(&self) -> usize {
        self.endpoints.len()
    }
}
