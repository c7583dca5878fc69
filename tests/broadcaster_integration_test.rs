//! Integration tests for the multi-region bundle broadcaster against
//! mock relay servers

mod common;

use std::time::Duration;

use common::{checkpoint, primary_tx};
use jito_seller::bundler::{
    AcceptancePolicy, BroadcastOutcome, BundleBroadcaster, JitoBroadcaster, RelayFailureKind,
};
use jito_seller::tx_builder::{build_fee_transaction, Bundle, BundleEncoding};
use mockito::{Matcher, Mock, Server, ServerGuard};
use serde_json::json;
use solana_sdk::{pubkey::Pubkey, signature::Keypair};

const ACCEPTED: &str = r#"{"jsonrpc":"2.0","id":1,"result":"b1e2c3"}"#;
const REJECTED: &str = concat!(
    r#"{"jsonrpc":"2.0","id":1,"error":"#,
    r#"{"code":-32602,"message":"bundle contains an expired blockhash"}}"#,
);

fn bundle() -> Bundle {
    let payer = Keypair::new();
    let cp = checkpoint(1_000);
    let fee = build_fee_transaction(&payer, &Pubkey::new_unique(), 10_000, &cp).unwrap();
    Bundle::new(fee, primary_tx(&payer, cp.blockhash)).unwrap()
}

/// One mock block engine region; the mock lives as long as the server
struct Relay {
    server: ServerGuard,
    _mock: Mock,
}

impl Relay {
    fn url(&self) -> String {
        self.server.url()
    }
}

fn broadcaster(relays: &[Relay], policy: AcceptancePolicy) -> JitoBroadcaster {
    JitoBroadcaster::new(
        relays.iter().map(|r| format!("{}/api/v1/bundles", r.url())).collect(),
        Duration::from_secs(2),
        BundleEncoding::Base58,
        policy,
    )
    .unwrap()
}

async fn relay(status: usize, body: &str) -> Relay {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/api/v1/bundles")
        .match_body(Matcher::PartialJson(json!({
            "jsonrpc": "2.0",
            "method": "sendBundle",
        })))
        .with_status(status)
        .with_header("content-type", "application/json")
        .with_body(body)
        .create_async()
        .await;
    Relay { server, _mock: mock }
}

#[tokio::test]
async fn test_partial_region_failure_still_accepted() {
    // A, B and D fail; C and E accept
    let servers = vec![
        relay(500, "internal error").await,
        relay(503, "unavailable").await,
        relay(200, ACCEPTED).await,
        relay(500, "internal error").await,
        relay(200, ACCEPTED).await,
    ];
    let broadcaster = broadcaster(&servers, AcceptancePolicy::RequireResult);
    let bundle = bundle();

    let outcome = broadcaster.broadcast(&bundle).await.unwrap();

    match outcome {
        BroadcastOutcome::AtLeastOneAccepted {
            fee_signature,
            accepted_by,
            bundle_id,
            failures,
        } => {
            assert_eq!(fee_signature, bundle.fee_signature());
            assert_eq!(accepted_by.len(), 2);
            assert!(accepted_by[0].starts_with(&servers[2].url()));
            assert!(accepted_by[1].starts_with(&servers[4].url()));
            assert_eq!(bundle_id.as_deref(), Some("b1e2c3"));
            assert_eq!(failures.len(), 3);
            assert!(failures.iter().all(|f| f.is_transport()));
        }
        other => panic!("expected acceptance, got {other:?}"),
    }
}

#[tokio::test]
async fn test_all_regions_down_is_none_accepted() {
    let servers = vec![relay(500, "").await, relay(502, "").await];
    let broadcaster = broadcaster(&servers, AcceptancePolicy::RequireResult);

    let outcome = broadcaster.broadcast(&bundle()).await.unwrap();

    assert!(!outcome.is_accepted());
    assert_eq!(outcome.failures().len(), 2);
}

#[tokio::test]
async fn test_unreachable_endpoint_is_isolated() {
    let server = relay(200, ACCEPTED).await;
    let broadcaster = JitoBroadcaster::new(
        vec![
            "http://127.0.0.1:1/api/v1/bundles".to_string(),
            format!("{}/api/v1/bundles", server.url()),
        ],
        Duration::from_secs(2),
        BundleEncoding::Base58,
        AcceptancePolicy::RequireResult,
    )
    .unwrap();

    let outcome = broadcaster.broadcast(&bundle()).await.unwrap();

    assert!(outcome.is_accepted());
    assert_eq!(outcome.failures().len(), 1);
    assert!(outcome.failures()[0].is_transport());
}

#[tokio::test]
async fn test_json_rpc_error_is_a_rejection() {
    let servers = vec![relay(200, REJECTED).await, relay(200, REJECTED).await];
    let broadcaster = broadcaster(&servers, AcceptancePolicy::RequireResult);

    let outcome = broadcaster.broadcast(&bundle()).await.unwrap();

    assert!(!outcome.is_accepted());
    for failure in outcome.failures() {
        match &failure.kind {
            RelayFailureKind::Rejected { code, message } => {
                assert_eq!(*code, Some(-32602));
                assert!(message.contains("expired blockhash"));
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_any_response_policy_counts_rejections() {
    let servers = vec![relay(200, REJECTED).await, relay(500, "").await];
    let broadcaster = broadcaster(&servers, AcceptancePolicy::AnyResponse);

    let outcome = broadcaster.broadcast(&bundle()).await.unwrap();

    assert!(outcome.is_accepted());
    assert_eq!(outcome.failures().len(), 1);
}

#[tokio::test]
async fn test_base64_bundle_declares_encoding() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/api/v1/bundles")
        .match_body(Matcher::Regex(r#"\{"encoding":"base64"\}"#.to_string()))
        .with_status(200)
        .with_body(ACCEPTED)
        .expect(1)
        .create_async()
        .await;

    let broadcaster = JitoBroadcaster::new(
        vec![format!("{}/api/v1/bundles", server.url())],
        Duration::from_secs(2),
        BundleEncoding::Base64,
        AcceptancePolicy::RequireResult,
    )
    .unwrap();

    assert!(broadcaster.broadcast(&bundle()).await.unwrap().is_accepted());
    mock.assert_async().await;
}
