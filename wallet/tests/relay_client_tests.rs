use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use ethers::types::TxHash;
use serde_json::{json, Value};
use shared::ContributionStatus;
use wallet::{RelayClient, RelayClientError};

const TX: &str = "0x7777777777777777777777777777777777777777777777777777777777777777";

async fn contribute(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    match body["amount"].as_str() {
        Some(amount) if !amount.is_empty() => (
            StatusCode::ACCEPTED,
            Json(json!({ "success": true, "txHash": TX, "status": "pending" })),
        ),
        _ => (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "Amount is required",
                "kind": "MissingInput",
                "code": 400,
                "timestamp": "2024-01-01T00:00:00Z",
                "correlationId": "test"
            })),
        ),
    }
}

/// Reports pending for the first `pending_polls` checks, then confirmed
async fn status(
    State(polls): State<Arc<(AtomicU32, u32)>>,
    Path(tx_hash): Path<String>,
) -> Json<Value> {
    let seen = polls.0.fetch_add(1, Ordering::SeqCst);
    let status = if seen < polls.1 { "pending" } else { "confirmed" };
    Json(json!({
        "txHash": tx_hash,
        "amount": "1.5",
        "value": "1500000000000000000",
        "status": status,
        "blockNumber": 42,
        "submittedAt": "2024-01-01T00:00:00Z",
        "updatedAt": "2024-01-01T00:00:05Z"
    }))
}

async fn spawn_relay(pending_polls: u32) -> String {
    let app = Router::new()
        .route("/api/contribute", post(contribute))
        .route("/api/contribute/:tx_hash", get(status))
        .with_state(Arc::new((AtomicU32::new(0), pending_polls)));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn test_contribute_returns_pending_reference() {
    let client = RelayClient::new(spawn_relay(0).await);

    let response = client.contribute("1.5").await.unwrap();

    assert!(response.success);
    assert_eq!(response.status, ContributionStatus::Pending);
    assert_eq!(response.tx_hash, TX.parse::<TxHash>().unwrap());
}

#[tokio::test]
async fn test_relay_errors_are_decoded() {
    let client = RelayClient::new(spawn_relay(0).await);

    let err = client.contribute("").await.unwrap_err();

    match err {
        RelayClientError::Api { status, kind, message } => {
            assert_eq!(status, 400);
            assert_eq!(kind, "MissingInput");
            assert_eq!(message, "Amount is required");
        }
        other => panic!("expected API error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_wait_for_final_polls_until_confirmed() {
    let client = RelayClient::new(spawn_relay(2).await).with_polling(
        Duration::from_millis(5),
        Duration::from_millis(20),
        10,
    );

    let record = client
        .wait_for_final(TX.parse().unwrap())
        .await
        .unwrap();

    assert_eq!(record.status, ContributionStatus::Confirmed);
    assert_eq!(record.block_number, Some(42));
    assert_eq!(record.value, "1500000000000000000");
}

#[tokio::test]
async fn test_wait_for_final_gives_up() {
    let client = RelayClient::new(spawn_relay(u32::MAX).await).with_polling(
        Duration::from_millis(1),
        Duration::from_millis(2),
        3,
    );

    let err = client.wait_for_final(TX.parse().unwrap()).await.unwrap_err();
    assert!(matches!(err, RelayClientError::StillPending(3)));
}
