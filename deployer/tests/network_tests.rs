/// Deployment and explorer verification against in-process mock services

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::{Form, Query, State},
    routing::post,
    Json, Router,
};
use deployer::{
    deploy, ContractArtifact, DeployTarget, ExplorerClient, ExplorerError, VerificationRequest,
    VerificationStatus,
};
use ethers::types::{
    transaction::eip2718::TypedTransaction, Address, Bytes, Transaction, TransactionReceipt, H256,
    U64,
};
use ethers::utils::{keccak256, rlp::Rlp};
use serde_json::{json, Value};

const HARDHAT_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
const HARDHAT_ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";
const MINED_IN_BLOCK: u64 = 7;

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

// ── JSON-RPC node ───────────────────────────────────────────────────────────

#[derive(Default)]
struct Chain {
    creation_data: Option<Bytes>,
}

fn created_address() -> Address {
    Address::repeat_byte(0xc0)
}

async fn rpc(State(chain): State<Arc<Mutex<Chain>>>, Json(request): Json<Value>) -> Json<Value> {
    let params = &request["params"];
    let result = match request["method"].as_str().unwrap_or_default() {
        // a legacy-fee chain keeps the node down to gas price and estimate calls
        "eth_chainId" => json!("0x38"),
        "eth_getTransactionCount" => json!("0x0"),
        "eth_gasPrice" => json!("0x3b9aca00"),
        "eth_estimateGas" => json!("0x2dc6c0"),
        "eth_blockNumber" => json!(format!("{:#x}", MINED_IN_BLOCK + 1)),
        "eth_sendRawTransaction" => {
            let raw: Bytes = serde_json::from_value(params[0].clone()).unwrap();
            let (tx, _signature) = TypedTransaction::decode_signed(&Rlp::new(&raw)).unwrap();
            chain.lock().unwrap().creation_data = tx.data().cloned();
            json!(H256::from(keccak256(&raw)))
        }
        "eth_getTransactionByHash" => {
            let hash: H256 = serde_json::from_value(params[0].clone()).unwrap();
            serde_json::to_value(Transaction {
                hash,
                block_hash: Some(H256::repeat_byte(0xbb)),
                block_number: Some(U64::from(MINED_IN_BLOCK)),
                transaction_index: Some(U64::zero()),
                ..Default::default()
            })
            .unwrap()
        }
        "eth_getTransactionReceipt" => {
            let hash: H256 = serde_json::from_value(params[0].clone()).unwrap();
            serde_json::to_value(TransactionReceipt {
                transaction_hash: hash,
                block_hash: Some(H256::repeat_byte(0xbb)),
                block_number: Some(U64::from(MINED_IN_BLOCK)),
                contract_address: Some(created_address()),
                status: Some(U64::one()),
                ..Default::default()
            })
            .unwrap()
        }
        other => {
            return Json(json!({
                "jsonrpc": "2.0",
                "id": request["id"],
                "error": { "code": -32601, "message": format!("method {} not supported", other) }
            }))
        }
    };

    Json(json!({ "jsonrpc": "2.0", "id": request["id"], "result": result }))
}

fn crowdfund_artifact() -> ContractArtifact {
    ContractArtifact::parse(
        &json!({
            "contractName": "CrowdFund",
            "abi": [
                { "inputs": [], "name": "contribute", "outputs": [], "stateMutability": "payable", "type": "function" }
            ],
            "bytecode": "0x608060405234801561001057600080fd5b50"
        })
        .to_string(),
    )
    .unwrap()
}

#[tokio::test]
async fn test_deploy_returns_address_from_receipt() {
    let chain = Arc::new(Mutex::new(Chain::default()));
    let rpc_url = serve(Router::new().route("/", post(rpc)).with_state(chain.clone())).await;
    let artifact = crowdfund_artifact();

    let deployment = deploy(
        &artifact,
        &DeployTarget {
            rpc_url,
            private_key: HARDHAT_KEY.to_string(),
            confirmations: 1,
        },
    )
    .await
    .unwrap();

    assert_eq!(deployment.address, created_address());
    assert_eq!(deployment.contract_name, "CrowdFund");
    assert_eq!(deployment.block_number, Some(MINED_IN_BLOCK));
    assert_eq!(deployment.chain_id, 56);
    assert_eq!(deployment.deployer, HARDHAT_ADDRESS.parse::<Address>().unwrap());

    // the creation transaction carries the artifact bytecode
    let sent = chain.lock().unwrap().creation_data.clone().unwrap();
    assert_eq!(sent, artifact.bytecode);
}

// ── Explorer API ────────────────────────────────────────────────────────────

struct Explorer {
    submission: Value,
    pending_checks: u32,
    status_checks: u32,
    submitted_form: HashMap<String, String>,
    polled_guids: Vec<String>,
}

impl Explorer {
    fn new(submission: Value, pending_checks: u32) -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(Self {
            submission,
            pending_checks,
            status_checks: 0,
            submitted_form: HashMap::new(),
            polled_guids: Vec::new(),
        }))
    }
}

async fn submit_source(
    State(explorer): State<Arc<Mutex<Explorer>>>,
    Form(form): Form<HashMap<String, String>>,
) -> Json<Value> {
    let mut explorer = explorer.lock().unwrap();
    explorer.submitted_form = form;
    Json(explorer.submission.clone())
}

async fn check_status(
    State(explorer): State<Arc<Mutex<Explorer>>>,
    Query(query): Query<HashMap<String, String>>,
) -> Json<Value> {
    let mut explorer = explorer.lock().unwrap();
    explorer.status_checks += 1;
    explorer
        .polled_guids
        .push(query.get("guid").cloned().unwrap_or_default());

    if explorer.status_checks <= explorer.pending_checks {
        Json(json!({ "status": "0", "message": "NOTOK", "result": "Pending in queue" }))
    } else {
        Json(json!({ "status": "1", "message": "OK", "result": "Pass - Verified" }))
    }
}

async fn explorer_client(explorer: Arc<Mutex<Explorer>>, max_status_checks: u32) -> ExplorerClient {
    let app = Router::new()
        .route("/api", post(submit_source).get(check_status))
        .with_state(explorer);
    let base = serve(app).await;

    ExplorerClient::new(format!("{}/api", base), "TESTKEY").with_polling(
        Duration::from_millis(1),
        Duration::from_millis(5),
        max_status_checks,
    )
}

fn request() -> VerificationRequest {
    VerificationRequest::new(
        Address::repeat_byte(0x42),
        "CrowdFund",
        "pragma solidity ^0.8.14; contract CrowdFund {}",
    )
}

#[tokio::test]
async fn test_verify_polls_until_pass() {
    let explorer = Explorer::new(json!({ "status": "1", "message": "OK", "result": "guid-123" }), 2);
    let client = explorer_client(explorer.clone(), 10).await;

    let status = client.verify(&request()).await.unwrap();

    assert_eq!(status, VerificationStatus::Verified);
    let explorer = explorer.lock().unwrap();
    assert_eq!(explorer.status_checks, 3);
    assert!(explorer.polled_guids.iter().all(|guid| guid == "guid-123"));
    assert_eq!(explorer.submitted_form["action"], "verifysourcecode");
    assert_eq!(explorer.submitted_form["apikey"], "TESTKEY");
    assert_eq!(
        explorer.submitted_form["contractaddress"],
        "0x4242424242424242424242424242424242424242"
    );
}

#[tokio::test]
async fn test_already_verified_submission_skips_polling() {
    let explorer = Explorer::new(
        json!({ "status": "0", "message": "NOTOK", "result": "Contract source code already verified" }),
        0,
    );
    let client = explorer_client(explorer.clone(), 10).await;

    let status = client.verify(&request()).await.unwrap();

    assert_eq!(status, VerificationStatus::AlreadyVerified);
    assert_eq!(explorer.lock().unwrap().status_checks, 0);
}

#[tokio::test]
async fn test_verify_gives_up_after_status_cap() {
    let explorer = Explorer::new(
        json!({ "status": "1", "message": "OK", "result": "guid-slow" }),
        u32::MAX,
    );
    let client = explorer_client(explorer.clone(), 3).await;

    let err = client.verify(&request()).await.unwrap_err();

    assert!(matches!(err, ExplorerError::GaveUp(3)));
    assert_eq!(explorer.lock().unwrap().status_checks, 3);
}

#[tokio::test]
async fn test_rejected_submission_is_an_error() {
    let explorer = Explorer::new(
        json!({ "status": "0", "message": "NOTOK", "result": "Invalid API Key" }),
        0,
    );
    let client = explorer_client(explorer, 10).await;

    let err = client.verify(&request()).await.unwrap_err();
    assert!(matches!(err, ExplorerError::Rejected(message) if message.contains("Invalid API Key")));
}
