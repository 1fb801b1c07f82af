//! Server-side signing service.
//!
//! Request handling only sees [`ContributionSigner`]; the ethers-backed
//! implementation owns the relay credential, so a key-management service can
//! replace it without touching the HTTP layer.

use async_trait::async_trait;
use ethers::abi::{Abi, StateMutability};
use ethers::prelude::*;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::ChainConfig;

/// Interface used when no ABI file is configured
pub const DEFAULT_CROWDFUND_ABI: &[&str] = &[
    "function contribute() external payable",
    "event Contribution(address indexed from, uint amount)",
];

const CONTRIBUTE_METHOD: &str = "contribute";
const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignerError {
    #[error("Signer setup failed: {0}")]
    Setup(String),
    #[error("Contract interface error: {0}")]
    Abi(String),
    #[error("{0}")]
    Submission(String),
    #[error("{0}")]
    Confirmation(String),
    #[error("Transaction {0:?} was dropped before confirmation")]
    Dropped(TxHash),
    #[error("Transaction {0:?} reverted")]
    Reverted(TxHash),
    #[error("Timed out after {0}s waiting for confirmation")]
    Timeout(u64),
}

/// Outcome of waiting for a transaction to be mined
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    pub tx_hash: TxHash,
    pub block_number: Option<u64>,
    pub succeeded: bool,
}

/// Sign-and-broadcast service for relayed contributions
#[async_trait]
pub trait ContributionSigner: Send + Sync {
    /// Account that signs every relayed contribution
    fn relay_address(&self) -> Address;

    /// Broadcast one `contribute()` call carrying `value` base units
    async fn submit(&self, value: U256) -> Result<TxHash, SignerError>;

    /// Wait (unbounded) until the transaction is mined with the configured depth
    async fn await_confirmation(&self, tx_hash: TxHash) -> Result<Confirmation, SignerError>;

    async fn latest_block(&self) -> Result<u64, SignerError>;
}

type RelayClient = NonceManagerMiddleware<SignerMiddleware<Provider<Http>, LocalWallet>>;

/// ethers-backed signer holding the relay's private key
pub struct EthersContributionSigner {
    client: Arc<RelayClient>,
    contract: Contract<RelayClient>,
    address: Address,
    confirmations: usize,
    broadcast: Mutex<()>,
}

impl EthersContributionSigner {
    pub fn connect(config: &ChainConfig, confirmations: usize) -> Result<Self, SignerError> {
        let abi = match &config.abi_path {
            Some(path) => load_abi(path)?,
            None => default_abi()?,
        };
        ensure_payable_contribute(&abi)?;

        let provider = Provider::<Http>::try_from(config.rpc_url.as_str())
            .map_err(|e| SignerError::Setup(format!("invalid RPC url: {}", e)))?
            .interval(RECEIPT_POLL_INTERVAL);

        let wallet = config
            .private_key
            .trim()
            .parse::<LocalWallet>()
            .map_err(|e| SignerError::Setup(format!("invalid private key: {}", e)))?
            .with_chain_id(config.chain_id);
        let address = wallet.address();

        // Nonce manager outermost: it assigns nonces and the signer keeps them
        let signer = SignerMiddleware::new(provider, wallet);
        let client = Arc::new(NonceManagerMiddleware::new(signer, address));
        let contract = Contract::new(config.contract_address, abi, client.clone());

        info!(
            relay_address = ?address,
            contract = ?config.contract_address,
            chain_id = config.chain_id,
            "Contribution signer ready"
        );

        Ok(Self {
            client,
            contract,
            address,
            confirmations,
            broadcast: Mutex::new(()),
        })
    }
}

#[async_trait]
impl ContributionSigner for EthersContributionSigner {
    fn relay_address(&self) -> Address {
        self.address
    }

    async fn submit(&self, value: U256) -> Result<TxHash, SignerError> {
        let call = self
            .contract
            .method::<_, ()>(CONTRIBUTE_METHOD, ())
            .map_err(|e| SignerError::Abi(e.to_string()))?
            .value(value);

        // Serialize broadcasts so nonces go out in submission order
        let _guard = self.broadcast.lock().await;
        let pending = call
            .send()
            .await
            .map_err(|e| SignerError::Submission(e.to_string()))?;
        let tx_hash = *pending;

        debug!(tx_hash = ?tx_hash, value = %value, "contribution broadcast");
        Ok(tx_hash)
    }

    async fn await_confirmation(&self, tx_hash: TxHash) -> Result<Confirmation, SignerError> {
        let receipt = PendingTransaction::new(tx_hash, self.client.provider())
            .interval(RECEIPT_POLL_INTERVAL)
            .confirmations(self.confirmations)
            .await
            .map_err(|e| SignerError::Confirmation(e.to_string()))?
            .ok_or(SignerError::Dropped(tx_hash))?;

        Ok(Confirmation {
            tx_hash,
            block_number: receipt.block_number.map(|n| n.as_u64()),
            succeeded: receipt.status == Some(U64::one()),
        })
    }

    async fn latest_block(&self) -> Result<u64, SignerError> {
        self.client
            .get_block_number()
            .await
            .map(|n| n.as_u64())
            .map_err(|e| SignerError::Confirmation(e.to_string()))
    }
}

pub fn default_abi() -> Result<Abi, SignerError> {
    ethers::abi::parse_abi(DEFAULT_CROWDFUND_ABI).map_err(|e| SignerError::Abi(e.to_string()))
}

/// Load a contract interface from either a bare ABI array or a Hardhat
/// artifact (`{ "abi": [...], "bytecode": ... }`).
pub fn load_abi(path: &Path) -> Result<Abi, SignerError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| SignerError::Abi(format!("cannot read {}: {}", path.display(), e)))?;
    parse_abi_json(&raw)
}

pub fn parse_abi_json(raw: &str) -> Result<Abi, SignerError> {
    let value: serde_json::Value =
        serde_json::from_str(raw).map_err(|e| SignerError::Abi(e.to_string()))?;
    let abi_value = match value {
        serde_json::Value::Object(mut artifact) => artifact
            .remove("abi")
            .ok_or_else(|| SignerError::Abi("artifact has no `abi` field".to_string()))?,
        other => other,
    };
    serde_json::from_value(abi_value).map_err(|e| SignerError::Abi(e.to_string()))
}

pub fn ensure_payable_contribute(abi: &Abi) -> Result<(), SignerError> {
    let function = abi
        .function(CONTRIBUTE_METHOD)
        .map_err(|_| SignerError::Abi("interface has no `contribute` function".to_string()))?;

    if !function.inputs.is_empty() {
        return Err(SignerError::Abi(
            "`contribute` must not take arguments".to_string(),
        ));
    }
    if function.state_mutability != StateMutability::Payable {
        return Err(SignerError::Abi("`contribute` must be payable".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_abi_has_payable_contribute() {
        let abi = default_abi().unwrap();
        ensure_payable_contribute(&abi).unwrap();
        assert!(abi.event("Contribution").is_ok());
    }

    #[test]
    fn test_parse_bare_abi_array() {
        let raw = r#"[
            {"type":"function","name":"contribute","inputs":[],"outputs":[],"stateMutability":"payable"}
        ]"#;
        let abi = parse_abi_json(raw).unwrap();
        ensure_payable_contribute(&abi).unwrap();
    }

    #[test]
    fn test_parse_hardhat_artifact() {
        let raw = r#"{
            "contractName": "CrowdFund",
            "abi": [
                {"type":"function","name":"contribute","inputs":[],"outputs":[],"stateMutability":"payable"}
            ],
            "bytecode": "0x6080"
        }"#;
        let abi = parse_abi_json(raw).unwrap();
        assert!(abi.function("contribute").is_ok());
    }

    #[test]
    fn test_rejects_non_payable_contribute() {
        let raw = r#"[
            {"type":"function","name":"contribute","inputs":[],"outputs":[],"stateMutability":"nonpayable"}
        ]"#;
        let abi = parse_abi_json(raw).unwrap();
        assert_eq!(
            ensure_payable_contribute(&abi),
            Err(SignerError::Abi("`contribute` must be payable".to_string()))
        );
    }

    #[test]
    fn test_rejects_interface_without_contribute() {
        let abi = ethers::abi::parse_abi(&["function withdraw() external"]).unwrap();
        assert!(ensure_payable_contribute(&abi).is_err());
    }

    #[test]
    fn test_artifact_without_abi_is_rejected() {
        assert!(parse_abi_json(r#"{"bytecode":"0x00"}"#).is_err());
    }

    #[test]
    fn test_connect_rejects_bad_private_key() {
        let config = ChainConfig {
            network: shared::Network::Localhost,
            chain_id: 31337,
            rpc_url: "http://127.0.0.1:8545".to_string(),
            private_key: "not-a-key".to_string(),
            contract_address: Address::zero(),
            abi_path: None,
        };
        assert!(matches!(
            EthersContributionSigner::connect(&config, 1),
            Err(SignerError::Setup(_))
        ));
    }

    #[test]
    fn test_connect_derives_relay_address() {
        let config = ChainConfig {
            network: shared::Network::Localhost,
            chain_id: 31337,
            rpc_url: "http://127.0.0.1:8545".to_string(),
            // well-known first hardhat development account
            private_key: "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80"
                .to_string(),
            contract_address: Address::zero(),
            abi_path: None,
        };
        let signer = EthersContributionSigner::connect(&config, 1).unwrap();
        assert_eq!(
            signer.relay_address(),
            "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266".parse::<Address>().unwrap()
        );
    }
}
