use ethers::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use crate::artifact::ContractArtifact;

const POLL_INTERVAL: Duration = Duration::from_secs(2);

type DeployClient = SignerMiddleware<Provider<Http>, LocalWallet>;

#[derive(Error, Debug)]
pub enum DeployError {
    #[error("Invalid RPC url: {0}")]
    InvalidRpc(String),
    #[error("Invalid private key: {0}")]
    InvalidKey(String),
    #[error("RPC request failed: {0}")]
    Rpc(String),
    #[error("{0} has constructor arguments, which are not supported")]
    ConstructorArgs(String),
    #[error("Deployment failed: {0}")]
    Contract(String),
    #[error("Deployment transaction has no contract address in its receipt")]
    MissingAddress,
}

/// Where and how to publish
#[derive(Clone)]
pub struct DeployTarget {
    pub rpc_url: String,
    pub private_key: String,
    pub confirmations: usize,
}

impl std::fmt::Debug for DeployTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeployTarget")
            .field("rpc_url", &self.rpc_url)
            .field("private_key", &"<redacted>")
            .field("confirmations", &self.confirmations)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deployment {
    pub contract_name: String,
    pub address: Address,
    pub tx_hash: TxHash,
    pub block_number: Option<u64>,
    pub deployer: Address,
    pub chain_id: u64,
}

async fn connect(target: &DeployTarget) -> Result<Arc<DeployClient>, DeployError> {
    let provider = Provider::<Http>::try_from(target.rpc_url.as_str())
        .map_err(|e| DeployError::InvalidRpc(e.to_string()))?
        .interval(POLL_INTERVAL);

    let chain_id = provider
        .get_chainid()
        .await
        .map_err(|e| DeployError::Rpc(e.to_string()))?
        .as_u64();

    let wallet = target
        .private_key
        .trim()
        .parse::<LocalWallet>()
        .map_err(|e| DeployError::InvalidKey(e.to_string()))?
        .with_chain_id(chain_id);

    debug!(chain_id, deployer = ?wallet.address(), "connected to deployment network");
    Ok(Arc::new(SignerMiddleware::new(provider, wallet)))
}

/// Publish one new contract instance. Re-running deploys another instance;
/// nothing is rolled back on failure.
pub async fn deploy(
    artifact: &ContractArtifact,
    target: &DeployTarget,
) -> Result<Deployment, DeployError> {
    if artifact.has_constructor_args() {
        return Err(DeployError::ConstructorArgs(artifact.contract_name.clone()));
    }

    let client = connect(target).await?;
    let deployer = client.address();
    let chain_id = client.signer().chain_id();

    info!(
        contract = %artifact.contract_name,
        deployer = ?deployer,
        chain_id,
        bytecode_len = artifact.bytecode.len(),
        "submitting creation transaction"
    );

    let factory = ContractFactory::new(artifact.abi.clone(), artifact.bytecode.clone(), client);
    let (contract, receipt) = factory
        .deploy(())
        .map_err(|e| DeployError::Contract(e.to_string()))?
        .confirmations(target.confirmations)
        .send_with_receipt()
        .await
        .map_err(|e| DeployError::Contract(e.to_string()))?;

    let address = receipt.contract_address.unwrap_or_else(|| contract.address());
    if address == Address::zero() {
        return Err(DeployError::MissingAddress);
    }

    Ok(Deployment {
        contract_name: artifact.contract_name.clone(),
        address,
        tx_hash: receipt.transaction_hash,
        block_number: receipt.block_number.map(|n| n.as_u64()),
        deployer,
        chain_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_debug_redacts_key() {
        let target = DeployTarget {
            rpc_url: "http://localhost:8545".to_string(),
            private_key: "0xdeadbeef".to_string(),
            confirmations: 1,
        };
        let rendered = format!("{:?}", target);
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("deadbeef"));
    }

    #[tokio::test]
    async fn test_invalid_rpc_url_is_reported() {
        let target = DeployTarget {
            rpc_url: "not a url".to_string(),
            private_key: String::new(),
            confirmations: 1,
        };
        let err = connect(&target).await.unwrap_err();
        assert!(matches!(err, DeployError::InvalidRpc(_)));
    }
}
