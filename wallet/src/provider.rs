//! Seams to the two external collaborators of the client flow: the injected
//! wallet and the identity provider.

use async_trait::async_trait;
use ethers::types::{Address, Bytes, TransactionRequest, TxHash, U256};
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// Gas limit attached to every direct contribution
pub const CONTRIBUTION_GAS_LIMIT: u64 = 100_000;

/// A `contribute()` call ready to hand to the wallet for signing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContributionTx {
    pub from: Address,
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
    pub gas_limit: U256,
}

impl ContributionTx {
    pub fn new(from: Address, contract: Address, value: U256) -> Self {
        Self {
            from,
            to: contract,
            value,
            data: contribute_calldata(),
            gas_limit: U256::from(CONTRIBUTION_GAS_LIMIT),
        }
    }

    /// `eth_sendTransaction` parameters
    pub fn to_request(&self) -> TransactionRequest {
        TransactionRequest::new()
            .from(self.from)
            .to(self.to)
            .value(self.value)
            .data(self.data.clone())
            .gas(self.gas_limit)
    }
}

/// Selector of `contribute()`, the whole calldata since it takes no arguments
pub fn contribute_calldata() -> Bytes {
    Bytes::from(ethers::utils::id("contribute()").to_vec())
}

/// Injected wallet (EIP-1193 style). Chain ids come back as the wallet
/// reports them, usually hex (`0x89`).
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// `eth_requestAccounts`
    async fn request_accounts(&self) -> Result<Vec<Address>, ProviderError>;

    /// `eth_chainId`
    async fn chain_id(&self) -> Result<String, ProviderError>;

    /// `wallet_switchEthereumChain`
    async fn switch_chain(&self, chain_id_hex: &str) -> Result<(), ProviderError>;

    async fn balance(&self, account: Address) -> Result<U256, ProviderError>;

    /// Sign with the user's key and broadcast
    async fn send_transaction(&self, tx: &ContributionTx) -> Result<TxHash, ProviderError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub uid: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FederatedProvider {
    Google,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_up(&self, email: &str, password: &str) -> Result<User, ProviderError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<User, ProviderError>;

    async fn sign_in_federated(&self, provider: FederatedProvider) -> Result<User, ProviderError>;

    async fn sign_out(&self) -> Result<(), ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contribute_selector() {
        assert_eq!(contribute_calldata().to_vec(), vec![0xd7, 0xbb, 0x99, 0xba]);
    }

    #[test]
    fn test_transaction_request_fields() {
        let from = Address::repeat_byte(0x01);
        let contract = Address::repeat_byte(0x02);
        let tx = ContributionTx::new(from, contract, U256::exp10(18));
        let request = tx.to_request();

        assert_eq!(request.from, Some(from));
        assert_eq!(request.to, Some(contract.into()));
        assert_eq!(request.value, Some(U256::exp10(18)));
        assert_eq!(request.gas, Some(U256::from(100_000u64)));
        assert_eq!(request.data, Some(contribute_calldata()));
    }
}
