//! Client wallet session.
//!
//! The flow state is never stored; it is derived from which session fields are
//! populated, so it cannot drift from the data it describes.

use ethers::types::{Address, TxHash, U256};
use shared::{format_ether, parse_chain_id, parse_ether, Network};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::WalletError;
use crate::provider::{ContributionTx, FederatedProvider, IdentityProvider, User, WalletProvider};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalletState {
    Unauthenticated,
    Authenticated,
    WalletConnected,
    WrongNetwork,
    Ready,
}

impl fmt::Display for WalletState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            WalletState::Unauthenticated => "unauthenticated",
            WalletState::Authenticated => "authenticated",
            WalletState::WalletConnected => "wallet-connected",
            WalletState::WrongNetwork => "wrong-network",
            WalletState::Ready => "ready",
        };
        f.write_str(label)
    }
}

pub struct WalletSession {
    identity: Arc<dyn IdentityProvider>,
    wallet: Option<Arc<dyn WalletProvider>>,
    network: Network,
    contract: Address,

    user: Option<User>,
    account: Option<Address>,
    chain_id: Option<u64>,
    balance: Option<U256>,
    amount: String,
}

impl WalletSession {
    /// `wallet` is `None` when no provider was injected into the page.
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        wallet: Option<Arc<dyn WalletProvider>>,
        network: Network,
        contract: Address,
    ) -> Self {
        Self {
            identity,
            wallet,
            network,
            contract,
            user: None,
            account: None,
            chain_id: None,
            balance: None,
            amount: String::new(),
        }
    }

    pub fn state(&self) -> WalletState {
        match (&self.user, self.account, self.chain_id) {
            (None, _, _) => WalletState::Unauthenticated,
            (Some(_), None, _) => WalletState::Authenticated,
            (Some(_), Some(_), None) => WalletState::WalletConnected,
            (Some(_), Some(_), Some(chain)) if chain == self.network.chain_id() => {
                WalletState::Ready
            }
            (Some(_), Some(_), Some(_)) => WalletState::WrongNetwork,
        }
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn account(&self) -> Option<Address> {
        self.account
    }

    pub fn chain_id(&self) -> Option<u64> {
        self.chain_id
    }

    pub fn balance(&self) -> Option<U256> {
        self.balance
    }

    /// Cached balance in whole currency units, e.g. `12.5`
    pub fn balance_display(&self) -> Option<String> {
        self.balance.map(format_ether)
    }

    pub fn network(&self) -> Network {
        self.network
    }

    // ── Identity ────────────────────────────────────────────────────────────

    pub async fn sign_up(&mut self, email: &str, password: &str) -> Result<WalletState, WalletError> {
        let user = self
            .identity
            .sign_up(email, password)
            .await
            .map_err(|e| WalletError::AuthFailed(e.message))?;
        info!(uid = %user.uid, "signed up");
        self.user = Some(user);
        Ok(self.state())
    }

    pub async fn sign_in(&mut self, email: &str, password: &str) -> Result<WalletState, WalletError> {
        let user = self
            .identity
            .sign_in(email, password)
            .await
            .map_err(|e| WalletError::AuthFailed(e.message))?;
        info!(uid = %user.uid, "signed in");
        self.user = Some(user);
        Ok(self.state())
    }

    pub async fn sign_in_federated(
        &mut self,
        provider: FederatedProvider,
    ) -> Result<WalletState, WalletError> {
        let user = self
            .identity
            .sign_in_federated(provider)
            .await
            .map_err(|e| WalletError::AuthFailed(e.message))?;
        info!(uid = %user.uid, ?provider, "signed in with federated provider");
        self.user = Some(user);
        Ok(self.state())
    }

    /// Session notification from the identity provider
    pub fn on_auth_state_changed(&mut self, user: Option<User>) {
        if user.is_none() {
            self.clear_wallet();
        }
        self.user = user;
    }

    pub async fn sign_out(&mut self) -> Result<WalletState, WalletError> {
        self.identity
            .sign_out()
            .await
            .map_err(|e| WalletError::AuthFailed(e.message))?;
        self.user = None;
        self.clear_wallet();
        info!("signed out");
        Ok(self.state())
    }

    // ── Wallet ──────────────────────────────────────────────────────────────

    fn wallet(&self) -> Result<Arc<dyn WalletProvider>, WalletError> {
        self.wallet.clone().ok_or(WalletError::NoWalletProvider)
    }

    fn require_user(&self) -> Result<(), WalletError> {
        self.user
            .as_ref()
            .map(|_| ())
            .ok_or(WalletError::NotAuthenticated)
    }

    fn require_account(&self) -> Result<Address, WalletError> {
        self.account.ok_or(WalletError::NoAccount)
    }

    async fn read_chain_id(&mut self) -> Result<u64, WalletError> {
        let raw = self
            .wallet()?
            .chain_id()
            .await
            .map_err(WalletError::from_request)?;
        let chain_id = parse_chain_id(&raw)
            .ok_or_else(|| WalletError::Provider(format!("unparseable chain id '{}'", raw)))?;
        self.chain_id = Some(chain_id);
        Ok(chain_id)
    }

    pub async fn connect_wallet(&mut self) -> Result<WalletState, WalletError> {
        self.require_user()?;
        let wallet = self.wallet()?;

        let accounts = wallet
            .request_accounts()
            .await
            .map_err(WalletError::from_request)?;
        let account = accounts.first().copied().ok_or(WalletError::NoAccount)?;

        self.account = Some(account);
        self.balance = None;
        let chain_id = self.read_chain_id().await?;
        info!(account = ?account, chain_id, "wallet connected");

        if let Err(err) = self.refresh_balance().await {
            warn!(error = %err, "balance refresh after connect failed");
        }

        Ok(self.state())
    }

    pub async fn check_network(&mut self) -> Result<WalletState, WalletError> {
        self.require_account()?;
        self.read_chain_id().await?;
        Ok(self.state())
    }

    /// Ask the wallet to move to the required network, then reconnect
    pub async fn switch_network(&mut self) -> Result<WalletState, WalletError> {
        let wallet = self.wallet()?;
        let target = self.network.chain_id_hex();

        wallet
            .switch_chain(&target)
            .await
            .map_err(WalletError::from_request)?;
        debug!(chain = %target, "wallet switched chain");

        self.connect_wallet().await
    }

    pub async fn refresh_balance(&mut self) -> Result<U256, WalletError> {
        let account = self.require_account()?;
        let balance = self
            .wallet()?
            .balance(account)
            .await
            .map_err(WalletError::from_request)?;
        self.balance = Some(balance);
        Ok(balance)
    }

    pub fn disconnect_wallet(&mut self) {
        self.clear_wallet();
    }

    pub fn on_accounts_changed(&mut self, accounts: &[Address]) {
        match accounts.first() {
            Some(account) => {
                self.account = Some(*account);
                self.balance = None;
            }
            None => self.clear_wallet(),
        }
    }

    /// `chainChanged` carries the new id in wallet format (`0x89`)
    pub fn on_chain_changed(&mut self, chain_id: &str) {
        self.chain_id = parse_chain_id(chain_id);
        self.balance = None;
    }

    fn clear_wallet(&mut self) {
        self.account = None;
        self.chain_id = None;
        self.balance = None;
    }

    // ── Contribution ────────────────────────────────────────────────────────

    pub fn set_amount(&mut self, amount: impl Into<String>) {
        self.amount = amount.into();
    }

    pub fn amount(&self) -> &str {
        &self.amount
    }

    /// Send a contribution signed by the user's own wallet.
    ///
    /// The chain id is re-read first and a mismatch stops here, before any
    /// transaction exists. The draft amount survives a failed send and is
    /// cleared after a successful one.
    pub async fn contribute(&mut self) -> Result<TxHash, WalletError> {
        self.require_user()?;
        let wallet = self.wallet()?;
        let from = self.require_account()?;

        let expected = self.network.chain_id();
        let actual = self.read_chain_id().await?;
        if actual != expected {
            warn!(expected, actual, "contribution blocked on wrong network");
            return Err(WalletError::WrongNetwork { expected, actual });
        }

        let value = parse_ether(&self.amount)?;
        let tx = ContributionTx::new(from, self.contract, value);

        let tx_hash = wallet
            .send_transaction(&tx)
            .await
            .map_err(WalletError::from_send)?;
        info!(tx_hash = ?tx_hash, value = %value, "contribution sent from wallet");

        self.amount.clear();
        if let Err(err) = self.refresh_balance().await {
            warn!(error = %err, "balance refresh after contribution failed");
        }

        Ok(tx_hash)
    }
}
