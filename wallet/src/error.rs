//! Closed error taxonomy for the client wallet flow.
//!
//! Injected wallets (EIP-1193) and their client libraries report failures as
//! a numeric or symbolic `code` plus a free-form message. Every such failure
//! is mapped through one table into [`WalletError`], so callers match on a
//! fixed set of kinds instead of inspecting error shapes.

use serde::{Deserialize, Serialize};
use shared::{AmountError, Network};
use std::fmt;
use thiserror::Error;

/// `code` as reported by the provider: EIP-1193 numbers (`4001`) or
/// ethers-style symbols (`ACTION_REJECTED`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProviderCode {
    Numeric(i64),
    Symbolic(String),
}

impl fmt::Display for ProviderCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderCode::Numeric(code) => write!(f, "{}", code),
            ProviderCode::Symbolic(code) => write!(f, "{}", code),
        }
    }
}

/// Raw failure from a wallet or identity provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderError {
    #[serde(default)]
    pub code: Option<ProviderCode>,
    #[serde(default)]
    pub message: String,
}

impl ProviderError {
    pub fn numeric(code: i64, message: impl Into<String>) -> Self {
        Self {
            code: Some(ProviderCode::Numeric(code)),
            message: message.into(),
        }
    }

    pub fn symbolic(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(ProviderCode::Symbolic(code.into())),
            message: message.into(),
        }
    }

    pub fn uncoded(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "[{}] {}", code, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for ProviderError {}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    #[error("Not signed in")]
    NotAuthenticated,
    #[error("Authentication failed: {0}")]
    AuthFailed(String),
    #[error("No injected wallet provider")]
    NoWalletProvider,
    #[error("Wallet exposed no account")]
    NoAccount,
    #[error("Wrong network: expected chain {expected}, wallet is on {actual}")]
    WrongNetwork { expected: u64, actual: u64 },
    #[error("Wallet does not know the requested chain")]
    UnrecognizedChain,
    #[error("User rejected the request")]
    UserRejected,
    #[error("Insufficient funds")]
    InsufficientFunds,
    #[error("Wallet is disconnected")]
    Disconnected,
    #[error("Invalid amount: {0}")]
    InvalidAmount(#[from] AmountError),
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),
    #[error("Wallet provider error: {0}")]
    Provider(String),
}

/// Which provider call failed; decides the fallback kind for unknown codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderCall {
    Request,
    Send,
}

/// Map a provider failure to a wallet error kind.
///
/// | code | kind |
/// |---|---|
/// | `4001`, `ACTION_REJECTED` | `UserRejected` |
/// | `4902` | `UnrecognizedChain` |
/// | `4100` | `NoAccount` |
/// | `4900`, `4901` | `Disconnected` |
/// | `INSUFFICIENT_FUNDS`; `-32000` reporting insufficient funds | `InsufficientFunds` |
/// | anything else | `Provider`, or `TransactionFailed` for sends |
pub fn classify(err: &ProviderError, call: ProviderCall) -> WalletError {
    let insufficient_message = err.message.to_lowercase().contains("insufficient funds");

    match &err.code {
        Some(ProviderCode::Numeric(4001)) => WalletError::UserRejected,
        Some(ProviderCode::Numeric(4902)) => WalletError::UnrecognizedChain,
        Some(ProviderCode::Numeric(4100)) => WalletError::NoAccount,
        Some(ProviderCode::Numeric(4900 | 4901)) => WalletError::Disconnected,
        Some(ProviderCode::Numeric(-32000)) if insufficient_message => {
            WalletError::InsufficientFunds
        }
        Some(ProviderCode::Symbolic(code)) if code == "ACTION_REJECTED" => {
            WalletError::UserRejected
        }
        Some(ProviderCode::Symbolic(code)) if code == "INSUFFICIENT_FUNDS" => {
            WalletError::InsufficientFunds
        }
        _ => match call {
            ProviderCall::Request => WalletError::Provider(err.to_string()),
            ProviderCall::Send => WalletError::TransactionFailed(err.to_string()),
        },
    }
}

impl WalletError {
    pub fn from_request(err: ProviderError) -> Self {
        classify(&err, ProviderCall::Request)
    }

    pub fn from_send(err: ProviderError) -> Self {
        classify(&err, ProviderCall::Send)
    }

    /// Short message suitable for showing to the person at the keyboard
    pub fn user_message(&self) -> String {
        match self {
            WalletError::NotAuthenticated => "Please log in first.".to_string(),
            WalletError::AuthFailed(reason) => format!("Login error: {}", reason),
            WalletError::NoWalletProvider => "Install MetaMask!".to_string(),
            WalletError::NoAccount => "Connect a wallet account first.".to_string(),
            WalletError::WrongNetwork { expected, .. } => {
                let name = Network::from_chain_id(*expected)
                    .map(|network| network.name().to_string())
                    .unwrap_or_else(|| format!("chain {}", expected));
                format!("Switch to {} first!", name)
            }
            WalletError::UnrecognizedChain => "Network not found in wallet. Add it manually.".to_string(),
            WalletError::UserRejected => "Transaction rejected!".to_string(),
            WalletError::InsufficientFunds => "Insufficient funds for this contribution.".to_string(),
            WalletError::Disconnected => "Wallet disconnected. Reconnect and try again.".to_string(),
            WalletError::InvalidAmount(reason) => format!("Invalid amount: {}", reason),
            WalletError::TransactionFailed(_) => "Transaction failed.".to_string(),
            WalletError::Provider(_) => "Wallet request failed.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_table() {
        let cases = [
            (ProviderError::numeric(4001, "User denied"), WalletError::UserRejected),
            (ProviderError::symbolic("ACTION_REJECTED", "user rejected action"), WalletError::UserRejected),
            (ProviderError::numeric(4902, "Unrecognized chain ID"), WalletError::UnrecognizedChain),
            (ProviderError::numeric(4100, "unauthorized"), WalletError::NoAccount),
            (ProviderError::numeric(4900, "disconnected"), WalletError::Disconnected),
            (ProviderError::numeric(4901, "chain disconnected"), WalletError::Disconnected),
            (ProviderError::symbolic("INSUFFICIENT_FUNDS", "not enough"), WalletError::InsufficientFunds),
            (
                ProviderError::numeric(-32000, "insufficient funds for gas * price + value"),
                WalletError::InsufficientFunds,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(classify(&err, ProviderCall::Send), expected, "{err}");
            assert_eq!(classify(&err, ProviderCall::Request), expected, "{err}");
        }
    }

    #[test]
    fn test_unknown_codes_depend_on_call() {
        let err = ProviderError::numeric(-32000, "nonce too low");
        assert!(matches!(classify(&err, ProviderCall::Send), WalletError::TransactionFailed(_)));
        assert!(matches!(classify(&err, ProviderCall::Request), WalletError::Provider(_)));

        let uncoded = ProviderError::uncoded("boom");
        assert_eq!(
            WalletError::from_send(uncoded),
            WalletError::TransactionFailed("boom".to_string())
        );
    }

    #[test]
    fn test_codes_deserialize_from_either_shape() {
        let numeric: ProviderError = serde_json::from_str(r#"{"code":4001,"message":"denied"}"#).unwrap();
        assert_eq!(numeric.code, Some(ProviderCode::Numeric(4001)));

        let symbolic: ProviderError =
            serde_json::from_str(r#"{"code":"ACTION_REJECTED","message":"denied"}"#).unwrap();
        assert_eq!(classify(&symbolic, ProviderCall::Send), WalletError::UserRejected);

        let bare: ProviderError = serde_json::from_str(r#"{"message":"oops"}"#).unwrap();
        assert!(bare.code.is_none());
    }

    #[test]
    fn test_rejection_message_is_distinct_from_failure() {
        let rejected = WalletError::UserRejected.user_message();
        let failed = WalletError::TransactionFailed("reverted".to_string()).user_message();
        assert_ne!(rejected, failed);
        assert_eq!(rejected, "Transaction rejected!");
        assert_eq!(failed, "Transaction failed.");
    }

    #[test]
    fn test_wrong_network_message_names_the_network() {
        let err = WalletError::WrongNetwork { expected: 137, actual: 1 };
        assert_eq!(err.user_message(), "Switch to Polygon Mainnet first!");
    }
}
