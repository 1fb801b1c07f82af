//! Client side of the crowdfund: authenticate, connect an injected wallet,
//! make sure it is on the right network and contribute from the user's own
//! account. The relay client covers the server-signed path.

pub mod error;
pub mod provider;
pub mod relay;
pub mod session;

pub use error::{classify, ProviderCall, ProviderCode, ProviderError, WalletError};
pub use provider::{
    ContributionTx, FederatedProvider, IdentityProvider, User, WalletProvider,
    CONTRIBUTION_GAS_LIMIT,
};
pub use relay::{RelayClient, RelayClientError};
pub use session::{WalletSession, WalletState};
