//! Contribution relay: accepts a decimal amount over HTTP, converts it to base
//! units and submits `contribute()` to the crowdfund contract with the
//! server's own credential.

pub mod config;
pub mod contribution;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod metrics_handler;
pub mod observability;
pub mod rate_limit;
pub mod routes;
pub mod signer;
pub mod state;
pub mod tracker;

pub use config::{ConfirmationMode, RelayConfig};
pub use signer::{Confirmation, ContributionSigner, EthersContributionSigner, SignerError};
pub use state::AppState;
