use anyhow::{Context, Result};
use dotenv::dotenv;
use std::net::SocketAddr;
use std::sync::Arc;

use relay::observability::Observability;
use relay::rate_limit::RateLimitState;
use relay::{routes, AppState, ContributionSigner, EthersContributionSigner, RelayConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv().ok();

    let obs = Observability::init()?;

    let config = RelayConfig::from_env().context("failed to load relay configuration")?;

    let signer = EthersContributionSigner::connect(&config.chain, config.confirmation.confirmations)
        .context("failed to initialise the relay signer")?;
    tracing::info!(
        relay_address = ?signer.relay_address(),
        contract = ?config.chain.contract_address,
        "Relay signer ready"
    );

    let state = AppState::new(Arc::new(signer), &config.confirmation, obs.registry);
    let rate_limit_state = RateLimitState::from_env();

    let app = routes::app(state, rate_limit_state, &config.server.cors_origins);

    let addr = config.server.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!("Relay server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
