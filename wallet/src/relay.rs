/// HTTP client for the contribution relay
/// Submits amounts for server-signed contributions and polls their outcome

use ethers::types::TxHash;
use shared::{
    ContributeRequest, ContributeResponse, ContributionRecord, ContributionStatus, ErrorBody,
    ExponentialBackoff,
};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum RelayClientError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(String),
    #[error("Relay returned {status} ({kind}): {message}")]
    Api {
        status: u16,
        kind: String,
        message: String,
    },
    #[error("Invalid response format: {0}")]
    InvalidResponse(String),
    #[error("Contribution still pending after {0} status checks")]
    StillPending(u32),
    #[error("Network timeout")]
    Timeout,
}

pub struct RelayClient {
    base_url: String,
    client: reqwest::Client,
    poll_base: Duration,
    poll_max: Duration,
    max_polls: u32,
}

impl RelayClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::ClientBuilder::new()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        RelayClient {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            poll_base: Duration::from_secs(2),
            poll_max: Duration::from_secs(15),
            max_polls: 40,
        }
    }

    pub fn with_polling(mut self, base: Duration, max: Duration, max_polls: u32) -> Self {
        self.poll_base = base;
        self.poll_max = max;
        self.max_polls = max_polls;
        self
    }

    fn map_send_error(e: reqwest::Error) -> RelayClientError {
        if e.is_timeout() {
            RelayClientError::Timeout
        } else {
            RelayClientError::RequestFailed(e.to_string())
        }
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, RelayClientError> {
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| RelayClientError::InvalidResponse(e.to_string()))?;

        if !status.is_success() {
            return Err(match serde_json::from_slice::<ErrorBody>(&body) {
                Ok(error) => RelayClientError::Api {
                    status: status.as_u16(),
                    kind: error.kind,
                    message: error.error,
                },
                Err(_) => RelayClientError::Api {
                    status: status.as_u16(),
                    kind: "Unknown".to_string(),
                    message: String::from_utf8_lossy(&body).into_owned(),
                },
            });
        }

        serde_json::from_slice(&body).map_err(|e| RelayClientError::InvalidResponse(e.to_string()))
    }

    /// `POST /api/contribute`
    pub async fn contribute(&self, amount: &str) -> Result<ContributeResponse, RelayClientError> {
        let url = format!("{}/api/contribute", self.base_url);
        debug!(amount, "Submitting contribution to {}", url);

        let response = self
            .client
            .post(&url)
            .json(&ContributeRequest::new(amount))
            .send()
            .await
            .map_err(Self::map_send_error)?;

        Self::decode(response).await
    }

    /// `GET /api/contribute/:txHash`
    pub async fn status(&self, tx_hash: TxHash) -> Result<ContributionRecord, RelayClientError> {
        let url = format!("{}/api/contribute/{:?}", self.base_url, tx_hash);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(Self::map_send_error)?;

        Self::decode(response).await
    }

    /// Poll until the relay reports `confirmed` or `failed`
    pub async fn wait_for_final(&self, tx_hash: TxHash) -> Result<ContributionRecord, RelayClientError> {
        let mut backoff = ExponentialBackoff::new(self.poll_base, self.poll_max);

        loop {
            let record = self.status(tx_hash).await?;
            if record.status.is_final() {
                backoff.on_success();
                return Ok(record);
            }
            debug_assert_eq!(record.status, ContributionStatus::Pending);

            if backoff.should_give_up(self.max_polls) {
                return Err(RelayClientError::StillPending(backoff.attempts()));
            }
            let delay = backoff.on_failure("contribution pending");
            tokio::time::sleep(delay).await;
        }
    }
}
