/// Etherscan-compatible explorer client (Polygonscan)
/// Submits single-file Solidity source for verification and polls the result

use ethers::types::Address;
use serde::Deserialize;
use shared::ExponentialBackoff;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Compiler settings the crowdfund contract is built with
pub const DEFAULT_COMPILER_VERSION: &str = "v0.8.14+commit.80d49f37";
pub const DEFAULT_OPTIMIZER_RUNS: u32 = 200;

const ALREADY_VERIFIED: &str = "already verified";

#[derive(Error, Debug)]
pub enum ExplorerError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(String),
    #[error("Explorer rejected the request: {0}")]
    Rejected(String),
    #[error("Invalid response format: {0}")]
    InvalidResponse(String),
    #[error("Verification failed: {0}")]
    VerificationFailed(String),
    #[error("Verification still pending after {0} status checks")]
    GaveUp(u32),
    #[error("Network timeout")]
    Timeout,
}

/// Source submission for `verifysourcecode`
#[derive(Debug, Clone)]
pub struct VerificationRequest {
    pub address: Address,
    pub contract_name: String,
    pub source: String,
    pub compiler_version: String,
    pub optimizer_runs: Option<u32>,
}

impl VerificationRequest {
    pub fn new(address: Address, contract_name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            address,
            contract_name: contract_name.into(),
            source: source.into(),
            compiler_version: DEFAULT_COMPILER_VERSION.to_string(),
            optimizer_runs: Some(DEFAULT_OPTIMIZER_RUNS),
        }
    }

    fn form(&self, api_key: &str) -> Vec<(&'static str, String)> {
        let (optimization_used, runs) = match self.optimizer_runs {
            Some(runs) => ("1", runs),
            None => ("0", DEFAULT_OPTIMIZER_RUNS),
        };
        vec![
            ("apikey", api_key.to_string()),
            ("module", "contract".to_string()),
            ("action", "verifysourcecode".to_string()),
            ("contractaddress", format!("{:?}", self.address)),
            ("sourceCode", self.source.clone()),
            ("codeformat", "solidity-single-file".to_string()),
            ("contractname", self.contract_name.clone()),
            ("compilerversion", self.compiler_version.clone()),
            ("optimizationUsed", optimization_used.to_string()),
            ("runs", runs.to_string()),
        ]
    }
}

/// Outcome of a submission or status check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationStatus {
    /// Accepted for processing; poll with this guid
    Submitted(String),
    Pending,
    Verified,
    AlreadyVerified,
    Failed(String),
}

/// Explorer API envelope: `{"status":"1","message":"OK","result":"..."}`
#[derive(Debug, Clone, Deserialize)]
struct ExplorerResponse {
    status: String,
    #[serde(default)]
    message: String,
    result: serde_json::Value,
}

impl ExplorerResponse {
    fn result_text(&self) -> String {
        match &self.result {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Interpret the response to `verifysourcecode`
pub fn parse_submission(body: &str) -> Result<VerificationStatus, ExplorerError> {
    let response: ExplorerResponse = serde_json::from_str(body)
        .map_err(|e| ExplorerError::InvalidResponse(format!("Failed to parse submission: {}", e)))?;
    let result = response.result_text();

    if result.to_lowercase().contains(ALREADY_VERIFIED) {
        return Ok(VerificationStatus::AlreadyVerified);
    }
    if response.status == "1" {
        return Ok(VerificationStatus::Submitted(result));
    }
    Err(ExplorerError::Rejected(format!("{} ({})", result, response.message)))
}

/// Interpret the response to `checkverifystatus`
pub fn parse_status(body: &str) -> Result<VerificationStatus, ExplorerError> {
    let response: ExplorerResponse = serde_json::from_str(body)
        .map_err(|e| ExplorerError::InvalidResponse(format!("Failed to parse status: {}", e)))?;
    let result = response.result_text();
    let lowered = result.to_lowercase();

    if lowered.contains(ALREADY_VERIFIED) {
        Ok(VerificationStatus::AlreadyVerified)
    } else if lowered.starts_with("pass") {
        Ok(VerificationStatus::Verified)
    } else if lowered.contains("pending") || lowered.contains("in queue") {
        Ok(VerificationStatus::Pending)
    } else if response.status == "1" {
        Ok(VerificationStatus::Verified)
    } else {
        Ok(VerificationStatus::Failed(result))
    }
}

pub struct ExplorerClient {
    api_url: String,
    api_key: String,
    client: reqwest::Client,
    request_timeout: Duration,
    poll_base: Duration,
    poll_max: Duration,
    max_status_checks: u32,
}

impl ExplorerClient {
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let client = reqwest::ClientBuilder::new()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        ExplorerClient {
            api_url: api_url.into(),
            api_key: api_key.into(),
            client,
            request_timeout: Duration::from_secs(30),
            poll_base: Duration::from_secs(3),
            poll_max: Duration::from_secs(30),
            max_status_checks: 20,
        }
    }

    pub fn with_polling(mut self, base: Duration, max: Duration, max_status_checks: u32) -> Self {
        self.poll_base = base;
        self.poll_max = max;
        self.max_status_checks = max_status_checks;
        self
    }

    fn map_send_error(e: reqwest::Error) -> ExplorerError {
        if e.is_timeout() {
            ExplorerError::Timeout
        } else {
            ExplorerError::RequestFailed(e.to_string())
        }
    }

    async fn read_body(response: reqwest::Response) -> Result<String, ExplorerError> {
        if !response.status().is_success() {
            return Err(ExplorerError::RequestFailed(format!(
                "HTTP {}: {}",
                response.status(),
                response.text().await.unwrap_or_default()
            )));
        }
        response
            .text()
            .await
            .map_err(|e| ExplorerError::InvalidResponse(e.to_string()))
    }

    pub async fn submit(&self, request: &VerificationRequest) -> Result<VerificationStatus, ExplorerError> {
        debug!(
            address = ?request.address,
            contract = %request.contract_name,
            compiler = %request.compiler_version,
            "Submitting source for verification to {}", self.api_url
        );

        let response = self
            .client
            .post(&self.api_url)
            .timeout(self.request_timeout)
            .form(&request.form(&self.api_key))
            .send()
            .await
            .map_err(Self::map_send_error)?;

        parse_submission(&Self::read_body(response).await?)
    }

    pub async fn check_status(&self, guid: &str) -> Result<VerificationStatus, ExplorerError> {
        let response = self
            .client
            .get(&self.api_url)
            .timeout(self.request_timeout)
            .query(&[
                ("apikey", self.api_key.as_str()),
                ("module", "contract"),
                ("action", "checkverifystatus"),
                ("guid", guid),
            ])
            .send()
            .await
            .map_err(Self::map_send_error)?;

        parse_status(&Self::read_body(response).await?)
    }

    /// Submit and poll until the explorer reports a final answer.
    /// "Already Verified" counts as success.
    pub async fn verify(&self, request: &VerificationRequest) -> Result<VerificationStatus, ExplorerError> {
        let guid = match self.submit(request).await? {
            VerificationStatus::Submitted(guid) => guid,
            VerificationStatus::AlreadyVerified => {
                info!(address = ?request.address, "Contract is already verified");
                return Ok(VerificationStatus::AlreadyVerified);
            }
            other => {
                return Err(ExplorerError::InvalidResponse(format!(
                    "unexpected submission outcome {:?}",
                    other
                )))
            }
        };

        info!(guid = %guid, "Verification submitted, polling status");
        let mut backoff = ExponentialBackoff::new(self.poll_base, self.poll_max);

        loop {
            let delay = backoff.on_failure("verification pending");
            tokio::time::sleep(delay).await;

            match self.check_status(&guid).await {
                Ok(VerificationStatus::Pending) => {}
                Ok(VerificationStatus::Failed(reason)) => {
                    return Err(ExplorerError::VerificationFailed(reason));
                }
                Ok(status) => {
                    backoff.on_success();
                    return Ok(status);
                }
                Err(ExplorerError::Timeout) | Err(ExplorerError::RequestFailed(_)) => {
                    warn!(guid = %guid, "Status check failed, will retry");
                }
                Err(e) => return Err(e),
            }

            if backoff.should_give_up(self.max_status_checks) {
                return Err(ExplorerError::GaveUp(backoff.attempts()));
            }
        }
    }
}
