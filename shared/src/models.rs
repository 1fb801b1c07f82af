use chrono::{DateTime, Utc};
use ethers::types::{TxHash, U256};
use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════════════════════════════════════
// RELAY WIRE TYPES
// ═══════════════════════════════════════════════════════════════════════════

/// Body of `POST /api/contribute`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContributeRequest {
    #[serde(default)]
    pub amount: Option<String>,
}

impl ContributeRequest {
    pub fn new(amount: impl Into<String>) -> Self {
        Self {
            amount: Some(amount.into()),
        }
    }
}

/// Lifecycle of a relayed contribution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContributionStatus {
    Pending,
    Confirmed,
    Failed,
}

impl ContributionStatus {
    pub fn is_final(&self) -> bool {
        !matches!(self, ContributionStatus::Pending)
    }
}

impl std::fmt::Display for ContributionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContributionStatus::Pending => write!(f, "pending"),
            ContributionStatus::Confirmed => write!(f, "confirmed"),
            ContributionStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Successful response of `POST /api/contribute`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContributeResponse {
    pub success: bool,
    pub tx_hash: TxHash,
    pub status: ContributionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
}

impl ContributeResponse {
    pub fn pending(tx_hash: TxHash) -> Self {
        Self {
            success: true,
            tx_hash,
            status: ContributionStatus::Pending,
            block_number: None,
        }
    }

    pub fn confirmed(tx_hash: TxHash, block_number: Option<u64>) -> Self {
        Self {
            success: true,
            tx_hash,
            status: ContributionStatus::Confirmed,
            block_number,
        }
    }
}

/// What the relay remembers about a contribution it submitted.
/// Returned by `GET /api/contribute/:tx_hash`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContributionRecord {
    pub tx_hash: TxHash,
    /// Normalized decimal amount as submitted
    pub amount: String,
    /// Base units as a decimal string
    pub value: String,
    pub status: ContributionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ContributionRecord {
    pub fn pending(tx_hash: TxHash, amount: impl Into<String>, value: U256) -> Self {
        let now = Utc::now();
        Self {
            tx_hash,
            amount: amount.into(),
            value: value.to_string(),
            status: ContributionStatus::Pending,
            block_number: None,
            error: None,
            submitted_at: now,
            updated_at: now,
        }
    }

    pub fn confirm(&mut self, block_number: Option<u64>) {
        self.status = ContributionStatus::Confirmed;
        self.block_number = block_number;
        self.error = None;
        self.updated_at = Utc::now();
    }

    /// Attach a note without settling the outcome
    pub fn note(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
        self.updated_at = Utc::now();
    }

    pub fn fail(&mut self, block_number: Option<u64>, reason: impl Into<String>) {
        self.status = ContributionStatus::Failed;
        self.block_number = block_number;
        self.error = Some(reason.into());
        self.updated_at = Utc::now();
    }
}

/// Error body returned by every relay route
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    /// Human readable message
    pub error: String,
    pub kind: String,
    pub code: u16,
    pub timestamp: String,
    pub correlation_id: String,
}
