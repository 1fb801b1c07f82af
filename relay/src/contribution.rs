//! Two-phase contribution flow: submit returns a pending reference (the tx
//! hash); the outcome is recorded by a watcher or by a bounded blocking wait.

use ethers::types::{TxHash, U256};
use shared::{parse_decimal, to_base_units, AmountError, ContributionRecord, PlainDecimal, NATIVE_DECIMALS};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::ConfirmationConfig;
use crate::metrics;
use crate::signer::{Confirmation, ContributionSigner, SignerError};
use crate::tracker::ContributionTracker;

/// A contribution accepted by the chain client, not yet confirmed.
/// Counts toward the pending gauge until dropped.
#[derive(Debug)]
pub struct Submitted {
    pub tx_hash: TxHash,
    pub amount: PlainDecimal,
    pub value: U256,
    submitted_at: Instant,
    _pending: PendingSlot,
}

#[derive(Debug)]
struct PendingSlot;

impl PendingSlot {
    fn acquire() -> Self {
        metrics::CONTRIBUTIONS_PENDING.inc();
        PendingSlot
    }
}

impl Drop for PendingSlot {
    fn drop(&mut self) {
        metrics::CONTRIBUTIONS_PENDING.dec();
    }
}

#[derive(Clone)]
pub struct ContributionService {
    signer: Arc<dyn ContributionSigner>,
    tracker: ContributionTracker,
    timeout: Duration,
}

impl ContributionService {
    pub fn new(
        signer: Arc<dyn ContributionSigner>,
        tracker: ContributionTracker,
        config: &ConfirmationConfig,
    ) -> Self {
        Self {
            signer,
            tracker,
            timeout: config.timeout,
        }
    }

    pub fn signer(&self) -> &Arc<dyn ContributionSigner> {
        &self.signer
    }

    pub fn tracker(&self) -> &ContributionTracker {
        &self.tracker
    }

    /// Validate `amount`, convert it to base units and broadcast exactly one
    /// `contribute()` call. Nothing reaches the signer if validation fails.
    pub async fn submit(&self, amount: &str) -> Result<Submitted, ContributionError> {
        let parsed = parse_decimal(amount)
            .and_then(|decimal| Ok((to_base_units(&decimal, NATIVE_DECIMALS)?, decimal)));
        let (value, decimal) = parsed.map_err(|err| {
            metrics::CONTRIBUTIONS_REJECTED
                .with_label_values(&[rejection_reason(&err)])
                .inc();
            ContributionError::Amount(err)
        })?;

        let tx_hash = match self.signer.submit(value).await {
            Ok(hash) => hash,
            Err(err) => {
                metrics::CONTRIBUTIONS_FAILED
                    .with_label_values(&["submit"])
                    .inc();
                error!(amount = %decimal, error = %err, "contribution submission failed");
                return Err(ContributionError::Signer(err));
            }
        };

        metrics::CONTRIBUTIONS_SUBMITTED.inc();
        let pending = PendingSlot::acquire();
        self.tracker
            .insert(ContributionRecord::pending(tx_hash, decimal.to_string(), value))
            .await;

        info!(tx_hash = ?tx_hash, amount = %decimal, value = %value, "contribution submitted");

        Ok(Submitted {
            tx_hash,
            amount: decimal,
            value,
            submitted_at: Instant::now(),
            _pending: pending,
        })
    }

    /// Wait for the outcome within the configured timeout and record it.
    /// A reverted or dropped transaction, RPC failure or timeout is an error;
    /// only a timeout leaves the record pending.
    pub async fn await_outcome(&self, submitted: &Submitted) -> Result<Confirmation, SignerError> {
        let tx_hash = submitted.tx_hash;
        let waited = tokio::time::timeout(self.timeout, self.signer.await_confirmation(tx_hash)).await;
        let elapsed = submitted.submitted_at.elapsed().as_secs_f64();

        let outcome = match waited {
            Ok(Ok(confirmation)) if confirmation.succeeded => Ok(confirmation),
            Ok(Ok(confirmation)) => {
                self.record_failure(tx_hash, confirmation.block_number, "execution reverted")
                    .await;
                Err(SignerError::Reverted(tx_hash))
            }
            Ok(Err(err)) => {
                self.record_failure(tx_hash, None, &err.to_string()).await;
                Err(err)
            }
            Err(_) => {
                let err = SignerError::Timeout(self.timeout.as_secs());
                let note = err.to_string();
                self.tracker.update(&tx_hash, |record| record.note(note)).await;
                Err(err)
            }
        };

        match &outcome {
            Ok(confirmation) => {
                let block_number = confirmation.block_number;
                self.tracker
                    .update(&tx_hash, |record| record.confirm(block_number))
                    .await;
                metrics::CONTRIBUTIONS_CONFIRMED.inc();
                metrics::CONFIRMATION_LATENCY
                    .with_label_values(&["confirmed"])
                    .observe(elapsed);
                info!(tx_hash = ?tx_hash, block = ?block_number, "contribution confirmed");
            }
            Err(SignerError::Timeout(secs)) => {
                metrics::CONTRIBUTIONS_FAILED
                    .with_label_values(&["timeout"])
                    .inc();
                warn!(tx_hash = ?tx_hash, timeout_secs = *secs, "contribution still unconfirmed, left pending");
            }
            Err(err) => {
                metrics::CONTRIBUTIONS_FAILED
                    .with_label_values(&["confirm"])
                    .inc();
                metrics::CONFIRMATION_LATENCY
                    .with_label_values(&["failed"])
                    .observe(elapsed);
                warn!(tx_hash = ?tx_hash, error = %err, "contribution did not confirm");
            }
        }

        outcome
    }

    /// Run [`Self::await_outcome`] on its own task. Dropping the handle does
    /// not cancel the wait, so the record is always settled.
    pub fn spawn_outcome(&self, submitted: Submitted) -> JoinHandle<Result<Confirmation, SignerError>> {
        let service = self.clone();
        tokio::spawn(async move { service.await_outcome(&submitted).await })
    }

    /// Record the outcome in the background; the caller answers immediately.
    pub fn spawn_watcher(&self, submitted: Submitted) -> JoinHandle<()> {
        let service = self.clone();
        tokio::spawn(async move {
            let _ = service.await_outcome(&submitted).await;
        })
    }

    pub async fn status(&self, tx_hash: &TxHash) -> Option<ContributionRecord> {
        self.tracker.get(tx_hash).await
    }

    async fn record_failure(&self, tx_hash: TxHash, block_number: Option<u64>, reason: &str) {
        self.tracker
            .update(&tx_hash, |record| record.fail(block_number, reason))
            .await;
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ContributionError {
    #[error(transparent)]
    Amount(#[from] AmountError),
    #[error(transparent)]
    Signer(#[from] SignerError),
}

fn rejection_reason(err: &AmountError) -> &'static str {
    match err {
        AmountError::Empty => "missing",
        AmountError::Negative => "negative",
        AmountError::Malformed(_) => "malformed",
        AmountError::TooPrecise { .. } => "too_precise",
        AmountError::NotPositive => "zero",
        AmountError::Overflow => "overflow",
    }
}
