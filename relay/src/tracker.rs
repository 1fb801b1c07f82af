use ethers::types::TxHash;
use moka::future::Cache as MokaCache;
use shared::ContributionRecord;
use std::time::Duration;

use crate::config::ConfirmationConfig;

/// In-memory, TTL-bounded record of contributions this relay submitted.
/// Serves the status half of the submit/poll protocol; nothing is persisted.
#[derive(Clone)]
pub struct ContributionTracker {
    records: MokaCache<TxHash, ContributionRecord>,
}

impl ContributionTracker {
    pub fn new(ttl: Duration, max_capacity: u64) -> Self {
        let records = MokaCache::builder()
            .max_capacity(max_capacity)
            .time_to_live(ttl)
            .build();

        tracing::info!(
            "Contribution tracker ready: ttl={:?}, capacity={}",
            ttl,
            max_capacity
        );

        Self { records }
    }

    pub fn from_config(config: &ConfirmationConfig) -> Self {
        Self::new(config.record_ttl, config.record_capacity)
    }

    pub async fn insert(&self, record: ContributionRecord) {
        self.records.insert(record.tx_hash, record).await;
    }

    pub async fn get(&self, tx_hash: &TxHash) -> Option<ContributionRecord> {
        self.records.get(tx_hash).await
    }

    /// Apply `update` to a tracked record; returns the updated copy
    pub async fn update<F>(&self, tx_hash: &TxHash, update: F) -> Option<ContributionRecord>
    where
        F: FnOnce(&mut ContributionRecord),
    {
        let mut record = self.records.get(tx_hash).await?;
        update(&mut record);
        self.records.insert(*tx_hash, record.clone()).await;
        Some(record)
    }

    /// Approximate until [`Self::sync`] has flushed pending cache maintenance
    pub fn len(&self) -> u64 {
        self.records.entry_count()
    }

    pub async fn sync(&self) {
        self.records.run_pending_tasks().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::U256;
    use shared::ContributionStatus;

    fn record(byte: u8) -> ContributionRecord {
        ContributionRecord::pending(
            TxHash::repeat_byte(byte),
            "1.5",
            U256::from(1_500u64),
        )
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let tracker = ContributionTracker::new(Duration::from_secs(60), 100);
        tracker.insert(record(1)).await;

        let found = tracker.get(&TxHash::repeat_byte(1)).await.unwrap();
        assert_eq!(found.status, ContributionStatus::Pending);
        assert!(tracker.get(&TxHash::repeat_byte(2)).await.is_none());
    }

    #[tokio::test]
    async fn test_update_marks_confirmed() {
        let tracker = ContributionTracker::new(Duration::from_secs(60), 100);
        tracker.insert(record(3)).await;

        let updated = tracker
            .update(&TxHash::repeat_byte(3), |r| r.confirm(Some(42)))
            .await
            .unwrap();
        assert_eq!(updated.status, ContributionStatus::Confirmed);

        let stored = tracker.get(&TxHash::repeat_byte(3)).await.unwrap();
        assert_eq!(stored.block_number, Some(42));
    }

    #[tokio::test]
    async fn test_update_of_unknown_hash_is_none() {
        let tracker = ContributionTracker::new(Duration::from_secs(60), 100);
        assert!(tracker
            .update(&TxHash::repeat_byte(9), |r| r.confirm(None))
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_len_after_sync() {
        let tracker = ContributionTracker::new(Duration::from_secs(60), 100);
        tracker.insert(record(5)).await;
        tracker.insert(record(6)).await;
        tracker.sync().await;
        assert_eq!(tracker.len(), 2);
    }

    #[tokio::test]
    async fn test_records_expire() {
        let tracker = ContributionTracker::new(Duration::from_millis(50), 100);
        tracker.insert(record(4)).await;
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(tracker.get(&TxHash::repeat_byte(4)).await.is_none());
    }
}
