use prometheus::Registry;
use std::sync::Arc;
use std::time::Instant;

use crate::config::{ConfirmationConfig, ConfirmationMode};
use crate::contribution::ContributionService;
use crate::signer::ContributionSigner;
use crate::tracker::ContributionTracker;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub contributions: ContributionService,
    pub mode: ConfirmationMode,
    pub started_at: Instant,
    pub registry: Registry,
}

impl AppState {
    pub fn new(
        signer: Arc<dyn ContributionSigner>,
        config: &ConfirmationConfig,
        registry: Registry,
    ) -> Self {
        let tracker = ContributionTracker::from_config(config);
        Self {
            contributions: ContributionService::new(signer, tracker, config),
            mode: config.mode,
            started_at: Instant::now(),
            registry,
        }
    }
}
