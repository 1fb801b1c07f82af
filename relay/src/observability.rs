use anyhow::Result;
use prometheus::Registry;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::metrics;

const DEFAULT_LOG_FILTER: &str = "relay=debug";

pub struct Observability {
    pub registry: Registry,
}

impl Observability {
    /// Install the global tracing subscriber and build the metrics registry.
    /// Call once per process.
    pub fn init() -> Result<Self> {
        let registry = metrics_registry()?;

        let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());

        let json_logs = std::env::var("LOG_FORMAT")
            .map(|format| format.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        if json_logs {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        } else {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }

        tracing::info!(json_logs, "Observability stack initialized (Prometheus + tracing)");
        Ok(Self { registry })
    }
}

/// Registry with every relay metric registered under the `crowdfund` prefix
pub fn metrics_registry() -> Result<Registry, prometheus::Error> {
    let registry = Registry::new_custom(Some("crowdfund".into()), None)?;
    metrics::register_all(&registry)?;
    Ok(registry)
}
