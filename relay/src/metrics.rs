use once_cell::sync::Lazy;
use prometheus::{
    opts, Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Registry,
    TextEncoder,
};

macro_rules! counter_vec {
    ($name:expr, $help:expr, $labels:expr) => {
        Lazy::new(|| IntCounterVec::new(opts!($name, $help), $labels).unwrap())
    };
}
macro_rules! histogram_vec {
    ($name:expr, $help:expr, $labels:expr, $buckets:expr) => {
        Lazy::new(|| {
            HistogramVec::new(HistogramOpts::new($name, $help).buckets($buckets.to_vec()), $labels)
                .unwrap()
        })
    };
}
macro_rules! counter {
    ($name:expr, $help:expr) => {
        Lazy::new(|| IntCounter::new($name, $help).unwrap())
    };
}
macro_rules! gauge {
    ($name:expr, $help:expr) => {
        Lazy::new(|| IntGauge::new($name, $help).unwrap())
    };
}

const LATENCY_BUCKETS: [f64; 12] = [
    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

// Block times are seconds, finality can take minutes
const CONFIRMATION_BUCKETS: [f64; 10] = [1.0, 2.0, 5.0, 10.0, 20.0, 30.0, 60.0, 120.0, 300.0, 600.0];

// ── HTTP ────────────────────────────────────────────────────────────────────
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> =
    counter_vec!("http_requests_total", "Total HTTP requests", &["method", "path", "status"]);
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = histogram_vec!(
    "http_request_duration_seconds",
    "HTTP request latency",
    &["method", "path"],
    LATENCY_BUCKETS
);

// ── Contributions ───────────────────────────────────────────────────────────
pub static CONTRIBUTIONS_SUBMITTED: Lazy<IntCounter> =
    counter!("contributions_submitted_total", "Contributions broadcast by the relay");
pub static CONTRIBUTIONS_CONFIRMED: Lazy<IntCounter> =
    counter!("contributions_confirmed_total", "Relayed contributions confirmed on-chain");
pub static CONTRIBUTIONS_FAILED: Lazy<IntCounterVec> = counter_vec!(
    "contributions_failed_total",
    "Relayed contributions that failed",
    &["stage"]
);
pub static CONTRIBUTIONS_REJECTED: Lazy<IntCounterVec> = counter_vec!(
    "contributions_rejected_total",
    "Contribution requests rejected before reaching the chain",
    &["reason"]
);
pub static CONTRIBUTIONS_PENDING: Lazy<IntGauge> =
    gauge!("contributions_pending", "Relayed contributions awaiting confirmation");
pub static CONTRIBUTIONS_TRACKED: Lazy<IntGauge> =
    gauge!("contributions_tracked", "Contribution records held for status lookups");
pub static CONFIRMATION_LATENCY: Lazy<HistogramVec> = histogram_vec!(
    "contribution_confirmation_seconds",
    "Time from broadcast to confirmation",
    &["result"],
    CONFIRMATION_BUCKETS
);

pub fn register_all(registry: &Registry) -> Result<(), prometheus::Error> {
    registry.register(Box::new(HTTP_REQUESTS_TOTAL.clone()))?;
    registry.register(Box::new(HTTP_REQUEST_DURATION.clone()))?;
    registry.register(Box::new(CONTRIBUTIONS_SUBMITTED.clone()))?;
    registry.register(Box::new(CONTRIBUTIONS_CONFIRMED.clone()))?;
    registry.register(Box::new(CONTRIBUTIONS_FAILED.clone()))?;
    registry.register(Box::new(CONTRIBUTIONS_REJECTED.clone()))?;
    registry.register(Box::new(CONTRIBUTIONS_PENDING.clone()))?;
    registry.register(Box::new(CONTRIBUTIONS_TRACKED.clone()))?;
    registry.register(Box::new(CONFIRMATION_LATENCY.clone()))?;
    Ok(())
}

pub fn observe_http(method: &str, path: &str, status: u16, duration_secs: f64) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();
    HTTP_REQUEST_DURATION
        .with_label_values(&[method, path])
        .observe(duration_secs);
}

pub fn gather_metrics(registry: &Registry) -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&registry.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|err| prometheus::Error::Msg(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_all_with_prefix() {
        let registry = Registry::new_custom(Some("test".into()), None).unwrap();
        register_all(&registry).unwrap();

        CONTRIBUTIONS_SUBMITTED.inc();
        CONTRIBUTIONS_FAILED.with_label_values(&["submit"]).inc();
        observe_http("POST", "/api/contribute", 202, 0.01);

        for fam in registry.gather() {
            assert!(
                fam.get_name().starts_with("test_"),
                "metric {} missing prefix",
                fam.get_name()
            );
        }
    }

    #[test]
    fn test_gather_contains_contribution_metrics() {
        let registry = Registry::new_custom(Some("gather".into()), None).unwrap();
        register_all(&registry).unwrap();
        CONTRIBUTIONS_CONFIRMED.inc();

        let text = gather_metrics(&registry).unwrap();
        assert!(text.contains("gather_contributions_confirmed_total"));
        assert!(text.contains("# TYPE"));
    }
}
