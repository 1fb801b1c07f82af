use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::metrics;
use crate::state::AppState;

const PROMETHEUS_TEXT: &str = "text/plain; version=0.0.4; charset=utf-8";

/// `GET /metrics`: Prometheus text exposition of the relay registry.
/// Gauges derived from live state are refreshed before each scrape.
pub async fn metrics_endpoint(State(state): State<AppState>) -> Response {
    let tracker = state.contributions.tracker();
    tracker.sync().await;
    metrics::CONTRIBUTIONS_TRACKED.set(i64::try_from(tracker.len()).unwrap_or(i64::MAX));

    match metrics::gather_metrics(&state.registry) {
        Ok(body) => (StatusCode::OK, [(header::CONTENT_TYPE, PROMETHEUS_TEXT)], body).into_response(),
        Err(err) => {
            tracing::error!(error = %err, "failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to encode metrics").into_response()
        }
    }
}
