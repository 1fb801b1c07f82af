use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Path, State},
    http::{header, HeaderMap, StatusCode},
    Json,
};
use ethers::types::TxHash;
use serde_json::{json, Value};
use shared::{ContributeRequest, ContributeResponse, ContributionRecord};

use crate::{
    config::ConfirmationMode,
    error::{ApiError, ApiResult},
    state::AppState,
};

fn map_json_rejection(err: JsonRejection) -> ApiError {
    ApiError::bad_request(
        "InvalidRequest",
        format!("Invalid JSON payload: {}", err.body_text()),
    )
}

fn has_json_content_type(headers: &HeaderMap) -> bool {
    let Some(content_type) = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
    else {
        return false;
    };
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence == "application/json"
        || (essence.starts_with("application/") && essence.ends_with("+json"))
}

/// A body that is absent, empty or not JSON reads as `{}`: no amount was sent
fn parse_contribute_body(headers: &HeaderMap, body: &Bytes) -> Result<ContributeRequest, ApiError> {
    if !has_json_content_type(headers) || body.iter().all(u8::is_ascii_whitespace) {
        return Ok(ContributeRequest::default());
    }
    Json::<ContributeRequest>::from_bytes(body)
        .map(|Json(request)| request)
        .map_err(map_json_rejection)
}

fn parse_tx_hash(raw: &str) -> Option<TxHash> {
    let hex = raw
        .strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
        .unwrap_or(raw);
    if hex.len() != 64 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    hex.parse::<TxHash>().ok()
}

pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let uptime = state.started_at.elapsed().as_secs();
    let now = chrono::Utc::now().to_rfc3339();
    let signer = state.contributions.signer();
    let relay_address = format!("{:?}", signer.relay_address());

    match signer.latest_block().await {
        Ok(latest_block) => {
            tracing::debug!(uptime_secs = uptime, latest_block, "health check passed");
            (
                StatusCode::OK,
                Json(json!({
                    "status": "ok",
                    "version": env!("CARGO_PKG_VERSION"),
                    "timestamp": now,
                    "uptimeSecs": uptime,
                    "relayAddress": relay_address,
                    "latestBlock": latest_block,
                })),
            )
        }
        Err(err) => {
            tracing::warn!(uptime_secs = uptime, error = %err, "health check degraded, chain unreachable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "degraded",
                    "version": env!("CARGO_PKG_VERSION"),
                    "timestamp": now,
                    "uptimeSecs": uptime,
                    "relayAddress": relay_address,
                    "error": err.to_string(),
                })),
            )
        }
    }
}

/// Submit a contribution signed by the relay's credential.
///
/// In async mode this answers `202` with a pending reference as soon as the
/// transaction is broadcast; in blocking mode it waits (bounded) for
/// confirmation and answers `200`.
pub async fn contribute(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<ContributeResponse>)> {
    let request = parse_contribute_body(&headers, &body)?;

    let amount = request
        .amount
        .as_deref()
        .map(str::trim)
        .filter(|amount| !amount.is_empty())
        .ok_or_else(ApiError::missing_amount)?;

    let submitted = state.contributions.submit(amount).await?;

    match state.mode {
        ConfirmationMode::Async => {
            let tx_hash = submitted.tx_hash;
            state.contributions.spawn_watcher(submitted);
            Ok((StatusCode::ACCEPTED, Json(ContributeResponse::pending(tx_hash))))
        }
        ConfirmationMode::Blocking => {
            let confirmation = state
                .contributions
                .spawn_outcome(submitted)
                .await
                .map_err(|err| {
                    ApiError::internal("ChainCallFailure", format!("Confirmation task failed: {}", err))
                })??;
            Ok((
                StatusCode::OK,
                Json(ContributeResponse::confirmed(
                    confirmation.tx_hash,
                    confirmation.block_number,
                )),
            ))
        }
    }
}

/// Status half of the submit/poll protocol
pub async fn contribution_status(
    State(state): State<AppState>,
    Path(raw_hash): Path<String>,
) -> ApiResult<Json<ContributionRecord>> {
    let tx_hash = parse_tx_hash(&raw_hash).ok_or_else(|| {
        ApiError::bad_request(
            "InvalidTxHash",
            format!("'{}' is not a 32-byte hex transaction hash", raw_hash),
        )
    })?;

    state
        .contributions
        .status(&tx_hash)
        .await
        .map(Json)
        .ok_or_else(|| {
            ApiError::not_found(
                "ContributionNotFound",
                format!("No contribution {} was submitted through this relay", raw_hash),
            )
        })
}

pub async fn route_not_found() -> ApiError {
    ApiError::not_found("RouteNotFound", "The requested resource was not found")
}
