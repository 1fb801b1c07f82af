use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{SecondsFormat, Utc};
use shared::{AmountError, ErrorBody};
use uuid::Uuid;

use crate::contribution::ContributionError;
use crate::signer::SignerError;

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    kind: String,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            kind: kind.into(),
            message: message.into(),
        }
    }

    pub fn bad_request(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, kind, message)
    }

    pub fn not_found(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, kind, message)
    }

    pub fn internal(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, kind, message)
    }

    pub fn too_many_requests(message: impl Into<String>) -> Self {
        Self::new(StatusCode::TOO_MANY_REQUESTS, "RateLimited", message)
    }

    pub fn missing_amount() -> Self {
        Self::bad_request("MissingInput", "Amount is required")
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<AmountError> for ApiError {
    fn from(err: AmountError) -> Self {
        match err {
            AmountError::Empty => Self::missing_amount(),
            other => Self::bad_request("InvalidAmount", format!("Invalid amount: {}", other)),
        }
    }
}

impl From<SignerError> for ApiError {
    /// Chain failures are passed through with the client library's message.
    fn from(err: SignerError) -> Self {
        Self::internal("ChainCallFailure", err.to_string())
    }
}

impl From<ContributionError> for ApiError {
    fn from(err: ContributionError) -> Self {
        match err {
            ContributionError::Amount(err) => err.into(),
            ContributionError::Signer(err) => err.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let correlation_id = Uuid::new_v4().to_string();
        let payload = ErrorBody {
            error: self.message,
            kind: self.kind,
            code: self.status.as_u16(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            correlation_id: correlation_id.clone(),
        };

        let mut response = (self.status, Json(payload)).into_response();
        if let Ok(value) = HeaderValue::from_str(&correlation_id) {
            response
                .headers_mut()
                .insert(header::HeaderName::from_static("x-correlation-id"), value);
        }
        response
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
