//! Maps [`regid::Error`] onto HTTP responses.
//!
//! - `Validation` / `EmptyBatch`: 422, the caller must fix the form.
//! - `NotFound`: 404.
//! - `ImmutableField`: 409.
//! - `Encoding`: 500.
//! - `AllocationExhausted`, `StoreUnavailable`, `Cancelled`,
//!   `DeadlineExceeded`: 503 with `Retry-After`; the registration itself was
//!   fine and may be resubmitted.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use regid::Error;
use serde_json::json;

/// Seconds suggested to clients before resubmitting a transient failure.
const RETRY_AFTER_SECS: &str = "5";

#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0 {
            Error::Validation { .. } | Error::EmptyBatch => StatusCode::UNPROCESSABLE_ENTITY,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::ImmutableField { .. } => StatusCode::CONFLICT,
            Error::AllocationExhausted { .. }
            | Error::StoreUnavailable { .. }
            | Error::Cancelled { .. }
            | Error::DeadlineExceeded { .. } => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let retryable = self.0.is_transient();
        if status.is_server_error() {
            tracing::warn!(%status, error = %self.0, "request failed");
        }

        let body = Json(json!({
            "error": self.0.to_string(),
            "retryable": retryable,
        }));
        let mut response = (status, body).into_response();
        if retryable {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from_static(RETRY_AFTER_SECS));
        }
        response
    }
}
