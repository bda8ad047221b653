//! API error types
//!
//! Only three things can go wrong before dispatch, and each maps to a fixed
//! status. Handler failures never appear here: a verified event is always
//! acknowledged with 200 so the provider does not redeliver it forever.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// The webhook path's endpoint id does not match configuration
    #[error("unconfigured endpoint")]
    UnknownEndpoint,

    /// Missing or failed `Stripe-Signature` verification
    #[error("invalid signature")]
    InvalidSignature,

    /// The body is not a parseable event envelope
    #[error("invalid payload")]
    InvalidPayload,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::UnknownEndpoint => (StatusCode::NOT_FOUND, "Unconfigured endpoint"),
            ApiError::InvalidSignature => (StatusCode::BAD_REQUEST, "Invalid signature"),
            ApiError::InvalidPayload => (StatusCode::BAD_REQUEST, "Invalid payload"),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
