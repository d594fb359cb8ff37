//! HTTP error type and JSON error bodies.

use std::time::Instant;

use axum::http::header::RETRY_AFTER;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use storeguard_service::detector::Category;
use storeguard_service::error::ServiceError;

/// Errors returned by Storeguard HTTP handlers and middleware.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Malformed request body or parameters.
    #[error("{0}")]
    BadRequest(String),

    /// Unknown route parameter (e.g. an unregistered action kind).
    #[error("{0}")]
    NotFound(String),

    /// The payload matched an attack pattern.
    #[error("attack detected in field '{field}'")]
    AttackDetected { field: String, category: Category },

    /// Admission denied by the rate limiter.
    #[error("too many requests")]
    TooManyRequests {
        retry_after_secs: u64,
        retry_after_minutes: u64,
        blocked: bool,
    },

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Builds a 429 error for a denial whose block ends at `reset_at`.
    pub fn too_many_requests(reset_at: Instant, blocked: bool, now: Instant) -> Self {
        let remaining = reset_at.saturating_duration_since(now);
        Self::TooManyRequests {
            retry_after_secs: remaining.as_millis().div_ceil(1000) as u64,
            retry_after_minutes: remaining.as_millis().div_ceil(60_000) as u64,
            blocked,
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::UnknownActionKind(kind) => {
                ApiError::NotFound(format!("unknown action kind: {kind}"))
            }
            ServiceError::MaliciousInputDetected { field, category } => {
                ApiError::AttackDetected { field, category }
            }
            ServiceError::RateLimitExceeded { reset_at, blocked } => {
                ApiError::too_many_requests(reset_at, blocked, Instant::now())
            }
            ServiceError::InvalidPolicy(msg) => ApiError::Internal(msg),
        }
    }
}

#[derive(Serialize)]
pub struct ErrorBody {
    /// Error code (e.g. "too_many_requests", "attack_detected", "internal_error").
    pub(crate) error: String,
    /// Human-readable error detail, if available.
    pub(crate) detail: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut retry_after = None;
        let (status, error, detail) = match &self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone())),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            ApiError::AttackDetected { field, .. } => {
                (StatusCode::FORBIDDEN, "attack_detected", Some(field.clone()))
            }
            ApiError::TooManyRequests {
                retry_after_secs,
                retry_after_minutes,
                ..
            } => {
                retry_after = Some(*retry_after_secs);
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    "too_many_requests",
                    Some(format!(
                        "Too many attempts. Try again in {retry_after_minutes} minutes."
                    )),
                )
            }
            ApiError::Internal(msg) => {
                tracing::error!(%msg, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    Some(msg.clone()),
                )
            }
        };

        let body = ErrorBody {
            error: error.to_string(),
            detail,
        };

        let mut response = (status, axum::Json(body)).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}
