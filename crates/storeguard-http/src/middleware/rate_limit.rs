//! Per-action rate-limiting middleware.

use std::time::Instant;

use axum::extract::{Request, State};
use axum::http::{HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use storeguard_service::policy::ActionKind;

use crate::client_ip::ClientIp;
use crate::error::ApiError;
use crate::state::AppState;

pub static X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");

/// Middleware state: the application state plus the action being guarded.
#[derive(Clone)]
pub struct Guarded {
    pub state: AppState,
    pub kind: ActionKind,
}

impl Guarded {
    pub fn new(state: AppState, kind: ActionKind) -> Self {
        Self { state, kind }
    }
}

/// Rate-limiting middleware. Returns 429 when the caller is over its limit.
///
/// A denial surfaces as `ServiceError::RateLimitExceeded` and is mapped to
/// the response by `ApiError`.
///
/// Admitted requests carry the guarded `ActionKind` and the
/// `RateLimitDecision` as request extensions, and get
/// `X-RateLimit-Remaining` on the response.
pub async fn rate_limit_middleware(
    State(guard): State<Guarded>,
    ClientIp(ip): ClientIp,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let decision = guard
        .state
        .store()
        .check_and_consume(&ip.to_string(), guard.kind, Instant::now())?
        .into_result()?;

    req.extensions_mut().insert(guard.kind);
    req.extensions_mut().insert(decision);
    let mut response = next.run(req).await;
    response
        .headers_mut()
        .insert(X_RATELIMIT_REMAINING.clone(), HeaderValue::from(decision.remaining));
    Ok(response)
}
