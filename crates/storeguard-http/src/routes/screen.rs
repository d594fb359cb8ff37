//! Screening endpoints: both gates applied to an arbitrary JSON payload.
//!
//! One route is mounted per registered action kind, each behind the
//! rate-limit middleware for that kind. By the time the handler runs the
//! request has been admitted and its body sanitized.

use axum::Extension;
use axum::extract::{Json, State};
use serde_json::Value;
use storeguard_service::policy::ActionKind;
use storeguard_service::rate_limit::RateLimitDecision;
use storeguard_service::sanitize::Validation;

use crate::extract::SanitizedJson;
use crate::state::AppState;
use crate::types::ScreenResponse;

/// Returns the cleaned payload for an admitted request.
pub async fn screen(
    Extension(kind): Extension<ActionKind>,
    Extension(decision): Extension<RateLimitDecision>,
    SanitizedJson(payload): SanitizedJson<Value>,
) -> Json<ScreenResponse> {
    Json(ScreenResponse {
        action: kind,
        remaining: decision.remaining,
        payload,
    })
}

/// Reports whether a payload would pass the sanitizer, without rejecting.
pub async fn validate(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> Json<Validation> {
    Json(state.validate(&payload))
}
