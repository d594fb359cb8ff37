//! Back-office endpoints for inspecting and lifting rate limits.

use std::time::Instant;

use axum::extract::{Json, Path, State};
use storeguard_service::policy::ActionKind;

use crate::error::ApiError;
use crate::state::AppState;
use crate::types::{RateLimitResetResponse, RateLimitStatsResponse, RateLimitStatusResponse};

/// Tracked entries per action kind.
pub async fn rate_limit_stats(State(state): State<AppState>) -> Json<RateLimitStatsResponse> {
    let entries = state.store().stats_by_action_kind();
    Json(RateLimitStatsResponse {
        total: entries.values().sum(),
        entries,
    })
}

/// Read-only status of one (action, identifier) pair.
pub async fn rate_limit_status(
    State(state): State<AppState>,
    Path((action, identifier)): Path<(String, String)>,
) -> Result<Json<RateLimitStatusResponse>, ApiError> {
    let action: ActionKind = action.parse()?;
    let store = state.store();
    let entry = store.entry(&identifier, action);

    Ok(Json(RateLimitStatusResponse {
        action,
        blocked: store.is_blocked(&identifier, action, Instant::now()),
        tracked: entry.is_some(),
        count: entry.map(|e| e.count),
        identifier,
    }))
}

/// Manually unblock an identifier for one action.
pub async fn rate_limit_reset(
    State(state): State<AppState>,
    Path((action, identifier)): Path<(String, String)>,
) -> Result<Json<RateLimitResetResponse>, ApiError> {
    let action: ActionKind = action.parse()?;
    let reset = state.store().reset(&identifier, action);
    Ok(Json(RateLimitResetResponse {
        action,
        identifier,
        reset,
    }))
}
