//! Request and response bodies for the HTTP API.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;
use storeguard_service::policy::ActionKind;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub tracked_entries: usize,
}

/// Live entry counts per action kind.
#[derive(Serialize)]
pub struct RateLimitStatsResponse {
    pub total: usize,
    pub entries: BTreeMap<ActionKind, usize>,
}

#[derive(Serialize)]
pub struct RateLimitStatusResponse {
    pub action: ActionKind,
    pub identifier: String,
    pub tracked: bool,
    pub blocked: bool,
    /// Attempts counted in the current window, if tracked.
    pub count: Option<u32>,
}

#[derive(Serialize)]
pub struct RateLimitResetResponse {
    pub action: ActionKind,
    pub identifier: String,
    /// Whether an entry existed and was removed.
    pub reset: bool,
}

/// Result of screening a payload through both gates.
#[derive(Serialize)]
pub struct ScreenResponse {
    pub action: ActionKind,
    pub remaining: u32,
    pub payload: Value,
}
