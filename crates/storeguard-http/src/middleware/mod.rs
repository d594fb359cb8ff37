//! HTTP middleware: per-action rate limiting, request ID tracking.

pub mod rate_limit;
pub mod request_id;
