//! Service-layer error types.
//!
//! `ServiceError` is transport-agnostic. The HTTP crate maps it to status
//! codes and JSON error bodies.

use std::time::Instant;

use crate::detector::Category;

/// Service error shared by every component of the defense layer.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// The action kind is not registered in the policy table.
    #[error("unknown action kind: {0}")]
    UnknownActionKind(String),

    /// A policy override could not be parsed or is out of range.
    #[error("invalid policy: {0}")]
    InvalidPolicy(String),

    /// A string leaf of the payload matched an attack pattern.
    #[error("malicious input detected in field '{field}' ({category})")]
    MaliciousInputDetected { field: String, category: Category },

    /// The caller exhausted its attempts for the current window or is blocked.
    #[error("rate limit exceeded")]
    RateLimitExceeded { reset_at: Instant, blocked: bool },
}

impl ServiceError {
    /// Prefixes the offending field path with an enclosing key.
    ///
    /// Other variants pass through unchanged.
    pub(crate) fn within(self, segment: &str) -> Self {
        match self {
            Self::MaliciousInputDetected { field, category } => {
                let field = if field.is_empty() {
                    segment.to_string()
                } else if field.starts_with('[') {
                    format!("{segment}{field}")
                } else {
                    format!("{segment}.{field}")
                };
                Self::MaliciousInputDetected { field, category }
            }
            other => other,
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
