//! Storeguard Service - request-defense core for storefront handlers.
//!
//! This crate contains all transport-agnostic logic:
//! per-action policies, the rate-limit store and its sweeper, the attack
//! pattern detector, the payload sanitizer, and metrics.
//!
//! The HTTP crate (`storeguard-http`) depends on this crate and provides
//! the axum adapters. Route handlers call [`ServiceState::check`] to decide
//! admission and [`ServiceState::sanitize`] to screen payloads.
//!
//! No axum or HTTP types here.
//!
//! State is per process: two instances behind a load balancer each keep
//! their own counters.

pub mod detector;
pub mod error;
pub mod metrics;
pub mod policy;
pub mod rate_limit;
pub mod sanitize;
pub mod sweeper;

use std::sync::Arc;
use std::time::{Duration, Instant};

use error::{ServiceError, ServiceResult};
use metrics::Metrics;
use policy::{ActionKind, PolicyOverride, PolicyTable};
use rate_limit::{RateLimitDecision, RateLimitStore};
use sanitize::Validation;
use sweeper::Sweeper;

/// Configuration subset relevant to the service layer.
///
/// Transport-specific config (host, port, log format) stays in the binary
/// crate's `Config` struct.
#[derive(Debug, Clone, Default)]
pub struct ServiceConfig {
    pub policy_overrides: Vec<PolicyOverride>,
}

/// Shared service state, cloneable across all handlers.
#[derive(Clone)]
pub struct ServiceState {
    inner: Arc<Inner>,
}

struct Inner {
    store: RateLimitStore,
    metrics: Arc<Metrics>,
    start_time: Instant,
}

impl ServiceState {
    /// Creates a new service state from config.
    pub fn new(config: &ServiceConfig) -> Self {
        let policies = PolicyTable::defaults().apply_overrides(&config.policy_overrides);
        Self::with_policies(policies)
    }

    /// Creates a state with the default policy table (for tests and ephemeral use).
    pub fn new_in_memory() -> Self {
        Self::with_policies(PolicyTable::defaults())
    }

    /// Creates a state over an explicit policy table.
    pub fn with_policies(policies: PolicyTable) -> Self {
        let metrics = Arc::new(Metrics::new());
        Self {
            inner: Arc::new(Inner {
                store: RateLimitStore::new(policies, Arc::clone(&metrics)),
                metrics,
                start_time: Instant::now(),
            }),
        }
    }

    // --- Accessors ---

    pub fn store(&self) -> &RateLimitStore {
        &self.inner.store
    }

    pub fn metrics(&self) -> &Metrics {
        &self.inner.metrics
    }

    pub fn policies(&self) -> &PolicyTable {
        self.inner.store.policies()
    }

    pub fn uptime_secs(&self) -> u64 {
        self.inner.start_time.elapsed().as_secs()
    }

    /// Builds a sweeper bound to this state's store. The caller owns its lifetime.
    pub fn sweeper(&self, interval: Duration) -> Sweeper {
        Sweeper::new(self.inner.store.clone(), interval)
    }

    // --- Gates ---

    /// Admission check at the current instant.
    pub fn check(&self, identifier: &str, kind: ActionKind) -> ServiceResult<RateLimitDecision> {
        self.inner.store.check(identifier, kind)
    }

    /// Screens a decoded payload, recording and logging any detection.
    pub fn sanitize(&self, payload: &serde_json::Value) -> ServiceResult<serde_json::Value> {
        sanitize::sanitize(payload).inspect_err(|e| {
            if let ServiceError::MaliciousInputDetected { field, category } = e {
                self.inner.metrics.record_malicious(*category);
                tracing::warn!(%field, %category, "Malicious input rejected");
            }
        })
    }

    /// Like [`sanitize`](Self::sanitize), reporting the outcome instead of failing.
    pub fn validate(&self, payload: &serde_json::Value) -> Validation {
        match self.sanitize(payload) {
            Ok(_) => Validation::valid(),
            Err(e) => Validation::invalid(&e),
        }
    }

    /// Renders Prometheus metrics for the current state.
    pub fn render_metrics(&self) -> String {
        self.inner
            .metrics
            .render(self.inner.store.len(), self.uptime_secs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn overrides_reach_the_store() {
        let config = ServiceConfig {
            policy_overrides: vec!["login:1:60:60".parse().unwrap()],
        };
        let state = ServiceState::new(&config);
        assert!(state.check("10.0.0.1", ActionKind::Login).unwrap().allowed);
        let denied = state.check("10.0.0.1", ActionKind::Login).unwrap();
        assert!(!denied.allowed);
        assert_eq!(state.metrics().blocks_total(ActionKind::Login), 1);
    }

    #[test]
    fn sanitize_records_detections() {
        let state = ServiceState::new_in_memory();
        assert!(state.sanitize(&json!({"q": "x union y"})).is_err());
        assert!(state.sanitize(&json!({"q": "plain"})).is_ok());
        assert!(
            state
                .render_metrics()
                .contains("storeguard_malicious_input_total{category=\"sql\"} 1")
        );
    }

    #[test]
    fn validate_records_detections() {
        let state = ServiceState::new_in_memory();
        let v = state.validate(&json!({"bio": "javascript:void"}));
        assert!(!v.is_valid);
        assert!(v.error.unwrap().contains("bio"));
        assert!(state.validate(&json!({"bio": "plain"})).is_valid);
        assert!(
            state
                .render_metrics()
                .contains("storeguard_malicious_input_total{category=\"xss\"} 1")
        );
    }
}
