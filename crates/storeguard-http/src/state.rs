//! HTTP application state: wraps `ServiceState`.
//!
//! `AppState` provides transparent access to all `ServiceState` methods
//! via `Deref`.

use std::ops::Deref;

use storeguard_service::ServiceState;
use storeguard_service::policy::PolicyTable;

/// Shared HTTP application state, cloneable across handlers.
///
/// `ServiceState` is already reference-counted, so cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    service: ServiceState,
}

impl Deref for AppState {
    type Target = ServiceState;

    fn deref(&self) -> &ServiceState {
        &self.service
    }
}

impl AppState {
    pub fn new(service: ServiceState) -> Self {
        Self { service }
    }

    /// Creates a state with default policies (for tests and ephemeral use).
    pub fn new_in_memory() -> Self {
        Self::new(ServiceState::new_in_memory())
    }

    /// Creates a state over an explicit policy table (for tests).
    pub fn new_in_memory_with_policies(policies: PolicyTable) -> Self {
        Self::new(ServiceState::with_policies(policies))
    }

    /// Returns a reference to the underlying service state.
    pub fn service(&self) -> &ServiceState {
        &self.service
    }
}
