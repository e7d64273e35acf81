//! Worker versions and the registration that holds them.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use url::Url;

/// Unique identifier for a worker version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServiceWorkerId(u64);

impl ServiceWorkerId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Service worker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ServiceWorkerState {
    /// Initial state.
    #[default]
    Parsed,
    /// Installing (install event).
    Installing,
    /// Installed but waiting for activation.
    Installed,
    /// Activating (activate event).
    Activating,
    /// Active and controlling pages.
    Activated,
    /// Redundant (replaced).
    Redundant,
}

/// One version of the worker, identified by its cache version tag.
#[derive(Debug, Clone)]
pub struct ServiceWorker {
    /// Unique ID.
    pub id: ServiceWorkerId,

    /// Cache version this worker was built for.
    pub version: String,

    /// Current state.
    pub state: ServiceWorkerState,

    /// Set by the install handler once the worker may activate immediately.
    pub skip_waiting: bool,

    /// Time of last state change.
    pub state_changed_at: Instant,
}

impl ServiceWorker {
    /// Create a new service worker.
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            id: ServiceWorkerId::new(),
            version: version.into(),
            state: ServiceWorkerState::Parsed,
            skip_waiting: false,
            state_changed_at: Instant::now(),
        }
    }

    /// Set state.
    pub fn set_state(&mut self, state: ServiceWorkerState) {
        self.state = state;
        self.state_changed_at = Instant::now();
    }

    /// Check if active.
    pub fn is_active(&self) -> bool {
        self.state == ServiceWorkerState::Activated
    }
}

/// A service worker registration for one scope.
#[derive(Debug)]
pub struct ServiceWorkerRegistration {
    /// Scope URL.
    pub scope: Url,

    /// Installing worker.
    pub installing: Option<ServiceWorker>,

    /// Waiting worker (installed but not active).
    pub waiting: Option<ServiceWorker>,

    /// Active worker.
    pub active: Option<ServiceWorker>,
}

impl ServiceWorkerRegistration {
    /// Create a new registration.
    pub fn new(scope: Url) -> Self {
        Self {
            scope,
            installing: None,
            waiting: None,
            active: None,
        }
    }

    /// Start installing a new worker version.
    pub fn update(&mut self, version: &str) -> ServiceWorkerId {
        let mut worker = ServiceWorker::new(version);
        worker.set_state(ServiceWorkerState::Installing);
        let id = worker.id;
        if let Some(mut previous) = self.installing.replace(worker) {
            previous.set_state(ServiceWorkerState::Redundant);
        }
        id
    }

    /// Transition installing to waiting.
    pub fn install_complete(&mut self, skip_waiting: bool) -> Option<ServiceWorkerId> {
        let mut worker = self.installing.take()?;
        worker.set_state(ServiceWorkerState::Installed);
        worker.skip_waiting = skip_waiting;
        let id = worker.id;
        if let Some(mut replaced) = self.waiting.replace(worker) {
            replaced.set_state(ServiceWorkerState::Redundant);
        }
        Some(id)
    }

    /// Promote the waiting worker, retiring the previous active one.
    pub fn activate(&mut self) -> Option<ServiceWorkerId> {
        let mut worker = self.waiting.take()?;
        worker.set_state(ServiceWorkerState::Activating);

        if let Some(mut old) = self.active.take() {
            old.set_state(ServiceWorkerState::Redundant);
        }

        worker.set_state(ServiceWorkerState::Activated);
        let id = worker.id;
        self.active = Some(worker);
        Some(id)
    }

    /// Whether the waiting worker asked to take over without waiting.
    pub fn waiting_wants_skip(&self) -> bool {
        self.waiting.as_ref().is_some_and(|w| w.skip_waiting)
    }

    /// Get the active worker.
    pub fn get_active(&self) -> Option<&ServiceWorker> {
        self.active.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration() -> ServiceWorkerRegistration {
        ServiceWorkerRegistration::new(Url::parse("https://example.com/").unwrap())
    }

    #[test]
    fn test_service_worker_state_transitions() {
        let mut worker = ServiceWorker::new("v1");
        assert_eq!(worker.state, ServiceWorkerState::Parsed);

        worker.set_state(ServiceWorkerState::Installing);
        assert_eq!(worker.state, ServiceWorkerState::Installing);

        worker.set_state(ServiceWorkerState::Activated);
        assert!(worker.is_active());
    }

    #[test]
    fn test_registration_lifecycle() {
        let mut registration = registration();
        assert!(registration.active.is_none());

        registration.update("v1");
        assert!(registration.installing.is_some());

        registration.install_complete(true);
        assert!(registration.waiting.is_some());
        assert!(registration.installing.is_none());
        assert!(registration.waiting_wants_skip());

        registration.activate();
        assert!(registration.get_active().unwrap().is_active());
        assert!(registration.waiting.is_none());
    }

    #[test]
    fn test_new_version_replaces_active() {
        let mut registration = registration();
        registration.update("v1");
        registration.install_complete(true);
        let first = registration.activate().unwrap();

        registration.update("v2");
        registration.install_complete(false);
        assert!(!registration.waiting_wants_skip());
        let second = registration.activate().unwrap();

        assert_ne!(first, second);
        assert_eq!(registration.get_active().unwrap().version, "v2");
    }

    #[test]
    fn test_activate_without_waiting_is_noop() {
        let mut registration = registration();
        assert!(registration.activate().is_none());
        assert!(registration.install_complete(false).is_none());
    }
}
