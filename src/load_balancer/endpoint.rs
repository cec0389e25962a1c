//! Endpoint abstraction.
//!
//! # Responsibilities
//! - Represent a single backend server
//! - Track health state (Unknown/Healthy/Unhealthy)
//! - Track requests currently in flight to the backend
//!
//! Health is stored in an atomic so probes never contend with the
//! registry lock held during selection.

use std::ops::Deref;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use url::Url;

/// Health state of an endpoint.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    /// Never probed. Not eligible for traffic.
    Unknown = 0,
    Healthy = 1,
    Unhealthy = 2,
}

impl From<u8> for HealthState {
    fn from(val: u8) -> Self {
        match val {
            1 => HealthState::Healthy,
            2 => HealthState::Unhealthy,
            _ => HealthState::Unknown,
        }
    }
}

/// A single backend server.
#[derive(Debug)]
pub struct Endpoint {
    /// Position in the registry. Stable for the process lifetime.
    index: usize,
    /// Base URL of the backend.
    address: Url,
    /// Current health state, see [`HealthState`].
    state: AtomicU8,
    /// Number of requests currently being forwarded to this backend.
    active_connections: AtomicUsize,
}

impl Endpoint {
    /// Create a new endpoint. It starts in [`HealthState::Unknown`].
    pub fn new(index: usize, address: Url) -> Self {
        Self {
            index,
            address,
            state: AtomicU8::new(HealthState::Unknown as u8),
            active_connections: AtomicUsize::new(0),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn address(&self) -> &Url {
        &self.address
    }

    /// Absolute URL for `path_and_query` under this endpoint's base path.
    pub fn url_for(&self, path_and_query: &str) -> String {
        let base = self.address.as_str().trim_end_matches('/');
        if path_and_query.starts_with('/') {
            format!("{base}{path_and_query}")
        } else {
            format!("{base}/{path_and_query}")
        }
    }

    pub fn health(&self) -> HealthState {
        HealthState::from(self.state.load(Ordering::Acquire))
    }

    /// Only a backend that passed its last probe is healthy.
    pub fn is_healthy(&self) -> bool {
        self.health() == HealthState::Healthy
    }

    /// Store a new health flag, returning the previous state.
    pub fn set_healthy(&self, healthy: bool) -> HealthState {
        let next = if healthy {
            HealthState::Healthy
        } else {
            HealthState::Unhealthy
        };
        HealthState::from(self.state.swap(next as u8, Ordering::AcqRel))
    }

    /// Get the current number of in-flight requests.
    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::Relaxed)
    }

    /// Mark a request as in flight until the returned guard is dropped.
    pub fn track(self: &Arc<Self>) -> ConnectionGuard {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
        ConnectionGuard {
            endpoint: self.clone(),
        }
    }
}

/// A RAII guard that manages the in-flight request count.
#[derive(Debug)]
pub struct ConnectionGuard {
    endpoint: Arc<Endpoint>,
}

impl Deref for ConnectionGuard {
    type Target = Endpoint;
    fn deref(&self) -> &Self::Target {
        &self.endpoint
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.endpoint
            .active_connections
            .fetch_sub(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint() -> Arc<Endpoint> {
        Arc::new(Endpoint::new(0, Url::parse("http://127.0.0.1:8080").unwrap()))
    }

    #[test]
    fn starts_unknown_and_not_healthy() {
        let ep = endpoint();
        assert_eq!(ep.health(), HealthState::Unknown);
        assert!(!ep.is_healthy());
    }

    #[test]
    fn set_healthy_reports_previous_state() {
        let ep = endpoint();
        assert_eq!(ep.set_healthy(true), HealthState::Unknown);
        assert_eq!(ep.set_healthy(false), HealthState::Healthy);
        assert_eq!(ep.set_healthy(false), HealthState::Unhealthy);
        assert!(!ep.is_healthy());
    }

    #[test]
    fn url_for_joins_base_path() {
        let root = endpoint();
        assert_eq!(root.url_for("/"), "http://127.0.0.1:8080/");
        assert_eq!(root.url_for("/a/b?c=1"), "http://127.0.0.1:8080/a/b?c=1");

        let nested = Endpoint::new(1, Url::parse("http://backend:9000/api/").unwrap());
        assert_eq!(nested.url_for("/users"), "http://backend:9000/api/users");
        assert_eq!(nested.url_for("users"), "http://backend:9000/api/users");
    }

    #[test]
    fn guard_tracks_in_flight_requests() {
        let ep = endpoint();
        let g1 = ep.track();
        let g2 = ep.track();
        assert_eq!(ep.active_connections(), 2);
        drop(g1);
        assert_eq!(g2.active_connections(), 1);
        drop(g2);
        assert_eq!(ep.active_connections(), 0);
    }
}
