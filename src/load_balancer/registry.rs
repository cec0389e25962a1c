//! Endpoint registry.
//!
//! # Responsibilities
//! - Own the fixed, index-stable list of endpoints
//! - Own all selection bookkeeping (cursor, connection counts, weight credits)
//! - Serialize selections behind a single lock
//!
//! Health flags live on the endpoints themselves, outside the lock, so a
//! slow probe never stalls routing.

use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use url::Url;

use crate::load_balancer::{
    endpoint::{Endpoint, HealthState},
    LoadBalancer, NoHealthyEndpoint,
};

/// Error returned when the registry is built from inconsistent input.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("at least one endpoint must be configured")]
    Empty,
    #[error("expected {expected} weights, got {actual}")]
    WeightCount { expected: usize, actual: usize },
    #[error("expected {expected} initial connection counts, got {actual}")]
    ConnectionCount { expected: usize, actual: usize },
    #[error("weight of endpoint {index} must be positive")]
    ZeroWeight { index: usize },
    #[error("weight reset cadence must be positive")]
    ZeroResetEvery,
}

/// Selection bookkeeping guarded by the registry lock.
///
/// All vectors are indexed by [`Endpoint::index`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionState {
    pub(crate) cursor: usize,
    pub(crate) connection_counts: Vec<u64>,
    pub(crate) weight_credits: Vec<u32>,
    pub(crate) original_weights: Vec<u32>,
    pub(crate) request_counter: u64,
    pub(crate) reset_every: u32,
}

impl SelectionState {
    /// Next index considered by the round-robin family.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn connection_counts(&self) -> &[u64] {
        &self.connection_counts
    }

    pub fn weight_credits(&self) -> &[u32] {
        &self.weight_credits
    }

    pub fn original_weights(&self) -> &[u32] {
        &self.original_weights
    }

    /// Successful weighted selections so far.
    pub fn request_counter(&self) -> u64 {
        self.request_counter
    }

    pub fn reset_every(&self) -> u32 {
        self.reset_every
    }

    /// Refill every credit to its configured weight.
    pub(crate) fn reset_credits(&mut self) {
        self.weight_credits.copy_from_slice(&self.original_weights);
    }
}

/// Owns the endpoints and the selection state.
#[derive(Debug)]
pub struct EndpointRegistry {
    endpoints: Vec<Arc<Endpoint>>,
    state: Mutex<SelectionState>,
}

impl EndpointRegistry {
    /// Build the registry. Every endpoint starts unprobed and therefore
    /// ineligible until the first health check marks it healthy.
    pub fn initialize(
        addresses: Vec<Url>,
        weights: &[u32],
        initial_connections: &[u64],
        reset_every: u32,
    ) -> Result<Self, RegistryError> {
        let count = addresses.len();
        if count == 0 {
            return Err(RegistryError::Empty);
        }
        if weights.len() != count {
            return Err(RegistryError::WeightCount {
                expected: count,
                actual: weights.len(),
            });
        }
        if initial_connections.len() != count {
            return Err(RegistryError::ConnectionCount {
                expected: count,
                actual: initial_connections.len(),
            });
        }
        if let Some(index) = weights.iter().position(|w| *w == 0) {
            return Err(RegistryError::ZeroWeight { index });
        }
        if reset_every == 0 {
            return Err(RegistryError::ZeroResetEvery);
        }

        let endpoints = addresses
            .into_iter()
            .enumerate()
            .map(|(index, address)| {
                tracing::debug!(
                    index,
                    address = %address,
                    weight = weights[index],
                    initial_connections = initial_connections[index],
                    "Registering endpoint"
                );
                Arc::new(Endpoint::new(index, address))
            })
            .collect();

        Ok(Self {
            endpoints,
            state: Mutex::new(SelectionState {
                cursor: 0,
                connection_counts: initial_connections.to_vec(),
                weight_credits: weights.to_vec(),
                original_weights: weights.to_vec(),
                request_counter: 0,
                reset_every,
            }),
        })
    }

    /// Run `f` with exclusive access to the selection state.
    ///
    /// The lock is released when `f` returns or unwinds. A poisoned lock is
    /// recovered: the bookkeeping is plain counters and stays usable.
    pub fn with_lock<R>(&self, f: impl FnOnce(&[Arc<Endpoint>], &mut SelectionState) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&self.endpoints, &mut state)
    }

    /// Pick an endpoint with the given algorithm.
    pub fn select(
        &self,
        balancer: &dyn LoadBalancer,
        client: Option<&str>,
    ) -> Result<Arc<Endpoint>, NoHealthyEndpoint> {
        let chosen = self.with_lock(|endpoints, state| balancer.next_server(endpoints, state, client));

        match chosen.and_then(|index| self.endpoints.get(index)) {
            Some(endpoint) => {
                tracing::trace!(
                    algorithm = balancer.name(),
                    address = %endpoint.address(),
                    "Endpoint selected"
                );
                Ok(endpoint.clone())
            }
            None => {
                tracing::debug!(
                    algorithm = balancer.name(),
                    endpoint_count = self.endpoints.len(),
                    "No healthy endpoint found"
                );
                for endpoint in &self.endpoints {
                    tracing::debug!(address = %endpoint.address(), state = ?endpoint.health(), "Endpoint status");
                }
                Err(NoHealthyEndpoint)
            }
        }
    }

    /// Record the health of the endpoint at `address`.
    ///
    /// Only touches that endpoint; the registry lock is not taken.
    /// Returns `false` if no endpoint has this address.
    pub fn set_healthy(&self, address: &Url, healthy: bool) -> bool {
        let Some(endpoint) = self.endpoints.iter().find(|e| e.address() == address) else {
            return false;
        };

        let previous = endpoint.set_healthy(healthy);
        let changed = match previous {
            HealthState::Healthy => !healthy,
            HealthState::Unhealthy => healthy,
            HealthState::Unknown => true,
        };
        if changed {
            tracing::info!(
                address = %address,
                from = ?previous,
                healthy,
                "Endpoint health changed"
            );
        }
        true
    }

    /// Give back one unit of least-connection load for `endpoint`.
    pub fn release(&self, endpoint: &Endpoint) {
        self.with_lock(|_, state| {
            if let Some(count) = state.connection_counts.get_mut(endpoint.index()) {
                *count = count.saturating_sub(1);
            }
        });
    }

    /// All endpoints, in configuration order.
    pub fn endpoints(&self) -> &[Arc<Endpoint>] {
        &self.endpoints
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Copy of the current selection state.
    pub fn snapshot(&self) -> SelectionState {
        self.with_lock(|_, state| state.clone())
    }
}
