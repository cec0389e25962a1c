//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Request arrives at the dispatcher
//!     → registry.rs (take the selection lock)
//!     → Apply the configured algorithm:
//!         - round_robin.rs (rotate through healthy endpoints)
//!         - weighted.rs (rotate, spending per-endpoint weight credits)
//!         - least_conn.rs (pick endpoint with the lowest connection count)
//!         - ip_hash.rs (pin a client address to an endpoint)
//!     → endpoint.rs (the chosen backend)
//!     → Return endpoint or NoHealthyEndpoint
//! ```
//!
//! # Design Decisions
//! - Algorithms are stateless; all bookkeeping lives in the registry
//! - One lock linearizes every selection
//! - Unhealthy (or never probed) endpoints are excluded from selection

pub mod endpoint;
pub mod ip_hash;
pub mod least_conn;
pub mod registry;
pub mod round_robin;
pub mod weighted;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::load_balancer::endpoint::Endpoint;
use crate::load_balancer::registry::SelectionState;

pub use endpoint::{ConnectionGuard, HealthState};
pub use registry::{EndpointRegistry, RegistryError};

/// Returned when no endpoint can take the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no healthy endpoint available")]
pub struct NoHealthyEndpoint;

/// A selection algorithm.
///
/// Implementations run with the registry lock held and may mutate the
/// bookkeeping in `state`. They return the index of the chosen endpoint.
pub trait LoadBalancer: fmt::Debug + Send + Sync {
    fn name(&self) -> &'static str;

    fn next_server(
        &self,
        endpoints: &[Arc<Endpoint>],
        state: &mut SelectionState,
        client: Option<&str>,
    ) -> Option<usize>;
}

/// The configured selection algorithm.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    #[default]
    RoundRobin,
    WeightedRoundRobin,
    LeastConnection,
    IpHash,
}

impl Algorithm {
    /// The algorithm implementation for this variant.
    pub fn balancer(self) -> &'static dyn LoadBalancer {
        match self {
            Algorithm::RoundRobin => &round_robin::RoundRobin,
            Algorithm::WeightedRoundRobin => &weighted::WeightedRoundRobin,
            Algorithm::LeastConnection => &least_conn::LeastConnection,
            Algorithm::IpHash => &ip_hash::IpHash,
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.balancer().name())
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    const ALL: [Algorithm; 4] = [
        Algorithm::RoundRobin,
        Algorithm::WeightedRoundRobin,
        Algorithm::LeastConnection,
        Algorithm::IpHash,
    ];

    #[test]
    fn every_algorithm_fails_when_all_unhealthy() {
        for algorithm in ALL {
            let registry = healthy_registry(&[1, 2, 3]);
            for endpoint in registry.endpoints() {
                endpoint.set_healthy(false);
            }
            for _ in 0..5 {
                assert_eq!(
                    registry.select(algorithm.balancer(), Some("10.1.2.3")).unwrap_err(),
                    NoHealthyEndpoint,
                    "{algorithm} returned an endpoint"
                );
            }
        }
    }

    #[test]
    fn algorithm_names_are_snake_case() {
        assert_eq!(Algorithm::RoundRobin.to_string(), "round_robin");
        assert_eq!(Algorithm::WeightedRoundRobin.to_string(), "weighted_round_robin");
        assert_eq!(Algorithm::LeastConnection.to_string(), "least_connection");
        assert_eq!(Algorithm::IpHash.to_string(), "ip_hash");
    }
}
