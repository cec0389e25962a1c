//! Round-robin load balancing strategy.

use std::sync::Arc;

use crate::load_balancer::{endpoint::Endpoint, registry::SelectionState, LoadBalancer};

/// Round-robin selector.
/// Walks the shared cursor through the endpoints, skipping unhealthy ones.
#[derive(Debug, Default, Clone, Copy)]
pub struct RoundRobin;

impl LoadBalancer for RoundRobin {
    fn name(&self) -> &'static str {
        "round_robin"
    }

    fn next_server(
        &self,
        endpoints: &[Arc<Endpoint>],
        state: &mut SelectionState,
        _client: Option<&str>,
    ) -> Option<usize> {
        let len = endpoints.len();
        if len == 0 {
            return None;
        }

        // The cursor moves on every probe, healthy or not.
        for _ in 0..len {
            let index = state.cursor % len;
            state.cursor = (index + 1) % len;
            if endpoints[index].is_healthy() {
                return Some(index);
            }
        }
        None
    }
}
