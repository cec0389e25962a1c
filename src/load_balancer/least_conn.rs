//! Least connections load balancing strategy.

use std::sync::Arc;

use crate::load_balancer::{endpoint::Endpoint, registry::SelectionState, LoadBalancer};

/// Least connections selector.
///
/// Picks the healthy endpoint with the lowest connection count and charges
/// it one unit. The count is a selection-time load hint: it only goes down
/// when the registry is told to release it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LeastConnection;

impl LoadBalancer for LeastConnection {
    fn name(&self) -> &'static str {
        "least_connection"
    }

    fn next_server(
        &self,
        endpoints: &[Arc<Endpoint>],
        state: &mut SelectionState,
        _client: Option<&str>,
    ) -> Option<usize> {
        // min_by_key keeps the first of equal elements, so ties go to list order.
        let index = endpoints
            .iter()
            .filter(|e| e.is_healthy())
            .map(|e| e.index())
            .min_by_key(|&i| state.connection_counts[i])?;

        state.connection_counts[index] += 1;
        tracing::trace!(
            address = %endpoints[index].address(),
            connections = state.connection_counts[index],
            "Least connection pick"
        );
        Some(index)
    }
}
