//! Weighted round-robin load balancing strategy.
//!
//! Each endpoint holds a credit equal to its weight. A pick spends one
//! credit and the cursor stays on that endpoint until its credit is gone,
//! so weights `[3, 1]` yield `A, A, A, B`. Endpoints with no credit left
//! are skipped. Every `reset_every`-th successful pick refills all
//! credits, whatever they hold at that point. When the healthy endpoints
//! have all run dry before that, credits are refilled on the spot so the
//! pool never stalls.

use std::sync::Arc;

use crate::load_balancer::{endpoint::Endpoint, registry::SelectionState, LoadBalancer};

/// Weighted round-robin selector.
#[derive(Debug, Default, Clone, Copy)]
pub struct WeightedRoundRobin;

impl WeightedRoundRobin {
    fn scan(endpoints: &[Arc<Endpoint>], state: &SelectionState) -> Option<usize> {
        let len = endpoints.len();
        (0..len)
            .map(|offset| (state.cursor + offset) % len)
            .find(|&i| endpoints[i].is_healthy() && state.weight_credits[i] > 0)
    }
}

impl LoadBalancer for WeightedRoundRobin {
    fn name(&self) -> &'static str {
        "weighted_round_robin"
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

        let index = match Self::scan(endpoints, state) {
            Some(index) => index,
            None if endpoints.iter().any(|e| e.is_healthy()) => {
                tracing::debug!("Weight credits exhausted, refilling");
                state.reset_credits();
                Self::scan(endpoints, state)?
            }
            None => return None,
        };

        state.weight_credits[index] -= 1;
        // Stay on this endpoint until its credit is spent.
        if state.weight_credits[index] == 0 {
            state.cursor = (index + 1) % len;
        } else {
            state.cursor = index;
        }
        state.request_counter += 1;

        if state.request_counter % u64::from(state.reset_every) == 0 {
            tracing::trace!(picks = state.request_counter, "Resetting weight credits");
            state.reset_credits();
        }

        Some(index)
    }
}
