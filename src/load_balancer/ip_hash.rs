//! Client-affinity load balancing strategy.
//!
//! Hashes the client key to a starting endpoint and probes forward past
//! unhealthy ones. A given client keeps landing on the same endpoint for
//! as long as the health picture does not change.

use std::sync::Arc;

use crate::load_balancer::{endpoint::Endpoint, registry::SelectionState, LoadBalancer};

/// IP hash selector.
#[derive(Debug, Default, Clone, Copy)]
pub struct IpHash;

/// Polynomial rolling hash: `h = h * 33 + byte`, seeded with 5381.
pub fn hash_key(key: &str) -> u64 {
    key.bytes()
        .fold(5381u64, |hash, byte| {
            (hash << 5).wrapping_add(hash).wrapping_add(u64::from(byte))
        })
}

impl LoadBalancer for IpHash {
    fn name(&self) -> &'static str {
        "ip_hash"
    }

    fn next_server(
        &self,
        endpoints: &[Arc<Endpoint>],
        _state: &mut SelectionState,
        client: Option<&str>,
    ) -> Option<usize> {
        let len = endpoints.len();
        if len == 0 {
            return None;
        }

        let start = (hash_key(client.unwrap_or_default()) % len as u64) as usize;
        (0..len)
            .map(|offset| (start + offset) % len)
            .find(|&i| endpoints[i].is_healthy())
    }
}
