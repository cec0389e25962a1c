//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the load
//! balancer. All types derive Serde traits for deserialization from config
//! files, and every section has defaults so a minimal file is enough.

use serde::{Deserialize, Serialize};

use crate::load_balancer::Algorithm;

/// Number of endpoints generated when the pool lists no explicit addresses.
pub const DEFAULT_ENDPOINT_COUNT: usize = 3;

/// Root configuration for the load balancer.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct LoadBalancerConfig {
    /// Listener configuration (bind address, concurrency).
    pub listener: ListenerConfig,

    /// Selection algorithm used for every request.
    pub algorithm: Algorithm,

    /// Backend endpoint definitions.
    pub pool: PoolConfig,

    /// Health check settings.
    pub health_check: HealthCheckConfig,

    /// Weighted round-robin settings.
    pub weighted: WeightedConfig,

    /// Least connection settings.
    pub least_connection: LeastConnectionConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:7667").
    pub bind_address: String,

    /// Maximum requests handled concurrently (backpressure).
    pub max_concurrent_requests: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:7667".to_string(),
            max_concurrent_requests: 1024,
        }
    }
}

/// Backend endpoint pool.
///
/// Either list `addresses` explicitly, or give a `count` and let the pool
/// generate `http://{host}:{base_port + i}` for `i` in `0..count`.
/// `weights` and `initial_connections`, when present, must have one entry
/// per endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Explicit endpoint base URLs (e.g., "http://127.0.0.1:8080").
    pub addresses: Vec<String>,

    /// Number of generated endpoints when `addresses` is empty.
    pub count: Option<usize>,

    /// Host of generated endpoints.
    pub host: String,

    /// Port of the first generated endpoint.
    pub base_port: u16,

    /// Weight per endpoint for weighted round-robin (default: all 1).
    pub weights: Option<Vec<u32>>,

    /// Connection count seed per endpoint for least connection (default: all 0).
    pub initial_connections: Option<Vec<u64>>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            addresses: Vec::new(),
            count: None,
            host: "localhost".to_string(),
            base_port: 8080,
            weights: None,
            initial_connections: None,
        }
    }
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Health check interval in seconds.
    pub interval_secs: u64,

    /// Per-probe timeout in seconds.
    pub timeout_secs: u64,

    /// Path probed on every endpoint.
    pub path: String,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            interval_secs: 30,
            timeout_secs: 5,
            path: "/".to_string(),
        }
    }
}

/// Weighted round-robin configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WeightedConfig {
    /// Refill every weight credit after this many weighted picks.
    pub reset_every: u32,
}

impl Default for WeightedConfig {
    fn default() -> Self {
        Self { reset_every: 10 }
    }
}

/// Least connection configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct LeastConnectionConfig {
    /// Give the connection count back once the forwarded request completes.
    /// When off, counts only ever grow.
    pub release_on_completion: bool,
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins when set.
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}
