//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Resolve the endpoint pool into concrete URLs, weights and seeds
//! - Validate value ranges (intervals > 0, weights > 0, ports valid)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: LoadBalancerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::{LoadBalancerConfig, PoolConfig, DEFAULT_ENDPOINT_COUNT};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid bind address {0:?}")]
    BindAddress(String),
    #[error("endpoint pool is empty")]
    EmptyPool,
    #[error("pool.count is {count} but {listed} addresses are listed")]
    CountMismatch { count: usize, listed: usize },
    #[error("generated endpoint port {base_port} + {index} is out of range")]
    PortRange { base_port: u16, index: usize },
    #[error("invalid endpoint address {address:?}: {reason}")]
    Address { address: String, reason: String },
    #[error("duplicate endpoint address {0}")]
    DuplicateAddress(String),
    #[error("expected {expected} weights, got {actual}")]
    WeightCount { expected: usize, actual: usize },
    #[error("expected {expected} initial connection counts, got {actual}")]
    ConnectionCount { expected: usize, actual: usize },
    #[error("weight of endpoint {index} must be positive")]
    ZeroWeight { index: usize },
    #[error("{0} must be positive")]
    NotPositive(&'static str),
    #[error("health check path {0:?} must start with '/'")]
    HealthPath(String),
}

/// The endpoint pool after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPool {
    pub addresses: Vec<Url>,
    pub weights: Vec<u32>,
    pub initial_connections: Vec<u64>,
}

/// Validate the whole configuration, collecting every problem found.
pub fn validate_config(config: &LoadBalancerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }
    if config.listener.max_concurrent_requests == 0 {
        errors.push(ValidationError::NotPositive("listener.max_concurrent_requests"));
    }
    if config.health_check.interval_secs == 0 {
        errors.push(ValidationError::NotPositive("health_check.interval_secs"));
    }
    if config.health_check.timeout_secs == 0 {
        errors.push(ValidationError::NotPositive("health_check.timeout_secs"));
    }
    if !config.health_check.path.starts_with('/') {
        errors.push(ValidationError::HealthPath(config.health_check.path.clone()));
    }
    if config.weighted.reset_every == 0 {
        errors.push(ValidationError::NotPositive("weighted.reset_every"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::NotPositive("timeouts.request_secs"));
    }

    if let Err(pool_errors) = resolve_pool(&config.pool) {
        errors.extend(pool_errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Turn the pool section into concrete endpoints.
pub fn resolve_pool(pool: &PoolConfig) -> Result<ResolvedPool, Vec<ValidationError>> {
    let mut errors = Vec::new();

    let raw: Vec<String> = if pool.addresses.is_empty() {
        let count = pool.count.unwrap_or(DEFAULT_ENDPOINT_COUNT);
        let available = usize::from(u16::MAX - pool.base_port) + 1;
        if count > available {
            // Report the first index past port 65535 and stop there.
            return Err(vec![ValidationError::PortRange {
                base_port: pool.base_port,
                index: available,
            }]);
        }
        (0..count)
            .map(|offset| format!("http://{}:{}", pool.host, usize::from(pool.base_port) + offset))
            .collect()
    } else {
        if let Some(count) = pool.count {
            if count != pool.addresses.len() {
                errors.push(ValidationError::CountMismatch {
                    count,
                    listed: pool.addresses.len(),
                });
            }
        }
        pool.addresses.clone()
    };

    let expected = if pool.addresses.is_empty() {
        pool.count.unwrap_or(DEFAULT_ENDPOINT_COUNT)
    } else {
        pool.addresses.len()
    };
    if expected == 0 {
        errors.push(ValidationError::EmptyPool);
    }

    let mut seen = HashSet::new();
    let addresses: Vec<Url> = raw
        .iter()
        .filter_map(|address| match parse_endpoint(address) {
            Ok(url) => {
                if !seen.insert(url.clone()) {
                    errors.push(ValidationError::DuplicateAddress(url.to_string()));
                }
                Some(url)
            }
            Err(reason) => {
                errors.push(ValidationError::Address {
                    address: address.clone(),
                    reason,
                });
                None
            }
        })
        .collect();

    let weights = pool.weights.clone().unwrap_or_else(|| vec![1; expected]);
    if weights.len() != expected {
        errors.push(ValidationError::WeightCount {
            expected,
            actual: weights.len(),
        });
    }
    errors.extend(
        weights
            .iter()
            .enumerate()
            .filter(|(_, w)| **w == 0)
            .map(|(index, _)| ValidationError::ZeroWeight { index }),
    );

    let initial_connections = pool
        .initial_connections
        .clone()
        .unwrap_or_else(|| vec![0; expected]);
    if initial_connections.len() != expected {
        errors.push(ValidationError::ConnectionCount {
            expected,
            actual: initial_connections.len(),
        });
    }

    if errors.is_empty() {
        Ok(ResolvedPool {
            addresses,
            weights,
            initial_connections,
        })
    } else {
        Err(errors)
    }
}

fn parse_endpoint(address: &str) -> Result<Url, String> {
    let url = Url::parse(address).map_err(|e| e.to_string())?;
    if url.scheme() != "http" {
        return Err(format!("unsupported scheme {:?}", url.scheme()));
    }
    if url.host_str().is_none() {
        return Err("missing host".to_string());
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err("query and fragment are not allowed".to_string());
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool_of(addresses: &[&str]) -> PoolConfig {
        PoolConfig {
            addresses: addresses.iter().map(|a| a.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn default_config_is_valid() {
        assert_eq!(validate_config(&LoadBalancerConfig::default()), Ok(()));
    }

    #[test]
    fn generates_consecutive_ports() {
        let pool = PoolConfig {
            count: Some(3),
            host: "127.0.0.1".into(),
            base_port: 9000,
            ..Default::default()
        };
        let resolved = resolve_pool(&pool).unwrap();

        let addresses: Vec<_> = resolved.addresses.iter().map(Url::as_str).collect();
        assert_eq!(
            addresses,
            ["http://127.0.0.1:9000/", "http://127.0.0.1:9001/", "http://127.0.0.1:9002/"]
        );
        assert_eq!(resolved.weights, [1, 1, 1]);
        assert_eq!(resolved.initial_connections, [0, 0, 0]);
    }

    #[test]
    fn rejects_mismatched_weight_and_seed_lengths() {
        let pool = PoolConfig {
            weights: Some(vec![3, 1]),
            initial_connections: Some(vec![0, 0, 0, 0]),
            ..pool_of(&["http://a:1", "http://b:1", "http://c:1"])
        };
        let errors = resolve_pool(&pool).unwrap_err();

        assert!(errors.contains(&ValidationError::WeightCount { expected: 3, actual: 2 }));
        assert!(errors.contains(&ValidationError::ConnectionCount { expected: 3, actual: 4 }));
    }

    #[test]
    fn rejects_zero_weight_and_bad_addresses() {
        let pool = PoolConfig {
            weights: Some(vec![1, 0, 1]),
            ..pool_of(&["http://a:1", "ftp://b:1", "http://a:1"])
        };
        let errors = resolve_pool(&pool).unwrap_err();

        assert!(errors.contains(&ValidationError::ZeroWeight { index: 1 }));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::Address { address, .. } if address == "ftp://b:1")));
        assert!(errors.contains(&ValidationError::DuplicateAddress("http://a:1/".into())));
    }

    #[test]
    fn rejects_empty_pool_and_count_mismatch() {
        let empty = PoolConfig {
            count: Some(0),
            ..Default::default()
        };
        assert!(resolve_pool(&empty).unwrap_err().contains(&ValidationError::EmptyPool));

        let mismatch = PoolConfig {
            count: Some(4),
            ..pool_of(&["http://a:1"])
        };
        assert!(resolve_pool(&mismatch)
            .unwrap_err()
            .contains(&ValidationError::CountMismatch { count: 4, listed: 1 }));
    }

    #[test]
    fn rejects_port_overflow() {
        let pool = PoolConfig {
            count: Some(2),
            base_port: u16::MAX,
            ..Default::default()
        };
        assert!(resolve_pool(&pool)
            .unwrap_err()
            .contains(&ValidationError::PortRange { base_port: u16::MAX, index: 1 }));
    }

    #[test]
    fn huge_count_reports_one_port_error() {
        let pool = PoolConfig {
            count: Some(1_000_000_000),
            base_port: 8080,
            ..Default::default()
        };
        assert_eq!(
            resolve_pool(&pool).unwrap_err(),
            [ValidationError::PortRange { base_port: 8080, index: 57456 }]
        );
    }

    #[test]
    fn count_reaching_last_port_is_accepted() {
        let pool = PoolConfig {
            count: Some(2),
            base_port: u16::MAX - 1,
            ..Default::default()
        };
        let resolved = resolve_pool(&pool).unwrap();
        assert_eq!(resolved.addresses[1].port(), Some(u16::MAX));
    }

    #[test]
    fn collects_every_error() {
        let mut config = LoadBalancerConfig::default();
        config.listener.bind_address = "nowhere".into();
        config.health_check.interval_secs = 0;
        config.health_check.path = "health".into();
        config.weighted.reset_every = 0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&ValidationError::NotPositive("weighted.reset_every")));
    }
}
