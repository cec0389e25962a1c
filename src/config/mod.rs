//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks, pool resolution)
//!     → LoadBalancerConfig (validated, immutable)
//!     → handed to the server at startup
//! ```
//!
//! # Design Decisions
//! - Config is read once at startup and never reloaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    HealthCheckConfig, LeastConnectionConfig, ListenerConfig, LoadBalancerConfig,
    ObservabilityConfig, PoolConfig, TimeoutConfig, WeightedConfig,
};
pub use validation::{resolve_pool, validate_config, ResolvedPool, ValidationError};
