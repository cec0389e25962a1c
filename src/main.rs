//! HTTP load balancer.
//!
//! # Architecture Overview
//!
//! ```text
//!                       ┌───────────────────────────────────────────────┐
//!                       │                 LOAD BALANCER                 │
//!                       │                                               │
//!     Client Request    │  ┌─────────┐    ┌───────────────┐             │
//!     ──────────────────┼─▶│  http   │───▶│ load_balancer │             │
//!                       │  │ server  │    │   registry    │             │
//!                       │  └─────────┘    └───────┬───────┘             │
//!                       │                         │                     │
//!                       │                         ▼                     │
//!     Client Response   │  ┌─────────┐    ┌───────────────┐             │
//!     ◀─────────────────┼──│response │◀───│ http client   │◀────────────┼──── Endpoint
//!                       │  │  relay  │    │  (forward)    │             │
//!                       │  └─────────┘    └───────────────┘             │
//!                       │                                               │
//!                       │  ┌─────────┐ ┌────────┐ ┌─────────────────┐   │
//!                       │  │ config  │ │ health │ │    lifecycle    │   │
//!                       │  │         │ │monitor │ │startup/shutdown │   │
//!                       │  └─────────┘ └────────┘ └─────────────────┘   │
//!                       └───────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use loadbalancer::config::{self, LoadBalancerConfig};
use loadbalancer::load_balancer::Algorithm;
use loadbalancer::{lifecycle, observability};

#[derive(Parser)]
#[command(name = "loadbalancer")]
#[command(about = "HTTP load balancer with active health checking", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the selection algorithm.
    #[arg(short, long, value_enum)]
    algorithm: Option<Algorithm>,

    /// Override the listener bind address (e.g., 0.0.0.0:7667).
    #[arg(short, long)]
    bind: Option<String>,
}

impl Cli {
    fn into_config(self) -> Result<LoadBalancerConfig, config::ConfigError> {
        let mut config = match &self.config {
            Some(path) => config::load_config(path)?,
            None => LoadBalancerConfig::default(),
        };

        if let Some(algorithm) = self.algorithm {
            config.algorithm = algorithm;
        }
        if let Some(bind) = self.bind {
            config.listener.bind_address = bind;
        }

        config::validate_config(&config).map_err(config::ConfigError::Validation)?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = match Cli::parse().into_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("loadbalancer: {e}");
            return ExitCode::FAILURE;
        }
    };

    observability::logging::init(&config.observability);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address,
        algorithm = %config.algorithm,
        health_interval_secs = config.health_check.interval_secs,
        "Configuration loaded"
    );

    match lifecycle::start(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Load balancer failed");
            ExitCode::FAILURE
        }
    }
}
