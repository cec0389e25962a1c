//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the server from a validated configuration
//! - Bind the listener
//! - Wire OS signals to graceful shutdown
//! - Run until shutdown completes
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - Listeners start last (traffic only after the first health check)

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::LoadBalancerConfig;
use crate::http::{HttpServer, ServerError};
use crate::lifecycle::{signals, Shutdown};

/// Fatal error during startup or while serving.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Server(#[from] ServerError),
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Start the load balancer and run it until a termination signal.
pub async fn start(config: LoadBalancerConfig) -> Result<(), StartupError> {
    let address = config.listener.bind_address.clone();
    let server = HttpServer::new(config)?;

    tracing::info!(
        endpoints = server.registry().len(),
        algorithm = %server.config().algorithm,
        "Endpoint registry initialized"
    );
    for endpoint in server.registry().endpoints() {
        tracing::debug!(index = endpoint.index(), address = %endpoint.address(), "Endpoint registered");
    }

    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| StartupError::Bind {
            address: address.clone(),
            source,
        })?;

    let shutdown = Shutdown::new();
    let signal_task = tokio::spawn(signals::trigger_on_signal(shutdown.clone()));

    let result = server.run(listener, shutdown).await;
    signal_task.abort();

    tracing::info!("Shutdown complete");
    result.map_err(StartupError::Serve)
}
