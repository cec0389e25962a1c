//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe every endpoint
//! - Update endpoint health state based on results
//!
//! A probe is an HTTP GET against the endpoint's base address plus the
//! configured path. Only a `200 OK` counts as healthy; any other status,
//! a transport error or a timeout marks the endpoint unhealthy. Probes
//! never touch selection bookkeeping.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{uri::InvalidUri, Request, StatusCode, Uri};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::config::HealthCheckConfig;
use crate::load_balancer::{endpoint::Endpoint, EndpointRegistry};

/// Why a probe judged an endpoint unhealthy.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("invalid probe uri: {0}")]
    Uri(#[from] InvalidUri),
    #[error("failed to build probe request: {0}")]
    Request(#[from] axum::http::Error),
    #[error("connection error: {0}")]
    Transport(#[from] hyper_util::client::legacy::Error),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("unexpected status {0}")]
    Status(StatusCode),
}

pub struct HealthMonitor {
    registry: Arc<EndpointRegistry>,
    config: HealthCheckConfig,
    client: Client<HttpConnector, Body>,
}

impl HealthMonitor {
    pub fn new(registry: Arc<EndpointRegistry>, config: HealthCheckConfig) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        Self {
            registry,
            config,
            client,
        }
    }

    /// Probe on every interval until `shutdown` fires.
    ///
    /// The first round runs one full interval after the call; callers
    /// wanting an immediate round use [`HealthMonitor::probe_all`] first.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let interval = Duration::from_secs(self.config.interval_secs);
        tracing::info!(
            interval_secs = self.config.interval_secs,
            path = %self.config.path,
            endpoints = self.registry.len(),
            "Health monitor starting"
        );

        let mut ticker = time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.probe_all().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Probe every endpoint once, in order. Returns how many are healthy.
    pub async fn probe_all(&self) -> usize {
        let mut healthy = 0;

        for endpoint in self.registry.endpoints() {
            match self.probe(endpoint).await {
                Ok(()) => {
                    tracing::debug!(address = %endpoint.address(), "Endpoint is healthy");
                    self.registry.set_healthy(endpoint.address(), true);
                    healthy += 1;
                }
                Err(e) => {
                    tracing::warn!(address = %endpoint.address(), error = %e, "Health check failed");
                    self.registry.set_healthy(endpoint.address(), false);
                }
            }
        }

        tracing::debug!(healthy, total = self.registry.len(), "Health check round complete");
        healthy
    }

    async fn probe(&self, endpoint: &Endpoint) -> Result<(), ProbeError> {
        let uri: Uri = endpoint.url_for(&self.config.path).parse()?;
        let request = Request::builder()
            .method("GET")
            .uri(uri)
            .header("user-agent", "loadbalancer-health-check")
            .body(Body::empty())?;

        let timeout = Duration::from_secs(self.config.timeout_secs);
        let response = time::timeout(timeout, self.client.request(request))
            .await
            .map_err(|_| ProbeError::Timeout(timeout))??;

        match response.status() {
            StatusCode::OK => Ok(()),
            status => Err(ProbeError::Status(status)),
        }
    }
}
