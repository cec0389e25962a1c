//! HTTP server setup and request dispatch.
//!
//! # Responsibilities
//! - Build the endpoint registry from configuration
//! - Create the Axum router with a single catch-all proxy handler
//! - Wire up middleware (tracing, request ID, timeout, concurrency limit)
//! - Run the initial health check, then the health monitor in the background
//! - Dispatch each request through the configured selection algorithm
//! - Forward requests to the chosen endpoint and relay the response

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    middleware::{self, Next},
    response::Response,
    Router,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::{resolve_pool, LoadBalancerConfig, ValidationError};
use crate::health::HealthMonitor;
use crate::http::request::{
    propagate_request_id_layer, request_id, set_request_id_layer, upstream_request,
};
use crate::http::response;
use crate::lifecycle::Shutdown;
use crate::load_balancer::{
    Algorithm, ConnectionGuard, EndpointRegistry, NoHealthyEndpoint, RegistryError,
};

/// Error raised while assembling the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid endpoint pool: {}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join(", "))]
    Pool(Vec<ValidationError>),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<EndpointRegistry>,
    pub algorithm: Algorithm,
    pub release_on_completion: bool,
    pub client: Client<HttpConnector, Body>,
}

/// HTTP front end of the load balancer.
pub struct HttpServer {
    router: Router,
    config: LoadBalancerConfig,
    registry: Arc<EndpointRegistry>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: LoadBalancerConfig) -> Result<Self, ServerError> {
        let pool = resolve_pool(&config.pool).map_err(ServerError::Pool)?;
        let registry = Arc::new(EndpointRegistry::initialize(
            pool.addresses,
            &pool.weights,
            &pool.initial_connections,
            config.weighted.reset_every,
        )?);

        // Fresh connection per forwarded request; no pooling guarantee.
        let client = Client::builder(TokioExecutor::new())
            .pool_max_idle_per_host(0)
            .build(HttpConnector::new());

        let state = AppState {
            registry: registry.clone(),
            algorithm: config.algorithm,
            release_on_completion: config.least_connection.release_on_completion,
            client,
        };

        let router = Self::build_router(&config, state);
        Ok(Self {
            router,
            config,
            registry,
        })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &LoadBalancerConfig, state: AppState) -> Router {
        let permits = Arc::new(Semaphore::new(config.listener.max_concurrent_requests));

        Router::new().fallback(proxy_handler).with_state(state).layer(
            ServiceBuilder::new()
                .layer(set_request_id_layer())
                .layer(TraceLayer::new_for_http())
                .layer(propagate_request_id_layer())
                .layer(middleware::from_fn_with_state(permits, limit_concurrency))
                .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs))),
        )
    }

    /// Run the server, accepting connections on the given listener.
    ///
    /// One health check round completes before the first connection is
    /// accepted. Returns once `shutdown` fires and in-flight requests and
    /// the health monitor have finished.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        let mut serve_shutdown = shutdown.subscribe();
        let monitor_shutdown = shutdown.subscribe();

        let monitor = HealthMonitor::new(self.registry.clone(), self.config.health_check.clone());
        let healthy = monitor.probe_all().await;
        tracing::info!(
            healthy,
            total = self.registry.len(),
            "Initial health check complete"
        );
        let monitor_task = tokio::spawn(monitor.run(monitor_shutdown));

        tracing::info!(
            address = %addr,
            algorithm = %self.config.algorithm,
            "HTTP server starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = serve_shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await;

        // The server may have stopped on an I/O error; stop the monitor either way.
        shutdown.trigger();
        if let Err(e) = monitor_task.await {
            tracing::error!(error = %e, "Health monitor task failed");
        }

        tracing::info!("HTTP server stopped");
        result
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &LoadBalancerConfig {
        &self.config
    }

    /// The registry shared with the handlers and the health monitor.
    pub fn registry(&self) -> &Arc<EndpointRegistry> {
        &self.registry
    }
}

/// Hold one of the shared permits for the duration of the request.
async fn limit_concurrency(State(permits): State<Arc<Semaphore>>, request: Request, next: Next) -> Response {
    let Ok(_permit) = permits.acquire_owned().await else {
        return response::service_unavailable();
    };
    next.run(request).await
}

/// Bookkeeping for one forwarded request, undone on drop.
///
/// Travels with the relayed body so it is released only once the client
/// has the full response, or right away when forwarding fails.
struct InFlight {
    guard: ConnectionGuard,
    release_to: Option<Arc<EndpointRegistry>>,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if let Some(registry) = &self.release_to {
            registry.release(&self.guard);
        }
    }
}

/// Main proxy handler.
/// Selects an endpoint and forwards the request to it.
async fn proxy_handler(
    State(state): State<AppState>,
    ConnectInfo(client): ConnectInfo<SocketAddr>,
    request: Request,
) -> Response {
    let request_id = request_id(&request).to_owned();
    let client_ip = client.ip();

    tracing::debug!(
        request_id = %request_id,
        method = %request.method(),
        path = %request.uri().path(),
        client = %client,
        "Dispatching request"
    );

    let endpoint = match state
        .registry
        .select(state.algorithm.balancer(), Some(&client_ip.to_string()))
    {
        Ok(endpoint) => endpoint,
        Err(NoHealthyEndpoint) => {
            tracing::warn!(request_id = %request_id, algorithm = %state.algorithm, "No healthy endpoint");
            return response::service_unavailable();
        }
    };

    let releases = state.release_on_completion && state.algorithm == Algorithm::LeastConnection;
    let in_flight = InFlight {
        guard: endpoint.track(),
        release_to: releases.then(|| state.registry.clone()),
    };

    let upstream = match upstream_request(request, &endpoint, client_ip) {
        Ok(upstream) => upstream,
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Failed to build upstream request");
            return response::bad_gateway();
        }
    };

    match state.client.request(upstream).await {
        Ok(upstream_response) => {
            tracing::debug!(
                request_id = %request_id,
                endpoint = %endpoint.address(),
                status = %upstream_response.status(),
                in_flight = endpoint.active_connections(),
                "Upstream responded"
            );
            response::relay(upstream_response, in_flight)
        }
        Err(e) => {
            tracing::error!(
                request_id = %request_id,
                endpoint = %endpoint.address(),
                error = %e,
                "Upstream error"
            );
            response::bad_gateway()
        }
    }
}
