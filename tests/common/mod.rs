//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Request, State},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use loadbalancer::config::LoadBalancerConfig;
use loadbalancer::{EndpointRegistry, HttpServer, Shutdown};

/// Response header carrying the path and query the backend received.
pub const SEEN_URI: &str = "x-seen-uri";
/// Response header carrying the X-Forwarded-For value the backend received.
pub const SEEN_FORWARDED_FOR: &str = "x-seen-forwarded-for";

#[derive(Clone)]
struct MockState {
    addr: SocketAddr,
    status: Arc<AtomicU16>,
    delay_ms: Arc<AtomicU64>,
}

/// A mock backend that answers every request with its own address.
pub struct MockBackend {
    pub addr: SocketAddr,
    status: Arc<AtomicU16>,
    delay_ms: Arc<AtomicU64>,
    stop: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl MockBackend {
    /// Base URL of this backend.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Body this backend answers with.
    pub fn body(&self) -> String {
        self.addr.to_string()
    }

    /// Status returned to every subsequent request.
    pub fn set_status(&self, status: u16) {
        self.status.store(status, Ordering::SeqCst);
    }

    /// Delay applied before every subsequent response.
    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Stop accepting connections and wait for the server to exit.
    pub async fn stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = tokio::time::timeout(Duration::from_secs(5), task).await;
        }
    }
}

async fn answer(State(state): State<MockState>, request: Request) -> Response {
    let delay = state.delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    let status = StatusCode::from_u16(state.status.load(Ordering::SeqCst))
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let uri = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_owned())
        .unwrap_or_default();
    let forwarded = request
        .headers()
        .get("x-forwarded-for")
        .cloned()
        .unwrap_or(HeaderValue::from_static(""));

    let mut response = (status, state.addr.to_string()).into_response();
    response
        .headers_mut()
        .insert(SEEN_URI, HeaderValue::from_str(&uri).unwrap());
    response.headers_mut().insert(SEEN_FORWARDED_FOR, forwarded);
    response
}

/// Start a mock backend on an ephemeral port.
pub async fn start_mock_backend() -> MockBackend {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let status = Arc::new(AtomicU16::new(200));
    let delay_ms = Arc::new(AtomicU64::new(0));

    let app = Router::new().fallback(answer).with_state(MockState {
        addr,
        status: status.clone(),
        delay_ms: delay_ms.clone(),
    });

    let (stop_tx, stop_rx) = oneshot::channel();
    let task = tokio::spawn(async move {
        let _ = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = stop_rx.await;
            })
            .await;
    });

    MockBackend {
        addr,
        status,
        delay_ms,
        stop: Some(stop_tx),
        task: Some(task),
    }
}

/// Start a raw backend whose body arrives in two halves, `pause` apart.
///
/// Every request gets `200 OK` with body `first` + `second`; headers and
/// `first` go out immediately.
pub async fn start_slow_body_backend(
    first: &'static str,
    second: &'static str,
    pause: Duration,
) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }

                let head = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    first.len() + second.len(),
                    first
                );
                if socket.write_all(head.as_bytes()).await.is_err() {
                    return;
                }
                let _ = socket.flush().await;
                tokio::time::sleep(pause).await;
                let _ = socket.write_all(second.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    format!("http://{addr}")
}

/// Start `n` mock backends.
pub async fn start_mock_backends(n: usize) -> Vec<MockBackend> {
    let mut backends = Vec::with_capacity(n);
    for _ in 0..n {
        backends.push(start_mock_backend().await);
    }
    backends
}

/// An address nothing listens on.
pub async fn closed_address() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

/// Config pointing at `addresses`, with a health interval long enough
/// that only the initial round runs during a test.
pub fn config_for(addresses: Vec<String>) -> LoadBalancerConfig {
    let mut config = LoadBalancerConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.pool.addresses = addresses;
    config.health_check.interval_secs = 3600;
    config.health_check.timeout_secs = 1;
    config
}

/// A running load balancer.
pub struct TestProxy {
    pub url: String,
    pub registry: Arc<EndpointRegistry>,
    pub shutdown: Shutdown,
    pub task: JoinHandle<std::io::Result<()>>,
}

impl TestProxy {
    /// Trigger shutdown and wait for the server to return.
    pub async fn stop(self) -> std::io::Result<()> {
        self.shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(10), self.task)
            .await
            .expect("server did not stop")
            .expect("server task panicked")
    }
}

/// Build and start a load balancer for `config` on an ephemeral port.
pub async fn start_proxy(config: LoadBalancerConfig) -> TestProxy {
    let server = HttpServer::new(config).unwrap();
    let registry = server.registry().clone();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    let shutdown = Shutdown::new();

    let task = tokio::spawn(server.run(listener, shutdown.clone()));

    TestProxy {
        url,
        registry,
        shutdown,
        task,
    }
}

/// HTTP client that never goes through a system proxy.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

/// GET `url` and return the status and body.
pub async fn get(client: &reqwest::Client, url: &str) -> (u16, String) {
    let response = client.get(url).send().await.unwrap();
    let status = response.status().as_u16();
    (status, response.text().await.unwrap())
}
