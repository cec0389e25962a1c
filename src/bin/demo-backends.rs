//! Demo backend servers for trying out the load balancer locally.
//!
//! Starts `count` HTTP servers on consecutive ports. Each one answers every
//! request with an HTML page naming its port, tinted a different shade of
//! blue so responses from different backends are easy to tell apart.

use std::net::SocketAddr;

use axum::{extract::State, response::Html, Router};
use clap::Parser;
use tokio::net::TcpListener;
use tokio::task::JoinSet;

use loadbalancer::lifecycle::signals;
use loadbalancer::Shutdown;

#[derive(Parser)]
#[command(name = "demo-backends")]
#[command(about = "Run demo backends for the load balancer", long_about = None)]
struct Cli {
    /// Number of backends to start (1 to 9).
    #[arg(short, long, default_value_t = 3, value_parser = clap::value_parser!(u16).range(1..10))]
    count: u16,

    /// Host to bind.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port of the first backend.
    #[arg(short = 'p', long, default_value_t = 8080)]
    base_port: u16,
}

/// Blue channel for the backend at `index`.
fn blue_shade(index: u16) -> u8 {
    (100 + u32::from(index) * 20).min(255) as u8
}

fn page(port: u16, blue: u8) -> String {
    format!(
        "<!DOCTYPE html>\n\
         <html>\n\
         <head><title>Backend {port}</title></head>\n\
         <body style=\"background-color: rgb(0, 0, {blue}); color: white; font-family: sans-serif;\">\n\
         <h1>Hello from backend on port {port}</h1>\n\
         </body>\n\
         </html>\n"
    )
}

async fn index(State(body): State<String>) -> Html<String> {
    Html(body)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let shutdown = Shutdown::new();
    let mut servers = JoinSet::new();

    for i in 0..cli.count {
        let port = cli
            .base_port
            .checked_add(i)
            .ok_or("base port + count exceeds 65535")?;
        let listener = TcpListener::bind((cli.host.as_str(), port)).await?;
        let addr: SocketAddr = listener.local_addr()?;

        let app = Router::new()
            .fallback(index)
            .with_state(page(port, blue_shade(i)));
        let mut stop = shutdown.subscribe();

        tracing::info!(address = %addr, "Demo backend listening");
        servers.spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = stop.recv().await;
                })
                .await
        });
    }

    signals::wait_for_signal().await;
    shutdown.trigger();

    while let Some(result) = servers.join_next().await {
        if let Err(e) = result? {
            tracing::error!(error = %e, "Demo backend failed");
        }
    }
    tracing::info!("Demo backends stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shades_grow_and_cap() {
        assert_eq!(blue_shade(0), 100);
        assert_eq!(blue_shade(1), 120);
        assert_eq!(blue_shade(5), 200);
        assert_eq!(blue_shade(9), 255);
    }

    #[test]
    fn count_is_limited_to_nine() {
        assert_eq!(Cli::try_parse_from(["demo-backends", "--count", "9"]).unwrap().count, 9);
        assert!(Cli::try_parse_from(["demo-backends", "--count", "10"]).is_err());
        assert!(Cli::try_parse_from(["demo-backends", "--count", "0"]).is_err());
        assert_eq!(Cli::try_parse_from(["demo-backends"]).unwrap().count, 3);
    }

    #[test]
    fn page_names_port_and_color() {
        let html = page(8081, 120);
        assert!(html.contains("port 8081"));
        assert!(html.contains("rgb(0, 0, 120)"));
    }
}
