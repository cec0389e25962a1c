//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, dispatch)
//!     → [load balancer picks endpoint]
//!     → request.rs (request ID, rewrite URI, strip hop-by-hop headers)
//!     → Forward to endpoint
//!     → response.rs (relay upstream response, or 502/503)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{ForwardError, X_FORWARDED_FOR, X_REQUEST_ID};
pub use server::{HttpServer, ServerError};
