//! Response handling and transformation.
//!
//! # Responsibilities
//! - Relay the endpoint's response to the client
//! - Keep per-request bookkeeping alive until the relayed body is done
//! - Produce the plain-text failure responses (503, 502)

use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use hyper::body::{Frame, Incoming, SizeHint};

use crate::http::request::strip_hop_by_hop;

/// Body sent when no endpoint is healthy.
pub const NO_HEALTHY_SERVER: &str = "No healthy server available";

/// Body sent when the selected endpoint could not be reached.
pub const UPSTREAM_FAILED: &str = "Upstream request failed";

/// A body that holds `guard` until it is dropped.
///
/// The server drops the body once the last frame is written or the client
/// goes away, so the guard lives exactly as long as the transfer.
#[derive(Debug)]
pub struct GuardedBody<B, G> {
    inner: B,
    _guard: G,
}

impl<B, G> GuardedBody<B, G> {
    pub fn new(inner: B, guard: G) -> Self {
        Self {
            inner,
            _guard: guard,
        }
    }
}

impl<B, G> hyper::body::Body for GuardedBody<B, G>
where
    B: hyper::body::Body + Unpin,
    G: Unpin,
{
    type Data = B::Data;
    type Error = B::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        Pin::new(&mut self.get_mut().inner).poll_frame(cx)
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

/// Relay status, end-to-end headers and the streaming body of `response`.
///
/// `guard` is dropped when the client has received the whole body.
pub fn relay<G>(response: Response<Incoming>, guard: G) -> Response
where
    G: Send + Unpin + 'static,
{
    let (mut parts, body) = response.into_parts();
    strip_hop_by_hop(&mut parts.headers);
    Response::from_parts(parts, Body::new(GuardedBody::new(body, guard)))
}

pub fn service_unavailable() -> Response {
    (StatusCode::SERVICE_UNAVAILABLE, NO_HEALTHY_SERVER).into_response()
}

pub fn bad_gateway() -> Response {
    (StatusCode::BAD_GATEWAY, UPSTREAM_FAILED).into_response()
}
