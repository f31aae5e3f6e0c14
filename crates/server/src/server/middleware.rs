//! Axum middleware layers applied to the primary router.
//!
//! Includes per-request logging and the timeout budget.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use tracing::{info, Span};

/// Default per-request timeout applied to application routes.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Remote address recorded when the connection info is unavailable.
const UNKNOWN_REMOTE: &str = "unknown";

/// Writes exactly one record per request, after the wrapped handler returns.
#[derive(Clone)]
pub struct RequestLogger {
    span: Span,
}

impl RequestLogger {
    /// Records are emitted inside `span`.
    pub fn new(span: Span) -> Self {
        Self { span }
    }
}

/// Middleware backing [`RequestLogger`]. Never alters the request or response.
pub async fn log_request(
    State(logger): State<RequestLogger>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let remote = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| UNKNOWN_REMOTE.to_owned());
    let start = Instant::now();

    let response = next.run(request).await;

    let duration_ms = start.elapsed().as_secs_f64() * 1000.0;
    logger.span.in_scope(|| {
        info!(
            method = %method,
            uri = %uri,
            remote = %remote,
            duration_ms,
            "Handled request"
        )
    });
    response
}
