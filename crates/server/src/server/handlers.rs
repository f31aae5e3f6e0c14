//! Axum request handlers for both listeners.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::{debug, error};

use crate::auth::AuthContext;
use crate::telemetry::HttpMetrics;

/// `GET /` on the primary listener. Only reachable with a valid token.
pub async fn hello(caller: AuthContext) -> &'static str {
    debug!(
        subject = caller.subject().unwrap_or("-"),
        issuer = caller.claims().iss.as_deref().unwrap_or("-"),
        "greeting caller"
    );
    "Hello world"
}

/// Catch-all 404 handler.
pub async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "404 page not found")
}

/// `GET /metrics` on the metrics listener.
pub async fn export_metrics(State(metrics): State<HttpMetrics>) -> Response {
    match metrics.gather_and_encode() {
        Ok(body) => ([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body).into_response(),
        Err(e) => {
            error!(error = %e, "failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
