//! Axum router construction for both listeners.

use axum::{middleware::from_fn_with_state, routing::get, Router};
use tower_http::timeout::TimeoutLayer;

use super::{
    handlers,
    middleware::{self, RequestLogger},
};
use crate::auth::{require_bearer, AuthGateway};
use crate::telemetry::{metrics::record_http_metrics, HttpMetrics};

/// Build the primary [`Router`].
///
/// Outermost first: request logging, bearer authentication, request metrics,
/// timeout, then routes. Every request is logged; only authenticated requests
/// reach the metrics layer and the handlers.
pub fn build(gateway: AuthGateway, metrics: HttpMetrics, logger: RequestLogger) -> Router {
    Router::new()
        .route("/", get(handlers::hello))
        .fallback(handlers::not_found)
        .layer(TimeoutLayer::new(middleware::REQUEST_TIMEOUT))
        .layer(from_fn_with_state(metrics, record_http_metrics))
        .layer(from_fn_with_state(gateway, require_bearer))
        .layer(from_fn_with_state(logger, middleware::log_request))
}

/// Build the metrics [`Router`]: `GET /metrics` and nothing else.
pub fn build_metrics(metrics: HttpMetrics) -> Router {
    Router::new()
        .route("/metrics", get(handlers::export_metrics))
        .fallback(handlers::not_found)
        .with_state(metrics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::key::fixtures;
    use crate::telemetry::capture::Captured;
    use axum::http::{header::AUTHORIZATION, HeaderValue, StatusCode};
    use axum_test::TestServer;
    use tracing::Span;

    struct Harness {
        server: TestServer,
        metrics: HttpMetrics,
    }

    fn harness_with_key(key_material: &str) -> Harness {
        let metrics = HttpMetrics::new("test", "test").unwrap();
        let app = build(
            AuthGateway::new(key_material, Span::none()),
            metrics.clone(),
            RequestLogger::new(Span::none()),
        );
        Harness {
            server: TestServer::new(app).unwrap(),
            metrics,
        }
    }

    fn harness() -> Harness {
        harness_with_key(&fixtures::public_key_material())
    }

    fn bearer(token: &str) -> HeaderValue {
        HeaderValue::from_str(&format!("Bearer {token}")).unwrap()
    }

    #[tokio::test]
    async fn valid_token_gets_hello_world() {
        let h = harness();
        let resp = h
            .server
            .get("/")
            .add_header(AUTHORIZATION, bearer(&fixtures::valid_token()))
            .await;
        assert_eq!(resp.status_code(), StatusCode::OK);
        assert_eq!(resp.text(), "Hello world");
        assert_eq!(h.metrics.requests(), 1);
    }

    #[tokio::test]
    async fn missing_header_is_unauthorized() {
        let h = harness();
        let resp = h.server.get("/").await;
        assert_eq!(resp.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(resp.text(), "Unauthorized");
        assert_eq!(h.metrics.requests(), 0, "refused requests skip the metrics layer");
    }

    #[tokio::test]
    async fn expired_token_is_unauthorized() {
        let h = harness();
        let token = fixtures::mint(serde_json::json!({ "sub": "user-1", "exp": 1 }));
        let resp = h.server.get("/").add_header(AUTHORIZATION, bearer(&token)).await;
        assert_eq!(resp.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unusable_key_refuses_everything() {
        let h = harness_with_key("not a pem");
        let resp = h
            .server
            .get("/")
            .add_header(AUTHORIZATION, bearer(&fixtures::valid_token()))
            .await;
        assert_eq!(resp.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(resp.text(), "Unauthorized");
    }

    #[tokio::test]
    async fn unknown_path_is_404_after_auth() {
        let h = harness();
        let resp = h
            .server
            .get("/nope")
            .add_header(AUTHORIZATION, bearer(&fixtures::valid_token()))
            .await;
        assert_eq!(resp.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(resp.text(), "404 page not found");

        let resp = h.server.get("/nope").await;
        assert_eq!(resp.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn every_request_is_logged_once_accepted_or_not() {
        let (captured, _guard) = Captured::install();
        let h = harness();

        h.server
            .get("/")
            .add_header(AUTHORIZATION, bearer(&fixtures::valid_token()))
            .await;
        h.server.get("/").await;

        assert_eq!(captured.with_message("Handled request").len(), 2);
    }

    #[tokio::test]
    async fn request_metrics_use_route_template() {
        let h = harness();
        h.server
            .get("/")
            .add_header(AUTHORIZATION, bearer(&fixtures::valid_token()))
            .await;
        h.server
            .get("/some/unknown/path")
            .add_header(AUTHORIZATION, bearer(&fixtures::valid_token()))
            .await;

        let text = h.metrics.gather_and_encode().unwrap();
        assert!(text.contains("svc_requests_total{code=\"200\",method=\"GET\",path=\"/\"} 1"));
        assert!(text.contains("svc_requests_total{code=\"404\",method=\"GET\",path=\"unmatched\"} 1"));
    }

    #[tokio::test]
    async fn metrics_listener_serves_only_metrics() {
        let metrics = HttpMetrics::new("9.9.9", "cafe").unwrap();
        let server = TestServer::new(build_metrics(metrics)).unwrap();

        let resp = server.get("/metrics").await;
        assert_eq!(resp.status_code(), StatusCode::OK);
        assert!(resp.text().contains("svc_build_info{"));

        let resp = server.get("/").await;
        assert_eq!(resp.status_code(), StatusCode::NOT_FOUND);
    }
}
