//! Prometheus registry and HTTP request metrics.
//!
//! Request metrics are recorded by [`record_http_metrics`] on the primary
//! router and exported in the text exposition format by the metrics listener.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::Response,
};
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder,
};

/// Prefix of every metric registered here.
pub const NAMESPACE: &str = "svc";

/// Label used for requests that matched no route.
const UNMATCHED_PATH: &str = "unmatched";

/// Shared metrics state backed by a Prometheus registry.
#[derive(Clone)]
pub struct HttpMetrics {
    inner: Arc<Inner>,
}

struct Inner {
    registry: Registry,
    requests_total: IntCounterVec,
    request_duration_seconds: HistogramVec,
}

impl HttpMetrics {
    /// Create the registry and register every collector.
    ///
    /// `version` and `commit` are published once through `svc_build_info`.
    ///
    /// # Errors
    ///
    /// Returns an error if a collector cannot be created or registered.
    pub fn new(version: &str, commit: &str) -> prometheus::Result<Self> {
        let registry = Registry::new();

        let requests_total = IntCounterVec::new(
            Opts::new(
                "requests_total",
                "How many HTTP requests processed, partitioned by status code, method and HTTP path.",
            )
            .namespace(NAMESPACE),
            &["code", "method", "path"],
        )?;

        let request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "request_duration_seconds",
                "How long it took to process the request, partitioned by status code, method and HTTP path.",
            )
            .namespace(NAMESPACE)
            .buckets(vec![
                0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ]),
            &["code", "method", "path"],
        )?;

        let build_info = IntGaugeVec::new(
            Opts::new("build_info", "Version and commit of the running binary.").namespace(NAMESPACE),
            &["version", "commit"],
        )?;
        build_info.with_label_values(&[version, commit]).set(1);

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(request_duration_seconds.clone()))?;
        registry.register(Box::new(build_info))?;

        #[cfg(target_os = "linux")]
        registry.register(Box::new(
            prometheus::process_collector::ProcessCollector::for_self(),
        ))?;

        Ok(Self {
            inner: Arc::new(Inner {
                registry,
                requests_total,
                request_duration_seconds,
            }),
        })
    }

    /// Record one completed request.
    pub fn record(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let code = status.to_string();
        let labels = [code.as_str(), method, path];
        self.inner.requests_total.with_label_values(&labels).inc();
        self.inner
            .request_duration_seconds
            .with_label_values(&labels)
            .observe(duration_secs);
    }

    /// Total requests recorded so far, summed across labels.
    #[cfg(test)]
    pub fn requests(&self) -> u64 {
        use prometheus::core::Collector;
        self.inner
            .requests_total
            .collect()
            .iter()
            .flat_map(|mf| mf.get_metric())
            .map(|m| m.get_counter().get_value() as u64)
            .sum()
    }

    /// Gather all metrics and encode them in the Prometheus text format.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    pub fn gather_and_encode(&self) -> prometheus::Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.inner.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| {
            prometheus::Error::Msg(format!("metrics encoding produced invalid UTF-8: {e}"))
        })
    }
}

/// Middleware that records request count and latency for every request that
/// reaches it.
pub async fn record_http_metrics(
    State(metrics): State<HttpMetrics>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().to_string();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| UNMATCHED_PATH.to_owned());
    let start = Instant::now();

    let response = next.run(request).await;

    metrics.record(
        &method,
        &path,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );
    response
}
