//! Logging, trace export, and Prometheus metrics.
//!
//! # Telemetry invariants
//!
//! - **No credentials** (bearer tokens, key material, data-store passwords)
//!   appear in any log field, span attribute, or metric label.
//! - Log level is configurable via `LOG_LEVEL`; `RUST_LOG` overrides it.
//! - Metric path labels use the matched route template, never the raw URI.

#[cfg(test)]
pub(crate) mod capture;
pub mod init;
pub mod metrics;

pub use init::init_telemetry;
pub use metrics::HttpMetrics;
