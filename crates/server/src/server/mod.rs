//! HTTP surface: routers, handlers, and middleware for both listeners.
//!
//! # Responsibilities
//! - Define the primary router with authentication and request logging.
//! - Define the metrics router exposing the Prometheus registry.

pub mod handlers;
pub mod middleware;
pub mod router;
