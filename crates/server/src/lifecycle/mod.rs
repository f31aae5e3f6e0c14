//! Listener lifecycle and graceful shutdown.
//!
//! ```text
//! Orchestrator: Idle ─▶ Starting ─▶ Running ─▶ ShuttingDown ─▶ Stopped
//!                          │ bind fails   │ accept loop dies
//!                          ▼              ▼
//!                       fatal error (process exits non-zero, no drain)
//! ```
//!
//! On a termination signal the primary listener is drained first, then the
//! metrics listener, each with [`orchestrator::SHUTDOWN_TIMEOUT`]. A listener
//! that misses its deadline is logged and abandoned; the other one is still
//! drained.

pub mod listener;
pub mod orchestrator;
pub mod signals;
#[cfg(test)]
mod test_client;

pub use listener::{ListenerProcess, ServiceEndpoint};
pub use orchestrator::Orchestrator;
