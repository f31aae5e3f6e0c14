//! Starts the listeners, waits for a termination signal, and drains them.

use std::future::Future;
use std::io;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, error, info, Instrument, Span};

use super::listener::{ListenerError, ListenerProcess, ServeExit};

/// Drain budget given to each listener on shutdown.
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Process-level lifecycle. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum OrchestratorState {
    Idle,
    Starting,
    Running,
    ShuttingDown,
    Stopped,
}

/// Fatal lifecycle errors; each ends the process with a non-zero status.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("{listener} listener failed to start: {source}")]
    Startup {
        listener: &'static str,
        #[source]
        source: ListenerError,
    },

    #[error("{listener} listener stopped serving: {source}")]
    Serve {
        listener: &'static str,
        #[source]
        source: ListenerError,
    },

    #[error("failed to wait for a termination signal: {0}")]
    Signal(#[source] io::Error),

    #[error("orchestrator cannot run from state {0:?}")]
    AlreadyRun(OrchestratorState),
}

/// Owns the primary listener and, when enabled, the metrics listener.
pub struct Orchestrator {
    primary: ListenerProcess,
    metrics: Option<ListenerProcess>,
    shutdown_timeout: Duration,
    span: Span,
    state: OrchestratorState,
}

impl Orchestrator {
    /// `metrics` is `None` when the metrics listener is disabled; it is then
    /// neither started nor shut down.
    pub fn new(primary: ListenerProcess, metrics: Option<ListenerProcess>, span: Span) -> Self {
        Self {
            primary,
            metrics,
            shutdown_timeout: SHUTDOWN_TIMEOUT,
            span,
            state: OrchestratorState::Idle,
        }
    }

    #[cfg(test)]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    pub fn state(&self) -> OrchestratorState {
        self.state
    }

    fn transition(&mut self, next: OrchestratorState) {
        debug!(from = ?self.state, to = ?next, "lifecycle transition");
        self.state = next;
    }

    /// Start every listener, block until `signal` resolves, then shut down.
    ///
    /// # Errors
    ///
    /// A listener that fails to bind, or whose accept loop dies while
    /// running, aborts the run immediately without draining the other
    /// listener. Drain failures at shutdown are logged but not returned.
    pub async fn run<F>(&mut self, signal: F) -> Result<(), LifecycleError>
    where
        F: Future<Output = io::Result<()>>,
    {
        let span = self.span.clone();
        self.run_inner(signal).instrument(span).await
    }

    async fn run_inner<F>(&mut self, signal: F) -> Result<(), LifecycleError>
    where
        F: Future<Output = io::Result<()>>,
    {
        if self.state != OrchestratorState::Idle {
            return Err(LifecycleError::AlreadyRun(self.state));
        }
        self.transition(OrchestratorState::Starting);

        let mut primary_exit = start(&self.primary).await?;
        let local_addr = self.primary.local_addr().await;
        info!(
            address = %self.primary.address(),
            local_addr = ?local_addr,
            "Server is ready to handle requests"
        );

        let mut metrics_exit = match &self.metrics {
            Some(metrics) => {
                let exit = start(metrics).await?;
                let local_addr = metrics.local_addr().await;
                info!(
                    address = %metrics.address(),
                    local_addr = ?local_addr,
                    "Metrics server is ready to handle requests"
                );
                Some(exit)
            }
            None => None,
        };

        self.transition(OrchestratorState::Running);

        let metrics_failed = async {
            match metrics_exit.as_mut() {
                Some(exit) => exit.await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            received = signal => {
                received.map_err(LifecycleError::Signal)?;
                info!("Termination signal received, shutting down");
            }
            exited = &mut primary_exit => {
                return Err(serve_failure(&self.primary, exited));
            }
            exited = metrics_failed => {
                let listener = self.metrics.as_ref().unwrap_or(&self.primary);
                return Err(serve_failure(listener, exited));
            }
        }

        self.shutdown().await;
        Ok(())
    }

    /// Drain the primary listener, then the metrics listener.
    ///
    /// Each gets the full shutdown timeout. Outcomes are logged; calling this
    /// again after it completed does nothing.
    pub async fn shutdown(&mut self) {
        if self.state >= OrchestratorState::ShuttingDown {
            return;
        }
        self.transition(OrchestratorState::ShuttingDown);

        let deadline = self.shutdown_timeout;
        let span = self.span.clone();
        async {
            match self.primary.shutdown(deadline).await {
                Ok(()) => info!("Server exited properly"),
                Err(e) => error!(error = %e, "Server shutdown failed"),
            }
            if let Some(metrics) = &self.metrics {
                match metrics.shutdown(deadline).await {
                    Ok(()) => info!("Metrics server exited properly"),
                    Err(e) => error!(error = %e, "Metrics server shutdown failed"),
                }
            }
        }
        .instrument(span)
        .await;

        self.transition(OrchestratorState::Stopped);
    }
}

async fn start(listener: &ListenerProcess) -> Result<ServeExit, LifecycleError> {
    listener.start().await.map_err(|source| {
        error!(listener = listener.name(), error = %source, "listener failed to start");
        LifecycleError::Startup {
            listener: listener.name(),
            source,
        }
    })
}

fn serve_failure(listener: &ListenerProcess, exited: Result<(), ListenerError>) -> LifecycleError {
    let source = exited.err().unwrap_or(ListenerError::UnexpectedExit);
    error!(listener = listener.name(), error = %source, "listener stopped serving");
    LifecycleError::Serve {
        listener: listener.name(),
        source,
    }
}
