//! A single bound HTTP listener and its accept loop.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::Router;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, watch, Mutex};
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Instrument, Span};

/// Where a listener binds. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEndpoint {
    /// Host or IP address to bind.
    pub bind_address: String,
    /// TCP port; `0` asks the OS for a free one.
    pub port: u16,
    /// Whether the listener should run at all. Only meaningful for optional
    /// listeners such as metrics.
    pub enabled: bool,
}

impl ServiceEndpoint {
    pub fn new(bind_address: impl Into<String>, port: u16, enabled: bool) -> Self {
        Self {
            bind_address: bind_address.into(),
            port,
            enabled,
        }
    }

    /// `host:port` string as configured.
    pub fn address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

/// Lifecycle of a [`ListenerProcess`]. States only ever move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LifecycleState {
    NotStarted,
    Running,
    ShuttingDown,
    Stopped,
}

/// Errors produced by a listener.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// The socket could not be bound.
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },

    /// `start` was called on a listener that is not in `NotStarted`.
    #[error("listener has already been started")]
    AlreadyStarted,

    /// The accept loop failed with an I/O error.
    #[error("accept loop failed: {0}")]
    Serve(#[source] io::Error),

    /// The accept loop returned although no shutdown was requested.
    #[error("accept loop exited without a shutdown request")]
    UnexpectedExit,

    /// The accept loop task panicked or was cancelled.
    #[error("accept loop task did not complete: {0}")]
    Task(#[from] JoinError),

    /// In-flight connections did not drain before the deadline.
    #[error("connections still open after {0:?}")]
    ShutdownTimeout(Duration),
}

/// Resolves when the accept loop of a started listener ends.
///
/// Yields `Ok(())` ("closed") when the loop ended because shutdown was
/// requested, and an error for every other reason.
#[must_use = "the exit handle reports accept loop failures"]
pub struct ServeExit {
    rx: oneshot::Receiver<Result<(), ListenerError>>,
}

impl Future for ServeExit {
    type Output = Result<(), ListenerError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|res| res.unwrap_or(Err(ListenerError::UnexpectedExit)))
    }
}

/// Owns one network listener: binds it, runs its accept loop as a separate
/// task, and drains it on shutdown.
///
/// Cheap to clone; clones control the same listener.
#[derive(Clone)]
pub struct ListenerProcess {
    inner: Arc<Inner>,
}

struct Inner {
    name: &'static str,
    endpoint: ServiceEndpoint,
    router: Router,
    span: Span,
    cancel: CancellationToken,
    state: watch::Sender<LifecycleState>,
    running: Mutex<Running>,
}

#[derive(Default)]
struct Running {
    task: Option<JoinHandle<()>>,
    local_addr: Option<SocketAddr>,
}

impl ListenerProcess {
    /// Create a listener that will serve `router` on `endpoint`.
    ///
    /// `name` identifies the listener in errors; `span` is the logging
    /// context for everything the listener and its connections emit.
    pub fn new(name: &'static str, endpoint: ServiceEndpoint, router: Router, span: Span) -> Self {
        let (state, _) = watch::channel(LifecycleState::NotStarted);
        Self {
            inner: Arc::new(Inner {
                name,
                endpoint,
                router,
                span,
                cancel: CancellationToken::new(),
                state,
                running: Mutex::new(Running::default()),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.inner.name
    }

    /// Configured `host:port`.
    pub fn address(&self) -> String {
        self.inner.endpoint.address()
    }

    /// Socket actually bound, once started.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.inner.running.lock().await.local_addr
    }

    pub fn state(&self) -> LifecycleState {
        *self.inner.state.borrow()
    }

    fn advance(&self, next: LifecycleState) {
        self.inner.state.send_if_modified(|current| {
            if next > *current {
                *current = next;
                true
            } else {
                false
            }
        });
    }

    /// Bind the endpoint and spawn the accept loop.
    ///
    /// Returns once the socket is bound; serving continues on its own task
    /// until [`shutdown`](Self::shutdown) is called or the loop fails.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError::Bind`] if the socket cannot be bound and
    /// [`ListenerError::AlreadyStarted`] if the listener has left `NotStarted`.
    pub async fn start(&self) -> Result<ServeExit, ListenerError> {
        let mut running = self.inner.running.lock().await;
        if self.state() != LifecycleState::NotStarted {
            return Err(ListenerError::AlreadyStarted);
        }

        let address = self.address();
        let bound = TcpListener::bind(&address)
            .await
            .and_then(|l| l.local_addr().map(|a| (l, a)));
        let (listener, local_addr) = match bound {
            Ok(pair) => pair,
            Err(source) => return Err(ListenerError::Bind { address, source }),
        };

        let (tx, rx) = oneshot::channel();
        let cancel = self.inner.cancel.clone();
        let app = self
            .inner
            .router
            .clone()
            .into_make_service_with_connect_info::<SocketAddr>();

        let task = tokio::spawn(
            async move {
                let result = axum::serve(listener, app)
                    .with_graceful_shutdown(cancel.clone().cancelled_owned())
                    .await;
                let outcome = match result {
                    Ok(()) if cancel.is_cancelled() => Ok(()),
                    Ok(()) => Err(ListenerError::UnexpectedExit),
                    Err(e) => {
                        error!(error = %e, "accept loop failed");
                        Err(ListenerError::Serve(e))
                    }
                };
                let _ = tx.send(outcome);
            }
            .instrument(self.inner.span.clone()),
        );

        running.task = Some(task);
        running.local_addr = Some(local_addr);
        self.advance(LifecycleState::Running);
        self.inner
            .span
            .in_scope(|| info!(address = %address, local_addr = %local_addr, "listener bound"));

        Ok(ServeExit { rx })
    }

    /// Stop accepting connections and wait up to `deadline` for in-flight
    /// requests to finish.
    ///
    /// Connections still open at the deadline are left to finish or die with
    /// the process. A listener that is not running (never started, or already
    /// stopped) is left as is and `Ok(())` is returned. A call made while
    /// another caller is draining waits for that drain and returns `Ok(())`.
    /// The listener's lock is not held while draining.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError::ShutdownTimeout`] if draining exceeded
    /// `deadline`, or [`ListenerError::Task`] if the accept loop panicked.
    pub async fn shutdown(&self, deadline: Duration) -> Result<(), ListenerError> {
        let task = {
            let mut running = self.inner.running.lock().await;
            match self.state() {
                LifecycleState::Running => {}
                LifecycleState::ShuttingDown => {
                    drop(running);
                    // Another caller owns the drain; wait for it to finish.
                    self.reached(LifecycleState::Stopped).await;
                    return Ok(());
                }
                LifecycleState::NotStarted | LifecycleState::Stopped => return Ok(()),
            }
            self.advance(LifecycleState::ShuttingDown);
            self.inner.cancel.cancel();
            running.task.take()
        };

        let result = match task {
            Some(mut task) => match tokio::time::timeout(deadline, &mut task).await {
                Ok(joined) => joined.map_err(ListenerError::from),
                Err(_) => {
                    task.abort();
                    Err(ListenerError::ShutdownTimeout(deadline))
                }
            },
            None => Ok(()),
        };

        self.advance(LifecycleState::Stopped);
        result
    }

    /// Wait until the listener reaches `state` (or a later one).
    pub async fn reached(&self, state: LifecycleState) {
        let mut rx = self.inner.state.subscribe();
        let _ = rx.wait_for(|s| *s >= state).await;
    }
}
