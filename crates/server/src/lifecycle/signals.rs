//! OS termination signals.

use std::io;

/// Resolve on the first SIGINT or SIGTERM (Ctrl-C elsewhere).
///
/// Handlers are installed on first poll. Later signals are ignored by the
/// caller once shutdown is underway.
///
/// # Errors
///
/// Returns an error if a signal handler cannot be installed.
pub async fn terminate_signal() -> io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut interrupt = signal(SignalKind::interrupt())?;
        let mut terminate = signal(SignalKind::terminate())?;
        tokio::select! {
            _ = interrupt.recv() => {}
            _ = terminate.recv() => {}
        }
        Ok(())
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await
    }
}
