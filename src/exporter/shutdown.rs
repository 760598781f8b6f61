use tokio::signal;
use tracing::warn;

/// Resolves on SIGINT or SIGTERM (Ctrl+C elsewhere).
pub async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use signal::unix::{SignalKind, signal};

        match (
            signal(SignalKind::interrupt()),
            signal(SignalKind::terminate()),
        ) {
            (Ok(mut sigint), Ok(mut sigterm)) => {
                tokio::select! {
                    _ = sigint.recv()  => {},
                    _ = sigterm.recv() => {},
                }
            }
            (Err(e), _) | (_, Err(e)) => {
                warn!(error = %e, "failed to install signal handlers, falling back to Ctrl+C");
                let _ = signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = signal::ctrl_c().await;
    }
}
