//! Shutdown signal handling

use tracing::info;

/// Wait for SIGINT or SIGTERM (ctrl-c on non-Unix platforms).
pub async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigint = match signal(SignalKind::interrupt()) {
            Ok(s) => s,
            Err(err) => {
                info!(error = %err, "SIGINT handler unavailable, waiting forever");
                std::future::pending::<()>().await;
                unreachable!()
            }
        };
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(err) => {
                info!(error = %err, "SIGTERM handler unavailable, waiting forever");
                std::future::pending::<()>().await;
                unreachable!()
            }
        };

        tokio::select! {
            _ = sigint.recv() => info!("received SIGINT"),
            _ = sigterm.recv() => info!("received SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("received ctrl-c");
    }
}
