//! OS signal handling.
//!
//! # Responsibilities
//! - Wait for SIGTERM or SIGINT (Ctrl+C elsewhere)
//! - Report which one arrived
//!
//! SIGKILL cannot be observed by the process; it terminates without the
//! shutdown sequence.

/// Resolves when a termination signal arrives.
#[cfg(unix)]
pub async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = match signal(SignalKind::terminate()) {
        Ok(term) => term,
        Err(e) => {
            tracing::error!(error = %e, "Failed to install SIGTERM handler, only SIGINT will stop the server");
            return ctrl_c().await;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => tracing::info!("Received SIGINT"),
        _ = term.recv() => tracing::info!("Received SIGTERM"),
    }
}

/// Resolves when a termination signal arrives.
#[cfg(not(unix))]
pub async fn shutdown_signal() {
    ctrl_c().await
}

async fn ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received Ctrl+C"),
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C, running until killed");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn does_not_resolve_without_signal() {
        let result = timeout(Duration::from_millis(100), shutdown_signal()).await;
        assert!(
            result.is_err(),
            "shutdown_signal should not complete without a signal"
        );
    }
}
