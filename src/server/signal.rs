// Signal handling module
//
// Supported signals:
// - SIGTERM: Graceful shutdown
// - SIGINT:  Graceful shutdown (Ctrl+C)

use crate::logger;

/// Resolve once the process is asked to stop
///
/// On Unix this is SIGTERM or SIGINT; elsewhere only Ctrl+C. If a handler
/// cannot be registered the failure is logged and the remaining one still
/// works.
#[cfg(unix)]
pub async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => Some(s),
        Err(e) => {
            logger::log_error(&format!("[SIGNAL] Failed to register SIGTERM handler: {e}"));
            None
        }
    };

    let terminate = async {
        match sigterm.as_mut() {
            Some(s) => {
                s.recv().await;
            }
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        () = terminate => logger::log_info("[SIGNAL] SIGTERM received, shutting down"),
        () = ctrl_c() => logger::log_info("[SIGNAL] SIGINT received, shutting down"),
    }
}

/// Windows fallback - only handles Ctrl+C
#[cfg(not(unix))]
pub async fn shutdown_signal() {
    ctrl_c().await;
    logger::log_info("[SIGNAL] Ctrl+C received, shutting down");
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        logger::log_error(&format!("[SIGNAL] Failed to listen for Ctrl+C: {e}"));
        std::future::pending::<()>().await;
    }
}
