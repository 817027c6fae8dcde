// Server module entry point
// Listener setup, connection accept loop and shutdown signals

pub mod connection;
pub mod listener;
pub mod signal;

use std::future::Future;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::config::AppState;
use crate::logger;

pub use listener::create_reusable_listener;
pub use signal::shutdown_signal;

/// Accept connections until `shutdown` resolves
///
/// Connections already being served keep running in their own tasks.
pub async fn run(listener: TcpListener, state: Arc<AppState>, shutdown: impl Future<Output = ()>) {
    let active_connections = Arc::new(AtomicUsize::new(0));
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            () = &mut shutdown => break,
            accept_result = listener.accept() => match accept_result {
                Ok((stream, peer_addr)) => {
                    connection::accept_connection(stream, peer_addr, &state, &active_connections);
                }
                Err(e) => logger::log_error(&format!("Failed to accept connection: {e}")),
            },
        }
    }

    logger::log_server_stop();
}
