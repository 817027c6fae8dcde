use std::sync::Arc;

use ftp_gateway::config::{self, AppState, Config};
use ftp_gateway::{logger, server};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| config::DEFAULT_CONFIG_PATH.to_string());
    let cfg = Config::load_from(&config_path)?;
    logger::init(&cfg.logging)?;

    // Multi-threaded runtime; thread count from `server.workers` if set
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(workers) = cfg.server.workers {
        runtime_builder.worker_threads(workers);
    }
    let runtime = runtime_builder.build()?;

    runtime.block_on(async_main(cfg))
}

async fn async_main(cfg: Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = cfg.get_socket_addr()?;
    let listener = server::create_reusable_listener(addr)?;
    let state = Arc::new(AppState::new(&cfg));

    logger::log_server_start(&addr, &cfg);

    let keepalive = state.pool.spawn_keepalive();
    server::run(listener, Arc::clone(&state), server::shutdown_signal()).await;

    state.pool.shutdown().await;
    if let Some(handle) = keepalive {
        let _ = handle.await;
    }
    Ok(())
}
