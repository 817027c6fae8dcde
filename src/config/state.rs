// Application state module
// Shared, read-only after startup except for the pool's own bookkeeping

use super::types::Config;
use crate::http::MimeResolver;
use crate::pool::ConnectionPool;
use crate::transfer::StreamPump;

/// Application state
pub struct AppState {
    pub config: Config,
    pub pool: ConnectionPool,
    pub mime: MimeResolver,
    pub pump: StreamPump,
}

impl AppState {
    /// Build the pool, MIME cache and pump from a validated config
    ///
    /// No upstream connection is opened here; sessions are created on
    /// first use.
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.clone(),
            pool: ConnectionPool::new(config.upstream.clone(), config.pool.clone()),
            mime: MimeResolver::from_config(&config.cache),
            pump: StreamPump::from_config(&config.stream),
        }
    }
}
