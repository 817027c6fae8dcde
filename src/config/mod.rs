// Configuration module entry point
// Loads layered configuration and holds the shared runtime state

mod state;
mod types;

use std::net::SocketAddr;

pub use state::AppState;
pub use types::{
    CacheConfig, Config, EvictionPolicy, HttpConfig, LoggingConfig, PerformanceConfig, PoolConfig,
    ServerConfig, StreamConfig, UpstreamConfig,
};

/// Default config file name (without extension)
pub const DEFAULT_CONFIG_PATH: &str = "config";

impl Config {
    /// Load configuration from the given file path (extension optional)
    ///
    /// Precedence, lowest first: built-in defaults, the config file,
    /// `GATEWAY_<SECTION>__<KEY>` variables, then `FTP_HOST`, `FTP_PORT`,
    /// `FTP_USER` and `FTP_PASS`.
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix("GATEWAY")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("upstream.host", std::env::var("FTP_HOST").ok())?
            .set_override_option("upstream.port", std::env::var("FTP_PORT").ok())?
            .set_override_option("upstream.username", std::env::var("FTP_USER").ok())?
            .set_override_option("upstream.password", std::env::var("FTP_PASS").ok())?;

        let cfg: Self = builder.build()?.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject settings the transfer engine cannot work with
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        let fail = |msg: &str| -> Result<(), config::ConfigError> {
            Err(config::ConfigError::Message(msg.to_string()))
        };

        if self.upstream.host.is_empty() {
            return fail("upstream.host must not be empty");
        }
        if self.stream.chunk_size == 0 {
            return fail("stream.chunk_size must be greater than 0");
        }
        if self.stream.read_timeout == 0 {
            return fail("stream.read_timeout must be greater than 0");
        }
        if self.stream.stall_timeout < self.stream.read_timeout {
            return fail("stream.stall_timeout must be at least stream.read_timeout");
        }
        if self.pool.max_size == 0 {
            return fail("pool.max_size must be at least 1");
        }
        if self.pool.max_idle > self.pool.max_size {
            return fail("pool.max_idle must not exceed pool.max_size");
        }
        if self.cache.mime_capacity == 0 {
            return fail("cache.mime_capacity must be at least 1");
        }
        Ok(())
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }
}
