// Configuration types module
// Defines all configuration-related data structures

use serde::Deserialize;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub pool: PoolConfig,
    pub stream: StreamConfig,
    pub cache: CacheConfig,
    pub http: HttpConfig,
    pub logging: LoggingConfig,
    pub performance: PerformanceConfig,
}

/// Listening socket configuration
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            workers: None,
        }
    }
}

/// Upstream FTP server. Credentials are opaque to the rest of the crate.
#[derive(Deserialize, Clone)]
#[serde(default)]
pub struct UpstreamConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// TCP connect timeout (control and data channel), seconds
    pub connect_timeout: u64,
    /// Per-reply timeout on the control channel, seconds
    pub command_timeout: u64,
    /// Directory prepended to every request path, empty = login directory
    pub root: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            host: "storage.bunnycdn.com".to_string(),
            port: 21,
            username: "anonymous".to_string(),
            password: String::new(),
            connect_timeout: 10,
            command_timeout: 15,
            root: String::new(),
        }
    }
}

// Manual impl keeps the password out of logs
impl std::fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("connect_timeout", &self.connect_timeout)
            .field("command_timeout", &self.command_timeout)
            .field("root", &self.root)
            .finish()
    }
}

/// Connection pool limits and liveness settings
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum concurrently checked-out sessions
    pub max_size: usize,
    /// Maximum sessions parked while idle
    pub max_idle: usize,
    /// How long `acquire` waits for a free slot, seconds
    pub acquire_timeout: u64,
    /// Period of the background NOOP sweep, seconds (0 disables it)
    pub keepalive_interval: u64,
    /// Idle sessions older than this are closed by the sweep, seconds
    pub max_idle_time: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: 16,
            max_idle: 4,
            acquire_timeout: 30,
            keepalive_interval: 30,
            max_idle_time: 300,
        }
    }
}

/// Data transfer tuning
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StreamConfig {
    /// Bytes pulled from the data channel per read
    pub chunk_size: usize,
    /// Single read timeout, seconds. A timed out read is retried.
    pub read_timeout: u64,
    /// Accumulated stall after which the transfer is abandoned, seconds
    pub stall_timeout: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            chunk_size: 64 * 1024,
            read_timeout: 15,
            stall_timeout: 60,
        }
    }
}

/// Eviction order for bounded caches
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum EvictionPolicy {
    /// Evict the entry that was read least recently
    #[default]
    Lru,
    /// Evict the entry that was inserted first, reads do not refresh it
    Fifo,
}

/// Metadata cache configuration
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CacheConfig {
    pub mime_capacity: usize,
    pub mime_eviction: EvictionPolicy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            mime_capacity: 256,
            mime_eviction: EvictionPolicy::Lru,
        }
    }
}

/// HTTP response configuration
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HttpConfig {
    pub server_name: String,
    pub enable_cors: bool,
    /// `max-age` sent with audio, video and image responses, seconds
    pub media_max_age: u32,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            server_name: "ftp-gateway".to_string(),
            enable_cors: true,
            media_max_age: 86_400,
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub access_log: bool,
    /// Access log format (combined, common, json, or custom pattern)
    pub access_log_format: String,
    /// Access log file path (optional, stdout if not set)
    pub access_log_file: Option<String>,
    /// Error log file path (optional, stderr if not set)
    pub error_log_file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            access_log: true,
            access_log_format: "combined".to_string(),
            access_log_file: None,
            error_log_file: None,
        }
    }
}

/// Performance configuration
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PerformanceConfig {
    pub max_connections: Option<u64>,
    /// Time allowed for a client to send request headers, seconds
    pub header_read_timeout: u64,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            max_connections: None,
            header_read_timeout: 30,
        }
    }
}
