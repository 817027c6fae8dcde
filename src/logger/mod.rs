//! Logger module
//!
//! Plain-text logging for the gateway:
//! - Server lifecycle and connection events
//! - Access logging in several formats
//! - Error and warning logging with timestamps
//! - Optional file targets

mod format;
pub mod writer;

pub use format::{AccessLogEntry, TransferOutcome};

use crate::config::{Config, LoggingConfig};
use chrono::Local;
use std::net::SocketAddr;

/// Initialize the logger from the logging section
///
/// Should be called once at application startup.
pub fn init(config: &LoggingConfig) -> std::io::Result<()> {
    writer::init(
        config.access_log_file.as_deref(),
        config.error_log_file.as_deref(),
    )
}

/// Write to info/access log
fn write_info(message: &str) {
    match writer::get() {
        Some(w) => w.write_info(message),
        None => println!("{message}"),
    }
}

/// Write to error log
fn write_error(message: &str) {
    match writer::get() {
        Some(w) => w.write_error(message),
        None => eprintln!("{message}"),
    }
}

/// Write to access log specifically
fn write_access(message: &str) {
    match writer::get() {
        Some(w) => w.write_access(message),
        None => println!("{message}"),
    }
}

fn timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S%.3f").to_string()
}

pub fn log_server_start(addr: &SocketAddr, config: &Config) {
    write_info("======================================");
    write_info("FTP gateway started");
    write_info(&format!("Listening on: http://{addr}"));
    write_info(&format!(
        "Upstream: {}:{} as {}",
        config.upstream.host, config.upstream.port, config.upstream.username
    ));
    write_info(&format!(
        "Pool: max {} sessions, {} idle",
        config.pool.max_size, config.pool.max_idle
    ));
    if let Some(workers) = config.server.workers {
        write_info(&format!("Worker threads: {workers}"));
    }
    if let Some(ref path) = config.logging.access_log_file {
        write_info(&format!("Access log: {path}"));
    }
    if let Some(ref path) = config.logging.error_log_file {
        write_info(&format!("Error log: {path}"));
    }
    write_info("======================================\n");
}

pub fn log_server_stop() {
    write_info(&format!("{} [Server] Shutting down", timestamp()));
}

pub fn log_connection_accepted(peer_addr: &SocketAddr) {
    write_info(&format!("[Connection] Accepted from: {peer_addr}"));
}

pub fn log_connection_error(err: &impl std::fmt::Debug) {
    write_error(&format!(
        "{} [ERROR] Failed to serve connection: {err:?}",
        timestamp()
    ));
}

pub fn log_info(message: &str) {
    write_info(&format!("{} [INFO] {message}", timestamp()));
}

pub fn log_error(message: &str) {
    write_error(&format!("{} [ERROR] {message}", timestamp()));
}

pub fn log_warning(message: &str) {
    write_error(&format!("{} [WARN] {message}", timestamp()));
}

/// Log formatted access log entry
pub fn log_access(entry: &AccessLogEntry, format: &str) {
    write_access(&entry.format(format));
}
