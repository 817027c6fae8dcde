//! HTTP gateway streaming files from an FTP server
//!
//! Each request borrows one pooled FTP session, probes the file size,
//! resolves the byte window from the `Range` header and streams the
//! matching bytes into the response body with backpressure.

pub mod config;
pub mod error;
pub mod ftp;
pub mod handler;
pub mod http;
pub mod logger;
pub mod pool;
pub mod server;
pub mod transfer;
