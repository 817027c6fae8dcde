//! Minimal FTP client used to reach the upstream store
//!
//! Only what the gateway needs: login, binary mode, SIZE, passive
//! `REST`/`RETR`, NOOP probes and QUIT.

mod connection;
mod control;
mod error;
pub mod reply;

pub use connection::{ConnectionState, UpstreamConnection};
pub use error::{FtpError, FtpResult};
pub use reply::Reply;
