//! Upstream control session
//!
//! Lifecycle: TCP connect → banner → USER/PASS → TYPE I. After that the
//! session answers NOOP probes, SIZE queries and opens passive data channels
//! for `REST` + `RETR`.

use super::control::ControlChannel;
use super::error::{FtpError, FtpResult};
use super::reply::{self, Reply};
use crate::config::UpstreamConfig;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Lifecycle state of an upstream session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Owned by the pool, available for reuse
    Idle,
    /// Checked out by exactly one request
    Active,
    /// Closed or about to be closed; never handed out again
    Dead,
}

pub struct UpstreamConnection {
    id: u64,
    control: ControlChannel,
    state: ConnectionState,
    last_probe: Instant,
    last_used: Instant,
    connect_timeout: Duration,
}

impl UpstreamConnection {
    /// Open and authenticate a new session
    pub async fn connect(id: u64, config: &UpstreamConfig) -> FtpResult<Self> {
        let connect_timeout = Duration::from_secs(config.connect_timeout);
        let tcp = timeout(
            connect_timeout,
            TcpStream::connect((config.host.as_str(), config.port)),
        )
        .await
        .map_err(|_| FtpError::Timeout("connect"))??;
        tcp.set_nodelay(true).ok();

        let mut control = ControlChannel::new(tcp, Duration::from_secs(config.command_timeout))?;

        let mut banner = control.read_reply().await?;
        // 120: service ready in nnn minutes, the real greeting follows
        while banner.is_preliminary() {
            banner = control.read_reply().await?;
        }
        if !banner.is_success() {
            return Err(banner.into_error());
        }

        login(&mut control, &config.username, &config.password).await?;
        control.expect_ok("TYPE I").await?;

        let now = Instant::now();
        Ok(Self {
            id,
            control,
            state: ConnectionState::Idle,
            last_probe: now,
            last_used: now,
            connect_timeout,
        })
    }

    /// Pool-assigned identity, unique for the lifetime of the process
    pub const fn id(&self) -> u64 {
        self.id
    }

    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: ConnectionState) {
        if state != ConnectionState::Active {
            self.last_used = Instant::now();
        }
        self.state = state;
    }

    /// When the session last answered a NOOP (or finished logging in)
    pub const fn last_probe(&self) -> Instant {
        self.last_probe
    }

    /// Time since the session last went back to the pool
    pub fn idle_for(&self) -> Duration {
        self.last_used.elapsed()
    }

    /// Liveness probe: one NOOP round-trip
    pub async fn probe(&mut self) -> FtpResult<()> {
        self.control.expect_ok("NOOP").await?;
        self.last_probe = Instant::now();
        Ok(())
    }

    /// Size of a remote file in bytes (RFC 3659 SIZE)
    pub async fn size(&mut self, path: &str) -> FtpResult<u64> {
        let reply = self.control.expect_ok(&format!("SIZE {path}")).await?;
        reply::parse_size(&reply.text())
    }

    /// Negotiate passive mode and connect the data socket
    ///
    /// An unspecified address (`0,0,0,0`) is replaced by the control
    /// connection's peer.
    pub async fn open_passive(&mut self) -> FtpResult<TcpStream> {
        let reply = self.control.expect_ok("PASV").await?;
        let mut addr = reply::parse_pasv(&reply.text())?;
        if addr.ip().is_unspecified() {
            addr = SocketAddr::new(self.control.peer().ip(), addr.port());
        }
        let data = timeout(self.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| FtpError::Timeout("data connect"))??;
        Ok(data)
    }

    /// Set the restart marker for the next `RETR`
    pub async fn restart_at(&mut self, offset: u64) -> FtpResult<()> {
        let reply = self.control.execute(&format!("REST {offset}")).await?;
        if reply.is_intermediate() {
            Ok(())
        } else {
            Err(reply.into_error())
        }
    }

    /// Issue `RETR`; succeeds once the server announces the transfer (1xx)
    pub async fn retrieve(&mut self, path: &str) -> FtpResult<()> {
        let reply = self.control.execute(&format!("RETR {path}")).await?;
        if reply.is_preliminary() {
            Ok(())
        } else {
            Err(reply.into_error())
        }
    }

    /// Read the reply that closes a transfer (226 on success, 426/451 on abort)
    pub async fn read_completion(&mut self) -> FtpResult<Reply> {
        self.control.read_reply().await
    }

    /// Mark the session dead, say goodbye and drop the socket
    pub async fn close(mut self) {
        self.state = ConnectionState::Dead;
        let command_timeout = self.control.command_timeout();
        // quit() already bounds each step by the command timeout
        let _ = timeout(command_timeout * 2, self.control.quit()).await;
    }
}

impl std::fmt::Debug for UpstreamConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamConnection")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("peer", &self.control.peer())
            .finish_non_exhaustive()
    }
}

async fn login(control: &mut ControlChannel, username: &str, password: &str) -> FtpResult<()> {
    let user = control.execute(&format!("USER {username}")).await?;
    if user.is_success() {
        return Ok(());
    }
    if !user.is_intermediate() {
        return Err(user.into_error());
    }
    let pass = control.execute(&format!("PASS {password}")).await?;
    if pass.is_success() {
        Ok(())
    } else {
        Err(pass.into_error())
    }
}
