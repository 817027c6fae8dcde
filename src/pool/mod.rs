//! Upstream connection pool
//!
//! Hands out one authenticated FTP session per request and takes it back
//! afterwards. Idle sessions are probed before reuse and by a background
//! keepalive sweep. All idle-list transitions go through one async mutex,
//! so the sweep never races a worker's `acquire` or `release`.
//!
//! Limits: at most `max_size` sessions checked out at once (semaphore) and
//! at most `max_idle` parked.

mod keepalive;

use crate::config::{PoolConfig, UpstreamConfig};
use crate::error::GatewayError;
use crate::ftp::{ConnectionState, UpstreamConnection};
use crate::logger;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

/// Connect attempts per `acquire` before giving up (first try + one retry)
const CONNECT_ATTEMPTS: usize = 2;

/// Pool counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    pub idle: usize,
    pub active: usize,
    pub total: usize,
}

struct PoolInner {
    upstream: UpstreamConfig,
    settings: PoolConfig,
    idle: Mutex<Vec<UpstreamConnection>>,
    permits: Arc<Semaphore>,
    active: AtomicUsize,
    next_id: AtomicU64,
    shutdown: CancellationToken,
}

/// Shared handle to the pool; cloning is cheap
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

impl ConnectionPool {
    pub fn new(upstream: UpstreamConfig, settings: PoolConfig) -> Self {
        let permits = Arc::new(Semaphore::new(settings.max_size.max(1)));
        Self {
            inner: Arc::new(PoolInner {
                upstream,
                settings,
                idle: Mutex::new(Vec::new()),
                permits,
                active: AtomicUsize::new(0),
                next_id: AtomicU64::new(1),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Check out a healthy session
    ///
    /// Idle sessions are tried most-recently-used first; each must answer a
    /// NOOP. Failing ones are closed and skipped. With no usable idle
    /// session a new one is opened, retrying once.
    pub async fn acquire(&self) -> Result<PooledConnection, GatewayError> {
        let wait = Duration::from_secs(self.inner.settings.acquire_timeout);
        let permit = timeout(wait, Arc::clone(&self.inner.permits).acquire_owned())
            .await
            .map_err(|_| {
                GatewayError::UpstreamUnavailable(format!(
                    "no upstream slot free within {}s",
                    wait.as_secs()
                ))
            })?
            .map_err(|_| GatewayError::UpstreamUnavailable("pool is shut down".to_string()))?;

        while let Some(mut conn) = self.pop_idle().await {
            match conn.probe().await {
                Ok(()) => return Ok(self.check_out(conn, permit)),
                Err(e) => {
                    let stale = GatewayError::StaleConnection {
                        id: conn.id(),
                        reason: e.to_string(),
                    };
                    logger::log_warning(&format!("[Pool] {stale}, discarding"));
                    conn.close().await;
                }
            }
        }

        let conn = self.connect_with_retry().await?;
        Ok(self.check_out(conn, permit))
    }

    /// Give a session back
    ///
    /// Healthy sessions return to the idle list (closed if it is full).
    /// Unhealthy ones are marked dead and closed immediately.
    pub async fn release(&self, mut pooled: PooledConnection, healthy: bool) {
        // `pooled` keeps the slot until the session is parked or closed
        let Some(mut conn) = pooled.conn.take() else {
            return;
        };

        if healthy
            && conn.state() == ConnectionState::Active
            && !self.inner.shutdown.is_cancelled()
        {
            conn.set_state(ConnectionState::Idle);
            let mut idle = self.inner.idle.lock().await;
            if idle.len() < self.inner.settings.max_idle {
                idle.push(conn);
                return;
            }
        }

        conn.set_state(ConnectionState::Dead);
        conn.close().await;
    }

    /// Snapshot of the pool counters
    pub async fn stats(&self) -> PoolStats {
        let idle = self.inner.idle.lock().await.len();
        let active = self.inner.active.load(Ordering::SeqCst);
        PoolStats {
            idle,
            active,
            total: idle + active,
        }
    }

    /// Start the background keepalive sweep
    ///
    /// Returns `None` when `keepalive_interval` is 0.
    pub fn spawn_keepalive(&self) -> Option<tokio::task::JoinHandle<()>> {
        keepalive::spawn(self.clone())
    }

    /// Stop the sweep, refuse new checkouts and close every idle session
    pub async fn shutdown(&self) {
        self.inner.shutdown.cancel();
        self.inner.permits.close();
        let drained: Vec<UpstreamConnection> = std::mem::take(&mut *self.inner.idle.lock().await);
        let count = drained.len();
        for conn in drained {
            conn.close().await;
        }
        if count > 0 {
            logger::log_info(&format!("[Pool] Closed {count} idle upstream sessions"));
        }
    }

    async fn pop_idle(&self) -> Option<UpstreamConnection> {
        self.inner.idle.lock().await.pop()
    }

    fn check_out(&self, mut conn: UpstreamConnection, permit: OwnedSemaphorePermit) -> PooledConnection {
        conn.set_state(ConnectionState::Active);
        self.inner.active.fetch_add(1, Ordering::SeqCst);
        PooledConnection {
            conn: Some(conn),
            inner: Arc::clone(&self.inner),
            _permit: permit,
        }
    }

    async fn connect_with_retry(&self) -> Result<UpstreamConnection, GatewayError> {
        let upstream = &self.inner.upstream;
        let mut last_error = String::new();

        for attempt in 1..=CONNECT_ATTEMPTS {
            let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
            match UpstreamConnection::connect(id, upstream).await {
                Ok(conn) => {
                    logger::log_info(&format!(
                        "[Pool] Opened upstream session #{id} to {}:{}",
                        upstream.host, upstream.port
                    ));
                    return Ok(conn);
                }
                Err(e) => {
                    logger::log_warning(&format!(
                        "[Pool] Connect attempt {attempt}/{CONNECT_ATTEMPTS} to {}:{} failed: {e}",
                        upstream.host, upstream.port
                    ));
                    last_error = e.to_string();
                }
            }
        }

        Err(GatewayError::UpstreamUnavailable(last_error))
    }
}

/// A session checked out of the pool
///
/// Hand it back with [`ConnectionPool::release`]. If it is dropped instead
/// (e.g. the request future was cancelled) the socket is closed without
/// QUIT and the slot is freed.
pub struct PooledConnection {
    conn: Option<UpstreamConnection>,
    inner: Arc<PoolInner>,
    _permit: OwnedSemaphorePermit,
}

impl Deref for PooledConnection {
    type Target = UpstreamConnection;

    fn deref(&self) -> &UpstreamConnection {
        self.conn
            .as_ref()
            .unwrap_or_else(|| unreachable!("connection is only taken on release"))
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut UpstreamConnection {
        self.conn
            .as_mut()
            .unwrap_or_else(|| unreachable!("connection is only taken on release"))
    }
}

impl std::fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection")
            .field("conn", &self.conn)
            .finish_non_exhaustive()
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        self.inner.active.fetch_sub(1, Ordering::SeqCst);
        if let Some(conn) = self.conn.as_ref() {
            logger::log_warning(&format!(
                "[Pool] Session #{} dropped without release, closing",
                conn.id()
            ));
        }
    }
}
