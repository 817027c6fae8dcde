//! Stream pump
//!
//! Moves bytes from an upstream data channel to a [`ChunkSink`], one bounded
//! chunk at a time, never more than the requested byte budget.

use super::sink::ChunkSink;
use crate::config::StreamConfig;
use crate::error::GatewayError;
use crate::ftp::{FtpResult, UpstreamConnection};
use crate::logger;
use bytes::BytesMut;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::time::timeout;

/// An open `RETR` data channel
///
/// Borrows its control session mutably, so it can neither outlive it nor
/// share it with another transfer.
pub struct DataTransfer<'c> {
    conn: &'c mut UpstreamConnection,
    data: TcpStream,
    offset: u64,
    /// Bytes still to deliver; `None` = until upstream EOF
    remaining: Option<u64>,
}

impl<'c> DataTransfer<'c> {
    /// Open the data channel and start retrieving `path` from `offset`
    ///
    /// PASV comes first so that REST immediately precedes RETR.
    pub async fn open(
        conn: &'c mut UpstreamConnection,
        path: &str,
        offset: u64,
        length: Option<u64>,
    ) -> FtpResult<Self> {
        let data = conn.open_passive().await?;
        if offset > 0 {
            conn.restart_at(offset).await?;
        }
        conn.retrieve(path).await?;
        Ok(Self {
            conn,
            data,
            offset,
            remaining: length,
        })
    }

    /// Close the data channel and read the completion reply
    ///
    /// Returns whether the control channel ended in a clean state.
    async fn finish(self) -> bool {
        let Self { conn, data, .. } = self;
        drop(data);
        match conn.read_completion().await {
            Ok(reply) => reply.is_success(),
            Err(_) => false,
        }
    }

    /// Close the data channel without waiting for anything
    fn discard(self) {
        drop(self.data);
    }
}

/// How a pump run ended without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpEnd {
    /// Budget met or upstream EOF reached
    Completed,
    /// The sink went away first
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PumpOutcome {
    pub end: PumpEnd,
    pub delivered: u64,
    /// Whether the control session may go back to the pool
    pub reusable: bool,
}

/// Drives one upstream transfer into a sink
#[derive(Debug, Clone)]
pub struct StreamPump {
    chunk_size: usize,
    read_timeout: Duration,
    stall_timeout: Duration,
}

impl StreamPump {
    pub fn new(chunk_size: usize, read_timeout: Duration, stall_timeout: Duration) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            read_timeout,
            stall_timeout,
        }
    }

    pub fn from_config(config: &StreamConfig) -> Self {
        Self::new(
            config.chunk_size,
            Duration::from_secs(config.read_timeout),
            Duration::from_secs(config.stall_timeout),
        )
    }

    /// Retrieve `path` from `offset` and deliver at most `length` bytes
    ///
    /// A failure to start the transfer maps to `NotFound` or
    /// `UpstreamUnavailable`, like any error before the first byte.
    pub async fn run<S: ChunkSink>(
        &self,
        conn: &mut UpstreamConnection,
        path: &str,
        offset: u64,
        length: Option<u64>,
        sink: &mut S,
    ) -> Result<PumpOutcome, GatewayError> {
        let transfer = DataTransfer::open(conn, path, offset, length)
            .await
            .map_err(|e| GatewayError::from_upstream(path, &e))?;
        self.drain(transfer, sink).await
    }

    /// Pump an already opened transfer until its budget, EOF or cancellation
    pub async fn drain<S: ChunkSink>(
        &self,
        mut transfer: DataTransfer<'_>,
        sink: &mut S,
    ) -> Result<PumpOutcome, GatewayError> {
        let mut buf = BytesMut::with_capacity(self.chunk_size);
        let mut delivered: u64 = 0;
        let mut stalled = Duration::ZERO;

        loop {
            let want = match transfer.remaining {
                Some(0) => break,
                Some(left) => usize::try_from(left).map_or(self.chunk_size, |l| l.min(self.chunk_size)),
                None => self.chunk_size,
            };

            buf.clear();
            buf.reserve(want);
            let read = {
                let mut limited = (&mut transfer.data).take(want as u64);
                tokio::select! {
                    biased;
                    () = sink.cancelled() => None,
                    r = timeout(self.read_timeout, limited.read_buf(&mut buf)) => Some(r),
                }
            };

            let n = match read {
                None => return Ok(Self::abort(transfer, delivered).await),
                Some(Err(_elapsed)) => {
                    stalled += self.read_timeout;
                    if stalled >= self.stall_timeout {
                        transfer.discard();
                        return Err(interrupted(delivered, "upstream stalled"));
                    }
                    continue;
                }
                Some(Ok(Err(e))) => {
                    transfer.discard();
                    return Err(interrupted(delivered, &format!("data channel: {e}")));
                }
                Some(Ok(Ok(0))) => {
                    if let Some(left) = transfer.remaining.filter(|l| *l > 0) {
                        transfer.discard();
                        return Err(interrupted(
                            delivered,
                            &format!("upstream ended {left} bytes early"),
                        ));
                    }
                    break;
                }
                Some(Ok(Ok(n))) => n,
            };
            stalled = Duration::ZERO;

            // Never forward past the budget, whatever the read returned
            let allowed = transfer
                .remaining
                .map_or(n, |left| usize::try_from(left).map_or(n, |l| n.min(l)));
            let chunk = buf.split_to(allowed).freeze();

            if sink.send(chunk).await.is_err() {
                return Ok(Self::abort(transfer, delivered).await);
            }
            delivered += allowed as u64;
            if let Some(left) = transfer.remaining.as_mut() {
                *left -= allowed as u64;
            }
        }

        let reusable = transfer.finish().await;
        Ok(PumpOutcome {
            end: PumpEnd::Completed,
            delivered,
            reusable,
        })
    }

    /// Client cancellation: close the data channel, acknowledge the
    /// completion reply, and never reuse the session
    async fn abort(transfer: DataTransfer<'_>, delivered: u64) -> PumpOutcome {
        logger::log_info(&format!(
            "[Stream] Client cancelled at offset {} after {delivered} bytes",
            transfer.offset
        ));
        let _ = transfer.finish().await;
        PumpOutcome {
            end: PumpEnd::Cancelled,
            delivered,
            reusable: false,
        }
    }
}

fn interrupted(delivered: u64, reason: &str) -> GatewayError {
    GatewayError::StreamInterrupted {
        delivered,
        reason: reason.to_string(),
    }
}
