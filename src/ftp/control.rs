//! Control channel codec
//!
//! Sends CRLF-terminated commands and reads single or multi-line replies.
//! Every read is bounded by the command timeout.

use super::error::{FtpError, FtpResult};
use super::reply::{self, Reply};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Longest reply line accepted before the server is considered broken
const MAX_LINE_LEN: usize = 8 * 1024;

pub struct ControlChannel {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    peer: SocketAddr,
    command_timeout: Duration,
}

impl ControlChannel {
    pub fn new(stream: TcpStream, command_timeout: Duration) -> FtpResult<Self> {
        let peer = stream.peer_addr()?;
        let (rd, wr) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(rd),
            writer: wr,
            peer,
            command_timeout,
        })
    }

    /// Address of the server end of the control connection
    pub const fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub const fn command_timeout(&self) -> Duration {
        self.command_timeout
    }

    pub async fn send_command(&mut self, cmd: &str) -> FtpResult<()> {
        if cmd.contains(['\r', '\n']) {
            return Err(FtpError::Protocol(
                "command contains a line break".to_string(),
            ));
        }
        let line = format!("{cmd}\r\n");
        timeout(self.command_timeout, self.writer.write_all(line.as_bytes()))
            .await
            .map_err(|_| FtpError::Timeout("command write"))??;
        Ok(())
    }

    async fn read_line(&mut self) -> FtpResult<String> {
        let mut buf = String::new();
        let n = timeout(self.command_timeout, self.reader.read_line(&mut buf))
            .await
            .map_err(|_| FtpError::Timeout("reply"))??;
        if n == 0 {
            return Err(FtpError::Closed);
        }
        if buf.len() > MAX_LINE_LEN {
            return Err(FtpError::Protocol("reply line too long".to_string()));
        }
        Ok(buf.trim_end_matches(['\r', '\n']).to_string())
    }

    /// Read one complete reply
    ///
    /// Multi-line replies start with `NNN-` and end at the first line that
    /// starts with `NNN ` using the same code.
    pub async fn read_reply(&mut self) -> FtpResult<Reply> {
        let first = self.read_line().await?;
        let code = reply::parse_code(&first)?;
        let multiline = reply::opens_multiline(&first);
        let mut lines = vec![first];

        if multiline {
            loop {
                let next = self.read_line().await?;
                let done = reply::closes_multiline(&next, code);
                lines.push(next);
                if done {
                    break;
                }
            }
        }

        Ok(Reply { code, lines })
    }

    pub async fn execute(&mut self, cmd: &str) -> FtpResult<Reply> {
        self.send_command(cmd).await?;
        self.read_reply().await
    }

    /// Send a command and require a 2xx reply
    pub async fn expect_ok(&mut self, cmd: &str) -> FtpResult<Reply> {
        let reply = self.execute(cmd).await?;
        if reply.is_success() {
            Ok(reply)
        } else {
            Err(reply.into_error())
        }
    }

    /// Best-effort QUIT; errors are irrelevant because the socket is dropped next
    pub async fn quit(mut self) {
        let _ = self.execute("QUIT").await;
        let _ = self.writer.shutdown().await;
    }
}
