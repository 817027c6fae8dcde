//! Scripted in-process FTP server for integration tests
//!
//! Speaks just enough of the protocol for the gateway: login, TYPE, SIZE,
//! PASV, REST, RETR, NOOP, ABOR and QUIT. Files live in memory, and a few
//! switches make the server misbehave on purpose.

#![allow(dead_code)]

use ftp_gateway::config::{Config, PoolConfig, UpstreamConfig};
use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

#[derive(Default)]
struct FakeState {
    files: Mutex<HashMap<String, Arc<Vec<u8>>>>,
    commands: Mutex<Vec<String>>,
    logins: AtomicUsize,
    retrs: AtomicUsize,
    noop_fails: AtomicBool,
    noop_hangs: AtomicBool,
    size_unsupported: AtomicBool,
    /// Bytes sent before the data channel goes silent; 0 = never stall
    stall_after: AtomicUsize,
}

impl FakeState {
    fn file(&self, name: &str) -> Option<Arc<Vec<u8>>> {
        self.files.lock().unwrap().get(name).cloned()
    }
}

pub struct FakeFtp {
    addr: SocketAddr,
    state: Arc<FakeState>,
}

impl FakeFtp {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(FakeState::default());

        let accept_state = Arc::clone(&state);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let session_state = Arc::clone(&accept_state);
                tokio::spawn(async move {
                    let _ = session(stream, session_state).await;
                });
            }
        });

        Self { addr, state }
    }

    pub fn add_file(&self, name: &str, data: Vec<u8>) {
        self.state
            .files
            .lock()
            .unwrap()
            .insert(name.to_string(), Arc::new(data));
    }

    pub fn upstream(&self) -> UpstreamConfig {
        UpstreamConfig {
            host: self.addr.ip().to_string(),
            port: self.addr.port(),
            username: "tester".to_string(),
            password: "secret".to_string(),
            connect_timeout: 2,
            command_timeout: 2,
            ..UpstreamConfig::default()
        }
    }

    /// Gateway config pointed at this server, access log off
    pub fn gateway_config(&self) -> Config {
        let mut config = Config::default();
        config.upstream = self.upstream();
        config.pool = PoolConfig {
            keepalive_interval: 0,
            ..PoolConfig::default()
        };
        config.stream.chunk_size = 4096;
        config.stream.read_timeout = 2;
        config.stream.stall_timeout = 4;
        config.logging.access_log = false;
        config
    }

    /// Successful logins so far, i.e. sessions opened
    pub fn logins(&self) -> usize {
        self.state.logins.load(Ordering::SeqCst)
    }

    /// Transfers actually started
    pub fn retrs(&self) -> usize {
        self.state.retrs.load(Ordering::SeqCst)
    }

    pub fn commands(&self) -> Vec<String> {
        self.state.commands.lock().unwrap().clone()
    }

    /// Make every NOOP answer 421 and drop the session
    pub fn set_noop_fails(&self, fails: bool) {
        self.state.noop_fails.store(fails, Ordering::SeqCst);
    }

    /// Leave every NOOP unanswered
    pub fn set_noop_hangs(&self, hangs: bool) {
        self.state.noop_hangs.store(hangs, Ordering::SeqCst);
    }

    /// Send `bytes` of each RETR, then hold the data channel open silently
    pub fn set_stall_after(&self, bytes: usize) {
        self.state.stall_after.store(bytes, Ordering::SeqCst);
    }

    /// Answer SIZE with 502
    pub fn set_size_unsupported(&self, unsupported: bool) {
        self.state.size_unsupported.store(unsupported, Ordering::SeqCst);
    }
}

/// Deterministic test payload
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

async fn reply(wr: &mut OwnedWriteHalf, line: &str) -> io::Result<()> {
    wr.write_all(format!("{line}\r\n").as_bytes()).await
}

async fn session(stream: TcpStream, state: Arc<FakeState>) -> io::Result<()> {
    let (rd, mut wr) = stream.into_split();
    let mut lines = BufReader::new(rd).lines();
    reply(&mut wr, "220-fake ftp").await?;
    reply(&mut wr, "220 ready").await?;

    let mut pasv: Option<TcpListener> = None;
    let mut offset = 0usize;

    while let Some(line) = lines.next_line().await? {
        state.commands.lock().unwrap().push(line.clone());
        let (cmd, arg) = line.split_once(' ').unwrap_or((line.as_str(), ""));

        match cmd.to_ascii_uppercase().as_str() {
            "USER" => reply(&mut wr, "331 password required").await?,
            "PASS" => {
                state.logins.fetch_add(1, Ordering::SeqCst);
                reply(&mut wr, "230 logged in").await?;
            }
            "TYPE" => reply(&mut wr, "200 type set").await?,
            "NOOP" => {
                if state.noop_hangs.load(Ordering::SeqCst) {
                    continue;
                }
                if state.noop_fails.load(Ordering::SeqCst) {
                    reply(&mut wr, "421 service not available").await?;
                    return Ok(());
                }
                reply(&mut wr, "200 ok").await?;
            }
            "SIZE" => {
                if state.size_unsupported.load(Ordering::SeqCst) {
                    reply(&mut wr, "502 command not implemented").await?;
                } else if let Some(data) = state.file(arg) {
                    reply(&mut wr, &format!("213 {}", data.len())).await?;
                } else {
                    reply(&mut wr, "550 no such file").await?;
                }
            }
            "PASV" => {
                let listener = TcpListener::bind("127.0.0.1:0").await?;
                let port = listener.local_addr()?.port();
                pasv = Some(listener);
                reply(
                    &mut wr,
                    &format!("227 Entering Passive Mode (127,0,0,1,{},{})", port >> 8, port & 0xff),
                )
                .await?;
            }
            "REST" => {
                offset = arg.parse().unwrap_or(0);
                reply(&mut wr, &format!("350 restarting at {offset}")).await?;
            }
            "RETR" => {
                let start = std::mem::take(&mut offset);
                let Some(listener) = pasv.take() else {
                    reply(&mut wr, "425 use PASV first").await?;
                    continue;
                };
                let Some(data) = state.file(arg) else {
                    reply(&mut wr, "550 no such file").await?;
                    continue;
                };
                reply(&mut wr, "150 opening binary mode data connection").await?;
                let (mut conn, _) = timeout(Duration::from_secs(5), listener.accept())
                    .await
                    .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "no data connection"))??;
                state.retrs.fetch_add(1, Ordering::SeqCst);

                let start = start.min(data.len());
                let stall_after = state.stall_after.load(Ordering::SeqCst);
                if stall_after > 0 {
                    let end = (start + stall_after).min(data.len());
                    conn.write_all(&data[start..end]).await?;
                    // Silent until the client gives up on the data channel
                    let mut scratch = [0u8; 64];
                    let _ = conn.read(&mut scratch).await;
                    reply(&mut wr, "426 connection closed; transfer aborted").await?;
                    continue;
                }
                match conn.write_all(&data[start..]).await {
                    Ok(()) => {
                        let _ = conn.shutdown().await;
                        drop(conn);
                        reply(&mut wr, "226 transfer complete").await?;
                    }
                    Err(_) => reply(&mut wr, "426 connection closed; transfer aborted").await?,
                }
            }
            "ABOR" => reply(&mut wr, "226 abort successful").await?,
            "QUIT" => {
                reply(&mut wr, "221 bye").await?;
                return Ok(());
            }
            _ => reply(&mut wr, "502 command not implemented").await?,
        }
    }
    Ok(())
}
