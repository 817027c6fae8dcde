mod common;

use bytes::Bytes;
use common::{pattern, FakeFtp};
use ftp_gateway::error::GatewayError;
use ftp_gateway::ftp::UpstreamConnection;
use ftp_gateway::transfer::{ChunkSink, PumpEnd, SinkClosed, StreamPump};
use std::time::{Duration, Instant};

/// Collects chunks; optionally hangs up after a number of them
#[derive(Default)]
struct VecSink {
    chunks: Vec<Bytes>,
    accept: Option<usize>,
}

impl VecSink {
    fn hanging_up_after(accept: usize) -> Self {
        Self {
            chunks: Vec::new(),
            accept: Some(accept),
        }
    }

    fn bytes(&self) -> Vec<u8> {
        self.chunks.iter().flat_map(|c| c.iter().copied()).collect()
    }
}

impl ChunkSink for VecSink {
    async fn send(&mut self, chunk: Bytes) -> Result<(), SinkClosed> {
        if self.accept.is_some_and(|n| self.chunks.len() >= n) {
            return Err(SinkClosed);
        }
        self.chunks.push(chunk);
        Ok(())
    }

    async fn cancelled(&self) {
        std::future::pending::<()>().await;
    }
}

fn pump(chunk_size: usize) -> StreamPump {
    StreamPump::new(chunk_size, Duration::from_secs(2), Duration::from_secs(4))
}

async fn connect(ftp: &FakeFtp) -> UpstreamConnection {
    UpstreamConnection::connect(1, &ftp.upstream()).await.unwrap()
}

#[tokio::test]
async fn test_window_is_delivered_exactly() {
    let ftp = FakeFtp::start().await;
    let data = pattern(10_000);
    ftp.add_file("movie.mp4", data.clone());
    let mut conn = connect(&ftp).await;
    let mut sink = VecSink::default();

    let outcome = pump(1024)
        .run(&mut conn, "movie.mp4", 100, Some(500), &mut sink)
        .await
        .unwrap();

    assert_eq!(outcome.end, PumpEnd::Completed);
    assert_eq!(outcome.delivered, 500);
    assert_eq!(sink.bytes(), &data[100..600]);
    assert!(ftp.commands().contains(&"REST 100".to_string()));
}

#[tokio::test]
async fn test_budget_truncates_last_chunk() {
    let ftp = FakeFtp::start().await;
    let data = pattern(10_000);
    ftp.add_file("clip.webm", data.clone());
    let mut conn = connect(&ftp).await;
    let mut sink = VecSink::default();

    // 1000 bytes through 300-byte chunks: the fourth read is cut to 100
    let outcome = pump(300)
        .run(&mut conn, "clip.webm", 0, Some(1000), &mut sink)
        .await
        .unwrap();

    assert_eq!(outcome.delivered, 1000);
    assert_eq!(sink.bytes(), &data[..1000]);
    assert!(sink.chunks.iter().all(|c| c.len() <= 300));
    assert_eq!(sink.chunks.last().map(Bytes::len), Some(100));
}

#[tokio::test]
async fn test_rest_skipped_at_offset_zero() {
    let ftp = FakeFtp::start().await;
    ftp.add_file("a.mp3", pattern(2048));
    let mut conn = connect(&ftp).await;
    let mut sink = VecSink::default();

    let outcome = pump(512)
        .run(&mut conn, "a.mp3", 0, None, &mut sink)
        .await
        .unwrap();

    assert_eq!(outcome.delivered, 2048);
    assert!(outcome.reusable);
    assert!(!ftp.commands().iter().any(|c| c.starts_with("REST")));
}

#[tokio::test]
async fn test_session_reusable_after_complete_transfer() {
    let ftp = FakeFtp::start().await;
    ftp.add_file("a.mp3", pattern(4096));
    let mut conn = connect(&ftp).await;
    let p = pump(1024);

    for _ in 0..2 {
        let mut sink = VecSink::default();
        let outcome = p.run(&mut conn, "a.mp3", 0, None, &mut sink).await.unwrap();
        assert_eq!(outcome.delivered, 4096);
        assert!(outcome.reusable);
    }
    conn.probe().await.unwrap();
    assert_eq!(ftp.logins(), 1);
}

#[tokio::test]
async fn test_sink_hangup_cancels_and_condemns_session() {
    let ftp = FakeFtp::start().await;
    ftp.add_file("big.mkv", pattern(4 * 1024 * 1024));
    let mut conn = connect(&ftp).await;
    let mut sink = VecSink::hanging_up_after(2);

    let outcome = pump(16 * 1024)
        .run(&mut conn, "big.mkv", 0, None, &mut sink)
        .await
        .unwrap();

    assert_eq!(outcome.end, PumpEnd::Cancelled);
    assert!(!outcome.reusable);
    assert_eq!(outcome.delivered, sink.bytes().len() as u64);
    assert_eq!(sink.chunks.len(), 2);
}

#[tokio::test]
async fn test_missing_file_is_not_found() {
    let ftp = FakeFtp::start().await;
    let mut conn = connect(&ftp).await;
    let mut sink = VecSink::default();

    let err = pump(1024)
        .run(&mut conn, "missing.mp4", 0, None, &mut sink)
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::NotFound(_)));
    assert!(sink.chunks.is_empty());
    // A refused RETR leaves the session usable
    conn.probe().await.unwrap();
}

#[tokio::test]
async fn test_short_upstream_is_interrupted() {
    let ftp = FakeFtp::start().await;
    ftp.add_file("short.mp4", pattern(1000));
    let mut conn = connect(&ftp).await;
    let mut sink = VecSink::default();

    let err = pump(256)
        .run(&mut conn, "short.mp4", 0, Some(5000), &mut sink)
        .await
        .unwrap_err();

    match err {
        GatewayError::StreamInterrupted { delivered, .. } => assert_eq!(delivered, 1000),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_stalled_upstream_is_interrupted_after_ceiling() {
    let ftp = FakeFtp::start().await;
    ftp.add_file("stuck.mp4", pattern(10_000));
    ftp.set_stall_after(100);
    let mut conn = connect(&ftp).await;
    let mut sink = VecSink::default();
    let pump = StreamPump::new(1024, Duration::from_secs(1), Duration::from_secs(3));

    let started = Instant::now();
    let err = pump
        .run(&mut conn, "stuck.mp4", 0, Some(10_000), &mut sink)
        .await
        .unwrap_err();
    let waited = started.elapsed();

    match err {
        GatewayError::StreamInterrupted { delivered, .. } => assert_eq!(delivered, 100),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(sink.bytes(), pattern(100));
    // Individual read timeouts are retried up to the stall ceiling
    assert!(waited >= Duration::from_millis(2900), "gave up after {waited:?}");
    assert!(waited < Duration::from_secs(6), "gave up after {waited:?}");
}
