//! Consumers of pumped chunks

use crate::http::ChannelBody;
use bytes::Bytes;
use std::future::Future;
use std::io;
use thiserror::Error;
use tokio::sync::mpsc;

/// The consumer will not accept any more data
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("chunk consumer went away")]
pub struct SinkClosed;

/// Destination of a stream pump
///
/// `send` completes only once the consumer has room for the chunk, which is
/// what paces the pump. `cancelled` resolves when the consumer is gone, so a
/// pump blocked on upstream I/O can stop without waiting for the next chunk.
pub trait ChunkSink: Send {
    fn send(&mut self, chunk: Bytes) -> impl Future<Output = Result<(), SinkClosed>> + Send;

    fn cancelled(&self) -> impl Future<Output = ()> + Send;
}

/// Sink feeding a hyper response body through a one-slot channel
pub struct ChannelSink {
    tx: mpsc::Sender<io::Result<Bytes>>,
}

impl ChannelSink {
    /// Create a sink and the body it feeds
    ///
    /// One chunk may sit in the channel while the pump holds the next, so at
    /// most two chunks are buffered per transfer.
    pub fn channel(length: Option<u64>) -> (Self, ChannelBody) {
        let (tx, rx) = mpsc::channel(1);
        (Self { tx }, ChannelBody::new(rx, length))
    }

    /// Terminate the body with an error so the client sees an aborted response
    pub async fn fail(&self, err: io::Error) {
        let _ = self.tx.send(Err(err)).await;
    }
}

impl ChunkSink for ChannelSink {
    async fn send(&mut self, chunk: Bytes) -> Result<(), SinkClosed> {
        self.tx.send(Ok(chunk)).await.map_err(|_| SinkClosed)
    }

    async fn cancelled(&self) {
        self.tx.closed().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[tokio::test]
    async fn test_channel_sink_feeds_body() {
        let (mut sink, body) = ChannelSink::channel(Some(6));
        let reader = tokio::spawn(async move { body.collect().await.map(|c| c.to_bytes()) });

        sink.send(Bytes::from_static(b"abc")).await.unwrap();
        sink.send(Bytes::from_static(b"def")).await.unwrap();
        drop(sink);

        let bytes = reader.await.unwrap().unwrap();
        assert_eq!(&bytes[..], b"abcdef");
    }

    #[tokio::test]
    async fn test_dropped_body_cancels_sink() {
        let (mut sink, body) = ChannelSink::channel(None);
        drop(body);
        sink.cancelled().await;
        assert_eq!(sink.send(Bytes::from_static(b"x")).await, Err(SinkClosed));
    }
}
