//! Upstream → client data transfer

mod pump;
mod sink;

pub use pump::{DataTransfer, PumpEnd, PumpOutcome, StreamPump};
pub use sink::{ChannelSink, ChunkSink, SinkClosed};
