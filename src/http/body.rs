//! Response body types
//!
//! Fixed responses use `Full`/`Empty`; streamed files use [`ChannelBody`],
//! which yields whatever the transfer task pushes into a bounded channel.

use bytes::Bytes;
use http_body::{Body, Frame, SizeHint};
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Empty, Full};
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// Body type of every gateway response
pub type GatewayBody = BoxBody<Bytes, io::Error>;

pub fn full(data: impl Into<Bytes>) -> GatewayBody {
    Full::new(data.into()).map_err(|never| match never {}).boxed()
}

pub fn empty() -> GatewayBody {
    Empty::<Bytes>::new().map_err(|never| match never {}).boxed()
}

/// Body fed from an mpsc receiver
///
/// Dropping it (the client went away) closes the channel, which the sending
/// side observes as cancellation.
pub struct ChannelBody {
    rx: mpsc::Receiver<io::Result<Bytes>>,
    length: Option<u64>,
}

impl ChannelBody {
    pub(crate) const fn new(rx: mpsc::Receiver<io::Result<Bytes>>, length: Option<u64>) -> Self {
        Self { rx, length }
    }

    pub fn into_body(self) -> GatewayBody {
        BodyExt::boxed(self)
    }
}

impl Body for ChannelBody {
    type Data = Bytes;
    type Error = io::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, io::Error>>> {
        self.rx
            .poll_recv(cx)
            .map(|item| item.map(|result| result.map(Frame::data)))
    }

    fn size_hint(&self) -> SizeHint {
        self.length.map_or_else(SizeHint::default, SizeHint::with_exact)
    }
}
