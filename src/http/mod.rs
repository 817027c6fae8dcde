//! HTTP protocol layer module
//!
//! Range resolution, content types, cache headers, bodies and response
//! builders. Nothing here talks to the upstream store.

pub mod body;
pub mod cache;
pub mod mime;
pub mod range;
pub mod response;

// Re-export commonly used types
pub use body::{ChannelBody, GatewayBody};
pub use mime::MimeResolver;
pub use range::{ByteRange, RangeSelection};
pub use response::{
    build_403_response, build_404_response, build_405_response, build_options_response,
    build_status_response, build_stream_response, StreamHead,
};
