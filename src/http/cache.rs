//! HTTP cache control module
//!
//! Only response metadata is cacheable by clients; bodies are always streamed.

use super::mime;

/// Cache control policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// Public cache with specified max-age (seconds)
    Public(u32),
    /// No cache directive sent
    None,
}

impl CachePolicy {
    /// Media types get a public policy, everything else none
    pub fn for_content_type(content_type: &str, media_max_age: u32) -> Self {
        if mime::is_media(content_type) {
            Self::Public(media_max_age)
        } else {
            Self::None
        }
    }

    /// Convert to Cache-Control header value
    pub fn to_header_value(self) -> Option<String> {
        match self {
            Self::Public(max_age) => Some(format!("public, max-age={max_age}")),
            Self::None => None,
        }
    }
}
